pub mod expression;
pub mod statement;

pub use expression::{BinaryOp, BoolOp, CompareOp, Expression, Literal, UnaryOp};
pub use statement::{
    Assign, AugAssign, ClassDef, ForLoop, FunctionDef, IfStatement, Statement, WhileLoop,
};

/// Top-level program: a flat sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Statement>,
}

impl Program {
    pub fn new(body: Vec<Statement>) -> Self {
        Program { body }
    }
}
