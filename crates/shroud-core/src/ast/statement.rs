use super::expression::{BinaryOp, Expression};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign(Assign),
    AugAssign(AugAssign),
    Expr(Expression),
    If(IfStatement),
    While(WhileLoop),
    For(ForLoop),
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Return(Option<Expression>),
    Break,
    Continue,
    Pass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AugAssign {
    pub target: String,
    pub op: BinaryOp,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub test: Expression,
    pub body: Vec<Statement>,
    pub orelse: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub test: Expression,
    pub body: Vec<Statement>,
}

/// `for target in iter:` — the iterable is an arbitrary expression; passes
/// that only understand literal `range(...)` headers must leave anything
/// else untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub target: String,
    pub iter: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub body: Vec<Statement>,
}

impl Statement {
    pub fn assign(target: impl Into<String>, value: Expression) -> Self {
        Statement::Assign(Assign {
            target: target.into(),
            value,
        })
    }

    pub fn aug_assign(target: impl Into<String>, op: BinaryOp, value: Expression) -> Self {
        Statement::AugAssign(AugAssign {
            target: target.into(),
            op,
            value,
        })
    }
}
