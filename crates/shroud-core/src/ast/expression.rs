#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Name(String),
    Literal(Literal),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    /// Short-circuit `and`/`or` chain; evaluates to an operand, not a bool.
    Bool {
        op: BoolOp,
        values: Vec<Expression>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Ternary: `then if test else orelse`.
    Conditional {
        test: Box<Expression>,
        then: Box<Expression>,
        orelse: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expression>,
    },
    List(Vec<Expression>),
    Dict(Vec<(Expression, Expression)>),
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Expression {
    pub fn name(name: impl Into<String>) -> Self {
        Expression::Name(name.into())
    }

    pub fn int(value: i64) -> Self {
        Expression::Literal(Literal::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Expression::Literal(Literal::Bool(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::Str(value.into()))
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(values: Vec<Expression>) -> Self {
        Expression::Bool {
            op: BoolOp::And,
            values,
        }
    }

    pub fn or(values: Vec<Expression>) -> Self {
        Expression::Bool {
            op: BoolOp::Or,
            values,
        }
    }

    pub fn call(callee: Expression, args: Vec<Expression>) -> Self {
        Expression::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// `callee(args)` where the callee is a plain name.
    pub fn call_name(callee: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::call(Expression::name(callee), args)
    }

    pub fn conditional(test: Expression, then: Expression, orelse: Expression) -> Self {
        Expression::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            orelse: Box::new(orelse),
        }
    }

    pub fn index(object: Expression, index: Expression) -> Self {
        Expression::Index {
            object: Box::new(object),
            index: Box::new(index),
        }
    }

    /// Literal integer value, if this node is one (a bare literal or a
    /// negated literal, the way the parser emits negative numbers).
    pub fn as_int_literal(&self) -> Option<i64> {
        match self {
            Expression::Literal(Literal::Int(v)) => Some(*v),
            Expression::Unary {
                op: UnaryOp::Neg,
                operand,
            } => match operand.as_ref() {
                Expression::Literal(Literal::Int(v)) => Some(-*v),
                _ => None,
            },
            _ => None,
        }
    }
}
