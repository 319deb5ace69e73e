use crate::ast::{
    BinaryOp, BoolOp, CompareOp, Expression, Literal, Program, Statement, UnaryOp,
};

/// Render a program back to source text.
///
/// Operands are parenthesized whenever they are not atomic; readability of
/// the emitted text is explicitly not a goal, only that the output re-parses
/// to an equivalent tree.
pub fn print(program: &Program) -> String {
    let mut printer = Printer::new();
    printer.write_block(&program.body);
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Printer {
            out: String::new(),
            indent: 0,
        }
    }

    fn write_line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn write_block(&mut self, body: &[Statement]) {
        if body.is_empty() {
            self.write_line_start();
            self.out.push_str("pass\n");
            return;
        }
        for stmt in body {
            self.write_statement(stmt);
        }
    }

    fn write_statement(&mut self, stmt: &Statement) {
        self.write_line_start();
        match stmt {
            Statement::Assign(assign) => {
                self.out.push_str(&assign.target);
                self.out.push_str(" = ");
                self.write_expr(&assign.value);
                self.out.push('\n');
            }
            Statement::AugAssign(assign) => {
                self.out.push_str(&assign.target);
                self.out.push(' ');
                self.out.push_str(binary_op_str(assign.op));
                self.out.push_str("= ");
                self.write_expr(&assign.value);
                self.out.push('\n');
            }
            Statement::Expr(expr) => {
                self.write_expr(expr);
                self.out.push('\n');
            }
            Statement::If(if_stmt) => {
                self.out.push_str("if ");
                self.write_expr(&if_stmt.test);
                self.out.push_str(":\n");
                self.indent += 1;
                self.write_block(&if_stmt.body);
                self.indent -= 1;
                if !if_stmt.orelse.is_empty() {
                    self.write_line_start();
                    self.out.push_str("else:\n");
                    self.indent += 1;
                    self.write_block(&if_stmt.orelse);
                    self.indent -= 1;
                }
            }
            Statement::While(while_stmt) => {
                self.out.push_str("while ");
                self.write_expr(&while_stmt.test);
                self.out.push_str(":\n");
                self.indent += 1;
                self.write_block(&while_stmt.body);
                self.indent -= 1;
            }
            Statement::For(for_stmt) => {
                self.out.push_str("for ");
                self.out.push_str(&for_stmt.target);
                self.out.push_str(" in ");
                self.write_expr(&for_stmt.iter);
                self.out.push_str(":\n");
                self.indent += 1;
                self.write_block(&for_stmt.body);
                self.indent -= 1;
            }
            Statement::FunctionDef(func) => {
                self.out.push_str("def ");
                self.out.push_str(&func.name);
                self.out.push('(');
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(param);
                }
                self.out.push_str("):\n");
                self.indent += 1;
                self.write_block(&func.body);
                self.indent -= 1;
            }
            Statement::ClassDef(class) => {
                self.out.push_str("class ");
                self.out.push_str(&class.name);
                self.out.push_str(":\n");
                self.indent += 1;
                self.write_block(&class.body);
                self.indent -= 1;
            }
            Statement::Return(value) => {
                self.out.push_str("return");
                if let Some(expr) = value {
                    self.out.push(' ');
                    self.write_expr(expr);
                }
                self.out.push('\n');
            }
            Statement::Break => self.out.push_str("break\n"),
            Statement::Continue => self.out.push_str("continue\n"),
            Statement::Pass => self.out.push_str("pass\n"),
        }
    }

    fn write_expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Name(name) => self.out.push_str(name),
            Expression::Literal(lit) => self.write_literal(lit),
            Expression::Binary { op, left, right } => {
                self.write_operand(left);
                self.out.push(' ');
                self.out.push_str(binary_op_str(*op));
                self.out.push(' ');
                self.write_operand(right);
            }
            Expression::Unary { op, operand } => {
                match op {
                    UnaryOp::Neg => self.out.push('-'),
                    UnaryOp::Not => self.out.push_str("not "),
                }
                self.write_operand(operand);
            }
            Expression::Bool { op, values } => {
                let sep = match op {
                    BoolOp::And => " and ",
                    BoolOp::Or => " or ",
                };
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(sep);
                    }
                    self.write_operand(value);
                }
            }
            Expression::Compare { op, left, right } => {
                self.write_operand(left);
                self.out.push(' ');
                self.out.push_str(match op {
                    CompareOp::Eq => "==",
                    CompareOp::Ne => "!=",
                    CompareOp::Lt => "<",
                    CompareOp::Le => "<=",
                    CompareOp::Gt => ">",
                    CompareOp::Ge => ">=",
                });
                self.out.push(' ');
                self.write_operand(right);
            }
            Expression::Conditional { test, then, orelse } => {
                self.write_operand(then);
                self.out.push_str(" if ");
                self.write_operand(test);
                self.out.push_str(" else ");
                self.write_operand(orelse);
            }
            Expression::Call { callee, args } => {
                self.write_operand(callee);
                self.out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(arg);
                }
                self.out.push(')');
            }
            Expression::Lambda { params, body } => {
                self.out.push_str("lambda");
                for (i, param) in params.iter().enumerate() {
                    self.out.push_str(if i == 0 { " " } else { ", " });
                    self.out.push_str(param);
                }
                self.out.push_str(": ");
                self.write_expr(body);
            }
            Expression::List(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(item);
                }
                self.out.push(']');
            }
            Expression::Dict(entries) => {
                self.out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.write_expr(key);
                    self.out.push_str(": ");
                    self.write_expr(value);
                }
                self.out.push('}');
            }
            Expression::Index { object, index } => {
                self.write_operand(object);
                self.out.push('[');
                self.write_expr(index);
                self.out.push(']');
            }
        }
    }

    /// Operand position: parenthesize anything that is not atomic.
    fn write_operand(&mut self, expr: &Expression) {
        if is_atomic(expr) {
            self.write_expr(expr);
        } else {
            self.out.push('(');
            self.write_expr(expr);
            self.out.push(')');
        }
    }

    fn write_literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Int(v) => self.out.push_str(&v.to_string()),
            Literal::Bool(true) => self.out.push_str("True"),
            Literal::Bool(false) => self.out.push_str("False"),
            Literal::None => self.out.push_str("None"),
            Literal::Str(s) => {
                self.out.push('\'');
                for c in s.chars() {
                    match c {
                        '\\' => self.out.push_str("\\\\"),
                        '\'' => self.out.push_str("\\'"),
                        '\n' => self.out.push_str("\\n"),
                        '\t' => self.out.push_str("\\t"),
                        '\r' => self.out.push_str("\\r"),
                        c if (c as u32) < 0x20 || (0x7f..0x100).contains(&(c as u32)) => {
                            self.out.push_str(&format!("\\x{:02x}", c as u32));
                        }
                        c => self.out.push(c),
                    }
                }
                self.out.push('\'');
            }
        }
    }
}

fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
    }
}

fn is_atomic(expr: &Expression) -> bool {
    match expr {
        Expression::Name(_) | Expression::List(_) | Expression::Dict(_) => true,
        Expression::Literal(Literal::Int(v)) => *v >= 0,
        Expression::Literal(_) => true,
        Expression::Call { .. } | Expression::Index { .. } => true,
        _ => false,
    }
}
