use rustc_hash::FxHashSet;

use crate::ast::{Expression, Program, Statement};

/// Tracks every identifier in use and mints collision-free fresh names.
///
/// One registry instance is shared by every pass in a run; a pass that minted
/// names privately could collide with another pass, so all fresh-name needs
/// route through here. Registered names are never retracted.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: FxHashSet<String>,
    generated: FxHashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the whole tree once, recording every identifier that appears as a
    /// function name, class name, parameter, binding target, or name
    /// reference. Must run before any pass requests fresh names.
    pub fn analyze(&mut self, program: &Program) {
        for stmt in &program.body {
            self.collect_statement(stmt);
        }
    }

    /// Returns `base + i` for the smallest `i >= 0` not colliding with any
    /// used or previously generated name, and registers the result.
    pub fn get_name(&mut self, base: &str) -> String {
        let mut i: u64 = 0;
        loop {
            let candidate = format!("{base}{i}");
            if !self.used.contains(&candidate) && !self.generated.contains(&candidate) {
                self.generated.insert(candidate.clone());
                self.used.insert(candidate.clone());
                return candidate;
            }
            i += 1;
        }
    }

    /// Record an externally chosen name as taken.
    pub fn register(&mut self, name: String) {
        self.used.insert(name);
    }

    /// The full set of names currently in use, including generated ones.
    /// The renamer treats this as its do-not-collide constraint.
    pub fn namespace(&self) -> &FxHashSet<String> {
        &self.used
    }

    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    fn collect_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Assign(assign) => {
                self.used.insert(assign.target.clone());
                self.collect_expression(&assign.value);
            }
            Statement::AugAssign(assign) => {
                self.used.insert(assign.target.clone());
                self.collect_expression(&assign.value);
            }
            Statement::Expr(expr) => self.collect_expression(expr),
            Statement::If(if_stmt) => {
                self.collect_expression(&if_stmt.test);
                for s in if_stmt.body.iter().chain(&if_stmt.orelse) {
                    self.collect_statement(s);
                }
            }
            Statement::While(while_stmt) => {
                self.collect_expression(&while_stmt.test);
                for s in &while_stmt.body {
                    self.collect_statement(s);
                }
            }
            Statement::For(for_stmt) => {
                self.used.insert(for_stmt.target.clone());
                self.collect_expression(&for_stmt.iter);
                for s in &for_stmt.body {
                    self.collect_statement(s);
                }
            }
            Statement::FunctionDef(func) => {
                self.used.insert(func.name.clone());
                for param in &func.params {
                    self.used.insert(param.clone());
                }
                for s in &func.body {
                    self.collect_statement(s);
                }
            }
            Statement::ClassDef(class) => {
                self.used.insert(class.name.clone());
                for s in &class.body {
                    self.collect_statement(s);
                }
            }
            Statement::Return(value) => {
                if let Some(expr) = value {
                    self.collect_expression(expr);
                }
            }
            Statement::Break | Statement::Continue | Statement::Pass => {}
        }
    }

    fn collect_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Name(name) => {
                self.used.insert(name.clone());
            }
            Expression::Literal(_) => {}
            Expression::Binary { left, right, .. } => {
                self.collect_expression(left);
                self.collect_expression(right);
            }
            Expression::Unary { operand, .. } => self.collect_expression(operand),
            Expression::Bool { values, .. } => {
                for v in values {
                    self.collect_expression(v);
                }
            }
            Expression::Compare { left, right, .. } => {
                self.collect_expression(left);
                self.collect_expression(right);
            }
            Expression::Conditional { test, then, orelse } => {
                self.collect_expression(test);
                self.collect_expression(then);
                self.collect_expression(orelse);
            }
            Expression::Call { callee, args } => {
                self.collect_expression(callee);
                for arg in args {
                    self.collect_expression(arg);
                }
            }
            Expression::Lambda { params, body } => {
                for param in params {
                    self.used.insert(param.clone());
                }
                self.collect_expression(body);
            }
            Expression::List(items) => {
                for item in items {
                    self.collect_expression(item);
                }
            }
            Expression::Dict(entries) => {
                for (key, value) in entries {
                    self.collect_expression(key);
                    self.collect_expression(value);
                }
            }
            Expression::Index { object, index } => {
                self.collect_expression(object);
                self.collect_expression(index);
            }
        }
    }
}
