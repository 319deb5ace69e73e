use indexmap::IndexSet;
use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::{Expression, Program, Statement};
use crate::errors::ObfuscateError;
use crate::passes::{ObfuscationPass, PassContext};

const FIRST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_";
const REST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";
const NAME_LEN: usize = 8;

/// Replaces every identifier the program defines with a random one.
///
/// Collection is scope-oblivious: a name means the same thing everywhere, so
/// one total map covers definitions and references alike. Names that are
/// only ever read (builtins, free names) are never collected and therefore
/// never touched. Collection order is insertion order, which keeps output
/// deterministic for a fixed RNG seed.
pub struct IdentifierRenamer {
    map: FxHashMap<String, String>,
}

impl IdentifierRenamer {
    pub fn new() -> Self {
        IdentifierRenamer {
            map: FxHashMap::default(),
        }
    }

    /// The mapping built by the last run.
    pub fn mapping(&self) -> &FxHashMap<String, String> {
        &self.map
    }

    fn collect_block(body: &[Statement], defined: &mut IndexSet<String>) {
        for stmt in body {
            match stmt {
                Statement::Assign(assign) => {
                    defined.insert(assign.target.clone());
                    Self::collect_expr(&assign.value, defined);
                }
                Statement::AugAssign(assign) => {
                    defined.insert(assign.target.clone());
                    Self::collect_expr(&assign.value, defined);
                }
                Statement::Expr(expr) => Self::collect_expr(expr, defined),
                Statement::If(if_stmt) => {
                    Self::collect_expr(&if_stmt.test, defined);
                    Self::collect_block(&if_stmt.body, defined);
                    Self::collect_block(&if_stmt.orelse, defined);
                }
                Statement::While(while_stmt) => {
                    Self::collect_expr(&while_stmt.test, defined);
                    Self::collect_block(&while_stmt.body, defined);
                }
                Statement::For(for_stmt) => {
                    defined.insert(for_stmt.target.clone());
                    Self::collect_expr(&for_stmt.iter, defined);
                    Self::collect_block(&for_stmt.body, defined);
                }
                Statement::FunctionDef(func) => {
                    defined.insert(func.name.clone());
                    for param in &func.params {
                        defined.insert(param.clone());
                    }
                    Self::collect_block(&func.body, defined);
                }
                Statement::ClassDef(class) => {
                    defined.insert(class.name.clone());
                    Self::collect_block(&class.body, defined);
                }
                Statement::Return(Some(expr)) => Self::collect_expr(expr, defined),
                Statement::Return(None)
                | Statement::Break
                | Statement::Continue
                | Statement::Pass => {}
            }
        }
    }

    fn collect_expr(expr: &Expression, defined: &mut IndexSet<String>) {
        match expr {
            Expression::Name(_) | Expression::Literal(_) => {}
            Expression::Binary { left, right, .. } => {
                Self::collect_expr(left, defined);
                Self::collect_expr(right, defined);
            }
            Expression::Unary { operand, .. } => Self::collect_expr(operand, defined),
            Expression::Bool { values, .. } => {
                for value in values {
                    Self::collect_expr(value, defined);
                }
            }
            Expression::Compare { left, right, .. } => {
                Self::collect_expr(left, defined);
                Self::collect_expr(right, defined);
            }
            Expression::Conditional { test, then, orelse } => {
                Self::collect_expr(test, defined);
                Self::collect_expr(then, defined);
                Self::collect_expr(orelse, defined);
            }
            Expression::Call { callee, args } => {
                Self::collect_expr(callee, defined);
                for arg in args {
                    Self::collect_expr(arg, defined);
                }
            }
            Expression::Lambda { params, body } => {
                for param in params {
                    defined.insert(param.clone());
                }
                Self::collect_expr(body, defined);
            }
            Expression::List(items) => {
                for item in items {
                    Self::collect_expr(item, defined);
                }
            }
            Expression::Dict(entries) => {
                for (key, value) in entries {
                    Self::collect_expr(key, defined);
                    Self::collect_expr(value, defined);
                }
            }
            Expression::Index { object, index } => {
                Self::collect_expr(object, defined);
                Self::collect_expr(index, defined);
            }
        }
    }

    fn random_name(ctx: &mut PassContext) -> String {
        let mut name = String::with_capacity(NAME_LEN);
        name.push(FIRST_CHARS[ctx.rng.gen_range(0..FIRST_CHARS.len())] as char);
        for _ in 1..NAME_LEN {
            name.push(REST_CHARS[ctx.rng.gen_range(0..REST_CHARS.len())] as char);
        }
        name
    }

    fn rename(&self, name: &mut String) {
        if let Some(new) = self.map.get(name.as_str()) {
            *name = new.clone();
        }
    }

    fn apply_block(&self, body: &mut [Statement]) {
        for stmt in body {
            match stmt {
                Statement::Assign(assign) => {
                    self.rename(&mut assign.target);
                    self.apply_expr(&mut assign.value);
                }
                Statement::AugAssign(assign) => {
                    self.rename(&mut assign.target);
                    self.apply_expr(&mut assign.value);
                }
                Statement::Expr(expr) => self.apply_expr(expr),
                Statement::If(if_stmt) => {
                    self.apply_expr(&mut if_stmt.test);
                    self.apply_block(&mut if_stmt.body);
                    self.apply_block(&mut if_stmt.orelse);
                }
                Statement::While(while_stmt) => {
                    self.apply_expr(&mut while_stmt.test);
                    self.apply_block(&mut while_stmt.body);
                }
                Statement::For(for_stmt) => {
                    self.rename(&mut for_stmt.target);
                    self.apply_expr(&mut for_stmt.iter);
                    self.apply_block(&mut for_stmt.body);
                }
                Statement::FunctionDef(func) => {
                    self.rename(&mut func.name);
                    for param in &mut func.params {
                        self.rename(param);
                    }
                    self.apply_block(&mut func.body);
                }
                Statement::ClassDef(class) => {
                    self.rename(&mut class.name);
                    self.apply_block(&mut class.body);
                }
                Statement::Return(Some(expr)) => self.apply_expr(expr),
                Statement::Return(None)
                | Statement::Break
                | Statement::Continue
                | Statement::Pass => {}
            }
        }
    }

    fn apply_expr(&self, expr: &mut Expression) {
        match expr {
            Expression::Name(name) => self.rename(name),
            Expression::Literal(_) => {}
            Expression::Binary { left, right, .. } => {
                self.apply_expr(left);
                self.apply_expr(right);
            }
            Expression::Unary { operand, .. } => self.apply_expr(operand),
            Expression::Bool { values, .. } => {
                for value in values {
                    self.apply_expr(value);
                }
            }
            Expression::Compare { left, right, .. } => {
                self.apply_expr(left);
                self.apply_expr(right);
            }
            Expression::Conditional { test, then, orelse } => {
                self.apply_expr(test);
                self.apply_expr(then);
                self.apply_expr(orelse);
            }
            Expression::Call { callee, args } => {
                self.apply_expr(callee);
                for arg in args {
                    self.apply_expr(arg);
                }
            }
            Expression::Lambda { params, body } => {
                for param in params {
                    self.rename(param);
                }
                self.apply_expr(body);
            }
            Expression::List(items) => {
                for item in items {
                    self.apply_expr(item);
                }
            }
            Expression::Dict(entries) => {
                for (key, value) in entries {
                    self.apply_expr(key);
                    self.apply_expr(value);
                }
            }
            Expression::Index { object, index } => {
                self.apply_expr(object);
                self.apply_expr(index);
            }
        }
    }
}

impl Default for IdentifierRenamer {
    fn default() -> Self {
        Self::new()
    }
}

impl ObfuscationPass for IdentifierRenamer {
    fn name(&self) -> &'static str {
        "identifier-rename"
    }

    fn run(
        &mut self,
        program: &mut Program,
        ctx: &mut PassContext,
    ) -> Result<(), ObfuscateError> {
        let mut defined = IndexSet::new();
        Self::collect_block(&program.body, &mut defined);

        self.map = FxHashMap::default();
        for name in &defined {
            let fresh = loop {
                let candidate = Self::random_name(ctx);
                if !ctx.names.contains(&candidate)
                    && !self.map.values().any(|v| v == &candidate)
                {
                    break candidate;
                }
            };
            ctx.names.register(fresh.clone());
            self.map.insert(name.clone(), fresh);
        }

        self.apply_block(&mut program.body);
        debug!(renamed = self.map.len(), "identifiers replaced");
        Ok(())
    }
}
