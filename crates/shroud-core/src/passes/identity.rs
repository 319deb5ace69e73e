use rand::Rng;
use tracing::debug;

use crate::ast::{Expression, Literal, Program, Statement};
use crate::config::IdentityStrategy;
use crate::errors::ObfuscateError;
use crate::passes::{ObfuscationPass, PassContext};

/// Wraps name reads and literals in value-preserving expressions.
///
/// Wrappers are never re-entered, so a wrapped node gains exactly one layer
/// per run. Operands are duplicated only when they are names or literals,
/// which cannot have side effects.
pub struct IdentityInjector {
    chance: f64,
    strategy: IdentityStrategy,
    wrapped: usize,
}

impl IdentityInjector {
    pub fn new(chance: f64, strategy: IdentityStrategy) -> Self {
        IdentityInjector {
            chance: chance.clamp(0.0, 1.0),
            strategy,
            wrapped: 0,
        }
    }

    fn rewrite_block(&mut self, body: &mut [Statement], ctx: &mut PassContext) {
        for stmt in body {
            match stmt {
                Statement::Assign(assign) => self.rewrite_expr(&mut assign.value, ctx),
                Statement::AugAssign(assign) => self.rewrite_expr(&mut assign.value, ctx),
                Statement::Expr(expr) => self.rewrite_expr(expr, ctx),
                Statement::If(if_stmt) => {
                    self.rewrite_expr(&mut if_stmt.test, ctx);
                    self.rewrite_block(&mut if_stmt.body, ctx);
                    self.rewrite_block(&mut if_stmt.orelse, ctx);
                }
                Statement::While(while_stmt) => {
                    self.rewrite_expr(&mut while_stmt.test, ctx);
                    self.rewrite_block(&mut while_stmt.body, ctx);
                }
                Statement::For(for_stmt) => {
                    self.rewrite_expr(&mut for_stmt.iter, ctx);
                    self.rewrite_block(&mut for_stmt.body, ctx);
                }
                Statement::FunctionDef(func) => self.rewrite_block(&mut func.body, ctx),
                Statement::ClassDef(class) => self.rewrite_block(&mut class.body, ctx),
                Statement::Return(Some(expr)) => self.rewrite_expr(expr, ctx),
                Statement::Return(None)
                | Statement::Break
                | Statement::Continue
                | Statement::Pass => {}
            }
        }
    }

    /// Children first; the node itself is wrapped last so the wrapper is
    /// never revisited.
    fn rewrite_expr(&mut self, expr: &mut Expression, ctx: &mut PassContext) {
        match expr {
            Expression::Name(_) | Expression::Literal(_) => {}
            Expression::Binary { left, right, .. } => {
                self.rewrite_expr(left, ctx);
                self.rewrite_expr(right, ctx);
            }
            Expression::Unary { operand, .. } => self.rewrite_expr(operand, ctx),
            Expression::Bool { values, .. } => {
                for value in values {
                    self.rewrite_expr(value, ctx);
                }
            }
            Expression::Compare { left, right, .. } => {
                self.rewrite_expr(left, ctx);
                self.rewrite_expr(right, ctx);
            }
            Expression::Conditional { test, then, orelse } => {
                self.rewrite_expr(test, ctx);
                self.rewrite_expr(then, ctx);
                self.rewrite_expr(orelse, ctx);
            }
            Expression::Call { callee, args } => {
                self.rewrite_expr(callee, ctx);
                for arg in args {
                    self.rewrite_expr(arg, ctx);
                }
            }
            Expression::Lambda { body, .. } => self.rewrite_expr(body, ctx),
            Expression::List(items) => {
                for item in items {
                    self.rewrite_expr(item, ctx);
                }
            }
            Expression::Dict(entries) => {
                for (key, value) in entries {
                    self.rewrite_expr(key, ctx);
                    self.rewrite_expr(value, ctx);
                }
            }
            Expression::Index { object, index } => {
                self.rewrite_expr(object, ctx);
                self.rewrite_expr(index, ctx);
            }
        }
        if wrappable(expr) && ctx.rng.gen_bool(self.chance) {
            let inner = std::mem::replace(expr, Expression::Literal(Literal::None));
            *expr = self.wrap(inner, ctx);
            self.wrapped += 1;
        }
    }

    fn wrap(&self, expr: Expression, ctx: &mut PassContext) -> Expression {
        let strategy = match self.strategy {
            IdentityStrategy::Mixed => match ctx.rng.gen_range(0..5) {
                0 => IdentityStrategy::OrSelf,
                1 => IdentityStrategy::Conditional,
                2 => IdentityStrategy::Lambda,
                3 => IdentityStrategy::ListIndex,
                _ => IdentityStrategy::DictKey,
            },
            fixed => fixed,
        };
        match strategy {
            IdentityStrategy::AndTrue => Expression::and(vec![Expression::int(1), expr]),
            IdentityStrategy::OrSelf => {
                let copy = Expression::and(vec![expr.clone(), expr.clone()]);
                Expression::or(vec![expr, copy])
            }
            IdentityStrategy::Conditional => {
                Expression::conditional(Expression::bool(true), expr, Expression::int(0))
            }
            IdentityStrategy::Lambda => {
                let param = ctx.names.get_name("__i");
                let identity = Expression::Lambda {
                    params: vec![param.clone()],
                    body: Box::new(Expression::name(param)),
                };
                Expression::call(identity, vec![expr])
            }
            IdentityStrategy::ListIndex => {
                Expression::index(Expression::List(vec![expr]), Expression::int(0))
            }
            IdentityStrategy::DictKey => Expression::index(
                Expression::Dict(vec![(Expression::str("k"), expr)]),
                Expression::str("k"),
            ),
            IdentityStrategy::Mixed => unreachable!("mixed resolves to a concrete strategy"),
        }
    }
}

fn wrappable(expr: &Expression) -> bool {
    matches!(expr, Expression::Name(_) | Expression::Literal(_))
}

impl ObfuscationPass for IdentityInjector {
    fn name(&self) -> &'static str {
        "identity-injection"
    }

    fn run(
        &mut self,
        program: &mut Program,
        ctx: &mut PassContext,
    ) -> Result<(), ObfuscateError> {
        self.wrapped = 0;
        self.rewrite_block(&mut program.body, ctx);
        debug!(wrapped = self.wrapped, "expressions wrapped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Interpreter;
    use crate::parser::parse;
    use indoc::indoc;

    fn outputs(program: &Program) -> Vec<String> {
        let mut interp = Interpreter::new();
        interp.run(program).unwrap();
        interp.output().to_vec()
    }

    fn check_inert(source: &str, strategy: IdentityStrategy, seed: u64) {
        let original = parse(source).unwrap();
        let mut mutated = original.clone();
        let mut ctx = PassContext::for_program(&mutated, seed);
        IdentityInjector::new(1.0, strategy)
            .run(&mut mutated, &mut ctx)
            .unwrap();
        assert_ne!(original, mutated, "full probability must rewrite something");
        assert_eq!(outputs(&original), outputs(&mutated));
    }

    const SAMPLE: &str = indoc! {"
        def scale(n, factor):
            return n * factor
        items = [1, 2, 3]
        total = 0
        for i in range(len(items)):
            total += scale(items[i], 2)
        if total > 10:
            print('large', total)
        else:
            print('small', total)
    "};

    #[test]
    fn each_strategy_preserves_behavior() {
        for strategy in [
            IdentityStrategy::AndTrue,
            IdentityStrategy::OrSelf,
            IdentityStrategy::Conditional,
            IdentityStrategy::Lambda,
            IdentityStrategy::ListIndex,
            IdentityStrategy::DictKey,
        ] {
            check_inert(SAMPLE, strategy, 17);
        }
    }

    #[test]
    fn mixed_strategy_preserves_behavior_across_seeds() {
        for seed in 0..8 {
            check_inert(SAMPLE, IdentityStrategy::Mixed, seed);
        }
    }

    #[test]
    fn wrapped_callee_still_calls() {
        let mut program = parse("print(7)\n").unwrap();
        let mut ctx = PassContext::for_program(&program, 5);
        IdentityInjector::new(1.0, IdentityStrategy::ListIndex)
            .run(&mut program, &mut ctx)
            .unwrap();
        assert_eq!(outputs(&program), ["7"]);
    }
}
