use rand::Rng;
use tracing::debug;

use crate::ast::{BinaryOp, CompareOp, Expression, IfStatement, Program, Statement, UnaryOp};
use crate::errors::ObfuscateError;
use crate::passes::{ObfuscationPass, PassContext};

/// Wraps top-level statements in branches whose outcome is fixed.
///
/// A wrapped statement either sits in the body of an always-true test or in
/// the else arm of an always-false one; the untaken arm holds a decoy. Only
/// the program's top level is rewritten.
pub struct ConditionalInjector {
    sweeps: u32,
    chance: f64,
}

impl ConditionalInjector {
    pub fn new(passes: u32) -> Self {
        let sweeps = passes.max(1);
        ConditionalInjector {
            sweeps,
            chance: 0.3 / sweeps as f64,
        }
    }

    pub fn with_chance(chance: f64) -> Self {
        ConditionalInjector {
            sweeps: 1,
            chance: chance.clamp(0.0, 1.0),
        }
    }

    fn wrap(&self, stmt: Statement, ctx: &mut PassContext) -> Statement {
        if ctx.rng.gen_bool(0.5) {
            Statement::If(IfStatement {
                test: truthy_test(ctx),
                body: vec![stmt],
                orelse: vec![Statement::Pass],
            })
        } else {
            Statement::If(IfStatement {
                test: falsy_test(ctx),
                body: vec![Statement::Pass],
                orelse: vec![stmt],
            })
        }
    }
}

/// An expression that is always truthy without being a bare `True`.
fn truthy_test(ctx: &mut PassContext) -> Expression {
    match ctx.rng.gen_range(0..5) {
        0 => nested_list(),
        1 => xor_constant(),
        2 => Expression::compare(CompareOp::Ge, Expression::int(3), Expression::int(2)),
        3 => Expression::and(vec![nested_list(), xor_constant()]),
        _ => Expression::unary(
            UnaryOp::Not,
            Expression::unary(UnaryOp::Not, Expression::bool(true)),
        ),
    }
}

fn falsy_test(ctx: &mut PassContext) -> Expression {
    match ctx.rng.gen_range(0..3) {
        0 => Expression::bool(false),
        1 => Expression::compare(CompareOp::Lt, Expression::int(1), Expression::int(0)),
        _ => Expression::unary(UnaryOp::Not, Expression::bool(true)),
    }
}

/// `[[1], []]`: non-empty, so truthy.
fn nested_list() -> Expression {
    Expression::List(vec![
        Expression::List(vec![Expression::int(1)]),
        Expression::List(vec![]),
    ])
}

/// `12 ^ 4` is 8, so truthy.
fn xor_constant() -> Expression {
    Expression::binary(BinaryOp::BitXor, Expression::int(12), Expression::int(4))
}

impl ObfuscationPass for ConditionalInjector {
    fn name(&self) -> &'static str {
        "conditional-injection"
    }

    fn run(
        &mut self,
        program: &mut Program,
        ctx: &mut PassContext,
    ) -> Result<(), ObfuscateError> {
        let mut wrapped = 0;
        for _ in 0..self.sweeps {
            let body = std::mem::take(&mut program.body);
            program.body = body
                .into_iter()
                .map(|stmt| {
                    if ctx.rng.gen_bool(self.chance) {
                        wrapped += 1;
                        self.wrap(stmt, ctx)
                    } else {
                        stmt
                    }
                })
                .collect();
        }
        debug!(wrapped, "statements wrapped in fixed-outcome branches");
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

    #[test]
    fn every_statement_gets_wrapped_at_full_probability() {
        let mut program = parse("a = 1\nb = 2\nprint(a + b)\n").unwrap();
        let mut ctx = PassContext::for_program(&program, 11);
        ConditionalInjector::with_chance(1.0)
            .run(&mut program, &mut ctx)
            .unwrap();
        assert_eq!(program.body.len(), 3);
        assert!(program
            .body
            .iter()
            .all(|stmt| matches!(stmt, Statement::If(_))));
    }

    #[test]
    fn wrapping_preserves_behavior() {
        let source = indoc! {"
            x = 5
            if x > 3:
                print('big')
            else:
                print('small')
            print(x * 2)
        "};
        let original = parse(source).unwrap();
        for seed in [1u64, 2, 3, 4, 5] {
            let mut mutated = original.clone();
            let mut ctx = PassContext::for_program(&mutated, seed);
            ConditionalInjector::with_chance(1.0)
                .run(&mut mutated, &mut ctx)
                .unwrap();
            assert_eq!(outputs(&original), outputs(&mutated));
        }
    }

    #[test]
    fn nested_bodies_are_left_alone() {
        let source = indoc! {"
            def f():
                a = 1
                return a
            print(f())
        "};
        let mut program = parse(source).unwrap();
        let mut ctx = PassContext::for_program(&program, 2);
        ConditionalInjector::with_chance(1.0)
            .run(&mut program, &mut ctx)
            .unwrap();
        let Statement::If(wrapper) = &program.body[0] else {
            panic!("top-level def should be wrapped");
        };
        let inner = wrapper
            .body
            .iter()
            .chain(&wrapper.orelse)
            .find_map(|stmt| match stmt {
                Statement::FunctionDef(func) => Some(func),
                _ => None,
            })
            .expect("function must survive inside the wrapper");
        assert!(matches!(inner.body[0], Statement::Assign(_)));
    }
}
