use rand::Rng;
use tracing::debug;

use crate::ast::{BinaryOp, Expression, ForLoop, Program, Statement};
use crate::errors::ObfuscateError;
use crate::passes::{ObfuscationPass, PassContext};

/// Injects do-nothing statements over a pool of dedicated scratch variables.
///
/// The pool is declared once at the top of the program; every injected
/// statement reads and writes only pool members, so program-visible state is
/// never touched.
pub struct JunkInjector {
    sweeps: u32,
    chance: f64,
}

impl JunkInjector {
    /// Standard construction: `passes` sweeps, each injecting at a site with
    /// probability `0.3 / passes`.
    pub fn new(passes: u32) -> Self {
        let sweeps = passes.max(1);
        JunkInjector {
            sweeps,
            chance: 0.3 / sweeps as f64,
        }
    }

    /// Single sweep with an explicit per-site probability.
    pub fn with_chance(chance: f64) -> Self {
        JunkInjector {
            sweeps: 1,
            chance: chance.clamp(0.0, 1.0),
        }
    }

    fn inject_block(
        &self,
        body: &mut Vec<Statement>,
        scratch: &[String],
        ctx: &mut PassContext,
    ) -> usize {
        let mut injected = 0;
        let mut result = Vec::with_capacity(body.len());
        for mut stmt in body.drain(..) {
            match &mut stmt {
                Statement::FunctionDef(func) => {
                    injected += self.inject_block(&mut func.body, scratch, ctx);
                }
                Statement::ClassDef(class) => {
                    for member in &mut class.body {
                        if let Statement::FunctionDef(func) = member {
                            injected += self.inject_block(&mut func.body, scratch, ctx);
                        }
                    }
                }
                _ => {}
            }
            injected += self.roll_site(&mut result, scratch, ctx);
            result.push(stmt);
            injected += self.roll_site(&mut result, scratch, ctx);
        }
        *body = result;
        injected
    }

    /// One injection site: each strategy rolls independently.
    fn roll_site(
        &self,
        out: &mut Vec<Statement>,
        scratch: &[String],
        ctx: &mut PassContext,
    ) -> usize {
        let mut injected = 0;
        for strategy in [
            Strategy::Arithmetic,
            Strategy::Lambda,
            Strategy::Bitwise,
            Strategy::Loop,
        ] {
            if ctx.rng.gen_bool(self.chance) {
                out.push(self.make_junk(strategy, scratch, ctx));
                injected += 1;
            }
        }
        injected
    }

    fn make_junk(
        &self,
        strategy: Strategy,
        scratch: &[String],
        ctx: &mut PassContext,
    ) -> Statement {
        let target = pick(scratch, ctx).to_string();
        let source = pick(scratch, ctx).to_string();
        match strategy {
            Strategy::Arithmetic => {
                let k = ctx.rng.gen_range(1..=9);
                // The divisor operand is always the literal, so the value
                // read from the pool can never divide by zero.
                let expr = match ctx.rng.gen_range(0..4) {
                    0 => Expression::binary(BinaryOp::Add, Expression::name(source), Expression::int(k)),
                    1 => Expression::binary(BinaryOp::Sub, Expression::name(source), Expression::int(k)),
                    2 => Expression::binary(BinaryOp::Mul, Expression::name(source), Expression::int(k)),
                    _ => Expression::binary(
                        BinaryOp::FloorDiv,
                        Expression::name(source),
                        Expression::int(k),
                    ),
                };
                let expr = if ctx.rng.gen_bool(0.5) {
                    Expression::unary(
                        crate::ast::UnaryOp::Neg,
                        Expression::unary(crate::ast::UnaryOp::Neg, expr),
                    )
                } else {
                    expr
                };
                Statement::assign(target, expr)
            }
            Strategy::Lambda => {
                let param = ctx.names.get_name("__p");
                let identity = Expression::Lambda {
                    params: vec![param.clone()],
                    body: Box::new(Expression::name(param)),
                };
                Statement::assign(
                    target,
                    Expression::call(identity, vec![Expression::name(source)]),
                )
            }
            Strategy::Bitwise => {
                let k = ctx.rng.gen_range(1..=3);
                let op = match ctx.rng.gen_range(0..5) {
                    0 => BinaryOp::BitAnd,
                    1 => BinaryOp::BitOr,
                    2 => BinaryOp::BitXor,
                    3 => BinaryOp::Shl,
                    _ => BinaryOp::Shr,
                };
                Statement::assign(
                    target,
                    Expression::binary(op, Expression::name(source), Expression::int(k)),
                )
            }
            Strategy::Loop => {
                let iterations = ctx.rng.gen_range(3..=6);
                let counter = ctx.names.get_name(&format!("{target}_cnt"));
                Statement::For(ForLoop {
                    target: counter,
                    iter: Expression::call_name("range", vec![Expression::int(iterations)]),
                    body: vec![Statement::aug_assign(
                        target,
                        BinaryOp::Add,
                        Expression::int(1),
                    )],
                })
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Strategy {
    Arithmetic,
    Lambda,
    Bitwise,
    Loop,
}

fn pick<'a>(scratch: &'a [String], ctx: &mut PassContext) -> &'a str {
    &scratch[ctx.rng.gen_range(0..scratch.len())]
}

impl ObfuscationPass for JunkInjector {
    fn name(&self) -> &'static str {
        "junk-injection"
    }

    fn run(
        &mut self,
        program: &mut Program,
        ctx: &mut PassContext,
    ) -> Result<(), ObfuscateError> {
        let pool_size = ctx.rng.gen_range(3..=5);
        let scratch: Vec<String> = (0..pool_size)
            .map(|_| ctx.names.get_name("__junk"))
            .collect();

        let mut injected = 0;
        for _ in 0..self.sweeps {
            injected += self.inject_block(&mut program.body, &scratch, ctx);
        }

        // Pool declarations go first so every injected read is defined.
        for (i, name) in scratch.iter().enumerate() {
            program
                .body
                .insert(i, Statement::assign(name.clone(), Expression::int(1)));
        }
        debug!(injected, pool_size, "junk statements inserted");
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
    fn pool_is_declared_before_everything_else() {
        let mut program = parse("x = 10\nprint(x)\n").unwrap();
        let mut ctx = PassContext::for_program(&program, 7);
        JunkInjector::with_chance(1.0)
            .run(&mut program, &mut ctx)
            .unwrap();
        for stmt in program.body.iter().take(3) {
            match stmt {
                Statement::Assign(assign) => {
                    assert!(assign.target.starts_with("__junk"));
                    assert_eq!(assign.value, Expression::int(1));
                }
                other => panic!("expected pool declaration, got {other:?}"),
            }
        }
    }

    #[test]
    fn injection_preserves_behavior_at_full_probability() {
        let source = indoc! {"
            def triple(n):
                return n * 3
            total = 0
            for i in range(4):
                total += triple(i)
            print(total)
        "};
        let original = parse(source).unwrap();
        let mut mutated = original.clone();
        let mut ctx = PassContext::for_program(&mutated, 99);
        JunkInjector::with_chance(1.0)
            .run(&mut mutated, &mut ctx)
            .unwrap();
        assert!(mutated.body.len() > original.body.len());
        assert_eq!(outputs(&original), outputs(&mutated));
    }

    #[test]
    fn zero_chance_only_adds_the_pool() {
        let mut program = parse("a = 1\nb = 2\n").unwrap();
        let before = program.body.len();
        let mut ctx = PassContext::for_program(&program, 3);
        JunkInjector::with_chance(0.0)
            .run(&mut program, &mut ctx)
            .unwrap();
        let pool = program.body.len() - before;
        assert!((3..=5).contains(&pool));
    }
}
