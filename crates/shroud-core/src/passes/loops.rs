use rand::Rng;
use tracing::debug;

use crate::ast::{
    BinaryOp, CompareOp, Expression, ForLoop, FunctionDef, IfStatement, Program, Statement,
    WhileLoop,
};
use crate::config::LoopStrategy;
use crate::errors::ObfuscateError;
use crate::passes::{ObfuscationPass, PassContext};

/// Candidate additive constants for the Collatz-style advance; the
/// multiplier is excluded so the two never coincide.
const COLLATZ_OFFSETS: [i64; 6] = [-1, 1, 3, 5, 7, 11];

/// States the backward walk only ever doubles from; a contracting step out
/// of one of these would land the walk on a short cycle.
const COLLATZ_EXCLUDED: [i64; 7] = [2, 4, 8, 16, 32, 40, 1312];

/// Beyond this many iterations the mostly-doubling backward walk would leave
/// the 64-bit range, so such loops get the plain lowering instead.
const COLLATZ_MAX_ITERATIONS: i64 = 40;

/// Rewrites counting loops in three stages: nested loops are flattened into
/// auxiliary functions, literal `range(...)` headers are normalized to a
/// zero-based unit-step form, and the normalized loops are lowered to while
/// loops driven either by a plain counter or by Collatz-style state.
pub struct LoopObscurer {
    strategy: LoopStrategy,
    resolve_name: Option<String>,
    lowered: usize,
}

impl LoopObscurer {
    pub fn new(strategy: LoopStrategy) -> Self {
        LoopObscurer {
            strategy,
            resolve_name: None,
            lowered: 0,
        }
    }

    // stage 1: flattening

    fn flatten_block(
        &mut self,
        body: &mut Vec<Statement>,
        extracted: &mut Vec<Statement>,
        ctx: &mut PassContext,
    ) {
        for stmt in body.iter_mut() {
            match stmt {
                Statement::For(for_loop) => {
                    self.flatten_block(&mut for_loop.body, extracted, ctx);
                    self.extract_direct_loops(for_loop, extracted, ctx);
                }
                Statement::While(while_stmt) => {
                    self.flatten_block(&mut while_stmt.body, extracted, ctx)
                }
                Statement::If(if_stmt) => {
                    self.flatten_block(&mut if_stmt.body, extracted, ctx);
                    self.flatten_block(&mut if_stmt.orelse, extracted, ctx);
                }
                Statement::FunctionDef(func) => self.flatten_block(&mut func.body, extracted, ctx),
                Statement::ClassDef(class) => self.flatten_block(&mut class.body, extracted, ctx),
                _ => {}
            }
        }
    }

    /// Replaces each `for` directly inside this loop's body with a call to a
    /// synthesized function holding just that loop. Sibling statements stay
    /// in place, so a `break` or `continue` next to the nested loop keeps its
    /// enclosing loop.
    fn extract_direct_loops(
        &mut self,
        for_loop: &mut ForLoop,
        extracted: &mut Vec<Statement>,
        ctx: &mut PassContext,
    ) {
        let old = std::mem::take(&mut for_loop.body);
        let mut new_body = Vec::with_capacity(old.len());
        for stmt in old {
            if let Statement::For(inner) = stmt {
                let func_name = ctx.names.get_name("__unwrapped_loop");
                extracted.push(Statement::FunctionDef(FunctionDef {
                    name: func_name.clone(),
                    params: vec![for_loop.target.clone()],
                    body: vec![Statement::For(inner)],
                }));
                new_body.push(Statement::Expr(Expression::call_name(
                    func_name,
                    vec![Expression::name(&for_loop.target)],
                )));
            } else {
                new_body.push(stmt);
            }
        }
        for_loop.body = new_body;
    }

    // stage 2: normalization

    fn normalize_block(&mut self, body: &mut [Statement], ctx: &mut PassContext) {
        for stmt in body {
            match stmt {
                Statement::For(for_loop) => {
                    self.normalize_for(for_loop, ctx);
                    self.normalize_block(&mut for_loop.body, ctx);
                }
                Statement::While(while_stmt) => self.normalize_block(&mut while_stmt.body, ctx),
                Statement::If(if_stmt) => {
                    self.normalize_block(&mut if_stmt.body, ctx);
                    self.normalize_block(&mut if_stmt.orelse, ctx);
                }
                Statement::FunctionDef(func) => self.normalize_block(&mut func.body, ctx),
                Statement::ClassDef(class) => self.normalize_block(&mut class.body, ctx),
                _ => {}
            }
        }
    }

    /// `for v in range(start, stop, step)` becomes
    /// `for idx in range(count)` with `v = start + idx * step` prepended.
    fn normalize_for(&mut self, for_loop: &mut ForLoop, ctx: &mut PassContext) {
        let Some((start, stop, step)) = literal_range(&for_loop.iter) else {
            return;
        };
        if step == 0 {
            return;
        }
        let count = ceil_div(stop - start, step).max(0);
        let idx = ctx.names.get_name("__idx");
        let original = std::mem::replace(&mut for_loop.target, idx.clone());
        for_loop.body.insert(
            0,
            Statement::assign(
                original,
                Expression::binary(
                    BinaryOp::Add,
                    Expression::int(start),
                    Expression::binary(
                        BinaryOp::Mul,
                        Expression::name(&idx),
                        Expression::int(step),
                    ),
                ),
            ),
        );
        for_loop.iter = Expression::call_name("range", vec![Expression::int(count)]);
    }

    // stage 3: lowering

    fn lower_block(&mut self, body: &mut Vec<Statement>, ctx: &mut PassContext) {
        let mut result = Vec::with_capacity(body.len());
        for stmt in body.drain(..) {
            match stmt {
                Statement::For(mut for_loop) => {
                    self.lower_block(&mut for_loop.body, ctx);
                    let header = literal_range(&for_loop.iter).filter(|(_, _, step)| *step != 0);
                    match header {
                        Some((start, stop, step)) => {
                            let count = ceil_div(stop - start, step).max(0);
                            let use_collatz = self.strategy == LoopStrategy::Collatz
                                && count <= COLLATZ_MAX_ITERATIONS;
                            if use_collatz {
                                result.extend(self.collatz_lowering(
                                    for_loop,
                                    (start, step),
                                    count,
                                    ctx,
                                ));
                            } else {
                                result.extend(plain_lowering(for_loop, start, stop, step));
                            }
                            self.lowered += 1;
                        }
                        None => result.push(Statement::For(for_loop)),
                    }
                }
                Statement::While(mut while_stmt) => {
                    self.lower_block(&mut while_stmt.body, ctx);
                    result.push(Statement::While(while_stmt));
                }
                Statement::If(mut if_stmt) => {
                    self.lower_block(&mut if_stmt.body, ctx);
                    self.lower_block(&mut if_stmt.orelse, ctx);
                    result.push(Statement::If(if_stmt));
                }
                Statement::FunctionDef(mut func) => {
                    self.lower_block(&mut func.body, ctx);
                    result.push(Statement::FunctionDef(func));
                }
                Statement::ClassDef(mut class) => {
                    self.lower_block(&mut class.body, ctx);
                    result.push(Statement::ClassDef(class));
                }
                other => result.push(other),
            }
        }
        *body = result;
    }

    fn collatz_lowering(
        &mut self,
        for_loop: ForLoop,
        (start, step): (i64, i64),
        count: i64,
        ctx: &mut PassContext,
    ) -> Vec<Statement> {
        let (a, b, seed, target) = collatz_params(count, ctx);
        let num = ctx.names.get_name("__num");
        let resolve = self.resolve(ctx);

        let index = Expression::call_name(
            resolve,
            vec![
                Expression::name(&num),
                Expression::int(target),
                Expression::int(a),
                Expression::int(b),
            ],
        );
        let value = if start == 0 && step == 1 {
            index
        } else {
            Expression::binary(
                BinaryOp::Add,
                Expression::int(start),
                Expression::binary(BinaryOp::Mul, index, Expression::int(step)),
            )
        };

        let mut body = vec![Statement::assign(for_loop.target, value)];
        body.extend(for_loop.body);
        body.push(Statement::If(IfStatement {
            test: Expression::compare(
                CompareOp::Eq,
                Expression::binary(BinaryOp::Mod, Expression::name(&num), Expression::int(2)),
                Expression::int(0),
            ),
            body: vec![Statement::assign(
                num.clone(),
                Expression::binary(
                    BinaryOp::FloorDiv,
                    Expression::name(&num),
                    Expression::int(2),
                ),
            )],
            orelse: vec![Statement::assign(
                num.clone(),
                Expression::binary(
                    BinaryOp::Add,
                    Expression::binary(BinaryOp::Mul, Expression::int(a), Expression::name(&num)),
                    Expression::int(b),
                ),
            )],
        }));

        vec![
            Statement::assign(num.clone(), Expression::int(target)),
            Statement::While(WhileLoop {
                test: Expression::compare(
                    CompareOp::Ne,
                    Expression::name(&num),
                    Expression::int(seed),
                ),
                body,
            }),
        ]
    }

    fn resolve(&mut self, ctx: &mut PassContext) -> String {
        self.resolve_name
            .get_or_insert_with(|| ctx.names.get_name("__resolve"))
            .clone()
    }

    /// Counts forward steps from `origin` to `cur`; every lowered loop in
    /// the run shares this one definition.
    fn resolve_def(&self, name: String, ctx: &mut PassContext) -> FunctionDef {
        let cur = ctx.names.get_name("__g");
        let origin = ctx.names.get_name("__h");
        let a = ctx.names.get_name("__m");
        let b = ctx.names.get_name("__k");
        let cnt = ctx.names.get_name("__e");
        let probe = ctx.names.get_name("__w");

        let body = vec![
            Statement::assign(cnt.clone(), Expression::int(0)),
            Statement::assign(probe.clone(), Expression::name(&origin)),
            Statement::While(WhileLoop {
                test: Expression::compare(
                    CompareOp::Ne,
                    Expression::name(&probe),
                    Expression::name(&cur),
                ),
                body: vec![
                    Statement::If(IfStatement {
                        test: Expression::compare(
                            CompareOp::Eq,
                            Expression::binary(
                                BinaryOp::Mod,
                                Expression::name(&probe),
                                Expression::int(2),
                            ),
                            Expression::int(0),
                        ),
                        body: vec![Statement::assign(
                            probe.clone(),
                            Expression::binary(
                                BinaryOp::FloorDiv,
                                Expression::name(&probe),
                                Expression::int(2),
                            ),
                        )],
                        orelse: vec![Statement::assign(
                            probe.clone(),
                            Expression::binary(
                                BinaryOp::Add,
                                Expression::binary(
                                    BinaryOp::Mul,
                                    Expression::name(&a),
                                    Expression::name(&probe),
                                ),
                                Expression::name(&b),
                            ),
                        )],
                    }),
                    Statement::aug_assign(cnt.clone(), BinaryOp::Add, Expression::int(1)),
                ],
            }),
            Statement::Return(Some(Expression::name(&cnt))),
        ];
        FunctionDef {
            name,
            params: vec![cur, origin, a, b],
            body,
        }
    }
}

/// `(multiplier, offset, seed, target)` such that the forward map
/// (halve when even, `a*n + b` when odd) walks from `target` to `seed` in
/// exactly `count` steps.
fn collatz_params(count: i64, ctx: &mut PassContext) -> (i64, i64, i64, i64) {
    let a = if ctx.rng.gen_bool(0.5) { 3 } else { 5 };
    let b = loop {
        let candidate = COLLATZ_OFFSETS[ctx.rng.gen_range(0..COLLATZ_OFFSETS.len())];
        if candidate != a {
            break candidate;
        }
    };
    let seed: i64 = ctx.rng.gen_range(19..=97);

    let mut state = seed;
    for _ in 0..count {
        let mut doubled = true;
        if ctx.rng.gen::<f64>() > 0.95
            && !COLLATZ_EXCLUDED.contains(&state)
            && (state - b) % a == 0
        {
            let q = (state - b) / a;
            if q > 0 && q % 2 == 1 {
                state = q;
                doubled = false;
            }
        }
        if doubled {
            state *= 2;
        }
    }
    (a, b, seed, state)
}

fn plain_lowering(for_loop: ForLoop, start: i64, stop: i64, step: i64) -> Vec<Statement> {
    let target = for_loop.target;
    let (test_op, advance_op) = if step > 0 {
        (CompareOp::Lt, BinaryOp::Add)
    } else {
        (CompareOp::Gt, BinaryOp::Sub)
    };
    let mut body = for_loop.body;
    body.push(Statement::aug_assign(
        target.clone(),
        advance_op,
        Expression::int(step.abs()),
    ));
    vec![
        Statement::assign(target.clone(), Expression::int(start)),
        Statement::While(WhileLoop {
            test: Expression::compare(test_op, Expression::name(&target), Expression::int(stop)),
            body,
        }),
    ]
}

/// `(start, stop, step)` when the iterable is `range(...)` over integer
/// literals; anything else is not this pass's business.
fn literal_range(iter: &Expression) -> Option<(i64, i64, i64)> {
    let Expression::Call { callee, args } = iter else {
        return None;
    };
    let Expression::Name(name) = callee.as_ref() else {
        return None;
    };
    if name != "range" || args.is_empty() || args.len() > 3 {
        return None;
    }
    let values: Vec<i64> = args
        .iter()
        .map(Expression::as_int_literal)
        .collect::<Option<_>>()?;
    Some(match values.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("length checked above"),
    })
}

/// Ceiling division with exact behavior on negative operands.
fn ceil_div(n: i64, d: i64) -> i64 {
    let q = n / d;
    if n % d != 0 && ((n < 0) == (d < 0)) {
        q + 1
    } else {
        q
    }
}

impl ObfuscationPass for LoopObscurer {
    fn name(&self) -> &'static str {
        "loop-obscure"
    }

    fn run(
        &mut self,
        program: &mut Program,
        ctx: &mut PassContext,
    ) -> Result<(), ObfuscateError> {
        self.lowered = 0;

        let mut extracted = Vec::new();
        self.flatten_block(&mut program.body, &mut extracted, ctx);
        let flattened = extracted.len();
        for (i, func) in extracted.into_iter().enumerate() {
            program.body.insert(i, func);
        }

        self.normalize_block(&mut program.body, ctx);
        self.lower_block(&mut program.body, ctx);

        if let Some(name) = self.resolve_name.take() {
            let def = self.resolve_def(name, ctx);
            program.body.insert(0, Statement::FunctionDef(def));
        }
        debug!(flattened, lowered = self.lowered, "loops rewritten");
        Ok(())
    }
}
