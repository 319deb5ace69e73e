use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::ast::{
    BinaryOp, Expression, FunctionDef, Literal, Program, Statement, WhileLoop,
};
use crate::config::NumberSchemeKind;
use crate::errors::ObfuscateError;
use crate::passes::{ObfuscationPass, PassContext};

const FEISTEL_KEY: u64 = 0xB2CB;
const MASK16: u64 = 0xFFFF;
const MASK32: u64 = 0xFFFF_FFFF;

/// Replaces integer literals with calls into a synthesized decoder function.
///
/// Each run applies one scheme and prepends at most one decoder. Running the
/// pass again layers a second scheme over the first decoder's own constants.
pub struct NumberObscurer {
    kind: NumberSchemeKind,
    rounds: u32,
}

impl NumberObscurer {
    pub fn new(kind: NumberSchemeKind, rounds: u32) -> Self {
        NumberObscurer { kind, rounds }
    }
}

/// One way of scrambling an integer literal together with the runtime
/// decoder that undoes it.
pub trait NumberScheme {
    fn kind(&self) -> &'static str;

    /// Replacement expression for the literal, or `None` when the value is
    /// outside the scheme's domain and must pass through untouched.
    fn encode(&self, value: i64, decoder: &str, rng: &mut StdRng) -> Option<Expression>;

    /// The decoder definition, or `None` for schemes that need no runtime
    /// support. Local names are minted from the registry so they can never
    /// shadow a program binding.
    fn decoder(&self, name: &str, ctx: &mut PassContext) -> Option<FunctionDef>;
}

impl ObfuscationPass for NumberObscurer {
    fn name(&self) -> &'static str {
        "number-obscure"
    }

    fn run(
        &mut self,
        program: &mut Program,
        ctx: &mut PassContext,
    ) -> Result<(), ObfuscateError> {
        let scheme: Box<dyn NumberScheme> = match self.kind {
            NumberSchemeKind::Identity => Box::new(IdentityScheme),
            NumberSchemeKind::Feistel => Box::new(FeistelScheme::new()),
            NumberSchemeKind::FeistelRandom => {
                Box::new(RandomFeistelScheme::sample(self.rounds, &mut ctx.rng))
            }
            NumberSchemeKind::XorString => Box::new(XorStringScheme),
        };
        let decoder_name = ctx.names.get_name("__decode");

        let mut encoded = 0usize;
        for stmt in &mut program.body {
            rewrite_statement(stmt, scheme.as_ref(), &decoder_name, &mut ctx.rng, &mut encoded);
        }

        if encoded > 0 {
            if let Some(decoder) = scheme.decoder(&decoder_name, ctx) {
                program.body.insert(0, Statement::FunctionDef(decoder));
            }
        }
        debug!(scheme = scheme.kind(), encoded, "integer literals rewritten");
        Ok(())
    }
}

fn rewrite_statement(
    stmt: &mut Statement,
    scheme: &dyn NumberScheme,
    decoder: &str,
    rng: &mut StdRng,
    encoded: &mut usize,
) {
    match stmt {
        Statement::Assign(assign) => rewrite_expr(&mut assign.value, scheme, decoder, rng, encoded),
        Statement::AugAssign(assign) => {
            rewrite_expr(&mut assign.value, scheme, decoder, rng, encoded)
        }
        Statement::Expr(expr) => rewrite_expr(expr, scheme, decoder, rng, encoded),
        Statement::If(if_stmt) => {
            rewrite_expr(&mut if_stmt.test, scheme, decoder, rng, encoded);
            for s in if_stmt.body.iter_mut().chain(&mut if_stmt.orelse) {
                rewrite_statement(s, scheme, decoder, rng, encoded);
            }
        }
        Statement::While(while_stmt) => {
            rewrite_expr(&mut while_stmt.test, scheme, decoder, rng, encoded);
            for s in &mut while_stmt.body {
                rewrite_statement(s, scheme, decoder, rng, encoded);
            }
        }
        Statement::For(for_stmt) => {
            rewrite_expr(&mut for_stmt.iter, scheme, decoder, rng, encoded);
            for s in &mut for_stmt.body {
                rewrite_statement(s, scheme, decoder, rng, encoded);
            }
        }
        Statement::FunctionDef(func) => {
            for s in &mut func.body {
                rewrite_statement(s, scheme, decoder, rng, encoded);
            }
        }
        Statement::ClassDef(class) => {
            for s in &mut class.body {
                rewrite_statement(s, scheme, decoder, rng, encoded);
            }
        }
        Statement::Return(Some(expr)) => rewrite_expr(expr, scheme, decoder, rng, encoded),
        Statement::Return(None) | Statement::Break | Statement::Continue | Statement::Pass => {}
    }
}

fn rewrite_expr(
    expr: &mut Expression,
    scheme: &dyn NumberScheme,
    decoder: &str,
    rng: &mut StdRng,
    encoded: &mut usize,
) {
    match expr {
        Expression::Literal(Literal::Int(value)) => {
            if let Some(replacement) = scheme.encode(*value, decoder, rng) {
                *expr = replacement;
                *encoded += 1;
            }
        }
        Expression::Literal(_) | Expression::Name(_) => {}
        Expression::Binary { left, right, .. } => {
            rewrite_expr(left, scheme, decoder, rng, encoded);
            rewrite_expr(right, scheme, decoder, rng, encoded);
        }
        Expression::Unary { operand, .. } => rewrite_expr(operand, scheme, decoder, rng, encoded),
        Expression::Bool { values, .. } => {
            for value in values {
                rewrite_expr(value, scheme, decoder, rng, encoded);
            }
        }
        Expression::Compare { left, right, .. } => {
            rewrite_expr(left, scheme, decoder, rng, encoded);
            rewrite_expr(right, scheme, decoder, rng, encoded);
        }
        Expression::Conditional { test, then, orelse } => {
            rewrite_expr(test, scheme, decoder, rng, encoded);
            rewrite_expr(then, scheme, decoder, rng, encoded);
            rewrite_expr(orelse, scheme, decoder, rng, encoded);
        }
        Expression::Call { callee, args } => {
            rewrite_expr(callee, scheme, decoder, rng, encoded);
            for arg in args {
                rewrite_expr(arg, scheme, decoder, rng, encoded);
            }
        }
        Expression::Lambda { body, .. } => rewrite_expr(body, scheme, decoder, rng, encoded),
        Expression::List(items) => {
            for item in items {
                rewrite_expr(item, scheme, decoder, rng, encoded);
            }
        }
        Expression::Dict(entries) => {
            for (key, value) in entries {
                rewrite_expr(key, scheme, decoder, rng, encoded);
                rewrite_expr(value, scheme, decoder, rng, encoded);
            }
        }
        Expression::Index { object, index } => {
            rewrite_expr(object, scheme, decoder, rng, encoded);
            rewrite_expr(index, scheme, decoder, rng, encoded);
        }
    }
}

/// Pass-through scheme; exists so a stage can be disabled without changing
/// the pipeline shape.
pub struct IdentityScheme;

impl NumberScheme for IdentityScheme {
    fn kind(&self) -> &'static str {
        "identity"
    }

    fn encode(&self, _value: i64, _decoder: &str, _rng: &mut StdRng) -> Option<Expression> {
        None
    }

    fn decoder(&self, _name: &str, _ctx: &mut PassContext) -> Option<FunctionDef> {
        None
    }
}

fn rotl3(x: u64) -> u64 {
    ((x << 3) | (x >> 13)) & MASK16
}

/// Four-round Feistel network over the 32-bit domain with a fixed key.
pub struct FeistelScheme {
    rounds: u32,
}

impl FeistelScheme {
    pub fn new() -> Self {
        FeistelScheme { rounds: 4 }
    }

    pub fn encode_value(&self, value: u64) -> u64 {
        let mut l = (value >> 16) & MASK16;
        let mut r = value & MASK16;
        for _ in 0..self.rounds {
            let f = rotl3(r ^ FEISTEL_KEY);
            let next = (l ^ f) & MASK16;
            l = r;
            r = next;
        }
        (l << 16) | r
    }

    pub fn decode_value(&self, value: u64) -> u64 {
        let mut l = (value >> 16) & MASK16;
        let mut r = value & MASK16;
        for _ in 0..self.rounds {
            let f = rotl3(l ^ FEISTEL_KEY);
            let p = r ^ f;
            r = l;
            l = p;
        }
        ((l << 16) | r) & MASK32
    }
}

impl Default for FeistelScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl NumberScheme for FeistelScheme {
    fn kind(&self) -> &'static str {
        "feistel"
    }

    fn encode(&self, value: i64, decoder: &str, _rng: &mut StdRng) -> Option<Expression> {
        if !(0..=MASK32 as i64).contains(&value) {
            return None;
        }
        let enc = self.encode_value(value as u64);
        Some(Expression::call_name(
            decoder,
            vec![Expression::int(enc as i64)],
        ))
    }

    fn decoder(&self, name: &str, ctx: &mut PassContext) -> Option<FunctionDef> {
        let v = ctx.names.get_name("__v");
        let l = ctx.names.get_name("__l");
        let r = ctx.names.get_name("__r");
        let i = ctx.names.get_name("__n");
        let t = ctx.names.get_name("__t");
        let f = ctx.names.get_name("__f");
        let p = ctx.names.get_name("__s");

        let body = vec![
            // l = (v >> 16) & 65535
            Statement::assign(
                l.clone(),
                Expression::binary(
                    BinaryOp::BitAnd,
                    Expression::binary(BinaryOp::Shr, Expression::name(&v), Expression::int(16)),
                    Expression::int(65535),
                ),
            ),
            // r = v & 65535
            Statement::assign(
                r.clone(),
                Expression::binary(
                    BinaryOp::BitAnd,
                    Expression::name(&v),
                    Expression::int(65535),
                ),
            ),
            Statement::assign(i.clone(), Expression::int(0)),
            Statement::While(WhileLoop {
                test: Expression::compare(
                    crate::ast::CompareOp::Lt,
                    Expression::name(&i),
                    Expression::int(self.rounds as i64),
                ),
                body: vec![
                    // t = l ^ 45771
                    Statement::assign(
                        t.clone(),
                        Expression::binary(
                            BinaryOp::BitXor,
                            Expression::name(&l),
                            Expression::int(FEISTEL_KEY as i64),
                        ),
                    ),
                    // f = ((t << 3) | (t >> 13)) & 65535
                    Statement::assign(f.clone(), rotl3_expr(&t)),
                    // p = r ^ f
                    Statement::assign(
                        p.clone(),
                        Expression::binary(
                            BinaryOp::BitXor,
                            Expression::name(&r),
                            Expression::name(&f),
                        ),
                    ),
                    Statement::assign(r.clone(), Expression::name(&l)),
                    Statement::assign(l.clone(), Expression::name(&p)),
                    Statement::aug_assign(i.clone(), BinaryOp::Add, Expression::int(1)),
                ],
            }),
            // return ((l << 16) | r) & 4294967295
            Statement::Return(Some(Expression::binary(
                BinaryOp::BitAnd,
                Expression::binary(
                    BinaryOp::BitOr,
                    Expression::binary(BinaryOp::Shl, Expression::name(&l), Expression::int(16)),
                    Expression::name(&r),
                ),
                Expression::int(MASK32 as i64),
            ))),
        ];
        Some(FunctionDef {
            name: name.to_string(),
            params: vec![v],
            body,
        })
    }
}

/// `((t << 3) | (t >> 13)) & 65535` over a named 16-bit value.
fn rotl3_expr(t: &str) -> Expression {
    Expression::binary(
        BinaryOp::BitAnd,
        Expression::binary(
            BinaryOp::BitOr,
            Expression::binary(BinaryOp::Shl, Expression::name(t), Expression::int(3)),
            Expression::binary(BinaryOp::Shr, Expression::name(t), Expression::int(13)),
        ),
        Expression::int(65535),
    )
}

/// Feistel over the bit-interleaved 32-bit domain with per-instance keys.
///
/// The round function multiplies by a random odd 16-bit constant and xors a
/// random salt. The modular inverse of the multiplier is fixed at sampling
/// time; decoding re-runs the round function forward, so the inverse is only
/// a key-validity witness.
pub struct RandomFeistelScheme {
    mul: u64,
    xor: u64,
    mul_inv: u64,
    rounds: u32,
}

impl RandomFeistelScheme {
    pub fn sample(rounds: u32, rng: &mut StdRng) -> Self {
        let mul = (rng.gen_range(0u64..32768) * 2 + 1) & MASK16;
        let xor = rng.gen_range(0u64..65536);
        RandomFeistelScheme {
            mul,
            xor,
            mul_inv: mod_inverse_65536(mul),
            rounds: rounds.max(1),
        }
    }

    pub fn with_keys(mul: u64, xor: u64, rounds: u32) -> Self {
        assert!(mul % 2 == 1, "multiplier must be odd to be invertible");
        RandomFeistelScheme {
            mul: mul & MASK16,
            xor: xor & MASK16,
            mul_inv: mod_inverse_65536(mul & MASK16),
            rounds: rounds.max(1),
        }
    }

    pub fn multiplier_inverse(&self) -> u64 {
        self.mul_inv
    }

    fn round_fn(&self, x: u64) -> u64 {
        rotl3(((x * self.mul) & MASK16) ^ self.xor)
    }

    pub fn encode_value(&self, value: u64) -> u64 {
        let (mut a, mut b) = deinterleave(value);
        for _ in 0..self.rounds {
            let next = (a ^ self.round_fn(b)) & MASK16;
            a = b;
            b = next;
        }
        interleave(a, b)
    }

    pub fn decode_value(&self, value: u64) -> u64 {
        let (mut l, mut r) = deinterleave(value);
        for _ in 0..self.rounds {
            let t = l;
            let f = self.round_fn(t);
            l = (r ^ f) & MASK16;
            r = t;
        }
        interleave(l, r)
    }
}

/// Even bits into the first half, odd bits into the second.
fn deinterleave(value: u64) -> (u64, u64) {
    let mut even = 0;
    let mut odd = 0;
    for i in 0..16 {
        even |= ((value >> (2 * i)) & 1) << i;
        odd |= ((value >> (2 * i + 1)) & 1) << i;
    }
    (even, odd)
}

fn interleave(even: u64, odd: u64) -> u64 {
    let mut value = 0;
    for i in 0..16 {
        value |= ((even >> i) & 1) << (2 * i);
        value |= ((odd >> i) & 1) << (2 * i + 1);
    }
    value
}

/// Inverse of an odd multiplier modulo 2^16 by Newton iteration.
fn mod_inverse_65536(m: u64) -> u64 {
    let mut inv: u64 = m;
    for _ in 0..4 {
        inv = inv.wrapping_mul(2u64.wrapping_sub(m.wrapping_mul(inv))) & MASK16;
    }
    inv
}

impl NumberScheme for RandomFeistelScheme {
    fn kind(&self) -> &'static str {
        "feistel-random"
    }

    fn encode(&self, value: i64, decoder: &str, _rng: &mut StdRng) -> Option<Expression> {
        if !(0..=MASK32 as i64).contains(&value) {
            return None;
        }
        let enc = self.encode_value(value as u64);
        Some(Expression::call_name(
            decoder,
            vec![Expression::int(enc as i64)],
        ))
    }

    fn decoder(&self, name: &str, ctx: &mut PassContext) -> Option<FunctionDef> {
        let v = ctx.names.get_name("__v");
        let l = ctx.names.get_name("__l");
        let r = ctx.names.get_name("__r");
        let i = ctx.names.get_name("__n");
        let t = ctx.names.get_name("__t");
        let y = ctx.names.get_name("__y");
        let z = ctx.names.get_name("__z");
        let f = ctx.names.get_name("__f");
        let o = ctx.names.get_name("__o");

        let bit = |source: &str, shift: Expression| {
            Expression::binary(
                BinaryOp::BitAnd,
                Expression::binary(BinaryOp::Shr, Expression::name(source), shift),
                Expression::int(1),
            )
        };
        let two_i = Expression::binary(BinaryOp::Mul, Expression::int(2), Expression::name(&i));
        let two_i_plus = Expression::binary(BinaryOp::Add, two_i.clone(), Expression::int(1));

        let mut body = vec![
            Statement::assign(l.clone(), Expression::int(0)),
            Statement::assign(r.clone(), Expression::int(0)),
            Statement::assign(i.clone(), Expression::int(0)),
            // split the input into even and odd bit planes
            Statement::While(WhileLoop {
                test: Expression::compare(
                    crate::ast::CompareOp::Lt,
                    Expression::name(&i),
                    Expression::int(16),
                ),
                body: vec![
                    Statement::assign(
                        l.clone(),
                        Expression::binary(
                            BinaryOp::BitOr,
                            Expression::name(&l),
                            Expression::binary(
                                BinaryOp::Shl,
                                bit(&v, two_i.clone()),
                                Expression::name(&i),
                            ),
                        ),
                    ),
                    Statement::assign(
                        r.clone(),
                        Expression::binary(
                            BinaryOp::BitOr,
                            Expression::name(&r),
                            Expression::binary(
                                BinaryOp::Shl,
                                bit(&v, two_i_plus.clone()),
                                Expression::name(&i),
                            ),
                        ),
                    ),
                    Statement::aug_assign(i.clone(), BinaryOp::Add, Expression::int(1)),
                ],
            }),
            Statement::assign(i.clone(), Expression::int(0)),
            Statement::While(WhileLoop {
                test: Expression::compare(
                    crate::ast::CompareOp::Lt,
                    Expression::name(&i),
                    Expression::int(self.rounds as i64),
                ),
                body: vec![
                    Statement::assign(t.clone(), Expression::name(&l)),
                    // y = (t * MUL) & 65535
                    Statement::assign(
                        y.clone(),
                        Expression::binary(
                            BinaryOp::BitAnd,
                            Expression::binary(
                                BinaryOp::Mul,
                                Expression::name(&t),
                                Expression::int(self.mul as i64),
                            ),
                            Expression::int(65535),
                        ),
                    ),
                    // z = y ^ XOR
                    Statement::assign(
                        z.clone(),
                        Expression::binary(
                            BinaryOp::BitXor,
                            Expression::name(&y),
                            Expression::int(self.xor as i64),
                        ),
                    ),
                    Statement::assign(f.clone(), rotl3_expr(&z)),
                    // l = (r ^ f) & 65535
                    Statement::assign(
                        l.clone(),
                        Expression::binary(
                            BinaryOp::BitAnd,
                            Expression::binary(
                                BinaryOp::BitXor,
                                Expression::name(&r),
                                Expression::name(&f),
                            ),
                            Expression::int(65535),
                        ),
                    ),
                    Statement::assign(r.clone(), Expression::name(&t)),
                    Statement::aug_assign(i.clone(), BinaryOp::Add, Expression::int(1)),
                ],
            }),
            Statement::assign(o.clone(), Expression::int(0)),
            Statement::assign(i.clone(), Expression::int(0)),
        ];

        // weave the halves back together
        body.push(Statement::While(WhileLoop {
            test: Expression::compare(
                crate::ast::CompareOp::Lt,
                Expression::name(&i),
                Expression::int(16),
            ),
            body: vec![
                Statement::assign(
                    o.clone(),
                    Expression::binary(
                        BinaryOp::BitOr,
                        Expression::name(&o),
                        Expression::binary(BinaryOp::Shl, bit(&l, Expression::name(&i)), two_i),
                    ),
                ),
                Statement::assign(
                    o.clone(),
                    Expression::binary(
                        BinaryOp::BitOr,
                        Expression::name(&o),
                        Expression::binary(
                            BinaryOp::Shl,
                            bit(&r, Expression::name(&i)),
                            two_i_plus,
                        ),
                    ),
                ),
                Statement::aug_assign(i.clone(), BinaryOp::Add, Expression::int(1)),
            ],
        }));
        body.push(Statement::Return(Some(Expression::name(&o))));

        Some(FunctionDef {
            name: name.to_string(),
            params: vec![v],
            body,
        })
    }
}

/// Encodes the decimal digit string xored against a same-length random key;
/// the payload carries both halves and the decoder re-derives the digits.
pub struct XorStringScheme;

impl XorStringScheme {
    pub fn encode_payload(value: i64, rng: &mut StdRng) -> String {
        let digits = value.to_string();
        let key: Vec<u32> = digits.chars().map(|_| rng.gen_range(0u32..256)).collect();
        let mut payload = String::with_capacity(digits.len() * 2);
        for (digit, k) in digits.chars().zip(&key) {
            let c = char::from_u32((digit as u32) ^ k).expect("codes below 256 are valid chars");
            payload.push(c);
        }
        for k in &key {
            payload.push(char::from_u32(*k).expect("codes below 256 are valid chars"));
        }
        payload
    }

    pub fn decode_payload(payload: &str) -> Option<i64> {
        let chars: Vec<char> = payload.chars().collect();
        let n = chars.len() / 2;
        let mut acc: i64 = 0;
        for i in 0..n {
            let digit = (chars[i] as u32) ^ (chars[i + n] as u32);
            let d = digit.checked_sub('0' as u32)?;
            if d > 9 {
                return None;
            }
            acc = acc.checked_mul(10)?.checked_add(d as i64)?;
        }
        Some(acc)
    }
}

impl NumberScheme for XorStringScheme {
    fn kind(&self) -> &'static str {
        "xor-string"
    }

    fn encode(&self, value: i64, decoder: &str, rng: &mut StdRng) -> Option<Expression> {
        if value < 0 {
            return None;
        }
        let payload = Self::encode_payload(value, rng);
        Some(Expression::call_name(decoder, vec![Expression::str(payload)]))
    }

    fn decoder(&self, name: &str, ctx: &mut PassContext) -> Option<FunctionDef> {
        let s = ctx.names.get_name("__v");
        let n = ctx.names.get_name("__n");
        let acc = ctx.names.get_name("__a");
        let i = ctx.names.get_name("__c");

        let char_at = |offset: Option<&str>| {
            let index = match offset {
                None => Expression::name(&i),
                Some(base) => Expression::binary(
                    BinaryOp::Add,
                    Expression::name(&i),
                    Expression::name(base),
                ),
            };
            Expression::call_name("ord", vec![Expression::index(Expression::name(&s), index)])
        };

        let body = vec![
            // n = len(s) // 2
            Statement::assign(
                n.clone(),
                Expression::binary(
                    BinaryOp::FloorDiv,
                    Expression::call_name("len", vec![Expression::name(&s)]),
                    Expression::int(2),
                ),
            ),
            Statement::assign(acc.clone(), Expression::int(0)),
            Statement::assign(i.clone(), Expression::int(0)),
            Statement::While(WhileLoop {
                test: Expression::compare(
                    crate::ast::CompareOp::Lt,
                    Expression::name(&i),
                    Expression::name(&n),
                ),
                body: vec![
                    // acc = (acc * 10) + ((ord(s[i]) ^ ord(s[i + n])) - 48)
                    Statement::assign(
                        acc.clone(),
                        Expression::binary(
                            BinaryOp::Add,
                            Expression::binary(
                                BinaryOp::Mul,
                                Expression::name(&acc),
                                Expression::int(10),
                            ),
                            Expression::binary(
                                BinaryOp::Sub,
                                Expression::binary(
                                    BinaryOp::BitXor,
                                    char_at(None),
                                    char_at(Some(&n)),
                                ),
                                Expression::int(48),
                            ),
                        ),
                    ),
                    Statement::aug_assign(i.clone(), BinaryOp::Add, Expression::int(1)),
                ],
            }),
            Statement::Return(Some(Expression::name(&acc))),
        ];
        Some(FunctionDef {
            name: name.to_string(),
            params: vec![s],
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Interpreter;
    use crate::parser::parse;
    use crate::printer;
    use rand::SeedableRng;

    fn outputs(program: &Program) -> Vec<String> {
        let mut interp = Interpreter::new();
        interp.run(program).unwrap();
        interp.output().to_vec()
    }

    fn obscure(source: &str, kind: NumberSchemeKind, seed: u64) -> Program {
        let mut program = parse(source).unwrap();
        let mut ctx = PassContext::for_program(&program, seed);
        NumberObscurer::new(kind, 3)
            .run(&mut program, &mut ctx)
            .unwrap();
        program
    }

    #[test]
    fn fixed_feistel_round_trips_domain_edges() {
        let scheme = FeistelScheme::new();
        for v in [0u64, 1, 9, 0xFFFF, 0x1_0000, 0xDEAD_BEEF, MASK32] {
            assert_eq!(scheme.decode_value(scheme.encode_value(v)), v);
        }
    }

    #[test]
    fn random_feistel_round_trips_and_keys_are_invertible() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..16 {
            let scheme = RandomFeistelScheme::sample(3, &mut rng);
            assert_eq!(
                (scheme.mul * scheme.multiplier_inverse()) & MASK16,
                1,
                "odd multiplier must be invertible mod 65536"
            );
            for v in [0u64, 7, 65535, 65536, 123_456_789, MASK32] {
                assert_eq!(scheme.decode_value(scheme.encode_value(v)), v);
            }
        }
    }

    #[test]
    fn xor_payload_round_trips() {
        let mut rng = StdRng::seed_from_u64(7);
        for v in [0i64, 5, 48, 1_000_000, i64::MAX] {
            let payload = XorStringScheme::encode_payload(v, &mut rng);
            assert_eq!(XorStringScheme::decode_payload(&payload), Some(v));
        }
    }

    #[test]
    fn out_of_domain_literals_pass_through() {
        let huge = (MASK32 as i64) + 1;
        let source = format!("x = {huge}\nprint(x)\n");
        let program = obscure(&source, NumberSchemeKind::Feistel, 1);
        // nothing encodable, so no decoder is prepended
        assert!(matches!(program.body[0], Statement::Assign(_)));
        assert_eq!(outputs(&program), [huge.to_string()]);
    }

    #[test]
    fn decoder_recovers_values_at_runtime() {
        for kind in [
            NumberSchemeKind::Feistel,
            NumberSchemeKind::FeistelRandom,
            NumberSchemeKind::XorString,
        ] {
            let program = obscure("x = 123456\nprint(x + 1)\n", kind, 9);
            assert!(matches!(program.body[0], Statement::FunctionDef(_)));
            assert_eq!(outputs(&program), ["123457"]);
        }
    }

    #[test]
    fn xor_string_output_survives_printing() {
        let program = obscure("print(90125)\n", NumberSchemeKind::XorString, 3);
        let text = printer::print(&program);
        let reparsed = parse(&text).unwrap();
        assert_eq!(outputs(&reparsed), ["90125"]);
    }

    #[test]
    fn layered_schemes_still_evaluate() {
        let mut program = parse("print(3 + 4)\n").unwrap();
        let mut ctx = PassContext::for_program(&program, 5);
        NumberObscurer::new(NumberSchemeKind::FeistelRandom, 3)
            .run(&mut program, &mut ctx)
            .unwrap();
        NumberObscurer::new(NumberSchemeKind::XorString, 3)
            .run(&mut program, &mut ctx)
            .unwrap();
        assert_eq!(outputs(&program), ["7"]);
    }

    #[test]
    fn identity_scheme_changes_nothing() {
        let source = "x = 42\nprint(x)\n";
        let program = obscure(source, NumberSchemeKind::Identity, 8);
        assert_eq!(program, parse(source).unwrap());
    }
}
