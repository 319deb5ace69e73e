//! Property-based checks for the encoding schemes and loop rewrites.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shroud_core::config::LoopStrategy;
use shroud_core::interp::Interpreter;
use shroud_core::parser::parse;
use shroud_core::passes::numbers::{FeistelScheme, RandomFeistelScheme, XorStringScheme};
use shroud_core::passes::{LoopObscurer, ObfuscationPass, PassContext};
use shroud_core::{Obfuscator, ObfuscatorConfig};

fn run_output(source: &str) -> Vec<String> {
    let program = parse(source).unwrap();
    let mut interp = Interpreter::new();
    interp.run(&program).unwrap();
    interp.output().to_vec()
}

proptest! {
    #[test]
    fn fixed_feistel_round_trips(v in 0u64..=0xFFFF_FFFF) {
        let scheme = FeistelScheme::new();
        prop_assert_eq!(scheme.decode_value(scheme.encode_value(v)), v);
    }

    #[test]
    fn random_feistel_round_trips(
        v in 0u64..=0xFFFF_FFFF,
        half in 0u64..32768,
        salt in 0u64..65536,
        rounds in 1u32..6,
    ) {
        let scheme = RandomFeistelScheme::with_keys(half * 2 + 1, salt, rounds);
        prop_assert_eq!(scheme.decode_value(scheme.encode_value(v)), v);
    }

    #[test]
    fn xor_payloads_round_trip(v in 0i64..=i64::MAX, key_seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(key_seed);
        let payload = XorStringScheme::encode_payload(v, &mut rng);
        prop_assert_eq!(XorStringScheme::decode_payload(&payload), Some(v));
    }

    #[test]
    fn lowered_loops_visit_the_range_sequence(
        start in -25i64..25,
        stop in -25i64..25,
        step in -4i64..=4,
        seed in 0u64..1000,
    ) {
        prop_assume!(step != 0);
        let source = format!("for v in range({start}, {stop}, {step}):\n    print(v)\n");

        let mut expected = Vec::new();
        let mut v = start;
        while (step > 0 && v < stop) || (step < 0 && v > stop) {
            expected.push(v.to_string());
            v += step;
        }

        for strategy in [LoopStrategy::Plain, LoopStrategy::Collatz] {
            let mut program = parse(&source).unwrap();
            let mut ctx = PassContext::for_program(&program, seed);
            LoopObscurer::new(strategy).run(&mut program, &mut ctx).unwrap();
            let mut interp = Interpreter::new();
            interp.run(&program).unwrap();
            prop_assert_eq!(interp.output(), expected.as_slice());
        }
    }

    #[test]
    fn pipeline_preserves_a_parameterized_program(
        bound in 0i64..12,
        scale in 1i64..9,
        seed in any::<u64>(),
    ) {
        let source = format!(
            "total = 0\nfor i in range({bound}):\n    total += i * {scale}\nprint(total)\n"
        );
        let expected = run_output(&source);
        let mut config = ObfuscatorConfig::default();
        config.seed = Some(seed);
        let obfuscated = Obfuscator::new(config).obfuscate_source(&source).unwrap();
        prop_assert_eq!(run_output(&obfuscated), expected);
    }
}
