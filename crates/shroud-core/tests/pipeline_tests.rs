//! Full-pipeline behavior preservation and determinism.

use indoc::indoc;
use shroud_core::config::{IdentityStrategy, LoopStrategy};
use shroud_core::interp::Interpreter;
use shroud_core::parser::parse;
use shroud_core::{Obfuscator, ObfuscatorConfig};

fn run_output(source: &str) -> Vec<String> {
    let program = parse(source).unwrap();
    let mut interp = Interpreter::new();
    interp.run(&program).unwrap();
    interp.output().to_vec()
}

fn seeded(seed: u64) -> ObfuscatorConfig {
    let mut config = ObfuscatorConfig::default();
    config.seed = Some(seed);
    config
}

fn assert_preserved(source: &str, config: ObfuscatorConfig) {
    let expected = run_output(source);
    let seed = config.seed;
    let obfuscated = Obfuscator::new(config)
        .obfuscate_source(source)
        .unwrap_or_else(|e| panic!("seed {seed:?}: {e}"));
    assert_ne!(source, obfuscated);
    assert_eq!(
        run_output(&obfuscated),
        expected,
        "seed {seed:?}\n--- obfuscated ---\n{obfuscated}"
    );
}

const PROGRAMS: &[&str] = &[
    indoc! {"
        def fib(n):
            a = 0
            b = 1
            for i in range(n):
                t = a + b
                a = b
                b = t
            return a
        for k in range(1, 10):
            print(fib(k))
    "},
    indoc! {"
        def classify(n):
            if n % 15 == 0:
                return 'fizzbuzz'
            if n % 3 == 0:
                return 'fizz'
            if n % 5 == 0:
                return 'buzz'
            return str(n)
        for i in range(1, 16):
            print(classify(i))
    "},
    indoc! {"
        words = ['alpha', 'beta', 'gamma']
        lengths = {'alpha': 5, 'beta': 4}
        total = 0
        for w in words:
            if w == 'gamma':
                total += len(w)
            else:
                total += lengths[w]
        print(total)
    "},
    indoc! {"
        n = 407
        digits = str(n)
        acc = 0
        for d in digits:
            acc += int(d) * int(d) * int(d)
        print(acc == n)
    "},
    indoc! {"
        def gcd(a, b):
            while b != 0:
                t = b
                b = a % b
                a = t
            return a
        print(gcd(1071, 462))
        print(gcd(13, 7))
    "},
    indoc! {"
        grid = [[1, 2], [3, 4], [5, 6]]
        for row in range(3):
            for col in range(2):
                print(grid[row][col] * 10)
    "},
];

#[test]
fn default_pipeline_preserves_behavior() {
    for source in PROGRAMS {
        for seed in 0..4u64 {
            assert_preserved(source, seeded(seed));
        }
    }
}

#[test]
fn plain_loop_strategy_preserves_behavior() {
    for source in PROGRAMS {
        let mut config = seeded(99);
        config.loops.strategy = LoopStrategy::Plain;
        assert_preserved(source, config);
    }
}

#[test]
fn aggressive_settings_preserve_behavior() {
    let mut config = seeded(7);
    config.identity.chance = 1.0;
    config.identity.strategy = IdentityStrategy::Mixed;
    config.junk.passes = 3;
    config.conditionals.passes = 2;
    for source in PROGRAMS {
        assert_preserved(source, config.clone());
    }
}

#[test]
fn seed_pins_the_output_bytes() {
    let source = PROGRAMS[0];
    let a = Obfuscator::new(seeded(42)).obfuscate_source(source).unwrap();
    let b = Obfuscator::new(seeded(42)).obfuscate_source(source).unwrap();
    let c = Obfuscator::new(seeded(43)).obfuscate_source(source).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn obfuscated_output_is_stable_under_reprinting() {
    let source = PROGRAMS[1];
    let obfuscated = Obfuscator::new(seeded(3)).obfuscate_source(source).unwrap();
    let reparsed = parse(&obfuscated).unwrap();
    let reprinted = shroud_core::printer::print(&reparsed);
    let twice = shroud_core::printer::print(&parse(&reprinted).unwrap());
    assert_eq!(reprinted, twice);
}

#[test]
fn parse_errors_are_reported_not_panicked() {
    let err = Obfuscator::new(seeded(1))
        .obfuscate_source("def broken(:\n")
        .unwrap_err();
    let message = err.to_string();
    assert!(!message.is_empty());
}
