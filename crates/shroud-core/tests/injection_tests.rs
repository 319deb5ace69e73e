//! Inertness of the junk, conditional, and identity injectors.

use indoc::indoc;
use shroud_core::config::IdentityStrategy;
use shroud_core::interp::{values_equal, Interpreter, Value};
use shroud_core::parser::parse;
use shroud_core::passes::{
    ConditionalInjector, IdentityInjector, JunkInjector, ObfuscationPass, PassContext,
};
use shroud_core::Program;

const SAMPLE: &str = indoc! {"
    def apply(f, x):
        return f(x)
    base = 10
    doubled = apply(lambda v: v * 2, base)
    words = ['a', 'b', 'c']
    joined = ''
    for w in words:
        joined += w
    flag = doubled > 15 and len(joined) == 3
    if flag:
        print('yes', doubled, joined)
    else:
        print('no')
"};

fn executed(program: &Program) -> Interpreter {
    let mut interp = Interpreter::new();
    interp.run(program).unwrap();
    interp
}

/// Printed lines must match, and every binding the original program created
/// must hold the same value afterwards.
fn assert_observably_equal(original: &Program, mutated: &Program) {
    let before = executed(original);
    let after = executed(mutated);
    assert_eq!(before.output(), after.output());
    for (name, value) in before.globals() {
        if matches!(value, Value::Function(_) | Value::Lambda(_) | Value::Builtin(_)) {
            continue;
        }
        let other = after
            .global(name)
            .unwrap_or_else(|| panic!("binding {name} lost"));
        assert!(values_equal(value, other), "binding {name} changed");
    }
}

fn check<P: ObfuscationPass>(mut pass: P, seed: u64) {
    let original = parse(SAMPLE).unwrap();
    let mut mutated = original.clone();
    let mut ctx = PassContext::for_program(&mutated, seed);
    pass.run(&mut mutated, &mut ctx).unwrap();
    assert_ne!(original, mutated, "{} must change the tree", pass.name());
    assert_observably_equal(&original, &mutated);
}

#[test]
fn junk_injection_is_inert_at_full_probability() {
    for seed in 0..10u64 {
        check(JunkInjector::with_chance(1.0), seed);
    }
}

#[test]
fn conditional_injection_is_inert_at_full_probability() {
    for seed in 0..10u64 {
        check(ConditionalInjector::with_chance(1.0), seed);
    }
}

#[test]
fn identity_injection_is_inert_at_full_probability() {
    for seed in 0..10u64 {
        check(IdentityInjector::new(1.0, IdentityStrategy::Mixed), seed);
    }
}

#[test]
fn stacked_injectors_stay_inert() {
    let original = parse(SAMPLE).unwrap();
    for seed in 0..6u64 {
        let mut mutated = original.clone();
        let mut ctx = PassContext::for_program(&mutated, seed);
        JunkInjector::with_chance(1.0)
            .run(&mut mutated, &mut ctx)
            .unwrap();
        ConditionalInjector::with_chance(1.0)
            .run(&mut mutated, &mut ctx)
            .unwrap();
        IdentityInjector::new(1.0, IdentityStrategy::Mixed)
            .run(&mut mutated, &mut ctx)
            .unwrap();
        assert_observably_equal(&original, &mutated);
    }
}

#[test]
fn printed_injected_programs_reparse() {
    let original = parse(SAMPLE).unwrap();
    let mut mutated = original.clone();
    let mut ctx = PassContext::for_program(&mutated, 77);
    JunkInjector::with_chance(1.0)
        .run(&mut mutated, &mut ctx)
        .unwrap();
    ConditionalInjector::with_chance(1.0)
        .run(&mut mutated, &mut ctx)
        .unwrap();
    let text = shroud_core::printer::print(&mutated);
    let reparsed = parse(&text).unwrap_or_else(|e| panic!("{e}\n{text}"));
    assert_observably_equal(&original, &reparsed);
}
