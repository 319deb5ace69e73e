//! Totality, consistency, and collision-freedom of identifier renaming.

use indoc::indoc;
use rustc_hash::FxHashSet;
use shroud_core::interp::{values_equal, Interpreter, Value};
use shroud_core::parser::parse;
use shroud_core::passes::{IdentifierRenamer, ObfuscationPass, PassContext};
use shroud_core::printer;

const SAMPLE: &str = indoc! {"
    def outer(a):
        inner = a + offset
        return inner
    class Holder:
        tag = 3
    offset = 2
    picker = lambda x, y: x if x > y else y
    result = picker(outer(5), 4)
    for step in range(3):
        result += step
    print(result)
"};

#[test]
fn mapping_is_total_over_defined_names() {
    let mut program = parse(SAMPLE).unwrap();
    let mut ctx = PassContext::for_program(&program, 31);
    let mut renamer = IdentifierRenamer::new();
    renamer.run(&mut program, &mut ctx).unwrap();

    for name in [
        "outer", "a", "inner", "Holder", "tag", "offset", "picker", "x", "y", "result", "step",
    ] {
        assert!(renamer.mapping().contains_key(name), "missing {name}");
    }
}

#[test]
fn replacements_never_collide() {
    let mut program = parse(SAMPLE).unwrap();
    let mut ctx = PassContext::for_program(&program, 8);
    let mut renamer = IdentifierRenamer::new();
    renamer.run(&mut program, &mut ctx).unwrap();

    let mut seen = FxHashSet::default();
    for (old, new) in renamer.mapping() {
        assert!(seen.insert(new.clone()), "{new} assigned twice");
        assert_ne!(old, new);
        assert_eq!(new.len(), 8);
        let mut chars = new.chars();
        let first = chars.next().unwrap();
        assert!(first.is_ascii_alphabetic() || first == '_');
        assert!(chars.all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}

#[test]
fn references_are_rewritten_consistently() {
    let mut program = parse(SAMPLE).unwrap();
    let mut ctx = PassContext::for_program(&program, 14);
    let mut renamer = IdentifierRenamer::new();
    renamer.run(&mut program, &mut ctx).unwrap();
    let text = printer::print(&program);

    for (old, new) in renamer.mapping() {
        // short names could appear inside random replacements by accident
        if old.len() >= 5 {
            assert!(!text.contains(old), "{old} leaked into the output");
        }
        assert!(text.contains(new.as_str()), "{new} absent from the output");
    }
    // free names survive
    assert!(text.contains("range("));
    assert!(text.contains("print("));
}

#[test]
fn single_assignment_example_keeps_its_value() {
    // `x = 7` still binds 7 after wrapping and renaming, under the new name
    use shroud_core::config::IdentityStrategy;
    use shroud_core::passes::IdentityInjector;

    let mut program = parse("x = 7\n").unwrap();
    let mut ctx = PassContext::for_program(&program, 55);
    IdentityInjector::new(1.0, IdentityStrategy::Mixed)
        .run(&mut program, &mut ctx)
        .unwrap();
    let mut renamer = IdentifierRenamer::new();
    renamer.run(&mut program, &mut ctx).unwrap();

    let new_name = renamer.mapping().get("x").expect("x must be mapped").clone();
    let mut interp = Interpreter::new();
    interp.run(&program).unwrap();
    assert!(interp.global("x").is_none());
    assert!(values_equal(
        interp.global(&new_name).expect("renamed binding must exist"),
        &Value::Int(7)
    ));
}

#[test]
fn renamed_programs_execute_identically() {
    let original = parse(SAMPLE).unwrap();
    let strip_class = |mut p: shroud_core::Program| {
        // the evaluator does not model classes
        p.body.retain(|s| !matches!(s, shroud_core::ast::Statement::ClassDef(_)));
        p
    };
    let original = strip_class(original);
    let mut expected = Interpreter::new();
    expected.run(&original).unwrap();

    for seed in 0..6u64 {
        let mut mutated = original.clone();
        let mut ctx = PassContext::for_program(&mutated, seed);
        IdentifierRenamer::new()
            .run(&mut mutated, &mut ctx)
            .unwrap();
        let mut interp = Interpreter::new();
        interp.run(&mutated).unwrap();
        assert_eq!(interp.output(), expected.output(), "seed {seed}");
    }
}
