//! Iteration-count and value-sequence preservation for the loop rewrites.

use indoc::indoc;
use shroud_core::ast::Statement;
use shroud_core::config::LoopStrategy;
use shroud_core::interp::Interpreter;
use shroud_core::parser::parse;
use shroud_core::passes::{LoopObscurer, ObfuscationPass, PassContext};
use shroud_core::Program;

fn run_output(program: &Program) -> Vec<String> {
    let mut interp = Interpreter::new();
    interp.run(program).unwrap();
    interp.output().to_vec()
}

fn lowered(source: &str, strategy: LoopStrategy, seed: u64) -> Program {
    let mut program = parse(source).unwrap();
    let mut ctx = PassContext::for_program(&program, seed);
    LoopObscurer::new(strategy)
        .run(&mut program, &mut ctx)
        .unwrap();
    program
}

fn range_values(start: i64, stop: i64, step: i64) -> Vec<String> {
    let mut values = Vec::new();
    let mut v = start;
    while (step > 0 && v < stop) || (step < 0 && v > stop) {
        values.push(v.to_string());
        v += step;
    }
    values
}

#[test]
fn value_sequences_match_over_a_literal_grid() {
    let grid: &[(i64, i64, i64)] = &[
        (0, 5, 1),
        (0, 0, 1),
        (5, 5, 3),
        (3, 2, 1),
        (2, 11, 3),
        (-6, 7, 4),
        (10, 0, -2),
        (7, -8, -5),
        (-3, -10, -1),
        (0, 1, 7),
    ];
    for &(start, stop, step) in grid {
        let source = format!("for v in range({start}, {stop}, {step}):\n    print(v)\n");
        let expected = range_values(start, stop, step);
        for strategy in [LoopStrategy::Plain, LoopStrategy::Collatz] {
            for seed in [0u64, 1, 2] {
                let program = lowered(&source, strategy, seed);
                assert!(
                    !program.body.iter().any(|s| matches!(s, Statement::For(_))),
                    "({start},{stop},{step}) must lower fully"
                );
                assert_eq!(
                    run_output(&program),
                    expected,
                    "({start},{stop},{step}) {strategy:?} seed {seed}"
                );
            }
        }
    }
}

#[test]
fn plain_lowering_of_range_five_counts_to_five() {
    // end-to-end: `for i in range(5): total += i`
    let source = "total = 0\nfor i in range(5):\n    total += i\nprint(total)\n";
    let program = lowered(source, LoopStrategy::Plain, 1);
    let whiles = program
        .body
        .iter()
        .filter(|s| matches!(s, Statement::While(_)))
        .count();
    assert_eq!(whiles, 1);
    assert_eq!(run_output(&program), ["10"]);
}

#[test]
fn descending_range_normalizes_to_five_iterations() {
    // end-to-end: range(10, 0, -2) visits 10, 8, 6, 4, 2
    let source = "for i in range(10, 0, -2):\n    print(i)\n";
    for strategy in [LoopStrategy::Plain, LoopStrategy::Collatz] {
        let program = lowered(source, strategy, 8);
        assert_eq!(run_output(&program), ["10", "8", "6", "4", "2"]);
    }
}

#[test]
fn loop_state_never_reveals_the_counter() {
    let source = "for i in range(6):\n    print(i)\n";
    let program = lowered(source, LoopStrategy::Collatz, 19);
    let text = shroud_core::printer::print(&program);
    assert!(
        !text.contains("range("),
        "lowered output must not call range:\n{text}"
    );
    assert_eq!(run_output(&parse(&text).unwrap()), ["0", "1", "2", "3", "4", "5"]);
}

#[test]
fn bodies_with_state_survive_collatz_lowering() {
    let source = indoc! {"
        acc = 1
        for i in range(1, 9):
            acc = acc * i
            if acc > 100:
                acc = acc - 100
        print(acc)
    "};
    let expected = run_output(&parse(source).unwrap());
    for seed in 0..12u64 {
        let program = lowered(source, LoopStrategy::Collatz, seed);
        assert_eq!(run_output(&program), expected, "seed {seed}");
    }
}

#[test]
fn nested_loops_flatten_and_still_run_in_order() {
    let source = indoc! {"
        for i in range(3):
            for j in range(i):
                print(i, j)
    "};
    let expected = run_output(&parse(source).unwrap());
    for strategy in [LoopStrategy::Plain, LoopStrategy::Collatz] {
        let program = lowered(source, strategy, 5);
        let helper = program.body.iter().any(|s| {
            matches!(s, Statement::FunctionDef(f) if f.name.starts_with("__unwrapped_loop"))
        });
        assert!(helper, "nested body must move into a helper function");
        assert_eq!(run_output(&program), expected, "{strategy:?}");
    }
}

#[test]
fn inner_dynamic_range_stays_a_for_loop() {
    // range(i) is not literal, so only the outer loop lowers
    let source = indoc! {"
        for i in range(3):
            for j in range(i):
                print(i * 10 + j)
    "};
    let program = lowered(source, LoopStrategy::Plain, 2);
    fn count_fors(body: &[Statement]) -> usize {
        body.iter()
            .map(|s| match s {
                Statement::For(f) => 1 + count_fors(&f.body),
                Statement::While(w) => count_fors(&w.body),
                Statement::If(i) => count_fors(&i.body) + count_fors(&i.orelse),
                Statement::FunctionDef(f) => count_fors(&f.body),
                _ => 0,
            })
            .sum()
    }
    assert_eq!(count_fors(&program.body), 1);
    assert_eq!(run_output(&program), ["10", "20", "21"]);
}

#[test]
fn while_loops_are_never_rewritten() {
    let source = "n = 3\nwhile n > 0:\n    print(n)\n    n -= 1\n";
    let original = parse(source).unwrap();
    for strategy in [LoopStrategy::Plain, LoopStrategy::Collatz] {
        let program = lowered(source, strategy, 1);
        assert_eq!(program, original);
    }
}
