//! End-to-end tests driving the compiled binary.

use std::path::Path;
use std::process::Command;

use indoc::indoc;
use tempfile::tempdir;

fn shroud() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shroud"))
}

fn write_script(dir: &Path, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).unwrap();
    path
}

const SCRIPT: &str = indoc! {"
    def square(n):
        return n * n
    total = 0
    for i in range(6):
        total += square(i)
    print(total)
"};

#[test]
fn obfuscates_to_stdout() {
    let dir = tempdir().unwrap();
    let input = write_script(dir.path(), "in.script", SCRIPT);

    let output = shroud()
        .arg(&input)
        .args(["--seed", "7"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(!text.is_empty());
    assert!(!text.contains("square"), "identifiers must be renamed:\n{text}");
}

#[test]
fn writes_output_file_and_verifies() {
    let dir = tempdir().unwrap();
    let input = write_script(dir.path(), "in.script", SCRIPT);
    let out = dir.path().join("out.script");

    let status = shroud()
        .arg(&input)
        .args(["--seed", "11", "--verify"])
        .arg("-o")
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());
    let written = std::fs::read_to_string(&out).unwrap();
    assert!(!written.is_empty());
}

#[test]
fn seed_makes_runs_reproducible() {
    let dir = tempdir().unwrap();
    let input = write_script(dir.path(), "in.script", SCRIPT);

    let run = |seed: &str| {
        let output = shroud().arg(&input).args(["--seed", seed]).output().unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout).unwrap()
    };
    assert_eq!(run("5"), run("5"));
    assert_ne!(run("5"), run("6"));
}

#[test]
fn pass_toggles_are_honored() {
    let dir = tempdir().unwrap();
    let input = write_script(dir.path(), "in.script", SCRIPT);

    let output = shroud()
        .arg(&input)
        .args([
            "--seed",
            "3",
            "--no-junk",
            "--no-conditionals",
            "--no-identity",
            "--no-numbers",
            "--no-loops",
            "--no-rename",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), SCRIPT);
}

#[test]
fn config_file_drives_the_pipeline() {
    let dir = tempdir().unwrap();
    let input = write_script(dir.path(), "in.script", SCRIPT);
    let config = dir.path().join("shroud.json");
    std::fs::write(
        &config,
        r#"{ "seed": 9, "loops": { "strategy": "plain" }, "rename": { "enabled": false } }"#,
    )
    .unwrap();

    let output = shroud()
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains("square"), "renaming is disabled:\n{text}");
}

#[test]
fn missing_input_is_a_clean_error() {
    let output = shroud().output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("no input file"));
}

#[test]
fn unparseable_input_is_a_clean_error() {
    let dir = tempdir().unwrap();
    let input = write_script(dir.path(), "bad.script", "def broken(:\n");
    let output = shroud().arg(&input).output().unwrap();
    assert!(!output.status.success());
}
