//! End-to-end test: instrument a project, build it, run it with a dump file,
//! strip what fired, and check that only the never-called function is left.

use std::fs;
use std::path::Path;
use std::process::Command;

fn create_mini_project(dir: &Path) {
    fs::create_dir_all(dir.join("src")).unwrap();

    fs::write(
        dir.join("Cargo.toml"),
        r#"[package]
name = "mini"
version = "0.1.0"
edition = "2021"

[workspace]
"#,
    )
    .unwrap();

    fs::write(
        dir.join("src").join("main.rs"),
        r#"fn main() {
    let _dump = tracemark_runtime::PeriodicDump::from_env();
    let double = |x: u64| x * 2;
    println!("result: {}", double(work(20)));
}

fn work(n: u64) -> u64 {
    (0..n).sum()
}

#[allow(dead_code)]
fn never_called() -> u64 {
    7
}
"#,
    )
    .unwrap();
}

fn cargo() -> String {
    std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string())
}

#[test]
fn instrument_build_run_strip() {
    let tmp = tempfile::tempdir().unwrap();
    let project = tmp.path().join("mini");
    create_mini_project(&project);

    let tracemark_bin = env!("CARGO_BIN_EXE_tracemark");
    let runtime_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tracemark-runtime");

    let output = Command::new(tracemark_bin)
        .args(["instrument", "--project"])
        .arg(&project)
        .arg("--runtime-path")
        .arg(&runtime_path)
        .output()
        .expect("failed to run tracemark instrument");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "instrument failed: {stderr}");

    let output = Command::new(cargo())
        .args(["build", "--quiet", "--manifest-path"])
        .arg(project.join("Cargo.toml"))
        .arg("--target-dir")
        .arg(tmp.path().join("target"))
        .output()
        .expect("failed to run cargo build");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "instrumented project failed to build: {stderr}");

    let binary = tmp.path().join("target/debug/mini");
    let dump = tmp.path().join("calls.txt");
    let output = Command::new(&binary)
        .env("TRACEMARK_DUMP", &dump)
        .output()
        .expect("failed to run instrumented binary");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "result: 380");

    let id = project
        .join("src/main.rs")
        .canonicalize()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    let calls = fs::read_to_string(&dump).expect("dump file should exist");
    let mut lines: Vec<&str> = calls.lines().collect();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            format!("{id}::double"),
            format!("{id}::main"),
            format!("{id}::work"),
        ]
    );

    let output = Command::new(tracemark_bin)
        .args(["strip", "--project"])
        .arg(&project)
        .arg("--known")
        .arg(&dump)
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "strip failed: {stderr}");
    assert!(stderr.contains("removed 3 probe(s), 1 remaining"), "{stderr}");

    let source = fs::read_to_string(project.join("src/main.rs")).unwrap();
    assert!(source.contains(&format!("__tracemark({id:?}, \"never_called\");")));
    assert_eq!(source.matches("__tracemark(").count(), 1);
    assert!(source.starts_with("use tracemark_runtime::record as __tracemark;\n"));

    // The stripped tree still builds.
    let output = Command::new(cargo())
        .args(["build", "--quiet", "--manifest-path"])
        .arg(project.join("Cargo.toml"))
        .arg("--target-dir")
        .arg(tmp.path().join("target"))
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stripped project failed to build: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
