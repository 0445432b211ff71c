//! End-to-end exercises of the `binastc` binary against small fixture
//! corpora: one `--script-dir` per test, asserting on exit status and the
//! artifacts written under `--result-dir`.

use std::{fs, path::Path, process::Command};

fn schema_json() -> &'static str {
    r#"[
        {
            "kind": "iface",
            "name": "Script",
            "isNode": true,
            "fields": [
                ["flag", { "kind": "union", "variants": [
                    { "kind": "primitive", "name": "bool" },
                    { "kind": "primitive", "name": "null" }
                ] }],
                ["id", { "kind": "ident", "tag": "ident" }],
                ["prop", { "kind": "ident", "tag": "prop" }],
                ["label", { "kind": "primitive", "name": "str" }]
            ]
        }
    ]"#
}

fn script_json(id_name: &str, prop_name: &str, label: &str, flag: bool) -> String {
    format!(
        r#"{{
            "iface": "Script",
            "fields": [
                ["flag", {flag}],
                ["id", {{"tag": "ident", "name": "{id_name}"}}],
                ["prop", {{"tag": "prop", "name": "{prop_name}"}}],
                ["label", "{label}"]
            ]
        }}"#
    )
}

fn write_corpus(dir: &Path) {
    fs::write(dir.join("schema.json"), schema_json()).unwrap();
    fs::write(dir.join("a.json"), script_json("alpha", "x", "hello", true)).unwrap();
    fs::write(dir.join("b.json"), script_json("beta", "y", "world", false)).unwrap();
    fs::write(dir.join("c.json"), script_json("alpha", "x", "hello", true)).unwrap();
}

fn binastc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_binastc"))
}

#[test]
fn pretty_print_runs_without_a_writable_result_dir() {
    let script_dir = tempfile::tempdir().unwrap();
    write_corpus(script_dir.path());
    let result_dir = tempfile::tempdir().unwrap();

    let output = binastc()
        .args(["--script-dir", script_dir.path().to_str().unwrap()])
        .args(["--result-dir", result_dir.path().to_str().unwrap()])
        .arg("--pretty-print")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Script"));
    assert!(stdout.contains("alpha"));
}

#[test]
fn write_stage_without_writable_sentinel_fails() {
    let script_dir = tempfile::tempdir().unwrap();
    write_corpus(script_dir.path());
    let result_dir = tempfile::tempdir().unwrap();

    let output = binastc()
        .args(["--script-dir", script_dir.path().to_str().unwrap()])
        .args(["--result-dir", result_dir.path().to_str().unwrap()])
        .arg("--global-strings")
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn full_pipeline_produces_entropy_coded_sizes() {
    let script_dir = tempfile::tempdir().unwrap();
    write_corpus(script_dir.path());
    let result_dir = tempfile::tempdir().unwrap();
    fs::write(result_dir.path().join("WRITABLE"), "").unwrap();

    let analysis = binastc()
        .args(["--script-dir", script_dir.path().to_str().unwrap()])
        .args(["--result-dir", result_dir.path().to_str().unwrap()])
        .arg("--path-suffix")
        .arg("--string-window")
        .arg("--global-strings")
        .args(["--string-window-sizes", "8"])
        .output()
        .unwrap();
    assert!(analysis.status.success(), "stderr: {}", String::from_utf8_lossy(&analysis.stderr));

    assert!(result_dir.path().join("path-suffix/1/ALL.json").is_file());
    assert!(result_dir.path().join("string-window/8/ALL.json").is_file());
    assert!(result_dir.path().join("global-strings/ALL.json").is_file());

    let global_strings: serde_json::Value =
        serde_json::from_slice(&fs::read(result_dir.path().join("global-strings/ALL.json")).unwrap()).unwrap();
    assert!(global_strings.as_array().unwrap().iter().any(|e| e["str"] == "alpha"));

    let encode = binastc()
        .args(["--script-dir", script_dir.path().to_str().unwrap()])
        .args(["--result-dir", result_dir.path().to_str().unwrap()])
        .arg("--entropy-code")
        .args(["--string-window-sizes", "8"])
        .output()
        .unwrap();
    assert!(encode.status.success(), "stderr: {}", String::from_utf8_lossy(&encode.stderr));
    let stdout = String::from_utf8_lossy(&encode.stdout);
    let summary_lines = stdout.lines().filter(|l| l.contains("BinAST")).count();
    assert_eq!(summary_lines, 3, "one summary line per corpus script");

    assert!(result_dir.path().join("entropy-code/a.bin").is_file());
    assert!(result_dir.path().join("entropy-code/b.bin").is_file());
    assert!(result_dir.path().join("entropy-code/c.bin").is_file());
}

#[test]
fn entropy_code_without_prior_analysis_fails() {
    let script_dir = tempfile::tempdir().unwrap();
    write_corpus(script_dir.path());
    let result_dir = tempfile::tempdir().unwrap();
    fs::write(result_dir.path().join("WRITABLE"), "").unwrap();

    let output = binastc()
        .args(["--script-dir", script_dir.path().to_str().unwrap()])
        .args(["--result-dir", result_dir.path().to_str().unwrap()])
        .arg("--entropy-code")
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn malformed_schema_aborts_with_unknown_type() {
    let script_dir = tempfile::tempdir().unwrap();
    fs::write(
        script_dir.path().join("schema.json"),
        r#"[{"kind":"typedef","name":"Bad","aliased":{"kind":"primitive","name":"nope"}}]"#,
    )
    .unwrap();
    let result_dir = tempfile::tempdir().unwrap();

    let output = binastc()
        .args(["--script-dir", script_dir.path().to_str().unwrap()])
        .args(["--result-dir", result_dir.path().to_str().unwrap()])
        .arg("--pretty-print")
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn at_least_one_stage_flag_is_required() {
    let script_dir = tempfile::tempdir().unwrap();
    write_corpus(script_dir.path());
    let result_dir = tempfile::tempdir().unwrap();

    let output = binastc()
        .args(["--script-dir", script_dir.path().to_str().unwrap()])
        .args(["--result-dir", result_dir.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(!output.status.success());
}
