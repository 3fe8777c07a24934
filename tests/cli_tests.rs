//! Integration tests for CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cli() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("snippet-context"));
    cmd.env_remove("GROQ_API_KEY");
    cmd
}

fn write_snippets(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("snippets.json");
    fs::write(
        &path,
        r#"[
  {"content": "x = 5", "index": 10},
  {"content": "print(x)", "index": 12},
  {"content": "print(unknown_value)", "index": 13}
]"#,
    )
    .expect("write snippets");
    path
}

#[test]
fn test_cli_version() {
    let mut cmd = cli();
    cmd.arg("--version");
    cmd.assert().success().stdout(predicate::str::contains("snippet-context"));
}

#[test]
fn test_cli_help() {
    let mut cmd = cli();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Resolve cross-snippet dependencies"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("scan"));
}

#[test]
fn test_analyze_writes_report_and_jsonl() {
    let tmp = TempDir::new().expect("tmp");
    let snippets = write_snippets(&tmp);
    let out = tmp.path().join("out");

    let mut cmd = cli();
    cmd.current_dir(tmp.path())
        .arg("analyze")
        .arg(&snippets)
        .args(["--no-external", "--no-timestamp", "--output-dir"])
        .arg(&out);
    cmd.assert().success().stdout(predicate::str::contains("Analyzed 3 snippets"));

    let report = fs::read_to_string(out.join("report.json")).expect("report");
    let report: serde_json::Value = serde_json::from_str(&report).expect("json");
    assert!(report.get("generated_at").is_none());
    assert_eq!(report["summary"]["snippets"], 3);
    assert_eq!(report["summary"]["status"]["ok"], 3);
    assert_eq!(report["config"]["enable_external_resolver"], false);
    assert_eq!(report["entries"][1]["plan"]["snippet_order"], serde_json::json!([10]));
    assert_eq!(report["entries"][2]["unresolved_symbols"], serde_json::json!(["unknown_value"]));

    let jsonl = fs::read_to_string(out.join("augmented.jsonl")).expect("jsonl");
    let lines: Vec<serde_json::Value> =
        jsonl.lines().map(|l| serde_json::from_str(l).expect("line")).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["index"], 12);
    assert_eq!(lines[1]["content"], "x = 5\n\nprint(x)");
}

#[test]
fn test_analyze_prints_report_to_stdout_for_selected_index() {
    let tmp = TempDir::new().expect("tmp");
    let snippets = write_snippets(&tmp);

    let mut cmd = cli();
    cmd.current_dir(tmp.path())
        .arg("analyze")
        .arg(&snippets)
        .args(["--index", "12", "--no-external"]);
    let output = cmd.assert().success().get_output().stdout.clone();

    let report: serde_json::Value = serde_json::from_slice(&output).expect("json report");
    assert_eq!(report["schema_version"], "1.0.0");
    assert_eq!(report["entries"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["entries"][0]["index"], 12);
}

#[test]
fn test_analyze_rejects_unknown_index() {
    let tmp = TempDir::new().expect("tmp");
    let snippets = write_snippets(&tmp);

    let mut cmd = cli();
    cmd.current_dir(tmp.path())
        .arg("analyze")
        .arg(&snippets)
        .args(["--index", "99", "--no-external"]);
    cmd.assert().failure().stderr(predicate::str::contains("No snippet with index 99"));
}

#[test]
fn test_analyze_rejects_invalid_config_values() {
    let tmp = TempDir::new().expect("tmp");
    let snippets = write_snippets(&tmp);

    let mut cmd = cli();
    cmd.current_dir(tmp.path()).arg("analyze").arg(&snippets).args(["--concurrency", "0"]);
    cmd.assert().failure().stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_analyze_uses_discovered_config_file() {
    let tmp = TempDir::new().expect("tmp");
    let snippets = write_snippets(&tmp);
    fs::write(
        tmp.path().join("snippet-context.toml"),
        "[snippet-context]\nenable_external_resolver = false\nsynthesize_placeholders = false\n",
    )
    .expect("write config");

    let mut cmd = cli();
    cmd.current_dir(tmp.path()).arg("analyze").arg(&snippets).args(["--index", "13"]);
    cmd.assert().success().stdout(predicate::str::contains("\"status\": \"unresolved\""));
}

#[test]
fn test_explicit_broken_config_fails() {
    let tmp = TempDir::new().expect("tmp");
    let snippets = write_snippets(&tmp);
    let config = tmp.path().join("broken.toml");
    fs::write(&config, "window_size = \"wide\"\n").expect("write config");

    let mut cmd = cli();
    cmd.current_dir(tmp.path()).arg("analyze").arg(&snippets).arg("--config").arg(&config);
    cmd.assert().failure().stderr(predicate::str::contains("Invalid TOML config"));
}

#[test]
fn test_env_layer_overrides_file() {
    let tmp = TempDir::new().expect("tmp");
    let snippets = write_snippets(&tmp);

    let mut cmd = cli();
    cmd.current_dir(tmp.path())
        .env("SNIPPET_CONTEXT_ENABLE_EXTERNAL_RESOLVER", "false")
        .env("SNIPPET_CONTEXT_WINDOW_SIZE", "3")
        .arg("analyze")
        .arg(&snippets)
        .args(["--index", "12"]);
    let output = cmd.assert().success().get_output().stdout.clone();

    let report: serde_json::Value = serde_json::from_slice(&output).expect("json report");
    assert_eq!(report["config"]["window_size"], 3);
    assert_eq!(report["config"]["enable_external_resolver"], false);
}

#[test]
fn test_scan_lists_defined_and_free_names() {
    let tmp = TempDir::new().expect("tmp");
    let snippets = write_snippets(&tmp);

    let mut cmd = cli();
    cmd.arg("scan").arg(&snippets);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Snippet 10:"))
        .stdout(predicate::str::contains("defines: x"))
        .stdout(predicate::str::contains("free: x (variable)"))
        .stdout(predicate::str::contains("syntax: ok"));
}

#[test]
fn test_scan_reports_syntax_errors_as_json() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("broken.jsonl");
    fs::write(&path, "{\"content\": \"def broken(:\", \"index\": 0}\n").expect("write");

    let mut cmd = cli();
    cmd.arg("scan").arg(&path).arg("--json");
    let output = cmd.assert().success().get_output().stdout.clone();
    let line: serde_json::Value = serde_json::from_slice(&output).expect("json line");
    assert_eq!(line["index"], 0);
    assert!(line["syntax_error"].is_string());
}

#[test]
fn test_missing_snippet_file_fails() {
    let tmp = TempDir::new().expect("tmp");
    let mut cmd = cli();
    cmd.arg("scan").arg(tmp.path().join("nope.json"));
    cmd.assert().failure().stderr(predicate::str::contains("Failed reading snippets"));
}
