//! Runs the built `edi` binary against temporary inputs

use std::path::Path;
use std::process::{Command, Output};

use tempfile::{NamedTempFile, TempPath};

const SCHEMA: &str = "name: EANCOM\nversion: D96A\nmessages: [ORDERS]\nsegments:\n  - tag: BGM\n    elements:\n      - id: C002\n      - id: \"1004\"\n        min_occurs: 1\n      - id: \"1225\"\n";

const ORDERS: &str = "UNA:+.? '\nUNB+UNOA:3+SENDER+RECEIVER+240101:1200+1'\nUNH+1+ORDERS:D:96A:UN'\nBGM+220+PO123+9'\nUNT+3+1'\nUNZ+1+1'\n";

/// Write `content` to a temporary file whose name ends in `.{extension}`
fn temp_file(extension: &str, content: &str) -> TempPath {
    let file = tempfile::Builder::new()
        .prefix("edi-cli-")
        .suffix(&format!(".{extension}"))
        .tempfile()
        .expect("temporary file should be creatable");
    std::fs::write(file.path(), content).expect("temporary file should be writable");
    NamedTempFile::into_temp_path(file)
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("temporary paths are UTF-8")
}

fn run_edi(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_edi"))
        .args(args)
        .output()
        .expect("run edi")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn parse_command_outputs_json_to_stdout() {
    let schema = temp_file("yaml", SCHEMA);
    let edi_input = temp_file("edi", ORDERS);

    let output = run_edi(&[
        "parse",
        arg(&edi_input),
        "--schema",
        arg(&schema),
        "--json",
        "--pretty",
    ]);

    assert!(
        output.status.success(),
        "expected parse to succeed; stdout: {}; stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        stderr(&output)
    );

    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout should be UTF-8");
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should contain valid JSON");
    assert!(parsed["document"].get("root").is_some());
    assert_eq!(parsed["document"]["metadata"]["sender"], "SENDER");
    assert_eq!(parsed["errors"].as_array().map(Vec::len), Some(0));

    assert!(stderr(&output).contains("Parse summary: messages=1, errors=0, warnings=0"));
}

#[test]
fn strict_parse_fails_on_reference_mismatch() {
    let schema = temp_file("yaml", SCHEMA);
    let edi_input = temp_file("edi", &ORDERS.replace("UNT+3+1'", "UNT+3+2'"));

    let output = run_edi(&[
        "--schema",
        arg(&schema),
        "--strict",
        "parse",
        arg(&edi_input),
    ]);

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("error [MESSAGE_ID_MISMATCH]: Message reference '2'"));
}

#[test]
fn unterminated_input_returns_fatal_exit_code() {
    let edi_input = temp_file("edi", "UNB+UNOA:3+SENDER+RECEIVER+240101:1200+1'\nUNH+1");

    let output = run_edi(&["parse", arg(&edi_input)]);

    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("fatal [UNTERMINATED_SEGMENT]"));
}

#[test]
fn invalid_config_returns_usage_exit_code() {
    let bad_config = temp_file("yaml", "color: neon");
    let edi_input = temp_file("edi", ORDERS);

    let output = run_edi(&["--config", arg(&bad_config), "parse", arg(&edi_input)]);

    assert_eq!(output.status.code(), Some(3));
    assert!(
        stderr(&output).contains("ERROR:"),
        "expected error prefix; stderr: {}",
        stderr(&output)
    );
}

#[test]
fn batch_command_reports_each_file() {
    let schema = temp_file("yaml", SCHEMA);
    let good = temp_file("edi", ORDERS);
    let bad = temp_file("edi", "UNB+UNOA:3+S+R+240101:1200+1'UNH");

    let output = run_edi(&[
        "batch",
        arg(&good),
        arg(&bad),
        "--schema",
        arg(&schema),
        "--json",
    ]);

    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should contain valid JSON");
    let statuses: Vec<&str> = parsed
        .as_array()
        .expect("batch output should be a JSON array")
        .iter()
        .filter_map(|file| file["status"].as_str())
        .collect();
    assert_eq!(statuses, ["accepted", "failed"]);
    assert!(stderr(&output).contains("Batch summary: files=2, successful=1, failed=1"));
}
