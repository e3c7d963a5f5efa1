//! Drives the real `hive-model-worker` binary over its stdio pipes.

use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;
use tempfile::TempDir;

/// Run the worker in minimal mode, feed it `input`, and collect stdout lines.
fn run_worker(input: &str, extra_args: &[&str]) -> (Vec<Value>, std::process::ExitStatus) {
    let cache = TempDir::new().expect("Failed to create temp dir");

    let mut child = Command::new(env!("CARGO_BIN_EXE_hive-model-worker"))
        .args(["serve", "--mode", "minimal", "--model-cache-dir"])
        .arg(cache.path())
        .args(extra_args)
        .env("HIVE_ALLOW_DOWNLOAD", "false")
        .env("RUST_LOG", "debug")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn worker");

    {
        let mut stdin = child.stdin.take().expect("stdin is piped");
        stdin.write_all(input.as_bytes()).expect("Failed to write");
    }

    let output = child.wait_with_output().expect("Failed to wait for worker");
    let stdout = String::from_utf8(output.stdout).expect("stdout is UTF-8");
    let lines = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap_or_else(|e| panic!("{e}: {line}")))
        .collect();
    (lines, output.status)
}

#[test]
fn test_worker_answers_and_exits_cleanly_on_eof() {
    let input = concat!(
        r#"{"type":"health","request_id":"1"}"#,
        "\n",
        r#"{"type":"route_decision","request_id":"2","query":"What is 2+2?"}"#,
        "\n",
        r#"{"type":"embed","request_id":"3","texts":["fn main() {}","",""]}"#,
        "\n",
    );

    let (responses, status) = run_worker(input, &[]);

    assert!(status.success());
    assert_eq!(responses.len(), 4);

    assert_eq!(responses[0]["type"], "health_result");
    assert_eq!(responses[0]["request_id"], "startup");
    assert_eq!(responses[0]["mode"], "minimal");

    assert_eq!(responses[1]["request_id"], "1");
    assert_eq!(responses[1]["models_loaded"], serde_json::json!([]));

    assert_eq!(responses[2]["mode"], "simple");
    assert_eq!(responses[2]["confidence"], 0.8);

    let embeddings = responses[3]["embeddings"].as_array().unwrap();
    assert_eq!(embeddings.len(), 3);
    assert!(embeddings
        .iter()
        .all(|v| v.as_array().unwrap().len() == 384));
}

#[test]
fn test_worker_survives_garbage() {
    let input = "not json\n{\"type\":\"warp\",\"request_id\":\"w\"}\n{\"type\":\"health\",\"request_id\":\"h\"}\n";
    let (responses, status) = run_worker(input, &["--log-level", "warn"]);

    assert!(status.success());
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[1]["type"], "error");
    assert_eq!(responses[1]["request_id"], "unknown");
    assert_eq!(responses[2]["error"], "Unknown request type: warp");
    assert_eq!(responses[2]["request_id"], "w");
    assert_eq!(responses[3]["type"], "health_result");
}

#[test]
fn test_models_command_lists_catalog() {
    let cache = TempDir::new().expect("Failed to create temp dir");
    let output = Command::new(env!("CARGO_BIN_EXE_hive-model-worker"))
        .args(["models", "--model-cache-dir"])
        .arg(cache.path())
        .output()
        .expect("Failed to run worker");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("microsoft/codebert-base"));
    assert!(stdout.contains("sentence-transformers/all-MiniLM-L6-v2"));
    assert!(stdout.contains("minimal"));
}
