// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push("labwired-rtos-tests");
    dir.push(format!("{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn write_temp_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_labwired-rtos"))
        .args(args)
        .output()
        .expect("Failed to run labwired-rtos")
}

fn read_result(dir: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(dir.join("result.json")).expect("result.json missing");
    serde_json::from_str(&text).expect("result.json is not JSON")
}

const PASSING: &str = r#"
schema_version: "1.0"
name: "queue and watermark"
steps:
  - queue_create: { name: q0, length: 7, item_size: 2 }
  - queue_send: { queue: q0, data: "x", ok: true }
  - queue_send: { queue: q0, data: "y", ok: true }
  - queue_waiting: { queue: q0, expect: 2 }
  - queue_receive: { queue: q0, expect: "x" }
  - queue_spaces: { queue: q0, expect: 19 }
  - high_water_mark: { task: current, expect: 1500 }
  - high_water_mark: { task: current, expect: 1564 }
"#;

#[test]
fn test_run_passing_scenario_writes_result() {
    let dir = temp_dir("pass");
    let script = write_temp_file(&dir, "scenario.yaml", PASSING);
    let out_dir = dir.join("artifacts");

    let output = run(&[
        "run",
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result = read_result(&out_dir);
    assert_eq!(result["result_schema_version"], "1.0");
    assert_eq!(result["status"], "pass");
    assert_eq!(result["scenario"], "queue and watermark");
    assert_eq!(result["steps_executed"], 8);
    assert_eq!(result["failures"], 0);
    assert_eq!(result["script_hash"].as_str().unwrap().len(), 64);
    assert_eq!(result["snapshot"]["queues"][0]["messages_waiting"], 1);
    assert_eq!(result["snapshot"]["tasks"]["watermark_position"], 1);
}

#[test]
fn test_run_failing_expectation_exits_one() {
    let dir = temp_dir("fail");
    let script = write_temp_file(
        &dir,
        "scenario.yaml",
        r#"
schema_version: "1.0"
steps:
  - ringbuf_create: { name: rb, size: 100 }
  - ringbuf_free_size: { ringbuf: rb, expect: 12800 }
  - ringbuf_send: { ringbuf: rb, data: "hello" }
  - ringbuf_free_size: { ringbuf: rb, expect: 12800 }
"#,
    );
    let out_dir = dir.join("artifacts");

    let output = run(&[
        "run",
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));

    let result = read_result(&out_dir);
    assert_eq!(result["status"], "fail");
    assert_eq!(result["failures"], 1);
    assert_eq!(result["steps"][3]["op"], "ringbuf_free_size");
    assert_eq!(result["steps"][3]["passed"], false);
    assert_eq!(result["steps"][3]["observed"], 12672);
}

#[test]
fn test_run_invalid_script_exits_two() {
    let dir = temp_dir("invalid");
    let script = write_temp_file(
        &dir,
        "scenario.yaml",
        r#"
schema_version: "1.0"
steps:
  - queue_send: { queue: missing, data: "x" }
"#,
    );
    let out_dir = dir.join("artifacts");

    let output = run(&[
        "run",
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));

    let result = read_result(&out_dir);
    assert_eq!(result["status"], "error");
    assert!(result["message"].as_str().unwrap().contains("missing"));
}

#[test]
fn test_run_resolves_config_relative_to_script() {
    let dir = temp_dir("config");
    write_temp_file(
        &dir,
        "sim.yaml",
        r#"
queues:
  max_queues: 1
  max_elements: 3
"#,
    );
    let script = write_temp_file(
        &dir,
        "scenario.yaml",
        r#"
schema_version: "1.0"
config: "sim.yaml"
steps:
  - queue_create: { name: a, ok: true }
  - queue_create: { name: b, ok: false }
  - queue_spaces: { queue: a, expect: 3 }
"#,
    );

    let output = run(&["run", "--script", script.to_str().unwrap()]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_run_missing_config_exits_two() {
    let dir = temp_dir("missing-config");
    let script = write_temp_file(&dir, "scenario.yaml", PASSING);
    let missing = dir.join("nope.yaml");

    let output = run(&[
        "run",
        "--script",
        script.to_str().unwrap(),
        "--config",
        missing.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_snapshot_prints_fresh_state() {
    let dir = temp_dir("snapshot");
    let config = write_temp_file(
        &dir,
        "sim.yaml",
        r#"
tasks:
  first_handle: 500
"#,
    );

    let output = run(&["snapshot", "--config", config.to_str().unwrap()]);
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("snapshot is not JSON");
    assert_eq!(json["tasks"]["next_handle"], 500);
    assert_eq!(json["tasks"]["current_handle"], 42);
    assert!(json["queues"].as_array().unwrap().is_empty());
}
