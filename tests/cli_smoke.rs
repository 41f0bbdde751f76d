use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn sitehook() -> Command {
    Command::cargo_bin("sitehook").expect("sitehook binary")
}

fn demo_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/chat_page.yaml")
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output")
}

#[test]
fn simulate_mounts_inserts_and_submits() {
    let fixture = demo_fixture();
    let assert = sitehook()
        .args(["--output", "json", "simulate"])
        .arg(&fixture)
        .args(["--insert", "hello", "--submit"])
        .assert()
        .success();

    let value: Value = serde_json::from_str(&stdout_of(&assert)).expect("valid json");
    assert_eq!(value["state"].as_str(), Some("active"));
    assert_eq!(value["mount_status"]["status"].as_str(), Some("mounted"));
    assert_eq!(value["insert"].as_bool(), Some(true));
    assert_eq!(value["submit"].as_bool(), Some(true));
    assert_eq!(value["input_content"].as_str(), Some("hello"));

    let topics: Vec<&str> = value["events"]
        .as_array()
        .expect("events array")
        .iter()
        .filter_map(|event| event["topic"].as_str())
        .collect();
    assert_eq!(topics.first().copied(), Some("adapter:activated"));
    assert_eq!(
        topics
            .iter()
            .filter(|topic| **topic == "tool:execution-completed")
            .count(),
        2
    );
    assert_eq!(topics.last().copied(), Some("adapter:deactivated"));
}

#[test]
fn simulate_honours_config_and_skips_unrequested_steps() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("sitehook.yaml");
    std::fs::write(&config, "store:\n  auto_submit: true\n").unwrap();

    let assert = sitehook()
        .arg("--config")
        .arg(&config)
        .args(["--output", "json", "simulate"])
        .arg(demo_fixture())
        .args(["--insert", "hi", "--enable-mcp"])
        .assert()
        .success();
    let value: Value = serde_json::from_str(&stdout_of(&assert)).expect("valid json");
    assert_eq!(value["insert"].as_bool(), Some(true));
    assert!(value.get("submit").is_none());
    assert_eq!(value["toggle_state"]["mcpEnabled"].as_bool(), Some(true));
    assert_eq!(value["toggle_state"]["autoSubmit"].as_bool(), Some(true));
    assert_eq!(value["toggle_state"]["autoInsert"].as_bool(), Some(true));
}

#[test]
fn config_validate_rejects_bad_selectors() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("bad.yaml");
    std::fs::write(
        &config,
        "adapter:\n  site:\n    chat_input_selectors:\n      - 'textarea:focus'\n",
    )
    .unwrap();

    sitehook()
        .arg("--config")
        .arg(&config)
        .args(["config", "validate"])
        .assert()
        .failure();
}

#[test]
fn config_get_and_path_use_the_loaded_file() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("sitehook.yaml");
    std::fs::write(&config, "bus_capacity: 16\n").unwrap();

    let assert = sitehook()
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "bus_capacity"])
        .assert()
        .success();
    assert_eq!(stdout_of(&assert).trim(), "16");

    let assert = sitehook()
        .arg("--config")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success();
    assert_eq!(stdout_of(&assert).trim(), config.display().to_string());
}

#[test]
fn info_lists_capabilities() {
    let assert = sitehook()
        .args(["--output", "json", "info"])
        .assert()
        .success();
    let value: Value = serde_json::from_str(&stdout_of(&assert)).expect("valid json");
    assert_eq!(value["adapter"].as_str(), Some("mistral-adapter"));
    let capabilities = value["capabilities"].as_array().expect("capabilities");
    assert!(capabilities
        .iter()
        .any(|cap| cap.as_str() == Some("text-insertion")));
}
