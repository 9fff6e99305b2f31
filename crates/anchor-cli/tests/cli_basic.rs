//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary HOME, so the
//! config file and database never leak between tests.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_anchor-cli"))
        .args(args)
        .env("HOME", home)
        .env_remove("ANCHOR_ENV")
        .env("ANCHOR_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn home() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn create_anchor(home: &Path, intention: &str) -> String {
    let (stdout, stderr, code) = run_cli(home, &["anchor", "create", intention, "--category", "health"]);
    assert_eq!(code, 0, "anchor create failed: {stderr}");
    stdout.trim().to_string()
}

#[test]
fn test_config_defaults() {
    let home = home();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "sync.timeout_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "15");
    assert!(home.path().join(".config/anchor/config.toml").exists());
}

#[test]
fn test_config_set_and_get() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "ritual.default_preset", "deep_charge"]);
    assert_eq!(code, 0, "config set failed: {stderr}");
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "ritual.default_preset"]);
    assert_eq!(stdout.trim(), "deep_charge");
}

#[test]
fn test_config_unknown_key_fails() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "sync.nope", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_anchor_create_and_list() {
    let home = home();
    let id = create_anchor(home.path(), "Sleep before midnight");
    let (stdout, _, code) = run_cli(home.path(), &["anchor", "list", "--json"]);
    assert_eq!(code, 0);
    let anchors: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(anchors.as_array().unwrap().len(), 1);
    assert_eq!(anchors[0]["id"], id.as_str());
    assert_eq!(anchors[0]["category"], "health");
}

#[test]
fn test_released_anchor_hidden_and_refused() {
    let home = home();
    let id = create_anchor(home.path(), "Let it go");
    let (_, _, code) = run_cli(home.path(), &["anchor", "release", &id]);
    assert_eq!(code, 0);

    let (stdout, _, _) = run_cli(home.path(), &["anchor", "list", "--json"]);
    let anchors: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(anchors.as_array().unwrap().is_empty());

    let (_, stderr, code) = run_cli(home.path(), &["ritual", "run", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("released"));
}

#[test]
fn test_streak_record_and_show() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["streak", "record", "any-anchor", "--type", "stabilize"]);
    assert_eq!(code, 0, "streak record failed: {stderr}");

    let (stdout, _, code) = run_cli(home.path(), &["streak", "show", "--json"]);
    assert_eq!(code, 0);
    let streak: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(streak["current_streak"], 1);
    assert_eq!(streak["longest_streak"], 1);
}

#[test]
fn test_streak_rejects_unknown_type() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["streak", "record", "a", "--type", "meditate"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown session type"));
}

#[test]
fn test_sync_anchors_from_fixture() {
    let home = home();
    let local = create_anchor(home.path(), "Local only");
    let fixture = home.path().join("fixture.json");
    std::fs::write(
        &fixture,
        r#"{"anchors": [
            {"id": "r1", "intentionText": "Remote one", "updatedAt": "2030-01-01T00:00:00Z"},
            {"id": "r2", "intention_text": "Remote two", "created_at": "2020-01-01"},
            {"intention_text": "no id"}
        ]}"#,
    )
    .unwrap();

    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["sync", "anchors", "--fixture", fixture.to_str().unwrap()],
    );
    assert_eq!(code, 0, "sync failed: {stderr}");
    assert!(stdout.contains("2 remote, 1 skipped, 3 total"));

    let (stdout, _, _) = run_cli(home.path(), &["anchor", "list", "--json"]);
    let anchors: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let ids: Vec<&str> = anchors
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["r1", local.as_str(), "r2"]);

    let (stdout, _, _) = run_cli(home.path(), &["sync", "status"]);
    assert!(stdout.contains("last synced:"));
}

#[test]
fn test_sync_without_base_url_fails() {
    let home = home();
    let (_, stderr, code) = run_cli(home.path(), &["sync", "anchors"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("sync.base_url"));
}

#[test]
fn test_sync_profile_from_fixture() {
    let home = home();
    let fixture = home.path().join("fixture.json");
    std::fs::write(
        &fixture,
        r#"{
            "user": {"id": "u1", "displayName": "Robin"},
            "stats": {"totalAnchors": 4},
            "anchors": [{"id": "a", "intention_text": "private", "is_charged": true}]
        }"#,
    )
    .unwrap();

    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["sync", "profile", "--json", "--fixture", fixture.to_str().unwrap()],
    );
    assert_eq!(code, 0, "profile failed: {stderr}");
    let profile: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(profile["user"]["display_name"], "Robin");
    assert_eq!(profile["stats"]["total_anchors"], 4);
    assert_eq!(profile["stats"]["charged_anchors"], 1);
    assert!(!stdout.contains("private"));
}

#[test]
fn test_ritual_presets() {
    let home = home();
    let (stdout, _, code) = run_cli(home.path(), &["ritual", "presets"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("quick_charge"));
    assert!(stdout.contains("deep_charge"));
}

#[test]
fn test_ritual_run_seals_and_records() {
    let home = home();
    let config_dir = home.path().join(".config/anchor");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        r#"
log_level = "warn"

[ritual]
haptics_enabled = false

[ritual.custom]
name = "blink"
total_duration_seconds = 2

[[ritual.custom.phases]]
title = "Blink"
duration_seconds = 2
seal_duration_seconds = 2
"#,
    )
    .unwrap();
    let id = create_anchor(home.path(), "Short and sweet");

    let (stdout, stderr, code) = run_cli(home.path(), &["ritual", "run", &id, "--json"]);
    assert_eq!(code, 0, "ritual run failed: {stderr}");
    assert!(stdout.contains("\"type\":\"ritual_started\""));
    assert!(stdout.contains("\"type\":\"sealed\""));
    assert!(stdout.contains("\"current_streak\": 1"));

    let (stdout, _, _) = run_cli(home.path(), &["anchor", "show", &id]);
    let anchor: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(anchor["is_charged"], true);
    assert_eq!(anchor["activation_count"], 1);

    let (stdout, _, _) = run_cli(home.path(), &["streak", "log"]);
    assert!(stdout.contains("\"type\":\"activate\""));
}
