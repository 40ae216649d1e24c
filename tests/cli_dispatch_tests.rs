use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_podium"));
    command.env("PODIUM_CONFIG", "definitely/not/here/podium.yaml");
    command
}

fn unique_temp_path(name: &str, extension: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("podium-{name}-{stamp}.{extension}"))
}

#[test]
fn simulate_command_dispatches_and_emits_json() {
    let output = bin()
        .args(["simulate", "60", "11", "--workers", "2"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("simulate should emit json");
    assert_eq!(payload["ticks"].as_u64(), Some(60));
    assert!(payload["spawned"].as_u64().unwrap_or(0) > 0);
    assert!(payload["best_live"].is_object());
}

#[test]
fn simulate_table_output() {
    let output = bin()
        .args(["simulate", "5", "1", "--table"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("ticks\tspawned"));
}

#[test]
fn unknown_command_prints_usage() {
    let output = bin().arg("launch").output().expect("binary should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: podium"));
}

#[test]
fn export_requires_a_path() {
    let output = bin().arg("export").output().expect("export should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: podium export"));
}

#[test]
fn export_then_leaderboard_round_trip() {
    let json_path = unique_temp_path("finalists", "json");
    let json_arg = json_path.to_string_lossy().to_string();

    let output = bin()
        .args(["export", json_arg.as_str(), "300", "5"])
        .output()
        .expect("export should run");
    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("export complete"));

    let raw = fs::read_to_string(&json_path).expect("json export should exist");
    let payload: serde_json::Value = serde_json::from_str(&raw).expect("export is json");
    assert!(payload["exported_at"].is_string());
    let records = payload["records"].as_array().expect("records array").len();

    let csv_path = json_path.with_extension("csv");
    let csv = fs::read_to_string(&csv_path).expect("csv export should exist");
    assert!(csv.starts_with("name,lineage,rank,generation,score"));
    assert_eq!(csv.lines().count(), records + 1);

    let output = bin()
        .args(["leaderboard", json_arg.as_str()])
        .output()
        .expect("leaderboard should run");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), records + 1);

    let resumed = bin()
        .args(["simulate", "10", "9", "--finalists", json_arg.as_str()])
        .output()
        .expect("resume should run");
    assert_eq!(resumed.status.code(), Some(0));
    let payload: serde_json::Value =
        serde_json::from_slice(&resumed.stdout).expect("simulate should emit json");
    assert!(payload["finalists"].as_u64().unwrap_or(0) as usize >= records.min(1));

    let _ = fs::remove_file(json_path);
    let _ = fs::remove_file(csv_path);
}

#[test]
fn config_command_rejects_invalid_file() {
    let path = unique_temp_path("bad-config", "json");
    fs::write(&path, r#"{"finalist_count": 0}"#).expect("fixture should be written");

    let output = bin()
        .args(["config", path.to_string_lossy().as_ref()])
        .output()
        .expect("config should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("finalist_count"));

    let _ = fs::remove_file(path);
}

#[test]
fn config_command_prints_defaults_when_missing() {
    let output = bin().arg("config").output().expect("config should run");

    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("config should emit json");
    assert_eq!(payload["finalist_count"].as_u64(), Some(3));
    assert_eq!(payload["unscored_death"].as_str(), Some("count_as_zero"));
}
