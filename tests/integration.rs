use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn activity_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("activity");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/activity.sqlite"

[server]
bind = "127.0.0.1:7341"

[query]
default_page_size = 20
"#,
        root.display()
    );

    let config_path = config_dir.join("activity.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_activity(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = activity_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run activity binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn minutes_before(base: DateTime<Utc>, mins: i64) -> String {
    (base - Duration::minutes(mins)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Two sessions inside the last day, one a week old, and two bad lines.
fn write_log(dir: &Path) -> PathBuf {
    let base = Utc::now();
    let lines = [
        format!(
            r#"{{"session_id":"alpha","phase":"data_collection","operation":"read_file: a.rs","timestamp":"{}","files_processed":1,"total_files":3}}"#,
            minutes_before(base, 30)
        ),
        format!(
            r#"{{"session_id":"alpha","phase":"analysis","operation":"grep: TODO","timestamp":"{}","files_processed":3,"total_files":3}}"#,
            minutes_before(base, 29)
        ),
        String::new(),
        format!(
            r#"{{"session_id":"beta","phase":"generation","operation":"write_file: b.rs","timestamp":"{}"}}"#,
            minutes_before(base, 10)
        ),
        format!(
            r#"{{"session_id":"gamma","phase":"analysis","operation":"grep: x","timestamp":"{}"}}"#,
            minutes_before(base, 7 * 24 * 60)
        ),
        r#"{"phase":"analysis","timestamp":"2024-01-01T00:00:00Z"}"#.to_string(),
        "this is not json".to_string(),
    ];
    let path = dir.join("agent-log.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn parse_json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_activity(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/activity.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_activity(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_activity(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_reports_accepted_and_rejected() {
    let (tmp, config_path) = setup_test_env();
    let log = write_log(tmp.path());

    run_activity(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_activity(&config_path, &["ingest", log.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("accepted: 4"), "stdout={}", stdout);
    assert!(stdout.contains("rejected: 2"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_sessions_lists_newest_first() {
    let (tmp, config_path) = setup_test_env();
    let log = write_log(tmp.path());

    run_activity(&config_path, &["init"]);
    run_activity(&config_path, &["ingest", log.to_str().unwrap()]);

    let (stdout, stderr, success) = run_activity(&config_path, &["sessions"]);
    assert!(success, "sessions failed: stdout={}, stderr={}", stdout, stderr);
    let json = parse_json(&stdout);

    let ids: Vec<&str> = json["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["session_id"].as_str().unwrap())
        .collect();
    // alpha started 30 minutes ago, beta 10; gamma a week ago.
    assert_eq!(ids, vec!["beta", "alpha", "gamma"]);

    let alpha = &json["sessions"][1];
    assert_eq!(alpha["operation_count"], 2);
    assert_eq!(alpha["files_processed"], 3);
    assert_eq!(alpha["phases"], serde_json::json!(["data_collection", "analysis"]));

    assert_eq!(json["pagination"]["page"], 1);
    assert_eq!(json["pagination"]["page_size"], 20);
    assert_eq!(json["pagination"]["total_pages"], 1);
    assert_eq!(json["pagination"]["total_count"], 3);
}

#[test]
fn test_sessions_paging_flags() {
    let (tmp, config_path) = setup_test_env();
    let log = write_log(tmp.path());

    run_activity(&config_path, &["init"]);
    run_activity(&config_path, &["ingest", log.to_str().unwrap()]);

    let (stdout, _, success) =
        run_activity(&config_path, &["sessions", "--page", "2", "--page-size", "2"]);
    assert!(success);
    let json = parse_json(&stdout);
    assert_eq!(json["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(json["sessions"][0]["session_id"], "gamma");
    assert_eq!(json["pagination"]["total_pages"], 2);

    let (_, stderr, success) = run_activity(&config_path, &["sessions", "--page", "0"]);
    assert!(!success, "page 0 should be rejected");
    assert!(stderr.contains("page"), "stderr={}", stderr);
}

#[test]
fn test_stats_covers_last_day_only() {
    let (tmp, config_path) = setup_test_env();
    let log = write_log(tmp.path());

    run_activity(&config_path, &["init"]);
    run_activity(&config_path, &["ingest", log.to_str().unwrap()]);

    let (stdout, stderr, success) = run_activity(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    let json = parse_json(&stdout);

    assert_eq!(json["total_logs"], 4);
    let day = &json["last_24_hours"];
    assert_eq!(day["operations"], 3);
    assert_eq!(day["phase_distribution"]["analysis"], 1);
    assert_eq!(day["phase_distribution"]["generation"], 1);
    assert_eq!(day["operation_types"]["grep: TODO"], 1);
    // One gap of one minute inside alpha; beta has a single record.
    assert_eq!(day["avg_duration_ms"].as_f64().unwrap(), 60_000.0);

    assert_eq!(json["tool_usage"]["tool_usage"]["read_file"], 1);
    assert_eq!(json["tool_usage"]["tool_usage"]["grep"], 1);
    assert_eq!(json["tool_usage"]["total_operations"], 3);

    let (stdout, _, success) = run_activity(&config_path, &["stats", "--hours", "720"]);
    assert!(success);
    let json = parse_json(&stdout);
    assert_eq!(json["last_24_hours"]["operations"], 4);
}

#[test]
fn test_stats_on_empty_log() {
    let (_tmp, config_path) = setup_test_env();
    run_activity(&config_path, &["init"]);

    let (stdout, stderr, success) = run_activity(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    let json = parse_json(&stdout);
    assert_eq!(json["total_logs"], 0);
    assert_eq!(json["last_24_hours"]["operations"], 0);
    assert_eq!(json["last_24_hours"]["avg_duration_ms"].as_f64().unwrap(), 0.0);
    assert_eq!(json["last_24_hours"]["phase_distribution"], serde_json::json!({}));
    assert_eq!(json["tool_usage"]["tool_usage"], serde_json::json!({}));
}

#[test]
fn test_missing_config_fails() {
    let (stdout, stderr, success) =
        run_activity(Path::new("/nonexistent/activity.toml"), &["init"]);
    assert!(!success, "expected failure: stdout={}", stdout);
    assert!(stderr.contains("config"), "stderr={}", stderr);
}
