//! CLI smoke tests: verify basic binary behavior.

use std::process::Command;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_quizboard"));
    cmd.env_remove("QUIZBOARD_DB_PATH")
        .env_remove("QUIZBOARD_CONFIG")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("leaderboard"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("quizboard"),
        "Expected crate name in --version output"
    );
}

#[test]
fn test_stats_on_fresh_database() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("smoke.db");
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_quizboard_config_12345.toml")
        .arg("--db")
        .arg(&db)
        .arg("stats")
        .output()
        .expect("failed to run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total_users"], 0);
    assert_eq!(stats["total_games"], 0);
    assert!(db.exists());
}

#[test]
fn test_empty_leaderboard_prints_empty_list() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = cli_bin()
        .arg("--db")
        .arg(dir.path().join("board.db"))
        .arg("leaderboard")
        .arg("science")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let board: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(board, serde_json::json!([]));
}
