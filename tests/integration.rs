//! End-to-end tests of the `qai` binary against a temp database.

use chrono::{TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn qai_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_qai"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/qa.sqlite"

[server]
bind = "127.0.0.1:7340"

[reports]
top_n = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("qai.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_qai(config: &Path, args: &[&str]) -> Output {
    Command::new(qai_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run qai")
}

fn run_ok(config: &Path, args: &[&str]) -> Output {
    let output = run_qai(config, args);
    assert!(
        output.status.success(),
        "qai {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// Writes rows the way the upstream logging service would.
async fn seed(db_path: &Path) {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", db_path.display()))
        .await
        .unwrap();
    let base = Utc.with_ymd_and_hms(2024, 6, 3, 8, 30, 0).unwrap().timestamp();

    let rows = [
        ("reset vpn token", "Open the self-service portal", 0.31),
        ("reset vpn token", "Open the self-service portal", 0.31),
        ("reset vpn token", "Token sync guide", 0.52),
        ("printer offline", "Check the print spooler", 0.45),
        ("wifi", "Guest network", 0.05),
    ];
    for (i, (query, content, score)) in rows.iter().enumerate() {
        sqlx::query(
            "INSERT INTO low_relevance_results (query, task_id, original_index, relevance_score, content, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(*query)
        .bind(format!("task-{}", i))
        .bind(i as i64)
        .bind(*score)
        .bind(*content)
        .bind(base + i as i64)
        .execute(&pool)
        .await
        .unwrap();
    }

    sqlx::query("INSERT INTO qa_logs (task_id, query, response, created_at) VALUES ('t1', 'vpn', 'a', ?)")
        .bind(base)
        .execute(&pool)
        .await
        .unwrap();
    for (liked, offset) in [(true, 1), (false, 2), (false, 3)] {
        sqlx::query("INSERT INTO feedback (message_id, liked, created_at) VALUES ('t1', ?, ?)")
            .bind(liked)
            .bind(base + offset)
            .execute(&pool)
            .await
            .unwrap();
    }
    for query in ["parking permit", "parking permit", "holiday calendar"] {
        sqlx::query("INSERT INTO no_result_logs (query, task_id, created_at) VALUES (?, 'n', ?)")
            .bind(query)
            .bind(base)
            .execute(&pool)
            .await
            .unwrap();
    }

    pool.close().await;
}

async fn initialized_env() -> (TempDir, PathBuf) {
    let (tmp, config) = setup_test_env();
    run_ok(&config, &["init"]);
    seed(&tmp.path().join("data/qa.sqlite")).await;
    (tmp, config)
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config) = setup_test_env();
    let output = run_ok(&config, &["init"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("initialized"));
    assert!(tmp.path().join("data/qa.sqlite").exists());
    run_ok(&config, &["init"]);
}

#[tokio::test]
async fn test_report_csv_to_file() {
    let (tmp, config) = initialized_env().await;
    let out = tmp.path().join("reports/vpn.csv");

    let output = run_ok(
        &config,
        &[
            "report",
            "csv",
            "--search",
            "vpn",
            "--output",
            out.to_str().unwrap(),
        ],
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("Wrote 2 rows"));

    let csv = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("reset vpn token,0.3100,0,task-0,"));
    assert!(lines[2].starts_with("reset vpn token,0.5200,2,task-2,"));
}

#[tokio::test]
async fn test_report_pdf_to_stdout() {
    let (_tmp, config) = initialized_env().await;
    let output = run_ok(&config, &["report", "pdf", "--max-score", "0.5"]);
    assert!(output.stdout.starts_with(b"%PDF-"));
    let doc = lopdf::Document::load_mem(&output.stdout).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[tokio::test]
async fn test_report_rejects_bad_window() {
    let (_tmp, config) = initialized_env().await;
    let output = run_qai(&config, &["report", "csv", "--min-score", "2"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("min_score"));
}

#[tokio::test]
async fn test_stats_and_no_results() {
    let (_tmp, config) = initialized_env().await;

    let stats = String::from_utf8(run_ok(&config, &["stats"]).stdout).unwrap();
    assert!(stats.contains("Feedback:    3"));
    assert!(stats.contains("Positive:    1 (33%)"));
    assert!(stats.contains("Negative:    2 (66%)"));
    assert!(stats.contains("parking permit"));

    let ranking = String::from_utf8(run_ok(&config, &["no-results", "--limit", "1"]).stdout).unwrap();
    assert!(ranking.contains("parking permit"));
    assert!(!ranking.contains("holiday calendar"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let output = run_qai(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config file"));
}
