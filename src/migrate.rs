//! Schema for the interaction-log tables.
//!
//! The analytics commands never write; this exists so a fresh database
//! (tests, local setups) has the tables the upstream logging service
//! populates. Every statement is idempotent. Timestamps are unix seconds.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::{self, Access};

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL DEFAULT '',
        full_name TEXT,
        is_admin INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS qa_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id TEXT NOT NULL UNIQUE,
        query TEXT NOT NULL,
        response TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT NOT NULL,
        liked INTEGER NOT NULL,
        reason TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rerank_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id TEXT NOT NULL,
        original_index INTEGER NOT NULL,
        content TEXT,
        relevance REAL NOT NULL,
        metadata TEXT,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (task_id) REFERENCES qa_logs(task_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS low_relevance_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        query TEXT NOT NULL,
        task_id TEXT NOT NULL DEFAULT '',
        original_index INTEGER NOT NULL,
        relevance_score REAL NOT NULL,
        content TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS no_result_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        query TEXT NOT NULL,
        task_id TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_feedback_message_id_liked ON feedback(message_id, liked)",
    "CREATE INDEX IF NOT EXISTS idx_feedback_created_at ON feedback(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_qa_logs_created_at ON qa_logs(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_rerank_results_task_id ON rerank_results(task_id)",
    "CREATE INDEX IF NOT EXISTS idx_low_relevance_score ON low_relevance_results(relevance_score)",
    "CREATE INDEX IF NOT EXISTS idx_low_relevance_created_at ON low_relevance_results(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_no_result_logs_created_at ON no_result_logs(created_at DESC)",
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config, Access::ReadWrite).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    for statement in TABLES.iter().chain(INDEXES) {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!(
        tables = TABLES.len(),
        indexes = INDEXES.len(),
        "schema ready"
    );
    Ok(())
}
