use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// How a pool may touch the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Creates the file if missing and switches it to WAL. Schema setup only.
    ReadWrite,
    /// Every analytics read. The file must already exist.
    ReadOnly,
}

pub async fn connect(config: &Config, access: Access) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    let base = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?;
    let options = match access {
        Access::ReadWrite => {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            base.create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        }
        Access::ReadOnly => base.read_only(true),
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    Ok(pool)
}
