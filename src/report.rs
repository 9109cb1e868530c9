//! `qai report`: export low-relevance results to a CSV or PDF file.
//!
//! Uses the same window validation and export pipeline as the HTTP export
//! endpoints, so a CLI report over a given filter is byte-identical to the
//! one the server would return.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use qa_insight_core::analytics::{self, Report, ReportFormat};
use qa_insight_core::window::WindowParams;

use crate::config::Config;
use crate::db::{self, Access};
use crate::sqlite_store::SqliteStore;

/// Run the report command. Writes to `output`, or stdout when it is `None`.
pub async fn run_report(
    config: &Config,
    format: ReportFormat,
    params: &WindowParams,
    output: Option<PathBuf>,
) -> Result<()> {
    let window = config.reports.query_window().validate(params)?;
    let pdf = config.reports.pdf_options()?;

    let store = SqliteStore::new(db::connect(config, Access::ReadOnly).await?);
    let report = analytics::export_report(
        &store,
        &window.filter,
        format,
        &pdf,
    )
    .await?;
    store.pool().close().await;

    tracing::info!(
        format = format.extension(),
        rows = report.rows,
        filter = %window.filter.describe(),
        "report rendered"
    );

    match output {
        Some(path) => {
            write_report(&report, &path)?;
            eprintln!(
                "Wrote {} rows ({} bytes) to {}",
                report.rows,
                report.bytes.len(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&report.bytes)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Write the whole report or nothing: bytes go to a temp file in the target
/// directory that is renamed over `path` once complete. The temp file is
/// removed if any step fails.
fn write_report(report: &Report, path: &Path) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(&report.bytes)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move report into place: {}", path.display()))?;
    Ok(())
}
