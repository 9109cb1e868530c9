//! CSV rendering: one row per deduplicated record.

use std::fmt::Write;

use super::{check, EXPORT_CONTENT_CHARS};
use crate::aggregate::QuerySummary;
use crate::dedupe::truncate_chars;
use crate::error::ExportError;
use crate::models::format_ts_iso;

/// Fixed column order of the CSV export.
pub const CSV_HEADER: &str = "query,relevance_score,original_index,source_id,created_at,content";

/// Render summaries as UTF-8, comma-delimited CSV with a header row.
pub fn to_csv(summaries: &[QuerySummary]) -> Result<Vec<u8>, ExportError> {
    check(summaries)?;

    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');

    for summary in summaries {
        for record in &summary.details {
            let content = record
                .content
                .as_deref()
                .map(|c| truncate_chars(c, EXPORT_CONTENT_CHARS))
                .unwrap_or("");
            // writing into a String cannot fail
            let _ = writeln!(
                out,
                "{},{:.4},{},{},{},{}",
                csv_escape(&record.query),
                record.score,
                record.original_index,
                csv_escape(&record.source_id),
                format_ts_iso(&record.created_at),
                csv_escape(content),
            );
        }
    }

    Ok(out.into_bytes())
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
