//! Report rendering for low-relevance results.
//!
//! Exports always run over the full, unpaginated, filtered record set.
//! [`prepare`] deduplicates and groups it; [`to_csv`] and [`to_pdf`] render
//! the resulting summaries. Both renderers are deterministic: identical
//! input yields byte-identical output, and the number of data rows equals
//! the number of deduplicated records.
//!
//! A renderer either returns the whole document or an [`ExportError`];
//! there is no partial output.

mod csv;
mod font;
mod pdf;

pub use csv::{to_csv, CSV_HEADER};
pub use font::ReportFont;
pub use pdf::{layout, to_pdf, Line, PdfLayout, PdfOptions};

use crate::aggregate::{aggregate, rank_by_count, QuerySummary};
use crate::dedupe::dedupe;
use crate::error::ExportError;
use crate::models::DetailRecord;

/// Content characters printed per record in reports.
pub const EXPORT_CONTENT_CHARS: usize = 200;

/// Deduplicate and group records for export, most frequent query first.
pub fn prepare(records: &[DetailRecord]) -> Vec<QuerySummary> {
    let mut summaries = aggregate(&dedupe(records));
    rank_by_count(&mut summaries);
    summaries
}

/// Number of data rows a report over `summaries` contains.
pub fn row_count(summaries: &[QuerySummary]) -> usize {
    summaries.iter().map(|s| s.details.len()).sum()
}

/// Reject summaries that cannot be serialized faithfully.
fn check(summaries: &[QuerySummary]) -> Result<(), ExportError> {
    for summary in summaries {
        if summary.count != summary.details.len() {
            return Err(ExportError::InconsistentSummary {
                query: summary.query.clone(),
                count: summary.count,
                details: summary.details.len(),
            });
        }
        if let Some(bad) = summary.details.iter().find(|d| !d.score.is_finite()) {
            return Err(ExportError::NonFiniteScore {
                id: bad.id,
                query: bad.query.clone(),
            });
        }
    }
    Ok(())
}
