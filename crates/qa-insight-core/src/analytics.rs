//! Read pipelines: store read → aggregate/tier/dedupe → response or report.
//!
//! Everything here goes through the [`AnalyticsStore`] trait and holds no
//! state between calls. The HTTP server and the CLI both call these
//! functions, so listings and exports share one filter predicate.

use anyhow::Result;

use crate::aggregate::{
    aggregate, rank_by_count, summarize_feedback, summarize_no_results, FeedbackSummary,
    NoResultSummary, QuerySummary,
};
use crate::dashboard::{DashboardSummarizer, DashboardSummary};
use crate::export::{self, PdfOptions};
use crate::models::{DetailRecord, Page, QaLog, User};
use crate::store::AnalyticsStore;
use crate::window::{Paging, ReadWindow, RecordFilter};

/// Low-relevance groups ranked by count, paginated over groups.
///
/// `total` is the number of groups. Listing never deduplicates.
pub async fn low_relevance_summaries<S: AnalyticsStore + ?Sized>(
    store: &S,
    window: &ReadWindow,
) -> Result<Page<QuerySummary>> {
    let records = store.low_relevance(&window.filter).await?;
    let mut summaries = aggregate(&records);
    rank_by_count(&mut summaries);
    Ok(window.paging.apply(summaries))
}

/// Raw low-relevance rows, paginated; `total` is the stored row count.
pub async fn low_relevance_details<S: AnalyticsStore + ?Sized>(
    store: &S,
    window: &ReadWindow,
) -> Result<Page<DetailRecord>> {
    store
        .low_relevance_page(&window.filter, &window.paging)
        .await
}

pub async fn qa_logs<S: AnalyticsStore + ?Sized>(
    store: &S,
    window: &ReadWindow,
) -> Result<Page<QaLog>> {
    store.qa_logs(&window.filter, &window.paging).await
}

pub async fn users<S: AnalyticsStore + ?Sized>(store: &S, paging: &Paging) -> Result<Page<User>> {
    store.users(paging).await
}

pub async fn feedback_summary<S: AnalyticsStore + ?Sized>(
    store: &S,
    limit: usize,
) -> Result<Vec<FeedbackSummary>> {
    let feedback = store.feedback(&RecordFilter::default()).await?;
    Ok(summarize_feedback(&feedback, limit))
}

pub async fn no_result_summary<S: AnalyticsStore + ?Sized>(
    store: &S,
    filter: &RecordFilter,
    limit: usize,
) -> Result<Vec<NoResultSummary>> {
    let logs = store.no_result_logs(filter).await?;
    let mut summaries = summarize_no_results(&logs);
    summaries.truncate(limit);
    Ok(summaries)
}

pub async fn dashboard<S: AnalyticsStore + ?Sized>(
    store: &S,
    summarizer: &DashboardSummarizer,
) -> Result<DashboardSummary> {
    let all = RecordFilter::default();
    let feedback = store.feedback(&all).await?;
    let no_result = summarize_no_results(&store.no_result_logs(&all).await?);
    Ok(summarizer.summarize(&feedback, &no_result))
}

/// Output format of a low-relevance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Pdf,
}

impl ReportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Csv => "text/csv; charset=utf-8",
            ReportFormat::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Pdf => "pdf",
        }
    }
}

/// A rendered report and the number of data rows in it.
#[derive(Debug, Clone)]
pub struct Report {
    pub format: ReportFormat,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

/// Export the full filtered set: no paging, duplicates removed.
///
/// Render failures surface as [`ExportError`](crate::error::ExportError)
/// inside the returned error.
pub async fn export_report<S: AnalyticsStore + ?Sized>(
    store: &S,
    filter: &RecordFilter,
    format: ReportFormat,
    pdf: &PdfOptions,
) -> Result<Report> {
    let records = store.low_relevance(filter).await?;
    let summaries = export::prepare(&records);
    let bytes = match format {
        ReportFormat::Csv => export::to_csv(&summaries)?,
        ReportFormat::Pdf => export::to_pdf(&summaries, filter, pdf)?,
    };
    Ok(Report {
        format,
        rows: export::row_count(&summaries),
        bytes,
    })
}
