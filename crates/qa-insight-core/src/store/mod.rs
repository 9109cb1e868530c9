//! Read-only storage abstraction.
//!
//! The [`AnalyticsStore`] trait is the only way the analytics pipeline sees
//! stored rows. It exposes filtered reads and paginated reads with true
//! totals, and nothing that writes. The SQLite implementation lives in the
//! application crate; [`memory::InMemoryStore`] backs tests.
//!
//! Implementations must be `Send + Sync` so a single store can be shared
//! behind an `Arc` by concurrent request handlers.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DetailRecord, FeedbackRecord, NoResultLog, Page, QaLog, User};
use crate::window::{Paging, RecordFilter};

/// Abstract read-only backend over the interaction-log tables.
///
/// Filters are applied by the store with the same semantics as
/// [`RecordFilter::matches`]: substring search on query text that folds
/// ASCII case only, inclusive date and score bounds. Fields a table does
/// not carry (e.g. scores on QA logs) are ignored.
///
/// # Operations
///
/// | Method | Rows | Order |
/// |--------|------|-------|
/// | [`low_relevance`](AnalyticsStore::low_relevance) | all matching low-relevance results | id ascending |
/// | [`low_relevance_page`](AnalyticsStore::low_relevance_page) | one page of them | newest first |
/// | [`qa_logs`](AnalyticsStore::qa_logs) | one page of QA logs with rerank results | newest first |
/// | [`feedback`](AnalyticsStore::feedback) | all matching feedback, joined to query text | id ascending |
/// | [`no_result_logs`](AnalyticsStore::no_result_logs) | all matching no-result logs | id ascending |
/// | [`users`](AnalyticsStore::users) | one page of users | id ascending |
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Full, unpaginated filtered set. Export and aggregation read this.
    async fn low_relevance(&self, filter: &RecordFilter) -> Result<Vec<DetailRecord>>;

    /// The same predicate as [`low_relevance`](AnalyticsStore::low_relevance),
    /// paginated. `total` is the filtered row count.
    async fn low_relevance_page(
        &self,
        filter: &RecordFilter,
        paging: &Paging,
    ) -> Result<Page<DetailRecord>>;

    async fn qa_logs(&self, filter: &RecordFilter, paging: &Paging) -> Result<Page<QaLog>>;

    /// Feedback entries; `search` matches the joined query text, so entries
    /// without a matching QA log only appear when no search is given.
    async fn feedback(&self, filter: &RecordFilter) -> Result<Vec<FeedbackRecord>>;

    async fn no_result_logs(&self, filter: &RecordFilter) -> Result<Vec<NoResultLog>>;

    async fn users(&self, paging: &Paging) -> Result<Page<User>>;
}
