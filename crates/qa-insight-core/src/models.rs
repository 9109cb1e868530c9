//! Core data models read from the interaction-log store.
//!
//! Every type here is a request-scoped snapshot of stored rows. Nothing in
//! the core mutates them once they have been read.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One low-relevance retrieval result logged for a query.
///
/// This is the unit that aggregation, tiering, deduplication and export all
/// operate on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRecord {
    /// Row id in the store.
    pub id: i64,
    /// Query text exactly as the user typed it.
    pub query: String,
    /// Position of the result in the retriever's original ranking.
    pub original_index: i64,
    /// Retrieved passage, if any was stored.
    pub content: Option<String>,
    /// Relevance score in `[0.0, 1.0]`.
    #[serde(rename = "relevance_score")]
    pub score: f64,
    pub created_at: DateTime<Utc>,
    /// QA task the result belongs to (empty when unknown).
    pub source_id: String,
}

/// A user's thumbs-up / thumbs-down on an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub id: i64,
    /// Task id of the QA log the feedback refers to.
    pub message_id: String,
    pub liked: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Query text of the matching QA log, when one exists.
    pub query: Option<String>,
}

/// A reranked retrieval result attached to a QA log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankResult {
    pub id: i64,
    pub task_id: String,
    pub original_index: i64,
    pub content: Option<String>,
    pub relevance: f64,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A question/answer exchange with its reranked evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaLog {
    pub id: i64,
    pub task_id: String,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
    /// Ordered by relevance, highest first.
    pub rerank_results: Vec<RerankResult>,
}

/// A query for which retrieval returned nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoResultLog {
    pub id: i64,
    pub query: String,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
}

/// Account listing entry. Credentials are never part of this model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// List response: one page of items plus the true total behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub total: u64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            total: 0,
            data: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

/// Format a timestamp the way exports and summaries print it (second precision).
pub fn format_ts_iso(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
