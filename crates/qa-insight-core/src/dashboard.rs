//! Top-level dashboard rollup.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::NoResultSummary;
use crate::models::FeedbackRecord;

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_RECENT_FEEDBACK: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentFeedback {
    pub id: i64,
    pub query: Option<String>,
    pub liked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_feedback: usize,
    pub positive_feedback_count: usize,
    pub negative_feedback_count: usize,
    pub recent_feedback: Vec<RecentFeedback>,
    pub top_no_result_queries: Vec<NoResultSummary>,
}

#[derive(Debug, Clone, Copy)]
pub struct DashboardSummarizer {
    pub top_n: usize,
    pub recent: usize,
}

impl Default for DashboardSummarizer {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            recent: DEFAULT_RECENT_FEEDBACK,
        }
    }
}

impl DashboardSummarizer {
    /// Roll up all feedback in the window plus the ranked no-result groups.
    ///
    /// `no_result` must already be sorted by count (see
    /// [`summarize_no_results`](crate::aggregate::summarize_no_results));
    /// only its first `top_n` entries are kept. Empty input yields zeroed
    /// counts and empty lists.
    pub fn summarize(
        &self,
        feedback: &[FeedbackRecord],
        no_result: &[NoResultSummary],
    ) -> DashboardSummary {
        let total_feedback = feedback.len();
        let positive_feedback_count = feedback.iter().filter(|f| f.liked).count();

        let mut recent: Vec<&FeedbackRecord> = feedback.iter().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let recent_feedback = recent
            .into_iter()
            .take(self.recent)
            .map(|f| RecentFeedback {
                id: f.id,
                query: f.query.clone(),
                liked: f.liked,
                created_at: f.created_at,
            })
            .collect();

        DashboardSummary {
            total_feedback,
            positive_feedback_count,
            negative_feedback_count: total_feedback - positive_feedback_count,
            recent_feedback,
            top_no_result_queries: no_result.iter().take(self.top_n).cloned().collect(),
        }
    }
}
