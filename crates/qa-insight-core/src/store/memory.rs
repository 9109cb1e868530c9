//! In-memory [`AnalyticsStore`] implementation for tests and fixtures.
//!
//! Rows are loaded up front through the `with_*` builders and never change
//! afterwards, so reads need no locking.

use anyhow::Result;
use async_trait::async_trait;
use std::cmp::Reverse;

use crate::models::{DetailRecord, FeedbackRecord, NoResultLog, Page, QaLog, User};
use crate::window::{Paging, RecordFilter};

use super::AnalyticsStore;

/// Vec-backed store. Feedback is joined to QA logs on read, like the SQL join.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    low_relevance: Vec<DetailRecord>,
    qa_logs: Vec<QaLog>,
    feedback: Vec<FeedbackRecord>,
    no_result: Vec<NoResultLog>,
    users: Vec<User>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_low_relevance(mut self, rows: impl IntoIterator<Item = DetailRecord>) -> Self {
        self.low_relevance.extend(rows);
        self.low_relevance.sort_by_key(|r| r.id);
        self
    }

    pub fn with_qa_logs(mut self, rows: impl IntoIterator<Item = QaLog>) -> Self {
        self.qa_logs.extend(rows);
        self.qa_logs.sort_by_key(|r| r.id);
        self
    }

    /// Stored feedback never carries query text; it is resolved on read.
    pub fn with_feedback(mut self, rows: impl IntoIterator<Item = FeedbackRecord>) -> Self {
        self.feedback
            .extend(rows.into_iter().map(|f| FeedbackRecord { query: None, ..f }));
        self.feedback.sort_by_key(|r| r.id);
        self
    }

    pub fn with_no_result_logs(mut self, rows: impl IntoIterator<Item = NoResultLog>) -> Self {
        self.no_result.extend(rows);
        self.no_result.sort_by_key(|r| r.id);
        self
    }

    pub fn with_users(mut self, rows: impl IntoIterator<Item = User>) -> Self {
        self.users.extend(rows);
        self.users.sort_by_key(|r| r.id);
        self
    }

    fn query_for_task(&self, task_id: &str) -> Option<String> {
        self.qa_logs
            .iter()
            .find(|log| log.task_id == task_id)
            .map(|log| log.query.clone())
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryStore {
    async fn low_relevance(&self, filter: &RecordFilter) -> Result<Vec<DetailRecord>> {
        Ok(self
            .low_relevance
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn low_relevance_page(
        &self,
        filter: &RecordFilter,
        paging: &Paging,
    ) -> Result<Page<DetailRecord>> {
        let mut rows = self.low_relevance(filter).await?;
        rows.sort_by_key(|r| Reverse((r.created_at, r.id)));
        Ok(paging.apply(rows))
    }

    async fn qa_logs(&self, filter: &RecordFilter, paging: &Paging) -> Result<Page<QaLog>> {
        let mut rows: Vec<QaLog> = self
            .qa_logs
            .iter()
            .filter(|log| filter.matches_text(&log.query) && filter.matches_time(&log.created_at))
            .cloned()
            .collect();
        rows.sort_by_key(|r| Reverse((r.created_at, r.id)));
        Ok(paging.apply(rows))
    }

    async fn feedback(&self, filter: &RecordFilter) -> Result<Vec<FeedbackRecord>> {
        Ok(self
            .feedback
            .iter()
            .filter(|f| filter.matches_time(&f.created_at))
            .map(|f| FeedbackRecord {
                query: self.query_for_task(&f.message_id),
                ..f.clone()
            })
            .filter(|f| match &f.query {
                Some(q) => filter.matches_text(q),
                None => filter.search.is_none(),
            })
            .collect())
    }

    async fn no_result_logs(&self, filter: &RecordFilter) -> Result<Vec<NoResultLog>> {
        Ok(self
            .no_result
            .iter()
            .filter(|log| filter.matches_text(&log.query) && filter.matches_time(&log.created_at))
            .cloned()
            .collect())
    }

    async fn users(&self, paging: &Paging) -> Result<Page<User>> {
        Ok(paging.apply(self.users.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{QueryWindow, WindowParams};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn detail(id: i64, query: &str, score: f64) -> DetailRecord {
        DetailRecord {
            id,
            query: query.to_string(),
            original_index: 0,
            content: Some(format!("passage {}", id)),
            score,
            created_at: ts(id),
            source_id: format!("task-{}", id),
        }
    }

    fn qa_log(id: i64, task_id: &str, query: &str) -> QaLog {
        QaLog {
            id,
            task_id: task_id.to_string(),
            query: query.to_string(),
            response: "answer".to_string(),
            created_at: ts(id),
            rerank_results: Vec::new(),
        }
    }

    fn feedback(id: i64, message_id: &str, liked: bool) -> FeedbackRecord {
        FeedbackRecord {
            id,
            message_id: message_id.to_string(),
            liked,
            reason: None,
            created_at: ts(id),
            query: None,
        }
    }

    fn window(params: WindowParams) -> crate::window::ReadWindow {
        QueryWindow::default().validate(&params).unwrap()
    }

    #[tokio::test]
    async fn test_skip_past_first_page() {
        let store = InMemoryStore::new()
            .with_low_relevance((1..=15).map(|i| detail(i, "q", 0.3)));
        let w = window(WindowParams {
            skip: Some(10),
            limit: Some(10),
            ..Default::default()
        });
        let page = store.low_relevance_page(&w.filter, &w.paging).await.unwrap();
        assert_eq!(page.total, 15);
        let ids: Vec<i64> = page.data.iter().map(|r| r.id).collect();
        // newest first, so the last five are the oldest rows
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryStore::new();
        let w = window(WindowParams::default());
        let page = store.low_relevance_page(&w.filter, &w.paging).await.unwrap();
        assert_eq!(page, Page::empty());
        assert!(store.feedback(&w.filter).await.unwrap().is_empty());
        assert_eq!(store.users(&w.paging).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_filter_shared_by_listing_and_full_read() {
        let store = InMemoryStore::new().with_low_relevance(vec![
            detail(1, "Reset VPN", 0.2),
            detail(2, "printer", 0.45),
            detail(3, "vpn token", 0.55),
        ]);
        let w = window(WindowParams {
            search: Some("vpn".to_string()),
            max_score: Some("0.5".to_string()),
            ..Default::default()
        });
        let all = store.low_relevance(&w.filter).await.unwrap();
        let page = store.low_relevance_page(&w.filter, &w.paging).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, 1);
        assert_eq!(page.total, all.len() as u64);
    }

    #[tokio::test]
    async fn test_feedback_joined_to_query() {
        let store = InMemoryStore::new()
            .with_qa_logs(vec![qa_log(1, "t1", "vpn"), qa_log(2, "t2", "printer")])
            .with_feedback(vec![
                feedback(1, "t1", false),
                feedback(2, "t2", true),
                feedback(3, "orphan", true),
            ]);

        let all = store.feedback(&RecordFilter::default()).await.unwrap();
        let queries: Vec<Option<&str>> = all.iter().map(|f| f.query.as_deref()).collect();
        assert_eq!(queries, vec![Some("vpn"), Some("printer"), None]);

        let filter = RecordFilter {
            search: Some("VPN".to_string()),
            ..Default::default()
        };
        let ids: Vec<i64> = store
            .feedback(&filter)
            .await
            .unwrap()
            .iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_qa_logs_newest_first_with_search() {
        let store = InMemoryStore::new().with_qa_logs(vec![
            qa_log(1, "t1", "wifi setup"),
            qa_log(2, "t2", "printer"),
            qa_log(3, "t3", "WiFi guest"),
        ]);
        let w = window(WindowParams {
            search: Some("wifi".to_string()),
            ..Default::default()
        });
        let page = store.qa_logs(&w.filter, &w.paging).await.unwrap();
        assert_eq!(page.total, 2);
        let ids: Vec<i64> = page.data.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_users_true_total() {
        let users = (1..=7).map(|i| User {
            id: i,
            username: format!("user{}", i),
            full_name: None,
            is_admin: i == 1,
            created_at: ts(i),
        });
        let store = InMemoryStore::new().with_users(users);
        let page = store.users(&Paging { skip: 5, limit: 5 }).await.unwrap();
        assert_eq!(page.total, 7);
        assert_eq!(page.data.len(), 2);
    }
}
