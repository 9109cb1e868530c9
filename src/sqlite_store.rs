//! SQLite-backed [`AnalyticsStore`] implementation.
//!
//! Translates a [`RecordFilter`] into a `WHERE` clause with
//! [`QueryBuilder`], so the listing read, its count and the unpaginated
//! export read all share one predicate. Text search uses
//! `instr(lower(..), lower(?))`, which folds ASCII case only;
//! [`RecordFilter::matches_text`] folds the same way.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

use qa_insight_core::models::{
    DetailRecord, FeedbackRecord, NoResultLog, Page, QaLog, RerankResult, User,
};
use qa_insight_core::store::AnalyticsStore;
use qa_insight_core::window::{Paging, RecordFilter};

/// SQLite implementation of the [`AnalyticsStore`] trait. Issues `SELECT`s only.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Which columns of a table the filter applies to.
#[derive(Clone, Copy)]
struct Columns {
    text: Option<&'static str>,
    time: &'static str,
    score: Option<&'static str>,
}

const LOW_RELEVANCE: Columns = Columns {
    text: Some("query"),
    time: "created_at",
    score: Some("relevance_score"),
};

const QA_LOGS: Columns = Columns {
    text: Some("query"),
    time: "created_at",
    score: None,
};

const FEEDBACK: Columns = Columns {
    text: Some("q.query"),
    time: "f.created_at",
    score: None,
};

const NO_RESULT: Columns = Columns {
    text: Some("query"),
    time: "created_at",
    score: None,
};

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &RecordFilter, cols: Columns) {
    qb.push(" WHERE 1 = 1");

    if let (Some(col), Some(search)) = (cols.text, &filter.search) {
        qb.push(format!(" AND instr(lower({}), lower(", col))
            .push_bind(search.clone())
            .push(")) > 0");
    }

    if let Some(range) = &filter.date_range {
        if let Some(start) = &range.start {
            qb.push(format!(" AND {} >= ", cols.time))
                .push_bind(start_secs(start));
        }
        if let Some(end) = &range.end {
            qb.push(format!(" AND {} <= ", cols.time))
                .push_bind(end.timestamp());
        }
    }

    if let (Some(col), Some(range)) = (cols.score, &filter.score_range) {
        if let Some(min) = range.min {
            qb.push(format!(" AND {} >= ", col)).push_bind(min);
        }
        if let Some(max) = range.max {
            qb.push(format!(" AND {} <= ", col)).push_bind(max);
        }
    }
}

fn push_paging(qb: &mut QueryBuilder<'_, Sqlite>, paging: &Paging) {
    qb.push(" LIMIT ")
        .push_bind(paging.limit as i64)
        .push(" OFFSET ")
        .push_bind(paging.skip as i64);
}

/// Stored timestamps have second precision; round a start bound up.
fn start_secs(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp() + i64::from(ts.timestamp_subsec_nanos() > 0)
}

fn from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn detail_from_row(row: &SqliteRow) -> DetailRecord {
    DetailRecord {
        id: row.get("id"),
        query: row.get("query"),
        original_index: row.get("original_index"),
        content: row.get("content"),
        score: row.get("relevance_score"),
        created_at: from_secs(row.get("created_at")),
        source_id: row.get("task_id"),
    }
}

const DETAIL_COLUMNS: &str =
    "SELECT id, query, task_id, original_index, relevance_score, content, created_at FROM low_relevance_results";

impl SqliteStore {
    async fn count(&self, table: &str, filter: &RecordFilter, cols: Columns) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", table));
        push_filter(&mut qb, filter, cols);
        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total as u64)
    }

    async fn rerank_results(&self, task_ids: &[String]) -> Result<HashMap<String, Vec<RerankResult>>> {
        let mut by_task: HashMap<String, Vec<RerankResult>> = HashMap::new();
        if task_ids.is_empty() {
            return Ok(by_task);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, task_id, original_index, content, relevance, metadata, created_at \
             FROM rerank_results WHERE task_id IN (",
        );
        let mut ids = qb.separated(", ");
        for task_id in task_ids {
            ids.push_bind(task_id.clone());
        }
        qb.push(") ORDER BY relevance DESC, id ASC");

        for row in qb.build().fetch_all(&self.pool).await? {
            let metadata: Option<String> = row.get("metadata");
            let result = RerankResult {
                id: row.get("id"),
                task_id: row.get("task_id"),
                original_index: row.get("original_index"),
                content: row.get("content"),
                relevance: row.get("relevance"),
                metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
                created_at: from_secs(row.get("created_at")),
            };
            by_task
                .entry(result.task_id.clone())
                .or_default()
                .push(result);
        }
        Ok(by_task)
    }
}

#[async_trait]
impl AnalyticsStore for SqliteStore {
    async fn low_relevance(&self, filter: &RecordFilter) -> Result<Vec<DetailRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(DETAIL_COLUMNS);
        push_filter(&mut qb, filter, LOW_RELEVANCE);
        qb.push(" ORDER BY id ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        tracing::debug!(rows = rows.len(), filter = %filter.describe(), "low relevance read");
        Ok(rows.iter().map(detail_from_row).collect())
    }

    async fn low_relevance_page(
        &self,
        filter: &RecordFilter,
        paging: &Paging,
    ) -> Result<Page<DetailRecord>> {
        let total = self
            .count("low_relevance_results", filter, LOW_RELEVANCE)
            .await?;
        if total == 0 {
            return Ok(Page::empty());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(DETAIL_COLUMNS);
        push_filter(&mut qb, filter, LOW_RELEVANCE);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_paging(&mut qb, paging);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(Page {
            total,
            data: rows.iter().map(detail_from_row).collect(),
        })
    }

    async fn qa_logs(&self, filter: &RecordFilter, paging: &Paging) -> Result<Page<QaLog>> {
        let total = self.count("qa_logs", filter, QA_LOGS).await?;
        if total == 0 {
            return Ok(Page::empty());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, task_id, query, response, created_at FROM qa_logs",
        );
        push_filter(&mut qb, filter, QA_LOGS);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_paging(&mut qb, paging);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let task_ids: Vec<String> = rows.iter().map(|r| r.get("task_id")).collect();
        let mut reranked = self.rerank_results(&task_ids).await?;

        let data = rows
            .iter()
            .map(|row| {
                let task_id: String = row.get("task_id");
                QaLog {
                    id: row.get("id"),
                    rerank_results: reranked.remove(&task_id).unwrap_or_default(),
                    task_id,
                    query: row.get("query"),
                    response: row.get("response"),
                    created_at: from_secs(row.get("created_at")),
                }
            })
            .collect();

        Ok(Page { total, data })
    }

    async fn feedback(&self, filter: &RecordFilter) -> Result<Vec<FeedbackRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT f.id, f.message_id, f.liked, f.reason, f.created_at, q.query \
             FROM feedback f LEFT JOIN qa_logs q ON q.task_id = f.message_id",
        );
        push_filter(&mut qb, filter, FEEDBACK);
        qb.push(" ORDER BY f.id ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| FeedbackRecord {
                id: row.get("id"),
                message_id: row.get("message_id"),
                liked: row.get("liked"),
                reason: row.get("reason"),
                created_at: from_secs(row.get("created_at")),
                query: row.get("query"),
            })
            .collect())
    }

    async fn no_result_logs(&self, filter: &RecordFilter) -> Result<Vec<NoResultLog>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, query, task_id, created_at FROM no_result_logs",
        );
        push_filter(&mut qb, filter, NO_RESULT);
        qb.push(" ORDER BY id ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| NoResultLog {
                id: row.get("id"),
                query: row.get("query"),
                task_id: row.get("task_id"),
                created_at: from_secs(row.get("created_at")),
            })
            .collect())
    }

    async fn users(&self, paging: &Paging) -> Result<Page<User>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT id, username, full_name, is_admin, created_at FROM users \
             ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(paging.limit as i64)
        .bind(paging.skip as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            total: total as u64,
            data: rows
                .iter()
                .map(|row| User {
                    id: row.get("id"),
                    username: row.get("username"),
                    full_name: row.get("full_name"),
                    is_admin: row.get("is_admin"),
                    created_at: from_secs(row.get("created_at")),
                })
                .collect(),
        })
    }
}
