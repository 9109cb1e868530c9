//! Dashboard and no-result rollups for the terminal.
//!
//! `qai stats` prints the same rollup `GET /dashboard` returns;
//! `qai no-results` prints the no-result ranking. Timestamps use the API's
//! ISO-8601 form.

use anyhow::Result;
use std::fmt::Write;

use qa_insight_core::aggregate::NoResultSummary;
use qa_insight_core::analytics;
use qa_insight_core::dashboard::DashboardSummary;
use qa_insight_core::dedupe::truncate_chars;
use qa_insight_core::models::format_ts_iso;
use qa_insight_core::window::RecordFilter;

use crate::config::Config;
use crate::db::{self, Access};
use crate::sqlite_store::SqliteStore;

const QUERY_WIDTH: usize = 40;

/// Run the stats command: read the dashboard rollup and print it.
pub async fn run_stats(config: &Config, top: Option<i64>) -> Result<()> {
    let window = config.reports.query_window();
    let mut summarizer = config.reports.dashboard();
    summarizer.top_n = window.validate_top_n(top, config.reports.top_n)?;

    let store = SqliteStore::new(db::connect(config, Access::ReadOnly).await?);
    let summary = analytics::dashboard(&store, &summarizer).await?;

    print!("{}", render_dashboard(&summary, &config.db.path.display().to_string()));

    store.pool().close().await;
    Ok(())
}

/// Run the no-results command: print the most frequent empty-result queries.
pub async fn run_no_results(config: &Config, limit: Option<i64>) -> Result<()> {
    let limit = config
        .reports
        .query_window()
        .validate_top_n(limit, config.reports.top_n)?;

    let store = SqliteStore::new(db::connect(config, Access::ReadOnly).await?);
    let ranking = analytics::no_result_summary(&store, &RecordFilter::default(), limit).await?;

    if ranking.is_empty() {
        println!("No queries without results.");
    } else {
        print!("{}", render_no_results(&ranking));
    }

    store.pool().close().await;
    Ok(())
}

fn render_dashboard(summary: &DashboardSummary, db_path: &str) -> String {
    let mut out = String::new();
    // writes into a String cannot fail
    let _ = writeln!(out, "QA Insight: Dashboard");
    let _ = writeln!(out, "=====================");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Database:    {}", db_path);
    let _ = writeln!(out);
    let _ = writeln!(out, "  Feedback:    {}", summary.total_feedback);
    let _ = writeln!(
        out,
        "  Positive:    {} ({}%)",
        summary.positive_feedback_count,
        percent(summary.positive_feedback_count, summary.total_feedback)
    );
    let _ = writeln!(
        out,
        "  Negative:    {} ({}%)",
        summary.negative_feedback_count,
        percent(summary.negative_feedback_count, summary.total_feedback)
    );

    if !summary.recent_feedback.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Recent feedback:");
        let _ = writeln!(out, "  {:<5} {:<QUERY_WIDTH$} {:<8} {}", "ID", "QUERY", "RATING", "AT");
        let _ = writeln!(out, "  {}", "-".repeat(QUERY_WIDTH + 36));
        for entry in &summary.recent_feedback {
            let _ = writeln!(
                out,
                "  {:<5} {:<QUERY_WIDTH$} {:<8} {}",
                entry.id,
                truncate_chars(entry.query.as_deref().unwrap_or("-"), QUERY_WIDTH),
                if entry.liked { "up" } else { "down" },
                format_ts_iso(&entry.created_at)
            );
        }
    }

    if !summary.top_no_result_queries.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Top queries without results:");
        out.push_str(&render_no_results(&summary.top_no_result_queries));
    }

    let _ = writeln!(out);
    out
}

fn render_no_results(ranking: &[NoResultSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {:<QUERY_WIDTH$} {:>6}   {}", "QUERY", "COUNT", "LAST SEEN");
    let _ = writeln!(out, "  {}", "-".repeat(QUERY_WIDTH + 31));
    for entry in ranking {
        let _ = writeln!(
            out,
            "  {:<QUERY_WIDTH$} {:>6}   {}",
            truncate_chars(&entry.query, QUERY_WIDTH),
            entry.count,
            format_ts_iso(&entry.last_occurred_at)
        );
    }
    out
}

fn percent(part: usize, total: usize) -> usize {
    if total > 0 {
        part * 100 / total
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use qa_insight_core::dashboard::{DashboardSummarizer, RecentFeedback};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_dashboard_renders_zeroes() {
        let summary = DashboardSummarizer::default().summarize(&[], &[]);
        let out = render_dashboard(&summary, "qa.sqlite");
        assert!(out.contains("Feedback:    0"));
        assert!(out.contains("Positive:    0 (0%)"));
        assert!(!out.contains("Recent feedback"));
        assert!(!out.contains("Top queries"));
    }

    #[test]
    fn test_dashboard_tables() {
        let summary = DashboardSummary {
            total_feedback: 4,
            positive_feedback_count: 1,
            negative_feedback_count: 3,
            recent_feedback: vec![RecentFeedback {
                id: 7,
                query: Some("reset vpn token".to_string()),
                liked: false,
                created_at: now() - Duration::hours(2),
            }],
            top_no_result_queries: vec![NoResultSummary {
                query: "holiday calendar".to_string(),
                count: 3,
                last_occurred_at: now() - Duration::days(1),
            }],
        };
        let out = render_dashboard(&summary, "qa.sqlite");
        assert!(out.contains("Database:    qa.sqlite"));
        assert!(!out.contains("Size:"));
        assert!(out.contains("Negative:    3 (75%)"));
        assert!(out.contains("reset vpn token"));
        assert!(out.contains("2024-05-20T10:00:00Z"));
        assert!(out.contains("holiday calendar"));
        assert!(out.contains("2024-05-19T12:00:00Z"));
    }

    #[test]
    fn test_long_queries_truncated() {
        let ranking = vec![NoResultSummary {
            query: "q".repeat(100),
            count: 1,
            last_occurred_at: now(),
        }];
        let out = render_no_results(&ranking);
        assert!(!out.contains(&"q".repeat(QUERY_WIDTH + 1)));
        assert!(out.contains("2024-05-20T12:00:00Z"));
    }
}
