//! Grouping of flat records into per-query summaries.
//!
//! All groupings here key on the exact query string. Groups come out in
//! the first-seen order of the input; callers that need a ranking sort
//! explicitly with a stable sort, so ties keep first-seen order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{DetailRecord, FeedbackRecord, NoResultLog};

/// Records sharing one query text, with derived count and mean score.
///
/// Invariant: `count == details.len()` and `avg_score` is the mean of the
/// detail scores (0 for an empty group).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySummary {
    pub query: String,
    pub count: usize,
    #[serde(rename = "avg_relevance_score")]
    pub avg_score: f64,
    #[serde(rename = "results")]
    pub details: Vec<DetailRecord>,
}

impl QuerySummary {
    fn from_details(query: String, details: Vec<DetailRecord>) -> Self {
        let count = details.len();
        let avg_score = if count == 0 {
            0.0
        } else {
            details.iter().map(|d| d.score).sum::<f64>() / count as f64
        };
        Self {
            query,
            count,
            avg_score,
            details,
        }
    }
}

/// Group records by exact query text.
///
/// Accepts any number of records, including none; the input is never
/// assumed to be a single page.
pub fn aggregate(records: &[DetailRecord]) -> Vec<QuerySummary> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<DetailRecord>)> = Vec::new();

    for record in records {
        let slot = *slots.entry(record.query.as_str()).or_insert_with(|| {
            groups.push((record.query.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record.clone());
    }

    groups
        .into_iter()
        .map(|(query, details)| QuerySummary::from_details(query, details))
        .collect()
}

/// Order summaries by record count, largest first. Stable.
pub fn rank_by_count(summaries: &mut [QuerySummary]) {
    summaries.sort_by(|a, b| b.count.cmp(&a.count));
}

/// Satisfaction counts for one QA query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSummary {
    pub query: String,
    pub satisfied_count: usize,
    pub unsatisfied_count: usize,
    pub total_count: usize,
}

/// Per-query satisfaction, most unsatisfied first, truncated to `limit`.
///
/// Feedback whose message id matched no QA log carries no query and is
/// left out.
pub fn summarize_feedback(feedback: &[FeedbackRecord], limit: usize) -> Vec<FeedbackSummary> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut summaries: Vec<FeedbackSummary> = Vec::new();

    for entry in feedback {
        let Some(query) = entry.query.as_deref() else {
            continue;
        };
        let slot = *slots.entry(query).or_insert_with(|| {
            summaries.push(FeedbackSummary {
                query: query.to_string(),
                satisfied_count: 0,
                unsatisfied_count: 0,
                total_count: 0,
            });
            summaries.len() - 1
        });
        let summary = &mut summaries[slot];
        summary.total_count += 1;
        if entry.liked {
            summary.satisfied_count += 1;
        } else {
            summary.unsatisfied_count += 1;
        }
    }

    summaries.sort_by(|a, b| b.unsatisfied_count.cmp(&a.unsatisfied_count));
    summaries.truncate(limit);
    summaries
}

/// Occurrence count of one query that produced no results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoResultSummary {
    pub query: String,
    pub count: usize,
    pub last_occurred_at: DateTime<Utc>,
}

/// Group no-result logs by query, most frequent first.
///
/// Ties keep the order in which each query first occurred in `logs`.
pub fn summarize_no_results(logs: &[NoResultLog]) -> Vec<NoResultSummary> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut summaries: Vec<NoResultSummary> = Vec::new();

    for log in logs {
        match slots.get(log.query.as_str()) {
            Some(&slot) => {
                let summary = &mut summaries[slot];
                summary.count += 1;
                if log.created_at > summary.last_occurred_at {
                    summary.last_occurred_at = log.created_at;
                }
            }
            None => {
                slots.insert(log.query.as_str(), summaries.len());
                summaries.push(NoResultSummary {
                    query: log.query.clone(),
                    count: 1,
                    last_occurred_at: log.created_at,
                });
            }
        }
    }

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    fn record(id: i64, query: &str, score: f64) -> DetailRecord {
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

    fn feedback(id: i64, query: Option<&str>, liked: bool) -> FeedbackRecord {
        FeedbackRecord {
            id,
            message_id: format!("task-{}", id),
            liked,
            reason: None,
            created_at: ts(id),
            query: query.map(str::to_string),
        }
    }

    fn no_result(id: i64, query: &str) -> NoResultLog {
        NoResultLog {
            id,
            query: query.to_string(),
            task_id: format!("task-{}", id),
            created_at: ts(id),
        }
    }

    #[test]
    fn test_aggregate_scenario() {
        let records = vec![record(1, "a", 0.65), record(2, "a", 0.55), record(3, "b", 0.2)];
        let summaries = aggregate(&records);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].query, "a");
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].avg_score - 0.6).abs() < 1e-9);
        assert_eq!(summaries[1].query, "b");
        assert_eq!(summaries[1].count, 1);
        assert!((summaries[1].avg_score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_aggregate_counts_sum_to_input_len() {
        let queries = ["vpn", "mail", "vpn", "printer", "mail", "vpn", "VPN"];
        let records: Vec<DetailRecord> = queries
            .iter()
            .enumerate()
            .map(|(i, q)| record(i as i64, q, 0.1 * (i % 4) as f64))
            .collect();
        let summaries = aggregate(&records);

        let total: usize = summaries.iter().map(|s| s.count).sum();
        assert_eq!(total, records.len());
        for s in &summaries {
            assert_eq!(s.count, s.details.len());
        }
        // exact match only: "VPN" is its own group
        assert_eq!(summaries.len(), 4);
    }

    #[test]
    fn test_aggregate_keeps_first_seen_order() {
        let records = vec![record(1, "z", 0.1), record(2, "a", 0.1), record(3, "z", 0.1)];
        let order: Vec<String> = aggregate(&records).into_iter().map(|s| s.query).collect();
        assert_eq!(order, vec!["z", "a"]);
    }

    #[test]
    fn test_aggregate_groups_by_exact_query_text() {
        let records = vec![
            record(1, "VPN", 0.1),
            record(2, "vpn", 0.1),
            record(3, " vpn", 0.1),
            record(4, "vpn", 0.1),
        ];
        let groups: Vec<(String, usize)> = aggregate(&records)
            .into_iter()
            .map(|s| (s.query, s.count))
            .collect();
        assert_eq!(
            groups,
            vec![
                ("VPN".to_string(), 1),
                ("vpn".to_string(), 2),
                (" vpn".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_rank_by_count_is_stable() {
        let records = vec![
            record(1, "one", 0.1),
            record(2, "two", 0.1),
            record(3, "two", 0.1),
            record(4, "three", 0.1),
        ];
        let mut summaries = aggregate(&records);
        rank_by_count(&mut summaries);
        let order: Vec<&str> = summaries.iter().map(|s| s.query.as_str()).collect();
        assert_eq!(order, vec!["two", "one", "three"]);
    }

    #[test]
    fn test_summarize_feedback() {
        let entries = vec![
            feedback(1, Some("a"), true),
            feedback(2, Some("b"), false),
            feedback(3, Some("a"), false),
            feedback(4, Some("b"), false),
            feedback(5, None, false),
        ];
        let summaries = summarize_feedback(&entries, 10);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].query, "b");
        assert_eq!(summaries[0].unsatisfied_count, 2);
        assert_eq!(summaries[0].total_count, 2);
        assert_eq!(summaries[1].query, "a");
        assert_eq!(summaries[1].satisfied_count, 1);
        assert_eq!(summaries[1].unsatisfied_count, 1);

        assert_eq!(summarize_feedback(&entries, 1).len(), 1);
    }

    #[test]
    fn test_summarize_no_results_ties_by_first_occurrence() {
        let logs = vec![
            no_result(1, "x"),
            no_result(2, "y"),
            no_result(3, "z"),
            no_result(4, "z"),
            no_result(5, "y"),
        ];
        let summaries = summarize_no_results(&logs);
        let order: Vec<(&str, usize)> = summaries
            .iter()
            .map(|s| (s.query.as_str(), s.count))
            .collect();
        assert_eq!(order, vec![("y", 2), ("z", 2), ("x", 1)]);
        assert_eq!(summaries[0].last_occurred_at, ts(5));
    }

    #[test]
    fn test_summaries_serialize_with_wire_names() {
        let summaries = aggregate(&[record(1, "a", 0.3)]);
        let json = serde_json::to_value(&summaries[0]).unwrap();
        assert_eq!(json["count"], 1);
        assert!(json["avg_relevance_score"].is_number());
        assert_eq!(json["results"][0]["relevance_score"], 0.3);
    }
}
