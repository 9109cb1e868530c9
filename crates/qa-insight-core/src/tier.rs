//! Relevance tiers.
//!
//! Four fixed score bands partition `[0, 1]`:
//!
//! | Tier | Interval |
//! |------|----------|
//! | `high` | `[0.6, 1.0]` |
//! | `medium` | `[0.5, 0.6)` |
//! | `low` | `[0.4, 0.5)` |
//! | `very_low` | `[0.0, 0.4)` |
//!
//! A boundary value belongs to the higher tier. Scores outside `[0, 1]`
//! are clamped to the nearest end tier, and a NaN score lands in
//! `very_low`, so [`classify`] is total.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::DetailRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    High,
    Medium,
    Low,
    VeryLow,
}

impl Tier {
    /// All tiers, most relevant first.
    pub const ALL: [Tier; 4] = [Tier::High, Tier::Medium, Tier::Low, Tier::VeryLow];

    /// Inclusive lower bound of the tier.
    pub fn lower_bound(self) -> f64 {
        match self {
            Tier::High => 0.6,
            Tier::Medium => 0.5,
            Tier::Low => 0.4,
            Tier::VeryLow => 0.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::High => "0.6 - 1.0",
            Tier::Medium => "0.5 - 0.6",
            Tier::Low => "0.4 - 0.5",
            Tier::VeryLow => "0.0 - 0.4",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Assign a score to exactly one tier.
pub fn classify(score: f64) -> Tier {
    Tier::ALL
        .into_iter()
        .find(|tier| score >= tier.lower_bound())
        .unwrap_or(Tier::VeryLow)
}

/// Distinct queries whose records fall into one tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierBucket {
    pub tier: Tier,
    pub label: &'static str,
    /// First-seen order of the input records.
    pub queries: Vec<String>,
}

/// Build the tier → query-set index used by report summaries.
///
/// Always returns one bucket per tier, in [`Tier::ALL`] order, even when a
/// bucket is empty. A query appears in every tier that at least one of its
/// records falls into.
pub fn tier_index(records: &[DetailRecord]) -> Vec<TierBucket> {
    let mut buckets: Vec<TierBucket> = Tier::ALL
        .into_iter()
        .map(|tier| TierBucket {
            tier,
            label: tier.label(),
            queries: Vec::new(),
        })
        .collect();
    let mut seen: Vec<HashSet<&str>> = vec![HashSet::new(); Tier::ALL.len()];

    for record in records {
        let slot = Tier::ALL
            .iter()
            .position(|t| *t == classify(record.score))
            .unwrap_or(Tier::ALL.len() - 1);
        if seen[slot].insert(record.query.as_str()) {
            buckets[slot].queries.push(record.query.clone());
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(query: &str, score: f64) -> DetailRecord {
        DetailRecord {
            id: 0,
            query: query.to_string(),
            original_index: 0,
            content: None,
            score,
            created_at: Utc::now(),
            source_id: String::new(),
        }
    }

    #[test]
    fn test_boundaries_go_to_higher_tier() {
        assert_eq!(classify(0.4), Tier::Low);
        assert_eq!(classify(0.5), Tier::Medium);
        assert_eq!(classify(0.6), Tier::High);
        assert_eq!(classify(1.0), Tier::High);
        assert_eq!(classify(0.0), Tier::VeryLow);
    }

    #[test]
    fn test_interiors() {
        assert_eq!(classify(0.3999), Tier::VeryLow);
        assert_eq!(classify(0.45), Tier::Low);
        assert_eq!(classify(0.5999), Tier::Medium);
        assert_eq!(classify(0.75), Tier::High);
    }

    #[test]
    fn test_out_of_range_and_nan_are_total() {
        assert_eq!(classify(-0.2), Tier::VeryLow);
        assert_eq!(classify(1.7), Tier::High);
        assert_eq!(classify(f64::NAN), Tier::VeryLow);
    }

    #[test]
    fn test_every_score_maps_to_exactly_one_tier() {
        for i in 0..=1000 {
            let score = i as f64 / 1000.0;
            let tier = classify(score);
            let containing: Vec<Tier> = Tier::ALL
                .into_iter()
                .filter(|t| {
                    let upper = match t {
                        Tier::High => f64::INFINITY,
                        Tier::Medium => 0.6,
                        Tier::Low => 0.5,
                        Tier::VeryLow => 0.4,
                    };
                    score >= t.lower_bound() && score < upper
                })
                .collect();
            assert_eq!(containing, vec![tier], "score {}", score);
        }
    }

    #[test]
    fn test_tier_index_distinct_queries_in_first_seen_order() {
        let records = vec![
            record("vpn", 0.1),
            record("printer", 0.45),
            record("vpn", 0.2),
            record("email", 0.05),
            record("vpn", 0.65),
        ];
        let index = tier_index(&records);
        assert_eq!(index.len(), 4);
        assert_eq!(index[0].tier, Tier::High);
        assert_eq!(index[0].queries, vec!["vpn"]);
        assert!(index[1].queries.is_empty());
        assert_eq!(index[2].queries, vec!["printer"]);
        assert_eq!(index[3].queries, vec!["vpn", "email"]);
    }

    #[test]
    fn test_tier_index_empty_input() {
        let index = tier_index(&[]);
        assert_eq!(index.len(), 4);
        assert!(index.iter().all(|b| b.queries.is_empty()));
    }
}
