//! Export-time duplicate suppression.
//!
//! The logging pipeline can write the same low-relevance hit several times
//! for one query. Reports collapse those rows so they do not inflate
//! totals. Paginated listing views never deduplicate: their totals must
//! match the stored row count exactly.

use std::collections::HashSet;

use crate::models::DetailRecord;

/// Characters of content that take part in the dedup key.
pub const DEDUP_CONTENT_CHARS: usize = 200;

/// Decimal places the score is rounded to inside the dedup key.
pub const DEDUP_SCORE_DECIMALS: u32 = 4;

/// Composite identity `(query, truncated content, rounded score)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    query: String,
    content: Option<String>,
    /// Score scaled by `10^decimals` and rounded, so the key stays hashable.
    score: i64,
}

/// Dedup key construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deduplicator {
    pub content_chars: usize,
    pub score_decimals: u32,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            content_chars: DEDUP_CONTENT_CHARS,
            score_decimals: DEDUP_SCORE_DECIMALS,
        }
    }
}

impl Deduplicator {
    pub fn key(&self, record: &DetailRecord) -> DedupKey {
        let scale = 10f64.powi(self.score_decimals as i32);
        DedupKey {
            query: record.query.clone(),
            content: record
                .content
                .as_deref()
                .map(|c| truncate_chars(c, self.content_chars).to_string()),
            score: (record.score * scale).round() as i64,
        }
    }

    /// Keep the first record seen for each key, in input order.
    pub fn dedupe(&self, records: &[DetailRecord]) -> Vec<DetailRecord> {
        let mut seen: HashSet<DedupKey> = HashSet::with_capacity(records.len());
        records
            .iter()
            .filter(|r| seen.insert(self.key(r)))
            .cloned()
            .collect()
    }
}

/// [`Deduplicator::dedupe`] with the default key parameters.
pub fn dedupe(records: &[DetailRecord]) -> Vec<DetailRecord> {
    Deduplicator::default().dedupe(records)
}

/// Prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, query: &str, content: Option<&str>, score: f64) -> DetailRecord {
        DetailRecord {
            id,
            query: query.to_string(),
            original_index: id,
            content: content.map(str::to_string),
            score,
            created_at: Utc::now(),
            source_id: String::new(),
        }
    }

    #[test]
    fn test_keeps_first_of_duplicates() {
        let records = vec![
            record(1, "vpn", Some("reset token"), 0.31),
            record(2, "vpn", Some("reset token"), 0.31),
            record(3, "vpn", Some("other"), 0.31),
        ];
        let out = dedupe(&records);
        let ids: Vec<i64> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_content_beyond_prefix_is_ignored() {
        let base = "x".repeat(DEDUP_CONTENT_CHARS);
        let a = format!("{}AAA", base);
        let b = format!("{}BBB", base);
        let records = vec![
            record(1, "q", Some(&a), 0.2),
            record(2, "q", Some(&b), 0.2),
        ];
        assert_eq!(dedupe(&records).len(), 1);
    }

    #[test]
    fn test_score_rounded_to_four_places() {
        let records = vec![
            record(1, "q", None, 0.123_44),
            record(2, "q", None, 0.123_41),
            record(3, "q", None, 0.123_6),
        ];
        let ids: Vec<i64> = dedupe(&records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_missing_and_empty_content_differ() {
        let records = vec![record(1, "q", None, 0.2), record(2, "q", Some(""), 0.2)];
        assert_eq!(dedupe(&records).len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            record(1, "a", Some("p"), 0.1),
            record(2, "a", Some("p"), 0.1),
            record(3, "b", Some("p"), 0.1),
            record(4, "a", Some("q"), 0.1),
            record(5, "b", Some("p"), 0.1),
        ];
        let once = dedupe(&records);
        let twice = dedupe(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_never_grows_and_keeps_unique_keys() {
        let records = vec![
            record(1, "a", Some("p"), 0.1),
            record(2, "a", Some("p"), 0.1),
            record(3, "unique", Some("only one"), 0.9),
        ];
        let out = dedupe(&records);
        assert!(out.len() <= records.len());
        assert!(out.iter().any(|r| r.id == 3));
    }

    #[test]
    fn test_tunable_prefix() {
        let dedup = Deduplicator {
            content_chars: 3,
            ..Deduplicator::default()
        };
        let records = vec![
            record(1, "q", Some("abcdef"), 0.5),
            record(2, "q", Some("abcxyz"), 0.5),
        ];
        assert_eq!(dedup.dedupe(&records).len(), 1);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("", 5), "");
    }
}
