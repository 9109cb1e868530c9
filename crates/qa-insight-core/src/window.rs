//! Read windows: validated pagination plus record filters.
//!
//! Raw request parameters ([`WindowParams`]) arrive as loosely typed strings
//! from HTTP query strings or CLI flags. [`QueryWindow::validate`] turns them
//! into a canonical [`ReadWindow`] or rejects them with a
//! [`ValidationError`]. Validation performs no I/O.
//!
//! A window has two halves: the [`RecordFilter`] is the
//! predicate, the [`Paging`] is the slice. Listing views use both; exports
//! reuse the exact same filter with no paging, so an export is always a
//! superset of what the listing shows.
//!
//! Empty strings are treated as "no filter", never as a match on `""`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::error::ValidationError;
use crate::models::{format_ts_iso, DetailRecord, Page};

/// Default upper bound on `limit` for list endpoints.
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

/// Raw filter request, as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub min_score: Option<String>,
    pub max_score: Option<String>,
}

/// Offset/limit pair. `limit` is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub skip: u64,
    pub limit: u64,
}

impl Paging {
    /// Slice an already-filtered, already-ordered sequence into a [`Page`].
    ///
    /// `total` is the length of the full input, not of the slice.
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let data = items
            .into_iter()
            .skip(self.skip as usize)
            .take(self.limit as usize)
            .collect();
        Page { total, data }
    }
}

/// Inclusive timestamp bounds; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *ts >= s) && self.end.map_or(true, |e| *ts <= e)
    }
}

/// Inclusive score bounds; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ScoreRange {
    pub fn contains(&self, score: f64) -> bool {
        self.min.map_or(true, |m| score >= m) && self.max.map_or(true, |m| score <= m)
    }
}

/// The predicate half of a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Substring matched against query text, ignoring ASCII case. Other
    /// letters compare exactly, as SQLite's `lower()` does.
    pub search: Option<String>,
    pub date_range: Option<DateRange>,
    pub score_range: Option<ScoreRange>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.date_range.is_none() && self.score_range.is_none()
    }

    pub fn matches_text(&self, text: &str) -> bool {
        match &self.search {
            Some(needle) => text
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            None => true,
        }
    }

    pub fn matches_time(&self, ts: &DateTime<Utc>) -> bool {
        self.date_range.map_or(true, |r| r.contains(ts))
    }

    pub fn matches_score(&self, score: f64) -> bool {
        self.score_range.map_or(true, |r| r.contains(score))
    }

    pub fn matches(&self, record: &DetailRecord) -> bool {
        self.matches_text(&record.query)
            && self.matches_time(&record.created_at)
            && self.matches_score(record.score)
    }

    /// One-line human description, used in report headers.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "no filters".to_string();
        }

        let mut parts = Vec::new();
        if let Some(search) = &self.search {
            parts.push(format!("search \"{}\"", search));
        }
        if let Some(range) = &self.date_range {
            let start = range.start.as_ref().map(format_ts_iso);
            let end = range.end.as_ref().map(format_ts_iso);
            parts.push(format!(
                "created {} .. {}",
                start.as_deref().unwrap_or("*"),
                end.as_deref().unwrap_or("*")
            ));
        }
        if let Some(range) = &self.score_range {
            let min = range.min.map(|m| format!("{:.4}", m));
            let max = range.max.map(|m| format!("{:.4}", m));
            parts.push(format!(
                "score {} .. {}",
                min.as_deref().unwrap_or("*"),
                max.as_deref().unwrap_or("*")
            ));
        }
        parts.join("; ")
    }
}

/// A validated read request. Constructed per request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadWindow {
    pub paging: Paging,
    pub filter: RecordFilter,
}

/// Validator for raw window parameters.
#[derive(Debug, Clone, Copy)]
pub struct QueryWindow {
    /// Largest accepted `limit`; also the default when none is given.
    pub max_page_size: i64,
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl QueryWindow {
    pub fn new(max_page_size: i64) -> Self {
        Self { max_page_size }
    }

    /// Validate and normalize a raw request.
    pub fn validate(&self, params: &WindowParams) -> Result<ReadWindow, ValidationError> {
        let skip = params.skip.unwrap_or(0);
        if skip < 0 {
            return Err(ValidationError::NegativeSkip(skip));
        }
        let limit = self.validate_limit(params.limit, self.max_page_size)?;

        let search = non_empty(params.search.as_deref()).map(str::to_string);

        let start = non_empty(params.start_date.as_deref())
            .map(|v| parse_bound("start_date", v, Bound::Start))
            .transpose()?;
        let end = non_empty(params.end_date.as_deref())
            .map(|v| parse_bound("end_date", v, Bound::End))
            .transpose()?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ValidationError::InvertedDateRange {
                    start: format_ts_iso(&s),
                    end: format_ts_iso(&e),
                });
            }
        }
        let date_range = if start.is_some() || end.is_some() {
            Some(DateRange { start, end })
        } else {
            None
        };

        let min = non_empty(params.min_score.as_deref())
            .map(|v| parse_score("min_score", v))
            .transpose()?;
        let max = non_empty(params.max_score.as_deref())
            .map(|v| parse_score("max_score", v))
            .transpose()?;
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ValidationError::InvertedScoreRange { min: lo, max: hi });
            }
        }
        let score_range = if min.is_some() || max.is_some() {
            Some(ScoreRange { min, max })
        } else {
            None
        };

        Ok(ReadWindow {
            paging: Paging {
                skip: skip as u64,
                limit: limit as u64,
            },
            filter: RecordFilter {
                search,
                date_range,
                score_range,
            },
        })
    }

    /// Validate a bare `limit` for top-N style summaries.
    pub fn validate_top_n(&self, limit: Option<i64>, default: i64) -> Result<usize, ValidationError> {
        let limit = self.validate_limit(limit.or(Some(default)), self.max_page_size)?;
        Ok(limit as usize)
    }

    fn validate_limit(&self, limit: Option<i64>, default: i64) -> Result<i64, ValidationError> {
        let limit = limit.unwrap_or(default);
        if limit < 1 || limit > self.max_page_size {
            return Err(ValidationError::LimitOutOfRange {
                got: limit,
                max: self.max_page_size,
            });
        }
        Ok(limit)
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates. A bare end date
/// covers the whole day.
fn parse_bound(
    field: &'static str,
    value: &str,
    bound: Bound,
) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })?;
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    Ok(match bound {
        Bound::Start => midnight,
        Bound::End => midnight + Duration::days(1) - Duration::nanoseconds(1),
    })
}

fn parse_score(field: &'static str, value: &str) -> Result<f64, ValidationError> {
    let score: f64 = value
        .parse()
        .map_err(|_| ValidationError::InvalidScore {
            field,
            value: value.to_string(),
        })?;
    if !(0.0..=1.0).contains(&score) {
        return Err(ValidationError::ScoreOutOfRange {
            field,
            value: score,
        });
    }
    Ok(score)
}
