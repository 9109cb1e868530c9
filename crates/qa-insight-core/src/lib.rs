//! # QA Insight Core
//!
//! Pure analytics over stored QA interaction logs: read windows, score
//! tiers, per-query aggregation, export-time deduplication, CSV/PDF report
//! rendering and dashboard rollups, plus the read-only store abstraction
//! they run on.
//!
//! This crate contains no tokio, sqlx, filesystem or network I/O. Every
//! transformation is synchronous over already-fetched rows; only the
//! [`store`] seam is async.

pub mod aggregate;
pub mod analytics;
pub mod dashboard;
pub mod dedupe;
pub mod error;
pub mod export;
pub mod models;
pub mod store;
pub mod tier;
pub mod window;
