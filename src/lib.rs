//! # QA Insight
//!
//! Read-only analytics over stored QA interaction logs and user feedback:
//! per-query satisfaction summaries, low-relevance clustering with score
//! tiers, no-result frequency rankings, QA log search, and deduplicated
//! CSV/PDF reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────────────────┐
//! │  SQLite  │──▶│  SqliteStore  │──▶│     qa-insight-core     │
//! │  (logs)  │   │ (SELECT only) │   │ window, aggregate, tier │
//! └──────────┘   └───────────────┘   │ dedupe, export, summary │
//!                                    └────────────┬────────────┘
//!                                 ┌───────────────┤
//!                                 ▼               ▼
//!                            ┌──────────┐   ┌──────────┐
//!                            │   CLI    │   │   HTTP   │
//!                            │  (qai)   │   │  (axum)  │
//!                            └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |
//! | [`sqlite_store`] | SQLite-backed read store |
//! | [`server`] | HTTP API |
//! | [`report`] | CSV/PDF export command |
//! | [`stats`] | Dashboard and no-result printouts |

pub mod config;
pub mod db;
pub mod migrate;
pub mod report;
pub mod server;
pub mod sqlite_store;
pub mod stats;
