//! # QA Insight CLI (`qai`)
//!
//! Read-only analytics over the QA interaction-log database: serve the
//! HTTP API, export low-relevance reports and print dashboard rollups.
//!
//! ## Usage
//!
//! ```bash
//! qai --config ./config/qai.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qai init` | Create the SQLite schema (idempotent) |
//! | `qai serve` | Start the HTTP API on `[server].bind` |
//! | `qai report csv\|pdf` | Export deduplicated low-relevance results |
//! | `qai stats` | Print feedback totals and top no-result queries |
//! | `qai no-results` | Print the most frequent queries without results |
//!
//! ## Examples
//!
//! ```bash
//! # Export last week's weakest results as a PDF
//! qai report pdf --start-date 2024-06-01 --end-date 2024-06-07 --max-score 0.4 --output weak.pdf
//!
//! # CSV of everything mentioning "vpn" to stdout
//! qai report csv --search vpn
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `qa_insight=info,qai=info`).

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use qa_insight::{config, migrate, report, server, stats};
use qa_insight_core::analytics::ReportFormat;
use qa_insight_core::window::WindowParams;

/// QA Insight CLI: read-only analytics and reports over QA logs and feedback.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/qai.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qai",
    about = "QA Insight: read-only analytics and reports over QA logs and feedback",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qai.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema.
    ///
    /// Creates the SQLite file and the users, qa_logs, feedback,
    /// rerank_results, low_relevance_results and no_result_logs tables.
    /// Running it again is a no-op.
    Init,

    /// Start the HTTP API server.
    Serve,

    /// Export low-relevance results as a report.
    ///
    /// Reads every record matching the filters (no paging), removes
    /// duplicates and groups them by query.
    Report {
        #[arg(value_enum)]
        format: Format,

        #[command(flatten)]
        window: WindowArgs,

        /// Output file. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print the dashboard rollup.
    Stats {
        /// Number of no-result queries to list.
        #[arg(long)]
        top: Option<i64>,
    },

    /// Print the most frequent queries that returned no results.
    NoResults {
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Pdf,
}

impl From<Format> for ReportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => ReportFormat::Csv,
            Format::Pdf => ReportFormat::Pdf,
        }
    }
}

/// Record filters shared with the HTTP query string.
#[derive(Args)]
struct WindowArgs {
    /// Case-insensitive substring of the query text.
    #[arg(long)]
    search: Option<String>,

    /// Earliest creation time (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    start_date: Option<String>,

    /// Latest creation time (RFC 3339, or YYYY-MM-DD for the whole day).
    #[arg(long)]
    end_date: Option<String>,

    /// Lowest relevance score to include, in [0, 1].
    #[arg(long)]
    min_score: Option<String>,

    /// Highest relevance score to include, in [0, 1].
    #[arg(long)]
    max_score: Option<String>,
}

impl From<WindowArgs> for WindowParams {
    fn from(args: WindowArgs) -> Self {
        WindowParams {
            skip: None,
            limit: None,
            search: args.search,
            start_date: args.start_date,
            end_date: args.end_date,
            min_score: args.min_score,
            max_score: args.max_score,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("qa_insight=info,qai=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;
    tracing::debug!(config = %cli.config.display(), db = %cfg.db.path.display(), "config loaded");

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Report {
            format,
            window,
            output,
        } => {
            report::run_report(&cfg, format.into(), &window.into(), output).await?;
        }
        Commands::Stats { top } => {
            stats::run_stats(&cfg, top).await?;
        }
        Commands::NoResults { limit } => {
            stats::run_no_results(&cfg, limit).await?;
        }
    }

    Ok(())
}
