use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use qa_insight_core::dashboard::DashboardSummarizer;
use qa_insight_core::export::{PdfOptions, ReportFont};
use qa_insight_core::window::{QueryWindow, DEFAULT_MAX_PAGE_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// When set, every route except `/health` requires this bearer token.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_token: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
    #[serde(default = "default_top_n")]
    pub top_n: i64,
    #[serde(default = "default_recent_feedback")]
    pub recent_feedback: usize,
    #[serde(default = "default_pdf_rows_per_page")]
    pub pdf_rows_per_page: usize,
    /// TrueType font embedded in PDF reports instead of the built-in
    /// DejaVu Sans Mono. Needed for glyph coverage of CJK query text.
    #[serde(default)]
    pub pdf_font: Option<PathBuf>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            top_n: default_top_n(),
            recent_feedback: default_recent_feedback(),
            pdf_rows_per_page: default_pdf_rows_per_page(),
            pdf_font: None,
        }
    }
}

fn default_max_page_size() -> i64 {
    DEFAULT_MAX_PAGE_SIZE
}
fn default_top_n() -> i64 {
    10
}
fn default_recent_feedback() -> usize {
    10
}
fn default_pdf_rows_per_page() -> usize {
    40
}

impl ReportsConfig {
    pub fn query_window(&self) -> QueryWindow {
        QueryWindow::new(self.max_page_size)
    }

    pub fn dashboard(&self) -> DashboardSummarizer {
        DashboardSummarizer {
            top_n: self.top_n as usize,
            recent: self.recent_feedback,
        }
    }

    /// PDF settings, loading `pdf_font` when one is configured.
    pub fn pdf_options(&self) -> Result<PdfOptions> {
        let font = match &self.pdf_font {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read PDF font: {}", path.display()))?;
                ReportFont::from_bytes(bytes)
                    .with_context(|| format!("Invalid PDF font: {}", path.display()))?
            }
            None => ReportFont::builtin(),
        };
        Ok(PdfOptions {
            lines_per_page: self.pdf_rows_per_page,
            font,
            ..PdfOptions::default()
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.reports.max_page_size < 1 {
        anyhow::bail!("reports.max_page_size must be >= 1");
    }

    if config.reports.top_n < 1 {
        anyhow::bail!("reports.top_n must be >= 1");
    }

    if config.reports.top_n > config.reports.max_page_size {
        anyhow::bail!(
            "reports.top_n ({}) must not exceed reports.max_page_size ({})",
            config.reports.top_n,
            config.reports.max_page_size
        );
    }

    if config.reports.pdf_rows_per_page < 10 {
        anyhow::bail!("reports.pdf_rows_per_page must be >= 10");
    }

    if config.reports.pdf_font.is_some() {
        config.reports.pdf_options()?;
    }

    if let Some(token) = &config.server.api_token {
        if token.trim().is_empty() {
            anyhow::bail!("server.api_token must not be empty when set");
        }
    }

    Ok(config)
}
