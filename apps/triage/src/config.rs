use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::ats::PageStyle;
use crate::errors::AppError;

pub const DEFAULT_ATS_BASE_URL: &str = "https://app.crelate.com/api3";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "o4-mini";
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Application configuration loaded from environment variables.
///
/// API keys are optional at load time: each subcommand asks only for the
/// credentials it needs, so `triage extract` works without any keys set.
#[derive(Debug, Clone)]
pub struct Config {
    pub ats_api_key: Option<String>,
    pub ats_base_url: String,
    pub ats_page_style: PageStyle,
    pub ats_page_size: usize,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub resume_dir: PathBuf,
    pub job_docs_dir: PathBuf,
    pub doc_converter: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default =
            |key: &str, default: &str| non_empty(key).unwrap_or_else(|| default.to_string());

        let ats_page_style = match non_empty("ATS_PAGE_STYLE") {
            Some(raw) => raw
                .parse::<PageStyle>()
                .map_err(|e| anyhow!("ATS_PAGE_STYLE: {e}"))?,
            None => PageStyle::default(),
        };

        let ats_page_size = match non_empty("ATS_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("ATS_PAGE_SIZE must be a positive integer, got '{raw}'"))?,
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Config {
            ats_api_key: non_empty("ATS_API_KEY").or_else(|| non_empty("CRELATE_API_KEY")),
            ats_base_url: or_default("ATS_BASE_URL", DEFAULT_ATS_BASE_URL),
            ats_page_style,
            ats_page_size,
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            openai_model: or_default("OPENAI_MODEL", DEFAULT_MODEL),
            resume_dir: PathBuf::from(or_default("RESUME_DIR", "resumes")),
            job_docs_dir: PathBuf::from(or_default("JOB_DOCS_DIR", "job_documents")),
            doc_converter: or_default("DOC_CONVERTER", "antiword"),
            rust_log: or_default("RUST_LOG", "info"),
        })
    }

    pub fn require_ats_key(&self) -> Result<&str, AppError> {
        self.ats_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("ATS_API_KEY must be set".to_string()))
    }

    pub fn require_openai_key(&self) -> Result<&str, AppError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("OPENAI_API_KEY must be set".to_string()))
    }
}
