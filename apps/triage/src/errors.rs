use std::path::PathBuf;

use thiserror::Error;

use crate::ats::AtsError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Every fatal condition of a run ends up here before `main` reports it.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ATS error: {0}")]
    Ats(#[from] AtsError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Could not parse model response as a JSON array ({reason}): {raw}")]
    MalformedResponse { reason: String, raw: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short machine-readable code, used as a log field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Ats(_) => "ATS_ERROR",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
