//! Inference error types for the insight runtime.
//!
//! Download and initialization failures are real, actionable errors and
//! propagate to the caller. Teardown failures never reach this type; they
//! are logged and swallowed at the call site.

use thiserror::Error;

use super::template::TemplateKind;
use crate::models::DownloadFailure;

/// Errors that can occur during provider operations.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model download failed: {0}")]
    Download(#[from] DownloadFailure),

    #[error("Model initialization failed: {0}")]
    Initialization(String),

    #[error("Provider not ready: {0}")]
    NotReady(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Generation timed out after {0}ms")]
    Timeout(u64),

    #[error("No prompt template registered for {0:?}")]
    UnknownTemplate(TemplateKind),

    #[error("Input validation failed: {0}")]
    InputValidation(String),
}

impl InferenceError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Download(_) => "download",
            Self::Initialization(_) => "initialization",
            Self::NotReady(_) => "not_ready",
            Self::ModelError(_) => "model",
            Self::Timeout(_) => "timeout",
            Self::UnknownTemplate(_) => "template",
            Self::InputValidation(_) => "input",
        }
    }
}
