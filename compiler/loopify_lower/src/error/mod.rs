//! Lowering errors.
//!
//! `NotApplicable` is the common, silent outcome: the chain uses a stage or
//! argument shape the engine does not handle. `Internal` marks a broken
//! invariant inside the engine and carries the pipeline text so the failure
//! can be reproduced. `HostSynthesis` wraps whatever the host's synthesizer
//! reported.

use thiserror::Error;

/// Errors produced while extracting, generating or applying a rewrite.
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("pipeline cannot be lowered: {reason}")]
    NotApplicable { reason: String },

    #[error("internal lowering error: {message} (pipeline: {pipeline})")]
    Internal { message: String, pipeline: String },

    #[error("host synthesis failed: {0}")]
    HostSynthesis(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type LowerResult<T> = Result<T, LowerError>;

impl LowerError {
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        LowerError::NotApplicable {
            reason: reason.into(),
        }
    }

    /// An invariant violation; the pipeline text is attached by the driver.
    pub fn internal(message: impl Into<String>) -> Self {
        LowerError::Internal {
            message: message.into(),
            pipeline: String::new(),
        }
    }

    /// Attach the rendered pipeline to an internal error that lacks it.
    #[must_use]
    pub fn with_pipeline(self, text: &str) -> Self {
        match self {
            LowerError::Internal { message, pipeline } if pipeline.is_empty() => LowerError::Internal {
                message,
                pipeline: text.to_owned(),
            },
            other => other,
        }
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self, LowerError::NotApplicable { .. })
    }
}
