//! Retry orchestration error types

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    /// Every attempt failed; carries the last error verbatim.
    #[error("{last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// A fatal error (browser gone) stopped retrying early.
    #[error("{0}")]
    Aborted(String),

    #[error("invalid retry configuration: {0}")]
    InvalidConfig(String),
}

impl FlowError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FlowError::Aborted(_))
    }
}
