use thiserror::Error;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    /// Raised when a request or planner configuration is unusable.
    #[error("invalid agent request: {0}")]
    InvalidRequest(String),

    /// The planner backend failed to answer.
    #[error("planner failed: {0}")]
    Planner(String),

    /// The planner answered but not with exactly one known directive.
    #[error("unparseable directive: {0}")]
    Directive(String),

    #[error("planner timed out after {0}ms")]
    Timeout(u64),
}

impl AgentError {
    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn planner(message: impl Into<String>) -> Self {
        Self::Planner(message.into())
    }

    pub fn directive(message: impl Into<String>) -> Self {
        Self::Directive(message.into())
    }

    /// Worth asking the planner again on the next step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Planner(_) | Self::Timeout(_))
    }
}
