use cdp_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceiverError {
    #[error(transparent)]
    Driver(#[from] AdapterError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PerceiverError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The browser connection is gone; retrying is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Driver(err) if err.is_fatal())
    }
}
