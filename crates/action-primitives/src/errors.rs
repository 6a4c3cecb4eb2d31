//! Error types for action primitives

use action_locator::LocatorError;
use cdp_adapter::{AdapterError, AdapterErrorKind};
use perceiver_structural::PerceiverError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// The ref does not name a live element; the caller should re-snapshot.
    #[error("element {element_ref} not found ({detail}); take a new snapshot and use a current ref")]
    RefNotFound { element_ref: String, detail: String },

    #[error("navigation timeout: {0}")]
    NavTimeout(String),

    #[error("timeout exceeded: {0}")]
    Timeout(String),

    #[error("element not visible: {0}")]
    NotVisible(String),

    #[error("option not found: {0}")]
    OptionNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Browser connection lost; nothing further can run.
    #[error("browser disconnected: {0}")]
    Disconnected(String),

    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ActionError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::NavTimeout(_)
                | ActionError::Timeout(_)
                | ActionError::NotVisible(_)
                | ActionError::CdpIo(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Disconnected(_))
    }

    pub fn is_stale_ref(&self) -> bool {
        matches!(self, ActionError::RefNotFound { .. })
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.hint.clone().unwrap_or_else(|| err.kind.to_string());
        match err.kind {
            AdapterErrorKind::NavTimeout => ActionError::NavTimeout(message),
            AdapterErrorKind::Timeout => ActionError::Timeout(message),
            AdapterErrorKind::NotVisible => ActionError::NotVisible(message),
            AdapterErrorKind::OptionNotFound => ActionError::OptionNotFound(message),
            AdapterErrorKind::InvalidArgument => ActionError::InvalidArgument(message),
            AdapterErrorKind::Disconnected => ActionError::Disconnected(message),
            AdapterErrorKind::TargetNotFound => ActionError::RefNotFound {
                element_ref: "target".to_string(),
                detail: message,
            },
            AdapterErrorKind::CdpIo => ActionError::CdpIo(message),
            AdapterErrorKind::Internal => ActionError::Internal(message),
        }
    }
}

impl From<LocatorError> for ActionError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::NotFound {
                element_ref,
                reason,
            } => ActionError::RefNotFound {
                element_ref: element_ref.to_string(),
                detail: reason,
            },
            LocatorError::StaleGeneration {
                element_ref,
                issued,
                current,
            } => ActionError::RefNotFound {
                element_ref: element_ref.to_string(),
                detail: format!("issued by {issued}, current catalog is {current}"),
            },
            LocatorError::Driver(err) => ActionError::from(err),
        }
    }
}

impl From<PerceiverError> for ActionError {
    fn from(err: PerceiverError) -> Self {
        match err {
            PerceiverError::Driver(err) => ActionError::from(err),
            PerceiverError::Internal(message) => ActionError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refpilot_core_types::ElementRef;

    #[test]
    fn stale_refs_read_as_not_found() {
        let err = ActionError::from(LocatorError::not_found(
            &ElementRef::from_index(99),
            "no such ref",
        ));
        assert!(err.is_stale_ref());
        let text = err.to_string();
        assert!(text.contains("e99") && text.contains("not found"));
        assert!(text.contains("snapshot"));
    }

    #[test]
    fn adapter_kinds_keep_their_retry_meaning() {
        let timeout = ActionError::from(AdapterError::timeout("click timed out after 5000ms"));
        assert!(timeout.is_retryable());
        assert!(timeout.to_string().contains("timeout"));

        let gone = ActionError::from(AdapterError::new(AdapterErrorKind::Disconnected));
        assert!(gone.is_fatal());
        assert!(!gone.is_retryable());
    }
}
