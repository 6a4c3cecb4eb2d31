//! Error types for the ref resolver

use cdp_adapter::AdapterError;
use refpilot_core_types::{ElementRef, Generation};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Ref unknown to the current table, or no strategy found a live match.
    #[error("element {element_ref} not found: {reason}")]
    NotFound {
        element_ref: ElementRef,
        reason: String,
    },

    /// Ref was issued by a catalog that has since been replaced.
    #[error("element {element_ref} not found: ref belongs to {issued}, current catalog is {current}")]
    StaleGeneration {
        element_ref: ElementRef,
        issued: Generation,
        current: Generation,
    },

    /// The browser went away while resolving.
    #[error("driver error: {0}")]
    Driver(#[from] AdapterError),
}

impl LocatorError {
    pub fn not_found(element_ref: &ElementRef, reason: impl Into<String>) -> Self {
        Self::NotFound {
            element_ref: element_ref.clone(),
            reason: reason.into(),
        }
    }

    /// Stale refs are an expected outcome; callers re-snapshot instead of failing hard.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::StaleGeneration { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Driver(err) if err.retriable)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Driver(err) if err.is_fatal())
    }
}
