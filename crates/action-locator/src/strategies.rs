//! Resolution strategies
//!
//! Each strategy answers "which live element is this ref?" with `Some(handle)` only after the
//! driver confirmed at least one match; `None` hands over to the next strategy.

use async_trait::async_trait;
use cdp_adapter::{AdapterError, AdapterErrorKind, BrowserDriver, ElementHandle};
use perceiver_structural::RefResolutionEntry;
use tracing::debug;

use crate::types::LocatorStrategy;

#[async_trait]
pub trait Strategy: Send + Sync {
    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        entry: &RefResolutionEntry,
    ) -> Result<Option<ElementHandle>, AdapterError>;

    fn strategy_type(&self) -> LocatorStrategy;

    fn name(&self) -> &'static str {
        self.strategy_type().name()
    }
}

/// Reuses the handle the DOM pass already held, if it still points at a live node.
pub struct DirectHandleStrategy;

#[async_trait]
impl Strategy for DirectHandleStrategy {
    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        entry: &RefResolutionEntry,
    ) -> Result<Option<ElementHandle>, AdapterError> {
        let Some(handle) = &entry.handle else {
            return Ok(None);
        };
        match driver.element_state(handle).await {
            Ok(_) => Ok(Some(handle.clone())),
            Err(err) if err.kind == AdapterErrorKind::TargetNotFound => {
                debug!(handle = handle.id(), "cached handle went stale");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::DirectHandle
    }
}

pub struct RoleNameStrategy {
    exact: bool,
}

impl RoleNameStrategy {
    pub fn exact() -> Self {
        Self { exact: true }
    }

    pub fn partial() -> Self {
        Self { exact: false }
    }
}

#[async_trait]
impl Strategy for RoleNameStrategy {
    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        entry: &RefResolutionEntry,
    ) -> Result<Option<ElementHandle>, AdapterError> {
        // an empty name would match every element of the role
        if entry.name.is_empty() || entry.role == "text" {
            return Ok(None);
        }
        let matches = driver
            .query_by_role(&entry.role, &entry.name, self.exact)
            .await?;
        Ok(matches.into_iter().next())
    }

    fn strategy_type(&self) -> LocatorStrategy {
        if self.exact {
            LocatorStrategy::RoleExactName
        } else {
            LocatorStrategy::RolePartialName
        }
    }
}

pub struct TextStrategy;

#[async_trait]
impl Strategy for TextStrategy {
    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        entry: &RefResolutionEntry,
    ) -> Result<Option<ElementHandle>, AdapterError> {
        if entry.name.trim().is_empty() {
            return Ok(None);
        }
        let matches = driver.query_by_text(&entry.name).await?;
        Ok(matches.into_iter().next())
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Text
    }
}

pub fn strategy_for(kind: LocatorStrategy) -> Box<dyn Strategy> {
    match kind {
        LocatorStrategy::DirectHandle => Box::new(DirectHandleStrategy),
        LocatorStrategy::RoleExactName => Box::new(RoleNameStrategy::exact()),
        LocatorStrategy::RolePartialName => Box::new(RoleNameStrategy::partial()),
        LocatorStrategy::Text => Box::new(TextStrategy),
    }
}
