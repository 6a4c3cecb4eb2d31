//! Ref resolver with an ordered fallback chain

use async_trait::async_trait;
use cdp_adapter::BrowserDriver;
use perceiver_structural::{BrowserSession, RefTable};
use refpilot_core_types::{ElementRef, Generation};
use tracing::{debug, warn};

use crate::errors::LocatorError;
use crate::strategies::{strategy_for, Strategy};
use crate::types::{LocatorStrategy, ResolvedElement};

/// Turns refs from the session's current catalog into live elements.
#[async_trait]
pub trait ElementResolver: Send + Sync {
    async fn resolve(
        &self,
        session: &BrowserSession,
        element_ref: &ElementRef,
    ) -> Result<ResolvedElement, LocatorError>;
}

pub struct RefResolver {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for RefResolver {
    fn default() -> Self {
        Self::with_chain(&LocatorStrategy::fallback_chain())
    }
}

impl RefResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(chain: &[LocatorStrategy]) -> Self {
        Self {
            strategies: chain.iter().copied().map(strategy_for).collect(),
        }
    }

    /// First strategy that confirms a live match wins. Fatal driver errors abort; any other
    /// strategy error just moves on to the next strategy.
    pub async fn resolve(
        &self,
        driver: &dyn BrowserDriver,
        table: &RefTable,
        element_ref: &ElementRef,
    ) -> Result<ResolvedElement, LocatorError> {
        let entry = table.get(element_ref).ok_or_else(|| {
            LocatorError::not_found(
                element_ref,
                format!("no such ref in catalog {}", table.generation()),
            )
        })?;

        for strategy in &self.strategies {
            match strategy.locate(driver, entry).await {
                Ok(Some(handle)) => {
                    debug!(
                        element_ref = %element_ref,
                        strategy = strategy.name(),
                        handle = handle.id(),
                        "ref resolved"
                    );
                    return Ok(ResolvedElement {
                        element_ref: element_ref.clone(),
                        handle,
                        strategy: strategy.strategy_type(),
                        generation: table.generation(),
                        role: entry.role.clone(),
                        name: entry.name.clone(),
                    });
                }
                Ok(None) => {
                    debug!(element_ref = %element_ref, strategy = strategy.name(), "no match");
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(element_ref = %element_ref, strategy = strategy.name(), %err,
                        "strategy failed");
                }
            }
        }

        Err(LocatorError::not_found(
            element_ref,
            format!(
                "no live {} named '{}' on the page",
                entry.role, entry.name
            ),
        ))
    }

    /// Like [`resolve`](Self::resolve), but only for refs issued by `generation`.
    pub async fn resolve_in(
        &self,
        driver: &dyn BrowserDriver,
        table: &RefTable,
        generation: Generation,
        element_ref: &ElementRef,
    ) -> Result<ResolvedElement, LocatorError> {
        if generation != table.generation() {
            return Err(LocatorError::StaleGeneration {
                element_ref: element_ref.clone(),
                issued: generation,
                current: table.generation(),
            });
        }
        self.resolve(driver, table, element_ref).await
    }
}

#[async_trait]
impl ElementResolver for RefResolver {
    async fn resolve(
        &self,
        session: &BrowserSession,
        element_ref: &ElementRef,
    ) -> Result<ResolvedElement, LocatorError> {
        let table = session.refs();
        RefResolver::resolve(self, session.driver().as_ref(), &table, element_ref).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::{MockDriver, MockElement, MockPage};
    use cdp_adapter::{AdapterError, AdapterErrorKind, ElementHandle};
    use perceiver_structural::RefResolutionEntry;

    fn entry(role: &str, name: &str, handle: Option<&str>) -> RefResolutionEntry {
        RefResolutionEntry {
            role: role.to_string(),
            name: name.to_string(),
            handle: handle.map(ElementHandle::new),
        }
    }

    fn table(rows: Vec<RefResolutionEntry>) -> RefTable {
        let mut table = RefTable::new(Generation(7));
        for (i, row) in rows.into_iter().enumerate() {
            table.insert(ElementRef::from_index(i as u32 + 1), row);
        }
        table
    }

    fn driver() -> MockDriver {
        MockDriver::new(
            "https://r.test/",
            MockPage::new("r")
                .with_element(MockElement::new("h-save", "button", "Save draft"))
                .with_element(MockElement::new("h-help", "link", "Help center"))
                .with_element(MockElement::new("h-note", "paragraph", "Saved 2 minutes ago")),
        )
    }

    fn r(s: &str) -> ElementRef {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn strategies_run_in_order() {
        let driver = driver();
        let resolver = RefResolver::new();
        let table = table(vec![
            entry("button", "Save draft", None),
            entry("link", "help", None),
            entry("text", "Saved 2 minutes", None),
            entry("button", "Publish", Some("h-save")),
        ]);

        let exact = resolver.resolve(&driver, &table, &r("e1")).await.unwrap();
        assert_eq!(exact.strategy, LocatorStrategy::RoleExactName);
        assert_eq!(exact.handle.id(), "h-save");

        let partial = resolver.resolve(&driver, &table, &r("e2")).await.unwrap();
        assert_eq!(partial.strategy, LocatorStrategy::RolePartialName);
        assert_eq!(partial.handle.id(), "h-help");

        let text = resolver.resolve(&driver, &table, &r("e3")).await.unwrap();
        assert_eq!(text.strategy, LocatorStrategy::Text);
        assert_eq!(text.handle.id(), "h-note");

        let direct = resolver.resolve(&driver, &table, &r("e4")).await.unwrap();
        assert_eq!(direct.strategy, LocatorStrategy::DirectHandle);
        assert_eq!(direct.generation, Generation(7));
    }

    #[tokio::test]
    async fn unknown_or_unmatched_refs_are_not_found() {
        let driver = driver();
        let resolver = RefResolver::new();
        let table = table(vec![entry("button", "Delete account", Some("h-gone"))]);

        let err = resolver.resolve(&driver, &table, &r("e99")).await.unwrap_err();
        assert!(err.is_stale());
        assert!(err.to_string().contains("not found"));

        // stale cached handle and no semantic match: no guessing
        let err = resolver.resolve(&driver, &table, &r("e1")).await.unwrap_err();
        assert!(matches!(err, LocatorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn refs_from_an_old_generation_never_resolve() {
        let driver = driver();
        let resolver = RefResolver::new();
        let current = table(vec![entry("button", "Save draft", None)]);
        let err = resolver
            .resolve_in(&driver, &current, Generation(6), &r("e1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LocatorError::StaleGeneration { .. }));
        assert!(err.to_string().contains("not found"));

        tokio_test::assert_ok!(
            resolver
                .resolve_in(&driver, &current, Generation(7), &r("e1"))
                .await
        );
    }

    #[tokio::test]
    async fn transient_strategy_errors_fall_through() {
        let driver = driver();
        driver.fail_next("query_by_role", AdapterError::timeout("role query"));
        let resolver = RefResolver::new();
        let table = table(vec![entry("button", "Save draft", None)]);
        let resolved = resolver.resolve(&driver, &table, &r("e1")).await.unwrap();
        assert_eq!(resolved.strategy, LocatorStrategy::RolePartialName);
    }

    #[tokio::test]
    async fn disconnect_aborts_resolution() {
        let driver = driver();
        driver.fail_always(
            "query_by_role",
            AdapterError::new(AdapterErrorKind::Disconnected),
        );
        let resolver = RefResolver::new();
        let table = table(vec![entry("button", "Save draft", None)]);
        let err = resolver.resolve(&driver, &table, &r("e1")).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
