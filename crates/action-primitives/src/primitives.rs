//! Action executor
//!
//! One primitive per action kind:
//! 1. navigate - load a URL, start a fresh ref generation
//! 2. click / click_at / hover - pointer actions, click with keyboard fallback
//! 3. type_text - fill or type into a field, date-aware, optional submit
//! 4. select - choose a dropdown option
//! 5. scroll - wheel the page or bring a ref into view
//! 6. wait - fixed sleep or poll for text
//! 7. press / screenshot - keyboard and capture

mod click;
mod keyboard;
mod navigate;
mod screenshot;
mod scroll;
mod select;
mod type_text;
mod wait;

use std::sync::Arc;
use std::time::{Duration, Instant};

use action_locator::{ElementResolver, RefResolver, ResolvedElement};
use cdp_adapter::BrowserDriver;
use perceiver_structural::BrowserSession;
use refpilot_core_types::{ActionId, ElementRef};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::ActionError;
use crate::types::{ActionResult, BrowserAction, ExecutorConfig};

pub use keyboard::focus_matches;

/// Runs [`BrowserAction`]s against a session and reports every outcome as an [`ActionResult`].
pub struct ActionExecutor {
    session: Arc<BrowserSession>,
    resolver: Arc<dyn ElementResolver>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(session: Arc<BrowserSession>, config: ExecutorConfig) -> Self {
        Self::with_resolver(session, Arc::new(RefResolver::new()), config)
    }

    pub fn with_resolver(
        session: Arc<BrowserSession>,
        resolver: Arc<dyn ElementResolver>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            session,
            resolver,
            config,
        }
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Never fails: errors become a failed [`ActionResult`].
    pub async fn execute(&self, action: &BrowserAction) -> ActionResult {
        let started = Instant::now();
        let action_id = ActionId::new();
        info!(
            action_id = %action_id,
            action = action.name(),
            element_ref = action.element_ref().map(|r| r.as_str()).unwrap_or("-"),
            "executing action"
        );

        let outcome = self.dispatch(action).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(data) => {
                info!(action_id = %action_id, latency_ms, "action succeeded");
                ActionResult::success(action, data, latency_ms)
            }
            Err(err) => {
                warn!(action_id = %action_id, latency_ms, error = %err, "action failed");
                ActionResult::failure(action, &err, latency_ms)
            }
        }
    }

    /// Like [`execute`](Self::execute) but keeps the typed error.
    pub async fn try_execute(&self, action: &BrowserAction) -> Result<Option<Value>, ActionError> {
        self.dispatch(action).await
    }

    async fn dispatch(&self, action: &BrowserAction) -> Result<Option<Value>, ActionError> {
        match action {
            BrowserAction::Navigate { url, timeout } => {
                navigate::execute_navigate(self, url, *timeout).await
            }
            BrowserAction::Click {
                element_ref,
                force,
                timeout,
            } => click::execute_click(self, element_ref, *force, *timeout).await,
            BrowserAction::ClickAt { x, y } => click::execute_click_at(self, *x, *y).await,
            BrowserAction::Type {
                element_ref,
                text,
                submit,
                timeout,
            } => type_text::execute_type_text(self, element_ref, text, *submit, *timeout).await,
            BrowserAction::Press { key } => keyboard::execute_press(self, key).await,
            BrowserAction::Scroll {
                direction,
                amount,
                element_ref,
            } => scroll::execute_scroll(self, *direction, *amount, element_ref.as_ref()).await,
            BrowserAction::Hover {
                element_ref,
                force,
                timeout,
            } => click::execute_hover(self, element_ref, *force, *timeout).await,
            BrowserAction::Select {
                element_ref,
                value,
                timeout,
            } => select::execute_select(self, element_ref, value, *timeout).await,
            BrowserAction::Wait { ms, text, timeout } => {
                wait::execute_wait(self, *ms, text.as_deref(), *timeout).await
            }
            BrowserAction::Screenshot { full_page } => {
                screenshot::execute_screenshot(self, *full_page).await
            }
        }
    }

    pub(crate) fn driver(&self) -> &dyn BrowserDriver {
        self.session.driver().as_ref()
    }

    pub(crate) async fn resolve(
        &self,
        element_ref: &ElementRef,
    ) -> Result<ResolvedElement, ActionError> {
        Ok(self.resolver.resolve(&self.session, element_ref).await?)
    }

    pub(crate) fn action_timeout(&self, override_ms: Option<u64>) -> Duration {
        self.config.action_timeout(override_ms)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use cdp_adapter::mock::{MockDriver, MockPage};
    use perceiver_structural::{BrowserSession, CatalogConfig, SessionConfig};

    use super::ActionExecutor;
    use crate::types::ExecutorConfig;

    /// Executor over a mock page with one snapshot already taken.
    pub async fn executor_for(page: MockPage) -> (Arc<MockDriver>, ActionExecutor) {
        executor_with(page, ExecutorConfig::default()).await
    }

    pub async fn executor_with(
        page: MockPage,
        config: ExecutorConfig,
    ) -> (Arc<MockDriver>, ActionExecutor) {
        let driver = Arc::new(MockDriver::new("https://app.test/", page));
        let session_config = SessionConfig {
            catalog: CatalogConfig {
                min_ax_elements: 0,
                ..CatalogConfig::default()
            },
            ..SessionConfig::default()
        };
        let session = Arc::new(BrowserSession::new(driver.clone(), session_config));
        session.snapshot(false).await.expect("snapshot");
        driver.clear_calls();
        (driver, ActionExecutor::new(session, config))
    }
}
