//! Page-side mutation epoch used to invalidate cached catalogs on client-side re-renders.
//!
//! A `MutationObserver` bumps `window.__refpilotMutationEpoch` on every child-list, attribute or
//! character-data change. The session reads the counter before serving a cached catalog: a
//! different value, or a missing observer (fresh document), means the cached rows are stale.

use cdp_adapter::{AdapterError, BrowserDriver};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

pub(crate) const INSTALL_SCRIPT: &str = r#"(() => {
  if (window.__refpilotObserver) { return window.__refpilotMutationEpoch; }
  window.__refpilotMutationEpoch = 0;
  const bump = () => { window.__refpilotMutationEpoch += 1; };
  window.__refpilotObserver = new MutationObserver(bump);
  window.__refpilotObserver.observe(document.documentElement || document, {
    childList: true, subtree: true, attributes: true, characterData: true
  });
  return window.__refpilotMutationEpoch;
})()"#;

pub(crate) const READ_SCRIPT: &str = "window.__refpilotMutationEpoch ?? null";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationState {
    Unchanged,
    Changed,
    /// No observer armed yet; nothing to compare against.
    Unknown,
}

#[derive(Debug, Default)]
pub struct MutationWatcher {
    armed_epoch: Mutex<Option<u64>>,
}

impl MutationWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the observer (idempotent page-side) and records the current epoch.
    pub async fn arm(&self, driver: &dyn BrowserDriver) -> Result<(), AdapterError> {
        let epoch = driver.evaluate(INSTALL_SCRIPT).await?;
        *self.armed_epoch.lock() = epoch_of(&epoch);
        Ok(())
    }

    pub async fn check(&self, driver: &dyn BrowserDriver) -> Result<MutationState, AdapterError> {
        let Some(armed) = *self.armed_epoch.lock() else {
            return Ok(MutationState::Unknown);
        };
        let observed = epoch_of(&driver.evaluate(READ_SCRIPT).await?);
        let state = match observed {
            Some(epoch) if epoch == armed => MutationState::Unchanged,
            Some(epoch) => {
                debug!(armed, epoch, "dom mutated since last catalog");
                MutationState::Changed
            }
            None => {
                debug!("mutation observer missing; document was replaced");
                MutationState::Changed
            }
        };
        Ok(state)
    }

    pub fn reset(&self) {
        *self.armed_epoch.lock() = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_epoch.lock().is_some()
    }
}

fn epoch_of(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_f64().map(|f| f as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::{MockDriver, MockPage};
    use cdp_adapter::WaitUntil;
    use std::time::Duration;

    #[test]
    fn read_script_never_installs() {
        assert!(!READ_SCRIPT.contains("MutationObserver"));
        assert!(INSTALL_SCRIPT.contains("MutationObserver"));
    }

    #[tokio::test]
    async fn detects_mutation_and_replaced_document() {
        let driver = MockDriver::new("https://m.test/", MockPage::new("m"));
        let watcher = MutationWatcher::new();
        assert_eq!(watcher.check(&driver).await.unwrap(), MutationState::Unknown);

        watcher.arm(&driver).await.unwrap();
        assert_eq!(watcher.check(&driver).await.unwrap(), MutationState::Unchanged);

        driver.mutate();
        assert_eq!(watcher.check(&driver).await.unwrap(), MutationState::Changed);

        watcher.arm(&driver).await.unwrap();
        driver
            .navigate("https://m.test/", WaitUntil::Load, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(watcher.check(&driver).await.unwrap(), MutationState::Changed);

        watcher.reset();
        assert!(!watcher.is_armed());
    }
}
