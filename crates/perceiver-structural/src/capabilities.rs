//! Optional capabilities injected into a session at construction time.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cdp_adapter::{AdapterError, BrowserDriver, ElementHandle};

/// Special-cases typing into date-like inputs.
#[async_trait]
pub trait DateInputHandler: Send + Sync {
    /// Decides from the target's recorded metadata and the text being typed.
    fn is_date_input(&self, role: &str, name: &str, value: Option<&str>, text: &str) -> bool;

    async fn fill_date(
        &self,
        driver: &dyn BrowserDriver,
        handle: &ElementHandle,
        text: &str,
    ) -> Result<(), AdapterError>;
}

/// Detects and clears interstitial challenge pages after navigation.
#[async_trait]
pub trait ChallengeBypasser: Send + Sync {
    fn name(&self) -> &str;

    async fn detect(&self, driver: &dyn BrowserDriver) -> Result<bool, AdapterError>;

    async fn bypass(&self, driver: &dyn BrowserDriver) -> Result<(), AdapterError>;
}

#[derive(Clone, Default)]
pub struct Capabilities {
    pub date_input: Option<Arc<dyn DateInputHandler>>,
    pub challenge: Option<Arc<dyn ChallengeBypasser>>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_date_input(mut self, handler: Arc<dyn DateInputHandler>) -> Self {
        self.date_input = Some(handler);
        self
    }

    pub fn with_challenge(mut self, bypasser: Arc<dyn ChallengeBypasser>) -> Self {
        self.challenge = Some(bypasser);
        self
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("date_input", &self.date_input.is_some())
            .field(
                "challenge",
                &self.challenge.as_ref().map(|c| c.name().to_string()),
            )
            .finish()
    }
}
