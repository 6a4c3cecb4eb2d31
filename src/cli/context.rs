use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_primitives::ActionExecutor;
use anyhow::{Context, Result};
use cdp_adapter::{BrowserDriver, CdpDriver};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::pilot::build_executor;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Launches Chromium and wires a session onto it.
    pub async fn launch(&self, headful: bool) -> Result<Browser> {
        let mut cdp = self.config.browser.clone();
        if headful {
            cdp.headless = false;
        }
        info!(executable = %cdp.executable.display(), headless = cdp.headless, "launching browser");
        let driver = Arc::new(
            CdpDriver::launch(cdp)
                .await
                .context("Failed to launch Chromium (set REFPILOT_CHROME to its path)")?,
        );
        let executor = build_executor(driver.clone() as Arc<dyn BrowserDriver>, self.config());
        Ok(Browser { driver, executor })
    }
}

/// A launched browser plus the executor bound to it.
pub struct Browser {
    driver: Arc<CdpDriver>,
    pub executor: Arc<ActionExecutor>,
}

impl Browser {
    pub async fn close(self) {
        if let Err(err) = self.driver.close().await {
            warn!(%err, "failed to close browser page");
        }
    }
}
