//! Application configuration.
//!
//! One YAML document aggregates every component's config section. Missing keys fall back to the
//! component defaults; a handful of environment variables win over the file.

use std::env;
use std::path::{Path, PathBuf};

use action_flow::RetryConfig;
use action_primitives::ExecutorConfig;
use agent_core::{AgentLoopConfig, PlannerConfig};
use anyhow::{Context, Result};
use cdp_adapter::CdpConfig;
use perceiver_structural::SessionConfig;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

pub const ENV_API_KEY: &str = "REFPILOT_API_KEY";
pub const ENV_MODEL: &str = "REFPILOT_MODEL";
pub const ENV_API_BASE: &str = "REFPILOT_API_BASE";
pub const ENV_HEADLESS: &str = "REFPILOT_HEADLESS";
pub const ENV_CHROME: &str = "REFPILOT_CHROME";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: CdpConfig,
    pub session: SessionConfig,
    pub executor: ExecutorConfig,
    pub retry: RetryConfig,
    pub agent: AgentLoopConfig,
    pub planner: PlannerConfig,
}

impl AppConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.retry.validate().context("Invalid retry section")?;
        Ok(config)
    }

    /// Applies `REFPILOT_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(keys) = non_empty(ENV_API_KEY) {
            self.planner.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.planner.model = model.trim().to_string();
        }
        if let Some(base) = non_empty(ENV_API_BASE) {
            self.planner.api_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = non_empty(ENV_HEADLESS) {
            match parse_flag(&raw) {
                Some(flag) => self.browser.headless = flag,
                None => warn!(value = %raw, "ignoring unrecognised {}", ENV_HEADLESS),
            }
        }
        if let Some(path) = non_empty(ENV_CHROME) {
            self.browser.executable = PathBuf::from(path.trim());
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "0" | "false" | "no" | "off" => Some(false),
        "1" | "true" | "yes" | "on" => Some(true),
        _ => None,
    }
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
}

/// `--config` wins; otherwise `<config dir>/refpilot/config.yaml`.
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("refpilot");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let config = AppConfig::from_yaml(&content)?;
        info!("Loaded configuration from: {}", config_path.display());
        config
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        AppConfig::default()
    };

    config.apply_env_overrides();
    Ok(LoadedConfig {
        config,
        path: config_path,
    })
}
