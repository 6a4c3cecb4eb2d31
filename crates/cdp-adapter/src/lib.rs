//! Browser driver layer for refpilot.
//!
//! Exposes the [`BrowserDriver`] contract consumed by the catalog builder, resolver and executor,
//! plus a Chromium implementation that speaks raw DevTools commands over a single attached page.

use std::{env, path::PathBuf};

use which::which;

mod ax;
pub mod cdp;
pub mod driver;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod scripts;
pub mod transport;
mod util;

pub use ax::ax_tree_from_nodes;
pub use cdp::CdpDriver;
pub use config::CdpConfig;
pub use driver::{
    with_timeout, AxNode, BoundingBox, BrowserDriver, ClickOptions, ElementHandle, ElementState,
    FocusedElement, WaitUntil,
};
pub use error::{AdapterError, AdapterErrorKind};
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget};

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the driver.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("navigation timed out")]
        NavTimeout,
        #[error("timeout exceeded")]
        Timeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("browser disconnected")]
        Disconnected,
        #[error("target element not found")]
        TargetNotFound,
        #[error("element not visible")]
        NotVisible,
        #[error("option not found")]
        OptionNotFound,
        #[error("invalid argument")]
        InvalidArgument,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            let retriable = matches!(
                kind,
                AdapterErrorKind::NavTimeout | AdapterErrorKind::Timeout | AdapterErrorKind::CdpIo
            );
            Self {
                kind,
                hint: None,
                retriable,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn timeout(what: impl Into<String>) -> Self {
            Self::new(AdapterErrorKind::Timeout).with_hint(what)
        }

        pub fn internal(hint: impl Into<String>) -> Self {
            Self::new(AdapterErrorKind::Internal).with_hint(hint)
        }

        /// True when the browser is gone and further calls cannot succeed.
        pub fn is_fatal(&self) -> bool {
            matches!(self.kind, AdapterErrorKind::Disconnected)
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{
        env,
        path::{Path, PathBuf},
    };

    /// Configuration for launching Chromium and bounding driver calls.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CdpConfig {
        pub executable: PathBuf,
        pub user_data_dir: PathBuf,
        pub headless: bool,
        pub no_sandbox: bool,
        /// Upper bound for one DevTools round trip.
        pub command_timeout_ms: u64,
        pub launch_timeout_ms: u64,
        /// Connect to an already running browser instead of launching one.
        pub websocket_url: Option<String>,
        pub viewport_width: u32,
        pub viewport_height: u32,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable().unwrap_or_default(),
                user_data_dir: default_profile_dir(),
                headless: resolve_flag("REFPILOT_HEADLESS", true),
                no_sandbox: resolve_flag("REFPILOT_DISABLE_SANDBOX", false),
                command_timeout_ms: 30_000,
                launch_timeout_ms: 20_000,
                websocket_url: None,
                viewport_width: 1280,
                viewport_height: 800,
            }
        }
    }

    fn resolve_flag(key: &str, default: bool) -> bool {
        match env::var(key) {
            Ok(value) => {
                let lower = value.trim().to_ascii_lowercase();
                match lower.as_str() {
                    "0" | "false" | "no" | "off" => false,
                    "1" | "true" | "yes" | "on" => true,
                    _ => default,
                }
            }
            Err(_) => default,
        }
    }

    fn default_profile_dir() -> PathBuf {
        if let Ok(path) = env::var("REFPILOT_CHROME_PROFILE") {
            return PathBuf::from(path);
        }
        Path::new("./.refpilot-profile").into()
    }
}

fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("REFPILOT_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_names_are_not_empty() {
        assert!(!chrome_executable_names().is_empty());
    }

    #[test]
    fn timeouts_are_retriable_but_disconnects_are_fatal() {
        let timeout = AdapterError::timeout("click");
        assert!(timeout.retriable);
        assert!(!timeout.is_fatal());
        assert_eq!(timeout.to_string(), "timeout exceeded: click");

        let gone = AdapterError::new(AdapterErrorKind::Disconnected);
        assert!(!gone.retriable);
        assert!(gone.is_fatal());
    }
}
