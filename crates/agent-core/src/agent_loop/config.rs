//! Configuration for the planner loop.

use serde::{Deserialize, Serialize};

/// Configuration for the observe-plan-act loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Maximum iterations before the loop stops with `MaxStepsReached`.
    /// Default: 25
    pub max_steps: u32,

    /// After the first step, send only the delta against the previous catalog.
    /// Default: true
    pub diff_mode: bool,

    /// Estimated token budget for the formatted page state.
    /// Default: 3000
    pub token_budget: usize,

    /// Number of recent steps echoed back to the planner.
    /// Default: 5
    pub history_window: usize,

    /// Consecutive failed steps tolerated; one more ends the loop as `Failed`.
    /// Default: 3
    pub max_consecutive_failures: u32,

    /// Route actions through the retry orchestrator.
    /// Default: false
    pub use_retry: bool,

    /// Upper bound for one planner call in milliseconds.
    /// Default: 120000
    pub step_timeout_ms: u64,

    /// Longest element name or value shown to the planner, in characters.
    /// Default: 80
    pub max_text_chars: usize,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            diff_mode: true,
            token_budget: 3_000,
            history_window: 5,
            max_consecutive_failures: 3,
            use_retry: false,
            step_timeout_ms: 120_000,
            max_text_chars: 80,
        }
    }
}

impl AgentLoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small limits for tests.
    pub fn minimal() -> Self {
        Self {
            max_steps: 10,
            max_consecutive_failures: 2,
            step_timeout_ms: 5_000,
            ..Self::default()
        }
    }

    /// Builder: set max steps.
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: toggle diff mode.
    pub fn diff(mut self, enabled: bool) -> Self {
        self.diff_mode = enabled;
        self
    }

    /// Builder: toggle the retry orchestrator.
    pub fn retry(mut self, enabled: bool) -> Self {
        self.use_retry = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentLoopConfig::default();
        assert_eq!(config.max_steps, 25);
        assert!(config.diff_mode);
        assert!(!config.use_retry);
    }

    #[test]
    fn test_builder() {
        let config = AgentLoopConfig::new().max_steps(4).diff(false).retry(true);
        assert_eq!(config.max_steps, 4);
        assert!(!config.diff_mode);
        assert!(config.use_retry);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: AgentLoopConfig = serde_json::from_str(r#"{"max_steps": 7}"#).unwrap();
        assert_eq!(config.max_steps, 7);
        assert_eq!(config.token_budget, 3_000);
    }
}
