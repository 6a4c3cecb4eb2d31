//! Retry configuration and outcome types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::FlowError;

/// Generic argument set rewritten by fixes between attempts.
pub type ActionArgs = Map<String, Value>;

/// Ceiling for any single backoff sleep.
pub const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// `base * attempt`
    Linear,
    /// `base * 2^(attempt-1)`
    #[default]
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: BackoffKind,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: MAX_BACKOFF_MS,
            backoff: BackoffKind::Exponential,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.max_retries == 0 {
            return Err(FlowError::InvalidConfig(
                "max_retries must allow at least one attempt".into(),
            ));
        }
        Ok(())
    }

    /// Sleep before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let attempt = attempt.max(1);
        let raw = match self.backoff {
            BackoffKind::Linear => self.base_delay_ms.saturating_mul(u64::from(attempt)),
            BackoffKind::Exponential => {
                let multiplier = 2u64.saturating_pow(attempt - 1);
                self.base_delay_ms.saturating_mul(multiplier)
            }
        };
        raw.min(self.max_delay_ms.min(MAX_BACKOFF_MS))
    }
}

/// One applied fix, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// Attempt that failed (1-based).
    pub attempt: u32,
    pub error: String,
    /// Pattern that classified the error, `generic` when none matched.
    pub pattern: String,
    pub fix: String,
    pub args_before: ActionArgs,
    pub args_after: ActionArgs,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    /// Arguments of the last attempt.
    pub final_args: ActionArgs,
    pub history: Vec<RetryAttempt>,
    /// The run stopped on a fatal error rather than exhausting attempts.
    #[serde(default)]
    pub aborted: bool,
}

impl RetryOutcome {
    pub fn into_result(self) -> Result<Option<Value>, FlowError> {
        if self.success {
            return Ok(self.result);
        }
        let last_error = self.error.unwrap_or_default();
        if self.aborted {
            Err(FlowError::Aborted(last_error))
        } else {
            Err(FlowError::Exhausted {
                attempts: self.attempts,
                last_error,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let config = RetryConfig {
            base_delay_ms: 1_000,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_ms(1), 1_000);
        assert_eq!(config.delay_ms(2), 2_000);
        assert_eq!(config.delay_ms(3), 4_000);
        assert_eq!(config.delay_ms(4), 8_000);
        assert_eq!(config.delay_ms(10), 60_000);
        assert_eq!(config.delay_ms(80), 60_000);
    }

    #[test]
    fn linear_backoff_grows_by_base() {
        let config = RetryConfig {
            base_delay_ms: 500,
            max_delay_ms: 1_200,
            backoff: BackoffKind::Linear,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_ms(1), 500);
        assert_eq!(config.delay_ms(2), 1_000);
        assert_eq!(config.delay_ms(3), 1_200);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        assert!(matches!(config.validate(), Err(FlowError::InvalidConfig(_))));
        tokio_test::assert_ok!(RetryConfig::default().validate());
    }
}
