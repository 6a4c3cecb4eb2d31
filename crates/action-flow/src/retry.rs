//! Retry orchestrator

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use action_primitives::{ActionError, ActionExecutor, ActionResult, BrowserAction};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::patterns;
use crate::types::{ActionArgs, RetryAttempt, RetryConfig, RetryOutcome};

/// Failure type an attempt may return.
pub trait AttemptError: fmt::Display {
    /// Stop retrying immediately.
    fn is_fatal(&self) -> bool {
        false
    }

    /// Pattern name known from the error's type; `None` classifies by message.
    fn pattern(&self) -> Option<&'static str> {
        None
    }
}

impl AttemptError for String {}

impl AttemptError for ActionError {
    fn is_fatal(&self) -> bool {
        ActionError::is_fatal(self)
    }

    fn pattern(&self) -> Option<&'static str> {
        match self {
            ActionError::RefNotFound { .. } | ActionError::OptionNotFound(_) => {
                Some("selector_not_found")
            }
            ActionError::Timeout(_) | ActionError::NavTimeout(_) => Some("timeout"),
            ActionError::NotVisible(_) => Some("not_visible"),
            ActionError::CdpIo(_) => Some("connection"),
            _ => None,
        }
    }
}

/// One action run through the orchestrator.
#[derive(Debug, Clone)]
pub struct RetriedAction {
    pub result: ActionResult,
    pub outcome: RetryOutcome,
}

pub struct RetryOrchestrator {
    config: RetryConfig,
}

impl Default for RetryOrchestrator {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryOrchestrator {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `attempt` until it succeeds, a fatal error occurs, or `max_retries` attempts are
    /// spent. Each failure is classified and its fix rewrites the arguments of the next attempt.
    pub async fn execute_with_retry<F, Fut, E>(
        &self,
        action_name: &str,
        args: ActionArgs,
        mut attempt: F,
    ) -> RetryOutcome
    where
        F: FnMut(ActionArgs) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: AttemptError,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut args = args;
        let mut history = Vec::new();
        let mut last_error = String::new();

        for number in 1..=max_attempts {
            let err = match attempt(args.clone()).await {
                Ok(value) => {
                    if number > 1 {
                        info!(action = action_name, attempts = number, "succeeded after retry");
                    }
                    return RetryOutcome {
                        success: true,
                        result: Some(value),
                        error: None,
                        attempts: number,
                        final_args: args,
                        history,
                        aborted: false,
                    };
                }
                Err(err) => err,
            };

            last_error = err.to_string();
            if err.is_fatal() {
                warn!(action = action_name, attempt = number, error = %last_error, "fatal error; not retrying");
                return RetryOutcome {
                    success: false,
                    result: None,
                    error: Some(last_error),
                    attempts: number,
                    final_args: args,
                    history,
                    aborted: true,
                };
            }
            if number == max_attempts {
                break;
            }

            let mut delay_ms = self.config.delay_ms(number);
            let before = args.clone();
            match patterns::apply_fix_for(err.pattern(), &last_error, &mut args) {
                Some(fix) => {
                    if fix.extra_delay {
                        delay_ms = delay_ms.saturating_add(self.config.delay_ms(number));
                    }
                    info!(
                        action = action_name,
                        attempt = number,
                        pattern = fix.pattern,
                        fix = %fix.description,
                        delay_ms,
                        "retrying with fix"
                    );
                    history.push(RetryAttempt {
                        attempt: number,
                        error: last_error.clone(),
                        pattern: fix.pattern.to_string(),
                        fix: fix.description,
                        args_before: before,
                        args_after: args.clone(),
                        delay_ms,
                    });
                }
                None => {
                    debug!(action = action_name, attempt = number, error = %last_error, "no applicable fix; retrying unchanged");
                }
            }
            sleep(Duration::from_millis(delay_ms)).await;
        }

        warn!(action = action_name, attempts = max_attempts, error = %last_error, "retries exhausted");
        RetryOutcome {
            success: false,
            result: None,
            error: Some(last_error),
            attempts: max_attempts,
            final_args: args,
            history,
            aborted: false,
        }
    }

    /// Runs a [`BrowserAction`] through the executor with retries and wraps the outcome in the
    /// usual result envelope.
    pub async fn execute_action(
        &self,
        executor: &ActionExecutor,
        action: &BrowserAction,
    ) -> RetriedAction {
        let started = Instant::now();
        let outcome = self
            .execute_with_retry(action.name(), action.to_args(), move |args| async move {
                let action = BrowserAction::from_args(&args)?;
                let data = executor.try_execute(&action).await?;
                Ok::<Value, ActionError>(data.unwrap_or(Value::Null))
            })
            .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let final_action = BrowserAction::from_args(&outcome.final_args).unwrap_or_else(|_| action.clone());
        let result = ActionResult {
            success: outcome.success,
            action: final_action.name().to_string(),
            element_ref: final_action.element_ref().map(String::from),
            error: outcome.error.clone(),
            data: outcome.result.clone().filter(|value| !value.is_null()),
            latency_ms,
        };
        RetriedAction { result, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BackoffKind;
    use serde_json::json;

    fn quick(max_retries: u32) -> RetryOrchestrator {
        RetryOrchestrator::new(RetryConfig {
            max_retries,
            base_delay_ms: 1,
            backoff: BackoffKind::Linear,
            ..RetryConfig::default()
        })
    }

    fn click_args() -> ActionArgs {
        match json!({"action": "click", "ref": "e3"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn always_failing_attempt_runs_exactly_max_times() {
        let mut calls = 0u32;
        let outcome = quick(3)
            .execute_with_retry("click", click_args(), |_| {
                calls += 1;
                let message = format!("element blocked by overlay #{calls}");
                async move { Err::<Value, String>(message) }
            })
            .await;

        assert_eq!(calls, 3);
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.error.as_deref(), Some("element blocked by overlay #3"));
    }

    #[tokio::test]
    async fn timeout_fix_feeds_the_next_attempt() {
        let mut seen = Vec::new();
        let outcome = quick(3)
            .execute_with_retry("click", click_args(), |args| {
                seen.push(args.get("timeout").cloned());
                let fail = seen.len() < 3;
                async move {
                    if fail {
                        Err("timeout exceeded: click".to_string())
                    } else {
                        Ok(json!({"clicked": true}))
                    }
                }
            })
            .await;

        assert!(outcome.success);
        assert_eq!(seen, vec![None, Some(json!(30_000)), Some(json!(60_000))]);
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.history[0].pattern, "timeout");
        assert!(!outcome.history[0].args_before.contains_key("timeout"));
        assert_eq!(outcome.history[1].args_after.get("timeout"), Some(&json!(60_000)));
    }

    #[tokio::test]
    async fn unfixable_errors_retry_with_unchanged_args() {
        let mut seen = Vec::new();
        let outcome = quick(2)
            .execute_with_retry("click", click_args(), |args| {
                seen.push(args);
                async { Err::<Value, String>("element e3 not found".into()) }
            })
            .await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
        assert!(outcome.history.is_empty());
        assert_eq!(outcome.into_result().unwrap_err().to_string(), "element e3 not found");
    }

    #[tokio::test]
    async fn missing_ref_is_classified_by_variant_not_message() {
        let mut args = click_args();
        args.insert("selector".into(), json!("li:nth-child(2) > button"));
        let mut seen = Vec::new();
        let outcome = quick(2)
            .execute_with_retry("click", args, |args| {
                seen.push(args);
                async {
                    Err::<Value, ActionError>(ActionError::RefNotFound {
                        element_ref: "e3".into(),
                        detail: "no button named 'Time out settings'".into(),
                    })
                }
            })
            .await;

        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history[0].pattern, "selector_not_found");
        assert!(!seen[1].contains_key("timeout"));
        assert_eq!(seen[1].get("selector"), Some(&json!("li > button")));
    }

    #[tokio::test]
    async fn fatal_errors_stop_immediately() {
        let mut calls = 0;
        let outcome = quick(5)
            .execute_with_retry("click", click_args(), |_| {
                calls += 1;
                async { Err::<Value, ActionError>(ActionError::Disconnected("gone".into())) }
            })
            .await;
        assert_eq!(calls, 1);
        assert!(outcome.aborted);
        assert!(outcome.into_result().unwrap_err().is_fatal());
    }
}
