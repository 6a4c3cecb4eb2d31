//! Planner loop controller.
//!
//! Each iteration observes the page through the session, asks the planner for one directive and
//! dispatches it. Every failure below the loop becomes a history entry; the loop itself only
//! ends through `done`, the step budget, too many consecutive failures, a lost browser, or
//! cancellation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use action_flow::RetryOrchestrator;
use action_primitives::{ActionExecutor, ActionResult, BrowserAction};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::AgentLoopConfig;
use super::directive::{parse_directive, DirectiveKind};
use super::state_formatter::StateFormatter;
use super::types::{AgentHistoryEntry, AgentLoopResult, AgentLoopStatus};
use crate::errors::AgentError;
use crate::planner::{Planner, PlannerInput};

/// Mutable state of one run.
#[derive(Debug, Default)]
struct LoopState {
    steps: u32,
    consecutive_failures: u32,
    history: Vec<AgentHistoryEntry>,
    extracted: Map<String, Value>,
}

/// What the dispatcher reports back for one action.
struct Dispatched {
    result: ActionResult,
    /// The browser is gone; nothing further can run.
    fatal: bool,
}

pub struct AgentLoopController {
    config: AgentLoopConfig,
    executor: Arc<ActionExecutor>,
    planner: Arc<dyn Planner>,
    retry: Option<RetryOrchestrator>,
    formatter: StateFormatter,
    cancel: CancellationToken,
}

impl AgentLoopController {
    pub fn new(
        executor: Arc<ActionExecutor>,
        planner: Arc<dyn Planner>,
        config: AgentLoopConfig,
    ) -> Self {
        let retry = config.use_retry.then(RetryOrchestrator::default);
        Self {
            formatter: StateFormatter::new(&config),
            config,
            executor,
            planner,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `orchestrator` for dispatch, regardless of `use_retry`.
    pub fn with_retry(mut self, orchestrator: RetryOrchestrator) -> Self {
        self.retry = Some(orchestrator);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    /// Token that stops the loop at the next iteration boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs until the goal is done or a terminal condition is reached. Never fails; the outcome
    /// is in [`AgentLoopResult::status`].
    pub async fn run(&self, goal: &str) -> AgentLoopResult {
        let started = Instant::now();
        let session = self.executor.session();
        let mut state = LoopState::default();
        session.reset_previous();
        info!(planner = self.planner.name(), max_steps = self.config.max_steps, goal, "agent loop started");

        while state.steps < self.config.max_steps {
            if self.cancel.is_cancelled() {
                info!(steps = state.steps, "agent loop cancelled");
                return self.finish(state, AgentLoopStatus::Cancelled, None, Some("cancelled".into()), started);
            }
            state.steps += 1;
            let step = state.steps;

            let view = match session.snapshot(false).await {
                Ok(view) => view,
                Err(err) if err.is_fatal() => {
                    warn!(step, %err, "browser unavailable; stopping");
                    return self.finish(state, AgentLoopStatus::Failed, None, Some(err.to_string()), started);
                }
                Err(err) => {
                    warn!(step, %err, "snapshot failed");
                    state.history.push(AgentHistoryEntry::failed(step, "observe".into(), err.to_string()));
                    if let Some(result) = self.note_failure(&mut state, &err.to_string(), started) {
                        return result;
                    }
                    continue;
                }
            };

            let page_state = if self.config.diff_mode && !view.first && !view.diff.url_changed {
                self.formatter.format_diff(&view.diff, &view.catalog)
            } else {
                self.formatter.format_catalog(&view.catalog)
            };
            let input = PlannerInput {
                goal: goal.to_string(),
                step,
                state: page_state,
                history: recent_history(&state.history, self.config.history_window),
            };

            let reply = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(step, "agent loop cancelled while planning");
                    return self.finish(state, AgentLoopStatus::Cancelled, None, Some("cancelled".into()), started);
                }
                reply = self.ask_planner(&input) => reply,
            };
            let reply = match reply {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(step, %err, "planner call failed");
                    state.history.push(AgentHistoryEntry::failed(step, "plan".into(), err.to_string()));
                    if let Some(result) = self.note_failure(&mut state, &err.to_string(), started) {
                        return result;
                    }
                    continue;
                }
            };

            let directive = match parse_directive(&reply) {
                Ok(directive) => directive,
                Err(err) => {
                    warn!(step, %err, "planner reply ignored");
                    state.history.push(AgentHistoryEntry::no_op(step, &reply, err.to_string()));
                    continue;
                }
            };
            if let Some(thinking) = &directive.thinking {
                debug!(step, thinking = %thinking, "planner reasoning");
            }
            state.extracted.extend(directive.extracted.clone());
            let described = directive.describe();

            let action = match directive.kind {
                DirectiveKind::Done { success, summary } => {
                    info!(step, success, "planner finished");
                    state.history.push(AgentHistoryEntry::succeeded(step, described, None));
                    let summary = (!summary.is_empty()).then_some(summary);
                    return if success {
                        self.finish(state, AgentLoopStatus::Completed, summary, None, started)
                    } else {
                        let error = summary.clone().or_else(|| Some("planner gave up".into()));
                        self.finish(state, AgentLoopStatus::Failed, summary, error, started)
                    };
                }
                DirectiveKind::Act(action) => action,
            };

            let dispatched = self.dispatch(&action).await;
            let result = dispatched.result;
            if result.success {
                info!(step, action = %result.action, latency_ms = result.latency_ms, "step succeeded");
                state.consecutive_failures = 0;
                state.history.push(AgentHistoryEntry::succeeded(step, described, result.data));
                continue;
            }

            let error = result.error.unwrap_or_else(|| "action failed".to_string());
            warn!(step, action = %result.action, error = %error, "step failed");
            state.history.push(AgentHistoryEntry::failed(step, described, error.clone()));
            if dispatched.fatal {
                return self.finish(state, AgentLoopStatus::Failed, None, Some(error), started);
            }
            if let Some(result) = self.note_failure(&mut state, &error, started) {
                return result;
            }
        }

        info!(steps = state.steps, "step budget exhausted");
        let error = format!("reached maximum steps limit: {}", self.config.max_steps);
        self.finish(state, AgentLoopStatus::MaxStepsReached, None, Some(error), started)
    }

    async fn ask_planner(&self, input: &PlannerInput) -> Result<String, AgentError> {
        let limit = Duration::from_millis(self.config.step_timeout_ms);
        tokio::time::timeout(limit, self.planner.decide(input))
            .await
            .map_err(|_| AgentError::Timeout(self.config.step_timeout_ms))?
    }

    async fn dispatch(&self, action: &BrowserAction) -> Dispatched {
        if let Some(retry) = &self.retry {
            let retried = retry.execute_action(&self.executor, action).await;
            return Dispatched {
                fatal: retried.outcome.aborted,
                result: retried.result,
            };
        }

        let started = Instant::now();
        let outcome = self.executor.try_execute(action).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(data) => Dispatched {
                result: ActionResult::success(action, data, latency_ms),
                fatal: false,
            },
            Err(err) => Dispatched {
                fatal: err.is_fatal(),
                result: ActionResult::failure(action, &err, latency_ms),
            },
        }
    }

    /// Counts a failed step; past the limit the loop ends as `Failed`.
    fn note_failure(
        &self,
        state: &mut LoopState,
        error: &str,
        started: Instant,
    ) -> Option<AgentLoopResult> {
        state.consecutive_failures += 1;
        if state.consecutive_failures <= self.config.max_consecutive_failures {
            return None;
        }
        warn!(failures = state.consecutive_failures, "too many consecutive failures");
        let message = format!(
            "too many consecutive failures ({}): {error}",
            state.consecutive_failures
        );
        Some(self.finish(
            std::mem::take(state),
            AgentLoopStatus::Failed,
            None,
            Some(message),
            started,
        ))
    }

    fn finish(
        &self,
        state: LoopState,
        status: AgentLoopStatus,
        summary: Option<String>,
        error: Option<String>,
        started: Instant,
    ) -> AgentLoopResult {
        AgentLoopResult {
            status,
            steps: state.steps,
            summary,
            extracted: state.extracted,
            history: state.history,
            error,
            total_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn recent_history(history: &[AgentHistoryEntry], window: usize) -> Vec<String> {
    let skip = history.len().saturating_sub(window);
    history[skip..]
        .iter()
        .map(AgentHistoryEntry::summary_line)
        .collect()
}
