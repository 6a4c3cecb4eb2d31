//! Result and history types of the planner loop.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How one step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
    /// Planner answer was empty or unparseable; nothing was dispatched.
    NoOp,
}

/// One loop iteration as remembered for the planner and the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHistoryEntry {
    /// Step number (1-indexed).
    pub step: u32,

    /// Compact JSON of the dispatched directive, or the rejected planner text.
    pub directive: String,

    pub outcome: StepOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AgentHistoryEntry {
    pub fn succeeded(step: u32, directive: String, data: Option<Value>) -> Self {
        Self {
            step,
            directive,
            outcome: StepOutcome::Succeeded,
            error: None,
            data,
        }
    }

    pub fn failed(step: u32, directive: String, error: impl Into<String>) -> Self {
        Self {
            step,
            directive,
            outcome: StepOutcome::Failed,
            error: Some(error.into()),
            data: None,
        }
    }

    pub fn no_op(step: u32, raw: &str, reason: impl Into<String>) -> Self {
        Self {
            step,
            directive: raw.chars().take(200).collect(),
            outcome: StepOutcome::NoOp,
            error: Some(reason.into()),
            data: None,
        }
    }

    /// One line for the planner's recent-history section.
    pub fn summary_line(&self) -> String {
        match (self.outcome, &self.error) {
            (StepOutcome::Succeeded, _) => format!("step {}: {} -> ok", self.step, self.directive),
            (StepOutcome::Failed, Some(err)) => {
                format!("step {}: {} -> failed: {}", self.step, self.directive, err)
            }
            (StepOutcome::Failed, None) => format!("step {}: {} -> failed", self.step, self.directive),
            (StepOutcome::NoOp, reason) => format!(
                "step {}: ignored planner reply ({})",
                self.step,
                reason.as_deref().unwrap_or("no directive")
            ),
        }
    }
}

/// Final status of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLoopStatus {
    /// The planner issued `done` with success.
    Completed,
    /// Unrecoverable error, too many consecutive failures, or `done` without success.
    Failed,
    /// Ran out of steps before the planner finished.
    MaxStepsReached,
    /// The cancellation token fired.
    Cancelled,
}

/// Result of an agent loop execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLoopResult {
    pub status: AgentLoopStatus,
    /// Steps taken, no-ops included.
    pub steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Facts the planner extracted along the way, kept even when the loop fails.
    #[serde(default)]
    pub extracted: Map<String, Value>,
    pub history: Vec<AgentHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_time_ms: u64,
}

impl AgentLoopResult {
    /// Check if the loop completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self.status, AgentLoopStatus::Completed)
    }
}
