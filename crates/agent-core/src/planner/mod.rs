//! Planner abstraction.
//!
//! A planner sees the goal, the formatted page state and recent history, and answers with raw
//! text that the loop parses into one directive.

mod openai;

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::agent_loop::prompt::format_user_message;
use crate::errors::AgentError;

pub use openai::{OpenAiPlanner, PlannerConfig};

/// Everything the planner is shown for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerInput {
    pub goal: String,
    pub step: u32,
    /// Formatted catalog or diff.
    pub state: String,
    /// Recent step summaries, oldest first.
    pub history: Vec<String>,
}

impl PlannerInput {
    /// The user message sent to text planners.
    pub fn render(&self) -> String {
        format_user_message(self)
    }
}

/// Abstraction over planners so multiple backends can plug into the loop.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Raw reply for this step; parsing happens in the loop.
    async fn decide(&self, input: &PlannerInput) -> Result<String, AgentError>;

    fn name(&self) -> &str {
        "planner"
    }
}

/// Replays canned replies in order. Used offline and in tests.
#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    replies: Mutex<VecDeque<String>>,
    /// Returned once `replies` runs dry.
    fallback: Option<String>,
    inputs: Mutex<Vec<PlannerInput>>,
}

impl ScriptedPlanner {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Answers `reply` forever.
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Answer used after the scripted replies are used up.
    pub fn then_repeat(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Inputs seen so far.
    pub fn inputs(&self) -> Vec<PlannerInput> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn decide(&self, input: &PlannerInput) -> Result<String, AgentError> {
        self.inputs.lock().push(input.clone());
        let next = self.replies.lock().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| AgentError::planner("scripted planner has no replies left"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(step: u32) -> PlannerInput {
        PlannerInput {
            goal: "g".into(),
            step,
            state: String::new(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replays_in_order_then_falls_back() {
        let planner = ScriptedPlanner::new(["a", "b"]).then_repeat("z");
        assert_eq!(planner.decide(&input(1)).await.unwrap(), "a");
        assert_eq!(planner.decide(&input(2)).await.unwrap(), "b");
        assert_eq!(planner.decide(&input(3)).await.unwrap(), "z");
        assert_eq!(planner.inputs().len(), 3);
    }

    #[test]
    fn exhausted_script_is_an_error() {
        let planner = ScriptedPlanner::new(Vec::<String>::new());
        let err = tokio_test::block_on(planner.decide(&input(1))).unwrap_err();
        assert!(matches!(err, AgentError::Planner(_)));
    }

    #[test]
    fn repeating_never_runs_out() {
        let planner = ScriptedPlanner::repeating("{\"action\":\"done\"}");
        for step in 1..=5 {
            tokio_test::assert_ok!(tokio_test::block_on(planner.decide(&input(step))));
        }
        assert_eq!(planner.inputs().last().map(|i| i.step), Some(5));
    }
}
