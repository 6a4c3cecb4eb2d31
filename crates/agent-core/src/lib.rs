//! Agent core: the planner loop driving a browser session.
//!
//! Provides the planner abstraction, directive parsing, page-state formatting and the loop
//! controller that ties the session, executor and retry orchestrator together.

pub mod agent_loop;
pub mod errors;
pub mod planner;

pub use agent_loop::{
    AgentHistoryEntry, AgentLoopConfig, AgentLoopController, AgentLoopResult, AgentLoopStatus,
    Directive, DirectiveKind, StateFormatter,
};
pub use errors::AgentError;
pub use planner::{OpenAiPlanner, Planner, PlannerConfig, PlannerInput, ScriptedPlanner};
