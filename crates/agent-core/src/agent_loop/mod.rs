//! Planner loop (observe-plan-act).
//!
//! ```text
//! while steps < max && !cancelled:
//!     view   = session.snapshot()            // full catalog first, then diffs
//!     reply  = planner.decide(goal, state, recent history)
//!     action = parse_directive(reply)        // unparseable -> no-op step
//!     if done: break
//!     executor.execute(action)               // optionally through retries
//! ```
//!
//! - [`AgentLoopConfig`]: limits and modes
//! - [`StateFormatter`]: bounded catalog/diff rendering
//! - [`AgentLoopController`]: the loop itself

pub mod config;
pub mod controller;
pub mod directive;
pub mod prompt;
pub mod state_formatter;
pub mod types;

pub use config::AgentLoopConfig;
pub use controller::AgentLoopController;
pub use directive::{extract_json_object, parse_directive, Directive, DirectiveKind};
pub use prompt::{format_system_prompt, format_user_message};
pub use state_formatter::{estimate_tokens, StateFormatter};
pub use types::{AgentHistoryEntry, AgentLoopResult, AgentLoopStatus, StepOutcome};
