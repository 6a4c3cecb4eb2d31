//! Retry orchestration for browser actions
//!
//! Failed attempts are classified by error message, the matching fix rewrites the action's
//! arguments, and the next attempt runs after a linear or exponential backoff.

pub mod errors;
pub mod patterns;
pub mod retry;
pub mod types;

pub use errors::FlowError;
pub use patterns::{apply_fix, apply_fix_for, classify, AppliedFix};
pub use retry::{AttemptError, RetriedAction, RetryOrchestrator};
pub use types::{ActionArgs, BackoffKind, RetryAttempt, RetryConfig, RetryOutcome};
