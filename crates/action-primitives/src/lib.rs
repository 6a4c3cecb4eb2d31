//! Action primitives
//!
//! Executes planner-issued [`BrowserAction`]s against a [`BrowserSession`](perceiver_structural::BrowserSession):
//! - refs are resolved through `action-locator` before any element is touched
//! - clicks fall back to keyboard navigation when the pointer path is blocked
//! - every outcome, success or failure, comes back as an [`ActionResult`]

pub mod date;
pub mod errors;
mod primitives;
pub mod types;

pub use date::{parse_date, IsoDateInputHandler};
pub use errors::ActionError;
pub use primitives::*;
pub use types::*;
