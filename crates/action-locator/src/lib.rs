//! Ref resolution: turns catalog refs back into live element handles.
//!
//! Strategies, in order:
//! 1. Direct handle cached by the DOM fallback pass
//! 2. Role + exact name
//! 3. Role + partial name (case-insensitive)
//! 4. Text substring, role ignored
//!
//! A strategy only answers once the driver confirmed a match; otherwise the next one runs. When
//! all of them come up empty the ref is reported as not found.

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::LocatorError;
pub use resolver::{ElementResolver, RefResolver};
pub use strategies::{DirectHandleStrategy, RoleNameStrategy, Strategy, TextStrategy};
pub use types::{LocatorStrategy, ResolvedElement};
