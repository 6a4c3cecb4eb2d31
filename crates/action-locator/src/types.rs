//! Core types for the ref resolver

use cdp_adapter::ElementHandle;
use refpilot_core_types::{ElementRef, Generation};
use serde::{Deserialize, Serialize};

/// Resolution strategies, tried in [`LocatorStrategy::fallback_chain`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Live handle captured while building the catalog (DOM pass rows only).
    DirectHandle,
    RoleExactName,
    /// Case-insensitive substring of the recorded name.
    RolePartialName,
    /// Text substring anywhere in the document, role ignored.
    Text,
}

impl LocatorStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::DirectHandle => "direct-handle",
            LocatorStrategy::RoleExactName => "role-exact",
            LocatorStrategy::RolePartialName => "role-partial",
            LocatorStrategy::Text => "text",
        }
    }

    pub fn fallback_chain() -> Vec<LocatorStrategy> {
        vec![
            LocatorStrategy::DirectHandle,
            LocatorStrategy::RoleExactName,
            LocatorStrategy::RolePartialName,
            LocatorStrategy::Text,
        ]
    }
}

/// A ref turned back into a live element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub element_ref: ElementRef,
    pub handle: ElementHandle,
    pub strategy: LocatorStrategy,
    pub generation: Generation,
    pub role: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_starts_with_cached_handle_and_ends_with_text() {
        let chain = LocatorStrategy::fallback_chain();
        assert_eq!(chain.first(), Some(&LocatorStrategy::DirectHandle));
        assert_eq!(chain.last(), Some(&LocatorStrategy::Text));
        assert_eq!(LocatorStrategy::RolePartialName.name(), "role-partial");
    }
}
