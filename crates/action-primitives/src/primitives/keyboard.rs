//! Key presses and the Tab-navigation fallback for failed pointer clicks

use action_locator::ResolvedElement;
use cdp_adapter::{with_timeout, AdapterError, FocusedElement};
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::ActionError;
use crate::primitives::ActionExecutor;

pub(crate) async fn execute_press(
    executor: &ActionExecutor,
    key: &str,
) -> Result<Option<Value>, ActionError> {
    if key.trim().is_empty() {
        return Err(ActionError::InvalidArgument("key must not be empty".into()));
    }
    let limit = executor.action_timeout(None);
    with_timeout(limit, "press", executor.driver().press_key(key)).await?;
    Ok(Some(json!({ "key": key })))
}

/// Lenient match between the focused element and the click target: names contained in each
/// other (case-insensitive), or equal roles when the target has no name.
pub fn focus_matches(focused: &FocusedElement, role: &str, name: &str) -> bool {
    let wanted = name.trim().to_lowercase();
    let seen = focused.name.trim().to_lowercase();
    if wanted.is_empty() {
        return !role.is_empty() && focused.role.eq_ignore_ascii_case(role);
    }
    if seen.is_empty() {
        return false;
    }
    seen.contains(&wanted) || wanted.contains(&seen)
}

fn activation_key(role: &str) -> &'static str {
    match role {
        "checkbox" | "radio" | "switch" | "menuitemcheckbox" | "menuitemradio" => "Space",
        _ => "Enter",
    }
}

/// Tabs through the page until the target has focus, then activates it. `Ok(false)` when the
/// target never received focus within the configured number of presses.
pub(crate) async fn activate_via_keyboard(
    executor: &ActionExecutor,
    target: &ResolvedElement,
) -> Result<bool, AdapterError> {
    let driver = executor.driver();
    let limit = executor.action_timeout(None);
    for attempt in 1..=executor.config().max_tab_presses {
        with_timeout(limit, "press", driver.press_key("Tab")).await?;
        let Some(focused) = with_timeout(limit, "focused_element", driver.focused_element()).await?
        else {
            continue;
        };
        if focus_matches(&focused, &target.role, &target.name) {
            let key = activation_key(&target.role);
            debug!(attempt, key, focused = %focused.name, "target focused; activating");
            with_timeout(limit, "press", driver.press_key(key)).await?;
            return Ok(true);
        }
    }
    debug!(
        presses = executor.config().max_tab_presses,
        "keyboard fallback never focused the target"
    );
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn focused(role: &str, name: &str) -> FocusedElement {
        FocusedElement {
            role: role.to_string(),
            name: name.to_string(),
            tag: String::new(),
        }
    }

    #[test]
    fn matching_is_case_insensitive_both_ways() {
        assert!(focus_matches(&focused("button", "Place Order Now"), "button", "place order"));
        assert!(focus_matches(&focused("button", "Order"), "button", "Place order"));
        assert!(!focus_matches(&focused("link", "Back"), "button", "Place order"));
        assert!(!focus_matches(&focused("link", ""), "button", "Place order"));
        assert!(focus_matches(&focused("textbox", ""), "textbox", ""));
    }

    #[test]
    fn toggles_use_space() {
        assert_eq!(activation_key("checkbox"), "Space");
        assert_eq!(activation_key("link"), "Enter");
    }
}
