//! Click, positional click and hover primitives

use cdp_adapter::{with_timeout, ClickOptions};
use refpilot_core_types::ElementRef;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::ActionError;
use crate::primitives::{keyboard, ActionExecutor};

/// Resolves the ref and clicks it. A failed pointer click falls back to keyboard navigation
/// when enabled; if that fails too the original error is returned.
pub(crate) async fn execute_click(
    executor: &ActionExecutor,
    element_ref: &ElementRef,
    force: bool,
    timeout: Option<u64>,
) -> Result<Option<Value>, ActionError> {
    let target = executor.resolve(element_ref).await?;
    let limit = executor.action_timeout(timeout);
    let options = ClickOptions {
        force,
        timeout: limit,
    };

    let clicked = with_timeout(
        limit,
        "click",
        executor.driver().click(&target.handle, options),
    )
    .await;

    match clicked {
        Ok(()) => Ok(Some(json!({ "strategy": target.strategy.name() }))),
        Err(err) if err.is_fatal() || !executor.config().keyboard_fallback => Err(err.into()),
        Err(err) => {
            warn!(element_ref = %element_ref, %err, "pointer click failed; trying keyboard navigation");
            match keyboard::activate_via_keyboard(executor, &target).await {
                Ok(true) => Ok(Some(json!({
                    "strategy": target.strategy.name(),
                    "via": "keyboard",
                }))),
                Ok(false) => Err(err.into()),
                Err(fallback_err) => {
                    debug!(%fallback_err, "keyboard fallback aborted");
                    Err(err.into())
                }
            }
        }
    }
}

pub(crate) async fn execute_click_at(
    executor: &ActionExecutor,
    x: f64,
    y: f64,
) -> Result<Option<Value>, ActionError> {
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return Err(ActionError::InvalidArgument(format!(
            "coordinates ({x}, {y}) are outside the viewport"
        )));
    }
    let limit = executor.action_timeout(None);
    with_timeout(limit, "click_at", executor.driver().mouse_click(x, y)).await?;
    Ok(Some(json!({ "x": x, "y": y })))
}

pub(crate) async fn execute_hover(
    executor: &ActionExecutor,
    element_ref: &ElementRef,
    force: bool,
    timeout: Option<u64>,
) -> Result<Option<Value>, ActionError> {
    let target = executor.resolve(element_ref).await?;
    let driver = executor.driver();
    let limit = executor.action_timeout(timeout);
    if !force {
        let state = with_timeout(limit, "element_state", driver.element_state(&target.handle)).await?;
        if !state.visible {
            return Err(ActionError::NotVisible(format!(
                "{element_ref} is not visible; retry with force"
            )));
        }
    }
    with_timeout(limit, "hover", driver.hover(&target.handle)).await?;
    Ok(None)
}
