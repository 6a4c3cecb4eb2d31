//! Core data types for action primitives

use std::time::Duration;

use refpilot_core_types::ElementRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ActionError;

/// Every action the executor understands. Serialized with an `action` tag, e.g.
/// `{"action": "type", "ref": "e3", "text": "hello", "submit": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowserAction {
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Click {
        #[serde(rename = "ref")]
        element_ref: ElementRef,
        #[serde(default, skip_serializing_if = "is_false")]
        force: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    /// Positional click in viewport CSS pixels.
    ClickAt { x: f64, y: f64 },
    Type {
        #[serde(rename = "ref")]
        element_ref: ElementRef,
        text: String,
        #[serde(default, skip_serializing_if = "is_false")]
        submit: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Press { key: String },
    Scroll {
        #[serde(default)]
        direction: ScrollDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<u32>,
        /// Scrolls this element into view instead of wheeling the page.
        #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
        element_ref: Option<ElementRef>,
    },
    Hover {
        #[serde(rename = "ref")]
        element_ref: ElementRef,
        #[serde(default, skip_serializing_if = "is_false")]
        force: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Select {
        #[serde(rename = "ref")]
        element_ref: ElementRef,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    /// Sleeps for `ms`, or polls until `text` shows up on the page.
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Screenshot {
        #[serde(default, skip_serializing_if = "is_false")]
        full_page: bool,
    },
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl BrowserAction {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserAction::Navigate { .. } => "navigate",
            BrowserAction::Click { .. } => "click",
            BrowserAction::ClickAt { .. } => "click_at",
            BrowserAction::Type { .. } => "type",
            BrowserAction::Press { .. } => "press",
            BrowserAction::Scroll { .. } => "scroll",
            BrowserAction::Hover { .. } => "hover",
            BrowserAction::Select { .. } => "select",
            BrowserAction::Wait { .. } => "wait",
            BrowserAction::Screenshot { .. } => "screenshot",
        }
    }

    pub fn element_ref(&self) -> Option<&ElementRef> {
        match self {
            BrowserAction::Click { element_ref, .. }
            | BrowserAction::Type { element_ref, .. }
            | BrowserAction::Hover { element_ref, .. }
            | BrowserAction::Select { element_ref, .. } => Some(element_ref),
            BrowserAction::Scroll { element_ref, .. } => element_ref.as_ref(),
            _ => None,
        }
    }

    /// Per-action timeout override in milliseconds.
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            BrowserAction::Navigate { timeout, .. }
            | BrowserAction::Click { timeout, .. }
            | BrowserAction::Type { timeout, .. }
            | BrowserAction::Hover { timeout, .. }
            | BrowserAction::Select { timeout, .. }
            | BrowserAction::Wait { timeout, .. } => *timeout,
            _ => None,
        }
    }

    /// Flat JSON argument map (tag included) for generic argument rewriting.
    pub fn to_args(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn from_args(args: &Map<String, Value>) -> Result<Self, ActionError> {
        serde_json::from_value(Value::Object(args.clone()))
            .map_err(|err| ActionError::InvalidArgument(format!("malformed action arguments: {err}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    #[default]
    Down,
    Up,
    Left,
    Right,
}

impl ScrollDirection {
    /// Wheel deltas (x, y) for `amount` pixels.
    pub fn delta(self, amount: u32) -> (f64, f64) {
        let amount = f64::from(amount);
        match self {
            ScrollDirection::Down => (0.0, amount),
            ScrollDirection::Up => (0.0, -amount),
            ScrollDirection::Right => (amount, 0.0),
            ScrollDirection::Left => (-amount, 0.0),
        }
    }
}

/// Uniform outcome of any action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub element_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub latency_ms: u64,
}

impl ActionResult {
    pub fn success(action: &BrowserAction, data: Option<Value>, latency_ms: u64) -> Self {
        Self {
            success: true,
            action: action.name().to_string(),
            element_ref: action.element_ref().map(String::from),
            error: None,
            data,
            latency_ms,
        }
    }

    pub fn failure(action: &BrowserAction, error: &ActionError, latency_ms: u64) -> Self {
        Self {
            success: false,
            action: action.name().to_string(),
            element_ref: action.element_ref().map(String::from),
            error: Some(error.to_string()),
            data: None,
            latency_ms,
        }
    }

    /// A `data` field by key.
    pub fn data_field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Tab through focusable elements when a pointer click fails.
    pub keyboard_fallback: bool,
    pub max_tab_presses: usize,
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub scroll_amount: u32,
    pub wait_ms: u64,
    pub wait_poll_ms: u64,
    /// Delay between keystrokes when falling back to sequential typing.
    pub key_delay_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            keyboard_fallback: true,
            max_tab_presses: 30,
            action_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            scroll_amount: 600,
            wait_ms: 1_000,
            wait_poll_ms: 100,
            key_delay_ms: 20,
        }
    }
}

impl ExecutorConfig {
    pub fn action_timeout(&self, override_ms: Option<u64>) -> Duration {
        Duration::from_millis(override_ms.unwrap_or(self.action_timeout_ms))
    }

    pub fn navigation_timeout(&self, override_ms: Option<u64>) -> Duration {
        Duration::from_millis(override_ms.unwrap_or(self.navigation_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn actions_parse_from_tagged_json() {
        let action: BrowserAction =
            serde_json::from_value(json!({"action": "type", "ref": "e1", "text": "hi", "submit": true}))
                .unwrap();
        assert_eq!(
            action,
            BrowserAction::Type {
                element_ref: "e1".parse().unwrap(),
                text: "hi".into(),
                submit: true,
                timeout: None,
            }
        );
        assert_eq!(action.element_ref().map(|r| r.as_str()), Some("e1"));

        let scroll: BrowserAction = serde_json::from_value(json!({"action": "scroll"})).unwrap();
        assert_eq!(scroll.name(), "scroll");
        tokio_test::assert_err!(serde_json::from_value::<BrowserAction>(
            json!({"action": "teleport"})
        ));
    }

    #[test]
    fn args_map_carries_timeout_edits_back() {
        let click = BrowserAction::Click {
            element_ref: "e4".parse().unwrap(),
            force: false,
            timeout: None,
        };
        let mut args = click.to_args();
        assert_eq!(args.get("action"), Some(&json!("click")));
        assert!(!args.contains_key("timeout"));
        args.insert("timeout".into(), json!(10_000));
        args.insert("force".into(), json!(true));
        let edited = BrowserAction::from_args(&args).unwrap();
        assert_eq!(edited.timeout_ms(), Some(10_000));
        assert!(matches!(edited, BrowserAction::Click { force: true, .. }));
    }

    #[test]
    fn result_envelope_uses_ref_field() {
        let action = BrowserAction::Click {
            element_ref: "e2".parse().unwrap(),
            force: false,
            timeout: None,
        };
        let value = serde_json::to_value(ActionResult::success(&action, None, 3)).unwrap();
        assert_eq!(value["ref"], json!("e2"));
        assert_eq!(value["success"], json!(true));
        assert!(value.get("error").is_none());
    }
}
