use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::ax::ax_tree_from_nodes;
use crate::config::CdpConfig;
use crate::driver::{
    with_timeout, AxNode, BoundingBox, BrowserDriver, ClickOptions, ElementHandle, ElementState,
    FocusedElement, WaitUntil,
};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::scripts;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget};

/// [`BrowserDriver`] over one DevTools page session.
pub struct CdpDriver<T: CdpTransport = ChromiumTransport> {
    transport: Arc<T>,
    session: String,
    target_id: String,
    cfg: CdpConfig,
    /// Object group that handles from element queries are created in.
    object_group: Mutex<String>,
}

impl CdpDriver<ChromiumTransport> {
    /// Launches (or connects to) Chromium and opens a blank page.
    pub async fn launch(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let transport = Arc::new(ChromiumTransport::new(cfg.clone()));
        Self::attach(transport, cfg).await
    }
}

impl<T: CdpTransport + 'static> CdpDriver<T> {
    pub async fn attach(transport: Arc<T>, cfg: CdpConfig) -> Result<Self, AdapterError> {
        transport.start().await?;

        let created = transport
            .send_command(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank" }),
            )
            .await?;
        let target_id = str_field(&created, "targetId")?;

        let attached = transport
            .send_command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session = str_field(&attached, "sessionId")?;

        let driver = Self {
            transport,
            session,
            target_id,
            cfg,
            object_group: Mutex::new(object_group_name(0)),
        };
        driver.page("Page.enable", json!({})).await?;
        driver.page("Runtime.enable", json!({})).await?;
        driver
            .page(
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": scripts::PRELUDE }),
            )
            .await?;
        driver
            .page(
                "Emulation.setDeviceMetricsOverride",
                json!({
                    "width": driver.cfg.viewport_width,
                    "height": driver.cfg.viewport_height,
                    "deviceScaleFactor": 1,
                    "mobile": false,
                }),
            )
            .await?;

        info!(target: "cdp-driver", target = %driver.target_id, "page session attached");
        Ok(driver)
    }

    pub async fn close(&self) -> Result<(), AdapterError> {
        self.transport
            .send_command(
                CommandTarget::Browser,
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
            )
            .await
            .map(|_| ())
    }

    async fn page(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.transport
            .send_command(CommandTarget::Session(self.session.clone()), method, params)
            .await
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.cfg.command_timeout_ms)
    }

    async fn eval_value(&self, expression: &str) -> Result<Value, AdapterError> {
        let response = self
            .page(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        check_exception(&response)?;
        Ok(response
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn call_on(
        &self,
        handle: &ElementHandle,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, AdapterError> {
        let arguments: Vec<Value> = args.into_iter().map(|v| json!({ "value": v })).collect();
        let response = self
            .page(
                "Runtime.callFunctionOn",
                json!({
                    "objectId": handle.id(),
                    "functionDeclaration": function,
                    "arguments": arguments,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await
            .map_err(stale_handle)?;
        check_exception(&response)?;
        Ok(response
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Evaluates an expression producing an array of elements and splits it into handles.
    async fn handles_from_array(&self, expression: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        let response = self
            .page(
                "Runtime.evaluate",
                json!({
                    "expression": format!("{}\n{}", scripts::PRELUDE, expression),
                    "returnByValue": false,
                    "objectGroup": self.object_group.lock().clone(),
                }),
            )
            .await?;
        check_exception(&response)?;
        let Some(array_id) = response
            .get("result")
            .and_then(|r| r.get("objectId"))
            .and_then(Value::as_str)
        else {
            return Ok(Vec::new());
        };

        let props = self
            .page(
                "Runtime.getProperties",
                json!({ "objectId": array_id, "ownProperties": true }),
            )
            .await?;

        let mut indexed: Vec<(usize, ElementHandle)> = props
            .get("result")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let index = entry.get("name")?.as_str()?.parse::<usize>().ok()?;
                        let object = entry.get("value")?.get("objectId")?.as_str()?;
                        Some((index, ElementHandle::new(object)))
                    })
                    .collect()
            })
            .unwrap_or_default();
        indexed.sort_by_key(|(index, _)| *index);

        let _ = self
            .page("Runtime.releaseObject", json!({ "objectId": array_id }))
            .await;
        Ok(indexed.into_iter().map(|(_, handle)| handle).collect())
    }

    async fn wait_ready(&self, wait_until: WaitUntil) -> Result<(), AdapterError> {
        loop {
            let state = self.eval_value("document.readyState").await?;
            let ready = match (wait_until, state.as_str()) {
                (WaitUntil::DomContentLoaded, Some("interactive" | "complete")) => true,
                (_, Some("complete")) => true,
                _ => false,
            };
            if ready {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if wait_until == WaitUntil::NetworkIdle {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok(())
    }

    async fn dispatch_mouse(&self, kind: &str, x: f64, y: f64) -> Result<(), AdapterError> {
        let mut payload = json!({ "type": kind, "x": x, "y": y });
        if kind != "mouseMoved" {
            payload["button"] = json!("left");
            payload["clickCount"] = json!(1);
        }
        self.page("Input.dispatchMouseEvent", payload).await.map(|_| ())
    }

    async fn center_of(&self, handle: &ElementHandle) -> Result<(f64, f64), AdapterError> {
        self.scroll_into_view(handle).await?;
        self.bounding_box(handle)
            .await?
            .map(|bbox| bbox.center())
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::NotVisible)
                    .with_hint("element is not visible (empty bounding box)")
            })
    }
}

#[async_trait]
impl<T: CdpTransport + 'static> BrowserDriver for CdpDriver<T> {
    async fn navigate(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        debug!(target: "cdp-driver", %url, ?wait_until, "navigate");
        let work = async {
            let response = self.page("Page.navigate", json!({ "url": url })).await?;
            if let Some(error) = response.get("errorText").and_then(Value::as_str) {
                if !error.is_empty() {
                    return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint(format!("navigation failed: {error}")));
                }
            }
            self.wait_ready(wait_until).await
        };
        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout).with_hint(format!(
                "navigation to {url} timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        let value = self.eval_value("location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> Result<String, AdapterError> {
        let value = self.eval_value("document.title").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn accessibility_snapshot(
        &self,
        timeout: Duration,
    ) -> Result<Option<AxNode>, AdapterError> {
        with_timeout(timeout, "accessibility snapshot", async {
            let _ = self.page("Accessibility.enable", json!({})).await;
            let response = self.page("Accessibility.getFullAXTree", json!({})).await?;
            let nodes = response
                .get("nodes")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    AdapterError::internal("Accessibility.getFullAXTree missing 'nodes' array")
                })?;
            Ok(ax_tree_from_nodes(nodes))
        })
        .await
    }

    async fn query_selector_all(
        &self,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, AdapterError> {
        let selector = serde_json::to_string(selector)
            .map_err(|err| AdapterError::internal(err.to_string()))?;
        self.handles_from_array(&format!(
            "Array.from(document.querySelectorAll({selector}))"
        ))
        .await
    }

    async fn query_by_role(
        &self,
        role: &str,
        name: &str,
        exact: bool,
    ) -> Result<Vec<ElementHandle>, AdapterError> {
        let args = serde_json::to_string(&json!([role, name, exact]))
            .map_err(|err| AdapterError::internal(err.to_string()))?;
        self.handles_from_array(&format!("{}(...{args})", scripts::QUERY_BY_ROLE))
            .await
    }

    async fn query_by_text(&self, text: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        let text = serde_json::to_string(text)
            .map_err(|err| AdapterError::internal(err.to_string()))?;
        self.handles_from_array(&format!("{}({text})", scripts::QUERY_BY_TEXT))
            .await
    }

    async fn click(
        &self,
        handle: &ElementHandle,
        options: ClickOptions,
    ) -> Result<(), AdapterError> {
        with_timeout(options.timeout, "click", async {
            if !options.force {
                let state = self.element_state(handle).await?;
                if !state.visible {
                    return Err(AdapterError::new(AdapterErrorKind::NotVisible)
                        .with_hint("element is not visible"));
                }
                if !state.enabled {
                    return Err(AdapterError::new(AdapterErrorKind::NotVisible)
                        .with_hint("element is disabled"));
                }
            }
            let (x, y) = self.center_of(handle).await?;
            self.dispatch_mouse("mouseMoved", x, y).await?;
            self.dispatch_mouse("mousePressed", x, y).await?;
            self.dispatch_mouse("mouseReleased", x, y).await
        })
        .await
    }

    async fn fill(&self, handle: &ElementHandle, text: &str) -> Result<(), AdapterError> {
        with_timeout(self.default_timeout(), "fill", async {
            self.call_on(handle, scripts::FILL, vec![json!(text)])
                .await
                .map(|_| ())
        })
        .await
    }

    async fn type_text(
        &self,
        handle: &ElementHandle,
        text: &str,
        delay: Duration,
    ) -> Result<(), AdapterError> {
        self.focus(handle).await?;
        for ch in text.chars() {
            self.page("Input.insertText", json!({ "text": ch.to_string() }))
                .await?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn hover(&self, handle: &ElementHandle) -> Result<(), AdapterError> {
        let (x, y) = self.center_of(handle).await?;
        self.dispatch_mouse("mouseMoved", x, y).await
    }

    async fn focus(&self, handle: &ElementHandle) -> Result<(), AdapterError> {
        self.call_on(handle, scripts::FOCUS, vec![]).await.map(|_| ())
    }

    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, AdapterError> {
        let value = self
            .call_on(handle, scripts::GET_ATTRIBUTE, vec![json!(name)])
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn inner_text(&self, handle: &ElementHandle) -> Result<String, AdapterError> {
        let value = self.call_on(handle, scripts::INNER_TEXT, vec![]).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn element_state(&self, handle: &ElementHandle) -> Result<ElementState, AdapterError> {
        let value = self.call_on(handle, scripts::ELEMENT_STATE, vec![]).await?;
        serde_json::from_value(value).map_err(|err| AdapterError::internal(err.to_string()))
    }

    async fn bounding_box(
        &self,
        handle: &ElementHandle,
    ) -> Result<Option<BoundingBox>, AdapterError> {
        let value = self.call_on(handle, scripts::BOUNDING_BOX, vec![]).await?;
        let bbox: BoundingBox =
            serde_json::from_value(value).map_err(|err| AdapterError::internal(err.to_string()))?;
        Ok((bbox.width > 0.0 && bbox.height > 0.0).then_some(bbox))
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), AdapterError> {
        self.call_on(handle, scripts::SCROLL_INTO_VIEW, vec![])
            .await
            .map(|_| ())
    }

    async fn select_option(
        &self,
        handle: &ElementHandle,
        value: &str,
    ) -> Result<Vec<String>, AdapterError> {
        let selected = self
            .call_on(handle, scripts::SELECT_OPTION, vec![json!(value)])
            .await?;
        match selected {
            Value::Array(values) => Ok(values
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()),
            _ => Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
                .with_hint(format!("no option matching '{value}'"))),
        }
    }

    async fn is_within(
        &self,
        handle: &ElementHandle,
        container_selector: &str,
    ) -> Result<bool, AdapterError> {
        let value = self
            .call_on(handle, scripts::IS_WITHIN, vec![json!(container_selector)])
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn focused_element(&self) -> Result<Option<FocusedElement>, AdapterError> {
        let value = self
            .eval_value(&format!("{}\n{}", scripts::PRELUDE, scripts::FOCUSED_ELEMENT))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| AdapterError::internal(err.to_string()))
    }

    async fn press_key(&self, key: &str) -> Result<(), AdapterError> {
        let chord = KeyChord::parse(key)?;
        let mut down = json!({
            "type": if chord.text.is_some() { "keyDown" } else { "rawKeyDown" },
            "key": chord.key,
            "code": chord.code,
            "windowsVirtualKeyCode": chord.key_code,
            "modifiers": chord.modifiers,
        });
        if let Some(text) = &chord.text {
            down["text"] = json!(text);
        }
        self.page("Input.dispatchKeyEvent", down).await?;
        self.page(
            "Input.dispatchKeyEvent",
            json!({
                "type": "keyUp",
                "key": chord.key,
                "code": chord.code,
                "windowsVirtualKeyCode": chord.key_code,
                "modifiers": chord.modifiers,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<(), AdapterError> {
        self.dispatch_mouse("mouseMoved", x, y).await?;
        self.dispatch_mouse("mousePressed", x, y).await?;
        self.dispatch_mouse("mouseReleased", x, y).await
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), AdapterError> {
        self.dispatch_mouse("mouseMoved", x, y).await
    }

    async fn mouse_wheel(&self, delta_x: f64, delta_y: f64) -> Result<(), AdapterError> {
        let x = f64::from(self.cfg.viewport_width) / 2.0;
        let y = f64::from(self.cfg.viewport_height) / 2.0;
        self.page(
            "Input.dispatchMouseEvent",
            json!({ "type": "mouseWheel", "x": x, "y": y, "deltaX": delta_x, "deltaY": delta_y }),
        )
        .await
        .map(|_| ())
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .page(
                "Page.captureScreenshot",
                json!({ "format": "png", "captureBeyondViewport": full_page }),
            )
            .await?;
        decode_data(&response)
    }

    async fn pdf(&self) -> Result<Vec<u8>, AdapterError> {
        let response = self.page("Page.printToPDF", json!({})).await?;
        decode_data(&response)
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError> {
        with_timeout(self.default_timeout(), "evaluate", self.eval_value(expression)).await
    }

    async fn same_node(&self, a: &ElementHandle, b: &ElementHandle) -> Result<bool, AdapterError> {
        if a == b {
            return Ok(true);
        }
        let response = self
            .page(
                "Runtime.callFunctionOn",
                json!({
                    "objectId": a.id(),
                    "functionDeclaration": "function(other) { return this === other; }",
                    "arguments": [{ "objectId": b.id() }],
                    "returnByValue": true,
                }),
            )
            .await
            .map_err(stale_handle)?;
        check_exception(&response)?;
        Ok(response
            .get("result")
            .and_then(|r| r.get("value"))
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn open_handle_scope(&self, scope: u64) -> Result<(), AdapterError> {
        let previous = std::mem::replace(&mut *self.object_group.lock(), object_group_name(scope));
        if previous == object_group_name(scope) {
            return Ok(());
        }
        debug!(group = %previous, "releasing element handles");
        self.page("Runtime.releaseObjectGroup", json!({ "objectGroup": previous }))
            .await
            .map(|_| ())
    }
}

fn object_group_name(scope: u64) -> String {
    format!("refpilot-{scope}")
}

fn str_field(value: &Value, key: &str) -> Result<String, AdapterError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AdapterError::internal(format!("cdp response missing '{key}'")))
}

fn check_exception(response: &Value) -> Result<(), AdapterError> {
    let Some(details) = response.get("exceptionDetails") else {
        return Ok(());
    };
    let message = details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("script exception");
    let kind = if message.contains("is not a valid selector") {
        AdapterErrorKind::InvalidArgument
    } else {
        AdapterErrorKind::Internal
    };
    Err(AdapterError::new(kind).with_hint(message.to_string()))
}

fn stale_handle(err: AdapterError) -> AdapterError {
    let stale = err
        .hint
        .as_deref()
        .map(|h| h.contains("Could not find object") || h.contains("Cannot find context"))
        .unwrap_or(false);
    if stale {
        AdapterError::new(AdapterErrorKind::TargetNotFound)
            .with_hint("element handle not found; it was detached from the page")
    } else {
        err
    }
}

fn decode_data(response: &Value) -> Result<Vec<u8>, AdapterError> {
    let data = str_field(response, "data")?;
    STANDARD
        .decode(data)
        .map_err(|err| AdapterError::internal(format!("invalid base64 payload: {err}")))
}

/// Key description for `Input.dispatchKeyEvent`.
#[derive(Debug, Clone, PartialEq)]
struct KeyChord {
    key: String,
    code: String,
    key_code: u32,
    text: Option<String>,
    modifiers: u32,
}

impl KeyChord {
    fn parse(raw: &str) -> Result<Self, AdapterError> {
        let mut parts: Vec<&str> = raw.split('+').map(str::trim).collect();
        let key = match parts.pop() {
            Some(key) if !key.is_empty() => key,
            // "Control++" style input
            _ if raw.ends_with('+') => "+",
            _ => {
                return Err(AdapterError::new(AdapterErrorKind::InvalidArgument)
                    .with_hint(format!("empty key '{raw}'")))
            }
        };

        let mut modifiers = 0;
        for modifier in parts.iter().filter(|p| !p.is_empty()) {
            modifiers |= match modifier.to_ascii_lowercase().as_str() {
                "alt" => 1,
                "control" | "ctrl" => 2,
                "meta" | "cmd" | "command" => 4,
                "shift" => 8,
                other => {
                    return Err(AdapterError::new(AdapterErrorKind::InvalidArgument)
                        .with_hint(format!("unknown modifier '{other}'")))
                }
            };
        }

        let named = |key: &str, code: &str, key_code: u32, text: Option<&str>| Self {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: text.map(str::to_string),
            modifiers,
        };

        let chord = match key.to_ascii_lowercase().as_str() {
            "enter" | "return" => named("Enter", "Enter", 13, Some("\r")),
            "tab" => named("Tab", "Tab", 9, None),
            "space" | " " => named(" ", "Space", 32, Some(" ")),
            "escape" | "esc" => named("Escape", "Escape", 27, None),
            "backspace" => named("Backspace", "Backspace", 8, None),
            "delete" => named("Delete", "Delete", 46, None),
            "arrowup" => named("ArrowUp", "ArrowUp", 38, None),
            "arrowdown" => named("ArrowDown", "ArrowDown", 40, None),
            "arrowleft" => named("ArrowLeft", "ArrowLeft", 37, None),
            "arrowright" => named("ArrowRight", "ArrowRight", 39, None),
            "pageup" => named("PageUp", "PageUp", 33, None),
            "pagedown" => named("PageDown", "PageDown", 34, None),
            "home" => named("Home", "Home", 36, None),
            "end" => named("End", "End", 35, None),
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => {
                        let upper = ch.to_ascii_uppercase();
                        let code = if ch.is_ascii_alphabetic() {
                            format!("Key{upper}")
                        } else if ch.is_ascii_digit() {
                            format!("Digit{ch}")
                        } else {
                            String::new()
                        };
                        // Suppress text when a non-shift modifier turns the key into a shortcut.
                        let text = ((modifiers & !8) == 0).then(|| ch.to_string());
                        Self {
                            key: ch.to_string(),
                            code,
                            key_code: upper as u32,
                            text,
                            modifiers,
                        }
                    }
                    _ => {
                        return Err(AdapterError::new(AdapterErrorKind::InvalidArgument)
                            .with_hint(format!("unsupported key '{key}'")))
                    }
                }
            }
        };
        Ok(chord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        responses: Mutex<VecDeque<Value>>,
        commands: Mutex<Vec<(CommandTarget, String, Value)>>,
    }

    impl RecordingTransport {
        async fn push(&self, value: Value) {
            self.responses.lock().await.push_back(value);
        }
    }

    #[async_trait]
    impl CdpTransport for RecordingTransport {
        async fn start(&self) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn send_command(
            &self,
            target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, AdapterError> {
            self.commands
                .lock()
                .await
                .push((target, method.to_string(), params));
            Ok(self.responses.lock().await.pop_front().unwrap_or(json!({})))
        }
    }

    async fn attached() -> (CdpDriver<RecordingTransport>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        transport.push(json!({ "targetId": "T1" })).await;
        transport.push(json!({ "sessionId": "S1" })).await;
        let driver = CdpDriver::attach(transport.clone(), CdpConfig::default())
            .await
            .expect("attach");
        transport.commands.lock().await.clear();
        (driver, transport)
    }

    #[tokio::test]
    async fn attach_routes_page_commands_to_session() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push(json!({ "targetId": "T1" })).await;
        transport.push(json!({ "sessionId": "S1" })).await;
        let _driver = CdpDriver::attach(transport.clone(), CdpConfig::default())
            .await
            .unwrap();

        let commands = transport.commands.lock().await;
        assert_eq!(commands[0].1, "Target.createTarget");
        assert_eq!(commands[1].1, "Target.attachToTarget");
        assert!(commands[2..]
            .iter()
            .all(|(target, _, _)| *target == CommandTarget::Session("S1".into())));
        assert!(commands
            .iter()
            .any(|(_, method, _)| method == "Page.addScriptToEvaluateOnNewDocument"));
    }

    #[tokio::test]
    async fn navigate_surfaces_error_text() {
        let (driver, transport) = attached().await;
        transport
            .push(json!({ "frameId": "F", "errorText": "net::ERR_NAME_NOT_RESOLVED" }))
            .await;
        let err = driver
            .navigate("https://nope.invalid", WaitUntil::Load, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("net::ERR_NAME_NOT_RESOLVED"));
    }

    #[tokio::test]
    async fn navigate_waits_for_ready_state() {
        let (driver, transport) = attached().await;
        transport.push(json!({ "frameId": "F" })).await;
        transport
            .push(json!({ "result": { "type": "string", "value": "loading" } }))
            .await;
        transport
            .push(json!({ "result": { "type": "string", "value": "complete" } }))
            .await;
        driver
            .navigate("https://example.com", WaitUntil::Load, Duration::from_secs(2))
            .await
            .unwrap();
        let commands = transport.commands.lock().await;
        let evaluations = commands
            .iter()
            .filter(|(_, method, _)| method == "Runtime.evaluate")
            .count();
        assert_eq!(evaluations, 2);
    }

    #[tokio::test]
    async fn query_selector_all_splits_array_in_index_order() {
        let (driver, transport) = attached().await;
        transport
            .push(json!({ "result": { "type": "object", "objectId": "arr" } }))
            .await;
        transport
            .push(json!({ "result": [
                { "name": "1", "value": { "objectId": "obj-b" } },
                { "name": "length", "value": { "value": 2 } },
                { "name": "0", "value": { "objectId": "obj-a" } }
            ]}))
            .await;
        let handles = driver.query_selector_all("button").await.unwrap();
        assert_eq!(
            handles,
            vec![ElementHandle::new("obj-a"), ElementHandle::new("obj-b")]
        );
    }

    #[tokio::test]
    async fn element_queries_join_the_open_handle_scope() {
        let (driver, transport) = attached().await;
        driver.open_handle_scope(3).await.unwrap();
        transport
            .push(json!({ "result": { "type": "object", "objectId": "arr" } }))
            .await;
        transport.push(json!({ "result": [] })).await;
        driver.query_selector_all("a").await.unwrap();
        driver.open_handle_scope(4).await.unwrap();

        let commands = transport.commands.lock().await;
        let evaluate = commands
            .iter()
            .rev()
            .find(|(_, m, p)| m == "Runtime.evaluate" && p.get("objectGroup").is_some())
            .unwrap();
        assert_eq!(evaluate.2["objectGroup"], "refpilot-3");
        let released: Vec<&str> = commands
            .iter()
            .filter(|(_, m, _)| m == "Runtime.releaseObjectGroup")
            .filter_map(|(_, _, p)| p.get("objectGroup").and_then(Value::as_str))
            .collect();
        assert_eq!(released, vec!["refpilot-0", "refpilot-3"]);
    }

    #[tokio::test]
    async fn same_node_compares_remote_objects() {
        let (driver, transport) = attached().await;
        transport
            .push(json!({ "result": { "type": "boolean", "value": true } }))
            .await;
        let same = driver
            .same_node(&ElementHandle::new("obj-a"), &ElementHandle::new("obj-b"))
            .await
            .unwrap();
        assert!(same);
        let commands = transport.commands.lock().await;
        let (_, _, params) = commands.last().unwrap();
        assert_eq!(params["objectId"], "obj-a");
        assert_eq!(params["arguments"][0]["objectId"], "obj-b");
    }

    #[tokio::test]
    async fn invalid_selector_maps_to_invalid_argument() {
        let (driver, transport) = attached().await;
        transport
            .push(json!({ "exceptionDetails": { "text": "Uncaught", "exception": {
                "description": "SyntaxError: '##' is not a valid selector." } } }))
            .await;
        let err = driver.query_selector_all("##").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn press_enter_sends_down_and_up() {
        let (driver, transport) = attached().await;
        driver.press_key("Enter").await.unwrap();
        let commands = transport.commands.lock().await;
        let keys: Vec<&str> = commands
            .iter()
            .filter(|(_, m, _)| m == "Input.dispatchKeyEvent")
            .filter_map(|(_, _, p)| p.get("type").and_then(Value::as_str))
            .collect();
        assert_eq!(keys, vec!["keyDown", "keyUp"]);
    }

    #[test]
    fn key_chords_parse_modifiers() {
        let chord = KeyChord::parse("Control+a").unwrap();
        assert_eq!(chord.modifiers, 2);
        assert_eq!(chord.code, "KeyA");
        assert!(chord.text.is_none());

        let tab = KeyChord::parse("Tab").unwrap();
        assert_eq!(tab.key_code, 9);
        assert!(KeyChord::parse("Hyper+x").is_err());
        assert!(KeyChord::parse("F13").is_err());
    }
}
