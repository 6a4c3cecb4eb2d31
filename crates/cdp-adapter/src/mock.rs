//! In-memory scripted driver for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::driver::{
    AxNode, BoundingBox, BrowserDriver, ClickOptions, ElementHandle, ElementState,
    FocusedElement, WaitUntil,
};
use crate::error::{AdapterError, AdapterErrorKind};

#[derive(Clone, Debug)]
pub struct MockElement {
    pub handle: ElementHandle,
    pub role: String,
    pub name: String,
    pub text: String,
    pub value: Option<String>,
    pub attributes: HashMap<String, String>,
    /// Selectors that match this element.
    pub selectors: Vec<String>,
    /// Selectors of containers that enclose this element.
    pub containers: Vec<String>,
    pub options: Vec<String>,
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
    /// Participates in Tab order.
    pub focusable: bool,
}

impl MockElement {
    pub fn new(id: &str, role: &str, name: &str) -> Self {
        Self {
            handle: ElementHandle::new(id),
            role: role.to_string(),
            name: name.to_string(),
            text: name.to_string(),
            value: None,
            attributes: HashMap::new(),
            selectors: Vec::new(),
            containers: Vec::new(),
            options: Vec::new(),
            visible: true,
            enabled: true,
            checked: false,
            focusable: true,
        }
    }

    pub fn selector(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }

    pub fn within(mut self, container: &str) -> Self {
        self.containers.push(container.to_string());
        self
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn not_focusable(mut self) -> Self {
        self.focusable = false;
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockPage {
    pub title: String,
    pub ax_tree: Option<AxNode>,
    pub elements: Vec<MockElement>,
}

impl MockPage {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tree(mut self, tree: AxNode) -> Self {
        self.ax_tree = Some(tree);
        self
    }

    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    page: MockPage,
    pages: HashMap<String, MockPage>,
    focus: Option<usize>,
    calls: Vec<String>,
    failures: HashMap<String, VecDeque<AdapterError>>,
    persistent_failures: HashMap<String, AdapterError>,
    disconnected: bool,
    mutation_epoch: u64,
    observer_installed: bool,
    eval_results: HashMap<String, Value>,
    rerenders: HashMap<String, MockPage>,
}

/// Scripted [`BrowserDriver`]; every call is recorded as `op:detail` for assertions.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    pub fn new(url: &str, page: MockPage) -> Self {
        let driver = Self::default();
        {
            let mut state = driver.state.lock();
            state.url = url.to_string();
            state.pages.insert(url.to_string(), page.clone());
            state.page = page;
        }
        driver
    }

    pub fn add_page(&self, url: &str, page: MockPage) {
        self.state.lock().pages.insert(url.to_string(), page);
    }

    /// Replaces the current document without a navigation (client-side re-render).
    pub fn set_page(&self, page: MockPage) {
        let mut state = self.state.lock();
        let url = state.url.clone();
        state.pages.insert(url, page.clone());
        state.page = page;
        state.mutation_epoch += 1;
    }

    /// Re-renders the document as `page` right after the next call of `op` returns.
    pub fn rerender_after(&self, op: &str, page: MockPage) {
        self.state.lock().rerenders.insert(op.to_string(), page);
    }

    fn apply_rerender(&self, op: &str) {
        let pending = self.state.lock().rerenders.remove(op);
        if let Some(page) = pending {
            self.set_page(page);
        }
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().url = url.to_string();
    }

    /// Queues one failure for the next call of `op` (method name, e.g. `click`).
    pub fn fail_next(&self, op: &str, err: AdapterError) {
        self.state
            .lock()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    /// Every call of `op` fails until cleared.
    pub fn fail_always(&self, op: &str, err: AdapterError) {
        self.state
            .lock()
            .persistent_failures
            .insert(op.to_string(), err);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failures.clear();
        state.persistent_failures.clear();
    }

    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    /// Simulates a DOM mutation observed by an installed observer.
    pub fn mutate(&self) {
        self.state.lock().mutation_epoch += 1;
    }

    pub fn set_eval_result(&self, expression: &str, value: Value) {
        self.state
            .lock()
            .eval_results
            .insert(expression.to_string(), value);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn element_value(&self, id: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .page
            .elements
            .iter()
            .find(|el| el.handle.id() == id)
            .and_then(|el| el.value.clone())
    }

    fn enter(&self, op: &str, detail: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.calls.push(if detail.is_empty() {
            op.to_string()
        } else {
            format!("{op}:{detail}")
        });
        if state.disconnected {
            return Err(AdapterError::new(AdapterErrorKind::Disconnected)
                .with_hint("mock browser disconnected"));
        }
        if let Some(err) = state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        if let Some(err) = state.persistent_failures.get(op) {
            return Err(err.clone());
        }
        Ok(())
    }

    fn with_element<R>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(&mut MockElement) -> Result<R, AdapterError>,
    ) -> Result<R, AdapterError> {
        let mut state = self.state.lock();
        let element = state
            .page
            .elements
            .iter_mut()
            .find(|el| &el.handle == handle)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("element handle {} not found", handle.id()))
            })?;
        f(element)
    }

    fn collect(&self, predicate: impl Fn(&MockElement) -> bool) -> Vec<ElementHandle> {
        self.state
            .lock()
            .page
            .elements
            .iter()
            .filter(|el| predicate(el))
            .map(|el| el.handle.clone())
            .collect()
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(
        &self,
        url: &str,
        _wait_until: WaitUntil,
        _timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.enter("navigate", url)?;
        let mut state = self.state.lock();
        state.url = url.to_string();
        state.page = state.pages.get(url).cloned().unwrap_or_default();
        state.focus = None;
        state.observer_installed = false;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        self.enter("current_url", "")?;
        Ok(self.state.lock().url.clone())
    }

    async fn title(&self) -> Result<String, AdapterError> {
        self.enter("title", "")?;
        Ok(self.state.lock().page.title.clone())
    }

    async fn accessibility_snapshot(
        &self,
        _timeout: Duration,
    ) -> Result<Option<AxNode>, AdapterError> {
        self.enter("accessibility_snapshot", "")?;
        let tree = self.state.lock().page.ax_tree.clone();
        self.apply_rerender("accessibility_snapshot");
        Ok(tree)
    }

    async fn query_selector_all(
        &self,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, AdapterError> {
        self.enter("query_selector_all", selector)?;
        Ok(self.collect(|el| el.selectors.iter().any(|s| s == selector)))
    }

    async fn query_by_role(
        &self,
        role: &str,
        name: &str,
        exact: bool,
    ) -> Result<Vec<ElementHandle>, AdapterError> {
        self.enter(
            "query_by_role",
            &format!("{role}:{name}:{}", if exact { "exact" } else { "partial" }),
        )?;
        let needle = name.to_lowercase();
        Ok(self.collect(|el| {
            el.role == role
                && if exact {
                    el.name == name
                } else {
                    el.name.to_lowercase().contains(&needle)
                }
        }))
    }

    async fn query_by_text(&self, text: &str) -> Result<Vec<ElementHandle>, AdapterError> {
        self.enter("query_by_text", text)?;
        let needle = text.to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.collect(|el| el.visible && el.text.to_lowercase().contains(&needle)))
    }

    async fn click(
        &self,
        handle: &ElementHandle,
        options: ClickOptions,
    ) -> Result<(), AdapterError> {
        self.enter("click", handle.id())?;
        let clicked = self.with_element(handle, |el| {
            if !options.force && !el.visible {
                return Err(AdapterError::new(AdapterErrorKind::NotVisible)
                    .with_hint("element is not visible"));
            }
            if el.role == "checkbox" || el.role == "radio" {
                el.checked = !el.checked;
            }
            Ok(el.focusable)
        })?;
        if clicked {
            let mut state = self.state.lock();
            state.focus = state
                .page
                .elements
                .iter()
                .position(|el| &el.handle == handle);
        }
        Ok(())
    }

    async fn fill(&self, handle: &ElementHandle, text: &str) -> Result<(), AdapterError> {
        self.enter("fill", &format!("{}:{text}", handle.id()))?;
        self.with_element(handle, |el| {
            el.value = Some(text.to_string());
            Ok(())
        })
    }

    async fn type_text(
        &self,
        handle: &ElementHandle,
        text: &str,
        _delay: Duration,
    ) -> Result<(), AdapterError> {
        self.enter("type_text", &format!("{}:{text}", handle.id()))?;
        self.with_element(handle, |el| {
            let mut current = el.value.take().unwrap_or_default();
            current.push_str(text);
            el.value = Some(current);
            Ok(())
        })
    }

    async fn hover(&self, handle: &ElementHandle) -> Result<(), AdapterError> {
        self.enter("hover", handle.id())?;
        self.with_element(handle, |_| Ok(()))
    }

    async fn focus(&self, handle: &ElementHandle) -> Result<(), AdapterError> {
        self.enter("focus", handle.id())?;
        let mut state = self.state.lock();
        let index = state
            .page
            .elements
            .iter()
            .position(|el| &el.handle == handle)
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::TargetNotFound))?;
        state.focus = Some(index);
        Ok(())
    }

    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, AdapterError> {
        self.enter("get_attribute", &format!("{}:{name}", handle.id()))?;
        self.with_element(handle, |el| {
            if name == "value" && el.value.is_some() {
                return Ok(el.value.clone());
            }
            Ok(el.attributes.get(name).cloned())
        })
    }

    async fn inner_text(&self, handle: &ElementHandle) -> Result<String, AdapterError> {
        self.enter("inner_text", handle.id())?;
        self.with_element(handle, |el| Ok(el.text.clone()))
    }

    async fn element_state(&self, handle: &ElementHandle) -> Result<ElementState, AdapterError> {
        self.enter("element_state", handle.id())?;
        self.with_element(handle, |el| {
            Ok(ElementState {
                visible: el.visible,
                enabled: el.enabled,
                checked: el.checked,
                editable: matches!(el.role.as_str(), "textbox" | "searchbox" | "combobox"),
            })
        })
    }

    async fn bounding_box(
        &self,
        handle: &ElementHandle,
    ) -> Result<Option<BoundingBox>, AdapterError> {
        self.enter("bounding_box", handle.id())?;
        self.with_element(handle, |el| {
            Ok(el.visible.then_some(BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 100.0,
                height: 20.0,
            }))
        })
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), AdapterError> {
        self.enter("scroll_into_view", handle.id())?;
        self.with_element(handle, |_| Ok(()))
    }

    async fn select_option(
        &self,
        handle: &ElementHandle,
        value: &str,
    ) -> Result<Vec<String>, AdapterError> {
        self.enter("select_option", &format!("{}:{value}", handle.id()))?;
        self.with_element(handle, |el| {
            if el.options.iter().any(|o| o == value) {
                el.value = Some(value.to_string());
                Ok(vec![value.to_string()])
            } else {
                Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
                    .with_hint(format!("no option matching '{value}'")))
            }
        })
    }

    async fn is_within(
        &self,
        handle: &ElementHandle,
        container_selector: &str,
    ) -> Result<bool, AdapterError> {
        self.enter("is_within", &format!("{}:{container_selector}", handle.id()))?;
        self.with_element(handle, |el| {
            Ok(el.containers.iter().any(|c| c == container_selector))
        })
    }

    async fn focused_element(&self) -> Result<Option<FocusedElement>, AdapterError> {
        self.enter("focused_element", "")?;
        let state = self.state.lock();
        Ok(state
            .focus
            .and_then(|index| state.page.elements.get(index))
            .map(|el| FocusedElement {
                role: el.role.clone(),
                name: el.name.clone(),
                tag: el.attributes.get("tag").cloned().unwrap_or_default(),
            }))
    }

    async fn press_key(&self, key: &str) -> Result<(), AdapterError> {
        self.enter("press", key)?;
        if key.eq_ignore_ascii_case("tab") {
            let mut state = self.state.lock();
            let order: Vec<usize> = state
                .page
                .elements
                .iter()
                .enumerate()
                .filter(|(_, el)| el.focusable && el.visible)
                .map(|(i, _)| i)
                .collect();
            if !order.is_empty() {
                let next = match state.focus.and_then(|f| order.iter().position(|i| *i == f)) {
                    Some(pos) => order[(pos + 1) % order.len()],
                    None => order[0],
                };
                state.focus = Some(next);
            }
        }
        Ok(())
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<(), AdapterError> {
        self.enter("mouse_click", &format!("{x},{y}"))
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), AdapterError> {
        self.enter("mouse_move", &format!("{x},{y}"))
    }

    async fn mouse_wheel(&self, delta_x: f64, delta_y: f64) -> Result<(), AdapterError> {
        self.enter("mouse_wheel", &format!("{delta_x},{delta_y}"))
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, AdapterError> {
        self.enter("screenshot", if full_page { "full" } else { "viewport" })?;
        Ok(b"\x89PNG mock".to_vec())
    }

    async fn pdf(&self) -> Result<Vec<u8>, AdapterError> {
        self.enter("pdf", "")?;
        Ok(b"%PDF-mock".to_vec())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError> {
        self.enter("evaluate", "")?;
        let mut state = self.state.lock();
        if expression.contains("MutationObserver") {
            state.observer_installed = true;
            return Ok(json!(state.mutation_epoch));
        }
        if expression.contains("__refpilotMutationEpoch") {
            return Ok(if state.observer_installed {
                json!(state.mutation_epoch)
            } else {
                Value::Null
            });
        }
        Ok(state
            .eval_results
            .get(expression)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn open_handle_scope(&self, scope: u64) -> Result<(), AdapterError> {
        self.enter("open_handle_scope", &scope.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> MockPage {
        MockPage::new("Demo")
            .with_element(MockElement::new("h1", "textbox", "Email"))
            .with_element(MockElement::new("h2", "button", "Save").selector("button"))
            .with_element(MockElement::new("h3", "link", "Hidden").hidden())
    }

    #[tokio::test]
    async fn tab_cycles_through_visible_focusable_elements() {
        let driver = MockDriver::new("https://demo.test/", page());
        driver.press_key("Tab").await.unwrap();
        assert_eq!(driver.focused_element().await.unwrap().unwrap().name, "Email");
        driver.press_key("Tab").await.unwrap();
        assert_eq!(driver.focused_element().await.unwrap().unwrap().name, "Save");
        driver.press_key("Tab").await.unwrap();
        assert_eq!(driver.focused_element().await.unwrap().unwrap().name, "Email");
    }

    #[tokio::test]
    async fn queued_failures_fire_once() {
        let driver = MockDriver::new("https://demo.test/", page());
        driver.fail_next("click", AdapterError::timeout("click"));
        let handle = ElementHandle::new("h2");
        assert!(driver.click(&handle, ClickOptions::default()).await.is_err());
        assert!(driver.click(&handle, ClickOptions::default()).await.is_ok());
        assert_eq!(driver.calls_matching("click").len(), 2);
    }

    #[tokio::test]
    async fn observer_epoch_resets_on_navigation() {
        let driver = MockDriver::new("https://demo.test/", page());
        let read = "window.__refpilotMutationEpoch ?? null";
        assert_eq!(driver.evaluate(read).await.unwrap(), Value::Null);
        driver.evaluate("new MutationObserver(() => {})").await.unwrap();
        driver.mutate();
        assert_eq!(driver.evaluate(read).await.unwrap(), json!(1));
        driver
            .navigate("https://demo.test/", WaitUntil::Load, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(driver.evaluate(read).await.unwrap(), Value::Null);
    }
}
