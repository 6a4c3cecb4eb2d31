use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;

/// Page load milestone a navigation waits for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Opaque live element handle issued by a driver.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Nested accessibility node, with ignored nodes already collapsed into their parents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AxNode {
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AxNode>,
}

impl AxNode {
    pub fn new(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<AxNode>) -> Self {
        self.children = children;
        self
    }

    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
    pub editable: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedElement {
    pub role: String,
    pub name: String,
    pub tag: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickOptions {
    /// Skip visibility and enabled checks.
    pub force: bool,
    pub timeout: Duration,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            force: false,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Everything the snapshot, resolver and executor layers need from a browser page.
///
/// Implementations bound each call by a timeout and report failures as [`AdapterError`].
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), AdapterError>;
    async fn current_url(&self) -> Result<String, AdapterError>;
    async fn title(&self) -> Result<String, AdapterError>;

    async fn accessibility_snapshot(
        &self,
        timeout: Duration,
    ) -> Result<Option<AxNode>, AdapterError>;

    async fn query_selector_all(&self, selector: &str)
        -> Result<Vec<ElementHandle>, AdapterError>;
    /// Elements whose role matches and whose accessible name equals (`exact`) or contains
    /// (case-insensitive) `name`.
    async fn query_by_role(
        &self,
        role: &str,
        name: &str,
        exact: bool,
    ) -> Result<Vec<ElementHandle>, AdapterError>;
    async fn query_by_text(&self, text: &str) -> Result<Vec<ElementHandle>, AdapterError>;

    async fn click(&self, handle: &ElementHandle, options: ClickOptions)
        -> Result<(), AdapterError>;
    async fn fill(&self, handle: &ElementHandle, text: &str) -> Result<(), AdapterError>;
    async fn type_text(
        &self,
        handle: &ElementHandle,
        text: &str,
        delay: Duration,
    ) -> Result<(), AdapterError>;
    async fn hover(&self, handle: &ElementHandle) -> Result<(), AdapterError>;
    async fn focus(&self, handle: &ElementHandle) -> Result<(), AdapterError>;
    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, AdapterError>;
    async fn inner_text(&self, handle: &ElementHandle) -> Result<String, AdapterError>;
    async fn element_state(&self, handle: &ElementHandle) -> Result<ElementState, AdapterError>;
    async fn bounding_box(
        &self,
        handle: &ElementHandle,
    ) -> Result<Option<BoundingBox>, AdapterError>;
    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), AdapterError>;
    /// Selects by option value or label; returns the values now selected.
    async fn select_option(
        &self,
        handle: &ElementHandle,
        value: &str,
    ) -> Result<Vec<String>, AdapterError>;
    async fn is_within(
        &self,
        handle: &ElementHandle,
        container_selector: &str,
    ) -> Result<bool, AdapterError>;

    async fn focused_element(&self) -> Result<Option<FocusedElement>, AdapterError>;
    async fn press_key(&self, key: &str) -> Result<(), AdapterError>;
    async fn mouse_click(&self, x: f64, y: f64) -> Result<(), AdapterError>;
    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), AdapterError>;
    async fn mouse_wheel(&self, delta_x: f64, delta_y: f64) -> Result<(), AdapterError>;

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, AdapterError>;
    async fn pdf(&self) -> Result<Vec<u8>, AdapterError>;
    async fn evaluate(&self, expression: &str) -> Result<Value, AdapterError>;

    /// Whether two handles point at the same DOM node.
    async fn same_node(&self, a: &ElementHandle, b: &ElementHandle) -> Result<bool, AdapterError> {
        Ok(a == b)
    }

    /// Starts a new handle scope: handles created from now on belong to `scope`
    /// and handles from the previous scope are released.
    async fn open_handle_scope(&self, _scope: u64) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Bounds `fut` by `limit`, mapping expiry to a retriable timeout error.
pub async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::timeout(format!(
            "{what} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
