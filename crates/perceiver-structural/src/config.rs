use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "textbox",
    "searchbox",
    "checkbox",
    "radio",
    "combobox",
    "listbox",
    "option",
    "slider",
    "spinbutton",
    "switch",
    "tab",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "treeitem",
    "heading",
];

/// (CSS selector, role) pairs scanned by the DOM pass, in merge order.
pub const DEFAULT_FALLBACK_SELECTORS: &[(&str, &str)] = &[
    ("button", "button"),
    ("a[href]", "link"),
    ("input[type=search]", "searchbox"),
    (
        "input:not([type]), input[type=text], input[type=email], input[type=password], \
         input[type=tel], input[type=url], input[type=number]",
        "textbox",
    ),
    ("textarea", "textbox"),
    ("select", "combobox"),
    ("input[type=checkbox]", "checkbox"),
    ("input[type=radio]", "radio"),
    ("input[type=submit], input[type=button], input[type=reset]", "button"),
    ("[role=button]", "button"),
    ("[role=link]", "link"),
    ("[role=tab]", "tab"),
    ("[role=menuitem]", "menuitem"),
    ("[role=checkbox]", "checkbox"),
    ("[role=switch]", "switch"),
    ("[role=combobox]", "combobox"),
    ("[contenteditable=true]", "textbox"),
    ("[onclick]", "button"),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackSelector {
    pub selector: String,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub interactive_roles: Vec<String>,
    /// Below this many accessibility rows the DOM pass runs.
    pub min_ax_elements: usize,
    pub max_elements: usize,
    pub ax_timeout_ms: u64,
    pub fallback_selectors: Vec<FallbackSelector>,
    pub fallback_concurrency: usize,
    pub max_per_selector: usize,
    pub name_max_len: usize,
    pub include_within: Option<String>,
    pub exclude_within: Option<String>,
    pub keep_raw_tree: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            interactive_roles: DEFAULT_INTERACTIVE_ROLES
                .iter()
                .map(|r| r.to_string())
                .collect(),
            min_ax_elements: 5,
            max_elements: 250,
            ax_timeout_ms: 5_000,
            fallback_selectors: DEFAULT_FALLBACK_SELECTORS
                .iter()
                .map(|(selector, role)| FallbackSelector {
                    selector: selector.to_string(),
                    role: role.to_string(),
                })
                .collect(),
            fallback_concurrency: 4,
            max_per_selector: 50,
            name_max_len: 100,
            include_within: None,
            exclude_within: None,
            keep_raw_tree: false,
        }
    }
}

impl CatalogConfig {
    pub fn ax_timeout(&self) -> Duration {
        Duration::from_millis(self.ax_timeout_ms)
    }

    pub fn has_container_filter(&self) -> bool {
        self.include_within.is_some() || self.exclude_within.is_some()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
    pub max_entries: usize,
    /// Install a page-side MutationObserver and drop cached catalogs once the DOM changes.
    pub mutation_invalidation: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 5_000,
            max_entries: 16,
            mutation_invalidation: true,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub catalog: CatalogConfig,
    pub cache: CacheConfig,
}
