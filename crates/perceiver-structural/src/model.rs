use std::collections::HashMap;

use cdp_adapter::{AxNode, ElementHandle};
use refpilot_core_types::{ElementRef, Generation};
use serde::{Deserialize, Serialize};

/// One row of a catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    #[serde(rename = "ref")]
    pub element_ref: ElementRef,
    pub role: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub disabled: bool,
}

impl ElementDescriptor {
    pub fn new(element_ref: ElementRef, role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            element_ref,
            role: role.into(),
            name: name.into(),
            value: None,
            description: None,
            focused: false,
            disabled: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// True when any of the diffed fields differ.
    pub fn differs_from(&self, other: &ElementDescriptor) -> bool {
        self.role != other.role
            || self.name != other.name
            || self.value != other.value
            || self.focused != other.focused
            || self.disabled != other.disabled
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Accessibility,
    /// Accessibility tree supplemented by the DOM pass.
    Mixed,
    DomFallback,
    Empty,
}

/// Immutable result of one catalog build.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    pub generation: Generation,
    pub url: String,
    pub title: String,
    pub elements: Vec<ElementDescriptor>,
    pub source: CatalogSource,
    /// Elements dropped by the size cap.
    #[serde(default)]
    pub truncated: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_tree: Option<AxNode>,
}

impl Catalog {
    pub fn empty(generation: Generation, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            generation,
            url: url.into(),
            title: title.into(),
            elements: Vec::new(),
            source: CatalogSource::Empty,
            truncated: 0,
            raw_tree: None,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, element_ref: &ElementRef) -> Option<&ElementDescriptor> {
        self.elements.iter().find(|e| &e.element_ref == element_ref)
    }
}

/// How a ref can be turned back into a live element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefResolutionEntry {
    pub role: String,
    pub name: String,
    /// Present when the row came from the DOM pass, which already holds a live handle.
    pub handle: Option<ElementHandle>,
}

/// Ref lookup table owned by exactly one catalog generation.
#[derive(Clone, Debug, Default)]
pub struct RefTable {
    generation: Generation,
    entries: HashMap<ElementRef, RefResolutionEntry>,
}

impl RefTable {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            entries: HashMap::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn insert(&mut self, element_ref: ElementRef, entry: RefResolutionEntry) {
        self.entries.insert(element_ref, entry);
    }

    pub fn get(&self, element_ref: &ElementRef) -> Option<&RefResolutionEntry> {
        self.entries.get(element_ref)
    }

    /// Lookup that refuses refs issued by any other generation.
    pub fn get_scoped(
        &self,
        generation: Generation,
        element_ref: &ElementRef,
    ) -> Option<&RefResolutionEntry> {
        if generation != self.generation {
            return None;
        }
        self.entries.get(element_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedElement {
    pub previous: ElementDescriptor,
    pub current: ElementDescriptor,
}

/// Delta between two catalogs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub added: Vec<ElementDescriptor>,
    pub removed: Vec<ElementDescriptor>,
    pub changed: Vec<ChangedElement>,
    pub url_changed: bool,
    pub title_changed: bool,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && !self.url_changed
            && !self.title_changed
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}
