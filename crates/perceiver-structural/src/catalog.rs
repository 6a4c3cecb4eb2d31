//! Catalog builder: accessibility walk, DOM fallback pass, container filter, cap, refs.

use std::collections::HashSet;
use std::time::Instant;

use cdp_adapter::{AdapterError, AxNode, BrowserDriver, ElementHandle};
use futures::stream::{self, StreamExt};
use refpilot_core_types::Generation;
use tracing::{debug, info, warn};

use crate::config::{CatalogConfig, FallbackSelector};
use crate::metrics;
use crate::model::{Catalog, CatalogSource, ElementDescriptor, RefResolutionEntry, RefTable};
use crate::refs::RefAllocator;

const VALUE_ROLES: &[&str] = &["textbox", "searchbox", "combobox", "spinbutton", "slider"];
const NAME_ATTRIBUTES: &[&str] = &["aria-label", "placeholder", "title", "alt"];

/// A catalog together with the ref table of its generation.
#[derive(Clone, Debug)]
pub struct BuiltCatalog {
    pub catalog: Catalog,
    pub refs: RefTable,
}

#[derive(Clone, Debug, PartialEq)]
struct Candidate {
    role: String,
    name: String,
    value: Option<String>,
    description: Option<String>,
    focused: bool,
    disabled: bool,
    handle: Option<ElementHandle>,
}

pub struct CatalogBuilder {
    config: CatalogConfig,
}

impl CatalogBuilder {
    pub fn new(config: CatalogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Builds a catalog for the page currently loaded in `driver`.
    ///
    /// Never fails: when both the accessibility query and the DOM pass error out, the result
    /// is an empty catalog.
    pub async fn build(&self, driver: &dyn BrowserDriver, generation: Generation) -> BuiltCatalog {
        let started = Instant::now();
        let url = driver.current_url().await.unwrap_or_else(|err| {
            warn!(%err, "could not read page url for catalog");
            String::new()
        });
        let title = driver.title().await.unwrap_or_else(|err| {
            debug!(%err, "could not read page title for catalog");
            String::new()
        });

        let (mut candidates, raw_tree, ax_ok) =
            match driver.accessibility_snapshot(self.config.ax_timeout()).await {
                Ok(Some(tree)) => (self.collect_tree(&tree), Some(tree), true),
                Ok(None) => (Vec::new(), None, true),
                Err(err) => {
                    warn!(%err, "accessibility snapshot failed; using DOM pass only");
                    (Vec::new(), None, false)
                }
            };
        let ax_count = candidates.len();

        let mut fallback_added = 0;
        if ax_count < self.config.min_ax_elements {
            match self.fallback_pass(driver).await {
                Ok(extra) => {
                    fallback_added = merge_fallback(driver, &mut candidates, extra).await
                }
                Err(err) if !ax_ok => {
                    warn!(%err, "accessibility and DOM passes both failed; returning empty catalog");
                    metrics::record_catalog(CatalogSource::Empty, started.elapsed());
                    return BuiltCatalog {
                        catalog: Catalog::empty(generation, url, title),
                        refs: RefTable::new(generation),
                    };
                }
                Err(err) => warn!(%err, "DOM fallback pass failed; keeping accessibility rows"),
            }
        }

        if self.config.has_container_filter() {
            candidates = self.apply_container_filter(driver, candidates).await;
        }

        let source = match (ax_count > 0, fallback_added > 0) {
            (true, true) => CatalogSource::Mixed,
            (true, false) => CatalogSource::Accessibility,
            (false, true) => CatalogSource::DomFallback,
            (false, false) => CatalogSource::Empty,
        };
        let raw_tree = raw_tree.filter(|_| self.config.keep_raw_tree);
        let built = self.assemble(candidates, url, title, generation, source, raw_tree);

        metrics::record_catalog(source, started.elapsed());
        info!(
            generation = %generation,
            elements = built.catalog.len(),
            ax = ax_count,
            fallback = fallback_added,
            truncated = built.catalog.truncated,
            "catalog built"
        );
        built
    }

    /// Pure accessibility-tree variant of [`build`](Self::build): no DOM pass, no filter.
    pub fn build_from_tree(
        &self,
        root: &AxNode,
        url: impl Into<String>,
        title: impl Into<String>,
        generation: Generation,
    ) -> BuiltCatalog {
        let candidates = self.collect_tree(root);
        let source = if candidates.is_empty() {
            CatalogSource::Empty
        } else {
            CatalogSource::Accessibility
        };
        let raw = self.config.keep_raw_tree.then(|| root.clone());
        self.assemble(candidates, url.into(), title.into(), generation, source, raw)
    }

    fn is_interactive(&self, role: &str) -> bool {
        self.config.interactive_roles.iter().any(|r| r == role)
    }

    /// Depth-first, parent before children.
    fn collect_tree(&self, root: &AxNode) -> Vec<Candidate> {
        let limit = self.config.name_max_len;
        let mut out = Vec::new();
        let mut stack: Vec<(&AxNode, bool)> = vec![(root, false)];

        while let Some((node, parent_captured)) = stack.pop() {
            let captured = if self.is_interactive(&node.role) {
                out.push(Candidate {
                    role: node.role.clone(),
                    name: normalize(&node.name, limit),
                    value: node.value.as_deref().map(|v| normalize(v, limit)),
                    description: node.description.clone(),
                    focused: node.focused,
                    disabled: node.disabled,
                    handle: None,
                });
                true
            } else {
                if node.role == "text" && !parent_captured {
                    let name = normalize(&node.name, limit);
                    if !name.is_empty() {
                        out.push(Candidate {
                            role: "text".to_string(),
                            name,
                            value: None,
                            description: None,
                            focused: false,
                            disabled: false,
                            handle: None,
                        });
                    }
                }
                false
            };

            for child in node.children.iter().rev() {
                stack.push((child, captured));
            }
        }
        out
    }

    /// Runs every fallback selector (bounded concurrency) and concatenates results in selector
    /// order. Errors only when every selector failed.
    async fn fallback_pass(
        &self,
        driver: &dyn BrowserDriver,
    ) -> Result<Vec<Candidate>, AdapterError> {
        let selectors = &self.config.fallback_selectors;
        if selectors.is_empty() {
            return Ok(Vec::new());
        }

        let results: Vec<Result<Vec<Candidate>, AdapterError>> = stream::iter(selectors.iter())
            .map(|selector| self.scan_selector(driver, selector))
            .buffered(self.config.fallback_concurrency.max(1))
            .collect()
            .await;

        let mut merged = Vec::new();
        let mut last_err = None;
        let mut failures = 0;
        for (selector, result) in selectors.iter().zip(results) {
            match result {
                Ok(found) => merged.extend(found),
                Err(err) => {
                    debug!(selector = %selector.selector, %err, "fallback selector failed");
                    failures += 1;
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) if failures == selectors.len() => Err(err),
            _ => Ok(merged),
        }
    }

    async fn scan_selector(
        &self,
        driver: &dyn BrowserDriver,
        selector: &FallbackSelector,
    ) -> Result<Vec<Candidate>, AdapterError> {
        let handles = driver.query_selector_all(&selector.selector).await?;
        let mut found = Vec::new();
        for handle in handles.into_iter().take(self.config.max_per_selector) {
            match self.describe(driver, handle, &selector.role).await {
                Ok(Some(candidate)) => found.push(candidate),
                Ok(None) => {}
                Err(err) => debug!(selector = %selector.selector, %err, "skipping element"),
            }
        }
        Ok(found)
    }

    async fn describe(
        &self,
        driver: &dyn BrowserDriver,
        handle: ElementHandle,
        role: &str,
    ) -> Result<Option<Candidate>, AdapterError> {
        let state = driver.element_state(&handle).await?;
        if !state.visible {
            return Ok(None);
        }
        let name = self.fallback_name(driver, &handle).await?;
        if name.is_empty() {
            return Ok(None);
        }
        let value = if VALUE_ROLES.contains(&role) {
            driver
                .get_attribute(&handle, "value")
                .await?
                .map(|v| normalize(&v, self.config.name_max_len))
                .filter(|v| !v.is_empty())
        } else {
            None
        };
        Ok(Some(Candidate {
            role: role.to_string(),
            name,
            value,
            description: None,
            focused: false,
            disabled: !state.enabled,
            handle: Some(handle),
        }))
    }

    /// aria-label, placeholder, title, alt, visible text, value attribute.
    async fn fallback_name(
        &self,
        driver: &dyn BrowserDriver,
        handle: &ElementHandle,
    ) -> Result<String, AdapterError> {
        let limit = self.config.name_max_len;
        for attribute in NAME_ATTRIBUTES {
            if let Some(raw) = driver.get_attribute(handle, attribute).await? {
                let name = normalize(&raw, limit);
                if !name.is_empty() {
                    return Ok(name);
                }
            }
        }
        let text = normalize(&driver.inner_text(handle).await?, limit);
        if !text.is_empty() {
            return Ok(text);
        }
        Ok(driver
            .get_attribute(handle, "value")
            .await?
            .map(|v| normalize(&v, limit))
            .unwrap_or_default())
    }

    async fn apply_container_filter(
        &self,
        driver: &dyn BrowserDriver,
        candidates: Vec<Candidate>,
    ) -> Vec<Candidate> {
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let handle = match &candidate.handle {
                Some(handle) => Some(handle.clone()),
                None => locate(driver, &candidate).await,
            };
            let Some(handle) = handle else {
                debug!(role = %candidate.role, name = %candidate.name,
                    "container filter could not locate element; keeping it");
                kept.push(candidate);
                continue;
            };
            match self.passes_filter(driver, &handle).await {
                Ok(true) => kept.push(candidate),
                Ok(false) => {}
                Err(err) => {
                    debug!(%err, name = %candidate.name, "containment check failed; keeping element");
                    kept.push(candidate);
                }
            }
        }
        kept
    }

    async fn passes_filter(
        &self,
        driver: &dyn BrowserDriver,
        handle: &ElementHandle,
    ) -> Result<bool, AdapterError> {
        if let Some(include) = &self.config.include_within {
            if !driver.is_within(handle, include).await? {
                return Ok(false);
            }
        }
        if let Some(exclude) = &self.config.exclude_within {
            if driver.is_within(handle, exclude).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn assemble(
        &self,
        candidates: Vec<Candidate>,
        url: String,
        title: String,
        generation: Generation,
        source: CatalogSource,
        raw_tree: Option<AxNode>,
    ) -> BuiltCatalog {
        let truncated = candidates.len().saturating_sub(self.config.max_elements);
        let mut allocator = RefAllocator::new();
        let mut refs = RefTable::new(generation);
        let mut elements = Vec::with_capacity(candidates.len() - truncated);

        for candidate in candidates.into_iter().take(self.config.max_elements) {
            let element_ref = allocator.next_ref();
            refs.insert(
                element_ref.clone(),
                RefResolutionEntry {
                    role: candidate.role.clone(),
                    name: candidate.name.clone(),
                    handle: candidate.handle,
                },
            );
            elements.push(ElementDescriptor {
                element_ref,
                role: candidate.role,
                name: candidate.name,
                value: candidate.value,
                description: candidate.description,
                focused: candidate.focused,
                disabled: candidate.disabled,
            });
        }

        BuiltCatalog {
            catalog: Catalog {
                generation,
                url,
                title,
                elements,
                source,
                truncated,
                raw_tree,
            },
            refs,
        }
    }
}

async fn locate(driver: &dyn BrowserDriver, candidate: &Candidate) -> Option<ElementHandle> {
    let found = if candidate.role == "text" {
        driver.query_by_text(&candidate.name).await
    } else {
        driver
            .query_by_role(&candidate.role, &candidate.name, true)
            .await
    };
    found.ok()?.into_iter().next()
}

/// Appends fallback rows. A row is dropped when its name (case-insensitive) is already an
/// accessibility row, or when it is the same node as an earlier fallback row matched by
/// another selector. Distinct controls sharing a label all keep their own row.
async fn merge_fallback(
    driver: &dyn BrowserDriver,
    existing: &mut Vec<Candidate>,
    extra: Vec<Candidate>,
) -> usize {
    let ax_names: HashSet<String> = existing
        .iter()
        .filter(|c| !c.name.is_empty())
        .map(|c| c.name.to_lowercase())
        .collect();
    let mut merged: Vec<Candidate> = Vec::new();
    for candidate in extra {
        if ax_names.contains(&candidate.name.to_lowercase()) {
            continue;
        }
        if is_merged_node(driver, &merged, &candidate).await {
            continue;
        }
        merged.push(candidate);
    }
    let added = merged.len();
    existing.extend(merged);
    added
}

async fn is_merged_node(
    driver: &dyn BrowserDriver,
    merged: &[Candidate],
    candidate: &Candidate,
) -> bool {
    let Some(handle) = &candidate.handle else {
        return false;
    };
    let same_name = merged
        .iter()
        .filter(|other| other.name.to_lowercase() == candidate.name.to_lowercase());
    for other in same_name {
        let Some(other_handle) = &other.handle else {
            continue;
        };
        match driver.same_node(other_handle, handle).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => debug!(%err, "could not compare element handles"),
        }
    }
    false
}

/// Collapses whitespace and cuts to `limit` characters.
pub fn normalize(raw: &str, limit: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= limit {
        return collapsed;
    }
    collapsed
        .chars()
        .take(limit)
        .collect::<String>()
        .trim_end()
        .to_string()
}
