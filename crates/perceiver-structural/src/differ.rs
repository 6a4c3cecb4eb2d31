use std::collections::HashMap;
use std::time::Instant;

use refpilot_core_types::ElementRef;

use crate::metrics;
use crate::model::{Catalog, ChangedElement, ElementDescriptor, SnapshotDiff};

/// Ref-keyed delta from `previous` to `current`. With no previous catalog everything is added.
pub fn diff(current: &Catalog, previous: Option<&Catalog>) -> SnapshotDiff {
    let started = Instant::now();
    let Some(previous) = previous else {
        return SnapshotDiff {
            added: current.elements.clone(),
            removed: Vec::new(),
            changed: Vec::new(),
            url_changed: true,
            title_changed: true,
        };
    };

    let before = index_by_ref(previous);
    let after = index_by_ref(current);

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for element in &current.elements {
        match before.get(&element.element_ref) {
            None => added.push(element.clone()),
            Some(prior) if prior.differs_from(element) => changed.push(ChangedElement {
                previous: (*prior).clone(),
                current: element.clone(),
            }),
            Some(_) => {}
        }
    }
    let removed: Vec<ElementDescriptor> = previous
        .elements
        .iter()
        .filter(|element| !after.contains_key(&element.element_ref))
        .cloned()
        .collect();

    let diff = SnapshotDiff {
        added,
        removed,
        changed,
        url_changed: current.url != previous.url,
        title_changed: current.title != previous.title,
    };
    metrics::record_diff(started.elapsed());
    diff
}

fn index_by_ref(catalog: &Catalog) -> HashMap<&ElementRef, &ElementDescriptor> {
    catalog
        .elements
        .iter()
        .map(|element| (&element.element_ref, element))
        .collect()
}
