//! Page state formatting for planner consumption.
//!
//! Renders a catalog (or a diff against the previous one) as one line per element, bounded by an
//! estimated token budget. Elements that do not fit are counted in an explicit
//! `…and N more` marker.

use std::fmt::Write as _;

use perceiver_structural::{Catalog, ElementDescriptor, SnapshotDiff};

use super::config::AgentLoopConfig;

/// Rough token count: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

enum Line {
    Heading(String),
    Element(String),
}

/// Formats catalogs and diffs within a token budget.
#[derive(Debug, Clone)]
pub struct StateFormatter {
    token_budget: usize,
    max_text_chars: usize,
}

impl StateFormatter {
    pub fn new(config: &AgentLoopConfig) -> Self {
        Self {
            token_budget: config.token_budget,
            max_text_chars: config.max_text_chars,
        }
    }

    pub fn with_budget(token_budget: usize) -> Self {
        Self {
            token_budget,
            max_text_chars: AgentLoopConfig::default().max_text_chars,
        }
    }

    /// Full listing of every element.
    pub fn format_catalog(&self, catalog: &Catalog) -> String {
        let mut header = page_header(catalog);
        let _ = write!(header, "Interactive elements ({}", catalog.len());
        if catalog.truncated > 0 {
            let _ = write!(header, ", {} more dropped by the size cap", catalog.truncated);
        }
        header.push_str("):");

        if catalog.is_empty() {
            header.push_str("\n  (none)");
            return header;
        }
        let lines = catalog
            .elements
            .iter()
            .map(|element| Line::Element(self.describe(element)))
            .collect();
        self.render(header, lines)
    }

    /// Only what changed since the previous step; the catalog supplies page metadata.
    pub fn format_diff(&self, diff: &SnapshotDiff, catalog: &Catalog) -> String {
        let mut header = page_header(catalog);
        if diff.url_changed {
            header.push_str("(page URL changed)\n");
        }
        if diff.title_changed {
            header.push_str("(page title changed)\n");
        }
        if diff.change_count() == 0 {
            header.push_str("No changes since last step.");
            return header;
        }
        let _ = write!(
            header,
            "Changes since last step: {} added, {} removed, {} changed",
            diff.added.len(),
            diff.removed.len(),
            diff.changed.len()
        );

        let mut lines = Vec::with_capacity(diff.change_count() + 3);
        if !diff.added.is_empty() {
            lines.push(Line::Heading("Added:".into()));
            lines.extend(diff.added.iter().map(|e| Line::Element(self.describe(e))));
        }
        if !diff.removed.is_empty() {
            lines.push(Line::Heading("Removed:".into()));
            lines.extend(diff.removed.iter().map(|e| Line::Element(self.describe(e))));
        }
        if !diff.changed.is_empty() {
            lines.push(Line::Heading("Changed:".into()));
            lines.extend(diff.changed.iter().map(|change| {
                let mut line = self.describe(&change.current);
                let _ = write!(line, " (was: {})", self.attributes(&change.previous));
                Line::Element(line)
            }));
        }
        self.render(header, lines)
    }

    fn render(&self, header: String, lines: Vec<Line>) -> String {
        let total_elements = lines
            .iter()
            .filter(|line| matches!(line, Line::Element(_)))
            .count();
        let mut used = estimate_tokens(&header);
        let mut shown = 0usize;
        let mut out = header;

        for line in lines {
            let text = match &line {
                Line::Heading(text) => text.clone(),
                Line::Element(text) => format!("  {text}"),
            };
            let cost = estimate_tokens(&text) + 1;
            if used + cost > self.token_budget {
                break;
            }
            used += cost;
            out.push('\n');
            out.push_str(&text);
            if matches!(line, Line::Element(_)) {
                shown += 1;
            }
        }

        if shown < total_elements {
            let _ = write!(out, "\n  …and {} more", total_elements - shown);
        }
        out
    }

    fn describe(&self, element: &ElementDescriptor) -> String {
        format!(
            "[{}] {} {}",
            element.element_ref,
            element.role,
            self.attributes(element)
        )
    }

    fn attributes(&self, element: &ElementDescriptor) -> String {
        let mut text = format!("\"{}\"", clip(&element.name, self.max_text_chars));
        if let Some(value) = element.value.as_deref().filter(|v| !v.is_empty()) {
            let _ = write!(text, " value=\"{}\"", clip(value, self.max_text_chars));
        }
        if element.focused {
            text.push_str(" focused");
        }
        if element.disabled {
            text.push_str(" disabled");
        }
        text
    }
}

fn page_header(catalog: &Catalog) -> String {
    format!("URL: {}\nTitle: {}\n", catalog.url, catalog.title)
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars).collect();
    clipped.push('…');
    clipped
}
