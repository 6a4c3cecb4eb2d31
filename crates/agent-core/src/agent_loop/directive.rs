//! Planner reply parsing.
//!
//! A reply must carry exactly one JSON object naming one action:
//! `{"action": "click", "ref": "e3"}` or `{"action": "done", "success": true, "summary": "..."}`.
//! The object may sit inside a fenced block or surrounding prose, and may wrap the action as
//! `{"thinking": "...", "action": {...}}`. An optional `extract` object carries facts to keep.

use action_primitives::BrowserAction;
use serde_json::{Map, Value};

use crate::errors::AgentError;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveKind {
    Act(BrowserAction),
    Done { success: bool, summary: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub extracted: Map<String, Value>,
    pub thinking: Option<String>,
}

impl Directive {
    /// Compact JSON used in history lines.
    pub fn describe(&self) -> String {
        match &self.kind {
            DirectiveKind::Act(action) => {
                serde_json::to_string(action).unwrap_or_else(|_| action.name().to_string())
            }
            DirectiveKind::Done { success, .. } => {
                format!(r#"{{"action":"done","success":{success}}}"#)
            }
        }
    }
}

pub fn parse_directive(raw: &str) -> Result<Directive, AgentError> {
    if raw.trim().is_empty() {
        return Err(AgentError::directive("empty planner reply"));
    }
    let json = extract_json_object(raw)
        .ok_or_else(|| AgentError::directive("no JSON object in reply"))?;
    let value: Value = serde_json::from_str(&json)
        .map_err(|err| AgentError::directive(format!("invalid JSON: {err}")))?;
    let Value::Object(mut object) = value else {
        return Err(AgentError::directive("reply is not a JSON object"));
    };

    let thinking = object
        .remove("thinking")
        .and_then(|v| v.as_str().map(str::to_string));
    let mut extracted = take_object(&mut object, "extract");

    // {"thinking": ..., "action": {"action": "click", ...}}
    if let Some(Value::Object(inner)) = object.get("action").cloned() {
        object = inner;
        extracted.extend(take_object(&mut object, "extract"));
    }

    let name = object
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::directive("missing \"action\" field"))?
        .to_string();

    let kind = if name == "done" {
        let success = object.get("success").and_then(Value::as_bool).unwrap_or(true);
        let summary = ["summary", "text", "message"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        if let Some(Value::Object(data)) = object.remove("data") {
            extracted.extend(data);
        }
        DirectiveKind::Done { success, summary }
    } else {
        let action = serde_json::from_value::<BrowserAction>(Value::Object(object))
            .map_err(|err| AgentError::directive(format!("unsupported action '{name}': {err}")))?;
        DirectiveKind::Act(action)
    };

    Ok(Directive {
        kind,
        extracted,
        thinking,
    })
}

fn take_object(object: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match object.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// First JSON object in `raw`: a leading object, a fenced block, or the first balanced `{...}`
/// span. Text after the closing brace is ignored.
pub fn extract_json_object(raw: &str) -> Option<String> {
    if raw.trim_start().starts_with('{') {
        return balanced_object(raw);
    }

    let fence = "```";
    if let Some(start) = raw.find(fence) {
        let after_fence = &raw[start + fence.len()..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(end) = after_lang.find(fence) {
            let block = &after_lang[..end];
            if block.contains('{') {
                return balanced_object(block).or_else(|| Some(trim_symmetric(block)));
            }
        }
    }

    balanced_object(raw)
}

fn balanced_object(raw: &str) -> Option<String> {
    let open = raw.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in raw[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw[open..=open + idx].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn trim_symmetric(value: &str) -> String {
    value.trim().trim_matches('`').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_click() {
        let directive = parse_directive(r#"{"action": "click", "ref": "e3"}"#).unwrap();
        assert_eq!(
            directive.kind,
            DirectiveKind::Act(BrowserAction::Click {
                element_ref: "e3".parse().unwrap(),
                force: false,
                timeout: None,
            })
        );
        assert!(directive.extracted.is_empty());
    }

    #[test]
    fn parses_fenced_and_wrapped_replies() {
        let reply = "Sure.\n```json\n{\"thinking\": \"search first\", \"action\": {\"action\": \"type\", \"ref\": \"e1\", \"text\": \"rust\", \"submit\": true}}\n```";
        let directive = parse_directive(reply).unwrap();
        assert_eq!(directive.thinking.as_deref(), Some("search first"));
        assert!(matches!(
            directive.kind,
            DirectiveKind::Act(BrowserAction::Type { submit: true, .. })
        ));
    }

    #[test]
    fn done_collects_summary_and_data() {
        let directive = parse_directive(
            r#"I'm finished: {"action": "done", "summary": "price is $5 {approx}", "data": {"price": "$5"}, "extract": {"currency": "USD"}}"#,
        )
        .unwrap();
        assert_eq!(
            directive.kind,
            DirectiveKind::Done {
                success: true,
                summary: "price is $5 {approx}".into()
            }
        );
        assert_eq!(directive.extracted.get("price"), Some(&json!("$5")));
        assert_eq!(directive.extracted.get("currency"), Some(&json!("USD")));
    }

    #[test]
    fn rejects_unknown_empty_and_prose() {
        assert!(matches!(parse_directive("   "), Err(AgentError::Directive(_))));
        assert!(matches!(
            parse_directive("I would click the button"),
            Err(AgentError::Directive(_))
        ));
        let err = parse_directive(r#"{"action": "teleport", "to": "mars"}"#).unwrap_err();
        assert!(err.to_string().contains("teleport"));
        assert!(parse_directive(r#"{"ref": "e1"}"#).is_err());
    }

    #[test]
    fn leading_object_followed_by_prose() {
        let reply = "{\"action\":\"click\",\"ref\":\"e1\"}\nI clicked the search button.";
        let directive = parse_directive(reply).unwrap();
        assert_eq!(
            directive.kind,
            DirectiveKind::Act(BrowserAction::Click {
                element_ref: "e1".parse().unwrap(),
                force: false,
                timeout: None,
            })
        );
        assert_eq!(
            extract_json_object("{\"a\": 1} then {\"b\": 2}").as_deref(),
            Some("{\"a\": 1}")
        );
    }

    #[test]
    fn extracts_balanced_object() {
        let input = r#"text { "foo": "a}b", "n": {"x": 1} } more"#;
        assert_eq!(
            extract_json_object(input).as_deref(),
            Some(r#"{ "foo": "a}b", "n": {"x": 1} }"#)
        );
        assert!(extract_json_object("no braces").is_none());
    }
}
