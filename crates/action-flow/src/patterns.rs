//! Error classification and argument fixes
//!
//! Failures are matched against an ordered pattern table; the first match wins and its fix
//! rewrites the arguments for the next attempt. Unclassified errors get the timeout fix.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::types::ActionArgs;

/// Timeout applied when the arguments carry none.
pub const DEFAULT_FIX_TIMEOUT_MS: u64 = 30_000;

/// What a fix did to the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFix {
    pub pattern: &'static str,
    pub description: String,
    /// Sleep an extra backoff period before the next attempt.
    pub extra_delay: bool,
}

type FixFn = fn(&mut ActionArgs) -> Option<(String, bool)>;

struct ErrorPattern {
    name: &'static str,
    regex: Regex,
    fix: FixFn,
}

static PATTERNS: Lazy<Vec<ErrorPattern>> = Lazy::new(|| {
    let table: [(&'static str, &str, FixFn); 7] = [
        ("timeout", r"(?i)timed?\s*out|deadline exceeded", fix_timeout),
        (
            "selector_not_found",
            r"(?i)not found|no such (?:element|node)|unable to locate|no element matches",
            fix_selector,
        ),
        (
            "not_visible",
            r"(?i)not visible|not interactable|obscured|intercept|outside (?:of )?the viewport",
            fix_force,
        ),
        (
            "navigation_failed",
            r"(?i)navigation failed|net::err_|name not resolved|could not resolve host",
            fix_www,
        ),
        (
            "invalid_url",
            r"(?i)invalid url|unsupported (?:protocol|scheme)|relative url|missing scheme",
            fix_scheme,
        ),
        (
            "connection",
            r"(?i)connection (?:refused|reset|closed|lost)|econn(?:reset|refused)|socket hang up|broken pipe|cdp i/o",
            fix_connection,
        ),
        (
            "rate_limit",
            r"(?i)rate[\s_-]?limit|too many requests|\b429\b",
            fix_rate_limit,
        ),
    ];
    table
        .into_iter()
        .map(|(name, pattern, fix)| ErrorPattern {
            name,
            regex: Regex::new(pattern).unwrap(),
            fix,
        })
        .collect()
});

/// Name of the first pattern matching `message`.
pub fn classify(message: &str) -> Option<&'static str> {
    PATTERNS
        .iter()
        .find(|p| p.regex.is_match(message))
        .map(|p| p.name)
}

/// Applies the fix for `message` to `args`.
///
/// Returns `None` when the matching pattern's fix has nothing to change; `args` is then left as
/// it was. Messages no pattern recognises get the generic timeout fix.
pub fn apply_fix(message: &str, args: &mut ActionArgs) -> Option<AppliedFix> {
    apply_fix_for(None, message, args)
}

/// Like [`apply_fix`], but a failure whose type already names its pattern skips the message
/// table. Element names inside the message then cannot pick the wrong fix.
pub fn apply_fix_for(
    kind: Option<&str>,
    message: &str,
    args: &mut ActionArgs,
) -> Option<AppliedFix> {
    let typed = kind.and_then(|name| PATTERNS.iter().find(|p| p.name == name));
    match typed.or_else(|| PATTERNS.iter().find(|p| p.regex.is_match(message))) {
        Some(pattern) => (pattern.fix)(args).map(|(description, extra_delay)| AppliedFix {
            pattern: pattern.name,
            description,
            extra_delay,
        }),
        None => fix_timeout(args).map(|(description, extra_delay)| AppliedFix {
            pattern: "generic",
            description,
            extra_delay,
        }),
    }
}

/// Adds a timeout when missing, doubles it otherwise.
pub fn fix_timeout(args: &mut ActionArgs) -> Option<(String, bool)> {
    let current = args.get("timeout").and_then(Value::as_u64);
    let next = match current {
        Some(ms) if ms > 0 => ms.saturating_mul(2),
        _ => DEFAULT_FIX_TIMEOUT_MS,
    };
    args.insert("timeout".into(), json!(next));
    let description = match current {
        Some(ms) if ms > 0 => format!("doubled timeout {ms}ms -> {next}ms"),
        _ => format!("set timeout to {next}ms"),
    };
    Some((description, false))
}

static POSITIONAL_QUALIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":(?:nth-child|nth-of-type|eq)\([^)]*\)").unwrap());

/// Relaxes a CSS `selector` argument by dropping positional qualifiers.
pub fn fix_selector(args: &mut ActionArgs) -> Option<(String, bool)> {
    let selector = args.get("selector").and_then(Value::as_str)?;
    let relaxed = POSITIONAL_QUALIFIER.replace_all(selector, "").trim().to_string();
    if relaxed == selector || relaxed.is_empty() {
        return None;
    }
    let description = format!("relaxed selector '{selector}' -> '{relaxed}'");
    args.insert("selector".into(), json!(relaxed));
    Some((description, false))
}

/// Bypasses actionability checks on the next attempt.
pub fn fix_force(args: &mut ActionArgs) -> Option<(String, bool)> {
    if args.get("force").and_then(Value::as_bool) == Some(true) {
        return None;
    }
    args.insert("force".into(), json!(true));
    Some(("set force=true".to_string(), false))
}

/// Adds or removes the `www.` host prefix.
pub fn fix_www(args: &mut ActionArgs) -> Option<(String, bool)> {
    let url = args.get("url").and_then(Value::as_str)?.trim().to_string();
    if url.is_empty() {
        return None;
    }
    let (scheme, rest) = match url.find("://") {
        Some(idx) => url.split_at(idx + 3),
        None => ("", url.as_str()),
    };
    let toggled = match rest.strip_prefix("www.") {
        Some(bare) => format!("{scheme}{bare}"),
        None => format!("{scheme}www.{rest}"),
    };
    let description = format!("toggled www prefix: {url} -> {toggled}");
    args.insert("url".into(), json!(toggled));
    Some((description, false))
}

/// Prefixes scheme-less URLs with `https://`.
pub fn fix_scheme(args: &mut ActionArgs) -> Option<(String, bool)> {
    let url = args.get("url").and_then(Value::as_str)?.trim().to_string();
    if url.is_empty() || url.contains("://") {
        return None;
    }
    let fixed = format!("https://{}", url.trim_start_matches('/'));
    let description = format!("added protocol: {url} -> {fixed}");
    args.insert("url".into(), json!(fixed));
    Some((description, false))
}

pub fn fix_connection(_args: &mut ActionArgs) -> Option<(String, bool)> {
    Some(("waiting for the connection to recover".to_string(), false))
}

pub fn fix_rate_limit(_args: &mut ActionArgs) -> Option<(String, bool)> {
    Some(("rate limited; extending backoff".to_string(), true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> ActionArgs {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn timeout_fix_adds_then_doubles() {
        let mut click = args(json!({"action": "click", "ref": "e1"}));
        let fix = apply_fix("timeout exceeded: click did not finish", &mut click).unwrap();
        assert_eq!(fix.pattern, "timeout");
        assert_eq!(click.get("timeout"), Some(&json!(30_000)));

        let mut slow = args(json!({"action": "click", "ref": "e1", "timeout": 5000}));
        apply_fix("Navigation timed out", &mut slow).unwrap();
        assert_eq!(slow.get("timeout"), Some(&json!(10_000)));
    }

    #[test]
    fn patterns_are_checked_in_order() {
        assert_eq!(classify("element not visible: covered"), Some("not_visible"));
        assert_eq!(classify("navigation timeout: slow page"), Some("timeout"));
        assert_eq!(classify("net::ERR_NAME_NOT_RESOLVED"), Some("navigation_failed"));
        assert_eq!(classify("Invalid URL: example"), Some("invalid_url"));
        assert_eq!(classify("connection reset by peer"), Some("connection"));
        assert_eq!(classify("HTTP 429 Too Many Requests"), Some("rate_limit"));
        assert_eq!(classify("something odd"), None);
    }

    #[test]
    fn unmatched_errors_get_the_generic_timeout_fix() {
        let mut a = args(json!({"action": "press", "key": "Enter"}));
        let fix = apply_fix("something odd", &mut a).unwrap();
        assert_eq!(fix.pattern, "generic");
        assert_eq!(a.get("timeout"), Some(&json!(30_000)));
    }

    #[test]
    fn inapplicable_fix_leaves_args_alone() {
        let mut a = args(json!({"action": "click", "ref": "e9"}));
        let before = a.clone();
        assert!(apply_fix("element e9 not found (no live match)", &mut a).is_none());
        assert_eq!(a, before);

        let mut forced = args(json!({"action": "click", "ref": "e2", "force": true}));
        assert!(apply_fix("element not visible: e2", &mut forced).is_none());
    }

    #[test]
    fn selector_and_url_fixes() {
        let mut a = args(json!({"selector": "ul > li:nth-child(3) a"}));
        apply_fix("no such element", &mut a).unwrap();
        assert_eq!(a.get("selector"), Some(&json!("ul > li a")));

        let mut nav = args(json!({"action": "navigate", "url": "https://example.com/a"}));
        apply_fix("navigation failed: net::ERR_NAME_NOT_RESOLVED", &mut nav).unwrap();
        assert_eq!(nav.get("url"), Some(&json!("https://www.example.com/a")));
        apply_fix("navigation failed", &mut nav).unwrap();
        assert_eq!(nav.get("url"), Some(&json!("https://example.com/a")));

        let mut bare = args(json!({"action": "navigate", "url": "example.com"}));
        apply_fix("invalid URL", &mut bare).unwrap();
        assert_eq!(bare.get("url"), Some(&json!("https://example.com")));
    }

    #[test]
    fn rate_limit_asks_for_extra_delay() {
        let mut a = args(json!({}));
        assert!(apply_fix("rate limit hit", &mut a).unwrap().extra_delay);
        assert!(a.is_empty());
    }
}
