use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

const COLON_MASK: &str = "@colon@";

static OPENS_STRUCTURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\[{]").expect("valid structure start regex"));
static QUOTED_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#":\s*"([^"]*)""#).expect("valid quoted value regex"));
static BARE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9A-Z_]+):").expect("valid bare key regex"));
static UNDEFINED_MEMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([a-z0-9A-Z_]+)":\s*undefined,?"#).expect("valid undefined member regex")
});
static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid trailing comma regex"));

/// Parses a JSON object or array, falling back to a textual rewrite of the
/// relaxed notation printed by JavaScript consoles (`{a: 'x', b: undefined}`).
///
/// The text is never evaluated. Anything that still fails after the rewrite
/// yields `None`.
pub fn parse_relaxed(text: &str) -> Option<Value> {
    if !OPENS_STRUCTURE_RE.is_match(text) {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let quoted = text.replace('\'', "\"");
    let masked = QUOTED_VALUE_RE.replace_all(&quoted, |caps: &Captures<'_>| {
        format!(": \"{}\"", caps[1].replace(':', COLON_MASK))
    });
    let keyed = BARE_KEY_RE.replace_all(&masked, "\"${1}\": ");
    let defined = UNDEFINED_MEMBER_RE.replace_all(&keyed, "");
    let tidy = TRAILING_COMMA_RE.replace_all(&defined, "${1}");
    let rewritten = tidy.replace(COLON_MASK, ":");

    serde_json::from_str(&rewritten).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_json_passes_through() {
        assert_eq!(parse_relaxed(r#" {"a": [1, 2]}"#), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn rejects_text_not_opening_a_structure() {
        assert_eq!(parse_relaxed("a: 1"), None);
        assert_eq!(parse_relaxed(""), None);
    }

    #[test]
    fn colons_inside_values_survive_key_quoting() {
        assert_eq!(
            parse_relaxed("{url: 'http://host:80/x', n: 1}"),
            Some(json!({"url": "http://host:80/x", "n": 1}))
        );
    }

    #[test]
    fn drops_undefined_members() {
        assert_eq!(
            parse_relaxed("{a: undefined, b: 2}"),
            Some(json!({"b": 2}))
        );
        assert_eq!(parse_relaxed("{b: 2, a: undefined}"), Some(json!({"b": 2})));
    }

    #[test]
    fn unbalanced_text_is_not_a_payload() {
        assert_eq!(parse_relaxed("{a: 1"), None);
    }
}
