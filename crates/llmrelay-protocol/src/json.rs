use serde_json::Value as JsonValue;

/// Parse tool arguments accumulated from a delta stream.
///
/// Fragments are forwarded verbatim while streaming; only at block end is a
/// parse attempted. A fragment cut mid-escape gets its dangling tail trimmed
/// for a second attempt; a parse that still fails returns the original text
/// as a JSON string so no client-visible data is lost.
pub fn parse_loose(raw: &str) -> JsonValue {
    if let Ok(value) = serde_json::from_str(raw) {
        return value;
    }
    let trimmed = trim_dangling_escape(raw);
    if trimmed.len() != raw.len()
        && let Ok(value) = serde_json::from_str(trimmed)
    {
        return value;
    }
    JsonValue::String(raw.to_string())
}

/// Trim a dangling escape sequence from the tail of a streamed JSON fragment.
///
/// Providers may cut a chunk mid-escape; `\`, `\u`, `\u0` and `\u00` tails
/// would corrupt the next append when re-serialized, so they are dropped.
pub fn trim_dangling_escape(fragment: &str) -> &str {
    for tail in ["\\u00", "\\u0", "\\u", "\\"] {
        if let Some(stripped) = fragment.strip_suffix(tail) {
            // A preceding backslash means the tail is itself escaped; keep it.
            if !stripped.ends_with('\\') {
                return stripped;
            }
        }
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loose_parse_returns_value_on_valid_json() {
        assert_eq!(parse_loose("{\"x\":1}"), json!({"x": 1}));
        assert_eq!(parse_loose("[1,2]"), json!([1, 2]));
    }

    #[test]
    fn loose_parse_wraps_invalid_json_as_string() {
        assert_eq!(parse_loose("{\"x\":"), json!("{\"x\":"));
    }

    #[test]
    fn dangling_escapes_are_trimmed() {
        assert_eq!(trim_dangling_escape("abc\\"), "abc");
        assert_eq!(trim_dangling_escape("abc\\u"), "abc");
        assert_eq!(trim_dangling_escape("abc\\u0"), "abc");
        assert_eq!(trim_dangling_escape("abc\\u00"), "abc");
    }

    #[test]
    fn complete_escapes_are_kept() {
        assert_eq!(trim_dangling_escape("abc\\u0041"), "abc\\u0041");
        assert_eq!(trim_dangling_escape("abc\\\\"), "abc\\\\");
        assert_eq!(trim_dangling_escape("plain"), "plain");
    }
}
