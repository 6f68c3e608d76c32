use serde_json::Value as JsonValue;

/// Split a `data:` URI into (mime type, base64 payload).
pub fn parse_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let (mime, encoding) = meta.split_once(';')?;
    if encoding != "base64" {
        return None;
    }
    Some((mime.to_string(), data.to_string()))
}

pub fn data_url(mime: &str, base64_data: &str) -> String {
    format!("data:{mime};base64,{base64_data}")
}

/// Serialize tool-call arguments to the string form OpenAI expects.
pub fn args_to_string(args: Option<&JsonValue>) -> String {
    match args {
        Some(value) => serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string()),
        None => "{}".to_string(),
    }
}

/// Stringify a tool-result payload for dialects that only accept text there.
pub fn json_to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_url_round_trip() {
        let url = data_url("image/png", "aGVsbG8=");
        let (mime, data) = parse_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data, "aGVsbG8=");
    }

    #[test]
    fn non_base64_data_url_is_rejected() {
        assert!(parse_data_url("data:text/plain;charset=utf8,hi").is_none());
        assert!(parse_data_url("https://example.com/x.png").is_none());
    }

    #[test]
    fn args_to_string_defaults_to_empty_object() {
        assert_eq!(args_to_string(None), "{}");
        assert_eq!(args_to_string(Some(&json!({"a": 1}))), "{\"a\":1}");
    }
}
