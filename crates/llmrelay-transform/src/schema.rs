use serde_json::{Map, Value as JsonValue};

const ALLOWED_KEYS: [&str; 6] = [
    "type",
    "description",
    "properties",
    "required",
    "enum",
    "items",
];

/// Reduce a JSON schema to the subset Gemini's function declarations accept.
///
/// The filter recurses through `properties` values and `items`; everything
/// else (`additionalProperties`, `format`, `$schema`, …) is dropped.
/// Sanitizing an already-sanitized schema is a no-op.
pub fn sanitize_gemini_schema(schema: &JsonValue) -> JsonValue {
    match schema {
        JsonValue::Object(map) => {
            let mut out = Map::new();
            for key in ALLOWED_KEYS {
                let Some(value) = map.get(key) else {
                    continue;
                };
                let value = match key {
                    "properties" => sanitize_properties(value),
                    "items" => sanitize_gemini_schema(value),
                    _ => value.clone(),
                };
                out.insert(key.to_string(), value);
            }
            JsonValue::Object(out)
        }
        other => other.clone(),
    }
}

fn sanitize_properties(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut out = Map::new();
            for (name, prop) in map {
                out.insert(name.clone(), sanitize_gemini_schema(prop));
            }
            JsonValue::Object(out)
        }
        other => other.clone(),
    }
}
