use crate::ProviderType;

/// Static registry of model ids each provider type is known to serve.
///
/// Consulted by fallback selection (a fallback type must claim the requested
/// model) and by quota reporting (models absent from the upstream quota reply
/// are filled in from here).
pub fn known_models(provider_type: ProviderType) -> &'static [&'static str] {
    match provider_type {
        ProviderType::OpenAiCustom | ProviderType::OpenAiResponsesCustom => &[
            "gpt-4o",
            "gpt-4o-mini",
            "gpt-4.1",
            "gpt-4.1-mini",
            "o3",
            "o4-mini",
        ],
        ProviderType::ClaudeCustom | ProviderType::ClaudeCodeCustom => &[
            "claude-3-5-haiku-20241022",
            "claude-3-5-sonnet",
            "claude-sonnet-4-20250514",
            "claude-opus-4-20250514",
        ],
        ProviderType::GeminiCliOauth | ProviderType::GeminiAntigravity => &[
            "gemini-2.0-flash",
            "gemini-2.5-flash",
            "gemini-2.5-flash-lite",
            "gemini-2.5-pro",
        ],
    }
}

/// Whether `provider_type` claims to serve `model`.
///
/// Prefix matching lets dated variants (`claude-3-5-sonnet-20241022`) and the
/// `anti-` continuation alias resolve against the registry.
pub fn provider_supports_model(provider_type: ProviderType, model: &str) -> bool {
    let model = model.strip_prefix("anti-").unwrap_or(model);
    known_models(provider_type)
        .iter()
        .any(|known| model == *known || model.starts_with(&format!("{known}-")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dated_variant_resolves_by_prefix() {
        assert!(provider_supports_model(
            ProviderType::ClaudeCodeCustom,
            "claude-3-5-sonnet-20241022"
        ));
        assert!(!provider_supports_model(
            ProviderType::OpenAiCustom,
            "claude-3-5-sonnet"
        ));
    }

    #[test]
    fn anti_alias_resolves_to_base_model() {
        assert!(provider_supports_model(
            ProviderType::GeminiCliOauth,
            "anti-gemini-2.5-flash"
        ));
    }
}
