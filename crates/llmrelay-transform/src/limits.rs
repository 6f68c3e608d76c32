use llmrelay_protocol::openai::types::ReasoningEffort;

/// Hard ceiling Gemini accepts for `maxOutputTokens`.
pub const GEMINI_MAX_OUTPUT_TOKENS: u32 = 65_536;

/// Defaults applied when the caller omitted a token budget.
pub const CLAUDE_DEFAULT_MAX_TOKENS: u32 = 200_000;
pub const OPENAI_DEFAULT_MAX_TOKENS: u32 = 128_000;
pub const GEMINI_DEFAULT_MAX_TOKENS: u32 = 65_534;

pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_TOP_P: f64 = 0.95;

/// Clamp a requested Gemini output budget, falling back to the default.
pub fn gemini_output_tokens(requested: Option<u32>) -> u32 {
    match requested {
        Some(value) if value > GEMINI_MAX_OUTPUT_TOKENS => GEMINI_MAX_OUTPUT_TOKENS,
        Some(value) => value,
        None => GEMINI_DEFAULT_MAX_TOKENS,
    }
}

/// Thinking budget to OpenAI reasoning effort: ≤50 low, ≤200 medium,
/// above that high.
pub fn effort_for_thinking_budget(budget_tokens: u32) -> ReasoningEffort {
    if budget_tokens <= 50 {
        ReasoningEffort::Low
    } else if budget_tokens <= 200 {
        ReasoningEffort::Medium
    } else {
        ReasoningEffort::High
    }
}

/// Inverse direction: a nominal budget for each effort tier.
pub fn thinking_budget_for_effort(effort: ReasoningEffort) -> u32 {
    match effort {
        ReasoningEffort::Minimal | ReasoningEffort::Low => 50,
        ReasoningEffort::Medium => 200,
        ReasoningEffort::High => 1024,
    }
}

/// Whether `responseModalities: ["TEXT"]` should be injected for this model.
/// Applies to Gemini 2.x and thinking-tuned models, and only when the request
/// carries no tools; with tools present the field must be omitted.
pub fn wants_text_modality(model: &str, has_tools: bool) -> bool {
    if has_tools {
        return false;
    }
    model.contains("gemini-2") || model.contains("thinking")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_cap_is_exact() {
        assert_eq!(gemini_output_tokens(Some(65_537)), 65_536);
        assert_eq!(gemini_output_tokens(Some(1_000_000)), 65_536);
        assert_eq!(gemini_output_tokens(Some(65_536)), 65_536);
        assert_eq!(gemini_output_tokens(Some(256)), 256);
        assert_eq!(gemini_output_tokens(None), 65_534);
    }

    #[test]
    fn effort_thresholds() {
        assert_eq!(effort_for_thinking_budget(50), ReasoningEffort::Low);
        assert_eq!(effort_for_thinking_budget(51), ReasoningEffort::Medium);
        assert_eq!(effort_for_thinking_budget(150), ReasoningEffort::Medium);
        assert_eq!(effort_for_thinking_budget(200), ReasoningEffort::Medium);
        assert_eq!(effort_for_thinking_budget(201), ReasoningEffort::High);
    }

    #[test]
    fn text_modality_rule() {
        assert!(wants_text_modality("gemini-2.5-flash", false));
        assert!(!wants_text_modality("gemini-2.5-flash", true));
        assert!(wants_text_modality("gemini-2.0-flash-thinking-exp", false));
        assert!(!wants_text_modality("gemini-1.5-pro", false));
    }
}
