//! Finish-reason tables between the four dialects.
//!
//! Unknown or unmapped values fall back to the target's plain stop value.

use llmrelay_protocol::claude::types::StopReason;
use llmrelay_protocol::gemini::response::FinishReason as GeminiFinishReason;
use llmrelay_protocol::openai::types::FinishReason as OpenAiFinishReason;

pub fn openai_to_claude(reason: OpenAiFinishReason) -> StopReason {
    match reason {
        OpenAiFinishReason::Stop => StopReason::EndTurn,
        OpenAiFinishReason::Length => StopReason::MaxTokens,
        OpenAiFinishReason::ContentFilter => StopReason::StopSequence,
        OpenAiFinishReason::ToolCalls => StopReason::ToolUse,
    }
}

pub fn claude_to_openai(reason: StopReason) -> OpenAiFinishReason {
    match reason {
        StopReason::EndTurn | StopReason::StopSequence => OpenAiFinishReason::Stop,
        StopReason::MaxTokens => OpenAiFinishReason::Length,
        StopReason::ToolUse => OpenAiFinishReason::ToolCalls,
        StopReason::Refusal => OpenAiFinishReason::ContentFilter,
    }
}

pub fn gemini_to_claude(reason: GeminiFinishReason) -> StopReason {
    match reason {
        GeminiFinishReason::MaxTokens => StopReason::MaxTokens,
        GeminiFinishReason::Safety | GeminiFinishReason::Recitation => StopReason::StopSequence,
        GeminiFinishReason::Stop
        | GeminiFinishReason::FinishReasonUnspecified
        | GeminiFinishReason::Other => StopReason::EndTurn,
    }
}

pub fn claude_to_gemini(reason: StopReason) -> GeminiFinishReason {
    match reason {
        StopReason::MaxTokens => GeminiFinishReason::MaxTokens,
        StopReason::Refusal => GeminiFinishReason::Safety,
        StopReason::EndTurn | StopReason::StopSequence | StopReason::ToolUse => {
            GeminiFinishReason::Stop
        }
    }
}

pub fn gemini_to_openai(reason: GeminiFinishReason) -> OpenAiFinishReason {
    match reason {
        GeminiFinishReason::MaxTokens => OpenAiFinishReason::Length,
        GeminiFinishReason::Safety | GeminiFinishReason::Recitation => {
            OpenAiFinishReason::ContentFilter
        }
        GeminiFinishReason::Stop
        | GeminiFinishReason::FinishReasonUnspecified
        | GeminiFinishReason::Other => OpenAiFinishReason::Stop,
    }
}

pub fn openai_to_gemini(reason: OpenAiFinishReason) -> GeminiFinishReason {
    match reason {
        OpenAiFinishReason::Length => GeminiFinishReason::MaxTokens,
        OpenAiFinishReason::ContentFilter => GeminiFinishReason::Safety,
        OpenAiFinishReason::Stop | OpenAiFinishReason::ToolCalls => GeminiFinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_table_matches() {
        assert_eq!(
            openai_to_claude(OpenAiFinishReason::ContentFilter),
            StopReason::StopSequence
        );
        assert_eq!(
            gemini_to_claude(GeminiFinishReason::Recitation),
            StopReason::StopSequence
        );
        assert_eq!(
            claude_to_openai(StopReason::ToolUse),
            OpenAiFinishReason::ToolCalls
        );
        assert_eq!(
            openai_to_gemini(OpenAiFinishReason::Length),
            GeminiFinishReason::MaxTokens
        );
    }

    #[test]
    fn unknown_values_default_to_plain_stop() {
        assert_eq!(
            gemini_to_claude(GeminiFinishReason::Other),
            StopReason::EndTurn
        );
        assert_eq!(
            gemini_to_openai(GeminiFinishReason::FinishReasonUnspecified),
            OpenAiFinishReason::Stop
        );
    }

    #[test]
    fn max_tokens_survives_a_round_trip() {
        let mapped = claude_to_openai(StopReason::MaxTokens);
        assert_eq!(openai_to_claude(mapped), StopReason::MaxTokens);
    }
}
