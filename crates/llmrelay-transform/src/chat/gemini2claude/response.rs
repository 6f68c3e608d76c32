use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::types::ContentBlock;
use llmrelay_protocol::gemini::response::{
    Candidate, GenerateContentResponse, UsageMetadata,
};
use llmrelay_protocol::gemini::types::{Content, FunctionCall as GeminiFunctionCall, Part};
use llmrelay_protocol::claude::types::Usage as ClaudeUsage;

use crate::reason;

/// Convert a Claude message response into a Gemini generate-content response.
pub fn transform_response(response: MessageResponse) -> GenerateContentResponse {
    let mut parts = Vec::new();
    for block in &response.content {
        match block {
            ContentBlock::Text { text } => parts.push(Part::text(text.clone())),
            ContentBlock::Thinking {
                thinking,
                signature,
            } => parts.push(Part {
                text: Some(thinking.clone()),
                thought: Some(true),
                thought_signature: signature.clone(),
                ..Part::default()
            }),
            ContentBlock::ToolUse { id, name, input } => {
                parts.push(Part::function_call(GeminiFunctionCall {
                    id: Some(id.clone()),
                    name: name.clone(),
                    args: Some(input.clone()),
                }));
            }
            _ => {}
        }
    }

    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content::model(parts)),
            finish_reason: response.stop_reason.map(reason::claude_to_gemini),
            index: Some(0),
        }],
        usage_metadata: Some(map_usage(&response.usage)),
        model_version: Some(response.model.clone()),
        response_id: Some(response.id.clone()),
        ..GenerateContentResponse::default()
    }
}

pub fn map_usage(usage: &ClaudeUsage) -> UsageMetadata {
    let total = match (usage.input_tokens, usage.output_tokens) {
        (Some(input), Some(output)) => Some(input.saturating_add(output)),
        _ => None,
    };
    UsageMetadata {
        prompt_token_count: usage.input_tokens,
        candidates_token_count: usage.output_tokens,
        total_token_count: total,
        cached_content_token_count: usage.cache_read_input_tokens.filter(|count| *count > 0),
        thoughts_token_count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::claude::types::StopReason;
    use llmrelay_protocol::gemini::response::FinishReason as GeminiFinish;

    #[test]
    fn stop_reason_and_usage_are_mapped() {
        let mut response = MessageResponse::new("msg_1", "claude-3-5-sonnet");
        response.content = vec![ContentBlock::Text {
            text: "out".to_string(),
        }];
        response.stop_reason = Some(StopReason::MaxTokens);
        response.usage = ClaudeUsage {
            input_tokens: Some(4),
            output_tokens: Some(6),
            ..ClaudeUsage::default()
        };
        let out = transform_response(response);
        assert_eq!(
            out.candidates[0].finish_reason,
            Some(GeminiFinish::MaxTokens)
        );
        assert_eq!(
            out.usage_metadata.unwrap().total_token_count,
            Some(10)
        );
    }
}
