use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::types::{ContentBlock, Usage as ClaudeUsage};
use llmrelay_protocol::gemini::response::{GenerateContentResponse, UsageMetadata};

use crate::ids;
use crate::reason;

/// Convert a Gemini generate-content response into a Claude message response.
pub fn transform_response(model: &str, response: GenerateContentResponse) -> MessageResponse {
    let mut out = MessageResponse::new(
        response
            .response_id
            .clone()
            .map(|id| format!("msg_{id}"))
            .unwrap_or_else(ids::message_id),
        model,
    );

    if let Some(candidate) = response.candidates.first() {
        if let Some(content) = &candidate.content {
            for part in &content.parts {
                if let Some(text) = &part.text {
                    if part.thought == Some(true) {
                        out.content.push(ContentBlock::Thinking {
                            thinking: text.clone(),
                            signature: part.thought_signature.clone(),
                        });
                    } else if !text.is_empty() {
                        out.content.push(ContentBlock::Text { text: text.clone() });
                    }
                }
                if let Some(call) = &part.function_call {
                    out.content.push(ContentBlock::ToolUse {
                        id: call.id.clone().unwrap_or_else(ids::tool_use_id),
                        name: call.name.clone(),
                        input: call.args.clone().unwrap_or_else(|| serde_json::json!({})),
                    });
                }
            }
        }
        let has_tool_use = out
            .content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }));
        out.stop_reason = candidate.finish_reason.map(reason::gemini_to_claude);
        if has_tool_use
            && out.stop_reason == Some(llmrelay_protocol::claude::types::StopReason::EndTurn)
        {
            out.stop_reason = Some(llmrelay_protocol::claude::types::StopReason::ToolUse);
        }
    }

    if let Some(usage) = &response.usage_metadata {
        out.usage = map_usage(usage);
    }
    out
}

pub fn map_usage(usage: &UsageMetadata) -> ClaudeUsage {
    ClaudeUsage {
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
        cache_creation_input_tokens: None,
        cache_read_input_tokens: usage.cached_content_token_count,
    }
}
