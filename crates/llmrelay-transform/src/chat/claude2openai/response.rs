use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::types::{ContentBlock, Usage as ClaudeUsage};
use llmrelay_protocol::json::parse_loose;
use llmrelay_protocol::openai::response::ChatCompletion;
use llmrelay_protocol::openai::types::Usage;

use crate::ids;
use crate::reason;

/// Convert an OpenAI chat completion into a Claude message response.
pub fn transform_response(response: ChatCompletion) -> MessageResponse {
    let mut out = MessageResponse::new(ids::message_id(), response.model.clone());

    if let Some(choice) = response.choices.into_iter().next() {
        if let Some(reasoning) = choice.message.reasoning_content
            && !reasoning.is_empty()
        {
            out.content.push(ContentBlock::Thinking {
                thinking: reasoning,
                signature: None,
            });
        }
        if let Some(text) = choice.message.content
            && !text.is_empty()
        {
            out.content.push(ContentBlock::Text { text });
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            out.content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input: parse_loose(&call.function.arguments),
            });
        }
        out.stop_reason = choice.finish_reason.map(reason::openai_to_claude);
    }

    if let Some(usage) = response.usage {
        out.usage = map_usage(&usage);
    }
    out
}

pub fn map_usage(usage: &Usage) -> ClaudeUsage {
    ClaudeUsage {
        input_tokens: Some(usage.prompt_tokens),
        output_tokens: Some(usage.completion_tokens),
        cache_creation_input_tokens: None,
        cache_read_input_tokens: usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|details| details.cached_tokens),
    }
}
