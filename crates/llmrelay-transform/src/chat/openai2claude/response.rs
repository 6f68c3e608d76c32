use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::types::{ContentBlock, Usage as ClaudeUsage};
use llmrelay_protocol::openai::response::{AssistantMessage, ChatChoice, ChatCompletion};
use llmrelay_protocol::openai::types::{FunctionCall, PromptTokensDetails, ToolCall, Usage};

use crate::chat::support::args_to_string;
use crate::ids;
use crate::reason;

/// Convert a Claude message response into an OpenAI chat completion.
pub fn transform_response(response: MessageResponse) -> ChatCompletion {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();

    for block in &response.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::Thinking { thinking, .. } => reasoning.push_str(thinking),
            ContentBlock::RedactedThinking { data } => reasoning.push_str(data),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                r#type: "function".to_string(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: args_to_string(Some(input)),
                },
            }),
            ContentBlock::Image { .. } | ContentBlock::ToolResult { .. } => {}
        }
    }

    let message = AssistantMessage {
        role: "assistant".to_string(),
        content: (!text.is_empty()).then_some(text),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
    };

    ChatCompletion {
        id: ids::chat_completion_id(),
        object: "chat.completion".to_string(),
        created: ids::unix_timestamp(),
        model: response.model.clone(),
        choices: vec![ChatChoice {
            index: 0,
            message,
            finish_reason: response.stop_reason.map(reason::claude_to_openai),
        }],
        usage: Some(map_usage(&response.usage)),
    }
}

pub fn map_usage(usage: &ClaudeUsage) -> Usage {
    let prompt = usage.input_tokens.unwrap_or(0);
    let completion = usage.output_tokens.unwrap_or(0);
    Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
        prompt_tokens_details: usage.cache_read_input_tokens.map(|cached| {
            PromptTokensDetails {
                cached_tokens: Some(cached),
            }
        }),
        completion_tokens_details: None,
    }
}
