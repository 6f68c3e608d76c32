use llmrelay_protocol::claude::request::MessagesRequest;
use llmrelay_protocol::claude::types::{
    MessageContent as ClaudeContent, MessageParam, Role, SystemPrompt,
};
use llmrelay_protocol::openai_responses::request::{ResponseInput, ResponsesRequest};

use crate::limits::CLAUDE_DEFAULT_MAX_TOKENS;

/// Convert a Responses request into a Claude messages request.
pub fn transform_request(request: ResponsesRequest) -> MessagesRequest {
    let mut out = MessagesRequest::new(
        request.model,
        request
            .max_output_tokens
            .unwrap_or(CLAUDE_DEFAULT_MAX_TOKENS),
    );

    out.system = request
        .instructions
        .filter(|instructions| !instructions.is_empty())
        .map(SystemPrompt::Text);

    match request.input {
        ResponseInput::Text(text) => out.messages.push(MessageParam {
            role: Role::User,
            content: ClaudeContent::Text(text),
        }),
        ResponseInput::Items(items) => {
            for item in items {
                let text = item.content.flatten();
                if text.is_empty() {
                    continue;
                }
                match item.role.as_str() {
                    "assistant" => out.messages.push(MessageParam {
                        role: Role::Assistant,
                        content: ClaudeContent::Text(text),
                    }),
                    // Responses has no separate system turn inside input;
                    // fold stray system items into the system prompt.
                    "system" | "developer" => {
                        let merged = match out.system.take() {
                            Some(system) => format!("{}\n{text}", system.flatten()),
                            None => text,
                        };
                        out.system = Some(SystemPrompt::Text(merged));
                    }
                    _ => out.messages.push(MessageParam {
                        role: Role::User,
                        content: ClaudeContent::Text(text),
                    }),
                }
            }
        }
    }

    out.temperature = request.temperature;
    out.top_p = request.top_p;
    out.stream = request.stream;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai_responses::request::{InputContent, InputItem};

    #[test]
    fn string_input_becomes_single_user_turn() {
        let mut request = ResponsesRequest::new(
            "claude-3-5-sonnet",
            ResponseInput::Text("hi".to_string()),
        );
        request.instructions = Some("sys".to_string());
        let out = transform_request(request);
        assert_eq!(out.system, Some(SystemPrompt::Text("sys".to_string())));
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.max_tokens, CLAUDE_DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn stray_system_items_fold_into_system_prompt() {
        let request = ResponsesRequest::new(
            "claude-3-5-sonnet",
            ResponseInput::Items(vec![
                InputItem {
                    role: "system".to_string(),
                    content: InputContent::Text("extra".to_string()),
                },
                InputItem {
                    role: "user".to_string(),
                    content: InputContent::Text("q".to_string()),
                },
            ]),
        );
        let out = transform_request(request);
        assert_eq!(out.system, Some(SystemPrompt::Text("extra".to_string())));
        assert_eq!(out.messages.len(), 1);
    }
}
