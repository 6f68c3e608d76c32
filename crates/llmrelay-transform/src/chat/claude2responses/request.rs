use llmrelay_protocol::claude::request::MessagesRequest;
use llmrelay_protocol::claude::types::{ContentBlock, Role, ToolResultContent};
use llmrelay_protocol::openai_responses::request::{
    InputContent, InputItem, InputPart, ResponseInput, ResponsesRequest,
};

/// Convert a Claude messages request into a Responses request. The Responses
/// surface is text-only here; tool traffic is flattened into text markers.
pub fn transform_request(request: MessagesRequest) -> ResponsesRequest {
    let mut items = Vec::new();

    for message in &request.messages {
        let mut texts = Vec::new();
        for block in message.content.clone().into_blocks() {
            match block {
                ContentBlock::Text { text } => texts.push(text),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => {
                    let body = match content {
                        Some(ToolResultContent::Text(text)) => text,
                        Some(ToolResultContent::Blocks(blocks)) => blocks
                            .into_iter()
                            .filter_map(|block| match block {
                                ContentBlock::Text { text } => Some(text),
                                _ => None,
                            })
                            .collect::<Vec<_>>()
                            .join("\n"),
                        None => String::new(),
                    };
                    texts.push(format!("[tool {tool_use_id}] {body}"));
                }
                _ => {}
            }
        }
        if texts.is_empty() {
            continue;
        }
        let text = texts.join("\n");
        let (role, part) = match message.role {
            Role::User => ("user", InputPart::InputText { text }),
            Role::Assistant => ("assistant", InputPart::OutputText { text }),
        };
        items.push(InputItem {
            role: role.to_string(),
            content: InputContent::Parts(vec![part]),
        });
    }

    let input = match items.as_slice() {
        [InputItem { role, content }] if role == "user" => ResponseInput::Text(content.flatten()),
        _ => ResponseInput::Items(items),
    };

    let mut out = ResponsesRequest::new(request.model, input);
    out.instructions = request.system.as_ref().map(|system| system.flatten());
    out.max_output_tokens = (request.max_tokens > 0).then_some(request.max_tokens);
    out.temperature = request.temperature;
    out.top_p = request.top_p;
    out.stream = request.stream;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::claude::types::{MessageContent as ClaudeContent, MessageParam, SystemPrompt};

    #[test]
    fn system_and_single_user_turn() {
        let mut request = MessagesRequest::new("gpt-4o", 256);
        request.system = Some(SystemPrompt::Text("sys".to_string()));
        request.messages = vec![MessageParam {
            role: Role::User,
            content: ClaudeContent::Text("hello".to_string()),
        }];
        let out = transform_request(request);
        assert_eq!(out.instructions.as_deref(), Some("sys"));
        assert_eq!(out.input, ResponseInput::Text("hello".to_string()));
        assert_eq!(out.max_output_tokens, Some(256));
    }
}
