use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::ChatMessage;
use llmrelay_protocol::openai_responses::request::{
    InputContent, InputItem, InputPart, ResponseInput, ResponsesRequest,
};

/// Convert an OpenAI chat-completions request into a Responses request.
pub fn transform_request(request: ChatCompletionRequest) -> ResponsesRequest {
    let mut instructions = Vec::new();
    let mut items = Vec::new();

    for message in &request.messages {
        match message {
            ChatMessage::System { content } | ChatMessage::Developer { content } => {
                instructions.push(content.flatten());
            }
            ChatMessage::User { content } => items.push(InputItem {
                role: "user".to_string(),
                content: InputContent::Parts(vec![InputPart::InputText {
                    text: content.flatten(),
                }]),
            }),
            ChatMessage::Assistant { content, .. } => {
                let text = content.as_ref().map(|c| c.flatten()).unwrap_or_default();
                if !text.is_empty() {
                    items.push(InputItem {
                        role: "assistant".to_string(),
                        content: InputContent::Parts(vec![InputPart::OutputText { text }]),
                    });
                }
            }
            ChatMessage::Tool {
                content,
                tool_call_id,
            } => items.push(InputItem {
                role: "user".to_string(),
                content: InputContent::Parts(vec![InputPart::InputText {
                    text: format!("[tool {tool_call_id}] {}", content.flatten()),
                }]),
            }),
        }
    }

    // A lone user turn collapses to the single-string form.
    let input = match items.as_slice() {
        [InputItem { role, content }] if role == "user" => {
            ResponseInput::Text(content.flatten())
        }
        _ => ResponseInput::Items(items),
    };

    let mut out = ResponsesRequest::new(request.model, input);
    out.instructions = (!instructions.is_empty()).then(|| instructions.join("\n"));
    out.max_output_tokens = request.max_completion_tokens.or(request.max_tokens);
    out.temperature = request.temperature;
    out.top_p = request.top_p;
    out.stream = request.stream;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai::types::MessageContent;

    #[test]
    fn single_user_turn_collapses_to_string_input() {
        let mut request = ChatCompletionRequest::new("gpt-4o");
        request.messages = vec![
            ChatMessage::System {
                content: MessageContent::Text("sys".to_string()),
            },
            ChatMessage::User {
                content: MessageContent::Text("hello".to_string()),
            },
        ];
        request.max_tokens = Some(64);
        let out = transform_request(request);
        assert_eq!(out.instructions.as_deref(), Some("sys"));
        assert_eq!(out.input, ResponseInput::Text("hello".to_string()));
        assert_eq!(out.max_output_tokens, Some(64));
    }

    #[test]
    fn multi_turn_keeps_structured_items() {
        let mut request = ChatCompletionRequest::new("gpt-4o");
        request.messages = vec![
            ChatMessage::User {
                content: MessageContent::Text("a".to_string()),
            },
            ChatMessage::Assistant {
                content: Some(MessageContent::Text("b".to_string())),
                tool_calls: None,
                reasoning_content: None,
            },
            ChatMessage::User {
                content: MessageContent::Text("c".to_string()),
            },
        ];
        let out = transform_request(request);
        let ResponseInput::Items(items) = out.input else {
            panic!("expected structured input");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].role, "assistant");
    }
}
