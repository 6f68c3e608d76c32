use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::{ChatMessage, MessageContent};
use llmrelay_protocol::openai_responses::request::{ResponseInput, ResponsesRequest};

/// Convert a Responses request into an OpenAI chat-completions request.
pub fn transform_request(request: ResponsesRequest) -> ChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(instructions) = &request.instructions
        && !instructions.is_empty()
    {
        messages.push(ChatMessage::System {
            content: MessageContent::Text(instructions.clone()),
        });
    }

    match &request.input {
        ResponseInput::Text(text) => messages.push(ChatMessage::User {
            content: MessageContent::Text(text.clone()),
        }),
        ResponseInput::Items(items) => {
            for item in items {
                let text = item.content.flatten();
                match item.role.as_str() {
                    "assistant" => messages.push(ChatMessage::Assistant {
                        content: Some(MessageContent::Text(text)),
                        tool_calls: None,
                        reasoning_content: None,
                    }),
                    "system" | "developer" => messages.push(ChatMessage::System {
                        content: MessageContent::Text(text),
                    }),
                    _ => messages.push(ChatMessage::User {
                        content: MessageContent::Text(text),
                    }),
                }
            }
        }
    }

    let mut out = ChatCompletionRequest::new(request.model);
    out.messages = messages;
    out.max_tokens = request.max_output_tokens;
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
    fn instructions_become_system_message() {
        let mut request =
            ResponsesRequest::new("gpt-4o", ResponseInput::Text("hi".to_string()));
        request.instructions = Some("rules".to_string());
        request.max_output_tokens = Some(32);
        let out = transform_request(request);
        assert!(matches!(
            &out.messages[0],
            ChatMessage::System { content: MessageContent::Text(text) } if text == "rules"
        ));
        assert!(matches!(&out.messages[1], ChatMessage::User { .. }));
        assert_eq!(out.max_tokens, Some(32));
    }

    #[test]
    fn item_roles_are_respected() {
        let request = ResponsesRequest::new(
            "gpt-4o",
            ResponseInput::Items(vec![
                InputItem {
                    role: "user".to_string(),
                    content: InputContent::Text("q".to_string()),
                },
                InputItem {
                    role: "assistant".to_string(),
                    content: InputContent::Text("a".to_string()),
                },
            ]),
        );
        let out = transform_request(request);
        assert!(matches!(&out.messages[0], ChatMessage::User { .. }));
        assert!(matches!(&out.messages[1], ChatMessage::Assistant { .. }));
    }
}
