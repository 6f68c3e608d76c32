use std::collections::HashMap;

use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::types::{
    Content, FileData, FunctionCall as GeminiFunctionCall, FunctionCallingConfig,
    FunctionCallingMode, FunctionDeclaration, FunctionResponse, GenerationConfig, Part, Tool,
    ToolConfig,
};
use llmrelay_protocol::json::parse_loose;
use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::{
    ChatMessage, ContentPart, MessageContent, ToolChoice, ToolChoiceMode, ToolDefinition,
};

use crate::chat::support::parse_data_url;
use crate::limits::{
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, gemini_output_tokens, wants_text_modality,
};
use crate::schema::sanitize_gemini_schema;

/// Convert an OpenAI chat-completions request into a Gemini generate-content
/// request. Returns the request paired with the model id (Gemini addresses
/// the model in the URL path).
pub fn transform_request(request: ChatCompletionRequest) -> (String, GenerateContentRequest) {
    // tool_call_id -> function name, for resolving tool replies.
    let call_names: HashMap<String, String> = request
        .messages
        .iter()
        .filter_map(|message| match message {
            ChatMessage::Assistant {
                tool_calls: Some(calls),
                ..
            } => Some(calls.iter().map(|call| {
                (call.id.clone(), call.function.name.clone())
            })),
            _ => None,
        })
        .flatten()
        .collect();

    let mut system_texts = Vec::new();
    let mut contents = Vec::new();

    for message in &request.messages {
        match message {
            ChatMessage::System { content } | ChatMessage::Developer { content } => {
                system_texts.push(content.flatten());
            }
            ChatMessage::User { content } => {
                let parts = map_user_parts(content);
                if !parts.is_empty() {
                    contents.push(Content::user(parts));
                }
            }
            ChatMessage::Assistant {
                content,
                tool_calls,
                ..
            } => {
                let mut parts = Vec::new();
                if let Some(content) = content {
                    let text = content.flatten();
                    if !text.is_empty() {
                        parts.push(Part::text(text));
                    }
                }
                for call in tool_calls.as_deref().unwrap_or_default() {
                    parts.push(Part::function_call(GeminiFunctionCall {
                        id: Some(call.id.clone()),
                        name: call.function.name.clone(),
                        args: Some(parse_loose(&call.function.arguments)),
                    }));
                }
                if !parts.is_empty() {
                    contents.push(Content::model(parts));
                }
            }
            ChatMessage::Tool {
                content,
                tool_call_id,
            } => {
                let name = call_names
                    .get(tool_call_id)
                    .cloned()
                    .unwrap_or_else(|| tool_call_id.clone());
                contents.push(Content::user(vec![Part::function_response(
                    FunctionResponse {
                        id: Some(tool_call_id.clone()),
                        name,
                        response: serde_json::json!({ "result": content.flatten() }),
                    },
                )]));
            }
        }
    }

    let system_instruction = if system_texts.is_empty() {
        None
    } else {
        Some(Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(system_texts.join("\n"))],
        })
    };

    // A system-only conversation still needs one user turn on the wire.
    let (contents, system_instruction) = if contents.is_empty() {
        match system_instruction {
            Some(instruction) => (vec![instruction], None),
            None => (contents, None),
        }
    } else {
        (contents, system_instruction)
    };

    let tools = request.tools.as_deref().map(map_tools);
    let has_tools = tools.is_some();
    let tool_config = request.tool_choice.map(map_tool_choice);

    let mut generation_config = GenerationConfig {
        max_output_tokens: Some(gemini_output_tokens(
            request.max_completion_tokens.or(request.max_tokens),
        )),
        temperature: Some(request.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
        top_p: Some(request.top_p.unwrap_or(DEFAULT_TOP_P)),
        stop_sequences: request.stop.map(|stop| stop.into_vec()),
        response_modalities: None,
        thinking_config: None,
    };
    if wants_text_modality(&request.model, has_tools) {
        generation_config.response_modalities = Some(vec!["TEXT".to_string()]);
    }

    (
        request.model,
        GenerateContentRequest {
            contents,
            system_instruction,
            tools,
            tool_config,
            generation_config: Some(generation_config),
            safety_settings: None,
        },
    )
}

fn map_user_parts(content: &MessageContent) -> Vec<Part> {
    match content {
        MessageContent::Text(text) => {
            if text.is_empty() {
                Vec::new()
            } else {
                vec![Part::text(text.clone())]
            }
        }
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => (!text.is_empty()).then(|| Part::text(text.clone())),
                ContentPart::ImageUrl { image_url } => Some(map_image(&image_url.url)),
                ContentPart::InputAudio { .. } => None,
            })
            .collect(),
    }
}

fn map_image(url: &str) -> Part {
    if let Some((mime, data)) = parse_data_url(url) {
        Part::inline_data(mime, data)
    } else {
        Part {
            file_data: Some(FileData {
                mime_type: None,
                file_uri: url.to_string(),
            }),
            ..Part::default()
        }
    }
}

fn map_tools(tools: &[ToolDefinition]) -> Vec<Tool> {
    let declarations = tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            parameters: tool
                .function
                .parameters
                .as_ref()
                .map(sanitize_gemini_schema),
        })
        .collect();
    vec![Tool {
        function_declarations: Some(declarations),
    }]
}

fn map_tool_choice(choice: ToolChoice) -> ToolConfig {
    let config = match choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Auto),
            allowed_function_names: None,
        },
        ToolChoice::Mode(ToolChoiceMode::Required) => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Any),
            allowed_function_names: None,
        },
        ToolChoice::Mode(ToolChoiceMode::None) => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::None),
            allowed_function_names: None,
        },
        ToolChoice::Named(named) => FunctionCallingConfig {
            mode: Some(FunctionCallingMode::Any),
            allowed_function_names: Some(vec![named.function.name]),
        },
    };
    ToolConfig {
        function_calling_config: Some(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai::types::{
        FunctionCall, FunctionDefinition, ToolCall,
    };
    use serde_json::json;

    #[test]
    fn tool_reply_resolves_function_name() {
        let mut request = ChatCompletionRequest::new("gemini-2.5-flash");
        request.messages = vec![
            ChatMessage::Assistant {
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "call_9".to_string(),
                    r#type: "function".to_string(),
                    function: FunctionCall {
                        name: "lookup".to_string(),
                        arguments: "{}".to_string(),
                    },
                }]),
                reasoning_content: None,
            },
            ChatMessage::Tool {
                content: MessageContent::Text("found".to_string()),
                tool_call_id: "call_9".to_string(),
            },
        ];
        let (_, out) = transform_request(request);
        let reply = out.contents[1].parts[0].function_response.as_ref().unwrap();
        assert_eq!(reply.name, "lookup");
        assert_eq!(out.contents[0].role.as_deref(), Some("model"));
    }

    #[test]
    fn system_only_conversation_promotes_system_to_user() {
        let mut request = ChatCompletionRequest::new("gemini-2.5-flash");
        request.messages = vec![ChatMessage::System {
            content: MessageContent::Text("hello".to_string()),
        }];
        let (_, out) = transform_request(request);
        assert!(out.system_instruction.is_none());
        assert_eq!(out.contents.len(), 1);
        assert_eq!(out.contents[0].parts[0].text.as_deref(), Some("hello"));
    }

    #[test]
    fn modalities_omitted_when_tools_present() {
        let mut request = ChatCompletionRequest::new("gemini-2.5-flash");
        request.messages = vec![ChatMessage::User {
            content: MessageContent::Text("Q".to_string()),
        }];
        request.tools = Some(vec![ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: "f".to_string(),
                description: None,
                parameters: Some(json!({"type": "object", "extra": 1})),
            },
        }]);
        let (_, out) = transform_request(request.clone());
        let config = out.generation_config.unwrap();
        assert!(config.response_modalities.is_none());
        let declared = &out.tools.unwrap()[0];
        let params = declared.function_declarations.as_ref().unwrap()[0]
            .parameters
            .clone()
            .unwrap();
        assert_eq!(params, json!({"type": "object"}));

        request.tools = None;
        let (_, out) = transform_request(request);
        assert_eq!(
            out.generation_config.unwrap().response_modalities,
            Some(vec!["TEXT".to_string()])
        );
    }

    #[test]
    fn max_tokens_is_capped() {
        let mut request = ChatCompletionRequest::new("gemini-2.5-pro");
        request.messages = vec![ChatMessage::User {
            content: MessageContent::Text("Q".to_string()),
        }];
        request.max_tokens = Some(100_000);
        let (_, out) = transform_request(request);
        assert_eq!(
            out.generation_config.unwrap().max_output_tokens,
            Some(65_536)
        );
    }
}
