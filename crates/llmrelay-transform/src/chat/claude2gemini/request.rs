use std::collections::HashMap;

use llmrelay_protocol::claude::request::MessagesRequest;
use llmrelay_protocol::claude::types::{
    ContentBlock, ImageSource, MessageParam, Role, ThinkingConfig,
    ToolChoice as ClaudeToolChoice, ToolResultContent,
};
use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::types::{
    Content, FunctionCall as GeminiFunctionCall, FunctionCallingConfig, FunctionCallingMode,
    FunctionDeclaration, FunctionResponse, GenerationConfig, Part, ThinkingGenerationConfig, Tool,
    ToolConfig,
};

use crate::limits::{gemini_output_tokens, wants_text_modality};
use crate::schema::sanitize_gemini_schema;

/// Convert a Claude messages request into a Gemini generate-content request
/// paired with the model id.
pub fn transform_request(request: MessagesRequest) -> (String, GenerateContentRequest) {
    // tool_use id -> name, for resolving tool_result blocks.
    let call_names: HashMap<String, String> = request
        .messages
        .iter()
        .flat_map(|message| message.content.clone().into_blocks())
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, .. } => Some((id, name)),
            _ => None,
        })
        .collect();

    let mut contents = Vec::new();
    for message in &request.messages {
        let parts = map_parts(message, &call_names);
        if parts.is_empty() {
            continue;
        }
        contents.push(match message.role {
            Role::User => Content::user(parts),
            Role::Assistant => Content::model(parts),
        });
    }

    let system_instruction = request.system.as_ref().map(|system| Content {
        role: Some("user".to_string()),
        parts: vec![Part::text(system.flatten())],
    });

    let tools = request.tools.as_ref().map(|tools| {
        vec![Tool {
            function_declarations: Some(
                tools
                    .iter()
                    .map(|tool| FunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: Some(sanitize_gemini_schema(&tool.input_schema)),
                    })
                    .collect(),
            ),
        }]
    });
    let has_tools = tools.is_some();

    let tool_config = request.tool_choice.map(|choice| {
        let config = match choice {
            ClaudeToolChoice::Auto => FunctionCallingConfig {
                mode: Some(FunctionCallingMode::Auto),
                allowed_function_names: None,
            },
            ClaudeToolChoice::Any => FunctionCallingConfig {
                mode: Some(FunctionCallingMode::Any),
                allowed_function_names: None,
            },
            ClaudeToolChoice::None => FunctionCallingConfig {
                mode: Some(FunctionCallingMode::None),
                allowed_function_names: None,
            },
            ClaudeToolChoice::Tool { name } => FunctionCallingConfig {
                mode: Some(FunctionCallingMode::Any),
                allowed_function_names: Some(vec![name]),
            },
        };
        ToolConfig {
            function_calling_config: Some(config),
        }
    });

    let thinking_config = match request.thinking {
        Some(ThinkingConfig::Enabled { budget_tokens }) => Some(ThinkingGenerationConfig {
            thinking_budget: Some(i64::from(budget_tokens)),
            include_thoughts: Some(true),
        }),
        _ => None,
    };

    let mut generation_config = GenerationConfig {
        max_output_tokens: Some(gemini_output_tokens(Some(request.max_tokens))),
        temperature: request.temperature,
        top_p: request.top_p,
        stop_sequences: request.stop_sequences,
        response_modalities: None,
        thinking_config,
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

fn map_parts(message: &MessageParam, call_names: &HashMap<String, String>) -> Vec<Part> {
    message
        .content
        .clone()
        .into_blocks()
        .into_iter()
        .filter_map(|block| map_block(block, call_names))
        .collect()
}

fn map_block(block: ContentBlock, call_names: &HashMap<String, String>) -> Option<Part> {
    match block {
        ContentBlock::Text { text } => (!text.is_empty()).then(|| Part::text(text)),
        ContentBlock::Thinking {
            thinking,
            signature,
        } => Some(Part {
            text: Some(thinking),
            thought: Some(true),
            thought_signature: signature,
            ..Part::default()
        }),
        ContentBlock::RedactedThinking { data } => Some(Part {
            text: Some(data),
            thought: Some(true),
            ..Part::default()
        }),
        ContentBlock::ToolUse { id, name, input } => {
            Some(Part::function_call(GeminiFunctionCall {
                id: Some(id),
                name,
                args: Some(input),
            }))
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error: _,
        } => {
            let name = call_names
                .get(&tool_use_id)
                .cloned()
                .unwrap_or_else(|| tool_use_id.clone());
            let body = match content {
                Some(ToolResultContent::Text(text)) => serde_json::json!({ "result": text }),
                Some(ToolResultContent::Blocks(blocks)) => {
                    let text: String = blocks
                        .into_iter()
                        .filter_map(|block| match block {
                            ContentBlock::Text { text } => Some(text),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    serde_json::json!({ "result": text })
                }
                None => serde_json::json!({}),
            };
            Some(Part::function_response(FunctionResponse {
                id: Some(tool_use_id),
                name,
                response: body,
            }))
        }
        ContentBlock::Image { source } => match source {
            ImageSource::Base64 { media_type, data } => Some(Part::inline_data(media_type, data)),
            ImageSource::Url { url } => Some(Part {
                file_data: Some(llmrelay_protocol::gemini::types::FileData {
                    mime_type: None,
                    file_uri: url,
                }),
                ..Part::default()
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::claude::types::{MessageContent as ClaudeContent, Tool as ClaudeTool};
    use serde_json::json;

    #[test]
    fn tool_round_trip_blocks_map_to_function_parts() {
        let mut request = MessagesRequest::new("gemini-2.5-pro", 1024);
        request.messages = vec![
            MessageParam {
                role: Role::Assistant,
                content: ClaudeContent::Blocks(vec![ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "f".to_string(),
                    input: json!({"x": 1}),
                }]),
            },
            MessageParam {
                role: Role::User,
                content: ClaudeContent::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: "toolu_1".to_string(),
                    content: Some(ToolResultContent::Text("ok".to_string())),
                    is_error: None,
                }]),
            },
        ];
        let (model, out) = transform_request(request);
        assert_eq!(model, "gemini-2.5-pro");
        assert!(out.contents[0].parts[0].function_call.is_some());
        let reply = out.contents[1].parts[0].function_response.as_ref().unwrap();
        assert_eq!(reply.name, "f");
    }

    #[test]
    fn thinking_budget_carries_into_thinking_config() {
        let mut request = MessagesRequest::new("gemini-2.5-flash", 70_000);
        request.messages = vec![MessageParam {
            role: Role::User,
            content: ClaudeContent::Text("Q".to_string()),
        }];
        request.thinking = Some(ThinkingConfig::Enabled { budget_tokens: 4096 });
        let (_, out) = transform_request(request);
        let config = out.generation_config.unwrap();
        assert_eq!(config.max_output_tokens, Some(65_536));
        assert_eq!(
            config.thinking_config.unwrap().thinking_budget,
            Some(4096)
        );
    }

    #[test]
    fn schemas_are_sanitized_for_declarations() {
        let mut request = MessagesRequest::new("gemini-2.5-flash", 100);
        request.messages = vec![MessageParam {
            role: Role::User,
            content: ClaudeContent::Text("Q".to_string()),
        }];
        request.tools = Some(vec![ClaudeTool {
            name: "f".to_string(),
            description: None,
            input_schema: json!({"type": "object", "$defs": {}}),
        }]);
        let (_, out) = transform_request(request);
        let params = out.tools.unwrap()[0].function_declarations.as_ref().unwrap()[0]
            .parameters
            .clone()
            .unwrap();
        assert_eq!(params, json!({"type": "object"}));
    }
}
