use llmrelay_protocol::claude::request::MessagesRequest;
use llmrelay_protocol::claude::types::{
    ContentBlock, ImageSource, MessageContent as ClaudeContent, MessageParam, Role, SystemPrompt,
    ThinkingConfig, Tool as ClaudeTool, ToolChoice as ClaudeToolChoice, ToolResultContent,
};
use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::types::{Content, FunctionCallingMode, Part, Tool};

use crate::chat::support::json_to_text;
use crate::ids;
use crate::limits::CLAUDE_DEFAULT_MAX_TOKENS;

/// Convert a Gemini generate-content request into a Claude messages request.
pub fn transform_request(model: String, request: GenerateContentRequest) -> MessagesRequest {
    let mut out = MessagesRequest::new(model, CLAUDE_DEFAULT_MAX_TOKENS);

    out.system = request
        .system_instruction
        .as_ref()
        .map(|instruction| SystemPrompt::Text(flatten_text(instruction)))
        .filter(|system| !matches!(system, SystemPrompt::Text(text) if text.is_empty()));

    for content in &request.contents {
        let role = match content.role.as_deref() {
            Some("model") => Role::Assistant,
            _ => Role::User,
        };
        let blocks = map_parts(&content.parts);
        if blocks.is_empty() {
            continue;
        }
        out.messages.push(MessageParam {
            role,
            content: ClaudeContent::Blocks(blocks),
        });
    }

    if let Some(config) = request.generation_config {
        if let Some(max) = config.max_output_tokens {
            out.max_tokens = max;
        }
        out.temperature = config.temperature;
        out.top_p = config.top_p;
        out.stop_sequences = config.stop_sequences;
        out.thinking = config.thinking_config.and_then(|thinking| {
            thinking.thinking_budget.map(|budget| ThinkingConfig::Enabled {
                budget_tokens: budget.clamp(0, i64::from(u32::MAX)) as u32,
            })
        });
    }

    out.tools = request.tools.as_deref().map(map_tools).filter(|t| !t.is_empty());
    out.tool_choice = request
        .tool_config
        .and_then(|config| config.function_calling_config)
        .and_then(|config| {
            let mode = config.mode?;
            Some(match (mode, config.allowed_function_names) {
                (FunctionCallingMode::Any, Some(names)) if names.len() == 1 => {
                    ClaudeToolChoice::Tool {
                        name: names.into_iter().next().unwrap_or_default(),
                    }
                }
                (FunctionCallingMode::Any, _) => ClaudeToolChoice::Any,
                (FunctionCallingMode::Auto, _) => ClaudeToolChoice::Auto,
                (FunctionCallingMode::None, _) => ClaudeToolChoice::None,
            })
        });

    out
}

fn map_parts(parts: &[Part]) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    for part in parts {
        if let Some(text) = &part.text {
            if part.thought == Some(true) {
                blocks.push(ContentBlock::Thinking {
                    thinking: text.clone(),
                    signature: part.thought_signature.clone(),
                });
            } else if !text.is_empty() {
                blocks.push(ContentBlock::Text { text: text.clone() });
            }
        }
        if let Some(blob) = &part.inline_data {
            blocks.push(ContentBlock::Image {
                source: ImageSource::Base64 {
                    media_type: blob.mime_type.clone(),
                    data: blob.data.clone(),
                },
            });
        }
        if let Some(file) = &part.file_data {
            blocks.push(ContentBlock::Image {
                source: ImageSource::Url {
                    url: file.file_uri.clone(),
                },
            });
        }
        if let Some(call) = &part.function_call {
            blocks.push(ContentBlock::ToolUse {
                id: call.id.clone().unwrap_or_else(ids::tool_use_id),
                name: call.name.clone(),
                input: call.args.clone().unwrap_or_else(|| serde_json::json!({})),
            });
        }
        if let Some(reply) = &part.function_response {
            blocks.push(ContentBlock::ToolResult {
                tool_use_id: reply.id.clone().unwrap_or_else(|| reply.name.clone()),
                content: Some(ToolResultContent::Text(json_to_text(&reply.response))),
                is_error: None,
            });
        }
    }
    blocks
}

fn flatten_text(content: &Content) -> String {
    content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

fn map_tools(tools: &[Tool]) -> Vec<ClaudeTool> {
    tools
        .iter()
        .flat_map(|tool| tool.function_declarations.as_deref().unwrap_or_default())
        .map(|declaration| ClaudeTool {
            name: declaration.name.clone(),
            description: declaration.description.clone(),
            input_schema: declaration
                .parameters
                .clone()
                .unwrap_or_else(|| serde_json::json!({ "type": "object" })),
        })
        .collect()
}
