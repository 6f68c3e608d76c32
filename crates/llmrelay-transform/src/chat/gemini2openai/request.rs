use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::types::{Content, FunctionCallingMode, Tool};
use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::{
    ChatMessage, ContentPart, FunctionCall, FunctionDefinition, ImageUrl, MessageContent,
    StopSequences, ToolCall, ToolChoice, ToolChoiceMode, ToolDefinition,
};

use crate::chat::support::{args_to_string, data_url, json_to_text};
use crate::ids;

/// Convert a Gemini generate-content request into an OpenAI chat-completions
/// request.
pub fn transform_request(model: String, request: GenerateContentRequest) -> ChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(instruction) = &request.system_instruction {
        let text = flatten_text(instruction);
        if !text.is_empty() {
            messages.push(ChatMessage::System {
                content: MessageContent::Text(text),
            });
        }
    }

    for content in &request.contents {
        let is_model = content.role.as_deref() == Some("model");
        if is_model {
            messages.extend(map_model_turn(content));
        } else {
            messages.extend(map_user_turn(content));
        }
    }

    let mut out = ChatCompletionRequest::new(model);
    out.messages = messages;

    if let Some(config) = &request.generation_config {
        out.max_tokens = config.max_output_tokens;
        out.temperature = config.temperature;
        out.top_p = config.top_p;
        out.stop = config.stop_sequences.clone().map(|mut stops| {
            if stops.len() == 1 {
                StopSequences::Single(stops.remove(0))
            } else {
                StopSequences::Many(stops)
            }
        });
    }

    out.tools = request.tools.as_deref().map(map_tools).filter(|tools| !tools.is_empty());
    out.tool_choice = request
        .tool_config
        .as_ref()
        .and_then(|config| config.function_calling_config.as_ref())
        .and_then(|config| config.mode)
        .map(|mode| match mode {
            FunctionCallingMode::Auto => ToolChoice::Mode(ToolChoiceMode::Auto),
            FunctionCallingMode::Any => ToolChoice::Mode(ToolChoiceMode::Required),
            FunctionCallingMode::None => ToolChoice::Mode(ToolChoiceMode::None),
        });

    out
}

fn map_user_turn(content: &Content) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    let mut parts = Vec::new();

    for part in &content.parts {
        if let Some(text) = &part.text
            && !text.is_empty()
        {
            parts.push(ContentPart::Text { text: text.clone() });
        }
        if let Some(blob) = &part.inline_data {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: data_url(&blob.mime_type, &blob.data),
                    detail: None,
                },
            });
        }
        if let Some(file) = &part.file_data {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: file.file_uri.clone(),
                    detail: None,
                },
            });
        }
        if let Some(reply) = &part.function_response {
            out.push(ChatMessage::Tool {
                content: MessageContent::Text(json_to_text(&reply.response)),
                tool_call_id: reply.id.clone().unwrap_or_else(|| reply.name.clone()),
            });
        }
    }

    if !parts.is_empty() {
        let content = match parts.as_slice() {
            [ContentPart::Text { text }] => MessageContent::Text(text.clone()),
            _ => MessageContent::Parts(parts),
        };
        out.push(ChatMessage::User { content });
    }
    out
}

fn map_model_turn(content: &Content) -> Vec<ChatMessage> {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();

    for part in &content.parts {
        if let Some(t) = &part.text {
            if part.thought == Some(true) {
                reasoning.push_str(t);
            } else {
                text.push_str(t);
            }
        }
        if let Some(call) = &part.function_call {
            tool_calls.push(ToolCall {
                id: call.id.clone().unwrap_or_else(ids::call_id),
                r#type: "function".to_string(),
                function: FunctionCall {
                    name: call.name.clone(),
                    arguments: args_to_string(call.args.as_ref()),
                },
            });
        }
    }

    if text.is_empty() && reasoning.is_empty() && tool_calls.is_empty() {
        return Vec::new();
    }
    vec![ChatMessage::Assistant {
        content: (!text.is_empty()).then_some(MessageContent::Text(text)),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
    }]
}

fn flatten_text(content: &Content) -> String {
    content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

fn map_tools(tools: &[Tool]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .flat_map(|tool| tool.function_declarations.as_deref().unwrap_or_default())
        .map(|declaration| ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: declaration.name.clone(),
                description: declaration.description.clone(),
                parameters: declaration.parameters.clone(),
            },
        })
        .collect()
}
