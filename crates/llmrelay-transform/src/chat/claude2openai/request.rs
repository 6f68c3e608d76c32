use std::collections::HashSet;

use llmrelay_protocol::claude::request::MessagesRequest;
use llmrelay_protocol::claude::types::{
    ContentBlock, ImageSource, MessageParam, Role, ThinkingConfig, Tool,
    ToolChoice as ClaudeToolChoice, ToolResultContent,
};
use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::{
    ChatMessage, ContentPart, FunctionCall, FunctionDefinition, FunctionName, ImageUrl,
    MessageContent, NamedToolChoice, StopSequences, ToolCall, ToolChoice, ToolChoiceMode,
    ToolDefinition,
};

use crate::chat::support::{args_to_string, data_url};
use crate::limits::effort_for_thinking_budget;

/// Options threaded through from process configuration; the conversion
/// itself stays pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningOptions {
    /// Cap used when a thinking-enabled request carries no usable
    /// max_tokens of its own.
    pub reasoning_max_tokens: Option<u32>,
}

/// Convert a Claude messages request into an OpenAI chat-completions request.
pub fn transform_request(
    request: MessagesRequest,
    options: ReasoningOptions,
) -> ChatCompletionRequest {
    let resolved_ids = tool_result_ids(&request.messages);
    let mut messages = Vec::new();

    if let Some(system) = &request.system {
        messages.push(ChatMessage::System {
            content: MessageContent::Text(system.flatten()),
        });
    }

    for message in &request.messages {
        messages.extend(map_message(message, &resolved_ids));
    }

    let reasoning_effort = match &request.thinking {
        Some(ThinkingConfig::Enabled { budget_tokens }) => {
            Some(effort_for_thinking_budget(*budget_tokens))
        }
        _ => None,
    };
    let thinking_enabled = reasoning_effort.is_some();

    // Thinking-enabled requests budget completion tokens, not total tokens.
    let (max_tokens, max_completion_tokens) = if thinking_enabled {
        let budget = if request.max_tokens > 0 {
            Some(request.max_tokens)
        } else {
            options.reasoning_max_tokens
        };
        (None, budget)
    } else {
        (Some(request.max_tokens), None)
    };

    ChatCompletionRequest {
        model: request.model,
        messages,
        max_tokens,
        max_completion_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        stop: request.stop_sequences.map(map_stop),
        tools: request.tools.map(map_tools),
        tool_choice: request.tool_choice.map(map_tool_choice),
        response_format: None,
        stream: request.stream,
        stream_options: None,
        reasoning_effort,
        user: None,
    }
}

/// Ids of every tool_result in the conversation. Assistant tool_use blocks
/// without a matching entry are orphans and get stripped, keeping OpenAI's
/// tool_call/tool reference pairing intact.
fn tool_result_ids(messages: &[MessageParam]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for message in messages {
        for block in message.content.clone().into_blocks() {
            if let ContentBlock::ToolResult { tool_use_id, .. } = block {
                ids.insert(tool_use_id);
            }
        }
    }
    ids
}

fn map_message(message: &MessageParam, resolved_ids: &HashSet<String>) -> Vec<ChatMessage> {
    match message.role {
        Role::User => map_user_message(message),
        Role::Assistant => map_assistant_message(message, resolved_ids),
    }
}

fn map_user_message(message: &MessageParam) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    let mut parts = Vec::new();

    for block in message.content.clone().into_blocks() {
        match block {
            ContentBlock::Text { text } => parts.push(ContentPart::Text { text }),
            ContentBlock::Image { source } => parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: match source {
                        ImageSource::Base64 { media_type, data } => data_url(&media_type, &data),
                        ImageSource::Url { url } => url,
                    },
                    detail: None,
                },
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                // Tool results break out into dedicated role=tool messages.
                out.push(ChatMessage::Tool {
                    content: MessageContent::Text(flatten_tool_result(content)),
                    tool_call_id: tool_use_id,
                });
            }
            _ => {}
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

fn map_assistant_message(
    message: &MessageParam,
    resolved_ids: &HashSet<String>,
) -> Vec<ChatMessage> {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();

    for block in message.content.clone().into_blocks() {
        match block {
            ContentBlock::Text { text: t } => text.push_str(&t),
            ContentBlock::Thinking { thinking, .. } => reasoning.push_str(&thinking),
            ContentBlock::ToolUse { id, name, input } => {
                if !resolved_ids.contains(&id) {
                    continue;
                }
                tool_calls.push(ToolCall {
                    id,
                    r#type: "function".to_string(),
                    function: FunctionCall {
                        name,
                        arguments: args_to_string(Some(&input)),
                    },
                });
            }
            _ => {}
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

fn flatten_tool_result(content: Option<ToolResultContent>) -> String {
    match content {
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
    }
}

fn map_tools(tools: Vec<Tool>) -> Vec<ToolDefinition> {
    tools
        .into_iter()
        .map(|tool| ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: tool.name,
                description: tool.description,
                parameters: Some(tool.input_schema),
            },
        })
        .collect()
}

fn map_tool_choice(choice: ClaudeToolChoice) -> ToolChoice {
    match choice {
        ClaudeToolChoice::Auto => ToolChoice::Mode(ToolChoiceMode::Auto),
        ClaudeToolChoice::Any => ToolChoice::Mode(ToolChoiceMode::Required),
        ClaudeToolChoice::None => ToolChoice::Mode(ToolChoiceMode::None),
        ClaudeToolChoice::Tool { name } => ToolChoice::Named(NamedToolChoice {
            r#type: "function".to_string(),
            function: FunctionName { name },
        }),
    }
}

fn map_stop(sequences: Vec<String>) -> StopSequences {
    match sequences.len() {
        1 => StopSequences::Single(sequences.into_iter().next().unwrap_or_default()),
        _ => StopSequences::Many(sequences),
    }
}
