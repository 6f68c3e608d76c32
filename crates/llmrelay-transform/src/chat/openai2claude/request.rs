use llmrelay_protocol::claude::request::MessagesRequest;
use llmrelay_protocol::claude::types::{
    ContentBlock, ImageSource, MessageContent as ClaudeContent, MessageParam, Role, SystemPrompt,
    ThinkingConfig, Tool as ClaudeTool, ToolChoice as ClaudeToolChoice, ToolResultContent,
};
use llmrelay_protocol::json::parse_loose;
use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::{
    ChatMessage, ContentPart, MessageContent, ReasoningEffort, ToolCall, ToolChoice,
    ToolChoiceMode, ToolDefinition,
};

use crate::chat::support::parse_data_url;
use crate::limits::{CLAUDE_DEFAULT_MAX_TOKENS, thinking_budget_for_effort};

/// Convert an OpenAI chat-completions request into a Claude messages request.
pub fn transform_request(request: ChatCompletionRequest) -> MessagesRequest {
    let mut system_texts = Vec::new();
    let mut blocks: Vec<(Role, Vec<ContentBlock>)> = Vec::new();

    for message in &request.messages {
        match message {
            ChatMessage::System { content } | ChatMessage::Developer { content } => {
                system_texts.push(content.flatten());
            }
            ChatMessage::User { content } => {
                push_blocks(&mut blocks, Role::User, map_user_content(content));
            }
            ChatMessage::Assistant {
                content,
                tool_calls,
                reasoning_content,
            } => {
                push_blocks(
                    &mut blocks,
                    Role::Assistant,
                    map_assistant_content(content.as_ref(), tool_calls.as_deref(), reasoning_content.as_deref()),
                );
            }
            ChatMessage::Tool {
                content,
                tool_call_id,
            } => {
                // Tool results live in user turns on the Claude side.
                push_blocks(
                    &mut blocks,
                    Role::User,
                    vec![ContentBlock::ToolResult {
                        tool_use_id: tool_call_id.clone(),
                        content: Some(ToolResultContent::Text(content.flatten())),
                        is_error: None,
                    }],
                );
            }
        }
    }

    let messages = blocks
        .into_iter()
        .filter(|(_, blocks)| !blocks.is_empty())
        .map(|(role, blocks)| MessageParam {
            role,
            content: collapse(blocks),
        })
        .collect();

    let system = if system_texts.is_empty() {
        None
    } else {
        Some(SystemPrompt::Text(system_texts.join("\n")))
    };

    let max_tokens = request
        .max_completion_tokens
        .or(request.max_tokens)
        .unwrap_or(CLAUDE_DEFAULT_MAX_TOKENS);

    MessagesRequest {
        model: request.model,
        max_tokens,
        messages,
        system,
        tools: request.tools.map(map_tools),
        tool_choice: request.tool_choice.map(map_tool_choice),
        temperature: request.temperature,
        top_p: request.top_p,
        top_k: None,
        stop_sequences: request.stop.map(|stop| stop.into_vec()),
        stream: request.stream,
        thinking: request.reasoning_effort.map(map_reasoning_effort),
        metadata: None,
    }
}

/// Adjacent same-role messages merge into one block sequence.
fn push_blocks(acc: &mut Vec<(Role, Vec<ContentBlock>)>, role: Role, blocks: Vec<ContentBlock>) {
    if blocks.is_empty() {
        return;
    }
    if let Some((last_role, last_blocks)) = acc.last_mut()
        && *last_role == role
    {
        last_blocks.extend(blocks);
        return;
    }
    acc.push((role, blocks));
}

fn collapse(blocks: Vec<ContentBlock>) -> ClaudeContent {
    if blocks.len() == 1
        && let ContentBlock::Text { text } = &blocks[0]
    {
        return ClaudeContent::Text(text.clone());
    }
    ClaudeContent::Blocks(blocks)
}

fn map_user_content(content: &MessageContent) -> Vec<ContentBlock> {
    match content {
        MessageContent::Text(text) => text_block(text),
        MessageContent::Parts(parts) => parts
            .iter()
            .flat_map(|part| match part {
                ContentPart::Text { text } => text_block(text),
                ContentPart::ImageUrl { image_url } => vec![map_image(&image_url.url)],
                ContentPart::InputAudio { input_audio } => {
                    text_block(&format!("[input_audio:{input_audio}]"))
                }
            })
            .collect(),
    }
}

fn map_assistant_content(
    content: Option<&MessageContent>,
    tool_calls: Option<&[ToolCall]>,
    reasoning: Option<&str>,
) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    if let Some(reasoning) = reasoning
        && !reasoning.is_empty()
    {
        blocks.push(ContentBlock::Thinking {
            thinking: reasoning.to_string(),
            signature: None,
        });
    }
    if let Some(content) = content {
        blocks.extend(text_block(&content.flatten()));
    }
    for call in tool_calls.unwrap_or_default() {
        blocks.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.function.name.clone(),
            input: parse_loose(&call.function.arguments),
        });
    }
    blocks
}

fn text_block(text: &str) -> Vec<ContentBlock> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![ContentBlock::Text {
            text: text.to_string(),
        }]
    }
}

fn map_image(url: &str) -> ContentBlock {
    if let Some((media_type, data)) = parse_data_url(url) {
        ContentBlock::Image {
            source: ImageSource::Base64 { media_type, data },
        }
    } else {
        ContentBlock::Image {
            source: ImageSource::Url {
                url: url.to_string(),
            },
        }
    }
}

fn map_tools(tools: Vec<ToolDefinition>) -> Vec<ClaudeTool> {
    tools
        .into_iter()
        .map(|tool| ClaudeTool {
            name: tool.function.name,
            description: tool.function.description,
            input_schema: tool
                .function
                .parameters
                .unwrap_or_else(|| serde_json::json!({ "type": "object" })),
        })
        .collect()
}

fn map_tool_choice(choice: ToolChoice) -> ClaudeToolChoice {
    match choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => ClaudeToolChoice::Auto,
        ToolChoice::Mode(ToolChoiceMode::Required) => ClaudeToolChoice::Any,
        ToolChoice::Mode(ToolChoiceMode::None) => ClaudeToolChoice::None,
        ToolChoice::Named(named) => ClaudeToolChoice::Tool {
            name: named.function.name,
        },
    }
}

fn map_reasoning_effort(effort: ReasoningEffort) -> ThinkingConfig {
    ThinkingConfig::Enabled {
        budget_tokens: thinking_budget_for_effort(effort),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai::types::{FunctionDefinition, StopSequences};
    use serde_json::json;

    fn user(text: &str) -> ChatMessage {
        ChatMessage::User {
            content: MessageContent::Text(text.to_string()),
        }
    }

    #[test]
    fn tool_definition_and_required_choice() {
        let mut request = ChatCompletionRequest::new("gpt-4o");
        request.messages = vec![user("Q")];
        request.tools = Some(vec![ToolDefinition {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: "f".to_string(),
                description: Some("d".to_string()),
                parameters: Some(json!({
                    "type": "object",
                    "properties": { "x": { "type": "string" } }
                })),
            },
        }]);
        request.tool_choice = Some(ToolChoice::Mode(ToolChoiceMode::Required));

        let out = transform_request(request);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].content, ClaudeContent::Text("Q".to_string()));
        let tools = out.tools.unwrap();
        assert_eq!(tools[0].name, "f");
        assert_eq!(tools[0].description.as_deref(), Some("d"));
        assert_eq!(out.tool_choice, Some(ClaudeToolChoice::Any));
    }

    #[test]
    fn adjacent_same_role_messages_merge() {
        let mut request = ChatCompletionRequest::new("gpt-4o");
        request.messages = vec![user("one"), user("two")];
        let out = transform_request(request);
        assert_eq!(out.messages.len(), 1);
        match &out.messages[0].content {
            ClaudeContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            other => panic!("expected blocks, got {other:?}"),
        }
    }

    #[test]
    fn tool_message_becomes_user_tool_result() {
        let mut request = ChatCompletionRequest::new("gpt-4o");
        request.messages = vec![
            ChatMessage::Assistant {
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "call_1".to_string(),
                    r#type: "function".to_string(),
                    function: llmrelay_protocol::openai::types::FunctionCall {
                        name: "f".to_string(),
                        arguments: "{\"x\":1}".to_string(),
                    },
                }]),
                reasoning_content: None,
            },
            ChatMessage::Tool {
                content: MessageContent::Text("42".to_string()),
                tool_call_id: "call_1".to_string(),
            },
        ];
        let out = transform_request(request);
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].role, Role::Assistant);
        assert_eq!(out.messages[1].role, Role::User);
        match &out.messages[1].content {
            ClaudeContent::Blocks(blocks) => {
                assert!(matches!(
                    &blocks[0],
                    ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "call_1"
                ));
            }
            other => panic!("expected blocks, got {other:?}"),
        }
    }

    #[test]
    fn system_and_stop_are_carried() {
        let mut request = ChatCompletionRequest::new("gpt-4o");
        request.messages = vec![
            ChatMessage::System {
                content: MessageContent::Text("be brief".to_string()),
            },
            user("Q"),
        ];
        request.stop = Some(StopSequences::Single("END".to_string()));
        let out = transform_request(request);
        assert_eq!(
            out.system,
            Some(SystemPrompt::Text("be brief".to_string()))
        );
        assert_eq!(out.stop_sequences, Some(vec!["END".to_string()]));
        assert_eq!(out.max_tokens, CLAUDE_DEFAULT_MAX_TOKENS);
    }
}
