use std::collections::BTreeMap;

use llmrelay_protocol::claude::stream::{ContentBlockDelta, StreamEvent};
use llmrelay_protocol::claude::types::ContentBlock;
use llmrelay_protocol::openai::stream::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, FunctionCallDelta, ToolCallDelta,
};
use llmrelay_protocol::openai::types::Usage;

use crate::chat::openai2claude::response::map_usage;
use crate::chat::support::args_to_string;
use crate::ids;
use crate::reason;

/// Translate a Claude event stream into OpenAI chat-completion chunks.
///
/// Claude's framing is stripped; block indices are mapped onto OpenAI
/// tool-call indices, and input_json fragments are forwarded verbatim.
#[derive(Debug)]
pub struct ClaudeToOpenAiStream {
    id: String,
    created: i64,
    model: String,
    role_sent: bool,
    tool_indices: BTreeMap<u32, u32>,
    usage: Option<Usage>,
}

impl ClaudeToOpenAiStream {
    pub fn new() -> Self {
        Self {
            id: ids::chat_completion_id(),
            created: ids::unix_timestamp(),
            model: String::new(),
            role_sent: false,
            tool_indices: BTreeMap::new(),
            usage: None,
        }
    }

    pub fn transform_event(&mut self, event: StreamEvent) -> Vec<ChatCompletionChunk> {
        match event {
            StreamEvent::MessageStart { message } => {
                self.model = message.model;
                self.role_sent = true;
                vec![self.chunk(
                    ChunkDelta {
                        role: Some("assistant".to_string()),
                        ..ChunkDelta::default()
                    },
                    None,
                )]
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => self.handle_block_start(index, content_block),
            StreamEvent::ContentBlockDelta { index, delta } => self.handle_delta(index, delta),
            StreamEvent::ContentBlockStop { .. } => Vec::new(),
            StreamEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage {
                    self.usage = Some(map_usage(&usage));
                }
                match delta.stop_reason {
                    Some(stop_reason) => {
                        let finish = reason::claude_to_openai(stop_reason);
                        vec![self.final_chunk(finish)]
                    }
                    None => Vec::new(),
                }
            }
            StreamEvent::MessageStop | StreamEvent::Ping | StreamEvent::Error { .. } => Vec::new(),
        }
    }

    fn handle_block_start(
        &mut self,
        index: u32,
        content_block: ContentBlock,
    ) -> Vec<ChatCompletionChunk> {
        match content_block {
            ContentBlock::Text { text } => {
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![self.content_chunk(text)]
                }
            }
            ContentBlock::Thinking { thinking, .. } => {
                if thinking.is_empty() {
                    Vec::new()
                } else {
                    vec![self.reasoning_chunk(thinking)]
                }
            }
            ContentBlock::ToolUse { id, name, input } => {
                let tool_index = self.tool_indices.len() as u32;
                self.tool_indices.insert(index, tool_index);
                let arguments = match &input {
                    serde_json::Value::Object(map) if map.is_empty() => None,
                    other => Some(args_to_string(Some(other))),
                };
                vec![self.tool_chunk(tool_index, Some(id), Some(name), arguments)]
            }
            _ => Vec::new(),
        }
    }

    fn handle_delta(&mut self, index: u32, delta: ContentBlockDelta) -> Vec<ChatCompletionChunk> {
        match delta {
            ContentBlockDelta::TextDelta { text } => vec![self.content_chunk(text)],
            ContentBlockDelta::ThinkingDelta { thinking } => {
                vec![self.reasoning_chunk(thinking)]
            }
            ContentBlockDelta::InputJsonDelta { partial_json } => {
                let Some(tool_index) = self.tool_indices.get(&index).copied() else {
                    return Vec::new();
                };
                vec![self.tool_chunk(tool_index, None, None, Some(partial_json))]
            }
            ContentBlockDelta::SignatureDelta { .. } => Vec::new(),
        }
    }

    fn content_chunk(&mut self, text: String) -> ChatCompletionChunk {
        let role = self.take_role();
        self.chunk(
            ChunkDelta {
                role,
                content: Some(text),
                ..ChunkDelta::default()
            },
            None,
        )
    }

    fn reasoning_chunk(&mut self, text: String) -> ChatCompletionChunk {
        let role = self.take_role();
        self.chunk(
            ChunkDelta {
                role,
                reasoning_content: Some(text),
                ..ChunkDelta::default()
            },
            None,
        )
    }

    fn tool_chunk(
        &mut self,
        tool_index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) -> ChatCompletionChunk {
        let role = self.take_role();
        self.chunk(
            ChunkDelta {
                role,
                tool_calls: Some(vec![ToolCallDelta {
                    index: tool_index,
                    id,
                    r#type: name.is_some().then(|| "function".to_string()),
                    function: Some(FunctionCallDelta { name, arguments }),
                }]),
                ..ChunkDelta::default()
            },
            None,
        )
    }

    fn final_chunk(
        &mut self,
        finish: llmrelay_protocol::openai::types::FinishReason,
    ) -> ChatCompletionChunk {
        let usage = self.usage.take();
        let mut chunk = self.chunk(ChunkDelta::default(), Some(finish));
        chunk.usage = usage;
        chunk
    }

    fn take_role(&mut self) -> Option<String> {
        if self.role_sent {
            None
        } else {
            self.role_sent = true;
            Some("assistant".to_string())
        }
    }

    fn chunk(
        &self,
        delta: ChunkDelta,
        finish_reason: Option<llmrelay_protocol::openai::types::FinishReason>,
    ) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage: None,
        }
    }
}

impl Default for ClaudeToOpenAiStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::claude::response::MessageResponse;
    use llmrelay_protocol::claude::stream::MessageDelta;
    use llmrelay_protocol::claude::types::{StopReason, Usage as ClaudeUsage};
    use llmrelay_protocol::openai::types::FinishReason;

    #[test]
    fn full_stream_produces_role_text_and_finish() {
        let mut state = ClaudeToOpenAiStream::new();

        let start = state.transform_event(StreamEvent::MessageStart {
            message: MessageResponse::new("msg_1", "claude-3-5-sonnet"),
        });
        assert_eq!(start[0].choices[0].delta.role.as_deref(), Some("assistant"));

        let text = state.transform_event(StreamEvent::ContentBlockDelta {
            index: 0,
            delta: ContentBlockDelta::TextDelta {
                text: "hello".to_string(),
            },
        });
        assert_eq!(text[0].choices[0].delta.content.as_deref(), Some("hello"));
        assert_eq!(text[0].model, "claude-3-5-sonnet");

        let done = state.transform_event(StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(StopReason::EndTurn),
                stop_sequence: None,
            },
            usage: Some(ClaudeUsage {
                input_tokens: Some(2),
                output_tokens: Some(4),
                ..ClaudeUsage::default()
            }),
        });
        assert_eq!(done[0].choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(done[0].usage.as_ref().unwrap().total_tokens, 6);

        assert!(state.transform_event(StreamEvent::MessageStop).is_empty());
    }

    #[test]
    fn tool_argument_fragments_are_forwarded_verbatim() {
        let mut state = ClaudeToOpenAiStream::new();
        state.transform_event(StreamEvent::MessageStart {
            message: MessageResponse::new("msg_1", "m"),
        });
        state.transform_event(StreamEvent::ContentBlockStart {
            index: 1,
            content_block: ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "f".to_string(),
                input: serde_json::json!({}),
            },
        });
        let frag = state.transform_event(StreamEvent::ContentBlockDelta {
            index: 1,
            delta: ContentBlockDelta::InputJsonDelta {
                partial_json: "{\"x\":".to_string(),
            },
        });
        let calls = frag[0].choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].index, 0);
        assert_eq!(
            calls[0].function.as_ref().unwrap().arguments.as_deref(),
            Some("{\"x\":")
        );
    }
}
