use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::stream::{ContentBlockDelta, MessageDelta, StreamEvent};
use llmrelay_protocol::claude::types::ContentBlock;
use llmrelay_protocol::openai::stream::{ChatCompletionChunk, ToolCallDelta};

use crate::chat::claude2openai::response::map_usage;
use crate::ids;
use crate::reason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Text,
    Thinking,
    Tool(u32),
}

/// Translate OpenAI chat-completion chunks into a framed Claude event
/// stream: `message_start` on the first assistant chunk, block events as
/// delta kinds change, `message_delta`/`message_stop` on the terminal chunk.
#[derive(Debug)]
pub struct OpenAiToClaudeStream {
    started: bool,
    finished: bool,
    block_index: u32,
    open: Option<OpenBlock>,
}

impl OpenAiToClaudeStream {
    pub fn new() -> Self {
        Self {
            started: false,
            finished: false,
            block_index: 0,
            open: None,
        }
    }

    pub fn transform_chunk(&mut self, chunk: ChatCompletionChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        let Some(choice) = chunk.choices.first() else {
            return events;
        };

        if !self.started {
            self.started = true;
            events.push(StreamEvent::MessageStart {
                message: MessageResponse::new(ids::message_id(), chunk.model.clone()),
            });
        }

        if let Some(reasoning) = &choice.delta.reasoning_content
            && !reasoning.is_empty()
        {
            self.ensure_block(OpenBlock::Thinking, &mut events, || ContentBlock::Thinking {
                thinking: String::new(),
                signature: None,
            });
            events.push(StreamEvent::ContentBlockDelta {
                index: self.block_index,
                delta: ContentBlockDelta::ThinkingDelta {
                    thinking: reasoning.clone(),
                },
            });
        }

        if let Some(text) = &choice.delta.content
            && !text.is_empty()
        {
            self.ensure_block(OpenBlock::Text, &mut events, || ContentBlock::Text {
                text: String::new(),
            });
            events.push(StreamEvent::ContentBlockDelta {
                index: self.block_index,
                delta: ContentBlockDelta::TextDelta { text: text.clone() },
            });
        }

        for call in choice.delta.tool_calls.as_deref().unwrap_or_default() {
            self.push_tool_delta(call, &mut events);
        }

        if let Some(finish) = choice.finish_reason {
            self.close_open_block(&mut events);
            self.finished = true;
            events.push(StreamEvent::MessageDelta {
                delta: MessageDelta {
                    stop_reason: Some(reason::openai_to_claude(finish)),
                    stop_sequence: None,
                },
                usage: chunk.usage.as_ref().map(map_usage),
            });
            events.push(StreamEvent::MessageStop);
        }

        events
    }

    fn push_tool_delta(&mut self, call: &ToolCallDelta, events: &mut Vec<StreamEvent>) {
        let is_new = !matches!(self.open, Some(OpenBlock::Tool(index)) if index == call.index);
        if is_new {
            self.close_open_block(events);
            self.open = Some(OpenBlock::Tool(call.index));
            let id = call
                .id
                .clone()
                .unwrap_or_else(ids::tool_use_id);
            let name = call
                .function
                .as_ref()
                .and_then(|f| f.name.clone())
                .unwrap_or_default();
            events.push(StreamEvent::ContentBlockStart {
                index: self.block_index,
                content_block: ContentBlock::ToolUse {
                    id,
                    name,
                    input: serde_json::json!({}),
                },
            });
        }
        if let Some(arguments) = call.function.as_ref().and_then(|f| f.arguments.clone())
            && !arguments.is_empty()
        {
            events.push(StreamEvent::ContentBlockDelta {
                index: self.block_index,
                delta: ContentBlockDelta::InputJsonDelta {
                    partial_json: arguments,
                },
            });
        }
    }

    fn ensure_block<F>(&mut self, kind: OpenBlock, events: &mut Vec<StreamEvent>, make: F)
    where
        F: FnOnce() -> ContentBlock,
    {
        if self.open == Some(kind) {
            return;
        }
        self.close_open_block(events);
        self.open = Some(kind);
        events.push(StreamEvent::ContentBlockStart {
            index: self.block_index,
            content_block: make(),
        });
    }

    fn close_open_block(&mut self, events: &mut Vec<StreamEvent>) {
        if self.open.take().is_some() {
            events.push(StreamEvent::ContentBlockStop {
                index: self.block_index,
            });
            self.block_index += 1;
        }
    }
}

impl Default for OpenAiToClaudeStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::claude::types::StopReason;
    use llmrelay_protocol::openai::stream::{ChunkChoice, ChunkDelta};
    use llmrelay_protocol::openai::types::FinishReason;

    fn chunk(delta: ChunkDelta, finish: Option<FinishReason>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: "chatcmpl-1".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 0,
            model: "gpt-4o".to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish,
            }],
            usage: None,
        }
    }

    #[test]
    fn framing_wraps_text_deltas() {
        let mut state = OpenAiToClaudeStream::new();

        let first = state.transform_chunk(chunk(
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: Some("he".to_string()),
                ..ChunkDelta::default()
            },
            None,
        ));
        assert!(matches!(first[0], StreamEvent::MessageStart { .. }));
        assert!(matches!(first[1], StreamEvent::ContentBlockStart { .. }));
        assert!(matches!(
            &first[2],
            StreamEvent::ContentBlockDelta {
                delta: ContentBlockDelta::TextDelta { text },
                ..
            } if text == "he"
        ));

        let second = state.transform_chunk(chunk(
            ChunkDelta {
                content: Some("llo".to_string()),
                ..ChunkDelta::default()
            },
            None,
        ));
        assert_eq!(second.len(), 1);

        let last = state.transform_chunk(chunk(ChunkDelta::default(), Some(FinishReason::Stop)));
        assert!(matches!(last[0], StreamEvent::ContentBlockStop { .. }));
        assert!(matches!(
            &last[1],
            StreamEvent::MessageDelta { delta, .. }
                if delta.stop_reason == Some(StopReason::EndTurn)
        ));
        assert!(matches!(last[2], StreamEvent::MessageStop));
    }

    #[test]
    fn reasoning_then_text_opens_two_blocks() {
        let mut state = OpenAiToClaudeStream::new();
        state.transform_chunk(chunk(
            ChunkDelta {
                reasoning_content: Some("think".to_string()),
                ..ChunkDelta::default()
            },
            None,
        ));
        let events = state.transform_chunk(chunk(
            ChunkDelta {
                content: Some("answer".to_string()),
                ..ChunkDelta::default()
            },
            None,
        ));
        // Thinking block closes, text block opens at the next index.
        assert!(matches!(events[0], StreamEvent::ContentBlockStop { index: 0 }));
        assert!(matches!(
            events[1],
            StreamEvent::ContentBlockStart { index: 1, .. }
        ));
    }
}
