use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::stream::{ContentBlockDelta, MessageDelta, StreamEvent};
use llmrelay_protocol::claude::types::{ContentBlock, StopReason};
use llmrelay_protocol::gemini::response::GenerateContentResponse;

use crate::chat::claude2gemini::response::map_usage;
use crate::chat::support::args_to_string;
use crate::ids;
use crate::reason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Text,
    Thinking,
}

/// Translate Gemini streamed responses into a framed Claude event stream.
///
/// Gemini function calls arrive whole, so each one becomes a complete
/// tool_use block (start, one input_json_delta, stop).
#[derive(Debug)]
pub struct GeminiToClaudeStream {
    model: String,
    started: bool,
    finished: bool,
    saw_tool_use: bool,
    block_index: u32,
    open: Option<OpenBlock>,
}

impl GeminiToClaudeStream {
    pub fn new() -> Self {
        Self {
            model: String::new(),
            started: false,
            finished: false,
            saw_tool_use: false,
            block_index: 0,
            open: None,
        }
    }

    pub fn transform_chunk(&mut self, response: GenerateContentResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        if let Some(model) = &response.model_version {
            self.model = model.clone();
        }

        if !self.started {
            self.started = true;
            events.push(StreamEvent::MessageStart {
                message: MessageResponse::new(ids::message_id(), self.model.clone()),
            });
        }

        let finish = response.finish_reason();
        if let Some(candidate) = response.candidates.first()
            && let Some(content) = &candidate.content
        {
            for part in &content.parts {
                if let Some(text) = &part.text {
                    if text.is_empty() {
                        continue;
                    }
                    if part.thought == Some(true) {
                        self.ensure_block(OpenBlock::Thinking, &mut events);
                        events.push(StreamEvent::ContentBlockDelta {
                            index: self.block_index,
                            delta: ContentBlockDelta::ThinkingDelta {
                                thinking: text.clone(),
                            },
                        });
                    } else {
                        self.ensure_block(OpenBlock::Text, &mut events);
                        events.push(StreamEvent::ContentBlockDelta {
                            index: self.block_index,
                            delta: ContentBlockDelta::TextDelta { text: text.clone() },
                        });
                    }
                }
                if let Some(call) = &part.function_call {
                    self.saw_tool_use = true;
                    self.close_open_block(&mut events);
                    events.push(StreamEvent::ContentBlockStart {
                        index: self.block_index,
                        content_block: ContentBlock::ToolUse {
                            id: call.id.clone().unwrap_or_else(ids::tool_use_id),
                            name: call.name.clone(),
                            input: serde_json::json!({}),
                        },
                    });
                    events.push(StreamEvent::ContentBlockDelta {
                        index: self.block_index,
                        delta: ContentBlockDelta::InputJsonDelta {
                            partial_json: args_to_string(call.args.as_ref()),
                        },
                    });
                    events.push(StreamEvent::ContentBlockStop {
                        index: self.block_index,
                    });
                    self.block_index += 1;
                }
            }
        }

        if let Some(finish) = finish {
            self.close_open_block(&mut events);
            self.finished = true;
            let mut stop_reason = reason::gemini_to_claude(finish);
            if self.saw_tool_use && stop_reason == StopReason::EndTurn {
                stop_reason = StopReason::ToolUse;
            }
            events.push(StreamEvent::MessageDelta {
                delta: MessageDelta {
                    stop_reason: Some(stop_reason),
                    stop_sequence: None,
                },
                usage: response.usage_metadata.as_ref().map(map_usage),
            });
            events.push(StreamEvent::MessageStop);
        }

        events
    }

    fn ensure_block(&mut self, kind: OpenBlock, events: &mut Vec<StreamEvent>) {
        if self.open == Some(kind) {
            return;
        }
        self.close_open_block(events);
        self.open = Some(kind);
        let content_block = match kind {
            OpenBlock::Text => ContentBlock::Text {
                text: String::new(),
            },
            OpenBlock::Thinking => ContentBlock::Thinking {
                thinking: String::new(),
                signature: None,
            },
        };
        events.push(StreamEvent::ContentBlockStart {
            index: self.block_index,
            content_block,
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

impl Default for GeminiToClaudeStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::gemini::response::{Candidate, FinishReason as GeminiFinish};
    use llmrelay_protocol::gemini::types::{Content, Part};

    fn chunk(parts: Vec<Part>, finish: Option<GeminiFinish>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(parts)),
                finish_reason: finish,
                index: Some(0),
            }],
            model_version: Some("gemini-2.5-flash".to_string()),
            ..GenerateContentResponse::default()
        }
    }

    #[test]
    fn text_stream_is_framed() {
        let mut state = GeminiToClaudeStream::new();
        let first = state.transform_chunk(chunk(vec![Part::text("hel")], None));
        assert!(matches!(first[0], StreamEvent::MessageStart { .. }));
        assert!(matches!(
            first[1],
            StreamEvent::ContentBlockStart { index: 0, .. }
        ));
        assert!(matches!(first[2], StreamEvent::ContentBlockDelta { .. }));

        let last = state.transform_chunk(chunk(vec![Part::text("lo")], Some(GeminiFinish::Stop)));
        assert!(matches!(last[0], StreamEvent::ContentBlockDelta { .. }));
        assert!(matches!(last[1], StreamEvent::ContentBlockStop { .. }));
        assert!(matches!(
            &last[2],
            StreamEvent::MessageDelta { delta, .. }
                if delta.stop_reason == Some(StopReason::EndTurn)
        ));
        assert!(matches!(last[3], StreamEvent::MessageStop));

        // Late chunks after the terminal frame are dropped.
        assert!(state
            .transform_chunk(chunk(vec![Part::text("x")], None))
            .is_empty());
    }
}
