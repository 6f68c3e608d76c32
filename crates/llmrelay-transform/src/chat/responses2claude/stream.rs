use llmrelay_protocol::claude::stream::{ContentBlockDelta, StreamEvent};
use llmrelay_protocol::claude::types::{ContentBlock, StopReason};
use llmrelay_protocol::openai_responses::response::ResponseUsage;
use llmrelay_protocol::openai_responses::stream::ResponseStreamEvent;

use crate::chat::responses_frames::ResponseFrames;
use crate::chat::responses2claude::response::map_usage;
use crate::chat::support::args_to_string;

/// Translate a Claude event stream into Responses stream frames.
#[derive(Debug)]
pub struct ClaudeToResponsesStream {
    frames: ResponseFrames,
    tool_args: Vec<(u32, String, String, String)>,
    stop_reason: Option<StopReason>,
    usage: Option<ResponseUsage>,
}

impl ClaudeToResponsesStream {
    pub fn new() -> Self {
        Self {
            frames: ResponseFrames::new(),
            tool_args: Vec::new(),
            stop_reason: None,
            usage: None,
        }
    }

    pub fn transform_event(&mut self, event: StreamEvent) -> Vec<ResponseStreamEvent> {
        match event {
            StreamEvent::MessageStart { message } => {
                self.frames.set_model(&message.model);
                self.frames.start()
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                if let ContentBlock::ToolUse { id, name, input } = content_block {
                    let seed = match &input {
                        serde_json::Value::Object(map) if map.is_empty() => String::new(),
                        other => args_to_string(Some(other)),
                    };
                    self.tool_args.push((index, id, name, seed));
                }
                Vec::new()
            }
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                ContentBlockDelta::TextDelta { text } => self.frames.text_delta(&text),
                ContentBlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(entry) = self.tool_args.iter_mut().find(|entry| entry.0 == index) {
                        entry.3.push_str(&partial_json);
                    }
                    Vec::new()
                }
                ContentBlockDelta::ThinkingDelta { .. }
                | ContentBlockDelta::SignatureDelta { .. } => Vec::new(),
            },
            StreamEvent::ContentBlockStop { index } => {
                let Some(position) = self.tool_args.iter().position(|entry| entry.0 == index)
                else {
                    return Vec::new();
                };
                let (_, id, name, arguments) = self.tool_args.remove(position);
                self.frames.function_call(id, name, arguments)
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    self.usage = Some(map_usage(&usage));
                }
                Vec::new()
            }
            StreamEvent::MessageStop => {
                let hit_limit = self.stop_reason == Some(StopReason::MaxTokens);
                self.frames.complete(hit_limit, self.usage.take())
            }
            StreamEvent::Ping | StreamEvent::Error { .. } => Vec::new(),
        }
    }
}

impl Default for ClaudeToResponsesStream {
    fn default() -> Self {
        Self::new()
    }
}
