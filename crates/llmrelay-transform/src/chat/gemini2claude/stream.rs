use std::collections::BTreeMap;

use llmrelay_protocol::claude::stream::{ContentBlockDelta, StreamEvent};
use llmrelay_protocol::claude::types::{ContentBlock, StopReason, Usage as ClaudeUsage};
use llmrelay_protocol::gemini::response::{Candidate, FinishReason, GenerateContentResponse};
use llmrelay_protocol::gemini::types::{Content, FunctionCall as GeminiFunctionCall, Part};
use llmrelay_protocol::json::parse_loose;

use crate::chat::gemini2claude::response::map_usage;
use crate::reason;

#[derive(Debug, Clone)]
struct ToolBlock {
    id: String,
    name: String,
    arguments: String,
}

/// Translate a Claude event stream into Gemini streamed responses.
///
/// Tool argument fragments accumulate per block and surface as one complete
/// functionCall part at content_block_stop.
#[derive(Debug)]
pub struct ClaudeToGeminiStream {
    response_id: String,
    model_version: String,
    stop_reason: Option<StopReason>,
    usage: Option<ClaudeUsage>,
    tool_blocks: BTreeMap<u32, ToolBlock>,
    finished: bool,
}

impl ClaudeToGeminiStream {
    pub fn new() -> Self {
        Self {
            response_id: "response".to_string(),
            model_version: String::new(),
            stop_reason: None,
            usage: None,
            tool_blocks: BTreeMap::new(),
            finished: false,
        }
    }

    pub fn transform_event(&mut self, event: StreamEvent) -> Vec<GenerateContentResponse> {
        match event {
            StreamEvent::MessageStart { message } => {
                self.response_id = message.id;
                self.model_version = message.model;
                Vec::new()
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                ContentBlock::Text { text } => self.emit_parts(vec![Part::text(text)]),
                ContentBlock::Thinking { thinking, .. } => {
                    self.emit_parts(vec![Part::thought(thinking)])
                }
                ContentBlock::ToolUse { id, name, input } => {
                    let arguments = match &input {
                        serde_json::Value::Object(map) if map.is_empty() => String::new(),
                        other => serde_json::to_string(other).unwrap_or_default(),
                    };
                    self.tool_blocks.insert(index, ToolBlock { id, name, arguments });
                    Vec::new()
                }
                _ => Vec::new(),
            },
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                ContentBlockDelta::TextDelta { text } => self.emit_parts(vec![Part::text(text)]),
                ContentBlockDelta::ThinkingDelta { thinking } => {
                    self.emit_parts(vec![Part::thought(thinking)])
                }
                ContentBlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(block) = self.tool_blocks.get_mut(&index) {
                        block.arguments.push_str(&partial_json);
                    }
                    Vec::new()
                }
                ContentBlockDelta::SignatureDelta { signature } => {
                    if signature.is_empty() {
                        Vec::new()
                    } else {
                        self.emit_parts(vec![Part {
                            thought: Some(true),
                            thought_signature: Some(signature),
                            ..Part::default()
                        }])
                    }
                }
            },
            StreamEvent::ContentBlockStop { index } => {
                let Some(block) = self.tool_blocks.remove(&index) else {
                    return Vec::new();
                };
                let args = if block.arguments.is_empty() {
                    serde_json::json!({})
                } else {
                    parse_loose(&block.arguments)
                };
                self.emit_parts(vec![Part::function_call(GeminiFunctionCall {
                    id: Some(block.id),
                    name: block.name,
                    args: Some(args),
                })])
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if usage.is_some() {
                    self.usage = usage;
                }
                Vec::new()
            }
            StreamEvent::MessageStop => self.finish(),
            StreamEvent::Ping | StreamEvent::Error { .. } => Vec::new(),
        }
    }

    fn emit_parts(&self, parts: Vec<Part>) -> Vec<GenerateContentResponse> {
        let parts: Vec<Part> = parts
            .into_iter()
            .filter(|part| {
                part.text.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
                    || part.function_call.is_some()
                    || part.thought_signature.is_some()
            })
            .collect();
        if parts.is_empty() {
            return Vec::new();
        }
        vec![self.response(Some(Content::model(parts)), None, false)]
    }

    fn finish(&mut self) -> Vec<GenerateContentResponse> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let finish_reason = self
            .stop_reason
            .map(reason::claude_to_gemini)
            .unwrap_or(FinishReason::Stop);
        vec![self.response(
            Some(Content::model(Vec::new())),
            Some(finish_reason),
            true,
        )]
    }

    fn response(
        &self,
        content: Option<Content>,
        finish_reason: Option<FinishReason>,
        with_usage: bool,
    ) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content,
                finish_reason,
                index: Some(0),
            }],
            usage_metadata: if with_usage {
                self.usage.as_ref().map(map_usage)
            } else {
                None
            },
            model_version: Some(self.model_version.clone()),
            response_id: Some(self.response_id.clone()),
            ..GenerateContentResponse::default()
        }
    }
}

impl Default for ClaudeToGeminiStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::claude::response::MessageResponse;
    use llmrelay_protocol::claude::stream::MessageDelta;

    #[test]
    fn tool_arguments_assemble_on_block_stop() {
        let mut state = ClaudeToGeminiStream::new();
        state.transform_event(StreamEvent::MessageStart {
            message: MessageResponse::new("msg_1", "claude-3-5-sonnet"),
        });
        state.transform_event(StreamEvent::ContentBlockStart {
            index: 0,
            content_block: ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "f".to_string(),
                input: serde_json::json!({}),
            },
        });
        assert!(state
            .transform_event(StreamEvent::ContentBlockDelta {
                index: 0,
                delta: ContentBlockDelta::InputJsonDelta {
                    partial_json: "{\"x\":".to_string(),
                },
            })
            .is_empty());
        state.transform_event(StreamEvent::ContentBlockDelta {
            index: 0,
            delta: ContentBlockDelta::InputJsonDelta {
                partial_json: "2}".to_string(),
            },
        });
        let out = state.transform_event(StreamEvent::ContentBlockStop { index: 0 });
        let call = out[0].candidates[0].content.as_ref().unwrap().parts[0]
            .function_call
            .as_ref()
            .unwrap();
        assert_eq!(call.args, Some(serde_json::json!({"x": 2})));
    }

    #[test]
    fn message_stop_emits_final_frame_once() {
        let mut state = ClaudeToGeminiStream::new();
        state.transform_event(StreamEvent::MessageStart {
            message: MessageResponse::new("msg_1", "m"),
        });
        state.transform_event(StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(StopReason::MaxTokens),
                stop_sequence: None,
            },
            usage: Some(ClaudeUsage {
                input_tokens: Some(1),
                output_tokens: Some(2),
                ..ClaudeUsage::default()
            }),
        });
        let done = state.transform_event(StreamEvent::MessageStop);
        assert_eq!(
            done[0].candidates[0].finish_reason,
            Some(FinishReason::MaxTokens)
        );
        assert_eq!(
            done[0].usage_metadata.as_ref().unwrap().total_token_count,
            Some(3)
        );
        assert!(state.transform_event(StreamEvent::MessageStop).is_empty());
    }
}
