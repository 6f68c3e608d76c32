use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::stream::{ContentBlockDelta, MessageDelta, StreamEvent};
use llmrelay_protocol::claude::types::{ContentBlock, StopReason};
use llmrelay_protocol::openai_responses::response::{OutputItem, Response};
use llmrelay_protocol::openai_responses::stream::ResponseStreamEvent;

use crate::chat::claude2responses::response::{map_usage, stop_reason_for};
use crate::ids;

/// Translate Responses stream frames into a framed Claude event stream.
#[derive(Debug)]
pub struct ResponsesToClaudeStream {
    model: String,
    started: bool,
    finished: bool,
    text_open: bool,
    block_index: u32,
    tool_open: bool,
}

impl ResponsesToClaudeStream {
    pub fn new() -> Self {
        Self {
            model: String::new(),
            started: false,
            finished: false,
            text_open: false,
            block_index: 0,
            tool_open: false,
        }
    }

    pub fn transform_event(&mut self, event: ResponseStreamEvent) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        match event {
            ResponseStreamEvent::Created { response } => {
                self.model = response.model.clone();
                self.started = true;
                vec![StreamEvent::MessageStart {
                    message: MessageResponse::new(ids::message_id(), response.model),
                }]
            }
            ResponseStreamEvent::InProgress { .. }
            | ResponseStreamEvent::ContentPartAdded { .. }
            | ResponseStreamEvent::ContentPartDone { .. }
            | ResponseStreamEvent::OutputTextDone { .. }
            | ResponseStreamEvent::FunctionCallArgumentsDone { .. } => Vec::new(),
            ResponseStreamEvent::OutputTextDelta { delta, .. } => {
                if delta.is_empty() {
                    return Vec::new();
                }
                let mut events = self.ensure_started();
                if !self.text_open {
                    self.text_open = true;
                    events.push(StreamEvent::ContentBlockStart {
                        index: self.block_index,
                        content_block: ContentBlock::Text {
                            text: String::new(),
                        },
                    });
                }
                events.push(StreamEvent::ContentBlockDelta {
                    index: self.block_index,
                    delta: ContentBlockDelta::TextDelta { text: delta },
                });
                events
            }
            ResponseStreamEvent::OutputItemAdded { item, .. } => match item {
                OutputItem::FunctionCall { call_id, name, .. } => {
                    let mut events = self.ensure_started();
                    events.extend(self.close_text());
                    self.tool_open = true;
                    events.push(StreamEvent::ContentBlockStart {
                        index: self.block_index,
                        content_block: ContentBlock::ToolUse {
                            id: call_id,
                            name,
                            input: serde_json::json!({}),
                        },
                    });
                    events
                }
                _ => Vec::new(),
            },
            ResponseStreamEvent::FunctionCallArgumentsDelta { delta, .. } => {
                if !self.tool_open {
                    return Vec::new();
                }
                vec![StreamEvent::ContentBlockDelta {
                    index: self.block_index,
                    delta: ContentBlockDelta::InputJsonDelta {
                        partial_json: delta,
                    },
                }]
            }
            ResponseStreamEvent::OutputItemDone { item, .. } => {
                if self.tool_open && matches!(item, OutputItem::FunctionCall { .. }) {
                    self.tool_open = false;
                    let index = self.block_index;
                    self.block_index += 1;
                    vec![StreamEvent::ContentBlockStop { index }]
                } else {
                    Vec::new()
                }
            }
            ResponseStreamEvent::Completed { response } => self.finish(response),
        }
    }

    fn ensure_started(&mut self) -> Vec<StreamEvent> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        vec![StreamEvent::MessageStart {
            message: MessageResponse::new(ids::message_id(), self.model.clone()),
        }]
    }

    fn close_text(&mut self) -> Vec<StreamEvent> {
        if !self.text_open {
            return Vec::new();
        }
        self.text_open = false;
        let index = self.block_index;
        self.block_index += 1;
        vec![StreamEvent::ContentBlockStop { index }]
    }

    fn finish(&mut self, response: Response) -> Vec<StreamEvent> {
        self.finished = true;
        let mut events = self.close_text();
        let has_tool_use = response
            .output
            .iter()
            .any(|item| matches!(item, OutputItem::FunctionCall { .. }));
        let stop_reason = stop_reason_for(&response, has_tool_use);
        events.push(StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: Some(stop_reason),
                stop_sequence: None,
            },
            usage: response.usage.as_ref().map(map_usage),
        });
        events.push(StreamEvent::MessageStop);
        events
    }
}

impl Default for ResponsesToClaudeStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai_responses::response::ResponseStatus;

    #[test]
    fn completed_closes_blocks_and_stops() {
        let mut state = ResponsesToClaudeStream::new();
        state.transform_event(ResponseStreamEvent::Created {
            response: Response::new("resp_1", "gpt-4o", 0),
        });
        state.transform_event(ResponseStreamEvent::OutputTextDelta {
            item_id: "msg_1".to_string(),
            output_index: 0,
            content_index: 0,
            delta: "out".to_string(),
        });
        let mut done_response = Response::new("resp_1", "gpt-4o", 0);
        done_response.status = ResponseStatus::Completed;
        let done = state.transform_event(ResponseStreamEvent::Completed {
            response: done_response,
        });
        assert!(matches!(done[0], StreamEvent::ContentBlockStop { .. }));
        assert!(matches!(
            &done[1],
            StreamEvent::MessageDelta { delta, .. }
                if delta.stop_reason == Some(StopReason::EndTurn)
        ));
        assert!(matches!(done[2], StreamEvent::MessageStop));
    }
}
