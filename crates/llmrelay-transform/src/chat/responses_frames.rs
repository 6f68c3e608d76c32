use llmrelay_protocol::openai_responses::response::{
    IncompleteDetails, OutputContent, OutputItem, Response, ResponseStatus, ResponseUsage,
};
use llmrelay_protocol::openai_responses::stream::ResponseStreamEvent;

use crate::ids;

/// Builds the Responses streaming frame sequence around a stream of text
/// deltas and completed function calls, whatever dialect they came from.
///
/// Lifecycle: `response.created`, `response.in_progress`,
/// `output_item.added`, `content_part.added`, `output_text.delta`
/// repeated, `output_text.done`, `content_part.done`, `output_item.done`,
/// `response.completed`.
#[derive(Debug)]
pub struct ResponseFrames {
    id: String,
    model: String,
    created_at: i64,
    message_item_id: String,
    started: bool,
    text_open: bool,
    text: String,
    output_index: u32,
    items: Vec<OutputItem>,
    finished: bool,
}

impl ResponseFrames {
    pub fn new() -> Self {
        Self {
            id: ids::response_id(),
            model: String::new(),
            created_at: ids::unix_timestamp(),
            message_item_id: format!("msg_{}", uuid_tail()),
            started: false,
            text_open: false,
            text: String::new(),
            output_index: 0,
            items: Vec::new(),
            finished: false,
        }
    }

    pub fn set_model(&mut self, model: &str) {
        if !model.is_empty() {
            self.model = model.to_string();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Emit the opening frames exactly once.
    pub fn start(&mut self) -> Vec<ResponseStreamEvent> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        vec![
            ResponseStreamEvent::Created {
                response: self.snapshot(ResponseStatus::InProgress, None, None),
            },
            ResponseStreamEvent::InProgress {
                response: self.snapshot(ResponseStatus::InProgress, None, None),
            },
        ]
    }

    pub fn text_delta(&mut self, delta: &str) -> Vec<ResponseStreamEvent> {
        if delta.is_empty() || self.finished {
            return Vec::new();
        }
        let mut events = self.start();
        if !self.text_open {
            self.text_open = true;
            events.push(ResponseStreamEvent::OutputItemAdded {
                output_index: self.output_index,
                item: OutputItem::Message {
                    id: self.message_item_id.clone(),
                    role: "assistant".to_string(),
                    status: ResponseStatus::InProgress,
                    content: Vec::new(),
                },
            });
            events.push(ResponseStreamEvent::ContentPartAdded {
                item_id: self.message_item_id.clone(),
                output_index: self.output_index,
                content_index: 0,
                part: OutputContent::OutputText {
                    text: String::new(),
                    annotations: Vec::new(),
                },
            });
        }
        self.text.push_str(delta);
        events.push(ResponseStreamEvent::OutputTextDelta {
            item_id: self.message_item_id.clone(),
            output_index: self.output_index,
            content_index: 0,
            delta: delta.to_string(),
        });
        events
    }

    /// A completed function call becomes its own output item.
    pub fn function_call(
        &mut self,
        call_id: String,
        name: String,
        arguments: String,
    ) -> Vec<ResponseStreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let mut events = self.start();
        events.extend(self.close_text_item());

        let item_id = format!("fc_{}", uuid_tail());
        let item = OutputItem::FunctionCall {
            id: item_id.clone(),
            call_id,
            name,
            arguments: arguments.clone(),
            status: ResponseStatus::Completed,
        };
        events.push(ResponseStreamEvent::OutputItemAdded {
            output_index: self.output_index,
            item: item.clone(),
        });
        events.push(ResponseStreamEvent::FunctionCallArgumentsDelta {
            item_id: item_id.clone(),
            output_index: self.output_index,
            delta: arguments.clone(),
        });
        events.push(ResponseStreamEvent::FunctionCallArgumentsDone {
            item_id,
            output_index: self.output_index,
            arguments,
        });
        events.push(ResponseStreamEvent::OutputItemDone {
            output_index: self.output_index,
            item: item.clone(),
        });
        self.items.push(item);
        self.output_index += 1;
        events
    }

    /// Emit the terminal frames exactly once.
    pub fn complete(
        &mut self,
        hit_token_limit: bool,
        usage: Option<ResponseUsage>,
    ) -> Vec<ResponseStreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let mut events = self.start();
        events.extend(self.close_text_item());
        self.finished = true;

        let (status, incomplete) = if hit_token_limit {
            (
                ResponseStatus::Incomplete,
                Some(IncompleteDetails {
                    reason: "max_output_tokens".to_string(),
                }),
            )
        } else {
            (ResponseStatus::Completed, None)
        };
        events.push(ResponseStreamEvent::Completed {
            response: self.snapshot(status, incomplete, usage),
        });
        events
    }

    fn close_text_item(&mut self) -> Vec<ResponseStreamEvent> {
        if !self.text_open {
            return Vec::new();
        }
        self.text_open = false;
        let part = OutputContent::OutputText {
            text: self.text.clone(),
            annotations: Vec::new(),
        };
        let item = OutputItem::Message {
            id: self.message_item_id.clone(),
            role: "assistant".to_string(),
            status: ResponseStatus::Completed,
            content: vec![part.clone()],
        };
        let events = vec![
            ResponseStreamEvent::OutputTextDone {
                item_id: self.message_item_id.clone(),
                output_index: self.output_index,
                content_index: 0,
                text: self.text.clone(),
            },
            ResponseStreamEvent::ContentPartDone {
                item_id: self.message_item_id.clone(),
                output_index: self.output_index,
                content_index: 0,
                part,
            },
            ResponseStreamEvent::OutputItemDone {
                output_index: self.output_index,
                item: item.clone(),
            },
        ];
        self.items.push(item);
        self.output_index += 1;
        events
    }

    fn snapshot(
        &self,
        status: ResponseStatus,
        incomplete_details: Option<IncompleteDetails>,
        usage: Option<ResponseUsage>,
    ) -> Response {
        Response {
            id: self.id.clone(),
            object: "response".to_string(),
            created_at: self.created_at,
            status,
            model: self.model.clone(),
            output: self.items.clone(),
            usage,
            incomplete_details,
        }
    }
}

impl Default for ResponseFrames {
    fn default() -> Self {
        Self::new()
    }
}

fn uuid_tail() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..24].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_frames_in_order() {
        let mut frames = ResponseFrames::new();
        frames.set_model("gpt-4o");

        let first = frames.text_delta("hel");
        let names: Vec<&str> = first.iter().map(|e| e.event_name()).collect();
        assert_eq!(
            names,
            vec![
                "response.created",
                "response.in_progress",
                "response.output_item.added",
                "response.content_part.added",
                "response.output_text.delta",
            ]
        );

        assert_eq!(frames.text_delta("lo").len(), 1);

        let last = frames.complete(false, None);
        let names: Vec<&str> = last.iter().map(|e| e.event_name()).collect();
        assert_eq!(
            names,
            vec![
                "response.output_text.done",
                "response.content_part.done",
                "response.output_item.done",
                "response.completed",
            ]
        );
        match &last[0] {
            ResponseStreamEvent::OutputTextDone { text, .. } => assert_eq!(text, "hello"),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(frames.complete(false, None).is_empty());
    }

    #[test]
    fn token_limit_reports_incomplete() {
        let mut frames = ResponseFrames::new();
        frames.text_delta("x");
        let last = frames.complete(true, None);
        let ResponseStreamEvent::Completed { response } = last.last().unwrap() else {
            panic!("expected completed frame");
        };
        assert_eq!(response.status, ResponseStatus::Incomplete);
        assert_eq!(
            response.incomplete_details.as_ref().unwrap().reason,
            "max_output_tokens"
        );
    }
}
