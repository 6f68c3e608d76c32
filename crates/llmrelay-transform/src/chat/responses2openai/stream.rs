use std::collections::BTreeMap;

use llmrelay_protocol::openai::stream::ChatCompletionChunk;
use llmrelay_protocol::openai::types::FinishReason;
use llmrelay_protocol::openai_responses::stream::ResponseStreamEvent;

use crate::chat::responses_frames::ResponseFrames;
use crate::chat::responses2openai::response::map_usage;

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Translate OpenAI chat-completion chunks into Responses stream frames.
#[derive(Debug)]
pub struct OpenAiToResponsesStream {
    frames: ResponseFrames,
    pending_calls: BTreeMap<u32, PendingCall>,
}

impl OpenAiToResponsesStream {
    pub fn new() -> Self {
        Self {
            frames: ResponseFrames::new(),
            pending_calls: BTreeMap::new(),
        }
    }

    pub fn transform_chunk(&mut self, chunk: ChatCompletionChunk) -> Vec<ResponseStreamEvent> {
        self.frames.set_model(&chunk.model);
        let mut events = Vec::new();
        if self.frames.is_finished() {
            return events;
        }

        let usage = chunk.usage.as_ref().map(map_usage);
        let Some(choice) = chunk.choices.first() else {
            // A trailing usage-only chunk still needs to reach the client.
            if let Some(usage) = usage {
                events.extend(self.frames.complete(false, Some(usage)));
            }
            return events;
        };

        if choice.delta.role.is_some() {
            events.extend(self.frames.start());
        }
        if let Some(text) = &choice.delta.content {
            events.extend(self.frames.text_delta(text));
        }
        for call in choice.delta.tool_calls.as_deref().unwrap_or_default() {
            let pending = self.pending_calls.entry(call.index).or_default();
            if let Some(id) = &call.id {
                pending.id = Some(id.clone());
            }
            if let Some(function) = &call.function {
                if let Some(name) = &function.name {
                    pending.name = name.clone();
                }
                if let Some(arguments) = &function.arguments {
                    pending.arguments.push_str(arguments);
                }
            }
        }

        if let Some(finish) = choice.finish_reason {
            for pending in std::mem::take(&mut self.pending_calls).into_values() {
                events.extend(self.frames.function_call(
                    pending.id.unwrap_or_else(crate::ids::call_id),
                    pending.name,
                    pending.arguments,
                ));
            }
            events.extend(
                self.frames
                    .complete(finish == FinishReason::Length, usage),
            );
        }
        events
    }
}

impl Default for OpenAiToResponsesStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai::stream::{ChunkChoice, ChunkDelta};
    use llmrelay_protocol::openai_responses::response::ResponseStatus;

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
    fn text_stream_synthesizes_full_frame_sequence() {
        let mut state = OpenAiToResponsesStream::new();
        let first = state.transform_chunk(chunk(
            ChunkDelta {
                role: Some("assistant".to_string()),
                content: Some("he".to_string()),
                ..ChunkDelta::default()
            },
            None,
        ));
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

        let last = state.transform_chunk(chunk(
            ChunkDelta {
                content: Some("y".to_string()),
                ..ChunkDelta::default()
            },
            Some(FinishReason::Length),
        ));
        let ResponseStreamEvent::Completed { response } = last.last().unwrap() else {
            panic!("expected completed");
        };
        assert_eq!(response.status, ResponseStatus::Incomplete);
    }
}
