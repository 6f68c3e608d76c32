use llmrelay_protocol::gemini::response::{FinishReason, GenerateContentResponse};
use llmrelay_protocol::openai_responses::stream::ResponseStreamEvent;

use crate::chat::responses_frames::ResponseFrames;
use crate::chat::responses2gemini::response::map_usage;
use crate::chat::support::args_to_string;
use crate::ids;

/// Translate Gemini streamed responses into Responses stream frames.
#[derive(Debug)]
pub struct GeminiToResponsesStream {
    frames: ResponseFrames,
}

impl GeminiToResponsesStream {
    pub fn new() -> Self {
        Self {
            frames: ResponseFrames::new(),
        }
    }

    pub fn transform_chunk(&mut self, response: GenerateContentResponse) -> Vec<ResponseStreamEvent> {
        if let Some(model) = &response.model_version {
            self.frames.set_model(model);
        }
        let mut events = Vec::new();
        if self.frames.is_finished() {
            return events;
        }

        if let Some(candidate) = response.candidates.first()
            && let Some(content) = &candidate.content
        {
            for part in &content.parts {
                if part.thought == Some(true) {
                    continue;
                }
                if let Some(text) = &part.text {
                    events.extend(self.frames.text_delta(text));
                }
                if let Some(call) = &part.function_call {
                    events.extend(self.frames.function_call(
                        call.id.clone().unwrap_or_else(ids::call_id),
                        call.name.clone(),
                        args_to_string(call.args.as_ref()),
                    ));
                }
            }
        }

        if let Some(finish) = response.finish_reason() {
            let usage = response.usage_metadata.as_ref().map(map_usage);
            events.extend(
                self.frames
                    .complete(finish == FinishReason::MaxTokens, usage),
            );
        }
        events
    }
}

impl Default for GeminiToResponsesStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::gemini::response::Candidate;
    use llmrelay_protocol::gemini::types::{Content, Part};
    use llmrelay_protocol::openai_responses::response::ResponseStatus;

    #[test]
    fn terminal_chunk_completes_the_frame_sequence() {
        let mut state = GeminiToResponsesStream::new();
        state.transform_chunk(GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(vec![Part::text("a")])),
                finish_reason: None,
                index: Some(0),
            }],
            model_version: Some("gemini-2.5-flash".to_string()),
            ..GenerateContentResponse::default()
        });
        let done = state.transform_chunk(GenerateContentResponse {
            candidates: vec![Candidate {
                content: None,
                finish_reason: Some(FinishReason::Stop),
                index: Some(0),
            }],
            ..GenerateContentResponse::default()
        });
        let ResponseStreamEvent::Completed { response } = done.last().unwrap() else {
            panic!("expected completed frame");
        };
        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(response.model, "gemini-2.5-flash");
    }
}
