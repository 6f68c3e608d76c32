use llmrelay_protocol::gemini::response::{
    Candidate, FinishReason, GenerateContentResponse,
};
use llmrelay_protocol::gemini::types::{Content, FunctionCall as GeminiFunctionCall, Part};
use llmrelay_protocol::json::parse_loose;
use llmrelay_protocol::openai_responses::response::{OutputItem, ResponseStatus};
use llmrelay_protocol::openai_responses::stream::ResponseStreamEvent;

use crate::chat::gemini2responses::response::map_usage;

/// Translate Responses stream frames into Gemini streamed responses.
#[derive(Debug)]
pub struct ResponsesToGeminiStream {
    response_id: String,
    model_version: String,
    finished: bool,
}

impl ResponsesToGeminiStream {
    pub fn new() -> Self {
        Self {
            response_id: super::response::stream_response_id(),
            model_version: String::new(),
            finished: false,
        }
    }

    pub fn transform_event(&mut self, event: ResponseStreamEvent) -> Vec<GenerateContentResponse> {
        if self.finished {
            return Vec::new();
        }
        match event {
            ResponseStreamEvent::Created { response }
            | ResponseStreamEvent::InProgress { response } => {
                self.response_id = response.id;
                self.model_version = response.model;
                Vec::new()
            }
            ResponseStreamEvent::OutputTextDelta { delta, .. } => {
                if delta.is_empty() {
                    Vec::new()
                } else {
                    vec![self.emit(vec![Part::text(delta)], None, None)]
                }
            }
            ResponseStreamEvent::OutputItemDone { item, .. } => match item {
                OutputItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                    ..
                } => vec![self.emit(
                    vec![Part::function_call(GeminiFunctionCall {
                        id: Some(call_id),
                        name,
                        args: Some(parse_loose(&arguments)),
                    })],
                    None,
                    None,
                )],
                _ => Vec::new(),
            },
            ResponseStreamEvent::Completed { response } => {
                self.finished = true;
                let finish = if response.status == ResponseStatus::Incomplete {
                    FinishReason::MaxTokens
                } else {
                    FinishReason::Stop
                };
                let usage = response.usage.as_ref().map(map_usage);
                vec![self.emit(Vec::new(), Some(finish), usage)]
            }
            _ => Vec::new(),
        }
    }

    fn emit(
        &self,
        parts: Vec<Part>,
        finish_reason: Option<FinishReason>,
        usage_metadata: Option<llmrelay_protocol::gemini::response::UsageMetadata>,
    ) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(parts)),
                finish_reason,
                index: Some(0),
            }],
            usage_metadata,
            model_version: Some(self.model_version.clone()),
            response_id: Some(self.response_id.clone()),
            ..GenerateContentResponse::default()
        }
    }
}

impl Default for ResponsesToGeminiStream {
    fn default() -> Self {
        Self::new()
    }
}
