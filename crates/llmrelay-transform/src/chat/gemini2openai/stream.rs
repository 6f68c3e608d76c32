use std::collections::BTreeMap;

use llmrelay_protocol::gemini::response::{Candidate, GenerateContentResponse};
use llmrelay_protocol::gemini::types::{Content, FunctionCall as GeminiFunctionCall, Part};
use llmrelay_protocol::json::parse_loose;
use llmrelay_protocol::openai::stream::ChatCompletionChunk;

use crate::chat::gemini2openai::response::map_usage;
use crate::ids;
use crate::reason;

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Translate OpenAI chat-completion chunks into Gemini streamed responses.
///
/// Tool-call argument fragments are accumulated per call index and emitted as
/// one functionCall part when the stream finishes (Gemini has no partial
/// function-call frame).
#[derive(Debug)]
pub struct OpenAiToGeminiStream {
    response_id: String,
    model_version: String,
    pending_calls: BTreeMap<u32, PendingCall>,
}

impl OpenAiToGeminiStream {
    pub fn new() -> Self {
        Self {
            response_id: ids::response_id(),
            model_version: String::new(),
            pending_calls: BTreeMap::new(),
        }
    }

    pub fn transform_chunk(&mut self, chunk: ChatCompletionChunk) -> Vec<GenerateContentResponse> {
        if !chunk.model.is_empty() {
            self.model_version = chunk.model.clone();
        }

        let mut parts = Vec::new();
        let mut finish_reason = None;

        if let Some(choice) = chunk.choices.first() {
            if let Some(reasoning) = &choice.delta.reasoning_content
                && !reasoning.is_empty()
            {
                parts.push(Part::thought(reasoning.clone()));
            }
            if let Some(text) = &choice.delta.content
                && !text.is_empty()
            {
                parts.push(Part::text(text.clone()));
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
                finish_reason = Some(reason::openai_to_gemini(finish));
                parts.extend(self.flush_calls());
            }
        }

        let usage_metadata = chunk.usage.as_ref().map(map_usage);
        if parts.is_empty() && finish_reason.is_none() && usage_metadata.is_none() {
            return Vec::new();
        }

        vec![GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(parts)),
                finish_reason,
                index: Some(0),
            }],
            usage_metadata,
            model_version: Some(self.model_version.clone()),
            response_id: Some(self.response_id.clone()),
            ..GenerateContentResponse::default()
        }]
    }

    fn flush_calls(&mut self) -> Vec<Part> {
        std::mem::take(&mut self.pending_calls)
            .into_values()
            .map(|pending| {
                Part::function_call(GeminiFunctionCall {
                    id: pending.id,
                    name: pending.name,
                    args: Some(parse_loose(&pending.arguments)),
                })
            })
            .collect()
    }
}

impl Default for OpenAiToGeminiStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::gemini::response::FinishReason as GeminiFinish;
    use llmrelay_protocol::openai::stream::{
        ChunkChoice, ChunkDelta, FunctionCallDelta, ToolCallDelta,
    };
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
    fn tool_fragments_assemble_into_one_function_call() {
        let mut state = OpenAiToGeminiStream::new();
        state.transform_chunk(chunk(
            ChunkDelta {
                tool_calls: Some(vec![ToolCallDelta {
                    index: 0,
                    id: Some("call_1".to_string()),
                    r#type: Some("function".to_string()),
                    function: Some(FunctionCallDelta {
                        name: Some("f".to_string()),
                        arguments: Some("{\"x\":".to_string()),
                    }),
                }]),
                ..ChunkDelta::default()
            },
            None,
        ));
        let done = state.transform_chunk(chunk(
            ChunkDelta {
                tool_calls: Some(vec![ToolCallDelta {
                    index: 0,
                    id: None,
                    r#type: None,
                    function: Some(FunctionCallDelta {
                        name: None,
                        arguments: Some("1}".to_string()),
                    }),
                }]),
                ..ChunkDelta::default()
            },
            Some(FinishReason::ToolCalls),
        ));
        let candidate = &done[0].candidates[0];
        assert_eq!(candidate.finish_reason, Some(GeminiFinish::Stop));
        let call = candidate.content.as_ref().unwrap().parts[0]
            .function_call
            .as_ref()
            .unwrap();
        assert_eq!(call.name, "f");
        assert_eq!(call.args, Some(serde_json::json!({"x": 1})));
    }
}
