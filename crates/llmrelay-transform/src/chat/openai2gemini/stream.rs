use llmrelay_protocol::gemini::response::GenerateContentResponse;
use llmrelay_protocol::openai::stream::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, FunctionCallDelta, ToolCallDelta,
};

use crate::chat::openai2gemini::response::map_usage;
use crate::chat::support::args_to_string;
use crate::ids;
use crate::reason;

/// Translate Gemini streamed responses into OpenAI chat-completion chunks.
#[derive(Debug)]
pub struct GeminiToOpenAiStream {
    id: String,
    created: i64,
    model: String,
    role_sent: bool,
    tool_calls_seen: u32,
}

impl GeminiToOpenAiStream {
    pub fn new() -> Self {
        Self {
            id: ids::chat_completion_id(),
            created: ids::unix_timestamp(),
            model: String::new(),
            role_sent: false,
            tool_calls_seen: 0,
        }
    }

    pub fn transform_chunk(&mut self, response: GenerateContentResponse) -> Vec<ChatCompletionChunk> {
        if let Some(model) = &response.model_version {
            self.model = model.clone();
        }
        if let Some(id) = &response.response_id {
            self.id = format!("chatcmpl-{id}");
        }

        let mut delta = ChunkDelta::default();
        let mut text = String::new();
        let mut reasoning = String::new();
        let mut tool_calls = Vec::new();

        if let Some(candidate) = response.candidates.first()
            && let Some(content) = &candidate.content
        {
            for part in &content.parts {
                if let Some(t) = &part.text {
                    if part.thought == Some(true) {
                        reasoning.push_str(t);
                    } else {
                        text.push_str(t);
                    }
                }
                if let Some(call) = &part.function_call {
                    let index = self.tool_calls_seen;
                    self.tool_calls_seen += 1;
                    tool_calls.push(ToolCallDelta {
                        index,
                        id: Some(call.id.clone().unwrap_or_else(ids::call_id)),
                        r#type: Some("function".to_string()),
                        function: Some(FunctionCallDelta {
                            name: Some(call.name.clone()),
                            arguments: Some(args_to_string(call.args.as_ref())),
                        }),
                    });
                }
            }
        }

        delta.content = (!text.is_empty()).then_some(text);
        delta.reasoning_content = (!reasoning.is_empty()).then_some(reasoning);
        delta.tool_calls = (!tool_calls.is_empty()).then_some(tool_calls);

        let finish_reason = response.finish_reason().map(reason::gemini_to_openai);
        let usage = response.usage_metadata.as_ref().map(map_usage);

        let empty = delta == ChunkDelta::default() && finish_reason.is_none() && usage.is_none();
        if empty {
            return Vec::new();
        }
        if !self.role_sent {
            self.role_sent = true;
            delta.role = Some("assistant".to_string());
        }

        vec![ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage,
        }]
    }
}

impl Default for GeminiToOpenAiStream {
    fn default() -> Self {
        Self::new()
    }
}
