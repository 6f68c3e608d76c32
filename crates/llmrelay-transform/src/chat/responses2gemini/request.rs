use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::types::{Content, GenerationConfig, Part};
use llmrelay_protocol::openai_responses::request::{ResponseInput, ResponsesRequest};

use crate::limits::{
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, gemini_output_tokens, wants_text_modality,
};

/// Convert a Responses request into a Gemini generate-content request paired
/// with the model id.
pub fn transform_request(request: ResponsesRequest) -> (String, GenerateContentRequest) {
    let mut contents = Vec::new();

    match &request.input {
        ResponseInput::Text(text) => {
            if !text.is_empty() {
                contents.push(Content::user(vec![Part::text(text.clone())]));
            }
        }
        ResponseInput::Items(items) => {
            for item in items {
                let text = item.content.flatten();
                if text.is_empty() {
                    continue;
                }
                let content = if item.role == "assistant" {
                    Content::model(vec![Part::text(text)])
                } else {
                    Content::user(vec![Part::text(text)])
                };
                contents.push(content);
            }
        }
    }

    let system_instruction = request
        .instructions
        .as_ref()
        .filter(|instructions| !instructions.is_empty())
        .map(|instructions| Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(instructions.clone())],
        });

    // System promotion mirrors the chat path: no turns at all, but an
    // instruction present, means the instruction becomes the user turn.
    let (contents, system_instruction) = if contents.is_empty() {
        match system_instruction {
            Some(instruction) => (vec![instruction], None),
            None => (contents, None),
        }
    } else {
        (contents, system_instruction)
    };

    let mut generation_config = GenerationConfig {
        max_output_tokens: Some(gemini_output_tokens(request.max_output_tokens)),
        temperature: Some(request.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
        top_p: Some(request.top_p.unwrap_or(DEFAULT_TOP_P)),
        stop_sequences: None,
        response_modalities: None,
        thinking_config: None,
    };
    if wants_text_modality(&request.model, false) {
        generation_config.response_modalities = Some(vec!["TEXT".to_string()]);
    }

    (
        request.model,
        GenerateContentRequest {
            contents,
            system_instruction,
            tools: None,
            tool_config: None,
            generation_config: Some(generation_config),
            safety_settings: None,
        },
    )
}
