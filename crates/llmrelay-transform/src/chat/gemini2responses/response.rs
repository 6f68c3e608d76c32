use llmrelay_protocol::gemini::response::{
    Candidate, FinishReason, GenerateContentResponse, UsageMetadata,
};
use llmrelay_protocol::gemini::types::{Content, FunctionCall as GeminiFunctionCall, Part};
use llmrelay_protocol::json::parse_loose;
use llmrelay_protocol::openai_responses::response::{
    OutputContent, OutputItem, Response, ResponseStatus, ResponseUsage,
};

use crate::ids;

/// Convert a Responses result into a Gemini generate-content response.
pub fn transform_response(response: Response) -> GenerateContentResponse {
    let mut parts = Vec::new();
    for item in &response.output {
        match item {
            OutputItem::Message { content, .. } => {
                for part in content {
                    match part {
                        OutputContent::OutputText { text, .. } => {
                            if !text.is_empty() {
                                parts.push(Part::text(text.clone()));
                            }
                        }
                        OutputContent::Refusal { refusal } => {
                            parts.push(Part::text(refusal.clone()));
                        }
                    }
                }
            }
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => parts.push(Part::function_call(GeminiFunctionCall {
                id: Some(call_id.clone()),
                name: name.clone(),
                args: Some(parse_loose(arguments)),
            })),
            OutputItem::Reasoning { .. } => {}
        }
    }

    let finish_reason = if response.status == ResponseStatus::Incomplete {
        FinishReason::MaxTokens
    } else {
        FinishReason::Stop
    };

    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content::model(parts)),
            finish_reason: Some(finish_reason),
            index: Some(0),
        }],
        usage_metadata: response.usage.as_ref().map(map_usage),
        model_version: Some(response.model.clone()),
        response_id: Some(response.id.clone()),
        ..GenerateContentResponse::default()
    }
}

pub fn map_usage(usage: &ResponseUsage) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: Some(usage.input_tokens),
        candidates_token_count: Some(usage.output_tokens),
        total_token_count: Some(usage.total_tokens),
        cached_content_token_count: usage
            .input_tokens_details
            .as_ref()
            .and_then(|details| details.cached_tokens),
        thoughts_token_count: usage
            .output_tokens_details
            .as_ref()
            .and_then(|details| details.reasoning_tokens),
    }
}

/// Gemini-side response id for synthesized frames.
pub fn stream_response_id() -> String {
    ids::response_id()
}
