use llmrelay_protocol::gemini::response::{Candidate, GenerateContentResponse, UsageMetadata};
use llmrelay_protocol::gemini::types::{Content, FunctionCall as GeminiFunctionCall, Part};
use llmrelay_protocol::json::parse_loose;
use llmrelay_protocol::openai::response::ChatCompletion;
use llmrelay_protocol::openai::types::Usage;

use crate::reason;

/// Convert an OpenAI chat completion into a Gemini generate-content response.
pub fn transform_response(response: ChatCompletion) -> GenerateContentResponse {
    let mut parts = Vec::new();
    let mut finish_reason = None;

    if let Some(choice) = response.choices.into_iter().next() {
        if let Some(reasoning) = choice.message.reasoning_content
            && !reasoning.is_empty()
        {
            parts.push(Part::thought(reasoning));
        }
        if let Some(text) = choice.message.content
            && !text.is_empty()
        {
            parts.push(Part::text(text));
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            parts.push(Part::function_call(GeminiFunctionCall {
                id: Some(call.id),
                name: call.function.name,
                args: Some(parse_loose(&call.function.arguments)),
            }));
        }
        finish_reason = choice.finish_reason.map(reason::openai_to_gemini);
    }

    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content::model(parts)),
            finish_reason,
            index: Some(0),
        }],
        usage_metadata: response.usage.as_ref().map(map_usage),
        model_version: Some(response.model),
        response_id: Some(response.id),
        ..GenerateContentResponse::default()
    }
}

pub fn map_usage(usage: &Usage) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: Some(usage.prompt_tokens),
        candidates_token_count: Some(usage.completion_tokens),
        total_token_count: Some(usage.total_tokens),
        cached_content_token_count: usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|details| details.cached_tokens),
        thoughts_token_count: usage
            .completion_tokens_details
            .as_ref()
            .and_then(|details| details.reasoning_tokens),
    }
}
