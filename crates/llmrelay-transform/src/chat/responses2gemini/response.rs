use llmrelay_protocol::gemini::response::{FinishReason, GenerateContentResponse, UsageMetadata};
use llmrelay_protocol::openai_responses::response::{
    IncompleteDetails, InputTokensDetails, OutputContent, OutputItem, OutputTokensDetails,
    Response, ResponseStatus, ResponseUsage,
};

use crate::chat::support::args_to_string;
use crate::ids;

/// Convert a Gemini generate-content response into a Responses result.
pub fn transform_response(response: GenerateContentResponse) -> Response {
    let mut out = Response::new(
        response.response_id.clone().unwrap_or_else(ids::response_id),
        response.model_version.clone().unwrap_or_default(),
        ids::unix_timestamp(),
    );
    out.status = ResponseStatus::Completed;

    let mut text = String::new();
    if let Some(candidate) = response.candidates.first()
        && let Some(content) = &candidate.content
    {
        for part in &content.parts {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(t) = &part.text {
                text.push_str(t);
            }
            if let Some(call) = &part.function_call {
                let call_id = call.id.clone().unwrap_or_else(ids::call_id);
                out.output.push(OutputItem::FunctionCall {
                    id: format!("fc_{}", call_id.trim_start_matches("call_")),
                    call_id,
                    name: call.name.clone(),
                    arguments: args_to_string(call.args.as_ref()),
                    status: ResponseStatus::Completed,
                });
            }
        }
    }
    if !text.is_empty() {
        out.output.insert(
            0,
            OutputItem::Message {
                id: ids::message_id(),
                role: "assistant".to_string(),
                status: ResponseStatus::Completed,
                content: vec![OutputContent::OutputText {
                    text,
                    annotations: Vec::new(),
                }],
            },
        );
    }

    if response.finish_reason() == Some(FinishReason::MaxTokens) {
        out.status = ResponseStatus::Incomplete;
        out.incomplete_details = Some(IncompleteDetails {
            reason: "max_output_tokens".to_string(),
        });
    }

    out.usage = response.usage_metadata.as_ref().map(map_usage);
    out
}

pub fn map_usage(usage: &UsageMetadata) -> ResponseUsage {
    let input = usage.prompt_token_count.unwrap_or(0);
    let output = usage.candidates_token_count.unwrap_or(0);
    ResponseUsage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: usage.total_token_count.unwrap_or(input + output),
        input_tokens_details: usage.cached_content_token_count.map(|cached| {
            InputTokensDetails {
                cached_tokens: Some(cached),
            }
        }),
        output_tokens_details: usage.thoughts_token_count.map(|reasoning| {
            OutputTokensDetails {
                reasoning_tokens: Some(reasoning),
            }
        }),
    }
}
