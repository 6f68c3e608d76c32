use llmrelay_protocol::openai::response::ChatCompletion;
use llmrelay_protocol::openai::types::{FinishReason, Usage};
use llmrelay_protocol::openai_responses::response::{
    IncompleteDetails, InputTokensDetails, OutputContent, OutputItem, OutputTokensDetails,
    Response, ResponseStatus, ResponseUsage,
};

use crate::ids;

/// Convert an OpenAI chat completion into a Responses result.
pub fn transform_response(completion: ChatCompletion) -> Response {
    let mut response = Response::new(
        format!("resp_{}", completion.id.trim_start_matches("chatcmpl-")),
        completion.model.clone(),
        completion.created,
    );
    response.status = ResponseStatus::Completed;

    if let Some(choice) = completion.choices.into_iter().next() {
        if let Some(text) = choice.message.content
            && !text.is_empty()
        {
            response.output.push(OutputItem::Message {
                id: ids::message_id(),
                role: "assistant".to_string(),
                status: ResponseStatus::Completed,
                content: vec![OutputContent::OutputText {
                    text,
                    annotations: Vec::new(),
                }],
            });
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            response.output.push(OutputItem::FunctionCall {
                id: format!("fc_{}", call.id.trim_start_matches("call_")),
                call_id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
                status: ResponseStatus::Completed,
            });
        }
        if choice.finish_reason == Some(FinishReason::Length) {
            response.status = ResponseStatus::Incomplete;
            response.incomplete_details = Some(IncompleteDetails {
                reason: "max_output_tokens".to_string(),
            });
        }
    }

    response.usage = completion.usage.as_ref().map(map_usage);
    response
}

pub fn map_usage(usage: &Usage) -> ResponseUsage {
    ResponseUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        input_tokens_details: usage
            .prompt_tokens_details
            .as_ref()
            .and_then(|details| details.cached_tokens)
            .map(|cached| InputTokensDetails {
                cached_tokens: Some(cached),
            }),
        output_tokens_details: usage
            .completion_tokens_details
            .as_ref()
            .and_then(|details| details.reasoning_tokens)
            .map(|reasoning| OutputTokensDetails {
                reasoning_tokens: Some(reasoning),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai::response::{AssistantMessage, ChatChoice};

    #[test]
    fn length_finish_marks_incomplete() {
        let completion = ChatCompletion {
            id: "chatcmpl-7".to_string(),
            object: "chat.completion".to_string(),
            created: 5,
            model: "gpt-4o".to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: AssistantMessage::text("partial"),
                finish_reason: Some(FinishReason::Length),
            }],
            usage: None,
        };
        let out = transform_response(completion);
        assert_eq!(out.status, ResponseStatus::Incomplete);
        assert_eq!(out.id, "resp_7");
        assert_eq!(out.created_at, 5);
    }
}
