use llmrelay_protocol::openai::response::{AssistantMessage, ChatChoice, ChatCompletion};
use llmrelay_protocol::openai::types::{
    CompletionTokensDetails, FinishReason, FunctionCall, PromptTokensDetails, ToolCall, Usage,
};
use llmrelay_protocol::openai_responses::response::{
    OutputContent, OutputItem, Response, ResponseStatus, ResponseUsage,
};

/// Convert a Responses result into an OpenAI chat completion.
pub fn transform_response(response: Response) -> ChatCompletion {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for item in &response.output {
        match item {
            OutputItem::Message { content, .. } => {
                for part in content {
                    match part {
                        OutputContent::OutputText { text: t, .. } => text.push_str(t),
                        OutputContent::Refusal { refusal } => text.push_str(refusal),
                    }
                }
            }
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => tool_calls.push(ToolCall {
                id: call_id.clone(),
                r#type: "function".to_string(),
                function: FunctionCall {
                    name: name.clone(),
                    arguments: arguments.clone(),
                },
            }),
            OutputItem::Reasoning { .. } => {}
        }
    }

    let finish_reason = finish_reason_for(&response, !tool_calls.is_empty());

    ChatCompletion {
        id: response.id.clone(),
        object: "chat.completion".to_string(),
        created: response.created_at,
        model: response.model.clone(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                reasoning_content: None,
            },
            finish_reason: Some(finish_reason),
        }],
        usage: response.usage.as_ref().map(map_usage),
    }
}

pub fn finish_reason_for(response: &Response, has_tool_calls: bool) -> FinishReason {
    if response.status == ResponseStatus::Incomplete
        && response
            .incomplete_details
            .as_ref()
            .map(|details| details.reason == "max_output_tokens")
            .unwrap_or(false)
    {
        FinishReason::Length
    } else if has_tool_calls {
        FinishReason::ToolCalls
    } else {
        FinishReason::Stop
    }
}

pub fn map_usage(usage: &ResponseUsage) -> Usage {
    Usage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
        prompt_tokens_details: usage
            .input_tokens_details
            .as_ref()
            .and_then(|details| details.cached_tokens)
            .map(|cached| PromptTokensDetails {
                cached_tokens: Some(cached),
            }),
        completion_tokens_details: usage
            .output_tokens_details
            .as_ref()
            .and_then(|details| details.reasoning_tokens)
            .map(|reasoning| CompletionTokensDetails {
                reasoning_tokens: Some(reasoning),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai_responses::response::IncompleteDetails;

    #[test]
    fn incomplete_token_limit_maps_to_length() {
        let mut response = Response::new("resp_1", "gpt-4o", 0);
        response.status = ResponseStatus::Incomplete;
        response.incomplete_details = Some(IncompleteDetails {
            reason: "max_output_tokens".to_string(),
        });
        response.output = vec![OutputItem::Message {
            id: "msg_1".to_string(),
            role: "assistant".to_string(),
            status: ResponseStatus::Completed,
            content: vec![OutputContent::OutputText {
                text: "cut".to_string(),
                annotations: Vec::new(),
            }],
        }];
        let out = transform_response(response);
        assert_eq!(out.choices[0].finish_reason, Some(FinishReason::Length));
        assert_eq!(out.choices[0].message.content.as_deref(), Some("cut"));
    }
}
