use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::types::{ContentBlock, StopReason, Usage as ClaudeUsage};
use llmrelay_protocol::json::parse_loose;
use llmrelay_protocol::openai_responses::response::{
    OutputContent, OutputItem, Response, ResponseStatus, ResponseUsage,
};

/// Convert a Responses result into a Claude message response.
pub fn transform_response(response: Response) -> MessageResponse {
    let mut out = MessageResponse::new(
        format!("msg_{}", response.id.trim_start_matches("resp_")),
        response.model.clone(),
    );

    let mut has_tool_use = false;
    for item in &response.output {
        match item {
            OutputItem::Message { content, .. } => {
                for part in content {
                    match part {
                        OutputContent::OutputText { text, .. } => {
                            if !text.is_empty() {
                                out.content.push(ContentBlock::Text { text: text.clone() });
                            }
                        }
                        OutputContent::Refusal { refusal } => {
                            out.content.push(ContentBlock::Text {
                                text: refusal.clone(),
                            });
                        }
                    }
                }
            }
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => {
                has_tool_use = true;
                out.content.push(ContentBlock::ToolUse {
                    id: call_id.clone(),
                    name: name.clone(),
                    input: parse_loose(arguments),
                });
            }
            OutputItem::Reasoning { .. } => {}
        }
    }

    out.stop_reason = Some(stop_reason_for(&response, has_tool_use));
    if let Some(usage) = &response.usage {
        out.usage = map_usage(usage);
    }
    out
}

pub fn stop_reason_for(response: &Response, has_tool_use: bool) -> StopReason {
    if response.status == ResponseStatus::Incomplete
        && response
            .incomplete_details
            .as_ref()
            .map(|details| details.reason == "max_output_tokens")
            .unwrap_or(false)
    {
        StopReason::MaxTokens
    } else if has_tool_use {
        StopReason::ToolUse
    } else {
        StopReason::EndTurn
    }
}

pub fn map_usage(usage: &ResponseUsage) -> ClaudeUsage {
    ClaudeUsage {
        input_tokens: Some(usage.input_tokens),
        output_tokens: Some(usage.output_tokens),
        cache_creation_input_tokens: None,
        cache_read_input_tokens: usage
            .input_tokens_details
            .as_ref()
            .and_then(|details| details.cached_tokens),
    }
}
