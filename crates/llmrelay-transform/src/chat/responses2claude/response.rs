use llmrelay_protocol::claude::response::MessageResponse;
use llmrelay_protocol::claude::types::{ContentBlock, StopReason, Usage as ClaudeUsage};
use llmrelay_protocol::openai_responses::response::{
    IncompleteDetails, InputTokensDetails, OutputContent, OutputItem, Response, ResponseStatus,
    ResponseUsage,
};

use crate::chat::support::args_to_string;
use crate::ids;

/// Convert a Claude message response into a Responses result.
pub fn transform_response(message: MessageResponse) -> Response {
    let mut response = Response::new(
        format!("resp_{}", message.id.trim_start_matches("msg_")),
        message.model.clone(),
        ids::unix_timestamp(),
    );
    response.status = ResponseStatus::Completed;

    let mut text = String::new();
    for block in &message.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::ToolUse { id, name, input } => {
                response.output.push(OutputItem::FunctionCall {
                    id: format!("fc_{}", id.trim_start_matches("toolu_")),
                    call_id: id.clone(),
                    name: name.clone(),
                    arguments: args_to_string(Some(input)),
                    status: ResponseStatus::Completed,
                });
            }
            _ => {}
        }
    }
    if !text.is_empty() {
        response.output.insert(
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

    if message.stop_reason == Some(StopReason::MaxTokens) {
        response.status = ResponseStatus::Incomplete;
        response.incomplete_details = Some(IncompleteDetails {
            reason: "max_output_tokens".to_string(),
        });
    }

    response.usage = Some(map_usage(&message.usage));
    response
}

pub fn map_usage(usage: &ClaudeUsage) -> ResponseUsage {
    let input = usage.input_tokens.unwrap_or(0);
    let output = usage.output_tokens.unwrap_or(0);
    ResponseUsage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: input + output,
        input_tokens_details: usage.cache_read_input_tokens.map(|cached| {
            InputTokensDetails {
                cached_tokens: Some(cached),
            }
        }),
        output_tokens_details: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_tokens_stop_marks_incomplete() {
        let mut message = MessageResponse::new("msg_5", "claude-3-5-sonnet");
        message.content = vec![ContentBlock::Text {
            text: "cut short".to_string(),
        }];
        message.stop_reason = Some(StopReason::MaxTokens);
        let out = transform_response(message);
        assert_eq!(out.status, ResponseStatus::Incomplete);
        assert!(matches!(
            &out.output[0],
            OutputItem::Message { content, .. }
                if matches!(&content[0], OutputContent::OutputText { text, .. } if text == "cut short")
        ));
    }
}
