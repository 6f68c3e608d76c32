use llmrelay_protocol::gemini::response::{GenerateContentResponse, UsageMetadata};
use llmrelay_protocol::openai::response::{AssistantMessage, ChatChoice, ChatCompletion};
use llmrelay_protocol::openai::types::{
    CompletionTokensDetails, FunctionCall, PromptTokensDetails, ToolCall, Usage,
};

use crate::chat::support::args_to_string;
use crate::ids;
use crate::reason;

/// Convert a Gemini generate-content response into an OpenAI chat completion.
pub fn transform_response(response: GenerateContentResponse) -> ChatCompletion {
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
                tool_calls.push(ToolCall {
                    id: call.id.clone().unwrap_or_else(ids::call_id),
                    r#type: "function".to_string(),
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: args_to_string(call.args.as_ref()),
                    },
                });
            }
        }
    }

    ChatCompletion {
        id: response
            .response_id
            .clone()
            .unwrap_or_else(ids::chat_completion_id),
        object: "chat.completion".to_string(),
        created: ids::unix_timestamp(),
        model: response
            .model_version
            .clone()
            .unwrap_or_default(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
            },
            finish_reason: response.finish_reason().map(reason::gemini_to_openai),
        }],
        usage: response.usage_metadata.as_ref().map(map_usage),
    }
}

pub fn map_usage(usage: &UsageMetadata) -> Usage {
    let prompt = usage.prompt_token_count.unwrap_or(0);
    let completion = usage.candidates_token_count.unwrap_or(0);
    Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: usage.total_token_count.unwrap_or(prompt + completion),
        prompt_tokens_details: usage.cached_content_token_count.map(|cached| {
            PromptTokensDetails {
                cached_tokens: Some(cached),
            }
        }),
        completion_tokens_details: usage.thoughts_token_count.map(|thoughts| {
            CompletionTokensDetails {
                reasoning_tokens: Some(thoughts),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::gemini::response::{Candidate, FinishReason as GeminiFinish};
    use llmrelay_protocol::gemini::types::{Content, Part};
    use llmrelay_protocol::openai::types::FinishReason;

    #[test]
    fn thought_parts_become_reasoning_content() {
        let response = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(vec![
                    Part::thought("pondering"),
                    Part::text("answer"),
                ])),
                finish_reason: Some(GeminiFinish::Stop),
                index: Some(0),
            }],
            usage_metadata: Some(UsageMetadata {
                prompt_token_count: Some(3),
                candidates_token_count: Some(5),
                total_token_count: Some(8),
                thoughts_token_count: Some(2),
                ..UsageMetadata::default()
            }),
            ..GenerateContentResponse::default()
        };
        let out = transform_response(response);
        let message = &out.choices[0].message;
        assert_eq!(message.content.as_deref(), Some("answer"));
        assert_eq!(message.reasoning_content.as_deref(), Some("pondering"));
        assert_eq!(out.choices[0].finish_reason, Some(FinishReason::Stop));
        let usage = out.usage.unwrap();
        assert_eq!(
            usage
                .completion_tokens_details
                .unwrap()
                .reasoning_tokens,
            Some(2)
        );
    }
}
