use std::sync::Arc;

use llmrelay_common::Protocol;
use llmrelay_pool::{HealthProbe, ProbeOutcome, ProviderAccount};
use llmrelay_protocol::claude::request::MessagesRequest;
use llmrelay_protocol::claude::types::{MessageContent as ClaudeContent, MessageParam, Role};
use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::types::{Content, Part};
use llmrelay_protocol::openai::request::ChatCompletionRequest;
use llmrelay_protocol::openai::types::{ChatMessage, MessageContent};
use llmrelay_protocol::openai_responses::request::{ResponseInput, ResponsesRequest};
use llmrelay_provider::AdapterSource;
use llmrelay_transform::ChatRequest;

const PROBE_TEXT: &str = "Hi";
const PROBE_MAX_TOKENS: u32 = 32;

/// Health probe backed by the adapter factory: builds a minimal generate
/// call in the account's native dialect and reports the outcome. Probe
/// shapes are tried in order; the first success wins.
pub struct AdapterHealthProbe {
    adapters: Arc<dyn AdapterSource>,
}

impl AdapterHealthProbe {
    pub fn new(adapters: Arc<dyn AdapterSource>) -> Self {
        Self { adapters }
    }
}

#[async_trait::async_trait]
impl HealthProbe for AdapterHealthProbe {
    async fn probe(&self, account: &ProviderAccount, model: &str) -> ProbeOutcome {
        let adapter = match self.adapters.adapter(account).await {
            Ok(adapter) => adapter,
            Err(err) => {
                return ProbeOutcome::failure(model, err.to_string(), err.status_code());
            }
        };

        let mut last_error = None;
        for request in probe_requests(account.provider_type.protocol(), model) {
            match adapter.generate(model, request).await {
                Ok(_) => return ProbeOutcome::success(model),
                Err(err) => {
                    last_error = Some((err.to_string(), err.status_code()));
                }
            }
        }
        let (message, status) =
            last_error.unwrap_or_else(|| ("no probe shape available".to_string(), None));
        ProbeOutcome::failure(model, message, status)
    }
}

fn probe_requests(protocol: Protocol, model: &str) -> Vec<ChatRequest> {
    match protocol {
        Protocol::OpenAi => {
            let mut request = ChatCompletionRequest::new(model);
            request.messages = vec![ChatMessage::User {
                content: MessageContent::Text(PROBE_TEXT.to_string()),
            }];
            request.max_tokens = Some(PROBE_MAX_TOKENS);
            vec![ChatRequest::OpenAi(request)]
        }
        Protocol::OpenAiResponses => {
            let mut request =
                ResponsesRequest::new(model, ResponseInput::Text(PROBE_TEXT.to_string()));
            request.max_output_tokens = Some(PROBE_MAX_TOKENS);
            vec![ChatRequest::OpenAiResponses(request)]
        }
        Protocol::Claude => {
            let mut request = MessagesRequest::new(model, PROBE_MAX_TOKENS);
            request.messages = vec![MessageParam {
                role: Role::User,
                content: ClaudeContent::Text(PROBE_TEXT.to_string()),
            }];
            vec![ChatRequest::Claude(request)]
        }
        Protocol::Gemini => {
            let request = GenerateContentRequest {
                contents: vec![Content::user(vec![Part::text(PROBE_TEXT)])],
                ..GenerateContentRequest::default()
            };
            vec![ChatRequest::Gemini {
                model: model.to_string(),
                request,
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_bodies_match_native_shapes() {
        let openai = probe_requests(Protocol::OpenAi, "gpt-4o-mini");
        assert!(matches!(&openai[0], ChatRequest::OpenAi(r) if r.model == "gpt-4o-mini"));

        let gemini = probe_requests(Protocol::Gemini, "gemini-2.5-flash");
        let ChatRequest::Gemini { request, .. } = &gemini[0] else {
            panic!("expected gemini request");
        };
        assert_eq!(request.contents[0].parts[0].text.as_deref(), Some("Hi"));
        assert_eq!(request.contents[0].role.as_deref(), Some("user"));
    }
}
