//! Dispatch over ordered protocol pairs.
//!
//! Identity pairs are rejected here; passing a payload through unchanged is
//! the caller's fast path, not a conversion.

use llmrelay_common::{GatewayError, Protocol, RelayResult};

use crate::chat;
use crate::chat::claude2openai::request::ReasoningOptions;
use crate::envelope::{ChatRequest, ChatResponse, ModelList, StreamPayload};
use crate::list_models;

/// Process-level knobs some conversions consult.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    pub reasoning_max_tokens: Option<u32>,
}

/// Convert a request into the target protocol's native shape.
pub fn convert_request(
    to: Protocol,
    request: ChatRequest,
    options: &TransformOptions,
) -> RelayResult<ChatRequest> {
    let from = request.protocol();
    match (request, to) {
        (ChatRequest::OpenAi(request), Protocol::Claude) => Ok(ChatRequest::Claude(
            chat::openai2claude::request::transform_request(request),
        )),
        (ChatRequest::OpenAi(request), Protocol::Gemini) => {
            let (model, request) = chat::openai2gemini::request::transform_request(request);
            Ok(ChatRequest::Gemini { model, request })
        }
        (ChatRequest::OpenAi(request), Protocol::OpenAiResponses) => Ok(
            ChatRequest::OpenAiResponses(chat::openai2responses::request::transform_request(
                request,
            )),
        ),
        (ChatRequest::Claude(request), Protocol::OpenAi) => Ok(ChatRequest::OpenAi(
            chat::claude2openai::request::transform_request(
                request,
                ReasoningOptions {
                    reasoning_max_tokens: options.reasoning_max_tokens,
                },
            ),
        )),
        (ChatRequest::Claude(request), Protocol::Gemini) => {
            let (model, request) = chat::claude2gemini::request::transform_request(request);
            Ok(ChatRequest::Gemini { model, request })
        }
        (ChatRequest::Claude(request), Protocol::OpenAiResponses) => Ok(
            ChatRequest::OpenAiResponses(chat::claude2responses::request::transform_request(
                request,
            )),
        ),
        (ChatRequest::Gemini { model, request }, Protocol::OpenAi) => Ok(ChatRequest::OpenAi(
            chat::gemini2openai::request::transform_request(model, request),
        )),
        (ChatRequest::Gemini { model, request }, Protocol::Claude) => Ok(ChatRequest::Claude(
            chat::gemini2claude::request::transform_request(model, request),
        )),
        (ChatRequest::Gemini { model, request }, Protocol::OpenAiResponses) => Ok(
            ChatRequest::OpenAiResponses(chat::gemini2responses::request::transform_request(
                model, request,
            )),
        ),
        (ChatRequest::OpenAiResponses(request), Protocol::OpenAi) => Ok(ChatRequest::OpenAi(
            chat::responses2openai::request::transform_request(request),
        )),
        (ChatRequest::OpenAiResponses(request), Protocol::Claude) => Ok(ChatRequest::Claude(
            chat::responses2claude::request::transform_request(request),
        )),
        (ChatRequest::OpenAiResponses(request), Protocol::Gemini) => {
            let (model, request) = chat::responses2gemini::request::transform_request(request);
            Ok(ChatRequest::Gemini { model, request })
        }
        _ => Err(GatewayError::unsupported_conversion(
            from.as_str(),
            to.as_str(),
        )),
    }
}

/// Convert an upstream response back into the client's protocol.
///
/// `model` is the id the client originally asked for; dialects that do not
/// echo a model in their response shape need it.
pub fn convert_response(
    to: Protocol,
    response: ChatResponse,
    model: &str,
) -> RelayResult<ChatResponse> {
    let from = response.protocol();
    match (response, to) {
        (ChatResponse::Claude(response), Protocol::OpenAi) => Ok(ChatResponse::OpenAi(
            chat::openai2claude::response::transform_response(response),
        )),
        (ChatResponse::Gemini(response), Protocol::OpenAi) => Ok(ChatResponse::OpenAi(
            chat::openai2gemini::response::transform_response(response),
        )),
        (ChatResponse::OpenAiResponses(response), Protocol::OpenAi) => Ok(ChatResponse::OpenAi(
            chat::openai2responses::response::transform_response(response),
        )),
        (ChatResponse::OpenAi(response), Protocol::Claude) => Ok(ChatResponse::Claude(
            chat::claude2openai::response::transform_response(response),
        )),
        (ChatResponse::Gemini(response), Protocol::Claude) => Ok(ChatResponse::Claude(
            chat::claude2gemini::response::transform_response(model, response),
        )),
        (ChatResponse::OpenAiResponses(response), Protocol::Claude) => Ok(ChatResponse::Claude(
            chat::claude2responses::response::transform_response(response),
        )),
        (ChatResponse::OpenAi(response), Protocol::Gemini) => Ok(ChatResponse::Gemini(
            chat::gemini2openai::response::transform_response(response),
        )),
        (ChatResponse::Claude(response), Protocol::Gemini) => Ok(ChatResponse::Gemini(
            chat::gemini2claude::response::transform_response(response),
        )),
        (ChatResponse::OpenAiResponses(response), Protocol::Gemini) => Ok(ChatResponse::Gemini(
            chat::gemini2responses::response::transform_response(response),
        )),
        (ChatResponse::OpenAi(response), Protocol::OpenAiResponses) => Ok(
            ChatResponse::OpenAiResponses(chat::responses2openai::response::transform_response(
                response,
            )),
        ),
        (ChatResponse::Claude(response), Protocol::OpenAiResponses) => Ok(
            ChatResponse::OpenAiResponses(chat::responses2claude::response::transform_response(
                response,
            )),
        ),
        (ChatResponse::Gemini(response), Protocol::OpenAiResponses) => Ok(
            ChatResponse::OpenAiResponses(chat::responses2gemini::response::transform_response(
                response,
            )),
        ),
        _ => Err(GatewayError::unsupported_conversion(
            from.as_str(),
            to.as_str(),
        )),
    }
}

enum Translator {
    ClaudeToOpenAi(chat::openai2claude::stream::ClaudeToOpenAiStream),
    GeminiToOpenAi(chat::openai2gemini::stream::GeminiToOpenAiStream),
    ResponsesToOpenAi(chat::openai2responses::stream::ResponsesToOpenAiStream),
    OpenAiToClaude(chat::claude2openai::stream::OpenAiToClaudeStream),
    GeminiToClaude(chat::claude2gemini::stream::GeminiToClaudeStream),
    ResponsesToClaude(chat::claude2responses::stream::ResponsesToClaudeStream),
    OpenAiToGemini(chat::gemini2openai::stream::OpenAiToGeminiStream),
    ClaudeToGemini(chat::gemini2claude::stream::ClaudeToGeminiStream),
    ResponsesToGemini(chat::gemini2responses::stream::ResponsesToGeminiStream),
    OpenAiToResponses(chat::responses2openai::stream::OpenAiToResponsesStream),
    ClaudeToResponses(chat::responses2claude::stream::ClaudeToResponsesStream),
    GeminiToResponses(chat::responses2gemini::stream::GeminiToResponsesStream),
}

/// Stateful stream translator for one upstream call. One upstream frame may
/// become zero, one, or many client frames.
pub struct StreamConverter {
    from: Protocol,
    to: Protocol,
    inner: Translator,
}

/// Build the converter translating upstream `from`-dialect frames into
/// client `to`-dialect frames.
pub fn stream_converter(from: Protocol, to: Protocol) -> RelayResult<StreamConverter> {
    use Protocol::*;
    let inner = match (from, to) {
        (Claude, OpenAi) => Translator::ClaudeToOpenAi(Default::default()),
        (Gemini, OpenAi) => Translator::GeminiToOpenAi(Default::default()),
        (OpenAiResponses, OpenAi) => Translator::ResponsesToOpenAi(Default::default()),
        (OpenAi, Claude) => Translator::OpenAiToClaude(Default::default()),
        (Gemini, Claude) => Translator::GeminiToClaude(Default::default()),
        (OpenAiResponses, Claude) => Translator::ResponsesToClaude(Default::default()),
        (OpenAi, Gemini) => Translator::OpenAiToGemini(Default::default()),
        (Claude, Gemini) => Translator::ClaudeToGemini(Default::default()),
        (OpenAiResponses, Gemini) => Translator::ResponsesToGemini(Default::default()),
        (OpenAi, OpenAiResponses) => Translator::OpenAiToResponses(Default::default()),
        (Claude, OpenAiResponses) => Translator::ClaudeToResponses(Default::default()),
        (Gemini, OpenAiResponses) => Translator::GeminiToResponses(Default::default()),
        _ => {
            return Err(GatewayError::unsupported_conversion(
                from.as_str(),
                to.as_str(),
            ));
        }
    };
    Ok(StreamConverter { from, to, inner })
}

impl StreamConverter {
    /// Feed one upstream frame; returns the client frames it expands to.
    pub fn push(&mut self, payload: StreamPayload) -> RelayResult<Vec<StreamPayload>> {
        let (from, to) = (self.from, self.to);
        let mismatch = move || GatewayError::unsupported_conversion(from.as_str(), to.as_str());
        match &mut self.inner {
            Translator::ClaudeToOpenAi(state) => {
                let StreamPayload::Claude(event) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_openai(state.transform_event(event)))
            }
            Translator::GeminiToOpenAi(state) => {
                let StreamPayload::Gemini(chunk) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_openai(state.transform_chunk(chunk)))
            }
            Translator::ResponsesToOpenAi(state) => {
                let StreamPayload::OpenAiResponses(event) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_openai(state.transform_event(event)))
            }
            Translator::OpenAiToClaude(state) => {
                let StreamPayload::OpenAi(chunk) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_claude(state.transform_chunk(chunk)))
            }
            Translator::GeminiToClaude(state) => {
                let StreamPayload::Gemini(chunk) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_claude(state.transform_chunk(chunk)))
            }
            Translator::ResponsesToClaude(state) => {
                let StreamPayload::OpenAiResponses(event) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_claude(state.transform_event(event)))
            }
            Translator::OpenAiToGemini(state) => {
                let StreamPayload::OpenAi(chunk) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_gemini(state.transform_chunk(chunk)))
            }
            Translator::ClaudeToGemini(state) => {
                let StreamPayload::Claude(event) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_gemini(state.transform_event(event)))
            }
            Translator::ResponsesToGemini(state) => {
                let StreamPayload::OpenAiResponses(event) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_gemini(state.transform_event(event)))
            }
            Translator::OpenAiToResponses(state) => {
                let StreamPayload::OpenAi(chunk) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_responses(state.transform_chunk(chunk)))
            }
            Translator::ClaudeToResponses(state) => {
                let StreamPayload::Claude(event) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_responses(state.transform_event(event)))
            }
            Translator::GeminiToResponses(state) => {
                let StreamPayload::Gemini(chunk) = payload else {
                    return Err(mismatch());
                };
                Ok(wrap_responses(state.transform_chunk(chunk)))
            }
        }
    }
}

fn wrap_openai(
    chunks: Vec<llmrelay_protocol::openai::stream::ChatCompletionChunk>,
) -> Vec<StreamPayload> {
    chunks.into_iter().map(StreamPayload::OpenAi).collect()
}

fn wrap_claude(events: Vec<llmrelay_protocol::claude::stream::StreamEvent>) -> Vec<StreamPayload> {
    events.into_iter().map(StreamPayload::Claude).collect()
}

fn wrap_gemini(
    chunks: Vec<llmrelay_protocol::gemini::response::GenerateContentResponse>,
) -> Vec<StreamPayload> {
    chunks.into_iter().map(StreamPayload::Gemini).collect()
}

fn wrap_responses(
    events: Vec<llmrelay_protocol::openai_responses::stream::ResponseStreamEvent>,
) -> Vec<StreamPayload> {
    events
        .into_iter()
        .map(StreamPayload::OpenAiResponses)
        .collect()
}

/// Convert a model listing. The Responses dialect shares OpenAI's shape, so
/// openai↔responses listings pass through unchanged.
pub fn convert_model_list(to: Protocol, list: ModelList) -> RelayResult<ModelList> {
    match (list, to) {
        (ModelList::OpenAi(list), Protocol::Claude) => {
            Ok(ModelList::Claude(list_models::openai_to_claude(list)))
        }
        (ModelList::OpenAi(list), Protocol::Gemini) => {
            Ok(ModelList::Gemini(list_models::openai_to_gemini(list)))
        }
        (ModelList::OpenAi(list), Protocol::OpenAi | Protocol::OpenAiResponses) => {
            Ok(ModelList::OpenAi(list))
        }
        (ModelList::Claude(list), Protocol::OpenAi | Protocol::OpenAiResponses) => {
            Ok(ModelList::OpenAi(list_models::claude_to_openai(list)))
        }
        (ModelList::Claude(list), Protocol::Gemini) => {
            Ok(ModelList::Gemini(list_models::claude_to_gemini(list)))
        }
        (ModelList::Claude(list), Protocol::Claude) => Ok(ModelList::Claude(list)),
        (ModelList::Gemini(list), Protocol::OpenAi | Protocol::OpenAiResponses) => {
            Ok(ModelList::OpenAi(list_models::gemini_to_openai(list)))
        }
        (ModelList::Gemini(list), Protocol::Claude) => {
            Ok(ModelList::Claude(list_models::gemini_to_claude(list)))
        }
        (ModelList::Gemini(list), Protocol::Gemini) => Ok(ModelList::Gemini(list)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::openai::request::ChatCompletionRequest;
    use llmrelay_protocol::openai::types::{ChatMessage, MessageContent};

    fn openai_request() -> ChatRequest {
        let mut request = ChatCompletionRequest::new("gpt-4o");
        request.messages = vec![ChatMessage::User {
            content: MessageContent::Text("Q".to_string()),
        }];
        ChatRequest::OpenAi(request)
    }

    #[test]
    fn identity_request_conversion_is_rejected() {
        let err = convert_request(
            Protocol::OpenAi,
            openai_request(),
            &TransformOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::UnsupportedConversion { .. }
        ));
    }

    #[test]
    fn every_cross_pair_request_converts() {
        for to in [Protocol::Claude, Protocol::Gemini, Protocol::OpenAiResponses] {
            let out = convert_request(to, openai_request(), &TransformOptions::default()).unwrap();
            assert_eq!(out.protocol(), to);
        }
    }

    #[test]
    fn stream_converter_rejects_identity() {
        assert!(stream_converter(Protocol::Claude, Protocol::Claude).is_err());
    }

    #[test]
    fn stream_converter_rejects_payload_mismatch() {
        let mut converter = stream_converter(Protocol::Claude, Protocol::OpenAi).unwrap();
        let payload = StreamPayload::Gemini(
            llmrelay_protocol::gemini::response::GenerateContentResponse::default(),
        );
        assert!(converter.push(payload).is_err());
    }
}
