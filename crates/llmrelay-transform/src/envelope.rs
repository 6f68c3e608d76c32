use llmrelay_common::Protocol;
use llmrelay_protocol::claude;
use llmrelay_protocol::gemini;
use llmrelay_protocol::openai;
use llmrelay_protocol::openai_responses as responses;

/// A chat request in one of the four dialects. Gemini carries the model in
/// the URL path rather than the body, so its variant pairs the two.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatRequest {
    OpenAi(openai::request::ChatCompletionRequest),
    OpenAiResponses(responses::request::ResponsesRequest),
    Claude(claude::request::MessagesRequest),
    Gemini {
        model: String,
        request: gemini::request::GenerateContentRequest,
    },
}

impl ChatRequest {
    pub fn protocol(&self) -> Protocol {
        match self {
            ChatRequest::OpenAi(_) => Protocol::OpenAi,
            ChatRequest::OpenAiResponses(_) => Protocol::OpenAiResponses,
            ChatRequest::Claude(_) => Protocol::Claude,
            ChatRequest::Gemini { .. } => Protocol::Gemini,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ChatRequest::OpenAi(request) => &request.model,
            ChatRequest::OpenAiResponses(request) => &request.model,
            ChatRequest::Claude(request) => &request.model,
            ChatRequest::Gemini { model, .. } => model,
        }
    }

    pub fn is_stream(&self) -> bool {
        match self {
            ChatRequest::OpenAi(request) => request.stream.unwrap_or(false),
            ChatRequest::OpenAiResponses(request) => request.stream.unwrap_or(false),
            ChatRequest::Claude(request) => request.stream.unwrap_or(false),
            // Gemini signals streaming by endpoint, not body.
            ChatRequest::Gemini { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatResponse {
    OpenAi(openai::response::ChatCompletion),
    OpenAiResponses(responses::response::Response),
    Claude(claude::response::MessageResponse),
    Gemini(gemini::response::GenerateContentResponse),
}

impl ChatResponse {
    pub fn protocol(&self) -> Protocol {
        match self {
            ChatResponse::OpenAi(_) => Protocol::OpenAi,
            ChatResponse::OpenAiResponses(_) => Protocol::OpenAiResponses,
            ChatResponse::Claude(_) => Protocol::Claude,
            ChatResponse::Gemini(_) => Protocol::Gemini,
        }
    }
}

/// One streamed frame in one of the four dialects. A single upstream frame
/// may convert into zero, one, or many downstream frames.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    OpenAi(openai::stream::ChatCompletionChunk),
    OpenAiResponses(responses::stream::ResponseStreamEvent),
    Claude(claude::stream::StreamEvent),
    Gemini(gemini::response::GenerateContentResponse),
}

impl StreamPayload {
    pub fn protocol(&self) -> Protocol {
        match self {
            StreamPayload::OpenAi(_) => Protocol::OpenAi,
            StreamPayload::OpenAiResponses(_) => Protocol::OpenAiResponses,
            StreamPayload::Claude(_) => Protocol::Claude,
            StreamPayload::Gemini(_) => Protocol::Gemini,
        }
    }
}

/// Model listings. The Responses dialect shares OpenAI's wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelList {
    OpenAi(openai::models::ModelList),
    Claude(claude::models::ModelList),
    Gemini(gemini::models::ModelList),
}
