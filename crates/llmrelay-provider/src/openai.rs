use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tracing::warn;

use llmrelay_common::{GatewayError, ProviderType, RelayResult};
use llmrelay_pool::CredentialMaterial;
use llmrelay_transform::{ChatRequest, ChatResponse, ModelList, StreamPayload};

use crate::adapter::{AdapterConfig, ChunkStream, ProviderAdapter, wrong_protocol};
use crate::client::{build_url, shared_client};
use crate::http_retry::{RetryPolicy, retry_request, sse_json_stream};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Plain API-key adapter for OpenAI-compatible chat-completions upstreams.
pub struct OpenAiAdapter {
    config: AdapterConfig,
    api_key: String,
    policy: RetryPolicy,
}

impl OpenAiAdapter {
    pub fn new(config: AdapterConfig) -> RelayResult<Self> {
        let CredentialMaterial::ApiKey { api_key } = &config.credential else {
            return Err(GatewayError::InvalidConfig(
                "openai accounts require an api key".to_string(),
            ));
        };
        let api_key = api_key.clone();
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
        };
        Ok(Self {
            config,
            api_key,
            policy,
        })
    }

    fn url(&self, path: &str) -> String {
        build_url(self.config.endpoint.as_deref(), DEFAULT_BASE_URL, path)
    }

    async fn post_json(&self, path: &str, body: &JsonValue) -> RelayResult<wreq::Response> {
        let client = shared_client(self.config.use_system_proxy)?;
        let url = self.url(path);
        retry_request(
            &self.policy,
            || {
                client
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .json(body)
                    .send()
            },
            || async { Ok(()) },
        )
        .await
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider_type(&self) -> ProviderType {
        self.config.provider_type
    }

    async fn generate(&self, model: &str, request: ChatRequest) -> RelayResult<ChatResponse> {
        let ChatRequest::OpenAi(mut request) = request else {
            return wrong_protocol(self.config.provider_type);
        };
        request.model = model.to_string();
        request.stream = None;
        let body = serde_json::to_value(&request)?;
        let response = self.post_json("/v1/chat/completions", &body).await?;
        let completion = response
            .json()
            .await
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))?;
        Ok(ChatResponse::OpenAi(completion))
    }

    async fn stream(&self, model: &str, request: ChatRequest) -> RelayResult<ChunkStream> {
        let ChatRequest::OpenAi(mut request) = request else {
            return wrong_protocol(self.config.provider_type);
        };
        request.model = model.to_string();
        request.stream = Some(true);
        request.stream_options = Some(llmrelay_protocol::openai::request::StreamOptions {
            include_usage: Some(true),
        });
        let body = serde_json::to_value(&request)?;
        let response = self.post_json("/v1/chat/completions", &body).await?;

        let stream = sse_json_stream(response).filter_map(|item| async move {
            match item {
                Ok(value) => match serde_json::from_value(value) {
                    Ok(chunk) => Some(Ok(StreamPayload::OpenAi(chunk))),
                    Err(err) => {
                        warn!(event = "chunk_skipped", provider = "openai", error = %err);
                        None
                    }
                },
                Err(err) => Some(Err(err)),
            }
        });
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> RelayResult<ModelList> {
        let client = shared_client(self.config.use_system_proxy)?;
        let url = self.url("/v1/models");
        let response = retry_request(
            &self.policy,
            || {
                client
                    .get(&url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .send()
            },
            || async { Ok(()) },
        )
        .await?;
        let list = response
            .json()
            .await
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))?;
        Ok(ModelList::OpenAi(list))
    }

    async fn refresh(&self) -> RelayResult<()> {
        Ok(())
    }
}
