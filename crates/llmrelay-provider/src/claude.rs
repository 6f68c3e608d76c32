use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tracing::warn;

use llmrelay_common::{GatewayError, ProviderType, RelayResult};
use llmrelay_pool::CredentialMaterial;
use llmrelay_transform::{ChatRequest, ChatResponse, ModelList, StreamPayload};

use crate::adapter::{AdapterConfig, ChunkStream, ProviderAdapter, wrong_protocol};
use crate::client::{build_url, shared_client};
use crate::http_retry::{RetryPolicy, retry_request, sse_json_stream};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

/// API-key adapter for Anthropic-compatible messages upstreams.
pub struct ClaudeAdapter {
    config: AdapterConfig,
    api_key: String,
    policy: RetryPolicy,
}

impl ClaudeAdapter {
    pub fn new(config: AdapterConfig) -> RelayResult<Self> {
        let CredentialMaterial::ApiKey { api_key } = &config.credential else {
            return Err(GatewayError::InvalidConfig(
                "claude accounts require an api key".to_string(),
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

    async fn post_messages(&self, body: &JsonValue) -> RelayResult<wreq::Response> {
        let client = shared_client(self.config.use_system_proxy)?;
        let url = build_url(
            self.config.endpoint.as_deref(),
            DEFAULT_BASE_URL,
            "/v1/messages",
        );
        retry_request(
            &self.policy,
            || {
                client
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
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
impl ProviderAdapter for ClaudeAdapter {
    fn provider_type(&self) -> ProviderType {
        self.config.provider_type
    }

    async fn generate(&self, model: &str, request: ChatRequest) -> RelayResult<ChatResponse> {
        let ChatRequest::Claude(mut request) = request else {
            return wrong_protocol(self.config.provider_type);
        };
        request.model = model.to_string();
        request.stream = None;
        let body = serde_json::to_value(&request)?;
        let response = self.post_messages(&body).await?;
        let message = response
            .json()
            .await
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))?;
        Ok(ChatResponse::Claude(message))
    }

    async fn stream(&self, model: &str, request: ChatRequest) -> RelayResult<ChunkStream> {
        let ChatRequest::Claude(mut request) = request else {
            return wrong_protocol(self.config.provider_type);
        };
        request.model = model.to_string();
        request.stream = Some(true);
        let body = serde_json::to_value(&request)?;
        let response = self.post_messages(&body).await?;

        let stream = sse_json_stream(response).filter_map(|item| async move {
            match item {
                Ok(value) => match serde_json::from_value(value) {
                    Ok(event) => Some(Ok(StreamPayload::Claude(event))),
                    Err(err) => {
                        warn!(event = "chunk_skipped", provider = "claude", error = %err);
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
        let url = build_url(self.config.endpoint.as_deref(), DEFAULT_BASE_URL, "/v1/models");
        let response = retry_request(
            &self.policy,
            || {
                client
                    .get(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .send()
            },
            || async { Ok(()) },
        )
        .await?;
        let list = response
            .json()
            .await
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))?;
        Ok(ModelList::Claude(list))
    }

    async fn refresh(&self) -> RelayResult<()> {
        Ok(())
    }
}
