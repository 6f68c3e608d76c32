mod continuation;
mod oauth;
mod usage;

use std::sync::Arc;

use futures_util::StreamExt;
use rand::RngCore;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use llmrelay_common::{GatewayError, ProviderType, RelayResult, known_models};
use llmrelay_protocol::gemini::request::GenerateContentRequest;
use llmrelay_protocol::gemini::response::GenerateContentResponse;
use llmrelay_transform::{ChatRequest, ChatResponse, ModelList, StreamPayload};

use crate::adapter::{AdapterConfig, ChunkStream, ProviderAdapter, wrong_protocol};
use crate::client::shared_client;
use crate::http_retry::{RetryPolicy, retry_request, sse_json_stream};
use crate::usage::QuotaReporter;

use oauth::GoogleOauth;

/// Endpoint family + OAuth client for one code-assist flavor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GeminiEnv {
    pub name: &'static str,
    pub base_url: &'static str,
    pub user_agent: &'static str,
    pub token_url: &'static str,
    pub client_id: &'static str,
    pub client_secret: &'static str,
}

pub(crate) const GEMINI_CLI_ENV: GeminiEnv = GeminiEnv {
    name: "gemini-cli",
    base_url: "https://cloudcode-pa.googleapis.com",
    user_agent: "GeminiCLI/0.1.5 (Linux; x86_64)",
    token_url: "https://oauth2.googleapis.com/token",
    client_id: "681255809395-oo8ft2oprdrnp9e3aqf6av3hmdib135j.apps.googleusercontent.com",
    client_secret: "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",
};

/// Adapter for Gemini code-assist accounts (`/v1internal:{method}` wire
/// format, OAuth bearer auth, project-scoped request envelope). Cloning
/// shares the OAuth state, so in-memory tokens survive across calls.
#[derive(Clone)]
pub struct GeminiCliAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    config: AdapterConfig,
    env: GeminiEnv,
    oauth: GoogleOauth,
    policy: RetryPolicy,
}

impl GeminiCliAdapter {
    pub fn new(config: AdapterConfig) -> RelayResult<Self> {
        Self::with_env(config, GEMINI_CLI_ENV)
    }

    pub(crate) fn with_env(config: AdapterConfig, env: GeminiEnv) -> RelayResult<Self> {
        let oauth = GoogleOauth::new(
            env,
            config.credential.clone(),
            config.token_near_expiry,
            config.use_system_proxy,
        )?;
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                env,
                oauth,
                policy,
            }),
        })
    }

    pub(crate) fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    fn base_url(&self) -> String {
        self.inner
            .config
            .endpoint
            .as_deref()
            .unwrap_or(self.inner.env.base_url)
            .trim_end_matches('/')
            .to_string()
    }

    async fn project_id(&self) -> RelayResult<String> {
        if let Some(project_id) = self.inner.oauth.cached_project_id().await
            && !project_id.trim().is_empty()
        {
            return Ok(project_id);
        }
        let (access_token, _) = self.inner.oauth.token().await?;
        let project_id = self.inner.oauth.discover_project_id(&access_token).await?;
        info!(event = "project_discovered", provider = self.inner.env.name, project = %project_id);
        self.inner.oauth.store_project_id(&project_id).await;
        Ok(project_id)
    }

    fn wrap_request(
        &self,
        model: &str,
        project_id: &str,
        request: &GenerateContentRequest,
    ) -> RelayResult<JsonValue> {
        Ok(serde_json::json!({
            "model": model,
            "project": project_id,
            "user_prompt_id": user_prompt_id(),
            "request": serde_json::to_value(request)?,
        }))
    }

    pub(crate) async fn post_internal(
        &self,
        path: &str,
        body: &JsonValue,
    ) -> RelayResult<wreq::Response> {
        let client = shared_client(self.inner.config.use_system_proxy)?;
        let url = format!("{}{path}", self.base_url());
        let (token, generation) = self.inner.oauth.token().await?;
        let token_cell = std::sync::Mutex::new(token);
        let cell = &token_cell;
        let oauth = &self.inner.oauth;
        let user_agent = self.inner.env.user_agent;
        retry_request(
            &self.inner.policy,
            || {
                let token = cell.lock().map(|guard| guard.clone()).unwrap_or_default();
                client
                    .post(&url)
                    .header("Authorization", format!("Bearer {token}"))
                    .header("User-Agent", user_agent)
                    .header("Content-Type", "application/json")
                    .json(body)
                    .send()
            },
            move || async move {
                let refreshed = oauth.refresh_stale(generation).await?;
                if let Ok(mut guard) = cell.lock() {
                    *guard = refreshed;
                }
                Ok(())
            },
        )
        .await
    }

    async fn stream_once(
        &self,
        model: &str,
        project_id: &str,
        request: &GenerateContentRequest,
    ) -> RelayResult<wreq::Response> {
        let body = self.wrap_request(model, project_id, request)?;
        self.post_internal("/v1internal:streamGenerateContent?alt=sse", &body)
            .await
    }

    /// Decode an SSE response into typed generate-content chunks; events
    /// that fail to parse are logged and dropped.
    fn typed_stream(&self, response: wreq::Response) -> continuation::GeminiStream {
        let provider_name = self.inner.env.name;
        let stream = sse_json_stream(response).filter_map(move |item| async move {
            match item {
                Ok(value) => {
                    match serde_json::from_value::<GenerateContentResponse>(unwrap_internal(value))
                    {
                        Ok(chunk) => Some(Ok(chunk)),
                        Err(err) => {
                            warn!(event = "chunk_skipped", provider = provider_name, error = %err);
                            None
                        }
                    }
                }
                Err(err) => Some(Err(err)),
            }
        });
        Box::pin(stream)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiCliAdapter {
    fn provider_type(&self) -> ProviderType {
        self.inner.config.provider_type
    }

    async fn generate(&self, model: &str, request: ChatRequest) -> RelayResult<ChatResponse> {
        let ChatRequest::Gemini { mut request, .. } = request else {
            return wrong_protocol(self.inner.config.provider_type);
        };
        request.normalize_roles();
        let model = strip_anti_prefix(model);
        let project_id = self.project_id().await?;
        let body = self.wrap_request(model, &project_id, &request)?;
        let response = self.post_internal("/v1internal:generateContent", &body).await?;
        let payload: JsonValue = response
            .json()
            .await
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))?;
        let parsed: GenerateContentResponse = serde_json::from_value(unwrap_internal(payload))
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))?;
        Ok(ChatResponse::Gemini(parsed))
    }

    async fn stream(&self, model: &str, request: ChatRequest) -> RelayResult<ChunkStream> {
        let ChatRequest::Gemini { mut request, .. } = request else {
            return wrong_protocol(self.inner.config.provider_type);
        };
        request.normalize_roles();
        let anti_truncation = model.starts_with("anti-");
        let model = strip_anti_prefix(model).to_string();
        let project_id = self.project_id().await?;

        // The first upstream call happens before any chunk is handed out so
        // connection errors surface as a plain error, not a broken stream.
        let first = self.stream_once(&model, &project_id, &request).await?;
        let first = self.typed_stream(first);

        let this = self.clone();
        let continuation_model = model.clone();
        let call: continuation::StreamCall = Box::new(move |next| {
            let this = this.clone();
            let model = continuation_model.clone();
            let project_id = project_id.clone();
            Box::pin(async move {
                let response = this.stream_once(&model, &project_id, &next).await?;
                Ok(this.typed_stream(response))
            })
        });

        let stream = continuation::run_with_continuation(first, request, anti_truncation, call)
            .map(|item| item.map(StreamPayload::Gemini));
        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> RelayResult<ModelList> {
        // Code-assist has no public model-list endpoint; serve the known set.
        let models = known_models(self.inner.config.provider_type)
            .iter()
            .map(|id| llmrelay_protocol::gemini::models::ModelInfo {
                name: format!("models/{id}"),
                ..llmrelay_protocol::gemini::models::ModelInfo::default()
            })
            .collect();
        Ok(ModelList::Gemini(llmrelay_protocol::gemini::models::ModelList {
            models,
            next_page_token: None,
        }))
    }

    async fn refresh(&self) -> RelayResult<()> {
        self.inner.oauth.rotate().await.map(|_| ())
    }

    fn quota(&self) -> Option<&dyn QuotaReporter> {
        Some(self)
    }
}

/// v1internal responses nest the standard payload under `response`.
fn unwrap_internal(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(mut map) if map.contains_key("response") => {
            map.remove("response").unwrap_or(JsonValue::Null)
        }
        other => other,
    }
}

fn strip_anti_prefix(model: &str) -> &str {
    model.strip_prefix("anti-").unwrap_or(model)
}

fn user_prompt_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
