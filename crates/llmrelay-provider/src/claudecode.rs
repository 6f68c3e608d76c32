use std::path::PathBuf;

use base64::Engine;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::warn;

use llmrelay_common::{GatewayError, ProviderType, RelayResult};
use llmrelay_pool::CredentialMaterial;
use llmrelay_transform::{ChatRequest, ChatResponse, ModelList, StreamPayload};

use crate::adapter::{AdapterConfig, ChunkStream, ProviderAdapter, wrong_protocol};
use crate::claude::ANTHROPIC_VERSION;
use crate::client::{build_url, shared_client};
use crate::http_retry::{RetryPolicy, retry_request, sse_json_stream};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";
const OAUTH_CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
const OAUTH_BETA: &str = "oauth-2025-04-20";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OauthTokens {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Unix milliseconds.
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'static str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Tokens plus the generation they belong to; the generation advances on
/// every successful refresh so 401 handlers can tell whether the token they
/// saw rejected has already been rotated.
struct TokenState {
    tokens: OauthTokens,
    generation: u64,
}

/// OAuth-bearer adapter for Claude Code accounts. Token state lives in
/// memory for the adapter's lifetime; refreshes are single-flighted via the
/// token generation and written back to the credential file when one backs
/// the account.
pub struct ClaudeCodeAdapter {
    config: AdapterConfig,
    tokens: Mutex<Option<TokenState>>,
    credential_file: Option<PathBuf>,
    policy: RetryPolicy,
}

impl ClaudeCodeAdapter {
    pub fn new(config: AdapterConfig) -> RelayResult<Self> {
        let credential_file = match &config.credential {
            CredentialMaterial::OauthFile { path } => Some(path.clone()),
            CredentialMaterial::OauthBlob { .. } => None,
            _ => {
                return Err(GatewayError::InvalidConfig(
                    "claude-code accounts require oauth credentials".to_string(),
                ));
            }
        };
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
        };
        Ok(Self {
            config,
            tokens: Mutex::new(None),
            credential_file,
            policy,
        })
    }

    /// Near-expiry check. Missing or malformed expiry reads as "near", which
    /// forces a refresh instead of silently riding a stale token.
    fn is_expiry_near(&self, tokens: &OauthTokens) -> bool {
        let Some(expires_at) = tokens.expires_at else {
            return true;
        };
        let window = self.config.token_near_expiry.as_millis() as i64;
        let now = OffsetDateTime::now_utc().unix_timestamp() * 1000;
        expires_at <= now + window
    }

    async fn load_tokens(&self) -> RelayResult<OauthTokens> {
        match &self.config.credential {
            CredentialMaterial::OauthBlob { credentials } => {
                let raw = base64::engine::general_purpose::STANDARD
                    .decode(credentials.trim())
                    .map_err(|err| GatewayError::InvalidConfig(err.to_string()))?;
                serde_json::from_slice(&raw).map_err(GatewayError::from)
            }
            CredentialMaterial::OauthFile { path } => {
                let raw = tokio::fs::read(path).await?;
                serde_json::from_slice(&raw).map_err(GatewayError::from)
            }
            _ => Err(GatewayError::InvalidConfig(
                "claude-code accounts require oauth credentials".to_string(),
            )),
        }
    }

    /// Current access token plus its generation, refreshed when near expiry.
    async fn token(&self) -> RelayResult<(String, u64)> {
        let mut guard = self.tokens.lock().await;
        let state = self.ensure_loaded(&mut guard).await?;
        if self.is_expiry_near(&state.tokens) {
            self.refresh_locked(state).await?;
        }
        Ok((state.tokens.access_token.clone(), state.generation))
    }

    /// Refresh past `observed_generation`. A 401 handler names the
    /// generation of the rejected token; when another caller already rotated
    /// it while this one queued on the lock, the rotated token is reused
    /// instead of spending the now-stale refresh token again.
    async fn refresh_stale(&self, observed_generation: u64) -> RelayResult<String> {
        let mut guard = self.tokens.lock().await;
        let state = self.ensure_loaded(&mut guard).await?;
        if state.generation == observed_generation {
            self.refresh_locked(state).await?;
        }
        Ok(state.tokens.access_token.clone())
    }

    /// One forced rotation. The generation is observed before re-taking the
    /// lock, so concurrent rotations coalesce into a single refresh.
    async fn rotate(&self) -> RelayResult<String> {
        let observed = {
            let mut guard = self.tokens.lock().await;
            self.ensure_loaded(&mut guard).await?.generation
        };
        self.refresh_stale(observed).await
    }

    async fn ensure_loaded<'a>(
        &self,
        state: &'a mut Option<TokenState>,
    ) -> RelayResult<&'a mut TokenState> {
        if state.is_none() {
            *state = Some(TokenState {
                tokens: self.load_tokens().await?,
                generation: 0,
            });
        }
        state.as_mut().ok_or_else(|| {
            GatewayError::InvalidConfig("claude-code oauth state missing".to_string())
        })
    }

    async fn refresh_locked(&self, state: &mut TokenState) -> RelayResult<()> {
        let refresh_token = state.tokens.refresh_token.clone().ok_or_else(|| {
            GatewayError::AuthRejected("no refresh token available".to_string())
        })?;
        state.tokens = self.refresh_tokens(&refresh_token).await?;
        state.generation += 1;
        if let Some(path) = &self.credential_file {
            let body = serde_json::to_vec_pretty(&state.tokens)?;
            if let Err(err) = tokio::fs::write(path, body).await {
                warn!(event = "credential_write_failed", path = %path.display(), error = %err);
            }
        }
        Ok(())
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> RelayResult<OauthTokens> {
        let client = shared_client(self.config.use_system_proxy)?;
        let response = client
            .post(TOKEN_URL)
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token,
                client_id: OAUTH_CLIENT_ID,
            })
            .send()
            .await
            .map_err(|err| GatewayError::upstream(503, err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::AuthRejected(format!(
                "token refresh failed ({status}): {body}"
            )));
        }
        let payload: RefreshResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))?;
        let expires_at = payload.expires_in.map(|seconds| {
            (OffsetDateTime::now_utc().unix_timestamp() + seconds) * 1000
        });
        Ok(OauthTokens {
            access_token: payload.access_token,
            refresh_token: payload
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            expires_at,
        })
    }

    async fn post_messages(&self, body: &JsonValue) -> RelayResult<wreq::Response> {
        let client = shared_client(self.config.use_system_proxy)?;
        let url = build_url(
            self.config.endpoint.as_deref(),
            DEFAULT_BASE_URL,
            "/v1/messages",
        );
        let (token, generation) = self.token().await?;
        let token_cell = std::sync::Mutex::new(token);
        let cell = &token_cell;
        let this = self;
        retry_request(
            &self.policy,
            || {
                let token = cell.lock().map(|guard| guard.clone()).unwrap_or_default();
                client
                    .post(&url)
                    .header("Authorization", format!("Bearer {token}"))
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("anthropic-beta", OAUTH_BETA)
                    .header("Content-Type", "application/json")
                    .json(body)
                    .send()
            },
            move || async move {
                let refreshed = this.refresh_stale(generation).await?;
                if let Ok(mut guard) = cell.lock() {
                    *guard = refreshed;
                }
                Ok(())
            },
        )
        .await
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ClaudeCodeAdapter {
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
                        warn!(event = "chunk_skipped", provider = "claude-code", error = %err);
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
        let (token, _) = self.token().await?;
        let response = retry_request(
            &self.policy,
            || {
                client
                    .get(&url)
                    .header("Authorization", format!("Bearer {token}"))
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("anthropic-beta", OAUTH_BETA)
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
        self.rotate().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn adapter_with_tokens(tokens: &OauthTokens) -> ClaudeCodeAdapter {
        let blob = base64::engine::general_purpose::STANDARD
            .encode(serde_json::to_vec(tokens).unwrap());
        ClaudeCodeAdapter::new(AdapterConfig {
            provider_type: ProviderType::ClaudeCodeCustom,
            uuid: uuid::Uuid::new_v4(),
            endpoint: None,
            credential: CredentialMaterial::OauthBlob { credentials: blob },
            not_supported_models: HashSet::new(),
            use_system_proxy: false,
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            token_near_expiry: Duration::from_secs(600),
        })
        .unwrap()
    }

    fn adapter_with_expiry(expires_at: Option<i64>) -> (ClaudeCodeAdapter, OauthTokens) {
        let tokens = OauthTokens {
            access_token: "tok".to_string(),
            refresh_token: Some("ref".to_string()),
            expires_at,
        };
        (adapter_with_tokens(&tokens), tokens)
    }

    fn fresh_tokens_without_refresh() -> OauthTokens {
        OauthTokens {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Some((OffsetDateTime::now_utc().unix_timestamp() + 3600) * 1000),
        }
    }

    #[test]
    fn missing_expiry_counts_as_near() {
        let (adapter, tokens) = adapter_with_expiry(None);
        assert!(adapter.is_expiry_near(&tokens));
    }

    #[test]
    fn distant_expiry_is_not_near() {
        let future = (OffsetDateTime::now_utc().unix_timestamp() + 3600) * 1000;
        let (adapter, tokens) = adapter_with_expiry(Some(future));
        assert!(!adapter.is_expiry_near(&tokens));
    }

    #[test]
    fn expiry_inside_window_is_near() {
        let soon = (OffsetDateTime::now_utc().unix_timestamp() + 60) * 1000;
        let (adapter, tokens) = adapter_with_expiry(Some(soon));
        assert!(adapter.is_expiry_near(&tokens));
    }

    #[tokio::test]
    async fn blob_credentials_load() {
        let (adapter, _) = adapter_with_expiry(Some(0));
        let loaded = adapter.load_tokens().await.unwrap();
        assert_eq!(loaded.access_token, "tok");
        assert_eq!(loaded.refresh_token.as_deref(), Some("ref"));
    }

    #[tokio::test]
    async fn stale_generation_skips_redundant_refresh() {
        // No refresh token, so an actual refresh attempt errors; a 401
        // handler whose observed generation is no longer current must reuse
        // the already-rotated token instead.
        let adapter = adapter_with_tokens(&fresh_tokens_without_refresh());
        let (token, generation) = adapter.token().await.unwrap();
        assert_eq!(token, "tok");
        let token = adapter
            .refresh_stale(generation.wrapping_add(1))
            .await
            .unwrap();
        assert_eq!(token, "tok");
    }

    #[tokio::test]
    async fn current_generation_takes_the_refresh_path() {
        let adapter = adapter_with_tokens(&fresh_tokens_without_refresh());
        let (_, generation) = adapter.token().await.unwrap();
        assert!(adapter.refresh_stale(generation).await.is_err());
    }
}
