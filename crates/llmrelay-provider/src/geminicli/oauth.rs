use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{info, warn};

use llmrelay_common::{GatewayError, RelayResult};
use llmrelay_pool::CredentialMaterial;

use super::GeminiEnv;
use crate::client::shared_client;

const BROWSER_FLOW_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const BROWSER_FLOW_POLL: Duration = Duration::from_secs(2);
const ONBOARD_POLL: Duration = Duration::from_secs(2);
const ONBOARD_MAX_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct GoogleTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix milliseconds.
    #[serde(default)]
    pub expiry_date: Option<i64>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Serialize)]
struct RefreshForm<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Tokens plus the generation they belong to. The generation advances on
/// every successful refresh; callers that want a refresh must name the
/// generation they observed, so a refresh that already happened while they
/// queued on the lock is not repeated with a stale refresh token.
struct TokenState {
    tokens: GoogleTokens,
    generation: u64,
}

/// Google OAuth state for one code-assist account. The credential file is
/// co-owned: reads on first use, writes after every refresh.
pub(super) struct GoogleOauth {
    env: GeminiEnv,
    credential: CredentialMaterial,
    credential_file: Option<PathBuf>,
    near_window: Duration,
    use_system_proxy: bool,
    state: Mutex<Option<TokenState>>,
}

impl GoogleOauth {
    pub fn new(
        env: GeminiEnv,
        credential: CredentialMaterial,
        near_window: Duration,
        use_system_proxy: bool,
    ) -> RelayResult<Self> {
        let credential_file = match &credential {
            CredentialMaterial::OauthFile { path } => Some(path.clone()),
            CredentialMaterial::OauthBlob { .. } => None,
            _ => {
                return Err(GatewayError::InvalidConfig(
                    "code-assist accounts require oauth credentials".to_string(),
                ));
            }
        };
        Ok(Self {
            env,
            credential,
            credential_file,
            near_window,
            use_system_proxy,
            state: Mutex::new(None),
        })
    }

    /// True when the token expires within the configured window. A missing
    /// or malformed expiry is treated as near so a refresh gets forced
    /// rather than silently suppressed.
    pub fn is_expiry_near(&self, tokens: &GoogleTokens) -> bool {
        let Some(expiry) = tokens.expiry_date else {
            return true;
        };
        if expiry <= 0 {
            return true;
        }
        let now_millis = OffsetDateTime::now_utc().unix_timestamp() * 1000;
        expiry <= now_millis + self.near_window.as_millis() as i64
    }

    /// Current access token plus its generation. Refreshes eagerly when the
    /// token is near expiry (and a refresh token exists to spend).
    pub async fn token(&self) -> RelayResult<(String, u64)> {
        let mut guard = self.state.lock().await;
        let state = self.ensure_loaded(&mut guard).await?;
        if self.is_expiry_near(&state.tokens) && state.tokens.refresh_token.is_some() {
            self.refresh_locked(state).await?;
        }
        Ok((state.tokens.access_token.clone(), state.generation))
    }

    /// Refresh past `observed_generation`. A 401 handler names the
    /// generation of the token that was rejected; if another caller already
    /// rotated it while this one queued on the lock, the rotated token is
    /// reused instead of spending the now-stale refresh token again.
    pub async fn refresh_stale(&self, observed_generation: u64) -> RelayResult<String> {
        let mut guard = self.state.lock().await;
        let state = self.ensure_loaded(&mut guard).await?;
        if state.generation == observed_generation {
            self.refresh_locked(state).await?;
        }
        Ok(state.tokens.access_token.clone())
    }

    /// One forced rotation. The generation is observed before re-taking the
    /// lock, so concurrent rotations coalesce into a single refresh.
    pub async fn rotate(&self) -> RelayResult<String> {
        let observed = {
            let mut guard = self.state.lock().await;
            self.ensure_loaded(&mut guard).await?.generation
        };
        self.refresh_stale(observed).await
    }

    pub async fn cached_project_id(&self) -> Option<String> {
        self.state.lock().await.as_ref()?.tokens.project_id.clone()
    }

    pub async fn store_project_id(&self, project_id: &str) {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.as_mut() {
            state.tokens.project_id = Some(project_id.to_string());
            self.persist(&state.tokens).await;
        }
    }

    async fn ensure_loaded<'a>(
        &self,
        state: &'a mut Option<TokenState>,
    ) -> RelayResult<&'a mut TokenState> {
        if state.is_none() {
            *state = Some(TokenState {
                tokens: self.authenticate().await?,
                generation: 0,
            });
        }
        state.as_mut().ok_or_else(|| {
            GatewayError::InvalidConfig("google oauth state missing".to_string())
        })
    }

    async fn refresh_locked(&self, state: &mut TokenState) -> RelayResult<()> {
        let refresh_token = state.tokens.refresh_token.clone().ok_or_else(|| {
            GatewayError::AuthRejected("no refresh token available".to_string())
        })?;
        let project_id = state.tokens.project_id.clone();
        let mut refreshed = self.refresh(&refresh_token).await?;
        refreshed.project_id = refreshed.project_id.or(project_id);
        state.tokens = refreshed;
        state.generation += 1;
        self.persist(&state.tokens).await;
        Ok(())
    }

    async fn authenticate(&self) -> RelayResult<GoogleTokens> {
        match &self.credential {
            CredentialMaterial::OauthBlob { credentials } => {
                let raw = base64::engine::general_purpose::STANDARD
                    .decode(credentials.trim())
                    .map_err(|err| GatewayError::InvalidConfig(err.to_string()))?;
                serde_json::from_slice(&raw).map_err(GatewayError::from)
            }
            CredentialMaterial::OauthFile { path } => self.wait_for_credential_file(path).await,
            _ => Err(GatewayError::InvalidConfig(
                "code-assist accounts require oauth credentials".to_string(),
            )),
        }
    }

    /// The browser login flow finishes by writing the credential file; poll
    /// for it until the flow times out.
    async fn wait_for_credential_file(&self, path: &PathBuf) -> RelayResult<GoogleTokens> {
        let deadline = tokio::time::Instant::now() + BROWSER_FLOW_TIMEOUT;
        loop {
            match tokio::fs::read(path).await {
                Ok(raw) => return serde_json::from_slice(&raw).map_err(GatewayError::from),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(GatewayError::AuthRejected(format!(
                            "browser login did not complete: {} never appeared",
                            path.display()
                        )));
                    }
                    tokio::time::sleep(BROWSER_FLOW_POLL).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> RelayResult<GoogleTokens> {
        let client = shared_client(self.use_system_proxy)?;
        let response = client
            .post(self.env.token_url)
            .form(&RefreshForm {
                client_id: self.env.client_id,
                client_secret: self.env.client_secret,
                grant_type: "refresh_token",
                refresh_token,
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
        let expiry_date = payload
            .expires_in
            .map(|seconds| (OffsetDateTime::now_utc().unix_timestamp() + seconds) * 1000);
        info!(event = "oauth_refreshed", provider = self.env.name);
        Ok(GoogleTokens {
            access_token: payload.access_token,
            refresh_token: payload
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            expiry_date,
            project_id: None,
        })
    }

    async fn persist(&self, tokens: &GoogleTokens) {
        let Some(path) = &self.credential_file else {
            return;
        };
        match serde_json::to_vec_pretty(tokens) {
            Ok(body) => {
                if let Err(err) = tokio::fs::write(path, body).await {
                    warn!(event = "credential_write_failed", path = %path.display(), error = %err);
                }
            }
            Err(err) => warn!(event = "credential_encode_failed", error = %err),
        }
    }

    /// Project-ID discovery: `loadCodeAssist` first, then onboarding with
    /// the default tier, polling the long-running operation.
    pub async fn discover_project_id(&self, access_token: &str) -> RelayResult<String> {
        if let Some(project_id) = self.load_code_assist(access_token).await? {
            return Ok(project_id);
        }
        self.onboard_user(access_token).await
    }

    async fn load_code_assist(&self, access_token: &str) -> RelayResult<Option<String>> {
        let payload = self
            .post_internal(access_token, "loadCodeAssist", &client_metadata())
            .await?;
        Ok(payload
            .get("cloudaicompanionProject")
            .and_then(|value| value.as_str())
            .map(str::to_string))
    }

    async fn onboard_user(&self, access_token: &str) -> RelayResult<String> {
        let tier_id = self.default_tier(access_token).await;
        let body = serde_json::json!({
            "tierId": tier_id,
            "metadata": client_metadata()["metadata"],
        });
        for _ in 0..ONBOARD_MAX_ATTEMPTS {
            let payload = self.post_internal(access_token, "onboardUser", &body).await?;
            if payload.get("done").and_then(|value| value.as_bool()) == Some(true) {
                let project = payload
                    .get("response")
                    .and_then(|value| value.get("cloudaicompanionProject"));
                let project_id = project
                    .and_then(|value| value.get("id"))
                    .and_then(|value| value.as_str())
                    .map(str::to_string)
                    .or_else(|| {
                        project
                            .and_then(|value| value.as_str())
                            .map(str::to_string)
                    });
                return project_id.ok_or_else(|| {
                    GatewayError::InvalidConfig(
                        "onboarding finished without a project id".to_string(),
                    )
                });
            }
            tokio::time::sleep(ONBOARD_POLL).await;
        }
        Err(GatewayError::InvalidConfig(
            "project onboarding did not finish in time".to_string(),
        ))
    }

    async fn default_tier(&self, access_token: &str) -> String {
        let Ok(payload) = self
            .post_internal(access_token, "loadCodeAssist", &client_metadata())
            .await
        else {
            return "LEGACY".to_string();
        };
        payload
            .get("allowedTiers")
            .and_then(|value| value.as_array())
            .and_then(|tiers| {
                tiers.iter().find(|tier| {
                    tier.get("isDefault").and_then(|value| value.as_bool()) == Some(true)
                })
            })
            .and_then(|tier| tier.get("id"))
            .and_then(|value| value.as_str())
            .unwrap_or("LEGACY")
            .to_string()
    }

    async fn post_internal(
        &self,
        access_token: &str,
        method: &str,
        body: &serde_json::Value,
    ) -> RelayResult<serde_json::Value> {
        let client = shared_client(self.use_system_proxy)?;
        let url = format!(
            "{}/v1internal:{method}",
            self.env.base_url.trim_end_matches('/')
        );
        let response = client
            .post(url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("User-Agent", self.env.user_agent)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| GatewayError::upstream(503, err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::upstream(
                status,
                format!("{method} failed: {body}"),
            ));
        }
        response
            .json()
            .await
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

fn client_metadata() -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "ideType": "IDE_UNSPECIFIED",
            "platform": "PLATFORM_UNSPECIFIED",
            "pluginType": "GEMINI"
        }
    })
}
