use std::collections::HashSet;
use std::pin::Pin;
use std::time::Duration;

use futures_util::Stream;

use llmrelay_common::{AccountUuid, GatewayConfig, ProviderType, RelayResult};
use llmrelay_pool::{CredentialMaterial, ProviderAccount};
use llmrelay_transform::{ChatRequest, ChatResponse, ModelList, StreamPayload};

use crate::usage::QuotaReporter;

/// Finite, non-restartable sequence of native-protocol frames.
pub type ChunkStream = Pin<Box<dyn Stream<Item = RelayResult<StreamPayload>> + Send>>;

/// Everything an adapter needs to talk to one upstream account.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub provider_type: ProviderType,
    pub uuid: AccountUuid,
    pub endpoint: Option<String>,
    pub credential: CredentialMaterial,
    pub not_supported_models: HashSet<String>,
    pub use_system_proxy: bool,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub token_near_expiry: Duration,
}

impl AdapterConfig {
    pub fn from_account(account: &ProviderAccount, config: &GatewayConfig) -> Self {
        let use_system_proxy = match account.provider_type.protocol() {
            llmrelay_common::Protocol::Gemini => config.use_system_proxy_gemini,
            llmrelay_common::Protocol::Claude => config.use_system_proxy_claude,
            _ => config.use_system_proxy_openai,
        };
        Self {
            provider_type: account.provider_type,
            uuid: account.uuid,
            endpoint: account.endpoint.clone(),
            credential: account.credential.clone(),
            not_supported_models: account.not_supported_models.clone(),
            use_system_proxy,
            max_retries: config.request_max_retries,
            base_delay: config.request_base_delay,
            token_near_expiry: config.token_near_expiry,
        }
    }
}

/// Uniform surface over heterogeneous upstreams. Requests and responses
/// cross in the adapter's native dialect; translation is the caller's duty.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    async fn generate(&self, model: &str, request: ChatRequest) -> RelayResult<ChatResponse>;

    async fn stream(&self, model: &str, request: ChatRequest) -> RelayResult<ChunkStream>;

    async fn list_models(&self) -> RelayResult<ModelList>;

    /// Force a credential refresh. A no-op for static API keys.
    async fn refresh(&self) -> RelayResult<()>;

    /// Quota reporting, on the adapters whose upstream exposes it.
    fn quota(&self) -> Option<&dyn QuotaReporter> {
        None
    }
}

/// Reject payloads that arrived in a foreign dialect.
pub(crate) fn wrong_protocol<T>(expected: ProviderType) -> RelayResult<T> {
    Err(llmrelay_common::GatewayError::InvalidConfig(format!(
        "request is not in the native protocol of {expected}"
    )))
}
