use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use llmrelay_common::{AccountUuid, GatewayConfig, ProviderType, RelayResult};
use llmrelay_pool::ProviderAccount;

use crate::adapter::{AdapterConfig, ProviderAdapter};
use crate::antigravity::new_antigravity_adapter;
use crate::claude::ClaudeAdapter;
use crate::claudecode::ClaudeCodeAdapter;
use crate::geminicli::GeminiCliAdapter;
use crate::openai::OpenAiAdapter;
use crate::responses::ResponsesAdapter;

/// Something that can hand out an adapter for an account. The orchestrator
/// depends on this rather than on the concrete factory.
#[async_trait::async_trait]
pub trait AdapterSource: Send + Sync {
    async fn adapter(&self, account: &ProviderAccount) -> RelayResult<Arc<dyn ProviderAdapter>>;
}

/// Process-wide cache keyed by `(providerType, uuid)`. Adapter identity is
/// stable across requests, which is what lets OAuth tokens live in memory.
pub struct AdapterFactory {
    config: GatewayConfig,
    cache: RwLock<HashMap<(ProviderType, AccountUuid), Arc<dyn ProviderAdapter>>>,
}

impl AdapterFactory {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn construct(&self, account: &ProviderAccount) -> RelayResult<Arc<dyn ProviderAdapter>> {
        let config = AdapterConfig::from_account(account, &self.config);
        Ok(match account.provider_type {
            ProviderType::OpenAiCustom => Arc::new(OpenAiAdapter::new(config)?),
            ProviderType::OpenAiResponsesCustom => Arc::new(ResponsesAdapter::new(config)?),
            ProviderType::ClaudeCustom => Arc::new(ClaudeAdapter::new(config)?),
            ProviderType::ClaudeCodeCustom => Arc::new(ClaudeCodeAdapter::new(config)?),
            ProviderType::GeminiCliOauth => Arc::new(GeminiCliAdapter::new(config)?),
            ProviderType::GeminiAntigravity => Arc::new(new_antigravity_adapter(config)?),
        })
    }
}

#[async_trait::async_trait]
impl AdapterSource for AdapterFactory {
    async fn adapter(&self, account: &ProviderAccount) -> RelayResult<Arc<dyn ProviderAdapter>> {
        let key = (account.provider_type, account.uuid);
        if let Some(adapter) = self.cache.read().await.get(&key) {
            return Ok(adapter.clone());
        }
        let mut cache = self.cache.write().await;
        // Double-check: another task may have built it while we waited.
        if let Some(adapter) = cache.get(&key) {
            return Ok(adapter.clone());
        }
        let adapter = self.construct(account)?;
        cache.insert(key, adapter.clone());
        Ok(adapter)
    }
}
