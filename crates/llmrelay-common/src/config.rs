use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ProviderType;

/// Knobs driving the pool manager's health and persistence machinery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    pub max_error_count: u32,
    pub health_check_interval: Duration,
    pub save_debounce_time: Duration,
    pub quick_retry_interval: Duration,
    pub quick_retry_max_count: u32,
    pub rate_limit_health_check_interval: Duration,
    pub standard_health_check_interval: Duration,
    pub auto_health_check_enabled: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_error_count: 3,
            health_check_interval: Duration::from_secs(10 * 60),
            save_debounce_time: Duration::from_secs(1),
            quick_retry_interval: Duration::from_secs(10),
            quick_retry_max_count: 3,
            rate_limit_health_check_interval: Duration::from_secs(3 * 60 * 60),
            standard_health_check_interval: Duration::from_secs(3 * 60 * 60),
            auto_health_check_enabled: true,
        }
    }
}

/// Final, merged configuration used by the running process.
///
/// Merge order: caller patch > ENV > defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Location of the persisted pool file.
    pub provider_pools_file: PathBuf,
    /// Fallback chains tried when a primary type has no healthy account.
    pub provider_fallback_chain: HashMap<ProviderType, Vec<ProviderType>>,
    /// OAuth tokens expiring within this window are refreshed eagerly.
    pub token_near_expiry: Duration,
    pub request_max_retries: u32,
    pub request_base_delay: Duration,
    /// Cap applied when a thinking-enabled request is translated without an
    /// explicit max_tokens.
    pub openai_reasoning_max_tokens: Option<u32>,
    pub use_system_proxy_gemini: bool,
    pub use_system_proxy_openai: bool,
    pub use_system_proxy_claude: bool,
    pub pool: PoolSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider_pools_file: PathBuf::from("provider_pools.json"),
            provider_fallback_chain: HashMap::new(),
            token_near_expiry: Duration::from_secs(10 * 60),
            request_max_retries: 3,
            request_base_delay: Duration::from_millis(1000),
            openai_reasoning_max_tokens: None,
            use_system_proxy_gemini: false,
            use_system_proxy_openai: false,
            use_system_proxy_claude: false,
            pool: PoolSettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Defaults overlaid with recognized environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        GatewayConfigPatch::from_env().apply(&mut config);
        config
    }
}

/// Optional layer used for merging configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayConfigPatch {
    pub provider_pools_file: Option<PathBuf>,
    pub provider_fallback_chain: Option<HashMap<ProviderType, Vec<ProviderType>>>,
    pub token_near_expiry: Option<Duration>,
    pub request_max_retries: Option<u32>,
    pub request_base_delay: Option<Duration>,
    pub openai_reasoning_max_tokens: Option<u32>,
    pub use_system_proxy_gemini: Option<bool>,
    pub use_system_proxy_openai: Option<bool>,
    pub use_system_proxy_claude: Option<bool>,
    pub pool: Option<PoolSettings>,
}

impl GatewayConfigPatch {
    pub fn from_env() -> Self {
        let mut patch = Self::default();
        if let Some(path) = env_var("PROVIDER_POOLS_FILE_PATH") {
            patch.provider_pools_file = Some(PathBuf::from(path));
        }
        if let Some(minutes) = env_parse::<u64>("CRON_NEAR_MINUTES") {
            patch.token_near_expiry = Some(Duration::from_secs(minutes * 60));
        }
        if let Some(retries) = env_parse::<u32>("REQUEST_MAX_RETRIES") {
            patch.request_max_retries = Some(retries);
        }
        if let Some(millis) = env_parse::<u64>("REQUEST_BASE_DELAY") {
            patch.request_base_delay = Some(Duration::from_millis(millis));
        }
        if let Some(cap) = env_parse::<u32>("OPENAI_REASONING_MAX_TOKENS") {
            patch.openai_reasoning_max_tokens = Some(cap);
        }
        if let Some(flag) = env_flag("USE_SYSTEM_PROXY_GEMINI") {
            patch.use_system_proxy_gemini = Some(flag);
        }
        if let Some(flag) = env_flag("USE_SYSTEM_PROXY_OPENAI") {
            patch.use_system_proxy_openai = Some(flag);
        }
        if let Some(flag) = env_flag("USE_SYSTEM_PROXY_CLAUDE") {
            patch.use_system_proxy_claude = Some(flag);
        }
        patch
    }

    pub fn apply(self, config: &mut GatewayConfig) {
        if let Some(value) = self.provider_pools_file {
            config.provider_pools_file = value;
        }
        if let Some(value) = self.provider_fallback_chain {
            config.provider_fallback_chain = value;
        }
        if let Some(value) = self.token_near_expiry {
            config.token_near_expiry = value;
        }
        if let Some(value) = self.request_max_retries {
            config.request_max_retries = value;
        }
        if let Some(value) = self.request_base_delay {
            config.request_base_delay = value;
        }
        if let Some(value) = self.openai_reasoning_max_tokens {
            config.openai_reasoning_max_tokens = Some(value);
        }
        if let Some(value) = self.use_system_proxy_gemini {
            config.use_system_proxy_gemini = value;
        }
        if let Some(value) = self.use_system_proxy_openai {
            config.use_system_proxy_openai = value;
        }
        if let Some(value) = self.use_system_proxy_claude {
            config.use_system_proxy_claude = value;
        }
        if let Some(value) = self.pool {
            config.pool = value;
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key)?.parse().ok()
}

fn env_flag(key: &str) -> Option<bool> {
    let value = env_var(key)?;
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_overlays_only_set_fields() {
        let mut config = GatewayConfig::default();
        let patch = GatewayConfigPatch {
            request_max_retries: Some(5),
            use_system_proxy_gemini: Some(true),
            ..GatewayConfigPatch::default()
        };
        patch.apply(&mut config);
        assert_eq!(config.request_max_retries, 5);
        assert!(config.use_system_proxy_gemini);
        assert_eq!(config.request_base_delay, Duration::from_millis(1000));
        assert_eq!(config.pool.max_error_count, 3);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.token_near_expiry, Duration::from_secs(600));
        assert_eq!(config.pool.quick_retry_interval, Duration::from_secs(10));
        assert_eq!(config.pool.quick_retry_max_count, 3);
        assert_eq!(
            config.pool.rate_limit_health_check_interval,
            Duration::from_secs(10800)
        );
        assert_eq!(config.pool.save_debounce_time, Duration::from_secs(1));
    }
}
