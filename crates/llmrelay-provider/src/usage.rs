use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use llmrelay_common::RelayResult;

/// Per-model quota as reported by the upstream account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelQuota {
    /// 0.0 (exhausted) ..= 1.0 (untouched).
    pub remaining: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_token_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_token_limit: Option<u64>,
}

impl ModelQuota {
    /// Quota entry assumed for models the upstream did not report on.
    pub fn untouched() -> Self {
        Self {
            remaining: 1.0,
            reset_time: None,
            reset_time_raw: None,
            input_token_limit: None,
            output_token_limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageLimits {
    pub last_updated: String,
    pub models: HashMap<String, ModelQuota>,
}

/// Extension surface for the adapter subset whose upstream exposes a quota
/// endpoint (the code-assist family).
#[async_trait::async_trait]
pub trait QuotaReporter: Send + Sync {
    async fn get_usage_limits(&self) -> RelayResult<UsageLimits>;
}
