use llmrelay_common::RelayResult;

use crate::adapter::AdapterConfig;
use crate::geminicli::{GeminiCliAdapter, GeminiEnv};

const ANTIGRAVITY_ENV: GeminiEnv = GeminiEnv {
    name: "antigravity",
    base_url: "https://daily-cloudcode-pa.sandbox.googleapis.com",
    user_agent: "antigravity/1.15.8 (Linux; x86_64)",
    token_url: "https://oauth2.googleapis.com/token",
    client_id: "1071006060591-tmhssin2h21lcre235vtolojh4g403ep.apps.googleusercontent.com",
    client_secret: "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",
};

/// The antigravity flavor speaks the same code-assist wire protocol against
/// its own endpoint family and OAuth client.
pub fn new_antigravity_adapter(config: AdapterConfig) -> RelayResult<GeminiCliAdapter> {
    GeminiCliAdapter::with_env(config, ANTIGRAVITY_ENV)
}
