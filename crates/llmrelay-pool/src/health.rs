use llmrelay_common::ProviderType;

use crate::account::ProviderAccount;

/// Result of one health probe against an account.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub success: bool,
    pub model_name: String,
    pub error_message: Option<String>,
    pub status_code: Option<u16>,
}

impl ProbeOutcome {
    pub fn success(model_name: impl Into<String>) -> Self {
        Self {
            success: true,
            model_name: model_name.into(),
            error_message: None,
            status_code: None,
        }
    }

    pub fn failure(
        model_name: impl Into<String>,
        error_message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self {
            success: false,
            model_name: model_name.into(),
            error_message: Some(error_message.into()),
            status_code,
        }
    }
}

/// Executes a minimal generate call against the account's upstream. The
/// implementation lives with the adapters; the pool stays network-free.
#[async_trait::async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, account: &ProviderAccount, model: &str) -> ProbeOutcome;
}

/// Probe model used when the account does not pin one.
pub fn default_health_check_model(provider_type: ProviderType) -> &'static str {
    match provider_type {
        ProviderType::OpenAiCustom | ProviderType::OpenAiResponsesCustom => "gpt-4o-mini",
        ProviderType::ClaudeCustom | ProviderType::ClaudeCodeCustom => {
            "claude-3-5-haiku-20241022"
        }
        ProviderType::GeminiCliOauth | ProviderType::GeminiAntigravity => "gemini-2.5-flash",
    }
}
