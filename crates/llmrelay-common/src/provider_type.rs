use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wire dialect spoken over HTTP. Governs which converter path applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openai-responses")]
    OpenAiResponses,
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "gemini")]
    Gemini,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::OpenAi => "openai",
            Protocol::OpenAiResponses => "openai-responses",
            Protocol::Claude => "claude",
            Protocol::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete upstream flavor: auth mechanism + endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "openai-custom")]
    OpenAiCustom,
    #[serde(rename = "openai-responses-custom")]
    OpenAiResponsesCustom,
    #[serde(rename = "claude-custom")]
    ClaudeCustom,
    #[serde(rename = "claude-code-custom")]
    ClaudeCodeCustom,
    #[serde(rename = "gemini-cli-oauth")]
    GeminiCliOauth,
    #[serde(rename = "gemini-antigravity")]
    GeminiAntigravity,
}

impl ProviderType {
    pub const ALL: [ProviderType; 6] = [
        ProviderType::OpenAiCustom,
        ProviderType::OpenAiResponsesCustom,
        ProviderType::ClaudeCustom,
        ProviderType::ClaudeCodeCustom,
        ProviderType::GeminiCliOauth,
        ProviderType::GeminiAntigravity,
    ];

    pub fn protocol(&self) -> Protocol {
        match self {
            ProviderType::OpenAiCustom => Protocol::OpenAi,
            ProviderType::OpenAiResponsesCustom => Protocol::OpenAiResponses,
            ProviderType::ClaudeCustom | ProviderType::ClaudeCodeCustom => Protocol::Claude,
            ProviderType::GeminiCliOauth | ProviderType::GeminiAntigravity => Protocol::Gemini,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAiCustom => "openai-custom",
            ProviderType::OpenAiResponsesCustom => "openai-responses-custom",
            ProviderType::ClaudeCustom => "claude-custom",
            ProviderType::ClaudeCodeCustom => "claude-code-custom",
            ProviderType::GeminiCliOauth => "gemini-cli-oauth",
            ProviderType::GeminiAntigravity => "gemini-antigravity",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = UnknownProviderType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "openai-custom" => Ok(ProviderType::OpenAiCustom),
            "openai-responses-custom" => Ok(ProviderType::OpenAiResponsesCustom),
            "claude-custom" => Ok(ProviderType::ClaudeCustom),
            "claude-code-custom" => Ok(ProviderType::ClaudeCodeCustom),
            "gemini-cli-oauth" => Ok(ProviderType::GeminiCliOauth),
            "gemini-antigravity" => Ok(ProviderType::GeminiAntigravity),
            _ => Err(UnknownProviderType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider type: {0}")]
pub struct UnknownProviderType(pub String);
