use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use llmrelay_common::{AccountUuid, ProviderType};

/// Credential material attached to one account. The adapter for the
/// account's type decides what to do with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialMaterial {
    ApiKey {
        api_key: String,
    },
    /// Inline base64 OAuth credentials blob.
    OauthBlob {
        credentials: String,
    },
    /// Path to an OAuth credential file owned by the adapter.
    OauthFile {
        path: PathBuf,
    },
    #[default]
    None,
}

/// Recovery cadence currently scheduled for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    QuickRetry,
    RateLimit,
    Standard,
}

/// One upstream credential plus its operational state. Serialized form is
/// the persisted pool file entry (camelCase keys, RFC 3339 timestamps).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccount {
    pub uuid: AccountUuid,
    pub provider_type: ProviderType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub credential: CredentialMaterial,
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub not_supported_models: HashSet<String>,
    #[serde(default = "default_true")]
    pub check_health: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_model_name: Option<String>,

    #[serde(default = "default_true")]
    pub is_healthy: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_used: Option<OffsetDateTime>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_error_time: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_status_code: Option<u16>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_health_check_time: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check_model: Option<String>,

    #[serde(default)]
    pub quick_retry_count: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub quick_retry_phase_start_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_quick_retry_time: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_schedule_type: Option<ScheduleKind>,
}

fn default_true() -> bool {
    true
}

impl ProviderAccount {
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            uuid: AccountUuid::new_v4(),
            provider_type,
            endpoint: None,
            credential: CredentialMaterial::None,
            not_supported_models: HashSet::new(),
            check_health: true,
            check_model_name: None,
            is_healthy: true,
            is_disabled: false,
            last_used: None,
            usage_count: 0,
            error_count: 0,
            last_error_time: None,
            last_error_message: None,
            last_error_status_code: None,
            last_health_check_time: None,
            last_health_check_model: None,
            quick_retry_count: 0,
            quick_retry_phase_start_time: None,
            last_quick_retry_time: None,
            health_check_schedule_type: None,
        }
    }

    /// Whether selection may consider this account for `model`.
    pub fn is_candidate(&self, model: Option<&str>) -> bool {
        if !self.is_healthy || self.is_disabled {
            return false;
        }
        match model {
            Some(model) => !self.not_supported_models.contains(model),
            None => true,
        }
    }

    /// Clear error and recovery state after a confirmed-healthy transition.
    pub fn reset_error_state(&mut self) {
        self.error_count = 0;
        self.last_error_message = None;
        self.last_error_status_code = None;
        self.quick_retry_count = 0;
        self.quick_retry_phase_start_time = None;
        self.last_quick_retry_time = None;
        self.health_check_schedule_type = None;
    }
}
