use std::collections::HashMap;

use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use llmrelay_common::{GatewayError, RelayResult, known_models};

use super::GeminiCliAdapter;
use crate::usage::{ModelQuota, QuotaReporter, UsageLimits};

#[async_trait::async_trait]
impl QuotaReporter for GeminiCliAdapter {
    async fn get_usage_limits(&self) -> RelayResult<UsageLimits> {
        let project_id = self.project_id().await?;
        let body = serde_json::json!({ "project": project_id });
        let response = self
            .post_internal("/v1internal:retrieveUserQuota", &body)
            .await?;
        let payload: JsonValue = response
            .json()
            .await
            .map_err(|err| GatewayError::MalformedResponse(err.to_string()))?;
        Ok(self.build_limits(&payload))
    }
}

impl GeminiCliAdapter {
    /// Supported models always appear in the report: entries the upstream
    /// reported are used as-is, everything else is assumed untouched.
    fn build_limits(&self, payload: &JsonValue) -> UsageLimits {
        let mut models: HashMap<String, ModelQuota> = known_models(self.config().provider_type)
            .iter()
            .filter(|id| !self.config().not_supported_models.contains(**id))
            .map(|id| (id.to_string(), ModelQuota::untouched()))
            .collect();

        for entry in quota_entries(payload) {
            let Some(model_id) = entry
                .get("model")
                .or_else(|| entry.get("modelId"))
                .and_then(|value| value.as_str())
            else {
                continue;
            };
            let model_id = model_id.strip_prefix("models/").unwrap_or(model_id);
            if self.config().not_supported_models.contains(model_id) {
                continue;
            }
            let remaining = entry
                .get("remainingFraction")
                .or_else(|| entry.get("remaining"))
                .and_then(|value| value.as_f64())
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            let reset_raw = entry
                .get("resetTime")
                .and_then(|value| value.as_str())
                .map(str::to_string);
            models.insert(
                model_id.to_string(),
                ModelQuota {
                    remaining,
                    reset_time: reset_raw.clone(),
                    reset_time_raw: reset_raw,
                    input_token_limit: entry
                        .get("inputTokenLimit")
                        .and_then(|value| value.as_u64()),
                    output_token_limit: entry
                        .get("outputTokenLimit")
                        .and_then(|value| value.as_u64()),
                },
            );
        }

        UsageLimits {
            last_updated: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            models,
        }
    }
}

fn quota_entries(payload: &JsonValue) -> Vec<&JsonValue> {
    for key in ["quotas", "modelQuotas", "buckets"] {
        if let Some(entries) = payload.get(key).and_then(|value| value.as_array()) {
            return entries.iter().collect();
        }
    }
    Vec::new()
}
