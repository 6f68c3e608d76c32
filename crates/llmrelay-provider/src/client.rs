use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use llmrelay_common::{GatewayError, RelayResult};

const IDLE_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_IDLE_PER_HOST: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClientKey {
    system_proxy: bool,
}

static CLIENT_CACHE: OnceLock<Mutex<HashMap<ClientKey, wreq::Client>>> = OnceLock::new();

/// Shared HTTP client, one per proxy mode. Adapters never build their own
/// clients, so connection pools are reused across accounts.
pub(crate) fn shared_client(system_proxy: bool) -> RelayResult<wreq::Client> {
    let key = ClientKey { system_proxy };
    let cache = CLIENT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache
        .lock()
        .map_err(|_| GatewayError::Io("http client cache lock failed".to_string()))?;

    if let Some(client) = guard.get(&key) {
        return Ok(client.clone());
    }

    let mut builder = wreq::Client::builder()
        .timeout(IDLE_TIMEOUT)
        .pool_max_idle_per_host(MAX_IDLE_PER_HOST);
    if !system_proxy {
        builder = builder.no_proxy();
    }
    let client = builder
        .build()
        .map_err(|err| GatewayError::Io(err.to_string()))?;
    guard.insert(key, client.clone());
    Ok(client)
}

/// Join a base URL (possibly already carrying a version segment) with a path.
pub(crate) fn build_url(base_url: Option<&str>, default_base: &str, path: &str) -> String {
    let base = base_url.unwrap_or(default_base).trim_end_matches('/');
    let mut path = path.trim_start_matches('/');
    if base.ends_with("/v1") && (path == "v1" || path.starts_with("v1/")) {
        path = path.trim_start_matches("v1/").trim_start_matches("v1");
    }
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_with_version_segment_is_not_doubled() {
        assert_eq!(
            build_url(Some("https://proxy.example/v1"), "https://api.openai.com", "v1/models"),
            "https://proxy.example/v1/models"
        );
        assert_eq!(
            build_url(None, "https://api.openai.com", "/v1/models"),
            "https://api.openai.com/v1/models"
        );
    }
}
