use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value as JsonValue};
use tokio::sync::{Mutex, Notify};

use llmrelay_common::{GatewayError, ProviderType, RelayResult};

use crate::account::ProviderAccount;

/// Dirty-set for the debounced pool-file writer.
///
/// `mark` records a provider type and arms the writer; the writer waits out
/// the debounce window, then takes the whole set atomically. Marks landing
/// while a write is in flight leave a permit behind, so the next loop
/// iteration picks them up.
#[derive(Debug, Default)]
pub struct PendingSaves {
    set: Mutex<HashSet<ProviderType>>,
    notify: Notify,
}

impl PendingSaves {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark(&self, provider_type: ProviderType) {
        self.set.lock().await.insert(provider_type);
        self.notify.notify_one();
    }

    /// Wait for a mark, let the debounce window close, then drain the set.
    pub async fn wait_and_take(&self, debounce: Duration) -> HashSet<ProviderType> {
        loop {
            self.notify.notified().await;
            tokio::time::sleep(debounce).await;
            let taken = std::mem::take(&mut *self.set.lock().await);
            if !taken.is_empty() {
                return taken;
            }
        }
    }
}

/// Load the persisted pool file. A missing file is an empty baseline.
pub async fn load_pools(
    path: &Path,
) -> RelayResult<HashMap<ProviderType, Vec<ProviderAccount>>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(err) => return Err(err.into()),
    };
    let document: Map<String, JsonValue> = serde_json::from_slice(&raw)?;
    let mut pools = HashMap::new();
    for (key, value) in document {
        let Ok(provider_type) = key.parse::<ProviderType>() else {
            tracing::warn!(event = "pool_file_unknown_type", provider_type = %key);
            continue;
        };
        let accounts: Vec<ProviderAccount> = serde_json::from_value(value)?;
        pools.insert(provider_type, accounts);
    }
    Ok(pools)
}

/// Overlay `updates` onto the current file contents and write once.
///
/// Types not present in `updates` keep whatever the file already holds, so
/// the writer stays idempotent: overlaying identical state produces an
/// identical document.
pub async fn overlay_write(
    path: &PathBuf,
    updates: HashMap<ProviderType, Vec<ProviderAccount>>,
) -> RelayResult<()> {
    let mut document: Map<String, JsonValue> = match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice(&raw).unwrap_or_default(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
        Err(err) => return Err(err.into()),
    };

    for (provider_type, accounts) in updates {
        document.insert(
            provider_type.as_str().to_string(),
            serde_json::to_value(&accounts)?,
        );
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(&JsonValue::Object(document))?;
    tokio::fs::write(path, body)
        .await
        .map_err(GatewayError::from)
}
