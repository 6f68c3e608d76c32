use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};

use llmrelay_common::{AccountUuid, ProviderType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthEventType {
    Healthy,
    Unhealthy,
}

/// Emitted on every health transition for the external metrics collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEvent {
    pub provider_uuid: AccountUuid,
    pub provider_type: ProviderType,
    pub event_type: HealthEventType,
    pub error_code: Option<u16>,
    pub error_message: Option<String>,
}

pub trait HealthSink: Send + Sync {
    fn write<'a>(&'a self, event: &'a HealthEvent) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Fan-out hub for health events. Sink failures never propagate back into
/// the pool manager; sink writes run on their own tasks.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<Inner>,
}

struct Inner {
    tx: broadcast::Sender<HealthEvent>,
    sinks: RwLock<Vec<Arc<dyn HealthSink>>>,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            inner: Arc::new(Inner {
                tx,
                sinks: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.inner.tx.subscribe()
    }

    pub async fn add_sink(&self, sink: Arc<dyn HealthSink>) {
        self.inner.sinks.write().await.push(sink);
    }

    pub async fn emit(&self, event: HealthEvent) {
        let _ = self.inner.tx.send(event.clone());
        let sinks = self.inner.sinks.read().await.clone();
        for sink in sinks {
            let event = event.clone();
            tokio::spawn(async move {
                sink.write(&event).await;
            });
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(64)
    }
}
