mod config;
mod error;
mod models;
mod provider_type;

pub use config::{GatewayConfig, GatewayConfigPatch, PoolSettings};
pub use error::{GatewayError, RelayResult};
pub use models::{known_models, provider_supports_model};
pub use provider_type::{Protocol, ProviderType, UnknownProviderType};

pub type AccountUuid = uuid::Uuid;
