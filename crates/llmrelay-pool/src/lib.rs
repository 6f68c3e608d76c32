mod account;
mod events;
mod health;
mod manager;
mod persist;

pub use account::{CredentialMaterial, ProviderAccount, ScheduleKind};
pub use events::{EventHub, HealthEvent, HealthEventType, HealthSink};
pub use health::{HealthProbe, ProbeOutcome, default_health_check_model};
pub use manager::{PoolManager, SelectOptions, Selection};
pub use persist::load_pools;
