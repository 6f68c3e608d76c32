mod adapter;
mod antigravity;
mod claude;
mod claudecode;
mod client;
mod factory;
mod geminicli;
mod http_retry;
mod openai;
mod responses;
mod usage;

pub use adapter::{AdapterConfig, ChunkStream, ProviderAdapter};
pub use factory::{AdapterFactory, AdapterSource};
pub use usage::{ModelQuota, QuotaReporter, UsageLimits};
