mod probe;
mod service;

pub use probe::AdapterHealthProbe;
pub use service::Orchestrator;
