//! Remote content service: HTTP client, health probing and response mapping.

pub mod client;
pub mod latency;
pub mod mapping;
pub mod probe;
pub mod status;

pub use client::BackendClient;
pub use probe::HealthProber;
pub use status::{BackendStatus, StatusSnapshot};
