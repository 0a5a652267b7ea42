//! cpxstat-core — data model, boundary validation, errors, and configuration.
//!
//! Every other cpxstat crate speaks in these types. Parsing of raw registry
//! records happens here, once, so the health engine only ever sees
//! validated [`InstanceMetric`]s.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod types;

pub use config::{CpxConfig, LogFormat};
pub use endpoint::RegistryEndpoint;
pub use error::{ConfigError, MonitorError, MonitorResult};
pub use types::*;
