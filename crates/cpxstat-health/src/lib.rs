//! cpxstat-health — the health classification and aggregation engine.
//!
//! Pure functions over one polling cycle's data:
//!
//! ```text
//! InstanceMetric ──classify()──▶ InstanceHealth ──aggregate()──▶ ServiceAggregate
//!                                      │                               │
//!                                      └──────── Query::apply() ◀──────┘
//! ```
//!
//! # Thresholds
//!
//! An instance is unhealthy at 80% CPU or memory. A service is unhealthy
//! once more than two of its instances are. Both are fixed constants.

pub mod aggregate;
pub mod classify;
pub mod query;

pub use aggregate::{aggregate, service_status, SERVICE_UNHEALTHY_INSTANCES};
pub use classify::{classify, classify_metric, INSTANCE_UNHEALTHY_PERCENT};
pub use query::{
    filter, sort_instances, sort_services, Filterable, InstanceSortKey, Query, ServiceSortKey,
};
