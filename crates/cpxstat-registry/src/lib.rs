//! cpxstat-registry — talking to the fleet registry.
//!
//! Provides the `MetricsSource` seam, its HTTP implementation, the
//! snapshot fetcher that fans out one request per instance, and the
//! watch loop used for live refresh.
//!
//! # Architecture
//!
//! ```text
//! Watcher (interval, shutdown signal)
//!   └── SnapshotFetcher (concurrency limit, InstanceErrorPolicy)
//!         ├── MetricsSource::list_instances()  → GET {base}/servers
//!         ├── MetricsSource::fetch_instance()  → GET {base}/{id}   (per instance)
//!         ├── InstanceMetric::from_raw()       → MalformedMetric on bad records
//!         └── cpxstat_health::classify_metric()
//! ```
//!
//! No retries happen here. A failed roster fetch fails the cycle; what a
//! failed instance fetch does depends on the policy.

pub mod client;
pub mod fetcher;
pub mod source;
pub mod watcher;

pub use client::HttpRegistry;
pub use fetcher::SnapshotFetcher;
pub use source::{MetricsSource, StaticSource};
pub use watcher::Watcher;
