//! The `MetricsSource` seam between the engine and the registry transport.

use std::collections::BTreeMap;
use std::future::Future;

use cpxstat_core::{InstanceId, MonitorError, MonitorResult, RawInstanceStats};

/// Anything that can list fleet instances and return one instance's raw stats.
///
/// Implementations do transport only. Validation of the returned record
/// happens in the fetcher, so every source yields the same
/// `MalformedMetric` errors.
pub trait MetricsSource: Send + Sync + 'static {
    /// The full instance roster.
    fn list_instances(&self) -> impl Future<Output = MonitorResult<Vec<InstanceId>>> + Send;

    /// Current raw stats for one instance.
    fn fetch_instance(&self, id: &str) -> impl Future<Output = MonitorResult<RawInstanceStats>> + Send;
}

/// In-memory source with a fixed roster.
///
/// Instances listed in the roster but missing from the records answer
/// with `RegistryUnavailable`, which makes partial-failure paths easy to
/// exercise.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    roster: Vec<InstanceId>,
    records: BTreeMap<InstanceId, RawInstanceStats>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance with percent-string CPU and memory, registry style.
    pub fn with_instance(mut self, id: &str, service: &str, cpu: &str, memory: &str) -> Self {
        let raw = RawInstanceStats {
            service: Some(service.into()),
            cpu: Some(cpu.into()),
            memory: Some(memory.into()),
            extra: BTreeMap::new(),
        };
        self.roster.push(id.to_string());
        self.records.insert(id.to_string(), raw);
        self
    }

    /// Add an arbitrary raw record.
    pub fn with_raw(mut self, id: &str, raw: RawInstanceStats) -> Self {
        self.roster.push(id.to_string());
        self.records.insert(id.to_string(), raw);
        self
    }

    /// List an instance in the roster without any record behind it.
    pub fn with_unreachable(mut self, id: &str) -> Self {
        self.roster.push(id.to_string());
        self
    }
}

impl MetricsSource for StaticSource {
    async fn list_instances(&self) -> MonitorResult<Vec<InstanceId>> {
        Ok(self.roster.clone())
    }

    async fn fetch_instance(&self, id: &str) -> MonitorResult<RawInstanceStats> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| MonitorError::unavailable(format!("memory://{id}"), "HTTP 404 Not Found"))
    }
}
