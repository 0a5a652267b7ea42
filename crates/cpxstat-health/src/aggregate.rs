//! Service aggregator — per-service rollups over one snapshot.
//!
//! Groups classified instances by service label and computes truncated
//! average utilization, instance counts, and a service-level verdict.
//! Pure: the same input always yields the same output.

use std::collections::BTreeMap;

use tracing::trace;

use cpxstat_core::{HealthStatus, InstanceHealth, ServiceAggregate};

/// A service with more unhealthy instances than this is unhealthy.
///
/// Fixed, and distinct from the per-instance percentage threshold.
pub const SERVICE_UNHEALTHY_INSTANCES: usize = 2;

/// Running totals for one service.
#[derive(Default)]
struct ServiceTally {
    total: usize,
    healthy: usize,
    unhealthy: usize,
    cpu_sum: u64,
    memory_sum: u64,
}

impl ServiceTally {
    fn add(&mut self, instance: &InstanceHealth) {
        self.total += 1;
        if instance.status == HealthStatus::Unhealthy {
            self.unhealthy += 1;
        } else {
            self.healthy += 1;
        }
        self.cpu_sum += u64::from(instance.metric.cpu);
        self.memory_sum += u64::from(instance.metric.memory);
    }

    /// `total` is never zero: a tally only exists once an instance was added.
    fn finish(self, service: &str) -> ServiceAggregate {
        let count = self.total as u64;
        ServiceAggregate {
            service: service.to_string(),
            avg_cpu: truncating_mean(self.cpu_sum, count),
            avg_memory: truncating_mean(self.memory_sum, count),
            total: self.total,
            healthy: self.healthy,
            unhealthy: self.unhealthy,
            status: service_status(self.unhealthy),
        }
    }
}

/// Service-level verdict from its unhealthy instance count.
pub fn service_status(unhealthy: usize) -> HealthStatus {
    if unhealthy <= SERVICE_UNHEALTHY_INSTANCES {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    }
}

/// Aggregate a snapshot by service.
///
/// With `service`, only that service (matched case-insensitively) is
/// returned as a single rollup named after the first matching label;
/// an unknown name yields an empty list. Without it, every distinct label
/// gets its own rollup, ordered by service name.
pub fn aggregate(instances: &[InstanceHealth], service: Option<&str>) -> Vec<ServiceAggregate> {
    let mut tallies: BTreeMap<&str, ServiceTally> = BTreeMap::new();
    let mut selected: Option<&str> = None;

    for instance in instances {
        let mut name = instance.service();
        if let Some(wanted) = service {
            if !name.eq_ignore_ascii_case(wanted.trim()) {
                continue;
            }
            name = *selected.get_or_insert(name);
        }
        tallies.entry(name).or_default().add(instance);
    }

    let aggregates: Vec<ServiceAggregate> = tallies
        .into_iter()
        .map(|(name, tally)| tally.finish(name))
        .collect();

    trace!(
        instances = instances.len(),
        services = aggregates.len(),
        "aggregated snapshot"
    );
    aggregates
}

fn truncating_mean(sum: u64, count: u64) -> u32 {
    if count == 0 {
        return 0;
    }
    u32::try_from(sum / count).unwrap_or(u32::MAX)
}
