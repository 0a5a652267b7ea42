//! Instance health classification.

use cpxstat_core::{HealthStatus, InstanceHealth, InstanceMetric};

/// CPU or memory percentage at which an instance is considered unhealthy.
///
/// Fixed; not configurable.
pub const INSTANCE_UNHEALTHY_PERCENT: u32 = 80;

/// Classify an instance from its CPU and memory percentages.
///
/// Values above 100 are compared as-is.
pub fn classify(cpu: u32, memory: u32) -> HealthStatus {
    if cpu >= INSTANCE_UNHEALTHY_PERCENT || memory >= INSTANCE_UNHEALTHY_PERCENT {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    }
}

/// Attach a health verdict to a validated metric.
pub fn classify_metric(metric: InstanceMetric) -> InstanceHealth {
    let status = classify(metric.cpu, metric.memory);
    InstanceHealth { metric, status }
}
