//! Query filter and sort keys for result rows.
//!
//! The same filter applies to instance rows and service rows. Unknown
//! service or status values are not errors; they match nothing.

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use cpxstat_core::{HealthStatus, InstanceHealth, ServiceAggregate, UnreachableInstance};

/// A row that can be matched by service name and status.
pub trait Filterable {
    fn service_name(&self) -> &str;
    fn health(&self) -> HealthStatus;
}

impl Filterable for InstanceHealth {
    fn service_name(&self) -> &str {
        self.service()
    }

    fn health(&self) -> HealthStatus {
        self.status
    }
}

impl Filterable for ServiceAggregate {
    fn service_name(&self) -> &str {
        &self.service
    }

    fn health(&self) -> HealthStatus {
        self.status
    }
}

impl Filterable for UnreachableInstance {
    /// The service of an unreachable instance is unknown, so any service
    /// filter excludes it.
    fn service_name(&self) -> &str {
        ""
    }

    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }
}

/// Optional service and status constraints, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub service: Option<String>,
    pub status: Option<String>,
}

impl Query {
    pub fn new(service: Option<&str>, status: Option<&str>) -> Self {
        Self {
            service: service.map(str::to_string),
            status: status.map(str::to_string),
        }
    }

    pub fn matches<T: Filterable>(&self, row: &T) -> bool {
        if let Some(service) = &self.service {
            if !row.service_name().eq_ignore_ascii_case(service.trim()) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if !row.health().matches(status) {
                return false;
            }
        }
        true
    }

    /// Matching rows, cloned. The input is left untouched.
    pub fn apply<T: Filterable + Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter().filter(|row| self.matches(*row)).cloned().collect()
    }
}

/// Filter rows by optional service name and status, case-insensitively.
pub fn filter<T: Filterable + Clone>(rows: &[T], service: Option<&str>, status: Option<&str>) -> Vec<T> {
    Query::new(service, status).apply(rows)
}

// ── Sort keys ─────────────────────────────────────────────────────

/// Sort order for instance rows.
///
/// `Id` and `Service` sort ascending; numeric keys sort busiest first;
/// `Status` puts unhealthy rows first. Ties fall back to the identifier.
///
/// Identifiers that parse as an IP address (optionally with a port) order
/// numerically, so `10.0.0.2` precedes `10.0.0.10`, and come before any
/// other identifiers, which order as plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceSortKey {
    #[default]
    Id,
    Service,
    Cpu,
    Memory,
    Status,
}

/// Sort order for service rows. Ties fall back to the service name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceSortKey {
    #[default]
    Name,
    Cpu,
    Memory,
    Unhealthy,
}

impl InstanceSortKey {
    pub const ALL: [InstanceSortKey; 5] = [
        InstanceSortKey::Id,
        InstanceSortKey::Service,
        InstanceSortKey::Cpu,
        InstanceSortKey::Memory,
        InstanceSortKey::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceSortKey::Id => "id",
            InstanceSortKey::Service => "service",
            InstanceSortKey::Cpu => "cpu",
            InstanceSortKey::Memory => "memory",
            InstanceSortKey::Status => "status",
        }
    }
}

impl ServiceSortKey {
    pub const ALL: [ServiceSortKey; 4] = [
        ServiceSortKey::Name,
        ServiceSortKey::Cpu,
        ServiceSortKey::Memory,
        ServiceSortKey::Unhealthy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceSortKey::Name => "name",
            ServiceSortKey::Cpu => "cpu",
            ServiceSortKey::Memory => "memory",
            ServiceSortKey::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for InstanceSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ServiceSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown instance sort key `{s}` (expected id, service, cpu, memory, or status)"))
    }
}

impl FromStr for ServiceSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown service sort key `{s}` (expected name, cpu, memory, or unhealthy)"))
    }
}

fn status_rank(status: HealthStatus) -> u8 {
    match status {
        HealthStatus::Unhealthy => 0,
        HealthStatus::Unknown => 1,
        HealthStatus::Healthy => 2,
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum IdKey<'a> {
    Addr(IpAddr, u16),
    Name(&'a str),
}

fn id_key(id: &str) -> IdKey<'_> {
    if let Ok(ip) = id.parse::<IpAddr>() {
        IdKey::Addr(ip, 0)
    } else if let Ok(addr) = id.parse::<SocketAddr>() {
        IdKey::Addr(addr.ip(), addr.port())
    } else {
        IdKey::Name(id)
    }
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    id_key(a).cmp(&id_key(b)).then_with(|| a.cmp(b))
}

pub fn sort_instances(rows: &mut [InstanceHealth], key: InstanceSortKey) {
    rows.sort_by(|a, b| {
        let primary = match key {
            InstanceSortKey::Id => Ordering::Equal,
            InstanceSortKey::Service => a.service().cmp(b.service()),
            InstanceSortKey::Cpu => b.metric.cpu.cmp(&a.metric.cpu),
            InstanceSortKey::Memory => b.metric.memory.cmp(&a.metric.memory),
            InstanceSortKey::Status => status_rank(a.status).cmp(&status_rank(b.status)),
        };
        primary.then_with(|| compare_ids(a.id(), b.id()))
    });
}

pub fn sort_services(rows: &mut [ServiceAggregate], key: ServiceSortKey) {
    rows.sort_by(|a, b| {
        let primary = match key {
            ServiceSortKey::Name => Ordering::Equal,
            ServiceSortKey::Cpu => b.avg_cpu.cmp(&a.avg_cpu),
            ServiceSortKey::Memory => b.avg_memory.cmp(&a.avg_memory),
            ServiceSortKey::Unhealthy => b.unhealthy.cmp(&a.unhealthy),
        };
        primary.then_with(|| a.service.cmp(&b.service))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::classify::classify_metric;
    use cpxstat_core::InstanceMetric;

    fn instance(id: &str, service: &str, cpu: u32, memory: u32) -> InstanceHealth {
        classify_metric(InstanceMetric::new(id, service, cpu, memory))
    }

    fn rows() -> Vec<InstanceHealth> {
        vec![
            instance("10.0.0.3", "Auth", 85, 10),
            instance("10.0.0.1", "Auth", 20, 30),
            instance("10.0.0.2", "MLService", 50, 90),
            instance("10.0.0.4", "GeoService", 12, 12),
        ]
    }

    fn ids(rows: &[InstanceHealth]) -> Vec<&str> {
        rows.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn no_constraints_returns_everything() {
        assert_eq!(filter(&rows(), None, None).len(), 4);
    }

    #[test]
    fn service_filter_is_case_insensitive() {
        let result = filter(&rows(), Some("auth"), None);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|r| r.service() == "Auth"));
    }

    #[test]
    fn status_filter_is_case_insensitive() {
        let result = filter(&rows(), None, Some("UNHEALTHY"));
        assert_eq!(ids(&result), vec!["10.0.0.3", "10.0.0.2"]);
    }

    #[test]
    fn constraints_combine_with_and() {
        let result = filter(&rows(), Some("Auth"), Some("healthy"));
        assert_eq!(ids(&result), vec!["10.0.0.1"]);
    }

    #[test]
    fn unknown_values_match_nothing() {
        assert!(filter(&rows(), Some("Billing"), None).is_empty());
        assert!(filter(&rows(), None, Some("degraded")).is_empty());
    }

    #[test]
    fn filter_does_not_mutate_input() {
        let input = rows();
        let before = input.clone();
        let _ = filter(&input, Some("auth"), Some("healthy"));
        assert_eq!(input, before);
    }

    #[test]
    fn same_filter_applies_to_services() {
        let services = aggregate(&rows(), None);
        let result = filter(&services, Some("mlservice"), Some("healthy"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].service, "MLService");
    }

    #[test]
    fn unreachable_rows_only_match_status() {
        let rows = vec![UnreachableInstance {
            id: "10.0.9.9".to_string(),
            reason: "timeout".to_string(),
        }];
        assert_eq!(filter(&rows, None, Some("unknown")).len(), 1);
        assert!(filter(&rows, Some("Auth"), None).is_empty());
    }

    #[test]
    fn sort_instances_by_id_default() {
        let mut r = rows();
        sort_instances(&mut r, InstanceSortKey::default());
        assert_eq!(ids(&r), vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]);
    }

    #[test]
    fn sort_instances_by_address_not_text() {
        let mut r = vec![
            instance("10.0.0.10", "Auth", 1, 1),
            instance("web-1", "Auth", 1, 1),
            instance("10.0.0.2:8080", "Auth", 1, 1),
            instance("10.0.0.2", "Auth", 1, 1),
            instance("10.0.0.1x", "Auth", 1, 1),
            instance("10.0.0.9", "Auth", 1, 1),
        ];
        sort_instances(&mut r, InstanceSortKey::Id);
        assert_eq!(
            ids(&r),
            vec!["10.0.0.2", "10.0.0.2:8080", "10.0.0.9", "10.0.0.10", "10.0.0.1x", "web-1"]
        );
    }

    #[test]
    fn sort_instances_by_cpu_descending() {
        let mut r = rows();
        sort_instances(&mut r, InstanceSortKey::Cpu);
        assert_eq!(ids(&r), vec!["10.0.0.3", "10.0.0.2", "10.0.0.1", "10.0.0.4"]);
    }

    #[test]
    fn sort_instances_by_status_puts_unhealthy_first() {
        let mut r = rows();
        sort_instances(&mut r, InstanceSortKey::Status);
        assert_eq!(ids(&r), vec!["10.0.0.2", "10.0.0.3", "10.0.0.1", "10.0.0.4"]);
    }

    #[test]
    fn sort_instances_by_service_breaks_ties_on_id() {
        let mut r = rows();
        sort_instances(&mut r, InstanceSortKey::Service);
        assert_eq!(ids(&r), vec!["10.0.0.1", "10.0.0.3", "10.0.0.4", "10.0.0.2"]);
    }

    #[test]
    fn sort_services_by_unhealthy() {
        let mut services = aggregate(&rows(), None);
        sort_services(&mut services, ServiceSortKey::Unhealthy);
        let names: Vec<&str> = services.iter().map(|s| s.service.as_str()).collect();
        assert_eq!(names, vec!["Auth", "MLService", "GeoService"]);
    }

    #[test]
    fn sort_keys_parse() {
        assert_eq!("CPU".parse::<InstanceSortKey>(), Ok(InstanceSortKey::Cpu));
        assert_eq!("name".parse::<ServiceSortKey>(), Ok(ServiceSortKey::Name));
        assert!("ip".parse::<InstanceSortKey>().is_err());
    }
}
