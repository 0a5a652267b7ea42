//! Fleet data model shared across cpxstat crates.
//!
//! Records are fetched per polling cycle and never persisted. Raw registry
//! JSON is validated once, at the boundary, by [`InstanceMetric::from_raw`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Opaque instance identifier, usually a network address.
pub type InstanceId = String;

/// Health verdict for an instance or a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// The instance could not be fetched. Never produced by classification.
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Unhealthy => "Unhealthy",
            HealthStatus::Unknown => "Unknown",
        }
    }

    /// Case-insensitive comparison against a user-supplied status string.
    pub fn matches(&self, query: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(query.trim())
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the fetcher does when a single instance cannot be fetched or parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceErrorPolicy {
    /// Fail the whole snapshot on the first instance error.
    #[default]
    Abort,
    /// Record the instance as unreachable and keep going.
    MarkUnknown,
}

impl FromStr for InstanceErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(InstanceErrorPolicy::Abort),
            "mark-unknown" | "mark_unknown" => Ok(InstanceErrorPolicy::MarkUnknown),
            other => Err(format!("unknown instance error policy `{other}` (expected abort or mark-unknown)")),
        }
    }
}

// ── Registry records ──────────────────────────────────────────────

/// Instance record exactly as the registry returns it.
///
/// Fields are kept as loose JSON so that validation can name the offending
/// field instead of failing inside serde.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInstanceStats {
    pub service: Option<serde_json::Value>,
    pub cpu: Option<serde_json::Value>,
    pub memory: Option<serde_json::Value>,
    /// Everything else the registry sent.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Validated per-instance metric sample from one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetric {
    pub id: InstanceId,
    pub service: String,
    /// CPU utilization in percent. Not clamped to 0–100.
    pub cpu: u32,
    /// Memory utilization in percent. Not clamped to 0–100.
    pub memory: u32,
    /// Registry fields that cpxstat passes through without interpreting.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl InstanceMetric {
    pub fn new(id: impl Into<String>, service: impl Into<String>, cpu: u32, memory: u32) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            cpu,
            memory,
            extra: BTreeMap::new(),
        }
    }

    /// Validate a raw registry record.
    pub fn from_raw(id: &str, raw: RawInstanceStats) -> MonitorResult<Self> {
        let service = match raw.service {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s,
            Some(serde_json::Value::String(_)) => {
                return Err(MonitorError::malformed(id, "service", "is empty"));
            }
            Some(other) => {
                return Err(MonitorError::malformed(id, "service", format!("is not a string: {other}")));
            }
            None => return Err(MonitorError::malformed(id, "service", "is missing")),
        };

        let cpu = parse_percent_field(id, "cpu", raw.cpu.as_ref())?;
        let memory = parse_percent_field(id, "memory", raw.memory.as_ref())?;

        Ok(Self {
            id: id.to_string(),
            service,
            cpu,
            memory,
            extra: raw.extra,
        })
    }

    pub fn cpu_display(&self) -> String {
        format_percent(self.cpu)
    }

    pub fn memory_display(&self) -> String {
        format_percent(self.memory)
    }
}

/// An instance metric with its classified health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHealth {
    #[serde(flatten)]
    pub metric: InstanceMetric,
    pub status: HealthStatus,
}

impl InstanceHealth {
    pub fn id(&self) -> &str {
        &self.metric.id
    }

    pub fn service(&self) -> &str {
        &self.metric.service
    }
}

/// Per-service rollup computed from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAggregate {
    pub service: String,
    /// Mean CPU percent, truncated.
    pub avg_cpu: u32,
    /// Mean memory percent, truncated.
    pub avg_memory: u32,
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub status: HealthStatus,
}

impl ServiceAggregate {
    pub fn cpu_display(&self) -> String {
        format_percent(self.avg_cpu)
    }

    pub fn memory_display(&self) -> String {
        format_percent(self.avg_memory)
    }
}

/// A roster entry whose detail fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreachableInstance {
    pub id: InstanceId,
    pub reason: String,
}

/// Everything fetched and classified in one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub instances: Vec<InstanceHealth>,
    /// Only populated under [`InstanceErrorPolicy::MarkUnknown`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreachable: Vec<UnreachableInstance>,
}

impl Snapshot {
    pub fn is_complete(&self) -> bool {
        self.unreachable.is_empty()
    }
}

// ── Percent helpers ───────────────────────────────────────────────

/// Render a percentage the way the registry does (`"37%"`).
pub fn format_percent(value: u32) -> String {
    format!("{value}%")
}

/// Parse `"37%"`, `" 37 % "` or `"37"` into 37.
pub fn parse_percent(s: &str) -> Option<u32> {
    let s = s.trim();
    let digits = s.strip_suffix('%').unwrap_or(s).trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_percent_field(
    id: &str,
    field: &'static str,
    value: Option<&serde_json::Value>,
) -> MonitorResult<u32> {
    match value {
        None | Some(serde_json::Value::Null) => Err(MonitorError::malformed(id, field, "is missing")),
        Some(serde_json::Value::String(s)) => parse_percent(s)
            .ok_or_else(|| MonitorError::malformed(id, field, format!("is not a percentage: {s:?}"))),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| MonitorError::malformed(id, field, format!("is not a whole percentage: {n}"))),
        Some(other) => Err(MonitorError::malformed(id, field, format!("has unexpected type: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawInstanceStats {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parse_percent_variants() {
        assert_eq!(parse_percent("37%"), Some(37));
        assert_eq!(parse_percent(" 37 % "), Some(37));
        assert_eq!(parse_percent("0"), Some(0));
        assert_eq!(parse_percent("120%"), Some(120));
        assert_eq!(parse_percent(""), None);
        assert_eq!(parse_percent("%"), None);
        assert_eq!(parse_percent("abc"), None);
        assert_eq!(parse_percent("-3%"), None);
        assert_eq!(parse_percent("4.5%"), None);
    }

    #[test]
    fn from_raw_parses_registry_record() {
        let metric = InstanceMetric::from_raw(
            "10.0.0.1",
            raw(json!({"service": "AuthService", "cpu": "85%", "memory": "10%"})),
        )
        .unwrap();
        assert_eq!(metric.id, "10.0.0.1");
        assert_eq!(metric.service, "AuthService");
        assert_eq!(metric.cpu, 85);
        assert_eq!(metric.memory, 10);
        assert!(metric.extra.is_empty());
    }

    #[test]
    fn from_raw_accepts_numeric_fields() {
        let metric =
            InstanceMetric::from_raw("a", raw(json!({"service": "Geo", "cpu": 12, "memory": 7}))).unwrap();
        assert_eq!((metric.cpu, metric.memory), (12, 7));
    }

    #[test]
    fn from_raw_keeps_extra_fields() {
        let metric = InstanceMetric::from_raw(
            "a",
            raw(json!({"service": "Geo", "cpu": "1%", "memory": "2%", "zone": "eu-west"})),
        )
        .unwrap();
        assert_eq!(metric.extra.get("zone"), Some(&json!("eu-west")));
    }

    #[test]
    fn from_raw_names_missing_field() {
        let err = InstanceMetric::from_raw("10.0.0.9", raw(json!({"service": "Geo", "cpu": "1%"}))).unwrap_err();
        assert_eq!(
            err,
            MonitorError::MalformedMetric {
                instance: "10.0.0.9".to_string(),
                field: "memory",
                reason: "is missing".to_string(),
            }
        );
    }

    #[test]
    fn from_raw_rejects_non_numeric_cpu() {
        let err = InstanceMetric::from_raw("x", raw(json!({"service": "Geo", "cpu": "high", "memory": "2%"})))
            .unwrap_err();
        assert!(matches!(err, MonitorError::MalformedMetric { field: "cpu", .. }));
        assert!(err.to_string().contains("high"));
    }

    #[test]
    fn from_raw_rejects_bad_service() {
        let err = InstanceMetric::from_raw("x", raw(json!({"service": 5, "cpu": "1%", "memory": "2%"})))
            .unwrap_err();
        assert!(matches!(err, MonitorError::MalformedMetric { field: "service", .. }));

        let err = InstanceMetric::from_raw("x", raw(json!({"service": " ", "cpu": "1%", "memory": "2%"})))
            .unwrap_err();
        assert!(matches!(err, MonitorError::MalformedMetric { field: "service", .. }));
    }

    #[test]
    fn from_raw_rejects_negative_number() {
        let err = InstanceMetric::from_raw("x", raw(json!({"service": "Geo", "cpu": -1, "memory": 2})))
            .unwrap_err();
        assert!(matches!(err, MonitorError::MalformedMetric { field: "cpu", .. }));
    }

    #[test]
    fn status_matching_is_case_insensitive() {
        assert!(HealthStatus::Healthy.matches("healthy"));
        assert!(HealthStatus::Unhealthy.matches("UNHEALTHY"));
        assert!(!HealthStatus::Healthy.matches("unhealthy"));
        assert!(!HealthStatus::Healthy.matches("fine"));
    }

    #[test]
    fn instance_health_serializes_flat() {
        let health = InstanceHealth {
            metric: InstanceMetric::new("10.0.0.1", "Auth", 85, 10),
            status: HealthStatus::Unhealthy,
        };
        let value = serde_json::to_value(&health).unwrap();
        assert_eq!(value["id"], "10.0.0.1");
        assert_eq!(value["status"], "Unhealthy");
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("abort".parse::<InstanceErrorPolicy>(), Ok(InstanceErrorPolicy::Abort));
        assert_eq!("Mark-Unknown".parse::<InstanceErrorPolicy>(), Ok(InstanceErrorPolicy::MarkUnknown));
        assert!("retry".parse::<InstanceErrorPolicy>().is_err());
    }
}
