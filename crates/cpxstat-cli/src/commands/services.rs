use anyhow::Context;

use cpxstat_core::{ServiceAggregate, Snapshot};
use cpxstat_health::{Query, ServiceSortKey, aggregate, sort_services};
use cpxstat_registry::{MetricsSource, SnapshotFetcher};

use crate::render::{OutputFormat, render_services};

/// Filter and ordering applied to service rollups.
#[derive(Debug, Clone, Default)]
pub struct ServiceView {
    pub query: Query,
    pub sort: ServiceSortKey,
}

impl ServiceView {
    pub fn new(query: Query, sort: ServiceSortKey) -> Self {
        Self { query, sort }
    }

    pub fn rollup(&self, snapshot: &Snapshot) -> Vec<ServiceAggregate> {
        let services = aggregate(&snapshot.instances, self.query.service.as_deref());
        let mut rows = self.query.apply(&services);
        sort_services(&mut rows, self.sort);
        rows
    }

    pub fn render(&self, snapshot: &Snapshot, format: OutputFormat) -> anyhow::Result<String> {
        render_services(&self.rollup(snapshot), &snapshot.unreachable, format, false)
    }
}

pub async fn list<S: MetricsSource>(
    fetcher: &SnapshotFetcher<S>,
    view: &ServiceView,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let snapshot = fetcher
        .fetch_snapshot(None)
        .await
        .context("failed to fetch fleet snapshot")?;
    view.render(&snapshot, format)
}

/// Rollup for one service. A name with no instances prints an empty table.
pub async fn show<S: MetricsSource>(
    fetcher: &SnapshotFetcher<S>,
    service: &str,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let snapshot = fetcher
        .fetch_snapshot(None)
        .await
        .with_context(|| format!("failed to fetch instances for service {service}"))?;
    let rows = aggregate(&snapshot.instances, Some(service));
    render_services(&rows, &snapshot.unreachable, format, true)
}
