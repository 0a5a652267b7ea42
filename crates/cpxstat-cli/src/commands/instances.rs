use anyhow::Context;

use cpxstat_core::Snapshot;
use cpxstat_health::{InstanceSortKey, Query, sort_instances};
use cpxstat_registry::{MetricsSource, SnapshotFetcher};

use crate::render::{OutputFormat, render_instance_detail, render_instances};

/// Filter and ordering applied to instance rows.
#[derive(Debug, Clone, Default)]
pub struct InstanceView {
    pub query: Query,
    pub sort: InstanceSortKey,
}

impl InstanceView {
    pub fn new(query: Query, sort: InstanceSortKey) -> Self {
        Self { query, sort }
    }

    pub fn render(&self, snapshot: &Snapshot, format: OutputFormat) -> anyhow::Result<String> {
        let mut rows = self.query.apply(&snapshot.instances);
        sort_instances(&mut rows, self.sort);
        let unreachable = self.query.apply(&snapshot.unreachable);
        render_instances(&rows, &unreachable, format)
    }
}

pub async fn list<S: MetricsSource>(
    fetcher: &SnapshotFetcher<S>,
    view: &InstanceView,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let snapshot = fetcher
        .fetch_snapshot(None)
        .await
        .context("failed to fetch fleet snapshot")?;
    view.render(&snapshot, format)
}

pub async fn show<S: MetricsSource>(
    fetcher: &SnapshotFetcher<S>,
    instance: &str,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let health = fetcher
        .fetch_instance(instance)
        .await
        .with_context(|| format!("failed to fetch instance {instance}"))?;
    render_instance_detail(&health, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpxstat_core::InstanceErrorPolicy;
    use cpxstat_registry::StaticSource;

    fn fleet() -> StaticSource {
        StaticSource::new()
            .with_instance("10.58.1.2", "AuthService", "20%", "30%")
            .with_instance("10.58.1.1", "AuthService", "85%", "10%")
            .with_instance("10.58.1.3", "GeoService", "4%", "61%")
    }

    fn json_ids(out: &str) -> Vec<String> {
        let doc: serde_json::Value = serde_json::from_str(out).unwrap();
        doc["instances"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn list_sorts_by_id_by_default() {
        let fetcher = SnapshotFetcher::new(fleet());
        let out = list(&fetcher, &InstanceView::default(), OutputFormat::Json).await.unwrap();
        assert_eq!(json_ids(&out), vec!["10.58.1.1", "10.58.1.2", "10.58.1.3"]);
    }

    #[tokio::test]
    async fn list_applies_filter_and_sort() {
        let fetcher = SnapshotFetcher::new(fleet());
        let view = InstanceView::new(Query::new(Some("authservice"), None), InstanceSortKey::Memory);
        let out = list(&fetcher, &view, OutputFormat::Json).await.unwrap();
        assert_eq!(json_ids(&out), vec!["10.58.1.2", "10.58.1.1"]);
    }

    #[tokio::test]
    async fn list_shows_unreachable_as_unknown() {
        let fetcher = SnapshotFetcher::new(fleet().with_unreachable("10.58.9.9"))
            .with_policy(InstanceErrorPolicy::MarkUnknown);
        let out = list(&fetcher, &InstanceView::default(), OutputFormat::Table).await.unwrap();
        assert!(out.contains("10.58.9.9"));
        assert!(out.contains("Unknown"));

        let unhealthy_only = InstanceView::new(Query::new(None, Some("unhealthy")), InstanceSortKey::Id);
        let out = list(&fetcher, &unhealthy_only, OutputFormat::Table).await.unwrap();
        assert!(!out.contains("10.58.9.9"));
    }

    #[tokio::test]
    async fn list_fails_when_registry_fails() {
        let fetcher = SnapshotFetcher::new(fleet().with_unreachable("10.58.9.9"));
        let err = list(&fetcher, &InstanceView::default(), OutputFormat::Table).await.unwrap_err();
        assert!(format!("{err:#}").contains("registry unavailable"));
    }

    #[tokio::test]
    async fn show_one_instance() {
        let fetcher = SnapshotFetcher::new(fleet());
        let out = show(&fetcher, "10.58.1.1", OutputFormat::Json).await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc["id"], "10.58.1.1");
        assert_eq!(doc["status"], "Unhealthy");
    }

    #[tokio::test]
    async fn show_missing_instance_is_an_error() {
        let fetcher = SnapshotFetcher::new(fleet());
        let err = show(&fetcher, "10.9.9.9", OutputFormat::Table).await.unwrap_err();
        assert!(err.to_string().contains("10.9.9.9"));
    }
}
