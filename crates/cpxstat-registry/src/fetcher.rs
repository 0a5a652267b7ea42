//! Snapshot fetcher — roster fan-out, validation, and classification.
//!
//! One request per instance, run concurrently up to a configured limit.
//! Results keep roster order regardless of completion order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use cpxstat_core::config::RegistryConfig;
use cpxstat_core::{
    InstanceErrorPolicy, InstanceHealth, InstanceId, InstanceMetric, MonitorResult, Snapshot,
    UnreachableInstance,
};
use cpxstat_health::classify_metric;

use crate::source::MetricsSource;

const DEFAULT_CONCURRENCY: usize = 8;

/// Fetches and classifies fleet snapshots from a `MetricsSource`.
pub struct SnapshotFetcher<S> {
    source: Arc<S>,
    concurrency: usize,
    policy: InstanceErrorPolicy,
}

impl<S: MetricsSource> SnapshotFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            concurrency: DEFAULT_CONCURRENCY,
            policy: InstanceErrorPolicy::Abort,
        }
    }

    pub fn from_config(source: S, config: &RegistryConfig) -> Self {
        Self::new(source)
            .with_concurrency(config.concurrency)
            .with_policy(config.on_instance_error)
    }

    /// Maximum in-flight instance fetches. `1` fetches sequentially.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_policy(mut self, policy: InstanceErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn policy(&self) -> InstanceErrorPolicy {
        self.policy
    }

    /// Fetch, validate and classify one instance.
    pub async fn fetch_instance(&self, id: &str) -> MonitorResult<InstanceHealth> {
        fetch_one(&*self.source, id).await
    }

    /// Fetch one instance when `instance_id` is given, otherwise the whole fleet.
    ///
    /// A roster failure always fails the snapshot. Per-instance failures
    /// follow the configured [`InstanceErrorPolicy`]; a single requested
    /// instance that fails is always an error.
    pub async fn fetch_snapshot(&self, instance_id: Option<&str>) -> MonitorResult<Snapshot> {
        if let Some(id) = instance_id {
            let instance = self.fetch_instance(id).await?;
            return Ok(Snapshot {
                instances: vec![instance],
                unreachable: Vec::new(),
            });
        }

        let roster = self.source.list_instances().await?;
        self.fetch_roster(roster).await
    }

    async fn fetch_roster(&self, roster: Vec<InstanceId>) -> MonitorResult<Snapshot> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, id) in roster.iter().cloned().enumerate() {
            let source = Arc::clone(&self.source);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let result = fetch_one(&*source, &id).await;
                (index, id, result)
            });
        }

        let mut slots: Vec<Option<Result<InstanceHealth, UnreachableInstance>>> =
            (0..roster.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            let (index, id, result) = match joined {
                Ok(done) => done,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    warn!(error = %e, "instance fetch task cancelled");
                    continue;
                }
            };

            match result {
                Ok(instance) => slots[index] = Some(Ok(instance)),
                Err(e) => match self.policy {
                    InstanceErrorPolicy::Abort => {
                        tasks.abort_all();
                        return Err(e);
                    }
                    InstanceErrorPolicy::MarkUnknown => {
                        warn!(instance = %id, error = %e, "instance unreachable, marking unknown");
                        slots[index] = Some(Err(UnreachableInstance {
                            id,
                            reason: e.to_string(),
                        }));
                    }
                },
            }
        }

        let mut snapshot = Snapshot::default();
        for slot in slots.into_iter().flatten() {
            match slot {
                Ok(instance) => snapshot.instances.push(instance),
                Err(unreachable) => snapshot.unreachable.push(unreachable),
            }
        }

        debug!(
            instances = snapshot.instances.len(),
            unreachable = snapshot.unreachable.len(),
            "snapshot fetched"
        );
        Ok(snapshot)
    }
}

async fn fetch_one<S: MetricsSource>(source: &S, id: &str) -> MonitorResult<InstanceHealth> {
    let raw = source.fetch_instance(id).await?;
    let metric = InstanceMetric::from_raw(id, raw)?;
    Ok(classify_metric(metric))
}
