//! Workload reconciler.
//!
//! Brings the number of containers labeled with each Deployment and
//! StatefulSet into agreement with the declared replica count. Replica
//! state is re-derived from the runtime on every tick; the ownership labels
//! on containers are the only record of who owns what.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use skiff_core::labels;
use skiff_core::manifest::{PodTemplateSpec, WorkloadSpec, WorkloadStatus};
use skiff_runtime::{ContainerFilter, ContainerInfo, ContainerRuntime, ContainerStatus, RuntimeResult};
use skiff_state::Store;

/// Default tick period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

/// Graceful stop timeout handed to the runtime on scale-down.
const STOP_TIMEOUT_SECS: u64 = 30;

pub struct WorkloadController {
    store: Store,
    runtime: Arc<dyn ContainerRuntime>,
}

impl WorkloadController {
    pub fn new(store: Store, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { store, runtime }
    }

    /// Run the reconcile loop until the shutdown channel flips.
    ///
    /// Ticks that overrun the period are logged; an overrunning tick delays
    /// the next one rather than triggering a burst to catch up.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(period_secs = period.as_secs(), "workload reconciler started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    self.reconcile_tick().await;
                    if started.elapsed() > period {
                        warn!(
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "reconcile tick overran its period"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    info!("workload reconciler stopped");
                    break;
                }
            }
        }
    }

    /// One reconcile pass over every workload. A failure for one workload
    /// never aborts the others.
    pub async fn reconcile_tick(&self) {
        for deployment in self.store.list_deployments() {
            let name = deployment.metadata.name.clone();
            match self
                .reconcile_workload(labels::DEPLOYMENT, &name, &deployment.spec, false)
                .await
            {
                Ok(observed) => {
                    if let Some(mut current) = self.store.get_deployment(&name) {
                        let status = observed_status(&observed);
                        if current.status != status {
                            current.status = status;
                            self.store.put_deployment(&current);
                        }
                    }
                }
                Err(e) => warn!(deployment = %name, error = %e, "reconciliation failed"),
            }
        }

        for statefulset in self.store.list_statefulsets() {
            let name = statefulset.metadata.name.clone();
            match self
                .reconcile_workload(labels::STATEFULSET, &name, &statefulset.spec, true)
                .await
            {
                Ok(observed) => {
                    if let Some(mut current) = self.store.get_statefulset(&name) {
                        let status = observed_status(&observed);
                        if current.status != status {
                            current.status = status;
                            self.store.put_statefulset(&current);
                        }
                    }
                }
                Err(e) => warn!(statefulset = %name, error = %e, "reconciliation failed"),
            }
        }
    }

    /// Reconcile a single workload and return the containers observed after
    /// any corrective actions. `ordered_removal` selects the StatefulSet
    /// scale-down order (highest ordinal first).
    async fn reconcile_workload(
        &self,
        owner_key: &str,
        name: &str,
        spec: &WorkloadSpec,
        ordered_removal: bool,
    ) -> RuntimeResult<Vec<ContainerInfo>> {
        let filter = ContainerFilter::label(owner_key, name);
        let actual = self.runtime.list_containers(&filter).await?;
        let desired = spec.replica_count().max(0) as usize;

        if actual.len() < desired {
            let needed = desired - actual.len();
            info!(
                workload = %name,
                have = actual.len(),
                want = desired,
                "scaling up"
            );

            // Ordinals already in use, derived from the pod labels of live
            // containers; new replicas fill the lowest free slots.
            let used: BTreeSet<usize> = actual
                .iter()
                .filter_map(|c| c.labels.get(labels::POD))
                .filter_map(|pod| labels::pod_ordinal(pod, name))
                .collect();
            let free = (0..desired).filter(|i| !used.contains(i)).take(needed);

            for ordinal in free {
                if let Err(e) = self
                    .create_replica(owner_key, name, &spec.template, ordinal)
                    .await
                {
                    warn!(workload = %name, ordinal, error = %e, "failed to create replica");
                }
            }
        } else if actual.len() > desired {
            let excess = actual.len() - desired;
            info!(
                workload = %name,
                have = actual.len(),
                want = desired,
                "scaling down"
            );

            let mut victims = actual.clone();
            if ordered_removal {
                // Highest ordinal first; containers with no parseable
                // ordinal are strays and go before everything else.
                victims.sort_by_key(|c| {
                    std::cmp::Reverse(
                        c.labels
                            .get(labels::POD)
                            .and_then(|pod| labels::pod_ordinal(pod, name))
                            .unwrap_or(usize::MAX),
                    )
                });
            }

            for container in victims.iter().take(excess) {
                if let Err(e) = self
                    .runtime
                    .stop_container(&container.id, STOP_TIMEOUT_SECS)
                    .await
                {
                    warn!(id = %container.id, error = %e, "failed to stop container");
                    continue;
                }
                if let Err(e) = self.runtime.remove_container(&container.id).await {
                    warn!(id = %container.id, error = %e, "failed to remove container");
                }
            }
        }

        self.runtime.list_containers(&filter).await
    }

    /// Create all containers for one replica: pull, create, start. A pull
    /// failure is tolerated (the image may already be present); a create or
    /// start failure aborts the replica, removing any partially created
    /// container.
    async fn create_replica(
        &self,
        owner_key: &str,
        owner: &str,
        template: &PodTemplateSpec,
        ordinal: usize,
    ) -> RuntimeResult<()> {
        let pod_name = format!("{owner}-{ordinal}");

        let mut extra_labels = template.metadata.labels.clone();
        extra_labels.insert(owner_key.to_string(), owner.to_string());

        for container in &template.spec.containers {
            if let Err(e) = self.runtime.pull_image(&container.image).await {
                warn!(image = %container.image, error = %e, "image pull failed, continuing");
            }

            let info = self
                .runtime
                .create_container(container, &pod_name, &extra_labels)
                .await?;

            if let Err(e) = self.runtime.start_container(&info.id).await {
                if let Err(remove_err) = self.runtime.remove_container(&info.id).await {
                    warn!(
                        id = %info.id,
                        error = %remove_err,
                        "failed to clean up container after start failure"
                    );
                }
                return Err(e);
            }

            debug!(
                workload = %owner,
                pod = %pod_name,
                container = %container.name,
                id = %info.id,
                "replica container started"
            );
        }

        Ok(())
    }
}

fn observed_status(observed: &[ContainerInfo]) -> WorkloadStatus {
    WorkloadStatus {
        replicas: observed.len() as i32,
        ready_replicas: observed
            .iter()
            .filter(|c| c.status == ContainerStatus::Running)
            .count() as i32,
    }
}
