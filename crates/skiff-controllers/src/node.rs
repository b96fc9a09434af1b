//! Node status reporter.
//!
//! Periodically asks the runtime for system facts and overwrites the single
//! `local-node` resource with capacity, conditions, and runtime versions.
//! The `Ready` condition is true exactly when the info call succeeded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use skiff_core::manifest::{Node, NodeCondition, NodeStatus, NodeSystemInfo, ObjectMeta};
use skiff_runtime::{ContainerRuntime, SystemInfo};
use skiff_state::Store;

/// Default tick period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

/// Fixed name of the single node resource.
pub const NODE_NAME: &str = "local-node";

pub struct NodeReporter {
    store: Store,
    runtime: Arc<dyn ContainerRuntime>,
}

impl NodeReporter {
    pub fn new(store: Store, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { store, runtime }
    }

    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(period_secs = period.as_secs(), "node status reporter started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    self.report_tick().await;
                    if started.elapsed() > period {
                        warn!(
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "report tick overran its period"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    info!("node status reporter stopped");
                    break;
                }
            }
        }
    }

    pub async fn report_tick(&self) {
        match self.runtime.system_info().await {
            Ok(system) => {
                let node = build_node(&system);
                self.store.put_node(&node);
                debug!(
                    ncpu = system.ncpu,
                    mem_total = system.mem_total,
                    runtime = %system.runtime_name,
                    "node status updated"
                );
            }
            Err(e) => {
                warn!(error = %e, "system info unavailable, marking node not ready");
                let mut node = self.store.get_node(NODE_NAME).unwrap_or_else(empty_node);
                node.status.conditions = vec![ready_condition(false, "RuntimeUnreachable", &e.to_string())];
                self.store.put_node(&node);
            }
        }
    }
}

fn empty_node() -> Node {
    let mut node = Node {
        metadata: ObjectMeta {
            name: NODE_NAME.to_string(),
            ..Default::default()
        },
        ..Default::default()
    };
    node.apply_defaults();
    node
}

fn build_node(system: &SystemInfo) -> Node {
    let capacity: std::collections::BTreeMap<String, String> = [
        ("cpu".to_string(), system.ncpu.to_string()),
        ("memory".to_string(), system.mem_total.to_string()),
    ]
    .into();

    let mut node = empty_node();
    node.status = NodeStatus {
        allocatable: capacity.clone(),
        capacity,
        conditions: vec![ready_condition(true, "NodeReady", "Node is ready")],
        node_info: NodeSystemInfo {
            kernel_version: system.kernel_version.clone(),
            os_image: system.operating_system.clone(),
            operating_system: system.operating_system.clone(),
            architecture: system.architecture.clone(),
            container_runtime_version: format!(
                "{}://{}",
                system.runtime_name, system.runtime_version
            ),
        },
    };
    node
}

fn ready_condition(ready: bool, reason: &str, message: &str) -> NodeCondition {
    NodeCondition {
        condition_type: "Ready".to_string(),
        status: if ready { "True" } else { "False" }.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_heartbeat_time: Some(Utc::now()),
    }
}
