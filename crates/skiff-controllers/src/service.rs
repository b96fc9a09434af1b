//! Service reconciler.
//!
//! Resolves each Service's label selector against the managed containers
//! and records the result in the service's status block. No data-plane
//! programming happens here; for NodePort services the status is annotated
//! with a single loopback ingress, which is all a single-node deployment
//! needs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use skiff_core::labels;
use skiff_core::manifest::{LoadBalancerIngress, ServiceEndpoint, ServiceType};
use skiff_runtime::{ContainerFilter, ContainerRuntime};
use skiff_state::Store;

/// Default tick period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);

/// The single node's address, used for NodePort ingress entries.
const NODE_ADDRESS: &str = "127.0.0.1";

pub struct ServiceController {
    store: Store,
    runtime: Arc<dyn ContainerRuntime>,
}

impl ServiceController {
    pub fn new(store: Store, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { store, runtime }
    }

    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(period_secs = period.as_secs(), "service reconciler started");
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
                    info!("service reconciler stopped");
                    break;
                }
            }
        }
    }

    /// Resolve selectors for every service against one listing of the
    /// managed containers.
    pub async fn reconcile_tick(&self) {
        let services = self.store.list_services();
        if services.is_empty() {
            return;
        }

        let managed = match self
            .runtime
            .list_containers(&ContainerFilter::label(
                labels::MANAGED_BY,
                labels::MANAGED_BY_VALUE,
            ))
            .await
        {
            Ok(containers) => containers,
            Err(e) => {
                warn!(error = %e, "failed to list managed containers");
                return;
            }
        };

        for service in services {
            let endpoints: Vec<ServiceEndpoint> = managed
                .iter()
                .filter(|c| labels::selector_matches(&c.labels, &service.spec.selector))
                .map(|c| ServiceEndpoint {
                    pod: c.labels.get(labels::POD).cloned().unwrap_or_default(),
                    container: c.labels.get(labels::CONTAINER).cloned().unwrap_or_default(),
                    container_id: c.id.clone(),
                })
                .collect();

            // The service may have been deleted since the snapshot.
            let Some(mut current) = self.store.get_service(&service.metadata.name) else {
                continue;
            };

            debug!(
                service = %current.metadata.name,
                endpoints = endpoints.len(),
                "selector resolved"
            );

            let mut status = current.status.clone();
            status.endpoints = endpoints;
            if current.spec.service_type == ServiceType::NodePort {
                status.load_balancer.ingress = vec![LoadBalancerIngress {
                    ip: NODE_ADDRESS.to_string(),
                }];
            }

            if current.status != status {
                current.status = status;
                self.store.put_service(&current);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_core::config::RuntimeConfig;
    use skiff_core::manifest::*;
    use skiff_runtime::fake::FakeRuntime;
    use skiff_runtime::RuntimeError;

    fn setup() -> (Store, Arc<FakeRuntime>, ServiceController, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let fake = Arc::new(FakeRuntime::new(RuntimeConfig::default()));
        let controller = ServiceController::new(store.clone(), fake.clone());
        (store, fake, controller, dir)
    }

    fn service(name: &str, selector: &[(&str, &str)], service_type: ServiceType) -> Service {
        let mut s = Service {
            metadata: ObjectMeta {
                name: name.to_string(),
                ..Default::default()
            },
            spec: ServiceSpec {
                selector: selector
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                service_type,
                ports: vec![ServicePort {
                    port: 80,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }],
            },
            ..Default::default()
        };
        s.apply_defaults();
        s
    }

    async fn spawn_container(fake: &FakeRuntime, pod: &str, app: &str) {
        fake.preload_image("nginx:1.25");
        let spec = ContainerSpec {
            name: "nginx".to_string(),
            image: "nginx:1.25".to_string(),
            ..Default::default()
        };
        let extra: Labels = [
            ("app".to_string(), app.to_string()),
            ("deployment".to_string(), app.to_string()),
        ]
        .into();
        let info = fake.create_container(&spec, pod, &extra).await.unwrap();
        fake.start_container(&info.id).await.unwrap();
    }

    #[tokio::test]
    async fn selector_resolves_matching_endpoints() {
        let (store, fake, controller, _dir) = setup();
        for pod in ["web-0", "web-1", "web-2"] {
            spawn_container(&fake, pod, "web").await;
        }
        spawn_container(&fake, "db-0", "db").await;
        store.put_service(&service("web-svc", &[("app", "web")], ServiceType::ClusterIP));

        controller.reconcile_tick().await;

        let svc = store.get_service("web-svc").unwrap();
        assert_eq!(svc.status.endpoints.len(), 3);
        assert!(svc.status.endpoints.iter().all(|e| e.pod.starts_with("web-")));
        assert!(svc.status.load_balancer.ingress.is_empty());
    }

    #[tokio::test]
    async fn selector_requires_every_pair_to_match() {
        let (store, fake, controller, _dir) = setup();
        spawn_container(&fake, "web-0", "web").await;
        store.put_service(&service(
            "strict",
            &[("app", "web"), ("tier", "frontend")],
            ServiceType::ClusterIP,
        ));

        controller.reconcile_tick().await;

        let svc = store.get_service("strict").unwrap();
        assert!(svc.status.endpoints.is_empty());
    }

    #[tokio::test]
    async fn extra_container_labels_do_not_prevent_matching() {
        let (store, fake, controller, _dir) = setup();
        spawn_container(&fake, "web-0", "web").await;
        store.put_service(&service("loose", &[("app", "web")], ServiceType::ClusterIP));

        controller.reconcile_tick().await;

        // The container also carries pod/container/deployment labels;
        // only the selector pairs must match.
        assert_eq!(store.get_service("loose").unwrap().status.endpoints.len(), 1);
    }

    #[tokio::test]
    async fn nodeport_gets_loopback_ingress() {
        let (store, fake, controller, _dir) = setup();
        spawn_container(&fake, "web-0", "web").await;
        store.put_service(&service("np", &[("app", "web")], ServiceType::NodePort));

        controller.reconcile_tick().await;

        let svc = store.get_service("np").unwrap();
        assert_eq!(svc.status.load_balancer.ingress.len(), 1);
        assert_eq!(svc.status.load_balancer.ingress[0].ip, "127.0.0.1");
    }

    #[tokio::test]
    async fn endpoints_shrink_when_containers_go_away() {
        let (store, fake, controller, _dir) = setup();
        spawn_container(&fake, "web-0", "web").await;
        spawn_container(&fake, "web-1", "web").await;
        store.put_service(&service("web-svc", &[("app", "web")], ServiceType::ClusterIP));

        controller.reconcile_tick().await;
        assert_eq!(store.get_service("web-svc").unwrap().status.endpoints.len(), 2);

        let containers = fake
            .list_containers(&ContainerFilter::label("app", "web"))
            .await
            .unwrap();
        fake.stop_container(&containers[0].id, 0).await.unwrap();
        fake.remove_container(&containers[0].id).await.unwrap();

        controller.reconcile_tick().await;
        assert_eq!(store.get_service("web-svc").unwrap().status.endpoints.len(), 1);
    }

    #[tokio::test]
    async fn runtime_failure_leaves_status_untouched() {
        let (store, fake, controller, _dir) = setup();
        spawn_container(&fake, "web-0", "web").await;
        store.put_service(&service("web-svc", &[("app", "web")], ServiceType::ClusterIP));

        controller.reconcile_tick().await;
        assert_eq!(store.get_service("web-svc").unwrap().status.endpoints.len(), 1);

        fake.set_unavailable(true);
        controller.reconcile_tick().await;

        // Stale but intact; the next successful tick refreshes it.
        assert_eq!(store.get_service("web-svc").unwrap().status.endpoints.len(), 1);
        assert!(matches!(
            fake.health_check().await,
            Err(RuntimeError::Unavailable(_))
        ));
    }
}
