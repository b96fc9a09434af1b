//! Store — strict-consistency resource cache with a durable mirror.
//!
//! Writers take the exclusive lock only long enough to mutate a map slot;
//! snapshot I/O always happens outside the lock. Reads clone values out, so
//! callers never retain references into the store. A failed snapshot write
//! is logged and swallowed: the next write supersedes it, and startup
//! recovery simply sees the previous version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use skiff_core::manifest::{Deployment, Node, Pod, Service, StatefulSet};

use crate::error::{StateError, StateResult};

const KIND_DIRS: [&str; 5] = ["pods", "deployments", "statefulsets", "services", "nodes"];

#[derive(Default)]
struct Maps {
    pods: HashMap<String, Pod>,
    deployments: HashMap<String, Deployment>,
    statefulsets: HashMap<String, StatefulSet>,
    services: HashMap<String, Service>,
    nodes: HashMap<String, Node>,
}

struct StoreInner {
    maps: RwLock<Maps>,
    data_dir: PathBuf,
}

/// Thread-safe state store. All maps sit behind one reader-writer lock.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store rooted at `data_dir`, creating the per-kind
    /// subdirectories. Failure here is fatal at startup.
    pub fn open(data_dir: &Path) -> StateResult<Self> {
        for dir in KIND_DIRS {
            let path = data_dir.join(dir);
            std::fs::create_dir_all(&path).map_err(|source| StateError::Init { path, source })?;
        }
        debug!(?data_dir, "state store opened");
        Ok(Self {
            inner: Arc::new(StoreInner {
                maps: RwLock::new(Maps::default()),
                data_dir: data_dir.to_path_buf(),
            }),
        })
    }

    /// Populate the in-memory maps from the snapshot directory.
    ///
    /// Files whose name starts with `.` or whose contents fail to parse are
    /// skipped with a warning; a missing subdirectory is treated as empty.
    pub fn load(&self) {
        let pods: Vec<Pod> = self.load_kind("pods");
        let deployments: Vec<Deployment> = self.load_kind("deployments");
        let statefulsets: Vec<StatefulSet> = self.load_kind("statefulsets");
        let services: Vec<Service> = self.load_kind("services");
        let nodes: Vec<Node> = self.load_kind("nodes");

        let mut maps = self.inner.maps.write().unwrap();
        maps.pods = pods
            .into_iter()
            .map(|p| (p.metadata.name.clone(), p))
            .collect();
        maps.deployments = deployments
            .into_iter()
            .map(|d| (d.metadata.name.clone(), d))
            .collect();
        maps.statefulsets = statefulsets
            .into_iter()
            .map(|s| (s.metadata.name.clone(), s))
            .collect();
        maps.services = services
            .into_iter()
            .map(|s| (s.metadata.name.clone(), s))
            .collect();
        maps.nodes = nodes
            .into_iter()
            .map(|n| (n.metadata.name.clone(), n))
            .collect();

        info!(
            pods = maps.pods.len(),
            deployments = maps.deployments.len(),
            statefulsets = maps.statefulsets.len(),
            services = maps.services.len(),
            nodes = maps.nodes.len(),
            "loaded state from snapshot"
        );
    }

    // ── Pods ───────────────────────────────────────────────────

    pub fn put_pod(&self, pod: &Pod) {
        let name = pod.metadata.name.clone();
        {
            let mut maps = self.inner.maps.write().unwrap();
            maps.pods.insert(name.clone(), pod.clone());
        }
        self.persist("pods", &name, pod);
    }

    pub fn get_pod(&self, name: &str) -> Option<Pod> {
        self.inner.maps.read().unwrap().pods.get(name).cloned()
    }

    pub fn list_pods(&self) -> Vec<Pod> {
        self.inner.maps.read().unwrap().pods.values().cloned().collect()
    }

    pub fn delete_pod(&self, name: &str) -> bool {
        let existed = {
            let mut maps = self.inner.maps.write().unwrap();
            maps.pods.remove(name).is_some()
        };
        self.unpersist("pods", name);
        existed
    }

    // ── Deployments ────────────────────────────────────────────

    pub fn put_deployment(&self, deployment: &Deployment) {
        let name = deployment.metadata.name.clone();
        {
            let mut maps = self.inner.maps.write().unwrap();
            maps.deployments.insert(name.clone(), deployment.clone());
        }
        self.persist("deployments", &name, deployment);
    }

    pub fn get_deployment(&self, name: &str) -> Option<Deployment> {
        self.inner.maps.read().unwrap().deployments.get(name).cloned()
    }

    pub fn list_deployments(&self) -> Vec<Deployment> {
        self.inner
            .maps
            .read()
            .unwrap()
            .deployments
            .values()
            .cloned()
            .collect()
    }

    pub fn delete_deployment(&self, name: &str) -> bool {
        let existed = {
            let mut maps = self.inner.maps.write().unwrap();
            maps.deployments.remove(name).is_some()
        };
        self.unpersist("deployments", name);
        existed
    }

    // ── StatefulSets ───────────────────────────────────────────

    pub fn put_statefulset(&self, statefulset: &StatefulSet) {
        let name = statefulset.metadata.name.clone();
        {
            let mut maps = self.inner.maps.write().unwrap();
            maps.statefulsets.insert(name.clone(), statefulset.clone());
        }
        self.persist("statefulsets", &name, statefulset);
    }

    pub fn get_statefulset(&self, name: &str) -> Option<StatefulSet> {
        self.inner.maps.read().unwrap().statefulsets.get(name).cloned()
    }

    pub fn list_statefulsets(&self) -> Vec<StatefulSet> {
        self.inner
            .maps
            .read()
            .unwrap()
            .statefulsets
            .values()
            .cloned()
            .collect()
    }

    pub fn delete_statefulset(&self, name: &str) -> bool {
        let existed = {
            let mut maps = self.inner.maps.write().unwrap();
            maps.statefulsets.remove(name).is_some()
        };
        self.unpersist("statefulsets", name);
        existed
    }

    // ── Services ───────────────────────────────────────────────

    pub fn put_service(&self, service: &Service) {
        let name = service.metadata.name.clone();
        {
            let mut maps = self.inner.maps.write().unwrap();
            maps.services.insert(name.clone(), service.clone());
        }
        self.persist("services", &name, service);
    }

    pub fn get_service(&self, name: &str) -> Option<Service> {
        self.inner.maps.read().unwrap().services.get(name).cloned()
    }

    pub fn list_services(&self) -> Vec<Service> {
        self.inner
            .maps
            .read()
            .unwrap()
            .services
            .values()
            .cloned()
            .collect()
    }

    pub fn delete_service(&self, name: &str) -> bool {
        let existed = {
            let mut maps = self.inner.maps.write().unwrap();
            maps.services.remove(name).is_some()
        };
        self.unpersist("services", name);
        existed
    }

    // ── Nodes ──────────────────────────────────────────────────

    pub fn put_node(&self, node: &Node) {
        let name = node.metadata.name.clone();
        {
            let mut maps = self.inner.maps.write().unwrap();
            maps.nodes.insert(name.clone(), node.clone());
        }
        self.persist("nodes", &name, node);
    }

    pub fn get_node(&self, name: &str) -> Option<Node> {
        self.inner.maps.read().unwrap().nodes.get(name).cloned()
    }

    pub fn list_nodes(&self) -> Vec<Node> {
        self.inner.maps.read().unwrap().nodes.values().cloned().collect()
    }

    pub fn delete_node(&self, name: &str) -> bool {
        let existed = {
            let mut maps = self.inner.maps.write().unwrap();
            maps.nodes.remove(name).is_some()
        };
        self.unpersist("nodes", name);
        existed
    }

    // ── Snapshot I/O (always outside the lock) ─────────────────

    fn snapshot_path(&self, kind_dir: &str, name: &str) -> PathBuf {
        self.inner.data_dir.join(kind_dir).join(format!("{name}.json"))
    }

    fn persist<T: Serialize>(&self, kind_dir: &str, name: &str, value: &T) {
        let path = self.snapshot_path(kind_dir, name);
        let data = match serde_json::to_vec_pretty(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(%name, kind = kind_dir, error = %e, "failed to encode snapshot");
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, data) {
            warn!(?path, error = %e, "failed to write snapshot");
        } else {
            debug!(kind = kind_dir, %name, "snapshot written");
        }
    }

    fn unpersist(&self, kind_dir: &str, name: &str) {
        let path = self.snapshot_path(kind_dir, name);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(?path, error = %e, "failed to remove snapshot");
            }
        }
    }

    fn load_kind<T: DeserializeOwned>(&self, kind_dir: &str) -> Vec<T> {
        let dir = self.inner.data_dir.join(kind_dir);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(?dir, error = %e, "snapshot directory unreadable, treating as empty");
                return Vec::new();
            }
        };

        let mut values = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with('.') || !file_name.ends_with(".json") {
                continue;
            }
            let data = match std::fs::read(&path) {
                Ok(data) => data,
                Err(e) => {
                    warn!(?path, error = %e, "skipping unreadable snapshot");
                    continue;
                }
            };
            match serde_json::from_slice(&data) {
                Ok(value) => values.push(value),
                Err(e) => warn!(?path, error = %e, "skipping unparseable snapshot"),
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_core::manifest::*;

    fn test_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (store, dir)
    }

    fn test_deployment(name: &str, replicas: i32) -> Deployment {
        let mut d = Deployment {
            metadata: ObjectMeta {
                name: name.to_string(),
                ..Default::default()
            },
            spec: WorkloadSpec {
                replicas: Some(replicas),
                template: PodTemplateSpec {
                    spec: PodSpec {
                        containers: vec![ContainerSpec {
                            name: "nginx".to_string(),
                            image: "nginx:1.25".to_string(),
                            ..Default::default()
                        }],
                        ..Default::default()
                    },
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        d.apply_defaults();
        d
    }

    fn test_service(name: &str) -> Service {
        let mut s = Service {
            metadata: ObjectMeta {
                name: name.to_string(),
                ..Default::default()
            },
            spec: ServiceSpec {
                selector: [("app".to_string(), name.to_string())].into(),
                ports: vec![ServicePort {
                    port: 80,
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        s.apply_defaults();
        s
    }

    #[test]
    fn put_and_get() {
        let (store, _dir) = test_store();
        let d = test_deployment("web", 3);

        store.put_deployment(&d);
        assert_eq!(store.get_deployment("web"), Some(d));
    }

    #[test]
    fn get_nonexistent_returns_none() {
        let (store, _dir) = test_store();
        assert!(store.get_deployment("nope").is_none());
        assert!(store.get_pod("nope").is_none());
        assert!(store.get_node("nope").is_none());
    }

    #[test]
    fn list_returns_point_in_time_copies() {
        let (store, _dir) = test_store();
        store.put_deployment(&test_deployment("a", 1));
        store.put_deployment(&test_deployment("b", 2));

        let listed = store.list_deployments();
        assert_eq!(listed.len(), 2);

        // Mutating the store after the list does not affect the copies.
        store.delete_deployment("a");
        assert_eq!(listed.len(), 2);
        assert_eq!(store.list_deployments().len(), 1);
    }

    #[test]
    fn last_writer_wins() {
        let (store, _dir) = test_store();
        store.put_deployment(&test_deployment("web", 1));
        store.put_deployment(&test_deployment("web", 5));

        assert_eq!(
            store.get_deployment("web").unwrap().spec.replica_count(),
            5
        );
        assert_eq!(store.list_deployments().len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, _dir) = test_store();
        store.put_service(&test_service("svc"));

        assert!(store.delete_service("svc"));
        assert!(!store.delete_service("svc"));
        assert!(store.get_service("svc").is_none());
    }

    #[test]
    fn read_your_writes_across_threads() {
        let (store, _dir) = test_store();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..32 {
                    store.put_deployment(&test_deployment(&format!("d{i}"), i));
                }
            })
        };
        writer.join().unwrap();

        for i in 0..32 {
            let got = store.get_deployment(&format!("d{i}")).unwrap();
            assert_eq!(got.spec.replica_count(), i);
        }
    }

    #[test]
    fn snapshot_file_layout() {
        let (store, dir) = test_store();
        store.put_deployment(&test_deployment("web", 3));
        store.put_service(&test_service("web-svc"));

        assert!(dir.path().join("deployments/web.json").exists());
        assert!(dir.path().join("services/web-svc.json").exists());

        store.delete_deployment("web");
        assert!(!dir.path().join("deployments/web.json").exists());
    }

    #[test]
    fn durability_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let original = test_deployment("web", 3);

        {
            let store = Store::open(dir.path()).unwrap();
            store.put_deployment(&original);
            store.put_service(&test_service("web-svc"));
        }

        let store = Store::open(dir.path()).unwrap();
        store.load();

        let loaded = store.get_deployment("web").unwrap();
        // The reloaded spec is byte-equal to what was stored.
        assert_eq!(
            serde_json::to_vec(&loaded).unwrap(),
            serde_json::to_vec(&original).unwrap()
        );
        assert_eq!(store.list_services().len(), 1);
    }

    #[test]
    fn load_skips_unparseable_and_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            store.put_deployment(&test_deployment("good", 1));
        }
        std::fs::write(dir.path().join("deployments/broken.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("deployments/.hidden.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("deployments/notes.txt"), b"hello").unwrap();

        let store = Store::open(dir.path()).unwrap();
        store.load();

        let deployments = store.list_deployments();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].metadata.name, "good");
    }

    #[test]
    fn load_tolerates_missing_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        std::fs::remove_dir(dir.path().join("services")).unwrap();

        store.load();
        assert!(store.list_services().is_empty());
    }

    #[test]
    fn empty_store_operations() {
        let (store, _dir) = test_store();
        assert!(store.list_pods().is_empty());
        assert!(store.list_deployments().is_empty());
        assert!(store.list_statefulsets().is_empty());
        assert!(store.list_services().is_empty());
        assert!(store.list_nodes().is_empty());
        assert!(!store.delete_pod("nope"));
        assert!(!store.delete_node("nope"));
    }
}
