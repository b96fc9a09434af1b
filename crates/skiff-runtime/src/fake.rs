//! In-process fake runtime driver.
//!
//! A complete, thread-safe implementation of the runtime port backed by an
//! in-memory container table. It honors the label schema, filters, and
//! lifecycle transitions, and can be programmed to fail for outage and
//! partial-failure tests. The daemon can also run against it in standalone
//! development mode (`driver = "fake"`).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use skiff_core::config::RuntimeConfig;
use skiff_core::manifest::{ContainerSpec, Labels};
use skiff_core::{labels, quantity};

use crate::error::{RuntimeError, RuntimeResult};
use crate::port::ContainerRuntime;
use crate::types::*;

#[derive(Debug, Clone)]
struct FakeContainer {
    info: ContainerInfo,
    cpu_millis: Option<i64>,
    memory_bytes: Option<u64>,
    logs: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    containers: BTreeMap<String, FakeContainer>,
    images: BTreeSet<String>,
    next_id: u64,
    /// Count of imperative commands issued (reads excluded).
    commands: u64,
    unavailable: bool,
    fail_image_pulls: bool,
    fail_next_starts: u32,
    system_info: Option<SystemInfo>,
}

pub struct FakeRuntime {
    config: RuntimeConfig,
    inner: Mutex<Inner>,
}

impl FakeRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    // ── Test controls ──────────────────────────────────────────

    /// Make every operation fail with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }

    /// Fail the next `n` start attempts with `OpFailed`.
    pub fn fail_next_starts(&self, n: u32) {
        self.inner.lock().unwrap().fail_next_starts = n;
    }

    /// Make image pulls fail until cleared.
    pub fn fail_image_pulls(&self, fail: bool) {
        self.inner.lock().unwrap().fail_image_pulls = fail;
    }

    /// Seed an image as already present (pull-less create).
    pub fn preload_image(&self, image: &str) {
        self.inner.lock().unwrap().images.insert(image.to_string());
    }

    /// Override what `system_info` reports.
    pub fn set_system_info(&self, info: SystemInfo) {
        self.inner.lock().unwrap().system_info = Some(info);
    }

    /// Number of imperative commands issued so far (listings and
    /// inspections do not count).
    pub fn command_count(&self) -> u64 {
        self.inner.lock().unwrap().commands
    }

    fn guard(inner: &mut Inner) -> RuntimeResult<()> {
        if inner.unavailable {
            return Err(RuntimeError::Unavailable("fake runtime is down".into()));
        }
        Ok(())
    }
}

fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create_container(
        &self,
        spec: &ContainerSpec,
        pod_name: &str,
        extra_labels: &Labels,
    ) -> RuntimeResult<ContainerInfo> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner.commands += 1;

        if !inner.images.contains(&spec.image) {
            return Err(RuntimeError::OpFailed(format!(
                "image not present: {}",
                spec.image
            )));
        }

        let name = format!("{pod_name}-{}", spec.name);
        if inner.containers.values().any(|c| c.info.name == name) {
            return Err(RuntimeError::OpFailed(format!(
                "container name already in use: {name}"
            )));
        }

        // Limits are canonicalized here the way a daemon driver would
        // convert them to its native unit.
        let cpu_millis = spec
            .resources
            .limits
            .get("cpu")
            .map(|q| quantity::parse_cpu_millis(q))
            .transpose()
            .map_err(|e| RuntimeError::OpFailed(e.to_string()))?;
        let memory_bytes = spec
            .resources
            .limits
            .get("memory")
            .map(|q| quantity::parse_memory_bytes(q))
            .transpose()
            .map_err(|e| RuntimeError::OpFailed(e.to_string()))?;

        // Default labels, then caller labels, then the fixed schema.
        let mut container_labels = self.config.default_labels.clone();
        container_labels.extend(extra_labels.clone());
        container_labels.insert(
            labels::MANAGED_BY.to_string(),
            labels::MANAGED_BY_VALUE.to_string(),
        );
        container_labels.insert(labels::POD.to_string(), pod_name.to_string());
        container_labels.insert(labels::CONTAINER.to_string(), spec.name.clone());

        let ports = spec
            .ports
            .iter()
            .map(|p| PortBinding {
                container_port: p.container_port,
                host_port: p.host_port,
                protocol: p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
            })
            .collect();

        inner.next_id += 1;
        let id = format!("{:016x}", inner.next_id);
        let info = ContainerInfo {
            id: id.clone(),
            name,
            image: spec.image.clone(),
            status: ContainerStatus::Created,
            created: epoch_secs(),
            started: None,
            labels: container_labels,
            ports,
        };

        inner.containers.insert(
            id,
            FakeContainer {
                info: info.clone(),
                cpu_millis,
                memory_bytes,
                logs: Vec::new(),
            },
        );
        Ok(info)
    }

    async fn start_container(&self, id: &str) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner.commands += 1;

        if inner.fail_next_starts > 0 {
            inner.fail_next_starts -= 1;
            return Err(RuntimeError::OpFailed(format!(
                "injected start failure for {id}"
            )));
        }

        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        container.info.status = ContainerStatus::Running;
        container.info.started = Some(epoch_secs());
        Ok(())
    }

    async fn stop_container(&self, id: &str, _timeout_secs: u64) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner.commands += 1;

        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        container.info.status = ContainerStatus::Exited;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner.commands += 1;

        let status = match inner.containers.get(id) {
            Some(c) => c.info.status,
            None => return Err(RuntimeError::NotFound(id.to_string())),
        };
        if status == ContainerStatus::Running {
            return Err(RuntimeError::OpFailed(format!(
                "cannot remove running container {id}"
            )));
        }
        inner.containers.remove(id);
        Ok(())
    }

    async fn restart_container(&self, id: &str) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner.commands += 1;

        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        container.info.status = ContainerStatus::Running;
        container.info.started = Some(epoch_secs());
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner
            .containers
            .get(id)
            .map(|c| c.info.clone())
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
    }

    async fn list_containers(&self, filter: &ContainerFilter) -> RuntimeResult<Vec<ContainerInfo>> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        Ok(inner
            .containers
            .values()
            .map(|c| c.info.clone())
            .filter(|info| filter.matches(info))
            .collect())
    }

    async fn container_logs(&self, id: &str, opts: &LogOptions) -> RuntimeResult<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        let container = inner
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;

        let text = String::from_utf8_lossy(&container.logs);
        let lines: Vec<&str> = text.lines().collect();
        let keep = opts.tail.unwrap_or(lines.len()).min(lines.len());
        Ok(lines[lines.len() - keep..].join("\n").into_bytes())
    }

    async fn exec_container(&self, id: &str, cmd: &[String]) -> RuntimeResult<ExecResult> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner.commands += 1;

        let container = inner
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        if container.info.status != ContainerStatus::Running {
            return Err(RuntimeError::OpFailed(format!(
                "container {id} is not running"
            )));
        }
        Ok(ExecResult {
            exit_code: 0,
            stdout: format!("exec: {}", cmd.join(" ")),
            stderr: String::new(),
        })
    }

    async fn pull_image(&self, image: &str) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner.commands += 1;

        if inner.fail_image_pulls {
            return Err(RuntimeError::OpFailed(format!(
                "injected pull failure for {image}"
            )));
        }
        inner.images.insert(image.to_string());
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        inner.commands += 1;

        if inner.images.remove(image) {
            Ok(())
        } else {
            Err(RuntimeError::NotFound(image.to_string()))
        }
    }

    async fn list_images(&self) -> RuntimeResult<Vec<ImageInfo>> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        Ok(inner
            .images
            .iter()
            .enumerate()
            .map(|(i, tag)| ImageInfo {
                id: format!("sha256:{i:08x}"),
                repo_tags: vec![tag.clone()],
                size: 0,
            })
            .collect())
    }

    async fn container_stats(&self, id: &str) -> RuntimeResult<ContainerStats> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        let container = inner
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        Ok(ContainerStats {
            container_id: id.to_string(),
            cpu_percent: container.cpu_millis.map(|m| m as f64 / 10.0).unwrap_or(0.0),
            memory_usage: 0,
            memory_limit: container.memory_bytes.unwrap_or(0),
        })
    }

    async fn system_info(&self) -> RuntimeResult<SystemInfo> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        Ok(inner.system_info.clone().unwrap_or(SystemInfo {
            runtime_name: "fake".to_string(),
            runtime_version: "0.1.0".to_string(),
            kernel_version: "6.1.0".to_string(),
            operating_system: "linux".to_string(),
            architecture: "amd64".to_string(),
            ncpu: 4,
            mem_total: 8 * 1024 * 1024 * 1024,
        }))
    }

    async fn health_check(&self) -> RuntimeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::guard(&mut inner)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_core::manifest::{ContainerPort, ResourceRequirements};

    fn runtime() -> FakeRuntime {
        FakeRuntime::new(RuntimeConfig::default())
    }

    fn nginx_spec() -> ContainerSpec {
        ContainerSpec {
            name: "nginx".to_string(),
            image: "nginx:1.25".to_string(),
            ports: vec![ContainerPort {
                container_port: 80,
                host_port: None,
                protocol: None,
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_applies_label_schema() {
        let rt = runtime();
        rt.pull_image("nginx:1.25").await.unwrap();

        let extra: Labels = [("deployment".to_string(), "web".to_string())].into();
        let info = rt
            .create_container(&nginx_spec(), "web-0", &extra)
            .await
            .unwrap();

        assert_eq!(info.labels["managed-by"], "skiff");
        assert_eq!(info.labels["pod"], "web-0");
        assert_eq!(info.labels["container"], "nginx");
        assert_eq!(info.labels["deployment"], "web");
        assert_eq!(info.name, "web-0-nginx");
        assert_eq!(info.status, ContainerStatus::Created);
    }

    #[tokio::test]
    async fn create_requires_image() {
        let rt = runtime();
        let err = rt
            .create_container(&nginx_spec(), "web-0", &Labels::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::OpFailed(_)));
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let rt = runtime();
        rt.pull_image("nginx:1.25").await.unwrap();
        let info = rt
            .create_container(&nginx_spec(), "web-0", &Labels::new())
            .await
            .unwrap();

        rt.start_container(&info.id).await.unwrap();
        assert_eq!(
            rt.inspect_container(&info.id).await.unwrap().status,
            ContainerStatus::Running
        );

        // Removing a running container is refused.
        assert!(rt.remove_container(&info.id).await.is_err());

        rt.stop_container(&info.id, 30).await.unwrap();
        assert_eq!(
            rt.inspect_container(&info.id).await.unwrap().status,
            ContainerStatus::Exited
        );

        rt.remove_container(&info.id).await.unwrap();
        assert!(matches!(
            rt.inspect_container(&info.id).await,
            Err(RuntimeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_honors_label_filter() {
        let rt = runtime();
        rt.pull_image("nginx:1.25").await.unwrap();
        for (pod, owner) in [("web-0", "web"), ("web-1", "web"), ("db-0", "db")] {
            let extra: Labels = [("deployment".to_string(), owner.to_string())].into();
            rt.create_container(&nginx_spec(), pod, &extra).await.unwrap();
        }

        let web = rt
            .list_containers(&ContainerFilter::label("deployment", "web"))
            .await
            .unwrap();
        assert_eq!(web.len(), 2);

        let all = rt
            .list_containers(&ContainerFilter::label("managed-by", "skiff"))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn unavailable_fails_everything() {
        let rt = runtime();
        rt.set_unavailable(true);

        assert!(matches!(
            rt.health_check().await,
            Err(RuntimeError::Unavailable(_))
        ));
        assert!(rt.list_containers(&ContainerFilter::default()).await.is_err());
        assert!(rt.pull_image("nginx:1.25").await.is_err());

        rt.set_unavailable(false);
        assert!(rt.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn injected_start_failures_are_consumed() {
        let rt = runtime();
        rt.pull_image("nginx:1.25").await.unwrap();
        let info = rt
            .create_container(&nginx_spec(), "web-0", &Labels::new())
            .await
            .unwrap();

        rt.fail_next_starts(1);
        assert!(rt.start_container(&info.id).await.is_err());
        assert!(rt.start_container(&info.id).await.is_ok());
    }

    #[tokio::test]
    async fn resource_limits_are_parsed_at_create() {
        let rt = runtime();
        rt.pull_image("nginx:1.25").await.unwrap();

        let mut spec = nginx_spec();
        spec.resources = ResourceRequirements {
            limits: [
                ("cpu".to_string(), "250m".to_string()),
                ("memory".to_string(), "64Mi".to_string()),
            ]
            .into(),
            ..Default::default()
        };
        let info = rt
            .create_container(&spec, "web-0", &Labels::new())
            .await
            .unwrap();

        let stats = rt.container_stats(&info.id).await.unwrap();
        assert_eq!(stats.memory_limit, 64 * 1024 * 1024);

        // Unparseable limits fail the create.
        spec.resources.limits.insert("cpu".to_string(), "fast".to_string());
        assert!(rt.create_container(&spec, "web-1", &Labels::new()).await.is_err());
    }

    #[tokio::test]
    async fn command_count_ignores_reads() {
        let rt = runtime();
        rt.pull_image("nginx:1.25").await.unwrap();
        let before = rt.command_count();

        rt.list_containers(&ContainerFilter::default()).await.unwrap();
        rt.system_info().await.unwrap();
        assert_eq!(rt.command_count(), before);

        rt.create_container(&nginx_spec(), "web-0", &Labels::new())
            .await
            .unwrap();
        assert_eq!(rt.command_count(), before + 1);
    }
}
