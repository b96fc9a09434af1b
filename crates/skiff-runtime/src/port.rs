//! The runtime port: the trait every container-runtime driver implements.

use async_trait::async_trait;
use skiff_core::manifest::{ContainerSpec, Labels};

use crate::error::RuntimeResult;
use crate::types::*;

/// Container lifecycle, image, and introspection operations the core
/// depends on.
///
/// Implementations must be safe for concurrent use: several control loops
/// share one driver behind an `Arc`. Every method is cancellation-safe in
/// the sense that dropping the returned future must not leave the driver's
/// internal state inconsistent; loops abandon in-flight calls on shutdown.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Materialize a container from a spec without starting it.
    ///
    /// The driver applies the managed-container label schema (plus
    /// `extra_labels`, which carry ownership and pod-template labels),
    /// resource limits, port mappings, and environment.
    async fn create_container(
        &self,
        spec: &ContainerSpec,
        pod_name: &str,
        extra_labels: &Labels,
    ) -> RuntimeResult<ContainerInfo>;

    async fn start_container(&self, id: &str) -> RuntimeResult<()>;

    /// Stop with a graceful timeout before the driver resorts to SIGKILL.
    async fn stop_container(&self, id: &str, timeout_secs: u64) -> RuntimeResult<()>;

    async fn remove_container(&self, id: &str) -> RuntimeResult<()>;

    async fn restart_container(&self, id: &str) -> RuntimeResult<()>;

    async fn inspect_container(&self, id: &str) -> RuntimeResult<ContainerInfo>;

    /// List containers matching `filter`. Label matching is exact equality.
    async fn list_containers(&self, filter: &ContainerFilter) -> RuntimeResult<Vec<ContainerInfo>>;

    async fn container_logs(&self, id: &str, opts: &LogOptions) -> RuntimeResult<Vec<u8>>;

    async fn exec_container(&self, id: &str, cmd: &[String]) -> RuntimeResult<ExecResult>;

    async fn pull_image(&self, image: &str) -> RuntimeResult<()>;

    async fn remove_image(&self, image: &str) -> RuntimeResult<()>;

    async fn list_images(&self) -> RuntimeResult<Vec<ImageInfo>>;

    async fn container_stats(&self, id: &str) -> RuntimeResult<ContainerStats>;

    async fn system_info(&self) -> RuntimeResult<SystemInfo>;

    async fn health_check(&self) -> RuntimeResult<()>;
}
