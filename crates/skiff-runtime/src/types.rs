//! Payload types exchanged across the runtime port.

use serde::{Deserialize, Serialize};
use skiff_core::manifest::Labels;

/// Observable state of a container, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
}

/// Information about a single container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    /// Unix timestamp (seconds) of creation.
    pub created: i64,
    /// Unix timestamp (seconds) of the last start, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<i64>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    pub container_port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<i32>,
    pub protocol: String,
}

/// Filter for container listings. All present criteria must match;
/// label matching is exact equality per key.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilter {
    pub labels: Labels,
    pub name_contains: Option<String>,
    pub statuses: Vec<ContainerStatus>,
}

impl ContainerFilter {
    /// Filter on a single label pair.
    pub fn label(key: &str, value: &str) -> Self {
        Self {
            labels: [(key.to_string(), value.to_string())].into(),
            ..Default::default()
        }
    }

    /// True when `info` satisfies every criterion in this filter.
    pub fn matches(&self, info: &ContainerInfo) -> bool {
        let labels_ok = self
            .labels
            .iter()
            .all(|(k, v)| info.labels.get(k).is_some_and(|found| found == v));
        let name_ok = self
            .name_contains
            .as_ref()
            .is_none_or(|needle| info.name.contains(needle.as_str()));
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&info.status);
        labels_ok && name_ok && status_ok
    }
}

/// Options for fetching container logs.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Only the last N lines; `None` means everything.
    pub tail: Option<usize>,
    pub timestamps: bool,
}

/// Result of executing a command inside a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub id: String,
    pub repo_tags: Vec<String>,
    pub size: i64,
}

/// Point-in-time resource usage of a container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub container_id: String,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
}

/// Host and runtime facts used by the node status reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub runtime_name: String,
    pub runtime_version: String,
    pub kernel_version: String,
    pub operating_system: String,
    pub architecture: String,
    pub ncpu: u32,
    pub mem_total: u64,
}
