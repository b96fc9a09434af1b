//! Resource manifest types.
//!
//! These mirror the on-wire shape of the Kubernetes workload manifests Skiff
//! accepts: `apiVersion`, `kind`, `metadata`, `spec`, and an optional
//! `status` block. String maps use `BTreeMap` so that canonical JSON output
//! is deterministic. Defaults are applied server-side via `apply_defaults`
//! before a resource is stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label map type used throughout the model.
pub type Labels = BTreeMap<String, String>;

// ── Metadata ───────────────────────────────────────────────────

/// Standard object metadata carried by every resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

// ── Pod ────────────────────────────────────────────────────────

/// A single pod: one or more containers sharing a name and labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PodStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// One container within a pod template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    #[serde(default, skip_serializing_if = "ResourceRequirements::is_empty")]
    pub resources: ResourceRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Resource limits and requests, expressed as Kubernetes quantity strings
/// (`"500m"`, `"256Mi"`). Parsing into canonical units lives in
/// [`crate::quantity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
}

impl ResourceRequirements {
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.requests.is_empty()
    }
}

// ── Workloads (Deployment, StatefulSet) ────────────────────────

/// Spec shared by the replica-owning workload kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "LabelSelector::is_empty")]
    pub selector: LabelSelector,
    #[serde(default)]
    pub template: PodTemplateSpec,
}

impl WorkloadSpec {
    /// Desired replica count; an absent value means exactly 1.
    pub fn replica_count(&self) -> i32 {
        self.replicas.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: Labels,
}

impl LabelSelector {
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

/// Status written back by the workload reconciler. Counts are observed
/// from the runtime, never from the spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkloadSpec,
    #[serde(default)]
    pub status: WorkloadStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulSet {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkloadSpec,
    #[serde(default)]
    pub status: WorkloadStatus,
}

// ── Service ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
    #[serde(default)]
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: Labels,
    #[serde(default, rename = "type")]
    pub service_type: ServiceType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
    ExternalName,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Status written back by the service reconciler. `endpoints` lists the
/// managed containers whose labels satisfy the selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<ServiceEndpoint>,
    #[serde(default, skip_serializing_if = "LoadBalancerStatus::is_empty")]
    pub load_balancer: LoadBalancerStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub pod: String,
    pub container: String,
    pub container_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<LoadBalancerIngress>,
}

impl LoadBalancerStatus {
    pub fn is_empty(&self) -> bool {
        self.ingress.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerIngress {
    pub ip: String,
}

// ── Node ───────────────────────────────────────────────────────

/// The self-describing node resource. Written only by the node status
/// reporter; the API exposes it read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocatable: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<NodeCondition>,
    #[serde(default)]
    pub node_info: NodeSystemInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSystemInfo {
    #[serde(default)]
    pub kernel_version: String,
    #[serde(default)]
    pub os_image: String,
    #[serde(default)]
    pub operating_system: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub container_runtime_version: String,
}

// ── Server-side defaulting ─────────────────────────────────────

fn default_meta(meta: &mut ObjectMeta) {
    if meta.creation_timestamp.is_none() {
        meta.creation_timestamp = Some(Utc::now());
    }
}

impl Pod {
    pub fn apply_defaults(&mut self) {
        if self.api_version.is_empty() {
            self.api_version = "v1".to_string();
        }
        if self.kind.is_empty() {
            self.kind = "Pod".to_string();
        }
        default_meta(&mut self.metadata);
    }
}

impl Deployment {
    pub fn apply_defaults(&mut self) {
        if self.api_version.is_empty() {
            self.api_version = "apps/v1".to_string();
        }
        if self.kind.is_empty() {
            self.kind = "Deployment".to_string();
        }
        default_meta(&mut self.metadata);
        if self.spec.replicas.is_none() {
            self.spec.replicas = Some(1);
        }
    }
}

impl StatefulSet {
    pub fn apply_defaults(&mut self) {
        if self.api_version.is_empty() {
            self.api_version = "apps/v1".to_string();
        }
        if self.kind.is_empty() {
            self.kind = "StatefulSet".to_string();
        }
        default_meta(&mut self.metadata);
        if self.spec.replicas.is_none() {
            self.spec.replicas = Some(1);
        }
    }
}

impl Service {
    pub fn apply_defaults(&mut self) {
        if self.api_version.is_empty() {
            self.api_version = "v1".to_string();
        }
        if self.kind.is_empty() {
            self.kind = "Service".to_string();
        }
        default_meta(&mut self.metadata);
    }
}

impl Node {
    pub fn apply_defaults(&mut self) {
        if self.api_version.is_empty() {
            self.api_version = "v1".to_string();
        }
        if self.kind.is_empty() {
            self.kind = "Node".to_string();
        }
        default_meta(&mut self.metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_defaults() {
        let mut d = Deployment {
            metadata: ObjectMeta {
                name: "web".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        d.apply_defaults();

        assert_eq!(d.api_version, "apps/v1");
        assert_eq!(d.kind, "Deployment");
        assert_eq!(d.spec.replicas, Some(1));
        assert!(d.metadata.creation_timestamp.is_some());
    }

    #[test]
    fn explicit_replicas_survive_defaulting() {
        let mut d = Deployment {
            spec: WorkloadSpec {
                replicas: Some(4),
                ..Default::default()
            },
            ..Default::default()
        };
        d.apply_defaults();
        assert_eq!(d.spec.replica_count(), 4);
    }

    #[test]
    fn absent_replicas_default_to_one() {
        let spec = WorkloadSpec::default();
        assert_eq!(spec.replica_count(), 1);
    }

    #[test]
    fn deployment_manifest_round_trip_is_stable() {
        let json = r#"{
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "creationTimestamp": "2026-01-05T10:00:00Z"},
            "spec": {
                "replicas": 3,
                "selector": {"matchLabels": {"app": "web"}},
                "template": {
                    "metadata": {"labels": {"app": "web"}},
                    "spec": {"containers": [{"name": "nginx", "image": "nginx:1.25"}]}
                }
            }
        }"#;

        let d: Deployment = serde_json::from_str(json).unwrap();
        assert_eq!(d.metadata.name, "web");
        assert_eq!(d.spec.replica_count(), 3);
        assert_eq!(d.spec.template.spec.containers[0].image, "nginx:1.25");

        // Two serializations of the same value are byte-identical.
        let a = serde_json::to_vec(&d).unwrap();
        let b = serde_json::to_vec(&serde_json::from_slice::<Deployment>(&a).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn service_type_parses_kubernetes_names() {
        let svc: Service = serde_json::from_str(
            r#"{"kind": "Service", "spec": {"type": "NodePort", "selector": {"app": "web"},
                "ports": [{"port": 80, "protocol": "TCP"}]}}"#,
        )
        .unwrap();
        assert_eq!(svc.spec.service_type, ServiceType::NodePort);
        assert_eq!(svc.spec.ports[0].port, 80);
    }

    #[test]
    fn unknown_service_type_is_rejected() {
        let result = serde_json::from_str::<Service>(r#"{"spec": {"type": "Bogus"}}"#);
        assert!(result.is_err());
    }
}
