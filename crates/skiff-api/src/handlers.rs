//! HTTP handlers.
//!
//! Manifest-accepting handlers decode JSON or YAML (by content type), apply
//! server-side defaults, and write through the store. Validation failures
//! are answered with 400s here and never reach the reconcilers.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

use skiff_core::labels;
use skiff_core::manifest::*;
use skiff_runtime::{ContainerFilter, ContainerRuntime, LogOptions, RuntimeError};

use crate::ApiState;

/// Lines of logs returned when the client does not ask otherwise.
const DEFAULT_LOG_TAIL: usize = 100;

// ── Decoding and error plumbing ────────────────────────────────

fn is_yaml(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("yaml"))
}

fn decode_manifest<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T, String> {
    if is_yaml(headers) {
        serde_yaml::from_slice(body).map_err(|e| e.to_string())
    } else {
        serde_json::from_slice(body).map_err(|e| e.to_string())
    }
}

fn error_response(status: StatusCode, message: &str, detail: Option<String>) -> Response {
    let mut body = json!({ "error": message });
    if let Some(detail) = detail {
        body["details"] = json!(detail);
    }
    (status, Json(body)).into_response()
}

fn invalid_manifest(state: &ApiState, detail: String) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "invalid manifest",
        state.debug.then_some(detail),
    )
}

fn missing_name() -> Response {
    error_response(StatusCode::BAD_REQUEST, "metadata.name is required", None)
}

fn not_found(what: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, &format!("{what} not found"), None)
}

fn runtime_error_response(e: &RuntimeError) -> Response {
    let status = match e {
        RuntimeError::NotFound(_) => StatusCode::NOT_FOUND,
        RuntimeError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &e.to_string(), None)
}

// ── Health ─────────────────────────────────────────────────────

pub async fn healthz(State(state): State<ApiState>) -> Response {
    match state.runtime.health_check().await {
        Ok(()) => Json(json!({ "status": "healthy" })).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "runtimeError": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn readyz() -> Response {
    Json(json!({ "ready": true })).into_response()
}

// ── Pods ───────────────────────────────────────────────────────

pub async fn list_pods(State(state): State<ApiState>) -> Response {
    let items = state.store.list_pods();
    Json(json!({ "apiVersion": "v1", "kind": "PodList", "items": items })).into_response()
}

pub async fn create_pod(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_manifest::<Pod>(&headers, &body) {
        Ok(mut pod) => {
            if pod.metadata.name.is_empty() {
                return missing_name();
            }
            pod.apply_defaults();
            state.store.put_pod(&pod);
            (StatusCode::CREATED, Json(pod)).into_response()
        }
        Err(e) => invalid_manifest(&state, e),
    }
}

pub async fn get_pod(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.get_pod(&name) {
        Some(pod) => Json(pod).into_response(),
        None => not_found("pod"),
    }
}

pub async fn update_pod(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_manifest::<Pod>(&headers, &body) {
        Ok(mut pod) => {
            pod.metadata.name = name;
            pod.apply_defaults();
            state.store.put_pod(&pod);
            Json(pod).into_response()
        }
        Err(e) => invalid_manifest(&state, e),
    }
}

pub async fn delete_pod(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    state.store.delete_pod(&name);
    StatusCode::NO_CONTENT.into_response()
}

// ── Deployments ────────────────────────────────────────────────

pub async fn list_deployments(State(state): State<ApiState>) -> Response {
    let items = state.store.list_deployments();
    Json(json!({ "apiVersion": "apps/v1", "kind": "DeploymentList", "items": items }))
        .into_response()
}

pub async fn create_deployment(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_manifest::<Deployment>(&headers, &body) {
        Ok(mut deployment) => {
            if deployment.metadata.name.is_empty() {
                return missing_name();
            }
            deployment.apply_defaults();
            state.store.put_deployment(&deployment);
            (StatusCode::CREATED, Json(deployment)).into_response()
        }
        Err(e) => invalid_manifest(&state, e),
    }
}

pub async fn get_deployment(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.get_deployment(&name) {
        Some(deployment) => Json(deployment).into_response(),
        None => not_found("deployment"),
    }
}

pub async fn update_deployment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_manifest::<Deployment>(&headers, &body) {
        Ok(mut deployment) => {
            deployment.metadata.name = name;
            deployment.apply_defaults();
            state.store.put_deployment(&deployment);
            Json(deployment).into_response()
        }
        Err(e) => invalid_manifest(&state, e),
    }
}

pub async fn delete_deployment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    state.store.delete_deployment(&name);
    StatusCode::NO_CONTENT.into_response()
}

/// Scale subresource body: `{"spec": {"replicas": N}}`.
#[derive(serde::Deserialize)]
pub struct ScaleRequest {
    pub spec: ScaleSpec,
}

#[derive(serde::Deserialize)]
pub struct ScaleSpec {
    pub replicas: i32,
}

fn scale_response(replicas: i32) -> Response {
    Json(json!({
        "kind": "Scale",
        "apiVersion": "autoscaling/v1",
        "spec": { "replicas": replicas }
    }))
    .into_response()
}

pub async fn scale_deployment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<ScaleRequest>,
) -> Response {
    match state.store.get_deployment(&name) {
        Some(mut deployment) => {
            deployment.spec.replicas = Some(req.spec.replicas);
            state.store.put_deployment(&deployment);
            scale_response(req.spec.replicas)
        }
        None => not_found("deployment"),
    }
}

// ── StatefulSets ───────────────────────────────────────────────

pub async fn list_statefulsets(State(state): State<ApiState>) -> Response {
    let items = state.store.list_statefulsets();
    Json(json!({ "apiVersion": "apps/v1", "kind": "StatefulSetList", "items": items }))
        .into_response()
}

pub async fn create_statefulset(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_manifest::<StatefulSet>(&headers, &body) {
        Ok(mut statefulset) => {
            if statefulset.metadata.name.is_empty() {
                return missing_name();
            }
            statefulset.apply_defaults();
            state.store.put_statefulset(&statefulset);
            (StatusCode::CREATED, Json(statefulset)).into_response()
        }
        Err(e) => invalid_manifest(&state, e),
    }
}

pub async fn get_statefulset(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.get_statefulset(&name) {
        Some(statefulset) => Json(statefulset).into_response(),
        None => not_found("statefulset"),
    }
}

pub async fn update_statefulset(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_manifest::<StatefulSet>(&headers, &body) {
        Ok(mut statefulset) => {
            statefulset.metadata.name = name;
            statefulset.apply_defaults();
            state.store.put_statefulset(&statefulset);
            Json(statefulset).into_response()
        }
        Err(e) => invalid_manifest(&state, e),
    }
}

pub async fn delete_statefulset(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    state.store.delete_statefulset(&name);
    StatusCode::NO_CONTENT.into_response()
}

pub async fn scale_statefulset(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<ScaleRequest>,
) -> Response {
    match state.store.get_statefulset(&name) {
        Some(mut statefulset) => {
            statefulset.spec.replicas = Some(req.spec.replicas);
            state.store.put_statefulset(&statefulset);
            scale_response(req.spec.replicas)
        }
        None => not_found("statefulset"),
    }
}

// ── Services ───────────────────────────────────────────────────

pub async fn list_services(State(state): State<ApiState>) -> Response {
    let items = state.store.list_services();
    Json(json!({ "apiVersion": "v1", "kind": "ServiceList", "items": items })).into_response()
}

pub async fn create_service(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_manifest::<Service>(&headers, &body) {
        Ok(mut service) => {
            if service.metadata.name.is_empty() {
                return missing_name();
            }
            service.apply_defaults();
            state.store.put_service(&service);
            (StatusCode::CREATED, Json(service)).into_response()
        }
        Err(e) => invalid_manifest(&state, e),
    }
}

pub async fn get_service(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.get_service(&name) {
        Some(service) => Json(service).into_response(),
        None => not_found("service"),
    }
}

pub async fn update_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_manifest::<Service>(&headers, &body) {
        Ok(mut service) => {
            service.metadata.name = name;
            service.apply_defaults();
            state.store.put_service(&service);
            Json(service).into_response()
        }
        Err(e) => invalid_manifest(&state, e),
    }
}

pub async fn delete_service(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    state.store.delete_service(&name);
    StatusCode::NO_CONTENT.into_response()
}

// ── Nodes (reporter-owned, read-only here) ─────────────────────

pub async fn list_nodes(State(state): State<ApiState>) -> Response {
    let items = state.store.list_nodes();
    Json(json!({ "apiVersion": "v1", "kind": "NodeList", "items": items })).into_response()
}

pub async fn get_node(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    match state.store.get_node(&name) {
        Some(node) => Json(node).into_response(),
        None => not_found("node"),
    }
}

// ── Apply (kind auto-detection) ────────────────────────────────

pub async fn apply_manifest(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let value: serde_json::Value = match decode_manifest(&headers, &body) {
        Ok(value) => value,
        Err(e) => return invalid_manifest(&state, e),
    };
    let Some(kind) = value.get("kind").and_then(|k| k.as_str()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing or invalid 'kind' field", None);
    };

    match kind {
        "Pod" => apply_as::<Pod>(&state, value, |state, mut pod| {
            pod.apply_defaults();
            state.store.put_pod(&pod);
            Json(pod).into_response()
        }),
        "Deployment" => apply_as::<Deployment>(&state, value, |state, mut deployment| {
            deployment.apply_defaults();
            state.store.put_deployment(&deployment);
            Json(deployment).into_response()
        }),
        "StatefulSet" => apply_as::<StatefulSet>(&state, value, |state, mut statefulset| {
            statefulset.apply_defaults();
            state.store.put_statefulset(&statefulset);
            Json(statefulset).into_response()
        }),
        "Service" => apply_as::<Service>(&state, value, |state, mut service| {
            service.apply_defaults();
            state.store.put_service(&service);
            Json(service).into_response()
        }),
        other => error_response(
            StatusCode::BAD_REQUEST,
            &format!("unsupported resource kind: {other}"),
            None,
        ),
    }
}

fn apply_as<T: DeserializeOwned + HasName>(
    state: &ApiState,
    value: serde_json::Value,
    store_fn: impl FnOnce(&ApiState, T) -> Response,
) -> Response {
    match serde_json::from_value::<T>(value) {
        Ok(resource) => {
            if resource.name().is_empty() {
                return missing_name();
            }
            store_fn(state, resource)
        }
        Err(e) => invalid_manifest(state, e.to_string()),
    }
}

trait HasName {
    fn name(&self) -> &str;
}

macro_rules! has_name {
    ($($ty:ty),*) => {
        $(impl HasName for $ty {
            fn name(&self) -> &str {
                &self.metadata.name
            }
        })*
    };
}

has_name!(Pod, Deployment, StatefulSet, Service);

// ── Containers and system info ─────────────────────────────────

pub async fn list_containers(State(state): State<ApiState>) -> Response {
    let filter = ContainerFilter::label(labels::MANAGED_BY, labels::MANAGED_BY_VALUE);
    match state.runtime.list_containers(&filter).await {
        Ok(items) => {
            let count = items.len();
            Json(json!({ "items": items, "count": count })).into_response()
        }
        Err(e) => runtime_error_response(&e),
    }
}

pub async fn container_logs(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let opts = LogOptions {
        tail: Some(DEFAULT_LOG_TAIL),
        timestamps: false,
    };
    match state.runtime.container_logs(&id, &opts).await {
        Ok(logs) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            logs,
        )
            .into_response(),
        Err(e) => runtime_error_response(&e),
    }
}

/// Exec request body: `{"command": ["sh", "-c", "..."]}`.
#[derive(serde::Deserialize)]
pub struct ExecRequest {
    pub command: Vec<String>,
}

pub async fn exec_container(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<ExecRequest>,
) -> Response {
    match state.runtime.exec_container(&id, &req.command).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => runtime_error_response(&e),
    }
}

pub async fn system_info(State(state): State<ApiState>) -> Response {
    match state.runtime.system_info().await {
        Ok(info) => Json(info).into_response(),
        Err(e) => runtime_error_response(&e),
    }
}
