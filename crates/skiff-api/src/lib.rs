//! skiff-api — the HTTP boundary.
//!
//! Decodes inbound manifests (JSON or YAML), applies server-side defaults,
//! and mutates the state store. The reconcilers pick changes up on their
//! next tick; no handler talks the runtime into creating anything. The only
//! runtime calls made here are read-only passthroughs (container listing,
//! logs, exec, system info, health).
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET/POST | `/api/v1/pods` | List / create pods |
//! | GET/PUT/DELETE | `/api/v1/pods/{name}` | Get / replace / delete a pod |
//! | GET/POST | `/api/v1/services` | List / create services |
//! | GET/PUT/DELETE | `/api/v1/services/{name}` | Get / replace / delete a service |
//! | GET | `/api/v1/nodes[/{name}]` | Nodes (read-only) |
//! | GET/POST | `/apis/apps/v1/deployments` | List / create deployments |
//! | GET/PUT/DELETE | `/apis/apps/v1/deployments/{name}` | Get / replace / delete |
//! | PUT | `/apis/apps/v1/deployments/{name}/scale` | Update replicas only |
//! | GET/POST | `/apis/apps/v1/statefulsets` | List / create statefulsets |
//! | GET/PUT/DELETE | `/apis/apps/v1/statefulsets/{name}` | Get / replace / delete |
//! | PUT | `/apis/apps/v1/statefulsets/{name}/scale` | Update replicas only |
//! | POST | `/apply` | Create/replace a manifest of any supported kind |
//! | GET | `/api/v1/containers` | List managed containers |
//! | GET | `/api/v1/containers/{id}/logs` | Container logs |
//! | POST | `/api/v1/containers/{id}/exec` | Run a command in a container |
//! | GET | `/api/v1/system/info` | Runtime system info |
//! | GET | `/healthz`, `/readyz` | Health endpoints |

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use skiff_runtime::ContainerRuntime;
use skiff_state::Store;

use handlers::*;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Store,
    pub runtime: Arc<dyn ContainerRuntime>,
    /// Include error details in responses.
    pub debug: bool,
}

/// Build the complete API router.
pub fn build_router(store: Store, runtime: Arc<dyn ContainerRuntime>, debug: bool) -> Router {
    let state = ApiState {
        store,
        runtime,
        debug,
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/apply", post(apply_manifest))
        .route("/api/v1/pods", get(list_pods).post(create_pod))
        .route(
            "/api/v1/pods/{name}",
            get(get_pod).put(update_pod).delete(delete_pod),
        )
        .route("/api/v1/services", get(list_services).post(create_service))
        .route(
            "/api/v1/services/{name}",
            get(get_service).put(update_service).delete(delete_service),
        )
        .route("/api/v1/nodes", get(list_nodes))
        .route("/api/v1/nodes/{name}", get(get_node))
        .route("/api/v1/containers", get(list_containers))
        .route("/api/v1/containers/{id}/logs", get(container_logs))
        .route("/api/v1/containers/{id}/exec", post(exec_container))
        .route("/api/v1/system/info", get(system_info))
        .route(
            "/apis/apps/v1/deployments",
            get(list_deployments).post(create_deployment),
        )
        .route(
            "/apis/apps/v1/deployments/{name}",
            get(get_deployment)
                .put(update_deployment)
                .delete(delete_deployment),
        )
        .route(
            "/apis/apps/v1/deployments/{name}/scale",
            put(scale_deployment),
        )
        .route(
            "/apis/apps/v1/statefulsets",
            get(list_statefulsets).post(create_statefulset),
        )
        .route(
            "/apis/apps/v1/statefulsets/{name}",
            get(get_statefulset)
                .put(update_statefulset)
                .delete(delete_statefulset),
        )
        .route(
            "/apis/apps/v1/statefulsets/{name}/scale",
            put(scale_statefulset),
        )
        .with_state(state)
}
