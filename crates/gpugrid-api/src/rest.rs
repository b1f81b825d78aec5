//! REST API handlers

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use gpugrid_core::{ApiConfig, ClusterStatus, GridError, NodeStatus, Task, TaskRequest};
use gpugrid_scheduler::Cluster;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub cluster: Arc<Cluster>,
}

/// Create the API router
pub fn create_router(cluster: Arc<Cluster>, config: &ApiConfig) -> Router {
    let state = Arc::new(AppState { cluster });

    let router = Router::new()
        .route("/", get(root))
        .route("/tasks", post(submit_task).get(list_tasks))
        .route("/tasks/:id", get(get_task).delete(cancel_task))
        .route("/history", get(list_finished))
        .route("/cluster/status", get(get_cluster_status))
        .route("/nodes", get(list_nodes))
        .route("/nodes/:id", get(get_node))
        .route("/nodes/:id/offline", post(take_node_offline))
        .route("/nodes/:id/online", post(bring_node_online))
        .route("/scheduler/run", post(run_scheduler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        router.layer(cors_layer(&config.cors_origins))
    } else {
        router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn error_response(err: GridError) -> (StatusCode, String) {
    let status = match &err {
        GridError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GridError::NodeNotFound(_) | GridError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        GridError::ResourceUnavailable { .. } | GridError::TaskNotCancellable(_) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Service description
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "gpugrid control plane API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "POST /tasks".to_string(),
            "GET /tasks".to_string(),
            "GET /tasks/:id".to_string(),
            "DELETE /tasks/:id".to_string(),
            "GET /history".to_string(),
            "GET /cluster/status".to_string(),
            "GET /nodes".to_string(),
            "GET /nodes/:id".to_string(),
            "POST /scheduler/run".to_string(),
        ],
    })
}

/// Submit a new task
async fn submit_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskRequest>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    let task = state.cluster.submit(req).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// List pending and running tasks
async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    Json(state.cluster.list_tasks().await)
}

/// List retained finished tasks
async fn list_finished(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    Json(state.cluster.finished_tasks().await)
}

/// Get a specific task
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let task = state.cluster.get_task(&id).await.map_err(error_response)?;
    Ok(Json(task))
}

/// Cancel a pending task
async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, String)> {
    info!(task_id = %id, "Cancelling task");
    let task = state
        .cluster
        .cancel_task(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(task))
}

/// Get cluster status
async fn get_cluster_status(State(state): State<Arc<AppState>>) -> Json<ClusterStatus> {
    Json(state.cluster.cluster_status().await)
}

/// Get all nodes
async fn list_nodes(State(state): State<Arc<AppState>>) -> Json<Vec<NodeStatus>> {
    Json(state.cluster.list_nodes().await)
}

/// Get a specific node
async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<Json<NodeStatus>, (StatusCode, String)> {
    let node = state.cluster.get_node(id).await.map_err(error_response)?;
    Ok(Json(node))
}

async fn take_node_offline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<Json<NodeStatus>, (StatusCode, String)> {
    info!(node_id = id, "Taking node offline");
    let node = state
        .cluster
        .set_node_offline(id, true)
        .await
        .map_err(error_response)?;
    Ok(Json(node))
}

async fn bring_node_online(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<Json<NodeStatus>, (StatusCode, String)> {
    info!(node_id = id, "Bringing node online");
    let node = state
        .cluster
        .set_node_offline(id, false)
        .await
        .map_err(error_response)?;
    Ok(Json(node))
}

/// Result of a manual scheduling pass
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub scheduled_tasks: usize,
    pub tasks: Vec<Task>,
}

/// Manually trigger the scheduler
async fn run_scheduler(State(state): State<Arc<AppState>>) -> Json<ScheduleResponse> {
    let tasks = state.cluster.trigger_schedule().await;
    info!(scheduled = tasks.len(), "Manual scheduling pass");
    Json(ScheduleResponse {
        scheduled_tasks: tasks.len(),
        tasks,
    })
}
