use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::Utc;
use mvcp_domain::{MicroVmSpec, VmId};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::Stream;

use crate::error::ApiError;
use crate::state::AppState;

// ── Health & metrics ──────────────────────────────────────────────────────────

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "service": "mvcp",
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    state.metrics.render().map_err(|e| ApiError::internal(e.to_string()))
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateVmRequest {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub spec: MicroVmSpec,
}

pub async fn create_vm(
    State(state): State<AppState>,
    Json(body): Json<CreateVmRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = VmId::new(body.name, body.namespace);
    let vm = state.lifecycle.create(id, body.spec).await?;
    Ok(Json(json!(vm)))
}

fn vmid_from_path(namespace: String, name: String, uid: String) -> VmId {
    VmId { name, namespace, uid }
}

pub async fn delete_vm(
    State(state): State<AppState>,
    Path((namespace, name, uid)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let id = vmid_from_path(namespace, name, uid);
    state.lifecycle.delete(&id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn get_vm(
    State(state): State<AppState>,
    Path((namespace, name, uid)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let id = vmid_from_path(namespace, name, uid);
    let vm = state
        .lifecycle
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("vm '{}' not found", id.format())))?;
    Ok(Json(json!(vm)))
}

pub async fn list_vms(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let vms = state.lifecycle.get_all().await?;
    Ok(Json(json!(vms)))
}

/// A one-shot snapshot stream, not a live tail: the batch is taken once at
/// call start and may skip VMs created concurrently with the request.
pub async fn stream_vms(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let vms = state.lifecycle.get_all().await?;
    let events = vms.into_iter().map(|vm| {
        let event = Event::default().event("vm").json_data(&vm).expect("vm serializes");
        Ok::<_, Infallible>(event)
    });
    let stream = tokio_stream::iter(events);
    Ok(Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::new().interval(Duration::from_secs(15))))
}

// ── GPU ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AllocateGpuRequest {
    #[serde(default)]
    pub workload_id: String,
    pub profile: MigProfileBody,
}

#[derive(Debug, Deserialize)]
pub struct MigProfileBody {
    pub id: String,
    pub memory_gb: u64,
    pub compute_util: u32,
}

pub async fn allocate_gpu(
    State(state): State<AppState>,
    Json(body): Json<AllocateGpuRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.workload_id.is_empty() {
        return Err(ApiError::bad_request("workload_id is required"));
    }
    let profile = mvcp_domain::MigProfile {
        id: body.profile.id,
        memory_gb: body.profile.memory_gb,
        compute_util: body.profile.compute_util,
    };
    let allocation = state.gpu.allocate_gpu(body.workload_id, profile).await?;
    Ok(Json(json!({ "allocation": allocation, "success": true, "message": "allocated" })))
}

pub async fn deallocate_gpu(
    State(state): State<AppState>,
    Path(workload_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.gpu.deallocate_gpu(&workload_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_gpu_allocation(
    State(state): State<AppState>,
    Path(workload_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let allocation = state.gpu.get_workload_allocation(&workload_id).await?;
    Ok(Json(json!(allocation)))
}

pub async fn get_gpu_allocations(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.gpu.get_all_allocations().await))
}

pub async fn get_gpu_devices(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.gpu.get_all_devices().await))
}

pub async fn get_gpu_devices_available(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.gpu.get_available_devices().await))
}

pub async fn get_gpu_devices_utilization(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.gpu.get_device_utilization().await))
}

pub async fn get_gpu_devices_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.gpu.get_device_status().await))
}
