use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::record::{ProvisionSpec, RecordKey, ResourceRecord};
use crate::store::{RecordStore, StoreError};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: u32,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            404 => StatusCode::NOT_FOUND,
            409 => StatusCode::CONFLICT,
            400 => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let code = match &e {
            StoreError::NotFound(_) => 404,
            StoreError::Conflict(_) => 409,
            StoreError::Invalid(_) => 400,
            StoreError::Internal(_) => 500,
        };
        ApiError {
            error: e.to_string(),
            code,
        }
    }
}

// === Version ===

#[derive(Serialize)]
pub struct VersionInfo {
    pub version: String,
}

pub async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn healthz() -> &'static str {
    "ok"
}

// === Provisions ===

#[derive(Serialize)]
pub struct ProvisionList {
    pub items: Vec<ResourceRecord>,
}

pub async fn list_provisions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProvisionList>, ApiError> {
    let items = state.store.list(None).await?;
    Ok(Json(ProvisionList { items }))
}

pub async fn list_namespaced_provisions(
    State(state): State<Arc<AppState>>,
    Path(namespace): Path<String>,
) -> Result<Json<ProvisionList>, ApiError> {
    let items = state.store.list(Some(&namespace)).await?;
    Ok(Json(ProvisionList { items }))
}

pub async fn get_provision(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ResourceRecord>, ApiError> {
    let key = RecordKey::new(namespace, name);
    match state.store.get(&key).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError {
            error: format!("provision {} not found", key),
            code: 404,
        }),
    }
}

/// Create or replace a provision's spec.
pub async fn apply_provision(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
    Json(spec): Json<ProvisionSpec>,
) -> Result<Json<ResourceRecord>, ApiError> {
    let key = RecordKey::new(namespace, name);
    let record = state.store.apply(key, spec).await?;
    info!(key = %record.key, generation = record.generation, "Provision applied via API");
    Ok(Json(record))
}

/// Request to change only the declared phase
#[derive(Deserialize)]
pub struct SetPhaseRequest {
    pub phase: String,
}

pub async fn set_phase(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
    Json(req): Json<SetPhaseRequest>,
) -> Result<Json<ResourceRecord>, ApiError> {
    let key = RecordKey::new(namespace, name);
    let Some(current) = state.store.get(&key).await? else {
        return Err(ApiError {
            error: format!("provision {} not found", key),
            code: 404,
        });
    };

    let spec = ProvisionSpec {
        phase: req.phase,
        ..current.spec
    };
    // A concurrent PUT between the read and this write yields 409.
    let record = state
        .store
        .update_spec(&key, current.resource_version, spec)
        .await?;
    info!(key = %record.key, phase = %record.spec.phase, "Provision phase set via API");
    Ok(Json(record))
}

pub async fn delete_provision(
    State(state): State<Arc<AppState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let key = RecordKey::new(namespace, name);
    state.store.delete(&key).await?;
    info!(%key, "Provision deleted via API");
    Ok(StatusCode::NO_CONTENT)
}
