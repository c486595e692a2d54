//! Service catalog endpoints: register/deregister/heartbeat/list/get.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;

use konsul_domain::model::Service;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub address: String,
    pub port: u16,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.name.is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    state
        .catalog
        .register(Service { name: req.name.clone(), address: req.address, port: req.port })
        .await?;
    Ok(Json(serde_json::json!({ "message": "service registered", "name": req.name })))
}

pub async fn deregister(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.catalog.deregister(&name).await?;
    Ok(Json(serde_json::json!({ "message": "service deregistered", "name": name })))
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let found = state.catalog.heartbeat(&name).await?;
    if !found {
        return Err(ApiError::not_found("service not found"));
    }
    Ok(Json(serde_json::json!({ "message": "heartbeat recorded", "name": name })))
}

pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<Service>> {
    let svc = state
        .catalog
        .get(&name)
        .await?
        .ok_or_else(|| ApiError::not_found("service not found"))?;
    Ok(Json(svc))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Service>>> {
    Ok(Json(state.catalog.list().await?))
}
