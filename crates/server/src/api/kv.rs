//! Key/value endpoints: `GET /kv/`, `GET|PUT|POST|DELETE /kv/:key`.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct KvResponse {
    pub key: String,
    pub value: serde_json::Value,
    pub version: u64,
}

#[derive(Deserialize)]
pub struct SetRequest {
    pub value: serde_json::Value,
}

#[derive(Serialize)]
pub struct SetResponse {
    pub message: &'static str,
    pub key: String,
}

pub async fn get(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<KvResponse>> {
    let entry = state
        .kv
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::not_found("key not found"))?;
    let value: serde_json::Value =
        serde_json::from_slice(&entry.value).unwrap_or(serde_json::Value::String(
            String::from_utf8_lossy(&entry.value).into_owned(),
        ));
    Ok(Json(KvResponse { key: entry.key, value, version: entry.version }))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<KvResponse>>> {
    let entries = state.kv.list("").await?;
    let out = entries
        .into_iter()
        .map(|entry| {
            let value = serde_json::from_slice(&entry.value).unwrap_or(serde_json::Value::String(
                String::from_utf8_lossy(&entry.value).into_owned(),
            ));
            KvResponse { key: entry.key, value, version: entry.version }
        })
        .collect();
    Ok(Json(out))
}

pub async fn set(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetRequest>,
) -> ApiResult<Json<SetResponse>> {
    let bytes = serde_json::to_vec(&req.value).map_err(|e| ApiError::validation(e.to_string()))?;
    state.kv.set(&key, bytes).await?;
    Ok(Json(SetResponse { message: "key set", key }))
}

pub async fn delete(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    state.kv.delete(&key).await?;
    Ok(Json(serde_json::json!({ "message": "key deleted", "key": key })))
}
