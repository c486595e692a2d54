//! Backup/restore and KV+service export/import.
//!
//! Backups are gzip-compressed tarballs of the engine's on-disk state,
//! written under `<data_dir>/backups/`. Export/import instead move the
//! logical contents (KV entries + service entries) as JSON, independent
//! of the storage engine in use.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn backup_dir(state: &AppState) -> std::path::PathBuf {
    std::path::Path::new(&state.config.storage.data_dir).join("backups")
}

pub async fn create_backup(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let dir = backup_dir(&state);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let name = format!("backup-{}.tar.gz", chrono::Utc::now().format("%Y%m%dT%H%M%SZ"));
    let path = dir.join(&name);
    state.engine.backup(&path).await.map_err(konsul_domain::Error::from)?;
    Ok(Json(serde_json::json!({ "message": "backup created", "file": name })))
}

#[derive(Deserialize)]
pub struct RestoreRequest {
    pub file: String,
}

pub async fn restore(
    State(state): State<AppState>,
    Json(req): Json<RestoreRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let path = backup_dir(&state).join(&req.file);
    if !path.exists() {
        return Err(ApiError::not_found("backup file not found"));
    }
    state.engine.restore(&path).await.map_err(konsul_domain::Error::from)?;
    Ok(Json(serde_json::json!({ "message": "restore complete" })))
}

pub async fn export(State(state): State<AppState>) -> ApiResult<Json<konsul_storage::ExportedData>> {
    Ok(Json(state.engine.export_data().await.map_err(konsul_domain::Error::from)?))
}

pub async fn import(
    State(state): State<AppState>,
    Json(data): Json<konsul_storage::ExportedData>,
) -> ApiResult<Json<serde_json::Value>> {
    state.engine.import_data(data).await.map_err(konsul_domain::Error::from)?;
    Ok(Json(serde_json::json!({ "message": "import complete" })))
}

pub async fn list_backups(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let dir = backup_dir(&state);
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(e) => e,
        Err(_) => return Ok(Json(names)),
    };
    while let Some(entry) = entries.next_entry().await.map_err(|e| ApiError::internal(e.to_string()))? {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_owned());
        }
    }
    names.sort();
    Ok(Json(names))
}
