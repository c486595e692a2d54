//! Auth endpoints: login against the bootstrap root account, refresh,
//! token introspection, and API key management.
//!
//! There's no user store (see the root-account design note in
//! [`konsul_domain::config::RootConfig`]), so login and refresh both
//! operate on the single configured root identity. API key management is
//! restricted to callers holding the `admin` role or policy, checked
//! in-handler since it isn't part of the dynamic ACL resource table.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{ApiError, ApiResult};
use crate::middleware::context::SharedContext;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (Sha256::digest(a.as_bytes()), Sha256::digest(b.as_bytes()));
    bool::from(a.ct_eq(&b))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let root = &state.config.auth.root;
    let expected_password = std::env::var(&root.password_env)
        .map_err(|_| ApiError::unauthorized("login is not configured"))?;

    if !constant_time_eq(&req.username, &root.username) || !constant_time_eq(&req.password, &expected_password) {
        return Err(ApiError::unauthorized("invalid username or password"));
    }

    let pair = state
        .jwt
        .issue("root", &root.username, root.roles.clone(), root.policies.clone())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer",
        expires_in: pair.expires_in,
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let root = &state.config.auth.root;
    let pair = state
        .jwt
        .refresh(&req.refresh_token, &root.username, root.roles.clone(), root.policies.clone())
        .map_err(konsul_domain::Error::from)?;

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer",
        expires_in: pair.expires_in,
    }))
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub subject: String,
    pub username: Option<String>,
    pub roles: Vec<String>,
    pub policies: Vec<String>,
    pub auth_method: &'static str,
}

pub async fn verify(
    axum::extract::Extension(ctx): axum::extract::Extension<SharedContext>,
) -> ApiResult<Json<VerifyResponse>> {
    let identity = ctx.snapshot().identity;
    if identity.auth_method == "none" {
        return Err(ApiError::unauthorized("missing authorization header"));
    }
    Ok(Json(VerifyResponse {
        subject: identity.id,
        username: identity.name,
        roles: identity.roles,
        policies: identity.policies,
        auth_method: identity.auth_method,
    }))
}

fn require_admin(ctx: &SharedContext) -> ApiResult<()> {
    let identity = ctx.snapshot().identity;
    if identity.roles.iter().any(|r| r == "admin") || identity.policies.iter().any(|p| p == "admin") {
        Ok(())
    } else {
        Err(ApiError::forbidden("admin role or policy required"))
    }
}

#[derive(Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize)]
pub struct CreateApiKeyResponse {
    pub key: String,
    pub id: uuid::Uuid,
}

pub async fn create_api_key(
    axum::extract::Extension(ctx): axum::extract::Extension<SharedContext>,
    State(state): State<AppState>,
    Json(req): Json<CreateApiKeyRequest>,
) -> ApiResult<Json<CreateApiKeyResponse>> {
    require_admin(&ctx)?;
    let (raw, record) = state.api_keys.create(req.name, req.permissions, req.expires_at).await?;
    Ok(Json(CreateApiKeyResponse { key: raw, id: record.id }))
}

pub async fn list_api_keys(
    axum::extract::Extension(ctx): axum::extract::Extension<SharedContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<konsul_domain::model::ApiKeyPublic>>> {
    require_admin(&ctx)?;
    Ok(Json(state.api_keys.list().await?))
}

pub async fn get_api_key(
    axum::extract::Extension(ctx): axum::extract::Extension<SharedContext>,
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> ApiResult<Json<konsul_domain::model::ApiKeyPublic>> {
    require_admin(&ctx)?;
    let key = state.api_keys.get(&id).await?.ok_or_else(|| ApiError::not_found("api key not found"))?;
    Ok(Json(key))
}

pub async fn revoke_api_key(
    axum::extract::Extension(ctx): axum::extract::Extension<SharedContext>,
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&ctx)?;
    state.api_keys.revoke(&id).await?;
    Ok(Json(serde_json::json!({ "message": "api key revoked" })))
}

pub async fn delete_api_key(
    axum::extract::Extension(ctx): axum::extract::Extension<SharedContext>,
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&ctx)?;
    state.api_keys.delete(&id).await?;
    Ok(Json(serde_json::json!({ "message": "api key deleted" })))
}
