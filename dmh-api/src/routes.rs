// dmh-api/src/routes.rs
// ============================================================================
// Module: HTTP Routes
// Description: Issuer and keeper handlers plus operational endpoints.
// Purpose: Mount the HTTP contract per enabled component.
// Dependencies: axum, dmh-core, dmh-executors, dmh-store-file, dmh-vault
// ============================================================================

//! ## Overview
//! The issuer surface covers heartbeats and action CRUD plus a test-run
//! endpoint; the keeper surface covers per-client liveness and per-secret
//! create/read/delete; `/ready`, `/healthz`, and `/metrics` are always
//! mounted. Handlers validate request bodies fail-closed, bridge into the
//! synchronous core with `spawn_blocking`, and translate domain errors
//! through [`crate::error`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use dmh_core::Action;
use dmh_core::EncryptedAction;
use dmh_core::Executor;
use dmh_core::LifecycleEngine;
use dmh_core::SecretUpload;
use dmh_core::interfaces::ActionStore;
use dmh_executors::ExecutorRegistry;
use dmh_store_file::FileActionStore;
use dmh_vault::Vault;
use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;
use crate::error::map_engine_error;
use crate::error::map_vault_delete_error;
use crate::error::map_vault_error;
use crate::error::status_ok;
use crate::metrics::Metrics;
use crate::vault_client::HttpKeyVault;

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// Concrete engine type served by the issuer surface.
pub type IssuerEngine = LifecycleEngine<FileActionStore, HttpKeyVault>;

/// Issuer dependencies shared by handlers and the dispatcher task.
pub struct IssuerParts {
    /// Lifecycle engine over the file store and the keeper client.
    pub engine: IssuerEngine,
    /// Executor registry for dispatch and test runs.
    pub executors: ExecutorRegistry,
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct ApiState {
    /// Issuer dependencies when the issuer component is enabled.
    pub issuer: Option<Arc<IssuerParts>>,
    /// Keeper store when the keeper component is enabled.
    pub keeper: Option<Arc<Vault>>,
    /// Process metrics.
    pub metrics: Arc<Metrics>,
}

impl ApiState {
    fn issuer(&self) -> Result<Arc<IssuerParts>, ApiError> {
        self.issuer.clone().ok_or(ApiError::Internal)
    }

    fn keeper(&self) -> Result<Arc<Vault>, ApiError> {
        self.keeper.clone().ok_or(ApiError::Internal)
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the router for the enabled components.
#[must_use]
pub fn build_router(state: ApiState) -> Router {
    let mut router = Router::new()
        .route("/ready", get(health))
        .route("/healthz", get(health))
        .route("/metrics", get(render_metrics));
    if state.issuer.is_some() {
        router = router
            .route("/api/alive", get(alive).post(alive))
            .route("/api/action/test", post(test_action))
            .route("/api/action/store", get(list_actions).post(add_action))
            .route("/api/action/store/{uuid}", get(get_action).delete(delete_action));
    }
    if state.keeper.is_some() {
        router = router
            .route("/api/vault/alive/{client_uuid}", get(vault_alive))
            .route(
                "/api/vault/store/{client_uuid}/{secret_uuid}",
                get(vault_get).post(vault_add).delete(vault_delete),
            );
    }
    router.with_state(state)
}

// ============================================================================
// SECTION: Request Shapes
// ============================================================================

/// Operator request adding or test-running an action.
#[derive(Deserialize)]
pub struct AddActionRequest {
    /// Executor discriminant.
    #[serde(default)]
    pub kind: String,
    /// Executor payload as JSON text.
    #[serde(default)]
    pub data: String,
    /// Cleartext comment.
    #[serde(default)]
    pub comment: String,
    /// Silence gate; must be positive.
    #[serde(default)]
    pub process_after: i64,
    /// Re-fire gate; must be non-negative.
    #[serde(default)]
    pub min_interval: i64,
}

impl fmt::Debug for AddActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddActionRequest")
            .field("kind", &self.kind)
            .field("comment", &self.comment)
            .field("process_after", &self.process_after)
            .field("min_interval", &self.min_interval)
            .field("data", &"<redacted>")
            .finish()
    }
}

impl AddActionRequest {
    /// Validates bounds and the executor payload, producing the action.
    fn into_action(self, executors: &ExecutorRegistry) -> Result<Action, ApiError> {
        if self.process_after <= 0 {
            return Err(ApiError::InvalidRequest(
                "process_after should be greater than 0".to_string(),
            ));
        }
        if self.min_interval < 0 {
            return Err(ApiError::InvalidRequest(
                "min_interval should be greater or equal 0".to_string(),
            ));
        }
        let process_after = u32::try_from(self.process_after)
            .map_err(|_| ApiError::InvalidRequest("process_after is out of range".to_string()))?;
        let min_interval = u32::try_from(self.min_interval)
            .map_err(|_| ApiError::InvalidRequest("min_interval is out of range".to_string()))?;
        let action = Action {
            kind: self.kind,
            process_after,
            min_interval,
            comment: self.comment,
            data: self.data,
        };
        executors
            .validate(&action)
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        Ok(action)
    }
}

/// Issuer request adding a secret to the keeper.
#[derive(Deserialize)]
struct AddSecretRequest {
    /// Serialized private key.
    #[serde(default)]
    key: String,
    /// Client silence gate; must be positive.
    #[serde(default)]
    process_after: i64,
}

impl AddSecretRequest {
    fn into_upload(self) -> Result<SecretUpload, ApiError> {
        if self.key.is_empty() {
            return Err(ApiError::InvalidRequest("key must be provided".to_string()));
        }
        if self.process_after <= 0 {
            return Err(ApiError::InvalidRequest(
                "process_after should be greater than 0".to_string(),
            ));
        }
        let process_after = u32::try_from(self.process_after)
            .map_err(|_| ApiError::InvalidRequest("process_after is out of range".to_string()))?;
        Ok(SecretUpload {
            key: self.key,
            process_after,
        })
    }
}

// ============================================================================
// SECTION: Operational Handlers
// ============================================================================

async fn health() -> Response {
    status_ok(StatusCode::OK)
}

async fn render_metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => {
            warn!(error = %err, "metrics rendering failed");
            ApiError::Internal.into_response()
        }
    }
}

// ============================================================================
// SECTION: Issuer Handlers
// ============================================================================

/// Records an owner heartbeat and forwards it to the keeper.
///
/// The local update is not rolled back when forwarding fails; the 500 tells
/// the operator to retry while the issuer already considers itself seen.
async fn alive(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let issuer = state.issuer()?;
    let result = tokio::task::spawn_blocking(move || issuer.engine.heartbeat())
        .await
        .map_err(|_| ApiError::Internal)?;
    if let Err(err) = result {
        warn!(error = %err, "heartbeat forwarding failed");
        return Err(map_engine_error(&err));
    }
    Ok(status_ok(StatusCode::OK))
}

/// Runs an action immediately without storing anything.
async fn test_action(
    State(state): State<ApiState>,
    Json(request): Json<AddActionRequest>,
) -> Result<Response, ApiError> {
    let issuer = state.issuer()?;
    let action = request.into_action(&issuer.executors)?;
    let result = tokio::task::spawn_blocking(move || issuer.executors.run(&action))
        .await
        .map_err(|_| ApiError::Internal)?;
    result.map_err(|err| {
        warn!(error = %err, "test action failed");
        ApiError::InvalidRequest(err.to_string())
    })?;
    Ok(status_ok(StatusCode::OK))
}

async fn list_actions(State(state): State<ApiState>) -> Result<Json<Vec<EncryptedAction>>, ApiError> {
    let issuer = state.issuer()?;
    let actions = issuer.engine.store().actions().map_err(|_| ApiError::Internal)?;
    Ok(Json(actions))
}

async fn add_action(
    State(state): State<ApiState>,
    Json(request): Json<AddActionRequest>,
) -> Result<Response, ApiError> {
    let issuer = state.issuer()?;
    let action = request.into_action(&issuer.executors)?;
    let result = tokio::task::spawn_blocking(move || issuer.engine.add_action(action))
        .await
        .map_err(|_| ApiError::Internal)?;
    if let Err(err) = result {
        warn!(error = %err, "add action failed");
        let mapped = map_engine_error(&err);
        // Adds never 404: an upstream refusal is an internal failure here.
        return Err(match mapped {
            ApiError::NotFound => ApiError::Internal,
            other => other,
        });
    }
    Ok(status_ok(StatusCode::CREATED))
}

async fn get_action(
    State(state): State<ApiState>,
    Path(uuid): Path<String>,
) -> Result<Json<EncryptedAction>, ApiError> {
    let issuer = state.issuer()?;
    let found = issuer.engine.store().action(&uuid).map_err(|_| ApiError::Internal)?;
    match found {
        Some((_, action)) => Ok(Json(action)),
        None => Err(ApiError::NotFound),
    }
}

async fn delete_action(
    State(state): State<ApiState>,
    Path(uuid): Path<String>,
) -> Result<Response, ApiError> {
    let issuer = state.issuer()?;
    let result = tokio::task::spawn_blocking(move || issuer.engine.delete_action(&uuid))
        .await
        .map_err(|_| ApiError::Internal)?;
    result.map_err(|err| map_engine_error(&err))?;
    Ok(status_ok(StatusCode::OK))
}

// ============================================================================
// SECTION: Keeper Handlers
// ============================================================================

async fn vault_alive(
    State(state): State<ApiState>,
    Path(client_uuid): Path<String>,
) -> Result<Response, ApiError> {
    let keeper = state.keeper()?;
    let result = tokio::task::spawn_blocking(move || keeper.update_last_seen(&client_uuid))
        .await
        .map_err(|_| ApiError::Internal)?;
    result.map_err(|err| map_vault_error(&err))?;
    Ok(status_ok(StatusCode::OK))
}

async fn vault_get(
    State(state): State<ApiState>,
    Path((client_uuid, secret_uuid)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let keeper = state.keeper()?;
    let result =
        tokio::task::spawn_blocking(move || keeper.get_secret(&client_uuid, &secret_uuid))
            .await
            .map_err(|_| ApiError::Internal)?;
    match result {
        Ok(release) => Ok(Json(release).into_response()),
        Err(err) => Err(map_vault_error(&err)),
    }
}

async fn vault_add(
    State(state): State<ApiState>,
    Path((client_uuid, secret_uuid)): Path<(String, String)>,
    Json(request): Json<AddSecretRequest>,
) -> Result<Response, ApiError> {
    let keeper = state.keeper()?;
    let upload = request.into_upload()?;
    let result = tokio::task::spawn_blocking(move || {
        keeper.add_secret(&client_uuid, &secret_uuid, &upload)
    })
    .await
    .map_err(|_| ApiError::Internal)?;
    if let Err(err) = result {
        warn!(error = %err, "add secret failed");
        return Err(map_vault_error(&err));
    }
    Ok(status_ok(StatusCode::CREATED))
}

async fn vault_delete(
    State(state): State<ApiState>,
    Path((client_uuid, secret_uuid)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let keeper = state.keeper()?;
    let result =
        tokio::task::spawn_blocking(move || keeper.delete_secret(&client_uuid, &secret_uuid))
            .await
            .map_err(|_| ApiError::Internal)?;
    result.map_err(|err| map_vault_delete_error(&err))?;
    Ok(status_ok(StatusCode::OK))
}
