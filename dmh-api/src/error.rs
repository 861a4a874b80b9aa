// dmh-api/src/error.rs
// ============================================================================
// Module: API Error Mapping
// Description: Domain error to HTTP status translation and response bodies.
// Purpose: Render a uniform status envelope and keep fatal errors fatal.
// Dependencies: axum, dmh-core, dmh-vault
// ============================================================================

//! ## Overview
//! Handlers translate domain errors to statuses here: absent entities render
//! 404, invalid requests and duplicate inserts 400, a still-closed release
//! gate 423 on keeper reads (the delete route folds it into 404), everything
//! upstream or cryptographic 500. Persistence failures are not translated at
//! all: once a store cannot write, the in-memory and on-disk state may have
//! diverged, so the process logs and exits non-zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use dmh_core::EngineError;
use dmh_core::interfaces::StoreError;
use dmh_vault::VaultError;
use serde::Serialize;
use tracing::error;

// ============================================================================
// SECTION: Response Envelope
// ============================================================================

/// Uniform status envelope for non-resource responses.
#[derive(Debug, Serialize)]
pub struct StatusBody {
    /// User-level status message.
    pub status: &'static str,
    /// Application-level error detail for invalid requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Renders a success envelope with the given status code.
#[must_use]
pub fn status_ok(code: StatusCode) -> Response {
    (
        code,
        Json(StatusBody {
            status: "success",
            error: None,
        }),
    )
        .into_response()
}

// ============================================================================
// SECTION: API Errors
// ============================================================================

/// API-level error with a fixed status mapping.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or invalid field; renders 400.
    InvalidRequest(String),
    /// Requested entity absent; renders 404.
    NotFound,
    /// Release gate still closed; renders 423.
    Locked,
    /// Upstream, crypto, or internal failure; renders 500.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status, detail) = match self {
            Self::InvalidRequest(detail) => {
                (StatusCode::BAD_REQUEST, "Invalid request.", Some(detail))
            }
            Self::NotFound => (StatusCode::NOT_FOUND, "Resource not found.", None),
            Self::Locked => (StatusCode::LOCKED, "Resource is locked.", None),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error.", None),
        };
        (
            code,
            Json(StatusBody {
                status,
                error: detail,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// SECTION: Domain Error Translation
// ============================================================================

/// Maps an engine error onto the API taxonomy; persistence failures exit.
pub fn map_engine_error(err: &EngineError) -> ApiError {
    match err {
        EngineError::Store(StoreError::NotFound {
            ..
        }) => ApiError::NotFound,
        EngineError::Store(StoreError::Persist(detail)) => fatal_persist(detail),
        EngineError::Store(_) | EngineError::Vault(_) | EngineError::Crypto(_) => {
            ApiError::Internal
        }
    }
}

/// Maps a keeper error onto the API taxonomy; persistence failures exit.
pub fn map_vault_error(err: &VaultError) -> ApiError {
    match err {
        VaultError::NotFound {
            ..
        } => ApiError::NotFound,
        VaultError::AlreadyExists {
            ..
        } => ApiError::InvalidRequest(err.to_string()),
        VaultError::NotReleased {
            ..
        } => ApiError::Locked,
        VaultError::Persist(detail) => fatal_persist(detail),
        VaultError::Crypto(_) | VaultError::Corrupt(_) | VaultError::Invalid(_) => {
            ApiError::Internal
        }
    }
}

/// Maps a keeper delete error onto the API taxonomy.
///
/// The delete route answers with 200 or 404 only: a still-gated record is
/// reported as absent rather than locked, so the gate never discloses which
/// of the two states a refused delete was in.
pub fn map_vault_delete_error(err: &VaultError) -> ApiError {
    match err {
        VaultError::NotReleased {
            ..
        } => ApiError::NotFound,
        other => map_vault_error(other),
    }
}

/// Persistence failed after an in-memory mutation; the invariant that disk
/// never lags acknowledged state cannot be re-established, so exit.
fn fatal_persist(detail: &str) -> ! {
    error!(detail, "state persistence failed, terminating");
    std::process::exit(2);
}
