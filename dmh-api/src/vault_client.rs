// dmh-api/src/vault_client.rs
// ============================================================================
// Module: HTTP Key Vault Client
// Description: Keeper-directed HTTP client implementing the KeyVault seam.
// Purpose: Upload, fetch, and delete per-action keys with bounded timeouts.
// Dependencies: dmh-core, reqwest, url
// ============================================================================

//! ## Overview
//! The HTTP key vault talks to the keeper's `/api/vault` surface with a
//! bounded timeout and redirects disabled. Status codes map one-to-one onto
//! the [`KeyVaultError`] taxonomy: only `201` acknowledges an upload, only
//! `200` releases a fetch, and a delete treats `404` as success so retries
//! stay idempotent. Calls block; async callers bridge with `spawn_blocking`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use dmh_core::KeyVault;
use dmh_core::KeyVaultError;
use dmh_core::SecretRelease;
use dmh_core::SecretUpload;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use url::Url;

// ============================================================================
// SECTION: HTTP Key Vault
// ============================================================================

/// Keeper client bound to one base URL and client identifier.
pub struct HttpKeyVault {
    /// HTTP client with bounded timeout.
    client: Client,
    /// Keeper base URL.
    base: Url,
    /// Client identifier under which secrets are filed.
    client_uuid: String,
}

impl HttpKeyVault {
    /// Creates a new keeper client.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError`] when the base URL is invalid or the HTTP
    /// client cannot be created.
    pub fn new(
        base_url: &str,
        client_uuid: &str,
        timeout: Duration,
    ) -> Result<Self, KeyVaultError> {
        let base =
            Url::parse(base_url).map_err(|err| KeyVaultError::InvalidUrl(err.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| KeyVaultError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base,
            client_uuid: client_uuid.to_string(),
        })
    }

    /// Joins path segments onto the keeper base URL.
    fn join(&self, segments: &[&str]) -> Result<String, KeyVaultError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| KeyVaultError::InvalidUrl("base url cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }
}

impl KeyVault for HttpKeyVault {
    fn secret_url(&self, secret_uuid: &str) -> Result<String, KeyVaultError> {
        self.join(&["api", "vault", "store", &self.client_uuid, secret_uuid])
    }

    fn store_key(&self, url: &str, secret: &SecretUpload) -> Result<(), KeyVaultError> {
        let response = self
            .client
            .post(url)
            .json(secret)
            .send()
            .map_err(|err| KeyVaultError::Transport(err.to_string()))?;
        match response.status() {
            StatusCode::CREATED => Ok(()),
            other => Err(KeyVaultError::UnexpectedStatus(other.as_u16())),
        }
    }

    fn fetch_key(&self, url: &str) -> Result<SecretRelease, KeyVaultError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| KeyVaultError::Transport(err.to_string()))?;
        match response.status() {
            StatusCode::OK => {
                response.json().map_err(|err| KeyVaultError::Decode(err.to_string()))
            }
            StatusCode::NOT_FOUND => Err(KeyVaultError::NotFound),
            StatusCode::LOCKED => Err(KeyVaultError::Locked),
            other => Err(KeyVaultError::UnexpectedStatus(other.as_u16())),
        }
    }

    fn delete_key(&self, url: &str) -> Result<(), KeyVaultError> {
        let response = self
            .client
            .delete(url)
            .send()
            .map_err(|err| KeyVaultError::Transport(err.to_string()))?;
        match response.status() {
            // An absent record counts as deleted; retries stay idempotent.
            StatusCode::OK | StatusCode::NOT_FOUND => Ok(()),
            other => Err(KeyVaultError::UnexpectedStatus(other.as_u16())),
        }
    }

    fn forward_alive(&self) -> Result<(), KeyVaultError> {
        let url = self.join(&["api", "vault", "alive", &self.client_uuid])?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| KeyVaultError::Transport(err.to_string()))?;
        match response.status() {
            StatusCode::OK => Ok(()),
            other => Err(KeyVaultError::UnexpectedStatus(other.as_u16())),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
