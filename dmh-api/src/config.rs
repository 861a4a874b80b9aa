// dmh-api/src/config.rs
// ============================================================================
// Module: DMH Configuration
// Description: Configuration loading and validation for DMH components.
// Purpose: Provide strict, fail-closed config parsing with env overrides.
// Dependencies: dmh-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file and overlaid with `DMH_`-prefixed
//! environment variables, where `__` maps to a key separator (for example
//! `DMH_REMOTE_VAULT__URL` sets `remote_vault.url`) and comma-separated
//! values become lists. Each enabled component declares its required keys;
//! missing or malformed configuration fails closed at startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use dmh_core::EnvelopeIdentity;
use dmh_core::ProcessUnit;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "dmh.toml";
/// Environment variable overriding the config path.
pub const CONFIG_PATH_ENV: &str = "DMH_CONFIG_FILE";
/// Prefix selecting environment overrides for config keys.
pub const ENV_OVERRIDE_PREFIX: &str = "DMH_";
/// Default HTTP bind address.
const DEFAULT_BIND: &str = "0.0.0.0:8080";
/// Default dispatcher tick period in seconds.
const DEFAULT_TICK_SECONDS: u64 = 900;
/// Default keeper-directed request timeout in milliseconds.
const DEFAULT_VAULT_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors; all are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file or an override failed to parse.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config contents failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Runnable DMH components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// Issuer: action store, dispatcher, operator API.
    Dmh,
    /// Keeper: secret store and release gate.
    Vault,
}

/// Top-level DMH configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Enabled components; must not be empty.
    pub components: Vec<Component>,
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Issuer state file configuration (required for the issuer).
    #[serde(default)]
    pub state: Option<StateConfig>,
    /// Remote keeper endpoint configuration (required for the issuer).
    #[serde(default)]
    pub remote_vault: Option<RemoteVaultConfig>,
    /// Keeper configuration (required for the keeper).
    #[serde(default)]
    pub vault: Option<VaultConfig>,
    /// Action timing configuration.
    #[serde(default)]
    pub action: ActionConfig,
    /// Dispatcher configuration.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Issuer state file configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// Path of the issuer state document.
    pub file: PathBuf,
}

/// Remote keeper endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteVaultConfig {
    /// Absolute base URL of the keeper.
    pub url: String,
    /// Client identifier under which secrets are filed.
    pub client_uuid: String,
    /// Keeper-directed request timeout in milliseconds.
    #[serde(default = "default_vault_timeout_ms")]
    pub timeout_ms: u64,
}

/// Keeper configuration.
#[derive(Clone, Deserialize)]
pub struct VaultConfig {
    /// Path of the keeper state document.
    pub file: PathBuf,
    /// Master private key encrypting all stored secrets at rest.
    pub key: String,
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("file", &self.file)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Action timing configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionConfig {
    /// Unit scaling `process_after` and `min_interval` for dispatcher and
    /// keeper alike.
    #[serde(default)]
    pub process_unit: ProcessUnit,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// Tick period in seconds.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

const fn default_tick_seconds() -> u64 {
    DEFAULT_TICK_SECONDS
}

const fn default_vault_timeout_ms() -> u64 {
    DEFAULT_VAULT_TIMEOUT_MS
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl Config {
    /// Loads configuration from disk using the default resolution rules:
    /// explicit path, then `DMH_CONFIG_FILE`, then `dmh.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when reading, parsing, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = match path {
            Some(path) => path.to_path_buf(),
            None => env::var(CONFIG_PATH_ENV)
                .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from),
        };
        let content =
            fs::read_to_string(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_toml(&content, env::vars())
    }

    /// Parses configuration from TOML content plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(
        content: &str,
        vars: impl Iterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let mut value: toml::Value =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        apply_env_overrides(&mut value, vars);
        let config: Self =
            value.try_into().map_err(|err: toml::de::Error| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns true when the component is enabled.
    #[must_use]
    pub fn has_component(&self, component: Component) -> bool {
        self.components.contains(&component)
    }

    /// Validates component requirements fail-closed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first violated requirement.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.components.is_empty() {
            return Err(ConfigError::Invalid("components must not be empty".to_string()));
        }
        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("server.bind must be a socket address".to_string()))?;
        if self.dispatcher.tick_seconds == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.tick_seconds must be greater than 0".to_string(),
            ));
        }
        if self.has_component(Component::Dmh) {
            self.validate_issuer()?;
        }
        if self.has_component(Component::Vault) {
            self.validate_keeper()?;
        }
        Ok(())
    }

    fn validate_issuer(&self) -> Result<(), ConfigError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("state.file is required".to_string()))?;
        if state.file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("state.file must not be empty".to_string()));
        }
        let remote = self.remote_vault.as_ref().ok_or_else(|| {
            ConfigError::Invalid("remote_vault.url and remote_vault.client_uuid are required".to_string())
        })?;
        if remote.client_uuid.is_empty() {
            return Err(ConfigError::Invalid(
                "remote_vault.client_uuid must not be empty".to_string(),
            ));
        }
        let url = Url::parse(&remote.url)
            .map_err(|_| ConfigError::Invalid("remote_vault.url must be a valid URL".to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid(
                "remote_vault.url must be an http(s) URL".to_string(),
            ));
        }
        if remote.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "remote_vault.timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_keeper(&self) -> Result<(), ConfigError> {
        let vault = self
            .vault
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("vault.file and vault.key are required".to_string()))?;
        if vault.file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("vault.file must not be empty".to_string()));
        }
        if vault.key.is_empty() {
            return Err(ConfigError::Invalid("vault.key must not be empty".to_string()));
        }
        EnvelopeIdentity::parse(&vault.key)
            .map_err(|_| ConfigError::Invalid("vault.key must be a valid private key".to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Environment Overrides
// ============================================================================

/// Overlays `DMH_`-prefixed environment variables onto the parsed document.
///
/// `DMH_REMOTE_VAULT__URL=http://k` sets `remote_vault.url`; values with a
/// comma split into string lists; integers and booleans are typed when they
/// parse as such. `DMH_CONFIG_FILE` selects the file and is not an override.
fn apply_env_overrides(value: &mut toml::Value, vars: impl Iterator<Item = (String, String)>) {
    for (name, raw) in vars {
        if name == CONFIG_PATH_ENV {
            continue;
        }
        let Some(stripped) = name.strip_prefix(ENV_OVERRIDE_PREFIX) else {
            continue;
        };
        if stripped.is_empty() {
            continue;
        }
        let path: Vec<String> =
            stripped.to_lowercase().split("__").map(ToString::to_string).collect();
        set_path(value, &path, typed_value(&raw));
    }
}

/// Parses an override value into the closest TOML type.
fn typed_value(raw: &str) -> toml::Value {
    if raw.contains(',') {
        let items: Vec<toml::Value> = raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| toml::Value::String(item.to_string()))
            .collect();
        return toml::Value::Array(items);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return toml::Value::Integer(int);
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return toml::Value::Boolean(boolean);
    }
    toml::Value::String(raw.to_string())
}

/// Sets a dotted path inside the document, materialising tables on the way.
fn set_path(value: &mut toml::Value, path: &[String], new_value: toml::Value) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let Some(table) = value.as_table_mut() else {
        return;
    };
    if rest.is_empty() {
        table.insert(head.clone(), new_value);
        return;
    }
    let entry = table
        .entry(head.clone())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if !entry.is_table() {
        *entry = toml::Value::Table(toml::map::Map::new());
    }
    set_path(entry, rest, new_value);
}
