// dmh-api/src/server.rs
// ============================================================================
// Module: Server Assembly
// Description: Component construction, background tasks, and serving.
// Purpose: Run the configured components until shutdown.
// Dependencies: dmh-core, dmh-executors, dmh-store-file, dmh-vault, tokio
// ============================================================================

//! ## Overview
//! Assembly is synchronous: stores, the keeper client, and the executor
//! registry are built before the runtime starts, then the router serves on
//! the configured bind address. The issuer additionally runs exactly one
//! dispatcher task and one metrics collector task; both stop cooperatively
//! through a watch signal, bounded by their in-flight iteration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use dmh_core::DispatchPass;
use dmh_core::LifecycleEngine;
use dmh_core::ProcessUnit;
use dmh_core::interfaces::ActionStore;
use dmh_executors::ExecutorRegistry;
use dmh_store_file::FileActionStore;
use dmh_vault::Vault;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::Component;
use crate::config::Config;
use crate::config::ConfigError;
use crate::metrics::Metrics;
use crate::metrics::MetricsError;
use crate::routes::ApiState;
use crate::routes::IssuerParts;
use crate::routes::build_router;
use crate::vault_client::HttpKeyVault;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Collector refresh period for the action gauge.
const COLLECT_PERIOD: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server startup and runtime errors.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Issuer state failed to open.
    #[error("issuer state error: {0}")]
    State(String),
    /// Keeper store failed to open.
    #[error("keeper store error: {0}")]
    Keeper(String),
    /// Executor registry failed to initialize.
    #[error("executor error: {0}")]
    Executors(String),
    /// Metrics registry failed to initialize.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    /// Keeper client failed to initialize.
    #[error("keeper client error: {0}")]
    VaultClient(String),
    /// Runtime or network failure while serving.
    #[error("server error: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Builds the shared state for the enabled components.
///
/// # Errors
///
/// Returns [`ServeError`] when any component fails to initialize; state-file
/// corruption is fatal here, before anything serves.
pub fn build_state(config: &Config) -> Result<ApiState, ServeError> {
    let metrics = Arc::new(Metrics::new()?);

    let issuer = if config.has_component(Component::Dmh) {
        info!("starting issuer component");
        let state_config =
            config.state.as_ref().ok_or_else(|| ServeError::State("missing state.file".to_string()))?;
        let remote = config.remote_vault.as_ref().ok_or_else(|| {
            ServeError::VaultClient("missing remote_vault configuration".to_string())
        })?;
        let store = FileActionStore::open(&state_config.file)
            .map_err(|err| ServeError::State(err.to_string()))?;
        let vault_client = HttpKeyVault::new(
            &remote.url,
            &remote.client_uuid,
            Duration::from_millis(remote.timeout_ms),
        )
        .map_err(|err| ServeError::VaultClient(err.to_string()))?;
        let executors = ExecutorRegistry::with_builtin_executors()
            .map_err(|err| ServeError::Executors(err.to_string()))?;
        Some(Arc::new(IssuerParts {
            engine: LifecycleEngine::new(store, vault_client),
            executors,
        }))
    } else {
        None
    };

    let keeper = if config.has_component(Component::Vault) {
        info!("starting keeper component");
        let vault_config = config
            .vault
            .as_ref()
            .ok_or_else(|| ServeError::Keeper("missing vault configuration".to_string()))?;
        let vault = Vault::open(&vault_config.key, &vault_config.file, config.action.process_unit)
            .map_err(|err| ServeError::Keeper(err.to_string()))?;
        Some(Arc::new(vault))
    } else {
        None
    };

    if issuer.is_some() && keeper.is_some() {
        warn!("issuer and keeper enabled in one process; this defeats the two-party split");
    }

    Ok(ApiState {
        issuer,
        keeper,
        metrics,
    })
}

/// Runs the configured components until interrupted.
///
/// # Errors
///
/// Returns [`ServeError`] on startup failure or when serving fails.
pub fn run(config: &Config) -> Result<(), ServeError> {
    let state = build_state(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| ServeError::Serve(err.to_string()))?;
    runtime.block_on(serve(config, state))
}

/// Serves HTTP and supervises the background tasks.
async fn serve(config: &Config, state: ApiState) -> Result<(), ServeError> {
    let (stop_tx, stop_rx) = watch::channel(false);

    if let Some(issuer) = &state.issuer {
        tokio::spawn(dispatcher_task(
            Arc::clone(issuer),
            Arc::clone(&state.metrics),
            config.action.process_unit,
            Duration::from_secs(config.dispatcher.tick_seconds),
            stop_rx.clone(),
        ));
        tokio::spawn(collector_task(
            Arc::clone(issuer),
            Arc::clone(&state.metrics),
            stop_rx.clone(),
        ));
    }

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|err| ServeError::Serve(format!("bind failed: {err}")))?;
    info!(bind = %config.server.bind, "listening");

    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = stop_tx.send(true);
    };
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| ServeError::Serve(err.to_string()))
}

// ============================================================================
// SECTION: Background Tasks
// ============================================================================

/// Periodic dispatcher: one pass per tick, stopped cooperatively.
pub async fn dispatcher_task(
    issuer: Arc<IssuerParts>,
    metrics: Arc<Metrics>,
    unit: ProcessUnit,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    info!(period_secs = period.as_secs(), unit = unit.as_str(), "dispatcher started");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let issuer = Arc::clone(&issuer);
                let metrics = Arc::clone(&metrics);
                let outcome = tokio::task::spawn_blocking(move || {
                    let pass = DispatchPass::new(
                        &issuer.engine,
                        &issuer.executors,
                        metrics.as_ref(),
                        unit,
                    );
                    pass.run(OffsetDateTime::now_utc())
                })
                .await;
                match outcome {
                    Ok(Ok(summary)) => {
                        if !summary.executed.is_empty() || !summary.errors.is_empty() {
                            info!(
                                executed = summary.executed.len(),
                                errors = summary.errors.len(),
                                "dispatch pass finished"
                            );
                        }
                        for (uuid, kind) in &summary.errors {
                            warn!(action = %uuid, kind = kind.as_str(), "dispatch step failed");
                        }
                    }
                    Ok(Err(err)) => error!(error = %err, "dispatch pass aborted"),
                    Err(err) => error!(error = %err, "dispatch task panicked"),
                }
            }
            _ = stop.changed() => {
                info!("dispatcher stopping");
                return;
            }
        }
    }
}

/// Periodic collector refreshing the action gauge.
pub async fn collector_task(
    issuer: Arc<IssuerParts>,
    metrics: Arc<Metrics>,
    mut stop: watch::Receiver<bool>,
) {
    info!("metrics collector started");
    let mut ticker = tokio::time::interval(COLLECT_PERIOD);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match issuer.engine.store().actions() {
                    Ok(actions) => metrics.observe_actions(&actions),
                    Err(err) => warn!(error = %err, "action gauge refresh failed"),
                }
            }
            _ = stop.changed() => {
                info!("metrics collector stopping");
                return;
            }
        }
    }
}
