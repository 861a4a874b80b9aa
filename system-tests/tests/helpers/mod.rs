// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Harness
// Description: In-process servers and a recording delivery sink.
// Purpose: Exercise issuer and keeper over real HTTP on ephemeral ports.
// Dependencies: axum, dmh-api, tokio
// ============================================================================

#![allow(
    dead_code,
    reason = "Each integration test binary links only the helpers it uses."
)]

use std::net::TcpListener as StdTcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use dmh_api::ApiState;
use dmh_api::HttpKeyVault;
use dmh_api::IssuerParts;
use dmh_api::Metrics;
use dmh_api::build_router;
use dmh_api::server::dispatcher_task;
use dmh_core::EnvelopeIdentity;
use dmh_core::LifecycleEngine;
use dmh_core::ProcessUnit;
use dmh_executors::ExecutorRegistry;
use dmh_store_file::FileActionStore;
use dmh_vault::Vault;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::sync::watch;

// ============================================================================
// SECTION: Server Handle
// ============================================================================

/// Handle for an in-process server; shuts down on drop.
pub struct TestServer {
    /// Base URL of the server.
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    stop: Option<watch::Sender<bool>>,
    join: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    /// Returns an absolute URL under this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(true);
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Dispatcher wiring for issuer servers.
struct DispatchSpec {
    issuer: Arc<IssuerParts>,
    metrics: Arc<Metrics>,
    unit: ProcessUnit,
    period: Duration,
}

/// Serves a router on an ephemeral port from a dedicated thread, optionally
/// with a dispatcher task beside it.
fn spawn_server(router: Router, dispatch: Option<DispatchSpec>) -> TestServer {
    let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind test listener");
    listener.set_nonblocking(true).expect("nonblocking listener");
    let addr = listener.local_addr().expect("listener addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (stop_tx, stop_rx) = watch::channel(false);
    let join = thread::spawn(move || {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("test runtime");
        runtime.block_on(async move {
            if let Some(wiring) = dispatch {
                tokio::spawn(dispatcher_task(
                    wiring.issuer,
                    wiring.metrics,
                    wiring.unit,
                    wiring.period,
                    stop_rx,
                ));
            }
            let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
    });
    TestServer {
        base_url: format!("http://{addr}"),
        shutdown: Some(shutdown_tx),
        stop: Some(stop_tx),
        join: Some(join),
    }
}

// ============================================================================
// SECTION: Component Servers
// ============================================================================

/// Spawns a keeper over a fresh state file with second-granularity gating.
pub fn spawn_keeper(state_file: &Path) -> TestServer {
    let master = EnvelopeIdentity::generate().encoded_private_key().to_string();
    let vault = Vault::open(&master, state_file, ProcessUnit::Second).expect("open vault");
    let state = ApiState {
        issuer: None,
        keeper: Some(Arc::new(vault)),
        metrics: Arc::new(Metrics::new().expect("metrics")),
    };
    spawn_server(build_router(state), None)
}

/// Spawns an issuer with a one-second dispatcher tick pointed at the keeper.
pub fn spawn_issuer(state_file: &Path, keeper_url: &str) -> TestServer {
    let store = FileActionStore::open(state_file).expect("open action store");
    let vault_client =
        HttpKeyVault::new(keeper_url, "client-1", Duration::from_secs(5)).expect("vault client");
    let issuer = Arc::new(IssuerParts {
        engine: LifecycleEngine::new(store, vault_client),
        executors: ExecutorRegistry::with_builtin_executors().expect("executors"),
    });
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let state = ApiState {
        issuer: Some(Arc::clone(&issuer)),
        keeper: None,
        metrics: Arc::clone(&metrics),
    };
    let dispatch = DispatchSpec {
        issuer,
        metrics,
        unit: ProcessUnit::Second,
        period: Duration::from_secs(1),
    };
    spawn_server(build_router(state), Some(dispatch))
}

// ============================================================================
// SECTION: Recording Sink
// ============================================================================

/// Delivery sink recording every JSON body it receives.
pub struct RecordingSink {
    server: TestServer,
    deliveries: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl RecordingSink {
    /// Returns the URL actions should deliver to.
    pub fn hook_url(&self) -> String {
        self.server.url("/hook")
    }

    /// Returns the recorded delivery bodies.
    pub fn deliveries(&self) -> Vec<serde_json::Value> {
        self.deliveries.lock().map_or_else(|_| Vec::new(), |entries| entries.clone())
    }
}

/// Spawns a sink that answers 200 to every POST and records the body.
pub fn spawn_recording_sink() -> RecordingSink {
    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let state = Arc::clone(&deliveries);
    let router = Router::new()
        .route(
            "/hook",
            post(
                |State(state): State<Arc<Mutex<Vec<serde_json::Value>>>>,
                 Json(body): Json<serde_json::Value>| async move {
                    if let Ok(mut entries) = state.lock() {
                        entries.push(body);
                    }
                    "ok"
                },
            ),
        )
        .with_state(state);
    RecordingSink {
        server: spawn_server(router, None),
        deliveries,
    }
}
