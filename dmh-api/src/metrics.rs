// dmh-api/src/metrics.rs
// ============================================================================
// Module: DMH Metrics
// Description: Prometheus registry for action counts and dispatch errors.
// Purpose: Expose operational state without leaking payload contents.
// Dependencies: dmh-core, prometheus
// ============================================================================

//! ## Overview
//! Two metric families cover the core: `dmh_actions{processed}` gauges the
//! number of held actions per processing state, refreshed by a periodic
//! collector task, and `dmh_dispatch_errors_total{action,kind}` counts
//! per-action dispatch errors through the core metrics hook. The registry
//! renders at `GET /metrics` in the Prometheus text format.

// ============================================================================
// SECTION: Imports
// ============================================================================

use dmh_core::DispatchErrorKind;
use dmh_core::DispatchMetrics;
use dmh_core::EncryptedAction;
use dmh_core::ProcessedState;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Metrics registry errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric registration failed.
    #[error("metric registration failed: {0}")]
    Registration(#[from] prometheus::Error),
    /// Text encoding failed.
    #[error("metric encoding failed: {0}")]
    Encoding(String),
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Prometheus metrics for the DMH process.
pub struct Metrics {
    /// Registry backing the /metrics endpoint.
    registry: Registry,
    /// Held actions by processed state.
    actions: IntGaugeVec,
    /// Dispatch errors by action and error kind.
    dispatch_errors: IntCounterVec,
}

impl Metrics {
    /// Creates and registers the metric families.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] when registration fails.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let actions = IntGaugeVec::new(
            Opts::new("dmh_actions", "Number of actions held by the issuer"),
            &["processed"],
        )?;
        let dispatch_errors = IntCounterVec::new(
            Opts::new("dmh_dispatch_errors_total", "Dispatch errors by action and kind"),
            &["action", "kind"],
        )?;
        registry.register(Box::new(actions.clone()))?;
        registry.register(Box::new(dispatch_errors.clone()))?;
        Ok(Self {
            registry,
            actions,
            dispatch_errors,
        })
    }

    /// Refreshes the per-state action gauge from a store snapshot.
    pub fn observe_actions(&self, actions: &[EncryptedAction]) {
        for state in [ProcessedState::Unrun, ProcessedState::Ran, ProcessedState::KeyDeleted] {
            let count =
                actions.iter().filter(|action| action.processed == state).count();
            let label = state.code().to_string();
            self.actions
                .with_label_values(&[label.as_str()])
                .set(i64::try_from(count).unwrap_or(i64::MAX));
        }
    }

    /// Renders the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Encoding`] when encoding fails.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|err| MetricsError::Encoding(err.to_string()))?;
        String::from_utf8(buffer)
            .map_err(|err| MetricsError::Encoding(err.to_string()))
    }
}

impl DispatchMetrics for Metrics {
    fn action_error(&self, action_uuid: &str, kind: DispatchErrorKind) {
        self.dispatch_errors.with_label_values(&[action_uuid, kind.as_str()]).inc();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use dmh_core::ActionEncryption;

    use super::*;

    fn action(uuid: &str, processed: ProcessedState) -> EncryptedAction {
        EncryptedAction {
            kind: "dummy".to_string(),
            process_after: 1,
            min_interval: 0,
            comment: String::new(),
            data: "Y2lwaGVydGV4dA==".to_string(),
            uuid: uuid.to_string(),
            processed,
            last_run: None,
            encryption: ActionEncryption {
                kind: "X25519".to_string(),
                vault_url: format!("http://keeper.test/api/vault/store/c/{uuid}"),
            },
        }
    }

    #[test]
    fn gauge_counts_actions_per_state() {
        let metrics = Metrics::new().unwrap();
        metrics.observe_actions(&[
            action("a-1", ProcessedState::Unrun),
            action("a-2", ProcessedState::Unrun),
            action("a-3", ProcessedState::KeyDeleted),
        ]);
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("dmh_actions{processed=\"0\"} 2"));
        assert!(rendered.contains("dmh_actions{processed=\"1\"} 0"));
        assert!(rendered.contains("dmh_actions{processed=\"2\"} 1"));
    }

    #[test]
    fn dispatch_errors_accumulate_per_action_and_kind() {
        let metrics = Metrics::new().unwrap();
        metrics.action_error("a-1", DispatchErrorKind::Decrypt);
        metrics.action_error("a-1", DispatchErrorKind::Decrypt);
        metrics.action_error("a-1", DispatchErrorKind::Execute);
        let rendered = metrics.render().unwrap();
        assert!(rendered
            .contains("dmh_dispatch_errors_total{action=\"a-1\",kind=\"decrypt\"} 2"));
        assert!(rendered
            .contains("dmh_dispatch_errors_total{action=\"a-1\",kind=\"execute\"} 1"));
    }
}
