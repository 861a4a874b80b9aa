// dmh-core/src/runtime/dispatch.rs
// ============================================================================
// Module: Dispatch Pass
// Description: One tick of the action release state machine.
// Purpose: Decide per-action eligibility and drive execution and cleanup.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! A dispatch pass walks the action snapshot once, in insertion order, and
//! drives each eligible action through decrypt → execute → record-run →
//! cleanup. Errors are recorded against the action and never propagate; the
//! retry policy is simply the next tick, which tolerates a keeper that is
//! temporarily unreachable or a key that is not yet released. The silence
//! check uses the heartbeat observed at the start of the pass, so a
//! heartbeat arriving mid-pass takes effect on the next tick.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::core::ProcessUnit;
use crate::core::ProcessedState;
use crate::core::gate_open;
use crate::core::throttle_open;
use crate::interfaces::ActionStore;
use crate::interfaces::DispatchErrorKind;
use crate::interfaces::DispatchMetrics;
use crate::interfaces::Executor;
use crate::interfaces::KeyVault;
use crate::interfaces::StoreError;
use crate::runtime::LifecycleEngine;

// ============================================================================
// SECTION: Pass Summary
// ============================================================================

/// Outcome of one dispatch pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Actions examined during the pass.
    pub examined: usize,
    /// Actions whose executor ran during the pass.
    pub executed: Vec<String>,
    /// Errors recorded during the pass, in encounter order.
    pub errors: Vec<(String, DispatchErrorKind)>,
}

// ============================================================================
// SECTION: Dispatch Pass
// ============================================================================

/// One-tick driver for the action state machine.
pub struct DispatchPass<'a, S, V> {
    /// Lifecycle engine executing the per-action steps.
    engine: &'a LifecycleEngine<S, V>,
    /// Executor capability resolving action kinds.
    executor: &'a dyn Executor,
    /// Metrics sink for per-action errors.
    metrics: &'a dyn DispatchMetrics,
    /// Time unit scaling the silence and throttle counters.
    unit: ProcessUnit,
}

impl<'a, S: ActionStore, V: KeyVault> DispatchPass<'a, S, V> {
    /// Creates a dispatch pass over the engine.
    pub const fn new(
        engine: &'a LifecycleEngine<S, V>,
        executor: &'a dyn Executor,
        metrics: &'a dyn DispatchMetrics,
        unit: ProcessUnit,
    ) -> Self {
        Self {
            engine,
            executor,
            metrics,
            unit,
        }
    }

    /// Runs one pass over a snapshot of the action list.
    ///
    /// Per-action failures are recorded in the summary and through the
    /// metrics sink; only a store snapshot failure aborts the pass.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the action snapshot or the heartbeat
    /// cannot be read.
    pub fn run(&self, now: OffsetDateTime) -> Result<DispatchSummary, StoreError> {
        let store = self.engine.store();
        let last_seen = store.last_seen()?;
        let snapshot = store.actions()?;

        let mut summary = DispatchSummary::default();
        for action in snapshot {
            if action.processed == ProcessedState::KeyDeleted {
                continue;
            }
            summary.examined += 1;
            if !gate_open(now, last_seen, action.process_after, self.unit) {
                continue;
            }
            let last_run = match store.action_last_run(&action.uuid) {
                Ok(last_run) => last_run,
                Err(_) => {
                    self.record(&mut summary, &action.uuid, DispatchErrorKind::LastRun);
                    continue;
                }
            };
            if !throttle_open(now, last_run, action.min_interval, self.unit) {
                continue;
            }

            if action.processed == ProcessedState::Unrun {
                let decrypted = match self.engine.decrypt_action(&action.uuid) {
                    Ok(decrypted) => decrypted,
                    Err(_) => {
                        self.record(&mut summary, &action.uuid, DispatchErrorKind::Decrypt);
                        continue;
                    }
                };
                if self.executor.run(&decrypted).is_err() {
                    self.record(&mut summary, &action.uuid, DispatchErrorKind::Execute);
                    continue;
                }
                if store.update_action_last_run(&action.uuid).is_err() {
                    self.record(&mut summary, &action.uuid, DispatchErrorKind::UpdateLastRun);
                    continue;
                }
                summary.executed.push(action.uuid.clone());
            }

            if action.min_interval == 0 {
                if self.engine.mark_processed(&action.uuid).is_err() {
                    self.record(&mut summary, &action.uuid, DispatchErrorKind::MarkProcessed);
                }
            }
        }
        Ok(summary)
    }

    /// Records one per-action error in the summary and the metrics sink.
    fn record(&self, summary: &mut DispatchSummary, uuid: &str, kind: DispatchErrorKind) {
        self.metrics.action_error(uuid, kind);
        summary.errors.push((uuid.to_string(), kind));
    }
}
