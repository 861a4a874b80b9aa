// dmh-core/src/core/time.rs
// ============================================================================
// Module: DMH Time Model
// Description: Release time units and gate predicates.
// Purpose: Provide deterministic silence and throttle checks for callers.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Gate arithmetic never reads wall-clock time directly; callers supply `now`
//! so that issuer and keeper evaluate the same predicates deterministically
//! and tests can pin exact boundaries. A [`ProcessUnit`] scales the
//! `process_after` and `min_interval` counters carried by actions and
//! secrets; it is at least one second by construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::Duration;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Process Unit
// ============================================================================

/// Time unit scaling the silence and throttle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessUnit {
    /// One-second units, intended for tests and short-lived demos.
    Second,
    /// One-minute units.
    Minute,
    /// One-hour units (default).
    #[default]
    Hour,
}

impl ProcessUnit {
    /// Returns the unit length in seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
        }
    }

    /// Returns the stable configuration label for the unit.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
        }
    }

    /// Returns the wall-clock window spanned by `count` units.
    #[must_use]
    pub fn window(self, count: u32) -> Duration {
        Duration::seconds(self.seconds().saturating_mul(i64::from(count)))
    }
}

// ============================================================================
// SECTION: Gate Predicates
// ============================================================================

/// Returns true when the silence gate is open.
///
/// The gate uses strict inequality: exactly at the boundary the gate is still
/// closed. The same predicate implements the issuer's silence check and the
/// keeper's release gate.
#[must_use]
pub fn gate_open(
    now: OffsetDateTime,
    last_seen: OffsetDateTime,
    process_after: u32,
    unit: ProcessUnit,
) -> bool {
    now - last_seen > unit.window(process_after)
}

/// Returns true when the re-fire throttle permits another execution.
///
/// An action that never ran (`last_run` is `None`) is always permitted; the
/// silence gate remains the only barrier for the first execution.
#[must_use]
pub fn throttle_open(
    now: OffsetDateTime,
    last_run: Option<OffsetDateTime>,
    min_interval: u32,
    unit: ProcessUnit,
) -> bool {
    match last_run {
        None => true,
        Some(last_run) => now - last_run > unit.window(min_interval),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
