// system-tests/src/lib.rs
// ============================================================================
// Module: System Tests
// Description: Placeholder library target; suites live under tests/.
// ============================================================================

//! End-to-end suites for the dead-man's hand system live in `tests/`.
