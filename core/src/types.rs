//! Shared primitive types used across the entire simulation.

/// A simulation tick. One tick = one simulated day.
pub type Tick = u64;

/// Stable identifier of an organization member inside one run.
pub type MemberId = u32;

/// The canonical run identifier.
pub type RunId = String;

/// Days per simulated month. Acquisition, recruitment and parameter
/// updates all run on this boundary.
pub const TICKS_PER_MONTH: Tick = 30;

/// Days per simulated week (expense settlement).
pub const TICKS_PER_WEEK: Tick = 7;

/// Days per simulated year (status checkpoint, calibration anchors).
pub const TICKS_PER_YEAR: Tick = 365;

/// Fresh run identifier for a seed, unique across invocations.
pub fn new_run_id(seed: u64) -> RunId {
    format!("run-{seed}-{}", uuid::Uuid::new_v4().simple())
}
