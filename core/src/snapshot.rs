//! Snapshot serialization: simulation state to JSON.
//!
//! A snapshot is taken every SNAPSHOT_INTERVAL ticks. It captures the
//! clock, the full economic state and the active headcount; the event
//! log holds everything between two snapshots.

use crate::{
    clock::SimClock,
    state::{EconomicState, RoleCounts},
    types::{RunId, Tick},
};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_INTERVAL: Tick = 30; // monthly

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub run_id: RunId,
    pub tick:   Tick,
    pub clock:  SimClock,
    pub econ:   EconomicState,
    pub active: RoleCounts,
}
