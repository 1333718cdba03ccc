//! Subsystem trait.
//!
//! RULE: Every per-tick stage implements SimSubsystem.
//! The engine calls update() on each registered subsystem
//! in registration order, every tick.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    error::SimResult,
    event::SimEvent,
    rng::SimRng,
    state::World,
    types::Tick,
};

/// The contract every subsystem must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per tick by the engine.
    ///
    /// - `tick`:  the current tick number
    /// - `world`: the run's network and economic state
    /// - `rng`:   the run's single deterministic stream
    ///
    /// Returns the events this stage produced.
    fn update(
        &mut self,
        tick: Tick,
        world: &mut World,
        rng: &mut SimRng,
    ) -> SimResult<Vec<SimEvent>>;
}
