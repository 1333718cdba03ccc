//! Simulation clock: owns the tick counter, calendar boundaries and
//! the run/stop state.

use crate::types::{Tick, TICKS_PER_MONTH, TICKS_PER_WEEK, TICKS_PER_YEAR};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_tick: Tick,
    pub horizon:      Tick,
    /// Set once the run has stopped for good (horizon or collapse).
    pub stopped:      bool,
}

impl SimClock {
    pub fn new(horizon: Tick) -> Self {
        Self {
            current_tick: 0,
            horizon,
            stopped: false,
        }
    }

    /// Advance one tick. Returns the new tick number.
    pub fn advance(&mut self) -> Tick {
        self.current_tick += 1;
        self.current_tick
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn horizon_reached(&self) -> bool {
        self.current_tick >= self.horizon
    }

    /// Fractional simulated years elapsed at `tick`.
    pub fn years_at(tick: Tick) -> f64 {
        tick as f64 / TICKS_PER_YEAR as f64
    }
}

pub fn is_week_end(tick: Tick) -> bool {
    tick > 0 && tick.is_multiple_of(TICKS_PER_WEEK)
}

pub fn is_month_end(tick: Tick) -> bool {
    tick > 0 && tick.is_multiple_of(TICKS_PER_MONTH)
}

pub fn is_year_end(tick: Tick) -> bool {
    tick > 0 && tick.is_multiple_of(TICKS_PER_YEAR)
}

pub fn day_of_month(tick: Tick) -> Tick {
    tick % TICKS_PER_MONTH
}
