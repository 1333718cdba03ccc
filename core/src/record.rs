//! Per-tick result rows and the terminal run summary.
//!
//! The ordered `Vec<TickRecord>` is the run's result table; everything
//! downstream (export, plotting, comparison across scenarios) reads it.

use crate::{
    event::CollapseReason,
    network_stats::NetworkStats,
    state::{RoleCounts, World},
    types::{RunId, Tick},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickRecord {
    pub tick:   Tick,
    pub active: RoleCounts,

    pub cash_box: f64,
    pub revenues: f64,
    pub expenses: f64,

    pub stock_drug:             f64,
    pub stock_drug_traffickers: f64,
    pub stock_drug_packagers:   f64,
    pub stock_drug_retailers:   f64,

    pub profit_of_traffickers: f64,
    pub profit_of_packagers:   f64,
    pub profit_of_retailers:   f64,

    pub n_acquisition:          u64,
    pub n_acquisition_vetoed:   u64,
    pub n_exhaust_traffickers:  u64,
    pub n_exhaust_packagers:    u64,
    pub n_exhaust_retailers:    u64,
    pub n_exhaust_retailers_90: u64,

    #[serde(flatten)]
    pub stats: NetworkStats,
}

impl TickRecord {
    pub fn capture(tick: Tick, world: &World, stats: NetworkStats) -> Self {
        let econ = &world.econ;
        Self {
            tick,
            active: world.active_counts(),

            cash_box: econ.cash_box,
            revenues: econ.revenues,
            expenses: econ.expenses,

            stock_drug:             econ.stock_drug,
            stock_drug_traffickers: econ.stock_drug_traffickers,
            stock_drug_packagers:   econ.stock_drug_packagers,
            stock_drug_retailers:   econ.stock_drug_retailers,

            profit_of_traffickers: econ.profit_of_traffickers,
            profit_of_packagers:   econ.profit_of_packagers,
            profit_of_retailers:   econ.profit_of_retailers,

            n_acquisition:          econ.n_acquisition,
            n_acquisition_vetoed:   econ.n_acquisition_vetoed,
            n_exhaust_traffickers:  econ.n_exhaust_traffickers,
            n_exhaust_packagers:    econ.n_exhaust_packagers,
            n_exhaust_retailers:    econ.n_exhaust_retailers,
            n_exhaust_retailers_90: econ.n_exhaust_retailers_90,

            stats,
        }
    }
}

/// What a finished (or stopped) run reports to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id:         RunId,
    pub seed:           u64,
    pub ticks_run:      Tick,
    pub survived:       bool,
    pub collapse:       Option<CollapseReason>,
    pub cash_box:       f64,
    pub active:         RoleCounts,
    pub arrested_major: RoleCounts,
    pub arrested_minor: RoleCounts,
    pub recruited:      RoleCounts,
    pub records:        Vec<TickRecord>,
}
