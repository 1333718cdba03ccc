//! The economic context every stage mutates.
//!
//! RULE: There is no ambient state. Each run owns exactly one `World`
//! and passes it by `&mut` into every subsystem, in order.

use crate::{
    config::{ProfitRange, Scenario, SimConfig},
    member::Role,
    network::Network,
    types::Tick,
};
use serde::{Deserialize, Serialize};

/// Per-role counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleCounts {
    pub traffickers: usize,
    pub packagers:   usize,
    pub retailers:   usize,
}

impl RoleCounts {
    pub fn get(&self, role: Role) -> usize {
        match role {
            Role::Trafficker => self.traffickers,
            Role::Packager   => self.packagers,
            Role::Retailer   => self.retailers,
        }
    }

    pub fn add(&mut self, role: Role, n: usize) {
        match role {
            Role::Trafficker => self.traffickers += n,
            Role::Packager   => self.packagers += n,
            Role::Retailer   => self.retailers += n,
        }
    }

    pub fn total(&self) -> usize {
        self.traffickers + self.packagers + self.retailers
    }

    pub fn of_active(network: &Network) -> Self {
        Self {
            traffickers: network.active_count(Some(Role::Trafficker)),
            packagers:   network.active_count(Some(Role::Packager)),
            retailers:   network.active_count(Some(Role::Retailer)),
        }
    }
}

/// Which half of an open disruption window a tick falls into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowHalf {
    First,
    Second,
}

/// Law-enforcement disruption automaton.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DisruptionPhase {
    Normal,
    Window { start: Tick, duration: Tick },
}

impl DisruptionPhase {
    /// Window ticks are (start, start + duration]; the first half ends
    /// at start + duration / 2.
    pub fn half_at(&self, tick: Tick) -> Option<WindowHalf> {
        match *self {
            Self::Normal => None,
            Self::Window { start, duration } => {
                if tick <= start || tick > start + duration {
                    None
                } else if (tick - start) as f64 <= duration as f64 / 2.0 {
                    Some(WindowHalf::First)
                } else {
                    Some(WindowHalf::Second)
                }
            }
        }
    }

    pub fn has_expired(&self, tick: Tick) -> bool {
        match *self {
            Self::Normal => false,
            Self::Window { start, duration } => tick > start + duration,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicState {
    pub efficiency_vs_security: f64,
    pub profit_range:           ProfitRange,
    pub minor_arrest_weight:    f64,

    // ── Doses and packages ─────────────────────────
    pub gram_per_dose:               f64,
    pub unit_dose:                   f64,
    pub unit_dose_min:               f64,
    pub unit_dose_max:               f64,
    pub unit_dose_now:               u64,
    pub drug_package_of_traffickers: f64,
    pub drug_package_of_packagers:   f64,
    pub drug_package_of_retailers:   f64,

    // ── Stocks (grams) ─────────────────────────────
    pub stock_drug:             f64,
    pub stock_drug_traffickers: f64,
    pub stock_drug_packagers:   f64,
    pub stock_drug_retailers:   f64,
    pub target_stock_drug:      f64,

    // ── Prices ─────────────────────────────────────
    pub wholesale_price:     f64,
    pub wholesale_price_now: f64,
    pub retail_price:        f64,
    pub price_per_dose:      f64,

    // ── Finance ────────────────────────────────────
    pub cash_box:              f64,
    pub revenues:              f64,
    pub expenses:              f64,
    pub weekly_profit_now:     f64,
    pub last_weekly_profit:    f64,
    pub weekly_profit_target:  f64,
    pub cost_per_day:          f64,
    pub profit_of_traffickers: f64,
    pub profit_of_packagers:   f64,
    pub profit_of_retailers:   f64,

    // ── Activity counters ──────────────────────────
    pub n_acquisition:          u64,
    pub n_acquisition_vetoed:   u64,
    pub n_exhaust_traffickers:  u64,
    pub n_exhaust_packagers:    u64,
    pub n_exhaust_retailers:    u64,
    pub n_exhaust_retailers_90: u64,
    pub n_recruited:            RoleCounts,

    // ── Law enforcement ────────────────────────────
    pub disruption:          DisruptionPhase,
    pub n_disruptions:       u64,
    pub last_arrest_count:   usize,
    pub arrested_major:      RoleCounts,
    pub arrested_minor:      RoleCounts,

    // ── Observed extremes ──────────────────────────
    pub min_wholesale_price:   Option<f64>,
    pub max_wholesale_price:   Option<f64>,
    pub min_acquisition_index: Option<f64>,
    pub max_acquisition_index: Option<f64>,
}

impl EconomicState {
    pub fn new(config: &SimConfig, scenario: &Scenario) -> Self {
        let eta = scenario.efficiency_vs_security;
        Self {
            efficiency_vs_security: eta,
            profit_range:           config.profit_range(eta).clone(),
            minor_arrest_weight:    config.minor_arrest_weight(eta),

            gram_per_dose:               config.gram_per_dose,
            unit_dose:                   config.unit_dose.start,
            unit_dose_min:               config.unit_dose_min.start,
            unit_dose_max:               config.unit_dose_max.start,
            unit_dose_now:               0,
            drug_package_of_traffickers: 0.0,
            drug_package_of_packagers:   0.0,
            drug_package_of_retailers:   config.retailer_package(),

            stock_drug:             0.0,
            stock_drug_traffickers: 0.0,
            stock_drug_packagers:   0.0,
            stock_drug_retailers:   0.0,
            target_stock_drug:      0.0,

            wholesale_price:     config.wholesale_price.first,
            wholesale_price_now: config.wholesale_price.first,
            retail_price:        config.retail_price.first,
            price_per_dose:      config.price_per_dose,

            cash_box:              config.start_up_money(),
            revenues:              0.0,
            expenses:              0.0,
            weekly_profit_now:     0.0,
            last_weekly_profit:    0.0,
            weekly_profit_target:  config.weekly_profit.start,
            cost_per_day:          config.cost_per_day.start,
            profit_of_traffickers: 0.0,
            profit_of_packagers:   0.0,
            profit_of_retailers:   0.0,

            n_acquisition:          0,
            n_acquisition_vetoed:   0,
            n_exhaust_traffickers:  0,
            n_exhaust_packagers:    0,
            n_exhaust_retailers:    0,
            n_exhaust_retailers_90: 0,
            n_recruited:            RoleCounts::default(),

            disruption:        DisruptionPhase::Normal,
            n_disruptions:     0,
            last_arrest_count: 0,
            arrested_major:    RoleCounts::default(),
            arrested_minor:    RoleCounts::default(),

            min_wholesale_price:   None,
            max_wholesale_price:   None,
            min_acquisition_index: None,
            max_acquisition_index: None,
        }
    }

    /// Recompute package sizes, per-tier profit rates and the target
    /// stock from the current prices, doses and headcount.
    pub fn derive_parameters(&mut self, config: &SimConfig, counts: RoleCounts) {
        let eta = self.efficiency_vs_security;
        let avg_dose = self.unit_dose_min + (self.unit_dose_max - self.unit_dose_min) * eta / 3.0;
        let n_t = counts.traffickers.max(1) as f64;
        let n_p = counts.packagers.max(1) as f64;
        let n_r = counts.retailers.max(1) as f64;

        self.drug_package_of_traffickers = avg_dose * self.gram_per_dose / n_t * 30.0;
        self.drug_package_of_packagers = avg_dose * self.gram_per_dose / n_p;

        let supply_costs = if self.retail_price > 0.0 {
            self.wholesale_price / self.retail_price
        } else {
            0.0
        };
        let margin = self.cost_per_day - self.cost_per_day * supply_costs;
        let range = &self.profit_range;

        let profit_t = margin * config.traffickers_share_of_profits / n_t;
        self.profit_of_traffickers = profit_t.min(range.traffickers_max).max(range.traffickers_min);

        let profit_p = margin * (1.0 - config.traffickers_share_of_profits) / n_p;
        self.profit_of_packagers = profit_p.min(range.packagers_max).max(range.packagers_min);

        let profit_r =
            self.unit_dose * self.price_per_dose * config.retailers_share_of_profits / n_r;
        self.profit_of_retailers = profit_r.min(config.retailer_profit_cap);

        self.target_stock_drug =
            self.unit_dose * self.gram_per_dose * config.start_up_months * 30.0;
    }

    /// Re-read tier stocks from the member table. Keeps
    /// `stock_drug == traffickers + packagers + retailers` exact.
    pub fn sync_stocks(&mut self, network: &Network) {
        self.stock_drug_traffickers = network.stock_of(Role::Trafficker);
        self.stock_drug_packagers = network.stock_of(Role::Packager);
        self.stock_drug_retailers = network.stock_of(Role::Retailer);
        self.stock_drug =
            self.stock_drug_traffickers + self.stock_drug_packagers + self.stock_drug_retailers;
    }

    /// Debit cash and book the expense. Cash may go negative: that is
    /// the insolvency signal checked at the end of every tick.
    pub fn spend(&mut self, amount: f64) {
        self.cash_box -= amount;
        self.expenses += amount;
    }

    pub fn track_wholesale_price(&mut self, price: f64) {
        self.min_wholesale_price = Some(self.min_wholesale_price.map_or(price, |m| m.min(price)));
        self.max_wholesale_price = Some(self.max_wholesale_price.map_or(price, |m| m.max(price)));
    }

    pub fn track_acquisition_index(&mut self, index: f64) {
        self.min_acquisition_index =
            Some(self.min_acquisition_index.map_or(index, |m| m.min(index)));
        self.max_acquisition_index =
            Some(self.max_acquisition_index.map_or(index, |m| m.max(index)));
    }
}

/// Everything one simulation instance owns.
#[derive(Debug, Clone)]
pub struct World {
    pub config:   SimConfig,
    pub scenario: Scenario,
    pub network:  Network,
    pub econ:     EconomicState,
}

impl World {
    pub fn new(config: SimConfig, scenario: Scenario) -> Self {
        let econ = EconomicState::new(&config, &scenario);
        Self {
            config,
            scenario,
            network: Network::new(),
            econ,
        }
    }

    pub fn eta(&self) -> f64 {
        self.econ.efficiency_vs_security
    }

    pub fn active_counts(&self) -> RoleCounts {
        RoleCounts::of_active(&self.network)
    }
}
