//! Calibration constants and per-run scenario parameters.
//!
//! `SimConfig` carries the calibrated economics of the organization
//! (anchored on the 2008 and 2010 observations) and is shared by every
//! run of an experiment. `Scenario` carries what varies per run: arrest
//! target, disruption mode, η, seed and horizon.

use crate::{
    error::{SimError, SimResult},
    member::Role,
    types::Tick,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A calibrated quantity observed at the start and end of the
/// calibration span.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Anchor {
    pub start: f64,
    pub end:   f64,
}

impl Anchor {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Logarithmic interpolation from `start` toward `end` over `span`
    /// years; holds at `end` once the span has elapsed.
    pub fn at(&self, years: f64, span: f64) -> f64 {
        self.start + (self.end - self.start) * log_fraction(years, span)
    }
}

/// Yearly price observations (first year, midpoint, last year).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceAnchors {
    pub first: f64,
    pub mid:   f64,
    pub last:  f64,
}

impl PriceAnchors {
    /// Piecewise logarithmic interpolation first → mid → last.
    pub fn at(&self, years: f64, span: f64) -> f64 {
        let half = span / 2.0;
        if years <= half {
            self.first + (self.mid - self.first) * log_fraction(years, half)
        } else {
            self.mid + (self.last - self.mid) * log_fraction(years - half, half)
        }
    }
}

fn log_fraction(years: f64, span: f64) -> f64 {
    if span <= 0.0 || years >= span {
        return 1.0;
    }
    if years <= 0.0 {
        return 0.0;
    }
    (1.0 + years).ln() / (1.0 + span).ln()
}

/// Daily profit band of traffickers and packagers for one η level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfitRange {
    pub eta:             f64,
    pub traffickers_min: f64,
    pub traffickers_max: f64,
    pub packagers_min:   f64,
    pub packagers_max:   f64,
}

/// Monthly minor-arrest weight for one η level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MinorArrestRate {
    pub eta:    f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // ── Population ─────────────────────────────────
    pub initial_traffickers: usize,
    pub initial_packagers:   usize,
    pub initial_retailers:   usize,
    pub traffickers_target:  Anchor,
    pub packagers_target:    Anchor,
    pub retailers_target:    Anchor,
    /// Years over which calibration anchors are interpolated.
    pub calibration_years:   f64,

    // ── Doses and packages ─────────────────────────
    pub gram_per_dose:          f64,
    pub unit_dose:              Anchor,
    pub unit_dose_min:          Anchor,
    pub unit_dose_max:          Anchor,
    pub retailer_package_doses: f64,
    pub packager_capacity:      f64,
    pub retailer_capacity:      f64,
    pub start_up_months:        f64,

    // ── Prices ─────────────────────────────────────
    pub wholesale_price:          PriceAnchors,
    pub retail_price:             PriceAnchors,
    pub price_per_dose:           f64,
    pub wholesale_price_noise_sd: f64,
    /// Half-width of the band the realised wholesale price is
    /// normalised over.
    pub wholesale_price_band:     f64,

    // ── Finance ────────────────────────────────────
    pub cost_per_day:                  Anchor,
    pub weekly_profit:                 Anchor,
    pub traffickers_share_of_profits:  f64,
    pub retailers_share_of_profits:    f64,
    pub retailer_profit_cap:           f64,
    pub arrested_retailer_weekly_wage: f64,
    pub arrested_other_weekly_wage:    f64,
    pub wage_fluctuation:              f64,
    pub profit_ranges:                 Vec<ProfitRange>,

    // ── Behaviour ──────────────────────────────────
    pub attractiveness_jitter:   f64,
    pub recruitment_probability: f64,

    // ── Law enforcement ────────────────────────────
    pub major_disruption_tick:      Tick,
    pub scheduled_disruption_ticks: Vec<Tick>,
    pub stop_acquire_days:          Tick,
    pub minor_arrest_day:           Tick,
    pub minor_arrest_scale:         f64,
    pub minor_arrest_rates:         Vec<MinorArrestRate>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_traffickers: 5,
            initial_packagers:   5,
            initial_retailers:   34,
            traffickers_target:  Anchor::new(5.0, 16.0),
            packagers_target:    Anchor::new(5.0, 13.0),
            retailers_target:    Anchor::new(34.0, 37.0),
            calibration_years:   2.0,

            gram_per_dose:          0.25,
            unit_dose:              Anchor::new(580.0, 1500.0),
            unit_dose_min:          Anchor::new(530.0, 1370.0),
            unit_dose_max:          Anchor::new(900.0, 2340.0),
            retailer_package_doses: 23.0,
            packager_capacity:      500.0,
            retailer_capacity:      200.0,
            start_up_months:        2.0,

            wholesale_price: PriceAnchors { first: 40.20, mid: 40.68, last: 43.90 },
            retail_price:    PriceAnchors { first: 70.26, mid: 70.47, last: 75.36 },
            price_per_dose:           32.0,
            wholesale_price_noise_sd: 8.73 * 0.5,
            wholesale_price_band:     10.0,

            cost_per_day:                  Anchor::new(10_300.0, 26_900.0),
            weekly_profit:                 Anchor::new(5_000.0 * 7.0, 12_900.0 * 7.0),
            traffickers_share_of_profits:  0.7,
            retailers_share_of_profits:    0.18,
            retailer_profit_cap:           500.0,
            arrested_retailer_weekly_wage: 225.0,
            arrested_other_weekly_wage:    500.0,
            wage_fluctuation:              0.1,
            profit_ranges: vec![
                ProfitRange { eta: 0.0, traffickers_min: 350.0, traffickers_max: 400.0, packagers_min: 175.0, packagers_max: 200.0 },
                ProfitRange { eta: 0.2, traffickers_min: 400.0, traffickers_max: 466.0, packagers_min: 200.0, packagers_max: 233.0 },
                ProfitRange { eta: 0.4, traffickers_min: 450.0, traffickers_max: 533.0, packagers_min: 225.0, packagers_max: 266.0 },
                ProfitRange { eta: 0.5, traffickers_min: 475.0, traffickers_max: 566.0, packagers_min: 237.0, packagers_max: 283.0 },
                ProfitRange { eta: 0.6, traffickers_min: 500.0, traffickers_max: 600.0, packagers_min: 250.0, packagers_max: 300.0 },
                ProfitRange { eta: 0.8, traffickers_min: 200.0, traffickers_max: 700.0, packagers_min: 50.0,  packagers_max: 350.0 },
                ProfitRange { eta: 1.0, traffickers_min: 200.0, traffickers_max: 800.0, packagers_min: 50.0,  packagers_max: 400.0 },
            ],

            attractiveness_jitter:   0.1,
            recruitment_probability: 0.5,

            major_disruption_tick:      2 * 365,
            scheduled_disruption_ticks: vec![450, 630, 810, 990, 1170, 1350, 1530],
            stop_acquire_days:          60,
            minor_arrest_day:           15,
            minor_arrest_scale:         9.99,
            minor_arrest_rates: vec![
                MinorArrestRate { eta: 0.0, weight: 1.01 },
                MinorArrestRate { eta: 0.2, weight: 0.84 },
                MinorArrestRate { eta: 0.4, weight: 0.67 },
                MinorArrestRate { eta: 0.6, weight: 0.80 },
                MinorArrestRate { eta: 0.8, weight: 2.00 },
                MinorArrestRate { eta: 1.0, weight: 0.99 },
            ],
        }
    }
}

impl SimConfig {
    /// Load a config file. Fields missing from the file keep their
    /// calibrated defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: SimConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.profit_ranges.is_empty() {
            return Err(invalid("profit_ranges", "table is empty"));
        }
        if self.minor_arrest_rates.is_empty() {
            return Err(invalid("minor_arrest_rates", "table is empty"));
        }
        if self.gram_per_dose <= 0.0 {
            return Err(invalid("gram_per_dose", "must be positive"));
        }
        if self.calibration_years <= 0.0 {
            return Err(invalid("calibration_years", "must be positive"));
        }
        Ok(())
    }

    /// Start-up cash: two months of the later-year daily cost, scaled
    /// down to the initial packager workforce.
    pub fn start_up_money(&self) -> f64 {
        self.cost_per_day.end * self.packagers_target.start / self.packagers_target.end
            * self.start_up_months
            * 30.0
    }

    pub fn retailer_package(&self) -> f64 {
        self.retailer_package_doses * self.gram_per_dose
    }

    pub fn profit_range(&self, eta: f64) -> &ProfitRange {
        nearest_by_eta(&self.profit_ranges, eta, |r| r.eta, "profit_ranges")
            .unwrap_or(&self.profit_ranges[0])
    }

    /// Weight from the minor-arrest table for `eta`. The table is
    /// empirically fitted and deliberately not interpolated.
    pub fn minor_arrest_weight(&self, eta: f64) -> f64 {
        nearest_by_eta(&self.minor_arrest_rates, eta, |r| r.eta, "minor_arrest_rates")
            .map(|r| r.weight)
            .unwrap_or(0.0)
    }

    pub fn role_target(&self, role: Role) -> Anchor {
        match role {
            Role::Trafficker => self.traffickers_target,
            Role::Packager   => self.packagers_target,
            Role::Retailer   => self.retailers_target,
        }
    }

    pub fn initial_count(&self, role: Role) -> usize {
        match role {
            Role::Trafficker => self.initial_traffickers,
            Role::Packager   => self.initial_packagers,
            Role::Retailer   => self.initial_retailers,
        }
    }
}

/// Exact-key lookup in an η-keyed table, falling back to the nearest
/// key (ties go to the lower key).
fn nearest_by_eta<'a, T>(
    entries: &'a [T],
    eta: f64,
    key: impl Fn(&T) -> f64,
    table: &str,
) -> Option<&'a T> {
    if let Some(exact) = entries.iter().find(|e| (key(e) - eta).abs() < 1e-9) {
        return Some(exact);
    }
    let mut best: Option<&T> = None;
    for entry in entries {
        best = match best {
            None => Some(entry),
            Some(current) => {
                let d_new = (key(entry) - eta).abs();
                let d_cur = (key(current) - eta).abs();
                if d_new < d_cur - 1e-12
                    || ((d_new - d_cur).abs() <= 1e-12 && key(entry) < key(current))
                {
                    Some(entry)
                } else {
                    Some(current)
                }
            }
        };
    }
    if let Some(found) = best {
        log::warn!(
            "{table}: no entry for eta={eta}, using nearest key {}",
            key(found)
        );
    }
    best
}

fn invalid(name: &'static str, reason: impl Into<String>) -> SimError {
    SimError::InvalidParameter { name, reason: reason.into() }
}

// ── Scenario ───────────────────────────────────────────────────────

/// How many members a major disruption arrests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArrestTarget {
    /// Percentage (0–100) of the active population in scope.
    Percentage(u32),
    /// Absolute number of members.
    Count(usize),
}

impl ArrestTarget {
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Percentage(0) | Self::Count(0))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionMode {
    /// One major event at the configured tick with a fixed window.
    Single,
    /// One major event whose window length is randomized by η.
    Randomized,
    /// Repeated major events on the configured schedule.
    Scheduled,
}

impl FromStr for DisruptionMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scenario1" | "single"     => Ok(Self::Single),
            "scenario2" | "randomized" => Ok(Self::Randomized),
            "scenario3" | "scheduled"  => Ok(Self::Scheduled),
            other => Err(SimError::UnknownDisruptionMode { mode: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub arrest_target:          ArrestTarget,
    /// Restrict major arrests to one role; `None` targets everyone.
    pub target_role:            Option<Role>,
    pub disruption_mode:        DisruptionMode,
    pub efficiency_vs_security: f64,
    pub seed:                   u64,
    pub horizon:                Tick,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            arrest_target:          ArrestTarget::Percentage(0),
            target_role:            None,
            disruption_mode:        DisruptionMode::Single,
            efficiency_vs_security: 0.5,
            seed:                   42,
            horizon:                5 * 365,
        }
    }
}

impl Scenario {
    pub fn validate(&self) -> SimResult<()> {
        let eta = self.efficiency_vs_security;
        if !(0.0..=1.0).contains(&eta) || eta.is_nan() {
            return Err(invalid("efficiency_vs_security", format!("{eta} not in [0, 1]")));
        }
        if let ArrestTarget::Percentage(p) = self.arrest_target {
            if p > 100 {
                return Err(invalid("arrest_target", format!("{p}% exceeds 100%")));
            }
        }
        if self.horizon == 0 {
            return Err(invalid("horizon", "must be at least one tick"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_eta_keys_hit_their_entry() {
        let config = SimConfig::default();
        assert_eq!(config.minor_arrest_weight(0.8), 2.00);
        assert_eq!(config.minor_arrest_weight(0.4), 0.67);
        assert_eq!(config.profit_range(0.5).traffickers_max, 566.0);
    }

    #[test]
    fn off_grid_eta_falls_back_to_nearest_lower_on_tie() {
        let config = SimConfig::default();
        // 0.5 sits between 0.4 and 0.6 in the minor-arrest table.
        assert_eq!(config.minor_arrest_weight(0.5), 0.67);
        assert_eq!(config.minor_arrest_weight(0.95), 0.99);
        assert_eq!(config.profit_range(0.05).eta, 0.0);
    }

    #[test]
    fn anchors_interpolate_logarithmically_and_hold() {
        let a = Anchor::new(100.0, 200.0);
        assert_eq!(a.at(0.0, 2.0), 100.0);
        assert_eq!(a.at(2.0, 2.0), 200.0);
        assert_eq!(a.at(5.0, 2.0), 200.0);
        let mid = a.at(1.0, 2.0);
        // ln 2 / ln 3 of the way: ahead of linear.
        assert!(mid > 150.0 && mid < 200.0, "mid {mid}");
    }

    #[test]
    fn price_anchors_pass_through_midpoint() {
        let p = SimConfig::default().wholesale_price;
        assert!((p.at(1.0, 2.0) - p.mid).abs() < 1e-9);
        assert!((p.at(0.0, 2.0) - p.first).abs() < 1e-9);
        assert!((p.at(3.0, 2.0) - p.last).abs() < 1e-9);
    }

    #[test]
    fn disruption_mode_selectors() {
        assert_eq!("scenario1".parse::<DisruptionMode>().unwrap(), DisruptionMode::Single);
        assert_eq!("Randomized".parse::<DisruptionMode>().unwrap(), DisruptionMode::Randomized);
        assert_eq!("scenario3".parse::<DisruptionMode>().unwrap(), DisruptionMode::Scheduled);
        assert!(matches!(
            "scenario9".parse::<DisruptionMode>(),
            Err(SimError::UnknownDisruptionMode { .. })
        ));
    }

    #[test]
    fn scenario_validation_rejects_bad_eta_and_percentage() {
        let mut s = Scenario::default();
        assert!(s.validate().is_ok());
        s.efficiency_vs_security = 1.5;
        assert!(s.validate().is_err());
        s.efficiency_vs_security = 0.5;
        s.arrest_target = ArrestTarget::Percentage(120);
        assert!(s.validate().is_err());
    }

    #[test]
    fn start_up_money_matches_calibration() {
        let expected = 26_900.0 * 5.0 / 13.0 * 2.0 * 30.0;
        assert!((SimConfig::default().start_up_money() - expected).abs() < 1e-6);
    }
}
