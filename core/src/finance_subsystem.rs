//! Finance subsystem: wages, calibration drift and growth.
//!
//! Week end:  pay wages to active traffickers and packagers, pay family
//!            support for every arrested member, close the weekly profit.
//! Month end: move doses, prices, costs and targets along their
//!            calibration curves, re-derive packages and profit rates,
//!            then recruit toward the role targets.

use crate::{
    clock::{self, SimClock},
    error::SimResult,
    event::SimEvent,
    law_enforcement_subsystem::recruitment_frozen,
    member::{draw_attractiveness, RelationTag, Role},
    rng::SimRng,
    state::{RoleCounts, World},
    subsystem::SimSubsystem,
    types::{MemberId, Tick, TICKS_PER_WEEK},
};

#[derive(Debug, Default)]
pub struct FinanceSubsystem;

impl FinanceSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for FinanceSubsystem {
    fn name(&self) -> &'static str { "finance" }

    fn update(
        &mut self,
        tick: Tick,
        world: &mut World,
        rng: &mut SimRng,
    ) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        if clock::is_week_end(tick) {
            events.push(settle_week(tick, world, rng));
        }
        if clock::is_month_end(tick) {
            events.push(update_parameters(tick, world));
            recruit(tick, world, rng, &mut events);
        }
        Ok(events)
    }
}

/// Daily wage of one member: the tier rate moved by up to
/// ±`fluctuation`, kept inside the tier's profit band.
fn fluctuated_wage(rate: f64, min: f64, max: f64, fluctuation: f64, rng: &mut SimRng) -> f64 {
    let factor = 1.0 + rng.uniform(-fluctuation, fluctuation);
    (rate * factor).clamp(min.min(max), max.max(min))
}

fn settle_week(tick: Tick, world: &mut World, rng: &mut SimRng) -> SimEvent {
    let cfg = &world.config;
    let counts = world.active_counts();
    let days = TICKS_PER_WEEK as f64;

    let range = world.econ.profit_range.clone();
    let trafficker_wage = fluctuated_wage(
        world.econ.profit_of_traffickers,
        range.traffickers_min,
        range.traffickers_max,
        cfg.wage_fluctuation,
        rng,
    );
    let packager_wage = fluctuated_wage(
        world.econ.profit_of_packagers,
        range.packagers_min,
        range.packagers_max,
        cfg.wage_fluctuation,
        rng,
    );
    let wages = (trafficker_wage * counts.traffickers as f64
        + packager_wage * counts.packagers as f64)
        * days;

    let arrested_retailers = world.network.arrested_count(Role::Retailer) as f64;
    let arrested_others = (world.network.arrested_count(Role::Trafficker)
        + world.network.arrested_count(Role::Packager)) as f64;
    let family_support = arrested_retailers * cfg.arrested_retailer_weekly_wage
        + arrested_others * cfg.arrested_other_weekly_wage;

    let econ = &mut world.econ;
    econ.spend(wages + family_support);
    econ.weekly_profit_now -= wages + family_support;
    econ.last_weekly_profit = econ.weekly_profit_now;

    log::debug!(
        "tick={tick} weekly settlement: wages={wages:.0} family={family_support:.0} profit={:.0} cash={:.0}",
        econ.weekly_profit_now,
        econ.cash_box
    );
    SimEvent::WeeklyExpensesSettled {
        tick,
        wages,
        family_support,
        weekly_profit: econ.weekly_profit_now,
    }
}

/// Move every calibrated quantity to its value at `tick` and re-derive
/// packages, profit rates and the target stock.
pub fn update_parameters(tick: Tick, world: &mut World) -> SimEvent {
    let cfg = &world.config;
    let years = SimClock::years_at(tick);
    let span = cfg.calibration_years;

    let econ = &mut world.econ;
    econ.unit_dose = cfg.unit_dose.at(years, span).floor();
    econ.unit_dose_min = cfg.unit_dose_min.at(years, span).floor();
    econ.unit_dose_max = cfg.unit_dose_max.at(years, span).floor();
    econ.cost_per_day = cfg.cost_per_day.at(years, span).floor();
    econ.weekly_profit_target = cfg.weekly_profit.at(years, span).floor();
    econ.wholesale_price = cfg.wholesale_price.at(years, span);
    econ.retail_price = cfg.retail_price.at(years, span);

    let counts = RoleCounts::of_active(&world.network);
    econ.derive_parameters(cfg, counts);

    log::debug!(
        "tick={tick} parameters: unit_dose={} wholesale={:.2} retail={:.2} cost/day={}",
        econ.unit_dose,
        econ.wholesale_price,
        econ.retail_price,
        econ.cost_per_day
    );
    SimEvent::ParametersUpdated {
        tick,
        unit_dose: econ.unit_dose,
        wholesale_price: econ.wholesale_price,
        retail_price: econ.retail_price,
        cost_per_day: econ.cost_per_day,
    }
}

/// Roles a newcomer of `role` is wired to on arrival.
fn neighbour_roles(role: Role) -> &'static [Role] {
    match role {
        Role::Trafficker => &[Role::Packager],
        Role::Packager   => &[Role::Trafficker, Role::Retailer],
        Role::Retailer   => &[Role::Packager],
    }
}

/// Fill role deficits against the calibration targets. Each open slot
/// is filled with probability `recruitment_probability × (0.5 + η)`.
/// Frozen during a disruption window, after a losing week, or without
/// cash.
pub fn recruit(tick: Tick, world: &mut World, rng: &mut SimRng, events: &mut Vec<SimEvent>) {
    if recruitment_frozen(tick, world) {
        log::debug!("tick={tick} recruitment frozen by disruption window");
        return;
    }
    if world.econ.last_weekly_profit < 0.0 || world.econ.cash_box <= 0.0 {
        return;
    }

    let years = SimClock::years_at(tick);
    let span = world.config.calibration_years;
    let p = (world.config.recruitment_probability * (0.5 + world.eta())).min(1.0);

    for role in Role::ALL {
        let target = world.config.role_target(role).at(years, span).round().max(0.0) as usize;
        let active = world.network.active_count(Some(role));
        let deficit = target.saturating_sub(active);

        for _ in 0..deficit {
            if !rng.chance(p) {
                continue;
            }
            let attractiveness = draw_attractiveness(rng);
            let id = world.network.add_member(None, role, attractiveness);
            wire_newcomer(world, id, role, rng);
            world.econ.n_recruited.add(role, 1);
            log::debug!("tick={tick} recruited {role} {id}");
            events.push(SimEvent::MemberRecruited { tick, member: id, role });
        }
    }
}

fn wire_newcomer(world: &mut World, id: MemberId, role: Role, rng: &mut SimRng) {
    for &neighbour_role in neighbour_roles(role) {
        let candidates = world.network.active_members(Some(neighbour_role));
        if let Some(i) = rng.choose_index(candidates.len()) {
            let tag = RelationTag::between(role, neighbour_role);
            world.network.add_relationship(candidates[i], id, tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Scenario, SimConfig},
        state::DisruptionPhase,
    };

    fn world() -> World {
        let mut w = World::new(SimConfig::default(), Scenario::default());
        for (role, n) in [(Role::Trafficker, 2), (Role::Packager, 2), (Role::Retailer, 4)] {
            for _ in 0..n {
                w.network.add_member(None, role, 0.5);
            }
        }
        let counts = w.active_counts();
        w.econ.derive_parameters(&w.config, counts);
        w
    }

    #[test]
    fn weekly_settlement_pays_wages_and_family_support() {
        let mut w = world();
        let r = w.network.active_members(Some(Role::Retailer))[0];
        let t = w.network.active_members(Some(Role::Trafficker))[0];
        w.network.member_mut(r).unwrap().arrest(1);
        w.network.member_mut(t).unwrap().arrest(1);
        let cash = w.econ.cash_box;

        let mut rng = SimRng::new(5);
        let event = settle_week(7, &mut w, &mut rng);
        let SimEvent::WeeklyExpensesSettled { wages, family_support, .. } = event else {
            panic!("unexpected event {event:?}");
        };

        assert_eq!(family_support, 225.0 + 500.0);
        let range = &w.econ.profit_range;
        let low = (range.traffickers_min * 1.0 + range.packagers_min * 2.0) * 7.0;
        let high = (range.traffickers_max * 1.0 + range.packagers_max * 2.0) * 7.0;
        assert!(wages >= low - 1e-9 && wages <= high + 1e-9, "wages {wages}");
        assert!((w.econ.cash_box - (cash - wages - family_support)).abs() < 1e-6);
        assert!(w.econ.last_weekly_profit < 0.0);
    }

    #[test]
    fn parameters_reach_later_year_values_after_calibration_span() {
        let mut w = world();
        update_parameters(3 * 365, &mut w);
        assert_eq!(w.econ.unit_dose, 1500.0);
        assert_eq!(w.econ.cost_per_day, 26_900.0);
        assert!((w.econ.wholesale_price - w.config.wholesale_price.last).abs() < 1e-9);
        assert!((w.econ.target_stock_drug - 1500.0 * 0.25 * 60.0).abs() < 1e-9);
    }

    #[test]
    fn recruitment_is_frozen_inside_a_window() {
        let mut w = world();
        w.econ.disruption = DisruptionPhase::Window { start: 700, duration: 60 };
        let mut rng = SimRng::new(1);
        let mut events = Vec::new();
        recruit(720, &mut w, &mut rng, &mut events);
        assert!(events.is_empty());
        assert_eq!(w.econ.n_recruited.total(), 0);
    }

    #[test]
    fn recruits_are_wired_into_adjacent_tiers() {
        let mut w = world();
        w.config.recruitment_probability = 1.0;
        let before = w.network.len();
        let mut rng = SimRng::new(1);
        let mut events = Vec::new();
        recruit(30, &mut w, &mut rng, &mut events);

        assert!(!events.is_empty());
        assert_eq!(w.network.len(), before + events.len());
        for e in &events {
            let SimEvent::MemberRecruited { member, role, .. } = *e else { continue };
            let m = w.network.member(member).unwrap();
            assert_eq!(m.role(), role);
            assert!(m.partners.len() >= neighbour_roles(role).len());
        }
    }

    #[test]
    fn no_recruitment_after_a_losing_week() {
        let mut w = world();
        w.config.recruitment_probability = 1.0;
        w.econ.last_weekly_profit = -10.0;
        let mut events = Vec::new();
        recruit(30, &mut w, &mut SimRng::new(1), &mut events);
        assert!(events.is_empty());
    }
}
