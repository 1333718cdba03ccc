//! Flow subsystem: moves drug down the supply chain.
//!
//! Per tick, in this order:
//!   1. Acquisition (month end only, gated by the disruption window)
//!   2. Trafficker → packager transfer
//!   3. Packager → retailer transfer
//!   4. Retail sale to consumers
//!
//! Downstream partners are chosen by trust-appeal score. Every transfer
//! strengthens the relationship it travels over.

use crate::{
    clock,
    error::SimResult,
    event::SimEvent,
    law_enforcement_subsystem::acquisition_veto,
    member::{RelationTag, Role},
    network::Network,
    rng::SimRng,
    state::World,
    subsystem::SimSubsystem,
    types::{MemberId, Tick},
};

#[derive(Debug, Default)]
pub struct FlowSubsystem;

impl FlowSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for FlowSubsystem {
    fn name(&self) -> &'static str { "flow" }

    fn update(
        &mut self,
        tick: Tick,
        world: &mut World,
        rng: &mut SimRng,
    ) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();
        if clock::is_month_end(tick) {
            acquire(tick, world, rng, &mut events);
        }
        package(tick, world, rng, &mut events);
        sell(tick, world, rng, &mut events);
        Ok(events)
    }
}

// ── Acquisition ────────────────────────────────────────────────────

/// Composite acquisition index and the realised wholesale price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionIndex {
    pub stock_index:     f64,
    pub market_index:    f64,
    pub price_index:     f64,
    pub wholesale_price: f64,
}

impl AcquisitionIndex {
    pub fn value(&self) -> f64 {
        self.stock_index * self.market_index * self.price_index
    }
}

fn draw_acquisition_index(world: &World, rng: &mut SimRng) -> AcquisitionIndex {
    let econ = &world.econ;
    let stock_index = if econ.target_stock_drug > 0.0 {
        (econ.stock_drug / econ.target_stock_drug).min(1.0)
    } else {
        0.0
    };

    let market = ((rng.standard_normal() + 3.0) / 6.0).clamp(0.0, 1.0);
    let market_index = market * (1.0 - econ.efficiency_vs_security);

    let base = econ.wholesale_price;
    let realised = (base + rng.normal(0.0, world.config.wholesale_price_noise_sd)).max(0.01);
    let band = world.config.wholesale_price_band;
    let price_index = if band > 0.0 {
        ((realised - (base - band)) / (2.0 * band)).clamp(0.0, 1.0)
    } else {
        0.5
    };

    AcquisitionIndex {
        stock_index,
        market_index,
        price_index,
        wholesale_price: realised,
    }
}

fn acquire(tick: Tick, world: &mut World, rng: &mut SimRng, events: &mut Vec<SimEvent>) {
    if let Some(half) = acquisition_veto(tick, world, rng) {
        world.econ.n_acquisition_vetoed += 1;
        log::debug!("tick={tick} acquisition vetoed ({half:?} half of disruption window)");
        events.push(SimEvent::AcquisitionVetoed { tick, half });
        return;
    }

    world.econ.sync_stocks(&world.network);
    let index = draw_acquisition_index(world, rng);
    let acquisition_index = index.value();
    let price = index.wholesale_price;
    world.econ.wholesale_price_now = price;
    world.econ.track_wholesale_price(price);
    world.econ.track_acquisition_index(acquisition_index);

    if world.econ.stock_drug > 2.0 * world.econ.target_stock_drug {
        log::debug!(
            "tick={tick} warehouses full ({:.1}g vs target {:.1}g), no acquisition",
            world.econ.stock_drug,
            world.econ.target_stock_drug
        );
        events.push(SimEvent::AcquisitionSkipped {
            tick,
            stock_drug: world.econ.stock_drug,
            target_stock_drug: world.econ.target_stock_drug,
        });
        return;
    }

    let traffickers = world.network.active_members(Some(Role::Trafficker));
    if traffickers.is_empty() {
        world.econ.n_exhaust_traffickers += 1;
        events.push(SimEvent::TierExhausted { tick, role: Role::Trafficker });
        return;
    }

    let package = world.econ.drug_package_of_traffickers;
    for id in traffickers {
        let rd = rng.next_f64() * rng.next_f64() * rng.next_f64();
        let Some(member) = world.network.member_mut(id) else { continue };

        if member.attractiveness / 100.0 + rd <= acquisition_index {
            member.record_acquisition(false);
            events.push(SimEvent::AcquisitionFailed { tick, member: id, acquisition_index });
            continue;
        }

        member.record_acquisition(true);
        let econ = &mut world.econ;
        let budget = econ.cash_box.max(0.0) * 0.5;
        let full_cost = price * package;
        let (grams, cost, partial) = if full_cost <= budget {
            (package, full_cost, false)
        } else {
            (budget / price, budget, true)
        };
        member.drug += grams;
        econ.cash_box = (econ.cash_box - cost).max(0.0);
        econ.expenses += cost;
        econ.n_acquisition += 1;

        log::debug!(
            "tick={tick} trafficker {id} acquired {grams:.1}g at {price:.2}/g{}",
            if partial { " (partial)" } else { "" }
        );
        events.push(SimEvent::DrugAcquired { tick, member: id, grams, price, partial });
    }

    world.econ.sync_stocks(&world.network);
}

// ── Partner selection ──────────────────────────────────────────────

/// Min–max normalisation. A degenerate range maps every value to 1.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= f64::EPSILON {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Trust-appeal score of every candidate, in candidate order.
///
/// trust  = (familiarity + visibility) / 2, weighted by (1 − η)
/// appeal = (attractiveness + visibility) / 2, weighted by η
///
/// Inputs and both components are min–max normalised across the
/// candidate set.
pub fn trust_appeal_scores(
    network: &Network,
    source: MemberId,
    candidates: &[MemberId],
    eta: f64,
) -> Vec<(MemberId, f64)> {
    let familiarity: Vec<f64> = candidates.iter().map(|&c| network.familiarity(source, c)).collect();
    let visibility: Vec<f64> = candidates.iter().map(|&c| network.visibility(c)).collect();
    let attractiveness: Vec<f64> = candidates
        .iter()
        .map(|&c| network.member(c).map(|m| m.attractiveness).unwrap_or(0.0))
        .collect();

    let fam = min_max_normalize(&familiarity);
    let vis = min_max_normalize(&visibility);
    let att = min_max_normalize(&attractiveness);

    let trust_raw: Vec<f64> = fam.iter().zip(&vis).map(|(f, v)| (f + v) / 2.0).collect();
    let appeal_raw: Vec<f64> = att.iter().zip(&vis).map(|(a, v)| (a + v) / 2.0).collect();
    let trust = min_max_normalize(&trust_raw);
    let appeal = min_max_normalize(&appeal_raw);

    candidates
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, (1.0 - eta) * trust[i] + eta * appeal[i]))
        .collect()
}

/// Best available downstream partner. Ties go to the first candidate.
pub fn select_partner(
    network: &Network,
    source: MemberId,
    candidates: &[MemberId],
    eta: f64,
) -> Option<MemberId> {
    let available: Vec<MemberId> = candidates
        .iter()
        .copied()
        .filter(|&c| network.member(c).is_some_and(|m| m.is_active() && m.is_available()))
        .collect();
    if available.is_empty() {
        return None;
    }
    let mut best: Option<(MemberId, f64)> = None;
    for (id, score) in trust_appeal_scores(network, source, &available, eta) {
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((id, score));
        }
    }
    best.map(|(id, _)| id)
}

/// Move min(package, source inventory) from `from` to `to` and
/// strengthen their relationship. Returns the grams moved.
pub fn transfer(
    network: &mut Network,
    from: MemberId,
    to: MemberId,
    package: f64,
    capacity: f64,
) -> f64 {
    let (Some(source), Some(dest)) = (network.member(from), network.member(to)) else {
        return 0.0;
    };
    let amount = package.min(source.drug).max(0.0);
    let tag = RelationTag::between(source.role(), dest.role());

    if let Some(source) = network.member_mut(from) {
        source.drug = (source.drug - amount).max(0.0);
    }
    if let Some(dest) = network.member_mut(to) {
        dest.drug += amount;
        if dest.drug >= capacity {
            dest.set_available(false);
        }
    }
    network.add_relationship(from, to, tag);
    amount
}

// ── Packaging ──────────────────────────────────────────────────────

fn package(tick: Tick, world: &mut World, rng: &mut SimRng, events: &mut Vec<SimEvent>) {
    let jitter = world.config.attractiveness_jitter;
    let eta = world.eta();

    let packagers = world.network.active_members(Some(Role::Packager));
    let packager_cap = world.config.packager_capacity;
    for &id in &packagers {
        if let Some(m) = world.network.member_mut(id) {
            m.refresh_availability(packager_cap);
            m.jitter_attractiveness(jitter, rng);
        }
    }

    world.econ.sync_stocks(&world.network);
    let traffickers = world.network.active_members(Some(Role::Trafficker));
    if traffickers.is_empty() || world.econ.stock_drug_traffickers <= 0.0 {
        world.econ.n_exhaust_traffickers += 1;
        events.push(SimEvent::TierExhausted { tick, role: Role::Trafficker });
    } else if packagers.is_empty() {
        world.econ.n_exhaust_packagers += 1;
        events.push(SimEvent::TierExhausted { tick, role: Role::Packager });
    } else {
        let package = world.econ.drug_package_of_packagers;
        for t in traffickers {
            let has_drug = world.network.member(t).is_some_and(|m| m.drug > 0.0);
            if !has_drug {
                continue;
            }
            if let Some(p) = select_partner(&world.network, t, &packagers, eta) {
                transfer(&mut world.network, t, p, package, packager_cap);
            }
        }
    }

    let retailers = world.network.active_members(Some(Role::Retailer));
    let retailer_cap = world.config.retailer_capacity;
    for &id in &retailers {
        if let Some(m) = world.network.member_mut(id) {
            m.refresh_availability(retailer_cap);
            m.jitter_attractiveness(jitter, rng);
        }
    }

    world.econ.sync_stocks(&world.network);
    let package = world.econ.drug_package_of_retailers;
    if packagers.is_empty() || world.econ.stock_drug_packagers < package || package <= 0.0 {
        world.econ.n_exhaust_packagers += 1;
        events.push(SimEvent::TierExhausted { tick, role: Role::Packager });
    } else if retailers.is_empty() {
        world.econ.n_exhaust_retailers += 1;
        events.push(SimEvent::TierExhausted { tick, role: Role::Retailer });
    } else {
        let econ = &world.econ;
        let target_amount = (econ.unit_dose_min
            + (econ.unit_dose_max - econ.unit_dose_min) * eta / 3.0)
            * econ.gram_per_dose;
        for p in packagers {
            let mut packages = 0u32;
            while f64::from(packages) * package < target_amount
                && world.network.member(p).is_some_and(|m| m.drug > 0.0)
            {
                let Some(r) = select_partner(&world.network, p, &retailers, eta) else { break };
                transfer(&mut world.network, p, r, package, retailer_cap);
                packages += 1;
            }
        }
    }

    world.econ.sync_stocks(&world.network);
}

// ── Retail sale ────────────────────────────────────────────────────

fn sell(tick: Tick, world: &mut World, rng: &mut SimRng, events: &mut Vec<SimEvent>) {
    let retailers = world.network.active_members(Some(Role::Retailer));
    if retailers.is_empty() {
        world.econ.n_exhaust_retailers += 1;
        events.push(SimEvent::TierExhausted { tick, role: Role::Retailer });
        return;
    }

    let cfg = &world.config;
    let econ = &mut world.econ;
    let dose_range = (econ.unit_dose_max - econ.unit_dose_min).max(0.0) as u64;
    let unit_dose_now = econ.unit_dose_min.max(0.0) as u64 + rng.range_inclusive(0, dose_range);
    econ.unit_dose_now = unit_dose_now;

    let share = cfg.retailers_share_of_profits;
    let price = econ.price_per_dose;
    econ.profit_of_retailers =
        (unit_dose_now as f64 * price * share / retailers.len() as f64).min(cfg.retailer_profit_cap);

    let gram_per_dose = econ.gram_per_dose;
    let retailer_cut = price * share;
    let org_margin = price - retailer_cut;
    let supply_cost = gram_per_dose * econ.wholesale_price_now;
    let profit_cap = cfg.retailer_profit_cap;

    let mut sold = 0u64;
    for dose in 0..unit_dose_now {
        let mut best: Option<(MemberId, f64)> = None;
        for &r in &retailers {
            let Some(m) = world.network.member(r) else { continue };
            let availability = m.availability().unwrap_or(0.0);
            if m.drug < gram_per_dose || availability <= 0.0 {
                continue;
            }
            let key = m.drug * availability;
            if best.is_none_or(|(_, k)| key > k) {
                best = Some((r, key));
            }
        }

        let Some((r, _)) = best else {
            econ.n_exhaust_retailers += 1;
            if (dose as f64) < unit_dose_now as f64 * 0.9 {
                econ.n_exhaust_retailers_90 += 1;
            }
            events.push(SimEvent::TierExhausted { tick, role: Role::Retailer });
            break;
        };

        if let Some(m) = world.network.member_mut(r) {
            m.drug = (m.drug - gram_per_dose).max(0.0);
            if m.add_daily_profit(retailer_cut) >= profit_cap {
                m.set_available(false);
            }
        }
        econ.cash_box += org_margin;
        econ.revenues += org_margin;
        econ.weekly_profit_now += org_margin - supply_cost;
        sold += 1;
    }

    log::debug!("tick={tick} sold {sold}/{unit_dose_now} doses");
    econ.sync_stocks(&world.network);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Scenario, SimConfig};

    #[test]
    fn normalization_maps_degenerate_range_to_one() {
        assert_eq!(min_max_normalize(&[3.0, 3.0]), vec![1.0, 1.0]);
        assert_eq!(min_max_normalize(&[1.0, 2.0, 3.0]), vec![0.0, 0.5, 1.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    fn chain() -> (Network, MemberId, Vec<MemberId>) {
        let mut net = Network::new();
        let p = net.add_member(None, Role::Packager, 0.5);
        let r1 = net.add_member(None, Role::Retailer, 0.2);
        let r2 = net.add_member(None, Role::Retailer, 0.9);
        (net, p, vec![r1, r2])
    }

    #[test]
    fn security_minded_organizations_prefer_familiar_partners() {
        let (mut net, p, rs) = chain();
        let tag = RelationTag::between(Role::Packager, Role::Retailer);
        net.add_relationship(p, rs[0], tag);
        net.add_relationship(p, rs[0], tag);
        assert_eq!(select_partner(&net, p, &rs, 0.0), Some(rs[0]));
    }

    #[test]
    fn efficiency_minded_organizations_prefer_attractive_partners() {
        let (net, p, rs) = chain();
        assert_eq!(select_partner(&net, p, &rs, 1.0), Some(rs[1]));
    }

    #[test]
    fn unavailable_candidates_are_never_selected() {
        let (mut net, p, rs) = chain();
        net.member_mut(rs[1]).unwrap().set_available(false);
        assert_eq!(select_partner(&net, p, &rs, 1.0), Some(rs[0]));
        net.member_mut(rs[0]).unwrap().set_available(false);
        assert_eq!(select_partner(&net, p, &rs, 1.0), None);
    }

    #[test]
    fn transfer_moves_at_most_one_package_and_links_endpoints() {
        let (mut net, p, rs) = chain();
        net.member_mut(p).unwrap().drug = 8.0;

        let moved = transfer(&mut net, p, rs[0], 5.75, 200.0);
        assert_eq!(moved, 5.75);
        assert!((net.member(p).unwrap().drug - 2.25).abs() < 1e-12);
        assert_eq!(net.member(rs[0]).unwrap().drug, 5.75);
        assert_eq!(net.familiarity(p, rs[0]), 1.0);

        let moved = transfer(&mut net, p, rs[0], 5.75, 200.0);
        assert!((moved - 2.25).abs() < 1e-12);
        assert_eq!(net.member(p).unwrap().drug, 0.0);
        assert_eq!(net.familiarity(p, rs[0]), 2.0);
    }

    fn world_with(roles: &[Role]) -> (World, Vec<MemberId>) {
        let mut w = World::new(SimConfig::default(), Scenario::default());
        let ids = roles.iter().map(|&r| w.network.add_member(None, r, 0.5)).collect();
        (w, ids)
    }

    #[test]
    fn short_cash_buys_a_partial_package_with_half_the_box() {
        let (mut w, ids) = world_with(&[Role::Trafficker]);
        w.econ.cash_box = 1_000.0;
        w.econ.drug_package_of_traffickers = 1.0e6;
        // Empty warehouses: acquisition index 0, so the trial always succeeds.
        let mut events = Vec::new();
        acquire(30, &mut w, &mut SimRng::new(4), &mut events);

        let (grams, price) = events
            .iter()
            .find_map(|e| match e {
                SimEvent::DrugAcquired { grams, price, partial: true, .. } => Some((*grams, *price)),
                _ => None,
            })
            .expect("partial acquisition");
        assert!((grams - 500.0 / price).abs() < 1e-9);
        assert!((w.econ.cash_box - 500.0).abs() < 1e-9);
        assert!((w.econ.expenses - 500.0).abs() < 1e-9);
        assert!((w.network.member(ids[0]).unwrap().drug - grams).abs() < 1e-9);
        assert!((w.econ.stock_drug_traffickers - grams).abs() < 1e-9);
    }

    #[test]
    fn overfull_warehouses_skip_the_month() {
        let (mut w, ids) = world_with(&[Role::Trafficker]);
        w.econ.target_stock_drug = 100.0;
        w.network.member_mut(ids[0]).unwrap().drug = 201.0;
        let cash = w.econ.cash_box;

        let mut events = Vec::new();
        acquire(30, &mut w, &mut SimRng::new(4), &mut events);

        assert!(matches!(
            events.as_slice(),
            [SimEvent::AcquisitionSkipped { tick: 30, .. }]
        ));
        assert_eq!(w.econ.cash_box, cash);
        assert_eq!(w.econ.n_acquisition, 0);
        assert_eq!(w.network.member(ids[0]).unwrap().drug, 201.0);
    }

    fn retail_world(doses_in_stock: f64, profit_cap: f64) -> (World, MemberId) {
        let (mut w, ids) = world_with(&[Role::Retailer]);
        w.config.retailers_share_of_profits = 0.5;
        w.config.retailer_profit_cap = profit_cap;
        w.econ.price_per_dose = 200.0;
        w.econ.unit_dose_min = 100.0;
        w.econ.unit_dose_max = 100.0;
        let grams = doses_in_stock * w.econ.gram_per_dose;
        w.network.member_mut(ids[0]).unwrap().drug = grams;
        (w, ids[0])
    }

    #[test]
    fn retailer_at_profit_cap_stops_selling_for_the_day() {
        let (mut w, r) = retail_world(1_000.0, 500.0);
        let mut events = Vec::new();
        sell(1, &mut w, &mut SimRng::new(2), &mut events);

        // 100 per dose to the retailer: the cap is reached on the fifth dose.
        assert!(!w.network.member(r).unwrap().is_available());
        assert!((w.econ.revenues - 500.0).abs() < 1e-9);
        assert_eq!(w.econ.n_exhaust_retailers, 1);
        assert_eq!(w.econ.n_exhaust_retailers_90, 1);
        assert!(events.iter().any(|e| matches!(e, SimEvent::TierExhausted { role: Role::Retailer, .. })));
    }

    #[test]
    fn running_dry_late_in_the_day_is_not_an_early_exhaustion() {
        let (mut w, r) = retail_world(95.5, f64::INFINITY);
        let mut events = Vec::new();
        sell(1, &mut w, &mut SimRng::new(2), &mut events);

        assert!(w.network.member(r).unwrap().is_available());
        assert!((w.econ.revenues - 95.0 * 100.0).abs() < 1e-6);
        assert_eq!(w.econ.n_exhaust_retailers, 1);
        assert_eq!(w.econ.n_exhaust_retailers_90, 0);
        assert!((w.econ.stock_drug_retailers - 0.5 * w.econ.gram_per_dose).abs() < 1e-9);
    }

    #[test]
    fn transfer_switches_destination_off_at_capacity() {
        let (mut net, p, rs) = chain();
        net.member_mut(p).unwrap().drug = 50.0;
        net.member_mut(rs[0]).unwrap().drug = 195.0;
        transfer(&mut net, p, rs[0], 5.75, 200.0);
        assert!(!net.member(rs[0]).unwrap().is_available());
    }
}
