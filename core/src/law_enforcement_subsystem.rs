//! Law-enforcement subsystem: arrests and the disruption window.
//!
//! Per tick, in this order:
//!   1. Close an expired disruption window
//!   2. Minor arrest check (one fixed day of each month)
//!   3. Major disruption check (configured tick or schedule)
//!
//! The window itself is consulted by the flow subsystem (acquisition
//! gate) and the finance subsystem (recruitment freeze) through the
//! free functions below.

use crate::{
    clock,
    config::{ArrestTarget, DisruptionMode},
    error::SimResult,
    event::{ArrestKind, CollapseReason, SimEvent},
    member::Role,
    rng::SimRng,
    state::{DisruptionPhase, WindowHalf, World},
    subsystem::SimSubsystem,
    types::{MemberId, Tick},
};

#[derive(Debug, Default)]
pub struct LawEnforcementSubsystem;

impl LawEnforcementSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for LawEnforcementSubsystem {
    fn name(&self) -> &'static str { "law_enforcement" }

    fn update(
        &mut self,
        tick: Tick,
        world: &mut World,
        rng: &mut SimRng,
    ) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();

        if world.econ.disruption.has_expired(tick) {
            world.econ.disruption = DisruptionPhase::Normal;
            log::info!("tick={tick} disruption window closed");
            events.push(SimEvent::DisruptionEnded { tick });
        }

        if clock::day_of_month(tick) == world.config.minor_arrest_day {
            minor_arrest(tick, world, rng, &mut events);
        }

        if major_disruption_due(tick, world) {
            major_disruption(tick, world, rng, &mut events);
        }

        Ok(events)
    }
}

// ── Window queries ─────────────────────────────────────────────────

/// Acquisition gate. Returns the window half that vetoed this month's
/// acquisition, or `None` when acquisition may proceed.
///
/// First half: an arrest-size draw, then the (1 − η) draw.
/// Second half: the (1 − η) draw only.
pub fn acquisition_veto(tick: Tick, world: &World, rng: &mut SimRng) -> Option<WindowHalf> {
    let half = world.econ.disruption.half_at(tick)?;
    let eta = world.eta();

    if half == WindowHalf::First {
        let vetoed = match world.scenario.arrest_target {
            ArrestTarget::Percentage(pct) => rng.range_inclusive(0, 99) <= u64::from(pct),
            ArrestTarget::Count(_) => {
                let active = world.network.active_count(None) as u64;
                rng.range_inclusive(0, active) <= world.econ.last_arrest_count as u64
            }
        };
        if vetoed {
            return Some(half);
        }
    }

    if rng.uniform(0.0, 1.1) <= 1.0 - eta {
        return Some(half);
    }
    None
}

/// No recruitment while a disruption window is open.
pub fn recruitment_frozen(tick: Tick, world: &World) -> bool {
    world.econ.disruption.half_at(tick).is_some()
}

/// Why the organization can no longer operate, if it cannot.
pub fn collapse_reason(world: &World) -> Option<CollapseReason> {
    let counts = world.active_counts();
    for role in Role::ALL {
        if counts.get(role) == 0 {
            return Some(CollapseReason::RoleEmptied(role));
        }
    }
    if world.econ.cash_box < 0.0 {
        return Some(CollapseReason::Insolvent);
    }
    None
}

pub fn check_organization_viability(world: &World) -> bool {
    collapse_reason(world).is_none()
}

// ── Arrests ────────────────────────────────────────────────────────

/// Arrest `ids`, confiscate their inventory and book the per-role
/// counters. Already-arrested ids are ignored.
pub fn arrest_members(
    tick: Tick,
    world: &mut World,
    ids: &[MemberId],
    kind: ArrestKind,
) -> Vec<SimEvent> {
    let mut events = Vec::with_capacity(ids.len());
    for &id in ids {
        let Some(member) = world.network.member_mut(id) else { continue };
        if member.is_arrested() {
            continue;
        }
        member.arrest(tick);
        let confiscated = member.drug;
        member.drug = 0.0;
        let role = member.role();

        match kind {
            ArrestKind::Major => world.econ.arrested_major.add(role, 1),
            ArrestKind::Minor => world.econ.arrested_minor.add(role, 1),
        }
        log::debug!("tick={tick} {kind:?} arrest of {role} {id}, {confiscated:.1}g confiscated");
        events.push(SimEvent::MemberArrested { tick, member: id, role, kind, confiscated });
    }
    world.econ.sync_stocks(&world.network);
    events
}

fn minor_arrest(tick: Tick, world: &mut World, rng: &mut SimRng, events: &mut Vec<SimEvent>) {
    let draw = rng.uniform(0.0, world.config.minor_arrest_scale);
    if draw >= world.econ.minor_arrest_weight {
        return;
    }
    let active = world.network.active_members(None);
    let Some(i) = rng.choose_index(active.len()) else { return };
    events.extend(arrest_members(tick, world, &[active[i]], ArrestKind::Minor));
}

fn major_disruption_due(tick: Tick, world: &World) -> bool {
    if world.scenario.arrest_target.is_zero() {
        return false;
    }
    match world.scenario.disruption_mode {
        DisruptionMode::Single | DisruptionMode::Randomized => {
            tick == world.config.major_disruption_tick
        }
        DisruptionMode::Scheduled => world.config.scheduled_disruption_ticks.contains(&tick),
    }
}

/// Number of members a major event arrests out of `in_scope`.
pub fn major_arrest_count(target: ArrestTarget, in_scope: usize) -> usize {
    let n = match target {
        ArrestTarget::Percentage(pct) => {
            let n = in_scope * pct as usize / 100;
            if n == 0 && pct > 0 { 1 } else { n }
        }
        ArrestTarget::Count(count) => count,
    };
    n.min(in_scope)
}

fn window_duration(world: &World, rng: &mut SimRng) -> Tick {
    let base = world.config.stop_acquire_days;
    match world.scenario.disruption_mode {
        DisruptionMode::Single | DisruptionMode::Scheduled => base,
        DisruptionMode::Randomized => {
            let stretch = 1.0 + (1.0 - world.eta()) * rng.next_f64();
            (base as f64 * stretch).round() as Tick
        }
    }
}

fn major_disruption(tick: Tick, world: &mut World, rng: &mut SimRng, events: &mut Vec<SimEvent>) {
    let scope = world.network.active_members(world.scenario.target_role);
    let count = major_arrest_count(world.scenario.arrest_target, scope.len());
    if count == 0 {
        return;
    }

    let chosen: Vec<MemberId> = rng
        .sample_indices(scope.len(), count)
        .into_iter()
        .map(|i| scope[i])
        .collect();
    events.extend(arrest_members(tick, world, &chosen, ArrestKind::Major));

    let duration = window_duration(world, rng);
    let econ = &mut world.econ;
    econ.disruption = DisruptionPhase::Window { start: tick, duration };
    econ.n_disruptions += 1;
    econ.last_arrest_count = count;

    log::info!(
        "tick={tick} major disruption: {count} arrested{}, acquisition window {duration} ticks",
        world.scenario.target_role.map(|r| format!(" ({r}s)")).unwrap_or_default()
    );
    events.push(SimEvent::DisruptionStarted { tick, arrested: count, duration });
}
