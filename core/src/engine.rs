//! The simulation engine: one organization, one run.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   0. Reset daily aggregates                  (engine)
//!   1. Acquisition, transfer, retail sale      (flow)
//!   2. Minor and major arrests                 (law_enforcement)
//!   3. Weekly settlement, monthly update,
//!      recruitment                             (finance)
//!   4. Network statistics and the tick record  (engine)
//!   5. Viability check                         (engine)
//!   6. Yearly checkpoint, monthly snapshot     (engine)
//!
//! RULES:
//!   - Subsystems execute in registration order, every tick.
//!   - No subsystem calls another subsystem's update().
//!   - All randomness flows through the single SimRng, in this order.
//!   - Every event is recorded in the event log.

use crate::{
    clock::{self, SimClock},
    config::{Scenario, SimConfig},
    error::{SimError, SimResult},
    event::{CollapseReason, EventLogEntry, SimEvent},
    finance_subsystem::FinanceSubsystem,
    flow_subsystem::FlowSubsystem,
    law_enforcement_subsystem::{collapse_reason, LawEnforcementSubsystem},
    member::{draw_attractiveness, RelationTag, Role},
    network_stats,
    record::{RunSummary, TickRecord},
    rng::SimRng,
    seed_network::{SeedNetwork, SetupReport},
    snapshot::{SimSnapshot, SNAPSHOT_INTERVAL},
    state::World,
    store::SimStore,
    subsystem::SimSubsystem,
    types::{RunId, Tick, TICKS_PER_WEEK, TICKS_PER_YEAR},
};

/// Whether the run can keep advancing after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

pub struct SimEngine {
    pub run_id: RunId,
    pub clock:  SimClock,
    pub store:  SimStore,
    seed:       u64,
    rng:        SimRng,
    world:      World,
    subsystems: Vec<Box<dyn SimSubsystem>>,
    records:    Vec<TickRecord>,
    setup:      SetupReport,
    started:    bool,
    collapse:   Option<CollapseReason>,
}

impl SimEngine {
    /// Empty organization with every subsystem registered.
    pub fn new(
        run_id: RunId,
        config: SimConfig,
        scenario: Scenario,
        store: SimStore,
    ) -> SimResult<Self> {
        config.validate()?;
        scenario.validate()?;
        let seed = scenario.seed;
        let mut engine = Self {
            run_id,
            clock: SimClock::new(scenario.horizon),
            store,
            seed,
            rng: SimRng::new(seed),
            world: World::new(config, scenario),
            subsystems: Vec::new(),
            records: Vec::new(),
            setup: SetupReport::default(),
            started: false,
            collapse: None,
        };

        // Execution order is fixed.
        engine.register(Box::new(FlowSubsystem::new()));
        engine.register(Box::new(LawEnforcementSubsystem::new()));
        engine.register(Box::new(FinanceSubsystem::new()));
        Ok(engine)
    }

    /// Engine over a synthetic organization: the configured headcount
    /// per role, each packager wired to a random trafficker and each
    /// retailer to a random packager.
    pub fn build(
        run_id: RunId,
        config: SimConfig,
        scenario: Scenario,
        store: SimStore,
    ) -> SimResult<Self> {
        let mut engine = Self::new(run_id, config, scenario, store)?;
        engine.populate_synthetic();
        engine.stock_initial_inventory();
        Ok(engine)
    }

    /// Engine over an observed roster.
    pub fn build_with_seed_network(
        run_id: RunId,
        config: SimConfig,
        scenario: Scenario,
        seed_network: &SeedNetwork,
        store: SimStore,
    ) -> SimResult<Self> {
        let mut engine = Self::new(run_id, config, scenario, store)?;
        engine.setup = seed_network.apply(&mut engine.world.network, &mut engine.rng)?;
        let setup = &engine.setup;
        if !setup.skipped_links.is_empty() || !setup.merged_links.is_empty() {
            log::warn!(
                "seed setup: {} links skipped, {} merged into earlier links",
                setup.skipped_links.len(),
                setup.merged_links.len()
            );
        }
        engine.stock_initial_inventory();
        Ok(engine)
    }

    /// Calibrated synthetic engine over a migrated in-memory store.
    pub fn build_test(run_id: RunId, seed: u64) -> SimResult<Self> {
        let store = SimStore::in_memory()?;
        store.migrate()?;
        let scenario = Scenario { seed, ..Scenario::default() };
        Self::build(run_id, SimConfig::default(), scenario, store)
    }

    /// Register a subsystem. Call in the documented execution order.
    pub fn register(&mut self, subsystem: Box<dyn SimSubsystem>) {
        self.subsystems.push(subsystem);
    }

    fn populate_synthetic(&mut self) {
        let network = &mut self.world.network;
        for role in Role::ALL {
            for _ in 0..self.world.config.initial_count(role) {
                let attractiveness = draw_attractiveness(&mut self.rng);
                network.add_member(None, role, attractiveness);
            }
        }

        for (upstream, downstream) in [(Role::Trafficker, Role::Packager), (Role::Packager, Role::Retailer)] {
            let uppers = network.active_members(Some(upstream));
            let tag = RelationTag::between(upstream, downstream);
            for lower in network.active_members(Some(downstream)) {
                if let Some(i) = self.rng.choose_index(uppers.len()) {
                    network.add_relationship(uppers[i], lower, tag);
                }
            }
        }
        self.setup = SetupReport {
            members: network.len(),
            relationships: network.relationship_count(),
            ..SetupReport::default()
        };
    }

    /// Derive the opening parameters and hand out the start-up stock:
    /// two days of doses to the retailers, the rest of the target to
    /// the packagers. Traffickers start empty.
    fn stock_initial_inventory(&mut self) {
        let world = &mut self.world;
        let counts = world.active_counts();
        world.econ.derive_parameters(&world.config, counts);

        let econ = &world.econ;
        let retail_days = 2.0 * econ.unit_dose * econ.gram_per_dose;
        let packager_stock = (econ.target_stock_drug - retail_days).max(0.0);
        let retailer_stock = econ.target_stock_drug - packager_stock;

        for (role, stock) in [(Role::Packager, packager_stock), (Role::Retailer, retailer_stock)] {
            let members = world.network.active_members(Some(role));
            if members.is_empty() {
                continue;
            }
            let share = stock / members.len() as f64;
            for id in members {
                if let Some(m) = world.network.member_mut(id) {
                    m.drug = share;
                }
            }
        }
        world.econ.sync_stocks(&world.network);
    }

    /// Register the run and log the opening state. Idempotent.
    pub fn start(&mut self) -> SimResult<()> {
        if self.started {
            return Ok(());
        }
        self.store.insert_run(
            &self.run_id,
            self.seed,
            env!("CARGO_PKG_VERSION"),
            chrono::Utc::now(),
        )?;
        let init = SimEvent::RunInitialized {
            run_id:        self.run_id.clone(),
            seed:          self.seed,
            members:       self.world.network.len(),
            relationships: self.world.network.relationship_count(),
        };
        self.persist(0, "engine", &init)?;
        log::info!(
            "{}: started with {} members, {} relationships, seed {}",
            self.run_id,
            self.world.network.len(),
            self.world.network.relationship_count(),
            self.seed
        );
        self.started = true;
        Ok(())
    }

    /// Advance one tick. This is the core simulation step.
    pub fn tick(&mut self) -> SimResult<TickOutcome> {
        if !self.started {
            return Err(SimError::RunNotStarted);
        }
        if self.clock.stopped {
            return Ok(TickOutcome::Stop);
        }
        let current_tick = self.clock.advance();
        self.reset_daily_aggregates(current_tick);
        self.persist(current_tick, "engine", &SimEvent::TickStarted { tick: current_tick })?;

        // Execute each subsystem in registration order.
        let mut emitted: Vec<(&'static str, SimEvent)> = Vec::new();
        for subsystem in &mut self.subsystems {
            let name = subsystem.name();
            let events = subsystem.update(current_tick, &mut self.world, &mut self.rng)?;
            emitted.extend(events.into_iter().map(|e| (name, e)));
        }
        for (name, event) in &emitted {
            self.persist(current_tick, name, event)?;
        }

        self.world.econ.sync_stocks(&self.world.network);
        let stats = network_stats::compute(&self.world.network);
        let record = TickRecord::capture(current_tick, &self.world, stats);
        self.store.append_tick_record(&self.run_id, &record)?;
        self.records.push(record);

        if let Some(reason) = collapse_reason(&self.world) {
            log::info!("tick={current_tick} organization collapsed: {reason:?}");
            self.collapse = Some(reason);
            self.persist(
                current_tick,
                "engine",
                &SimEvent::OrganizationCollapsed { tick: current_tick, reason },
            )?;
        } else if clock::is_year_end(current_tick) {
            self.yearly_checkpoint(current_tick)?;
        }

        if current_tick.is_multiple_of(SNAPSHOT_INTERVAL) {
            self.take_snapshot(current_tick)?;
        }
        self.persist(current_tick, "engine", &SimEvent::TickCompleted { tick: current_tick })?;

        if self.collapse.is_some() || self.clock.horizon_reached() {
            self.clock.stop();
            self.store.finish_run(
                &self.run_id,
                current_tick,
                self.collapse.is_none(),
                chrono::Utc::now(),
            )?;
            return Ok(TickOutcome::Stop);
        }
        Ok(TickOutcome::Continue)
    }

    /// Run up to n ticks, stopping early at horizon or collapse.
    pub fn run_ticks(&mut self, n: u64) -> SimResult<TickOutcome> {
        self.start()?;
        for _ in 0..n {
            if self.tick()? == TickOutcome::Stop {
                return Ok(TickOutcome::Stop);
            }
        }
        Ok(TickOutcome::Continue)
    }

    /// Run to the horizon or until the organization collapses.
    pub fn run(&mut self) -> SimResult<RunSummary> {
        self.start()?;
        while self.tick()? == TickOutcome::Continue {}
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        let econ = &self.world.econ;
        RunSummary {
            run_id:         self.run_id.clone(),
            seed:           self.seed,
            ticks_run:      self.clock.current_tick,
            survived:       self.collapse.is_none(),
            collapse:       self.collapse,
            cash_box:       econ.cash_box,
            active:         self.world.active_counts(),
            arrested_major: econ.arrested_major,
            arrested_minor: econ.arrested_minor,
            recruited:      econ.n_recruited,
            records:        self.records.clone(),
        }
    }

    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn setup_report(&self) -> &SetupReport {
        &self.setup
    }

    pub fn is_viable(&self) -> bool {
        self.collapse.is_none()
    }

    /// Query events for a specific tick from the store.
    pub fn store_events_for_tick(&self, tick: Tick) -> SimResult<Vec<EventLogEntry>> {
        self.store.events_for_tick(&self.run_id, tick)
    }

    fn reset_daily_aggregates(&mut self, tick: Tick) {
        let econ = &mut self.world.econ;
        econ.revenues = 0.0;
        econ.expenses = 0.0;
        if tick % TICKS_PER_WEEK == 1 {
            econ.weekly_profit_now = 0.0;
        }
        for id in self.world.network.active_members(Some(Role::Retailer)) {
            if let Some(m) = self.world.network.member_mut(id) {
                m.reset_daily_profit();
            }
        }
    }

    fn yearly_checkpoint(&mut self, tick: Tick) -> SimResult<()> {
        let year = tick / TICKS_PER_YEAR;
        let counts = self.world.active_counts();
        let cash_box = self.world.econ.cash_box;
        log::info!(
            "year {year}: cash={cash_box:.2} members T={} P={} R={} stock={:.2}g",
            counts.traffickers,
            counts.packagers,
            counts.retailers,
            self.world.econ.stock_drug
        );
        self.persist(
            tick,
            "engine",
            &SimEvent::YearCompleted { tick, year, cash_box, members: counts.total() },
        )
    }

    fn persist(&self, tick: Tick, subsystem: &str, event: &SimEvent) -> SimResult<()> {
        let entry = EventLogEntry {
            id:         None,
            run_id:     self.run_id.clone(),
            tick,
            subsystem:  subsystem.to_string(),
            event_type: event.type_name().to_string(),
            payload:    serde_json::to_string(event)?,
        };
        self.store.append_event(&entry)
    }

    fn take_snapshot(&self, tick: Tick) -> SimResult<()> {
        let snapshot = SimSnapshot {
            run_id: self.run_id.clone(),
            tick,
            clock:  self.clock.clone(),
            econ:   self.world.econ.clone(),
            active: self.world.active_counts(),
        };
        let json = serde_json::to_string(&snapshot)?;
        self.store.save_snapshot(&self.run_id, tick, &json)?;
        log::debug!("Snapshot saved at tick {tick}");
        Ok(())
    }
}
