//! Calibrated baseline: 5 traffickers, 5 packagers, 34 retailers,
//! seed 42, η = 0.5, no arrests.

use narconet_core::{
    config::SimConfig,
    engine::{SimEngine, TickOutcome},
    error::SimError,
    member::Role,
};

#[test]
fn first_day_keeps_headcount_and_cash() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut engine = SimEngine::build_test("baseline-day-1".into(), 42).unwrap();
    let opening_cash = engine.world().econ.cash_box;
    assert_eq!(opening_cash, SimConfig::default().start_up_money());

    let outcome = engine.run_ticks(1).unwrap();
    assert_eq!(outcome, TickOutcome::Continue);
    assert_eq!(engine.clock.current_tick, 1);

    let counts = engine.world().active_counts();
    assert_eq!(counts.get(Role::Trafficker), 5);
    assert_eq!(counts.get(Role::Packager), 5);
    assert_eq!(counts.get(Role::Retailer), 34);

    // No weekly or monthly rule fires on day 1: sales only add cash.
    assert!(engine.world().econ.cash_box >= opening_cash);

    let record = &engine.records()[0];
    assert_eq!(record.tick, 1);
    for stock in [
        record.stock_drug,
        record.stock_drug_traffickers,
        record.stock_drug_packagers,
        record.stock_drug_retailers,
    ] {
        assert!(stock >= 0.0, "negative stock {stock}");
    }
}

#[test]
fn opening_inventory_fills_the_target_stock() {
    let engine = SimEngine::build_test("baseline-open".into(), 42).unwrap();
    let econ = &engine.world().econ;
    assert!((econ.stock_drug - econ.target_stock_drug).abs() < 1e-6);
    assert_eq!(econ.stock_drug_traffickers, 0.0);

    let two_days = 2.0 * econ.unit_dose * econ.gram_per_dose;
    assert!((econ.stock_drug_retailers - two_days).abs() < 1e-6);
}

#[test]
fn synthetic_wiring_links_every_lower_tier_member() {
    let engine = SimEngine::build_test("baseline-wiring".into(), 42).unwrap();
    let net = &engine.world().network;
    for role in [Role::Packager, Role::Retailer] {
        for id in net.active_members(Some(role)) {
            assert!(net.degree(id) >= 1, "{role} {id} left unwired");
        }
    }
    assert_eq!(net.relationship_count(), 5 + 34);
    assert_eq!(engine.setup_report().relationships, 39);
}

#[test]
fn ticking_before_start_is_an_error() {
    let mut engine = SimEngine::build_test("baseline-unstarted".into(), 42).unwrap();
    assert!(matches!(engine.tick(), Err(SimError::RunNotStarted)));
}

#[test]
fn run_stops_at_the_horizon() {
    let mut engine = SimEngine::build_test("baseline-horizon".into(), 42).unwrap();
    engine.clock.horizon = 45;
    let summary = engine.run().unwrap();

    assert!(summary.ticks_run <= 45);
    assert_eq!(summary.records.len() as u64, summary.ticks_run);
    if summary.survived {
        assert_eq!(summary.ticks_run, 45);
    }
    assert_eq!(engine.tick().unwrap(), TickOutcome::Stop);
}
