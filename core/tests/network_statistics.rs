//! Statistics computed on engine output.

use narconet_core::{
    config::{ArrestTarget, Scenario, SimConfig},
    engine::SimEngine,
    member::Role,
    network_stats,
    store::SimStore,
};

#[test]
fn per_tick_statistics_stay_in_range() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut engine = SimEngine::build_test("stats-range".into(), 21).unwrap();
    engine.run_ticks(90).unwrap();

    for r in engine.records() {
        let s = &r.stats;
        let n = r.active.total();
        if n < 2 {
            continue;
        }
        assert!(s.n_components >= 1 && s.n_components <= n);
        assert!(s.max_component <= n);
        for v in [
            s.min_ndegree, s.avg_ndegree, s.max_ndegree, s.cen_ndegree,
            s.min_nbetweenness, s.avg_nbetweenness, s.max_nbetweenness, s.cen_nbetweenness,
        ] {
            assert!(v >= 0.0 && v <= 1.0 + 1e-9, "tick {}: {v} out of [0, 1]", r.tick);
        }
        assert!(s.min_ndegree <= s.avg_ndegree + 1e-12);
        assert!(s.avg_ndegree <= s.max_ndegree + 1e-12);
        assert!(s.average_path_length >= 1.0);
    }
}

#[test]
fn opening_network_is_a_forest() {
    let engine = SimEngine::build_test("stats-open".into(), 42).unwrap();
    let network = &engine.world().network;
    let s = network_stats::compute(network);

    // Every packager hangs off one trafficker and every retailer off one
    // packager: 44 members, 39 edges, no cycles.
    assert_eq!(network.relationship_count(), 39);
    assert_eq!(s.n_components, 44 - 39);
    assert!(s.max_nbetweenness > 0.0);
    assert!(s.average_path_length >= 1.0);
}

#[test]
fn arrests_shrink_the_traversed_graph() {
    let store = SimStore::in_memory().unwrap();
    store.migrate().unwrap();
    let config = SimConfig { major_disruption_tick: 3, ..SimConfig::default() };
    let scenario = Scenario {
        arrest_target: ArrestTarget::Count(10),
        target_role: Some(Role::Retailer),
        ..Scenario::default()
    };
    let mut engine = SimEngine::build("stats-arrest".into(), config, scenario, store).unwrap();
    engine.run_ticks(3).unwrap();

    let records = engine.records();
    assert_eq!(records[1].active.total(), 44);
    assert_eq!(records[2].active.total(), 34);
    assert!(records[2].stats.max_component <= 34);
}
