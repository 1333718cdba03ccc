//! sim-runner: headless runner for one organization-resilience run.
//!
//! Usage:
//!   sim-runner --seed 42 --ticks 1825 --eta 0.5 --arrest 30 --mode scenario1
//!   sim-runner --seed 7 --arrest-count 3 --target-role packager --db run.db
//!   sim-runner --seed-network roster.json --config calibration.json --out summary.json

use anyhow::{Context, Result};
use narconet_core::{
    config::{ArrestTarget, DisruptionMode, Scenario, SimConfig},
    engine::SimEngine,
    member::Role,
    record::RunSummary,
    seed_network::SeedNetwork,
    store::SimStore,
    types::new_run_id,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let defaults = Scenario::default();
    let seed = parse_arg(&args, "--seed", defaults.seed);
    let ticks = parse_arg(&args, "--ticks", defaults.horizon);
    let eta = parse_arg(&args, "--eta", defaults.efficiency_vs_security);
    let db = flag_value(&args, "--db").unwrap_or(":memory:");

    let arrest_target = match flag_value(&args, "--arrest-count") {
        Some(n) => ArrestTarget::Count(n.parse().context("--arrest-count")?),
        None => ArrestTarget::Percentage(parse_arg(&args, "--arrest", 0u32)),
    };
    let target_role = flag_value(&args, "--target-role")
        .map(str::parse::<Role>)
        .transpose()?;
    let disruption_mode = flag_value(&args, "--mode")
        .map(str::parse::<DisruptionMode>)
        .transpose()?
        .unwrap_or(defaults.disruption_mode);

    let scenario = Scenario {
        arrest_target,
        target_role,
        disruption_mode,
        efficiency_vs_security: eta,
        seed,
        horizon: ticks,
    };
    let config = match flag_value(&args, "--config") {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    println!("narconet sim-runner");
    println!("  seed:      {seed}");
    println!("  ticks:     {ticks}");
    println!("  eta:       {eta}");
    println!("  arrests:   {arrest_target:?} ({disruption_mode:?})");
    println!("  db:        {db}");
    println!();

    let store = if db == ":memory:" {
        SimStore::in_memory()?
    } else {
        SimStore::open(db)?
    };
    store.migrate()?;

    let run_id = new_run_id(seed);
    let mut engine = match flag_value(&args, "--seed-network") {
        Some(path) => {
            let roster = SeedNetwork::load(path).with_context(|| format!("loading {path}"))?;
            SimEngine::build_with_seed_network(run_id, config, scenario, &roster, store)?
        }
        None => SimEngine::build(run_id, config, scenario, store)?,
    };

    let setup = engine.setup_report();
    if !setup.skipped_links.is_empty() {
        log::warn!("{} seed links referenced unknown members and were skipped", setup.skipped_links.len());
    }
    if !setup.merged_links.is_empty() {
        log::warn!("{} seed links repeated an earlier pair and were merged", setup.merged_links.len());
    }

    let summary = engine.run()?;
    print_summary(&summary);

    if let Some(out) = flag_value(&args, "--out") {
        std::fs::write(out, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing {out}"))?;
        println!("  summary written to {out}");
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:       {}", summary.run_id);
    println!("  ticks run:    {}", summary.ticks_run);
    match summary.collapse {
        None => println!("  survived:     yes"),
        Some(reason) => println!("  survived:     no ({reason:?})"),
    }
    println!("  cash box:     {:.2}", summary.cash_box);
    println!(
        "  active:       T={} P={} R={}",
        summary.active.traffickers, summary.active.packagers, summary.active.retailers
    );
    println!(
        "  arrested:     major {} / minor {}",
        summary.arrested_major.total(),
        summary.arrested_minor.total()
    );
    println!("  recruited:    {}", summary.recruited.total());

    if let Some(last) = summary.records.last() {
        println!();
        println!("=== NETWORK (tick {}) ===", last.tick);
        println!("  components:   {} (largest {})", last.stats.n_components, last.stats.max_component);
        println!("  degree cen.:  {:.4}", last.stats.cen_ndegree);
        println!("  between. cen: {:.4}", last.stats.cen_nbetweenness);
        println!("  avg path:     {:.3}", last.stats.average_path_length);
        println!("  stock:        {:.1}g", last.stock_drug);
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
