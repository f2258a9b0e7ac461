//! ladder-runner: headless runner for the pricing ladder laboratory.
//!
//! Usage:
//!   ladder-runner                                  # demo scenario KPIs
//!   ladder-runner --scenario plan.json --optimize --waterfall
//!   ladder-runner --import-csv plan.csv --save --db ladder.db
//!   ladder-runner --db ladder.db --get aB3xYz-9 --tornado --robustness
//!   ladder-runner --db ladder.db --slot A --label "q3 plan" --recents

use anyhow::Result;
use ladderlab_core::csv;
use ladderlab_core::leakage::pocket_price;
use ladderlab_core::optimizer::OptimizeOutcome;
use ladderlab_core::scenario::Scenario;
use ladderlab_core::sensitivity::{self, RobustnessReport, TornadoBar};
use ladderlab_core::snapshot::ScenarioSnapshot;
use ladderlab_core::store::ScenarioStore;
use ladderlab_core::types::Tier;
use std::env;
use std::fs;

const KNOWN_FLAGS: [&str; 15] = [
    "--db",
    "--get",
    "--import-csv",
    "--scenario",
    "--waterfall",
    "--optimize",
    "--coverage",
    "--tornado",
    "--robustness",
    "--export-csv",
    "--save",
    "--slot",
    "--label",
    "--recents",
    "--purge",
];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    for arg in args.iter().skip(1) {
        if arg.starts_with("--") && !KNOWN_FLAGS.contains(&arg.as_str()) {
            log::warn!("unknown flag: {arg}");
        }
    }
    let db = arg_value(&args, "--db").unwrap_or(":memory:");

    let store = ScenarioStore::open(db)?;
    store.migrate()?;

    let scenario = load_scenario(&args, &store)?;
    print_scenario(&scenario);
    print_kpis(&scenario)?;

    if has_flag(&args, "--waterfall") {
        print_waterfall(&scenario);
    }
    if has_flag(&args, "--optimize") {
        print_optimize(&scenario)?;
    }
    if has_flag(&args, "--coverage") {
        let report = scenario.coverage()?;
        println!();
        println!("=== POCKET COVERAGE ===");
        println!("  candidates:  {}", report.tested);
        println!("  feasible:    {:.1}%", report.coverage * 100.0);
    }
    if has_flag(&args, "--tornado") {
        let bars = sensitivity::tornado(&scenario, scenario.analysis.tornado_spread)?;
        print_tornado(&bars);
    }
    if has_flag(&args, "--robustness") {
        let report = sensitivity::robustness(&scenario)?;
        print_robustness(&report);
    }

    if let Some(path) = arg_value(&args, "--export-csv") {
        fs::write(path, csv::to_csv(&scenario)?)?;
        println!();
        println!("exported scenario to {path}");
    }
    if has_flag(&args, "--save") {
        let key = store.save_scenario(&scenario)?;
        println!();
        println!("share key: {key}");
    }
    if let Some(slot) = arg_value(&args, "--slot") {
        let label = arg_value(&args, "--label").unwrap_or("cli snapshot");
        let snapshot = ScenarioSnapshot::capture(label, &scenario)?;
        store.save_slot(slot, &snapshot)?;
        store.push_recent(&snapshot)?;
        println!();
        println!("saved snapshot '{label}' to slot {slot}");
    }
    if has_flag(&args, "--recents") {
        print_recents(&store)?;
    }
    if has_flag(&args, "--purge") {
        let removed = store.purge_expired()?;
        println!();
        println!("purged {removed} expired share links");
    }

    Ok(())
}

fn load_scenario(args: &[String], store: &ScenarioStore) -> Result<Scenario> {
    if let Some(key) = arg_value(args, "--get") {
        return Ok(store.get_scenario(key)?);
    }
    if let Some(path) = arg_value(args, "--import-csv") {
        let text = fs::read_to_string(path)?;
        return Ok(csv::from_csv(&text)?);
    }
    if let Some(path) = arg_value(args, "--scenario") {
        let text = fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&text)?;
        scenario.validate()?;
        return Ok(scenario);
    }
    Ok(Scenario::demo())
}

fn print_scenario(scenario: &Scenario) {
    println!("=== SCENARIO ===");
    println!("  population:  {:.0}", scenario.population);
    println!("  segments:    {}", scenario.segments.len());
    for tier in Tier::ALL {
        let list = scenario.prices.get(tier);
        let pocket = pocket_price(list, tier, &scenario.leak);
        println!(
            "  {:<9} list ${:>8.2} | pocket ${:>8.2} | cost ${:>7.2}",
            tier.name(),
            list,
            pocket,
            scenario.costs.get(tier)
        );
    }
}

fn print_kpis(scenario: &Scenario) -> Result<()> {
    let kpis = scenario.kpis()?;
    println!();
    println!("=== KPIS ===");
    println!(
        "  shares:      none {:.1}% | good {:.1}% | better {:.1}% | best {:.1}%",
        kpis.shares.none * 100.0,
        kpis.shares.good * 100.0,
        kpis.shares.better * 100.0,
        kpis.shares.best * 100.0
    );
    println!(
        "  buyers:      {} of {:.0} ({} good, {} better, {} best)",
        kpis.active,
        scenario.population,
        kpis.quantities.good,
        kpis.quantities.better,
        kpis.quantities.best
    );
    println!("  revenue:     ${:.2}", kpis.revenue);
    println!("  profit:      ${:.2}", kpis.profit);
    println!("  arpu:        ${:.2}", kpis.arpu_active);
    println!("  margin:      {:.1}%", kpis.gross_margin_pct);
    Ok(())
}

fn print_waterfall(scenario: &Scenario) {
    let columns: Vec<_> = Tier::ALL
        .iter()
        .map(|&tier| {
            sensitivity::waterfall_series(scenario.prices.get(tier), tier, &scenario.leak)
        })
        .collect();

    println!();
    println!("=== POCKET WATERFALL ===");
    println!(
        "  {:<14} {:>10} {:>10} {:>10}",
        "step", "good", "better", "best"
    );
    // All three series share the same step labels.
    for i in 0..columns[0].len() {
        println!(
            "  {:<14} {:>10.2} {:>10.2} {:>10.2}",
            columns[0][i].label, columns[0][i].value, columns[1][i].value, columns[2][i].value
        );
    }
}

fn print_optimize(scenario: &Scenario) -> Result<()> {
    let outcome = scenario.optimize()?;
    println!();
    println!("=== OPTIMIZER ===");
    match &outcome {
        OptimizeOutcome::Found(solution) => {
            println!(
                "  ladder:      good ${:.2} | better ${:.2} | best ${:.2}",
                solution.prices.good, solution.prices.better, solution.prices.best
            );
            println!("  profit:      ${:.2}", solution.profit);
        }
        OptimizeOutcome::Infeasible { .. } => {
            println!("  no candidate ladder satisfied the constraints");
        }
    }
    let diag = outcome.diagnostics();
    println!("  tested:      {}", diag.tested);
    println!(
        "  steps:       coarse {:.2}, refine {:.2}",
        diag.coarse_step, diag.refine_step
    );
    if diag.auto_coarsened {
        println!("  note:        step was widened to stay under the candidate cap");
    }
    println!(
        "  skipped:     {} gap, {} guardrail",
        diag.skipped_gap, diag.skipped_guardrail
    );
    Ok(())
}

fn print_tornado(bars: &[TornadoBar]) {
    println!();
    println!("=== TORNADO (pocket profit) ===");
    for bar in bars {
        println!(
            "  {:<16} low ${:>12.2} | high ${:>12.2} | swing ${:>12.2}",
            bar.driver,
            bar.low_profit,
            bar.high_profit,
            bar.swing()
        );
    }
}

fn print_recents(store: &ScenarioStore) -> Result<()> {
    let recents = store.recents(10)?;
    println!();
    println!("=== RECENT SNAPSHOTS ===");
    if recents.is_empty() {
        println!("  journal is empty");
    }
    for snap in &recents {
        println!(
            "  {}  {:<24} profit ${:.2}",
            snap.captured_at.format("%Y-%m-%d %H:%M"),
            snap.label,
            snap.kpis.profit
        );
    }
    Ok(())
}

fn print_robustness(report: &RobustnessReport) {
    println!();
    println!("=== ROBUSTNESS ===");
    println!("  draws:       {}", report.draws);
    println!("  profit p10:  ${:.2}", report.profit_p10);
    println!("  profit p50:  ${:.2}", report.profit_p50);
    println!("  profit p90:  ${:.2}", report.profit_p90);
    println!(
        "  guardrails:  hold in {:.1}% of draws",
        report.guardrail_hold_rate * 100.0
    );
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
