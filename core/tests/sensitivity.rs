use ladderlab_core::leakage::pocket_price;
use ladderlab_core::scenario::Scenario;
use ladderlab_core::sensitivity::{robustness, tornado, waterfall_series};
use ladderlab_core::types::Tier;

// ── Tornado ──────────────────────────────────────────────────────────────────

/// One bar per driver, widest swing first. The demo's direct-channel
/// leak has zero volume rebates, so the three volume bars sit at the
/// bottom with no swing at all.
#[test]
fn tornado_ranks_drivers_by_swing() {
    let bars = tornado(&Scenario::demo(), 0.2).unwrap();
    assert_eq!(bars.len(), 10);

    for pair in bars.windows(2) {
        assert!(
            pair[0].swing() >= pair[1].swing(),
            "{} ({}) sorted above {} ({})",
            pair[0].driver,
            pair[0].swing(),
            pair[1].driver,
            pair[1].swing()
        );
    }

    for bar in &bars[7..] {
        assert!(bar.driver.starts_with("volume."), "expected a volume bar, got {}", bar.driver);
        assert!(bar.swing() < 1e-9);
    }
}

/// Scaling a deduction up always costs pocket profit: every bar's
/// low side is at least its high side, strictly so for live drivers.
#[test]
fn more_leak_never_helps() {
    let bars = tornado(&Scenario::demo(), 0.2).unwrap();
    for bar in &bars {
        assert!(
            bar.low_profit >= bar.high_profit,
            "{}: low {} < high {}",
            bar.driver,
            bar.low_profit,
            bar.high_profit
        );
    }
    for bar in &bars[..7] {
        assert!(bar.low_profit > bar.high_profit, "{} should have a real swing", bar.driver);
    }
}

#[test]
fn tornado_rejects_bad_spreads() {
    let scenario = Scenario::demo();
    for spread in [0.0, -0.1, 1.5, f64::NAN] {
        let err = tornado(&scenario, spread).unwrap_err().to_string();
        assert!(err.contains("tornado_spread"), "spread {spread}: got {err}");
    }

    let mut broken = Scenario::demo();
    broken.population = 0.0;
    assert!(tornado(&broken, 0.2).is_err());
}

// ── Waterfall series ─────────────────────────────────────────────────────────

/// Eight points: the list level, six deduction deltas, the pocket
/// level. The deltas bridge list to pocket exactly.
#[test]
fn waterfall_series_bridges_list_to_pocket() {
    let leak = Scenario::demo().leak;
    let series = waterfall_series(99.0, Tier::Good, &leak);

    assert_eq!(series.len(), 8);
    assert_eq!(series[0].label, "List");
    assert_eq!(series[0].value, 99.0);
    assert_eq!(series[1].label, "Promo");
    assert_eq!(series[6].label, "Refunds");
    assert_eq!(series[7].label, "Pocket");
    assert_eq!(series[7].value, pocket_price(99.0, Tier::Good, &leak));

    let bridged: f64 = series[0].value + series[1..7].iter().map(|p| p.value).sum::<f64>();
    assert!((bridged - series[7].value).abs() < 1e-9);
}

// ── Robustness ───────────────────────────────────────────────────────────────

/// Same seed, same report, down to the last bit.
#[test]
fn robustness_is_seed_deterministic() {
    let mut scenario = Scenario::demo();
    scenario.analysis.robustness_draws = 200;

    let first = robustness(&scenario).unwrap();
    let second = robustness(&scenario).unwrap();
    assert_eq!(first, second);

    assert_eq!(first.draws, 200);
    assert!(first.profit_p10 <= first.profit_p50);
    assert!(first.profit_p50 <= first.profit_p90);
    assert!((0.0..=1.0).contains(&first.guardrail_hold_rate));
}

#[test]
fn different_seed_moves_the_quantiles() {
    let mut scenario = Scenario::demo();
    scenario.analysis.robustness_draws = 200;
    scenario.analysis.robustness_seed = 1;
    let a = robustness(&scenario).unwrap();

    scenario.analysis.robustness_seed = 2;
    let b = robustness(&scenario).unwrap();
    assert_ne!(a.profit_p50, b.profit_p50);
}

/// With the jitter at zero every draw scores the same ladder, so the
/// quantiles collapse onto the deterministic pocket profit and the
/// demo's guardrails hold in every draw.
#[test]
fn zero_jitter_collapses_the_quantiles() {
    let mut scenario = Scenario::demo();
    scenario.analysis.robustness_jitter = 0.0;
    scenario.analysis.robustness_draws = 50;

    let report = robustness(&scenario).unwrap();
    assert_eq!(report.profit_p10, report.profit_p50);
    assert_eq!(report.profit_p50, report.profit_p90);
    assert_eq!(report.guardrail_hold_rate, 1.0);

    let shares = scenario.shares().unwrap();
    let mut expected = 0.0;
    for (tier, price) in scenario.prices.iter() {
        let pocket = pocket_price(price, tier, &scenario.leak);
        expected += shares.get(tier) * scenario.population * (pocket - scenario.costs.get(tier));
    }
    assert!((report.profit_p50 - expected).abs() < 1e-9);
}

#[test]
fn robustness_rejects_zero_draws() {
    let mut scenario = Scenario::demo();
    scenario.analysis.robustness_draws = 0;
    let err = robustness(&scenario).unwrap_err().to_string();
    assert!(err.contains("robustness_draws"), "got: {err}");
}
