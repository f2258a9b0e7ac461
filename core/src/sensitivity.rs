//! What-if analyses layered on the deterministic engine.
//!
//! Tornado perturbs one leakage driver at a time and reports the
//! pocket-profit swing per driver, sorted widest first. Robustness
//! runs a seeded Monte Carlo over jittered leak rates and price
//! sensitivities and reports profit quantiles plus how often the
//! current ladder still clears its guardrails. Both always score
//! pocket profit: every driver they move lives between list and
//! pocket, so a list basis would show nothing.

use crate::choice::choice_shares;
use crate::error::{LabError, LabResult};
use crate::leakage::{compute_pocket_price, margin_on, pocket_price, Leakages};
use crate::scenario::Scenario;
use crate::types::Tier;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::Serialize;
use std::cmp::Ordering;

// ── Tornado ─────────────────────────────────────────────────────────

type DriverFn = fn(&mut Leakages, f64);

/// The perturbable leakage drivers, one tornado bar each.
const DRIVERS: [(&str, DriverFn); 10] = [
    ("promo.good", |l, f| l.promo.good *= f),
    ("promo.better", |l, f| l.promo.better *= f),
    ("promo.best", |l, f| l.promo.best *= f),
    ("volume.good", |l, f| l.volume.good *= f),
    ("volume.better", |l, f| l.volume.better *= f),
    ("volume.best", |l, f| l.volume.best *= f),
    ("payment_pct", |l, f| l.payment_pct *= f),
    ("payment_fixed", |l, f| l.payment_fixed *= f),
    ("fx_pct", |l, f| l.fx_pct *= f),
    ("refunds_pct", |l, f| l.refunds_pct *= f),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TornadoBar {
    pub driver: &'static str,
    /// Pocket profit with the driver scaled down by the spread.
    pub low_profit: f64,
    /// Pocket profit with the driver scaled up by the spread.
    pub high_profit: f64,
}

impl TornadoBar {
    pub fn swing(&self) -> f64 {
        (self.low_profit - self.high_profit).abs()
    }
}

fn clamp_rates(leak: &mut Leakages) {
    leak.promo = leak.promo.map(|v| v.min(1.0));
    leak.volume = leak.volume.map(|v| v.min(1.0));
    leak.payment_pct = leak.payment_pct.min(1.0);
    leak.fx_pct = leak.fx_pct.min(1.0);
    leak.refunds_pct = leak.refunds_pct.min(1.0);
}

fn pocket_profit(scenario: &Scenario, shares: &crate::types::ChoiceShares, leak: &Leakages) -> f64 {
    let mut profit = 0.0;
    for (tier, price) in scenario.prices.iter() {
        let pocket = pocket_price(price, tier, leak);
        profit += shares.get(tier) * scenario.population * (pocket - scenario.costs.get(tier));
    }
    profit
}

/// One-at-a-time tornado over the leakage drivers at the scenario's
/// current prices. Choice shares do not move (leaks are invisible to
/// customers), so they are computed once.
pub fn tornado(scenario: &Scenario, spread: f64) -> LabResult<Vec<TornadoBar>> {
    scenario.validate()?;
    if !spread.is_finite() || spread <= 0.0 || spread > 1.0 {
        return Err(LabError::invalid(
            "tornado_spread",
            format!("must be in (0, 1], got {spread}"),
        ));
    }

    let shares = scenario.shares()?;

    let mut bars = Vec::with_capacity(DRIVERS.len());
    for (driver, apply) in DRIVERS {
        let mut low = scenario.leak;
        apply(&mut low, 1.0 - spread);

        let mut high = scenario.leak;
        apply(&mut high, 1.0 + spread);
        clamp_rates(&mut high);

        bars.push(TornadoBar {
            driver,
            low_profit: pocket_profit(scenario, &shares, &low),
            high_profit: pocket_profit(scenario, &shares, &high),
        });
    }

    bars.sort_by(|a, b| b.swing().partial_cmp(&a.swing()).unwrap_or(Ordering::Equal));
    Ok(bars)
}

// ── Waterfall series ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: &'static str,
    pub value: f64,
}

/// Chart-ready waterfall for one tier: the list level, the six
/// deduction deltas, then the pocket level. The list row plus the
/// deltas always lands exactly on the pocket row.
pub fn waterfall_series(list: f64, tier: Tier, leak: &Leakages) -> Vec<SeriesPoint> {
    let breakdown = compute_pocket_price(list, tier, leak);
    let mut series = Vec::with_capacity(breakdown.steps.len() + 2);
    series.push(SeriesPoint { label: "List", value: list });
    for step in &breakdown.steps {
        series.push(SeriesPoint { label: step.label, value: step.delta });
    }
    series.push(SeriesPoint { label: "Pocket", value: breakdown.pocket });
    series
}

// ── Robustness ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RobustnessReport {
    pub draws: u32,
    pub profit_p10: f64,
    pub profit_p50: f64,
    pub profit_p90: f64,
    /// Fraction of draws where the current ladder still clears the
    /// margin floors and demand guardrails.
    pub guardrail_hold_rate: f64,
}

/// Uniform in [-1, 1) from the top 53 bits of the generator.
fn unit_jitter(rng: &mut Pcg64Mcg) -> f64 {
    let unit = (rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
    unit * 2.0 - 1.0
}

/// Seeded Monte Carlo around the current ladder. Each draw jitters
/// every leak rate and every segment's price sensitivity by up to
/// `analysis.robustness_jitter` (multiplicative), then re-scores
/// pocket profit and re-checks the guardrails at the current prices.
/// Same seed, same report.
pub fn robustness(scenario: &Scenario) -> LabResult<RobustnessReport> {
    scenario.validate()?;
    let settings = &scenario.analysis;
    let jitter = settings.robustness_jitter;
    let draws = settings.robustness_draws;
    let mut rng = Pcg64Mcg::seed_from_u64(settings.robustness_seed);

    let mut profits = Vec::with_capacity(draws as usize);
    let mut held = 0u64;

    for _ in 0..draws {
        // Fixed draw order keeps reports reproducible across builds:
        // leak fields first, then segment price betas in list order.
        let mut leak = scenario.leak;
        leak.promo.good = (leak.promo.good * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);
        leak.promo.better =
            (leak.promo.better * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);
        leak.promo.best = (leak.promo.best * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);
        leak.volume.good =
            (leak.volume.good * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);
        leak.volume.better =
            (leak.volume.better * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);
        leak.volume.best =
            (leak.volume.best * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);
        leak.payment_pct = (leak.payment_pct * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);
        leak.payment_fixed = (leak.payment_fixed * (1.0 + jitter * unit_jitter(&mut rng))).max(0.0);
        leak.fx_pct = (leak.fx_pct * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);
        leak.refunds_pct = (leak.refunds_pct * (1.0 + jitter * unit_jitter(&mut rng))).clamp(0.0, 1.0);

        let mut segments = scenario.segments.clone();
        for segment in &mut segments {
            segment.beta.price *= 1.0 + jitter * unit_jitter(&mut rng);
        }

        let shares = choice_shares(
            &scenario.prices,
            &scenario.features,
            &segments,
            scenario.ref_prices.as_ref(),
        )?;

        let mut profit = 0.0;
        let mut holds = true;
        for (tier, price) in scenario.prices.iter() {
            let pocket = pocket_price(price, tier, &leak);
            profit += shares.get(tier) * scenario.population * (pocket - scenario.costs.get(tier));

            let basis = if scenario.constraints.use_pocket_margins { pocket } else { price };
            if margin_on(basis, scenario.costs.get(tier))
                < scenario.constraints.margin_floor.get(tier)
            {
                holds = false;
            }
        }
        if let Some(cap) = scenario.constraints.max_none_share {
            if shares.none > cap {
                holds = false;
            }
        }
        if let Some(min_take) = scenario.constraints.min_take_rate {
            if shares.take_rate() < min_take {
                holds = false;
            }
        }

        if holds {
            held += 1;
        }
        profits.push(profit);
    }

    profits.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let pick = |q: f64| profits[((draws - 1) as f64 * q).round() as usize];

    let report = RobustnessReport {
        draws,
        profit_p10: pick(0.10),
        profit_p50: pick(0.50),
        profit_p90: pick(0.90),
        guardrail_hold_rate: held as f64 / draws as f64,
    };
    log::info!(
        "robustness: {} draws, profit p10={:.0} p50={:.0} p90={:.0}, guardrails hold {:.0}%",
        draws,
        report.profit_p10,
        report.profit_p50,
        report.profit_p90,
        report.guardrail_hold_rate * 100.0
    );
    Ok(report)
}
