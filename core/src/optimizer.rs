//! Two-phase constrained grid search for the profit-maximizing ladder.
//!
//! Pass one sweeps the full (good, better, best) box at the coarse
//! step, doubling the step while the candidate count sits above
//! [`MAX_COARSE_CANDIDATES`]. Pass two re-sweeps a one-coarse-step
//! neighborhood around the pass-one winner at a fifth of that step.
//! Ladder-gap checks run before any pricing math; on a realistic box
//! most candidates die on those two comparisons alone.
//!
//! An empty feasible set is a normal outcome, not an error: the
//! caller gets [`OptimizeOutcome::Infeasible`] with full diagnostics.

use crate::choice::{choice_shares, Segment};
use crate::error::{LabError, LabResult};
use crate::leakage::{margin_on, pocket_price, Leakages};
use crate::types::{Features, Tier, TierValues};
use serde::{Deserialize, Serialize};

/// Coarse-pass candidate ceiling. Above it the step doubles until the
/// box fits.
pub const MAX_COARSE_CANDIDATES: u64 = 60_000;

/// The refinement pass sweeps at coarse step divided by this.
const REFINE_DIVISOR: f64 = 5.0;

/// Slack for float dust when comparing price distances against gaps.
pub(crate) const GAP_EPS: f64 = 1e-9;

/// Inclusive price interval for one tier's search axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

/// The search box: one range per tier plus the grid step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchRanges {
    pub good: PriceRange,
    pub better: PriceRange,
    pub best: PriceRange,
    pub step: f64,
}

impl SearchRanges {
    pub fn range(&self, tier: Tier) -> PriceRange {
        match tier {
            Tier::Good => self.good,
            Tier::Better => self.better,
            Tier::Best => self.best,
        }
    }
}

impl Default for SearchRanges {
    fn default() -> Self {
        Self {
            good: PriceRange { min: 29.0, max: 79.0 },
            better: PriceRange { min: 59.0, max: 149.0 },
            best: PriceRange { min: 119.0, max: 259.0 },
            step: 5.0,
        }
    }
}

/// Everything a candidate ladder must satisfy to be considered.
/// The all-zero default constrains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Constraints {
    /// Minimum price distance from Good up to Better.
    #[serde(default)]
    pub gap_gb: f64,
    /// Minimum price distance from Better up to Best.
    #[serde(default)]
    pub gap_bb: f64,
    /// Per-tier minimum margin fraction on the margin basis.
    #[serde(default)]
    pub margin_floor: TierValues,
    /// Snap candidates to .99 endings before evaluation.
    #[serde(default)]
    pub charm: bool,
    /// Score profit on pocket prices instead of list.
    #[serde(default)]
    pub use_pocket_profit: bool,
    /// Check margin floors on pocket prices instead of list.
    #[serde(default)]
    pub use_pocket_margins: bool,
    /// Reject ladders whose walk-away share exceeds this.
    #[serde(default)]
    pub max_none_share: Option<f64>,
    /// Reject ladders converting less than this fraction overall.
    #[serde(default)]
    pub min_take_rate: Option<f64>,
}

/// Counters and step sizes from one optimize call. `tested` counts
/// every candidate enumerated across both passes, skipped ones
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridDiagnostics {
    pub tested:            u64,
    pub coarse_step:       f64,
    pub refine_step:       f64,
    pub auto_coarsened:    bool,
    pub skipped_gap:       u64,
    pub skipped_guardrail: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LadderSolution {
    pub prices: TierValues,
    pub profit: f64,
    pub diagnostics: GridDiagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OptimizeOutcome {
    Found(LadderSolution),
    Infeasible { diagnostics: GridDiagnostics },
}

impl OptimizeOutcome {
    pub fn diagnostics(&self) -> &GridDiagnostics {
        match self {
            OptimizeOutcome::Found(solution) => &solution.diagnostics,
            OptimizeOutcome::Infeasible { diagnostics } => diagnostics,
        }
    }

    pub fn solution(&self) -> Option<&LadderSolution> {
        match self {
            OptimizeOutcome::Found(solution) => Some(solution),
            OptimizeOutcome::Infeasible { .. } => None,
        }
    }
}

/// Snap to the nearest .99 ending, never below 0.99.
pub fn snap_charm(price: f64) -> f64 {
    let snapped = (price - 0.99).round() + 0.99;
    if snapped < 0.99 {
        0.99
    } else {
        snapped
    }
}

// ── Grid axes ───────────────────────────────────────────────────────

/// One enumerable price axis. Ticks are `lo + i * step` so long
/// sweeps do not accumulate addition error.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Axis {
    lo: f64,
    step: f64,
    count: u64,
}

impl Axis {
    pub(crate) fn new(min: f64, max: f64, step: f64) -> Self {
        Self { lo: min, step, count: tick_count(min, max, step) }
    }

    pub(crate) fn tick(&self, i: u64) -> f64 {
        self.lo + i as f64 * self.step
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

pub(crate) fn tick_count(min: f64, max: f64, step: f64) -> u64 {
    ((max - min) / step + GAP_EPS).floor() as u64 + 1
}

fn box_candidates(ranges: &SearchRanges, step: f64) -> u128 {
    let g = tick_count(ranges.good.min, ranges.good.max, step) as u128;
    let b = tick_count(ranges.better.min, ranges.better.max, step) as u128;
    let s = tick_count(ranges.best.min, ranges.best.max, step) as u128;
    g * b * s
}

// ── Validation ──────────────────────────────────────────────────────

pub(crate) fn validate_search_ranges(ranges: &SearchRanges) -> LabResult<()> {
    for tier in Tier::ALL {
        let range = ranges.range(tier);
        if !range.min.is_finite() || !range.max.is_finite() {
            return Err(LabError::invalid(format!("ranges.{tier}"), "bounds must be finite"));
        }
        if range.min < 0.0 {
            return Err(LabError::invalid(
                format!("ranges.{tier}.min"),
                format!("must be non-negative, got {}", range.min),
            ));
        }
        if range.min > range.max {
            return Err(LabError::invalid(
                format!("ranges.{tier}"),
                format!("min {} exceeds max {}", range.min, range.max),
            ));
        }
    }
    if !ranges.step.is_finite() || ranges.step <= 0.0 {
        return Err(LabError::invalid(
            "ranges.step",
            format!("step must be positive, got {}", ranges.step),
        ));
    }
    Ok(())
}

pub(crate) fn validate_costs(costs: &TierValues) -> LabResult<()> {
    for (tier, cost) in costs.iter() {
        if !cost.is_finite() || cost < 0.0 {
            return Err(LabError::invalid(
                format!("costs.{tier}"),
                format!("cost must be a non-negative number, got {cost}"),
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_floors(floors: &TierValues) -> LabResult<()> {
    for (tier, floor) in floors.iter() {
        if !floor.is_finite() || !(0.0..1.0).contains(&floor) {
            return Err(LabError::invalid(
                format!("margin_floor.{tier}"),
                format!("floor must be a fraction in [0, 1), got {floor}"),
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_gaps(gap_gb: f64, gap_bb: f64) -> LabResult<()> {
    if !gap_gb.is_finite() || gap_gb < 0.0 {
        return Err(LabError::invalid("gap_gb", format!("must be non-negative, got {gap_gb}")));
    }
    if !gap_bb.is_finite() || gap_bb < 0.0 {
        return Err(LabError::invalid("gap_bb", format!("must be non-negative, got {gap_bb}")));
    }
    Ok(())
}

fn validate_inputs(
    costs: &TierValues,
    ranges: &SearchRanges,
    constraints: &Constraints,
    segments: &[Segment],
    population: f64,
) -> LabResult<()> {
    validate_search_ranges(ranges)?;
    validate_costs(costs)?;
    validate_floors(&constraints.margin_floor)?;
    validate_gaps(constraints.gap_gb, constraints.gap_bb)?;

    if let Some(cap) = constraints.max_none_share {
        if !cap.is_finite() || !(0.0..=1.0).contains(&cap) {
            return Err(LabError::invalid(
                "max_none_share",
                format!("must be a fraction in [0, 1], got {cap}"),
            ));
        }
    }
    if let Some(floor) = constraints.min_take_rate {
        if !floor.is_finite() || !(0.0..=1.0).contains(&floor) {
            return Err(LabError::invalid(
                "min_take_rate",
                format!("must be a fraction in [0, 1], got {floor}"),
            ));
        }
    }
    if segments.is_empty() {
        return Err(LabError::invalid("segments", "at least one segment is required"));
    }
    if !population.is_finite() || population <= 0.0 {
        return Err(LabError::invalid(
            "population",
            format!("population must be a positive number, got {population}"),
        ));
    }
    Ok(())
}

// ── Sweep ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SweepBest {
    prices: TierValues,
    profit: f64,
}

#[allow(clippy::too_many_arguments)]
fn sweep(
    axes: &[Axis; 3],
    costs: &TierValues,
    constraints: &Constraints,
    leak: &Leakages,
    segments: &[Segment],
    features: &Features,
    ref_prices: Option<&TierValues>,
    population: f64,
    diag: &mut GridDiagnostics,
) -> LabResult<Option<SweepBest>> {
    let mut best: Option<SweepBest> = None;

    for gi in 0..axes[0].count() {
        let good = axes[0].tick(gi);
        for bi in 0..axes[1].count() {
            let better = axes[1].tick(bi);
            for si in 0..axes[2].count() {
                diag.tested += 1;

                let mut prices = TierValues::new(good, better, axes[2].tick(si));
                if constraints.charm {
                    prices = prices.map(snap_charm);
                }

                // Gap checks first; everything below is per-candidate
                // pricing math.
                if prices.better - prices.good < constraints.gap_gb - GAP_EPS
                    || prices.best - prices.better < constraints.gap_bb - GAP_EPS
                {
                    diag.skipped_gap += 1;
                    continue;
                }

                let mut under_floor = false;
                for (tier, price) in prices.iter() {
                    let basis = if constraints.use_pocket_margins {
                        pocket_price(price, tier, leak)
                    } else {
                        price
                    };
                    if margin_on(basis, costs.get(tier)) < constraints.margin_floor.get(tier) {
                        under_floor = true;
                        break;
                    }
                }
                if under_floor {
                    diag.skipped_guardrail += 1;
                    continue;
                }

                let shares = choice_shares(&prices, features, segments, ref_prices)?;
                if let Some(cap) = constraints.max_none_share {
                    if shares.none > cap {
                        diag.skipped_guardrail += 1;
                        continue;
                    }
                }
                if let Some(min_take) = constraints.min_take_rate {
                    if shares.take_rate() < min_take {
                        diag.skipped_guardrail += 1;
                        continue;
                    }
                }

                let mut profit = 0.0;
                for (tier, price) in prices.iter() {
                    let effective = if constraints.use_pocket_profit {
                        pocket_price(price, tier, leak)
                    } else {
                        price
                    };
                    profit += shares.get(tier) * population * (effective - costs.get(tier));
                }

                if best.map_or(true, |b| profit > b.profit) {
                    best = Some(SweepBest { prices, profit });
                }
            }
        }
    }

    Ok(best)
}

fn refine_axis(range: PriceRange, center: f64, span: f64, step: f64) -> Axis {
    // Charm snapping can carry a winner slightly past the box edge;
    // pull the center back in before building the neighborhood.
    let center = center.clamp(range.min, range.max);
    let lo = (center - span).max(range.min);
    let hi = (center + span).min(range.max);
    Axis::new(lo, hi, step)
}

/// Search the box for the feasible ladder with the highest expected
/// profit (`share * population * (price - cost)` summed over tiers,
/// on the configured price basis).
#[allow(clippy::too_many_arguments)]
pub fn optimize(
    costs: &TierValues,
    ranges: &SearchRanges,
    constraints: &Constraints,
    leak: &Leakages,
    segments: &[Segment],
    features: &Features,
    ref_prices: Option<&TierValues>,
    population: f64,
) -> LabResult<OptimizeOutcome> {
    validate_inputs(costs, ranges, constraints, segments, population)?;

    let mut coarse_step = ranges.step;
    let mut auto_coarsened = false;
    while box_candidates(ranges, coarse_step) > MAX_COARSE_CANDIDATES as u128 {
        coarse_step *= 2.0;
        auto_coarsened = true;
    }

    let coarse_axes = [
        Axis::new(ranges.good.min, ranges.good.max, coarse_step),
        Axis::new(ranges.better.min, ranges.better.max, coarse_step),
        Axis::new(ranges.best.min, ranges.best.max, coarse_step),
    ];
    log::info!(
        "grid search: {} coarse candidates at step {:.2}{}",
        coarse_axes[0].count() * coarse_axes[1].count() * coarse_axes[2].count(),
        coarse_step,
        if auto_coarsened { " (auto-coarsened)" } else { "" }
    );

    let mut diag = GridDiagnostics {
        coarse_step,
        auto_coarsened,
        ..GridDiagnostics::default()
    };

    let coarse_best = sweep(
        &coarse_axes,
        costs,
        constraints,
        leak,
        segments,
        features,
        ref_prices,
        population,
        &mut diag,
    )?;

    let Some(winner) = coarse_best else {
        log::warn!(
            "grid search: no feasible ladder in {} candidates ({} gap-skipped, {} guardrail-skipped)",
            diag.tested,
            diag.skipped_gap,
            diag.skipped_guardrail
        );
        return Ok(OptimizeOutcome::Infeasible { diagnostics: diag });
    };

    let refine_step = coarse_step / REFINE_DIVISOR;
    diag.refine_step = refine_step;
    let refine_axes = [
        refine_axis(ranges.good, winner.prices.good, coarse_step, refine_step),
        refine_axis(ranges.better, winner.prices.better, coarse_step, refine_step),
        refine_axis(ranges.best, winner.prices.best, coarse_step, refine_step),
    ];

    let refined = sweep(
        &refine_axes,
        costs,
        constraints,
        leak,
        segments,
        features,
        ref_prices,
        population,
        &mut diag,
    )?;

    // The refinement box contains the coarse winner's neighborhood,
    // so a feasible refined best exists; keep the coarse winner on a
    // tie.
    let final_best = match refined {
        Some(candidate) if candidate.profit > winner.profit => candidate,
        _ => winner,
    };

    log::info!(
        "grid search: best {:.2}/{:.2}/{:.2} profit {:.0} ({} tested, {} gap-skipped, {} guardrail-skipped)",
        final_best.prices.good,
        final_best.prices.better,
        final_best.prices.best,
        final_best.profit,
        diag.tested,
        diag.skipped_gap,
        diag.skipped_guardrail
    );

    Ok(OptimizeOutcome::Found(LadderSolution {
        prices: final_best.prices,
        profit: final_best.profit,
        diagnostics: diag,
    }))
}
