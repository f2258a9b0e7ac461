//! Feasible-region mapping over the search box.
//!
//! `pocket_coverage` answers "how much of the box survives the
//! guardrails at all" as a single fraction, enumerated at full
//! resolution with no auto-coarsening. `feasibility_slice_gb`
//! projects the box onto the (good, better) plane for heatmap
//! rendering, pinning best per better tick to the smallest value
//! that clears the Better->Best gap. The slice is a projection, not
//! the full 3D truth; only `pocket_coverage` sweeps all three axes.

use crate::error::{LabError, LabResult};
use crate::leakage::{margin_on, pocket_price, Leakages};
use crate::optimizer::{
    tick_count, validate_costs, validate_floors, validate_gaps, validate_search_ranges, Axis,
    SearchRanges, GAP_EPS,
};
use crate::types::TierValues;
use serde::Serialize;

/// Full-resolution enumeration cap. Coverage never coarsens, so a box
/// bigger than this is rejected as invalid input instead.
pub const MAX_COVERAGE_CANDIDATES: u64 = 2_000_000;

/// Cell cap for the (good, better) slice.
pub const MAX_SLICE_CELLS: u64 = 250_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageReport {
    /// Fraction of the box passing gaps and pocket margin floors.
    pub coverage: f64,
    pub tested: u64,
}

/// One heatmap cell of the (good, better) slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeasCell {
    pub good: f64,
    pub better: f64,
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasSlice {
    pub g_ticks: Vec<f64>,
    pub b_ticks: Vec<f64>,
    /// The pinned best price per better tick:
    /// `clamp(better + gap_bb, best.min, best.max)`.
    pub best_used: Vec<f64>,
    /// Row-major over `g_ticks` x `b_ticks`.
    pub cells: Vec<FeasCell>,
}

fn pocket_margins_ok(
    prices: &TierValues,
    costs: &TierValues,
    floors: &TierValues,
    leak: &Leakages,
) -> bool {
    for (tier, price) in prices.iter() {
        let pocket = pocket_price(price, tier, leak);
        if margin_on(pocket, costs.get(tier)) < floors.get(tier) {
            return false;
        }
    }
    true
}

/// Fraction of the full-resolution search box that passes the ladder
/// gaps and the pocket-basis margin floors. Demand plays no part
/// here; this is a pure pricing-feasibility measure.
pub fn pocket_coverage(
    ranges: &SearchRanges,
    costs: &TierValues,
    floors: &TierValues,
    gap_gb: f64,
    gap_bb: f64,
    leak: &Leakages,
) -> LabResult<CoverageReport> {
    validate_search_ranges(ranges)?;
    validate_costs(costs)?;
    validate_floors(floors)?;
    validate_gaps(gap_gb, gap_bb)?;

    let g_count = tick_count(ranges.good.min, ranges.good.max, ranges.step);
    let b_count = tick_count(ranges.better.min, ranges.better.max, ranges.step);
    let s_count = tick_count(ranges.best.min, ranges.best.max, ranges.step);
    let total = g_count as u128 * b_count as u128 * s_count as u128;
    if total > MAX_COVERAGE_CANDIDATES as u128 {
        return Err(LabError::invalid(
            "ranges",
            format!("coverage box has {total} candidates, cap is {MAX_COVERAGE_CANDIDATES}"),
        ));
    }

    let g_axis = Axis::new(ranges.good.min, ranges.good.max, ranges.step);
    let b_axis = Axis::new(ranges.better.min, ranges.better.max, ranges.step);
    let s_axis = Axis::new(ranges.best.min, ranges.best.max, ranges.step);

    let mut tested = 0u64;
    let mut feasible = 0u64;
    for gi in 0..g_axis.count() {
        let good = g_axis.tick(gi);
        for bi in 0..b_axis.count() {
            let better = b_axis.tick(bi);
            for si in 0..s_axis.count() {
                tested += 1;
                let best = s_axis.tick(si);

                if better - good < gap_gb - GAP_EPS || best - better < gap_bb - GAP_EPS {
                    continue;
                }
                if pocket_margins_ok(&TierValues::new(good, better, best), costs, floors, leak) {
                    feasible += 1;
                }
            }
        }
    }

    let coverage = feasible as f64 / tested as f64;
    log::debug!("coverage: {feasible}/{tested} candidates feasible ({:.1}%)", coverage * 100.0);

    Ok(CoverageReport { coverage, tested })
}

/// The (good, better) feasibility heatmap. Best is pinned per better
/// tick to the smallest value clearing the Better->Best gap, clamped
/// into the Best range; at the top of the range the clamp pulls the
/// pin below the gap and the cell honestly reads infeasible.
pub fn feasibility_slice_gb(
    ranges: &SearchRanges,
    costs: &TierValues,
    floors: &TierValues,
    gap_gb: f64,
    gap_bb: f64,
    leak: &Leakages,
) -> LabResult<FeasSlice> {
    validate_search_ranges(ranges)?;
    validate_costs(costs)?;
    validate_floors(floors)?;
    validate_gaps(gap_gb, gap_bb)?;

    let g_count = tick_count(ranges.good.min, ranges.good.max, ranges.step);
    let b_count = tick_count(ranges.better.min, ranges.better.max, ranges.step);
    if g_count as u128 * b_count as u128 > MAX_SLICE_CELLS as u128 {
        return Err(LabError::invalid(
            "ranges",
            format!("slice has {} cells, cap is {MAX_SLICE_CELLS}", g_count as u128 * b_count as u128),
        ));
    }

    let g_axis = Axis::new(ranges.good.min, ranges.good.max, ranges.step);
    let b_axis = Axis::new(ranges.better.min, ranges.better.max, ranges.step);

    let g_ticks: Vec<f64> = (0..g_axis.count()).map(|i| g_axis.tick(i)).collect();
    let b_ticks: Vec<f64> = (0..b_axis.count()).map(|i| b_axis.tick(i)).collect();
    let best_used: Vec<f64> = b_ticks
        .iter()
        .map(|&better| (better + gap_bb).clamp(ranges.best.min, ranges.best.max))
        .collect();

    let mut cells = Vec::with_capacity(g_ticks.len() * b_ticks.len());
    for &good in &g_ticks {
        for (bi, &better) in b_ticks.iter().enumerate() {
            let best = best_used[bi];
            let gaps_ok = better - good >= gap_gb - GAP_EPS && best - better >= gap_bb - GAP_EPS;
            let ok = gaps_ok
                && pocket_margins_ok(&TierValues::new(good, better, best), costs, floors, leak);
            cells.push(FeasCell { good, better, ok });
        }
    }

    Ok(FeasSlice { g_ticks, b_ticks, best_used, cells })
}
