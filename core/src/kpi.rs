//! Scoreboard KPIs for one priced ladder.
//!
//! Shares come from the choice model; quantities are rounded heads
//! per tier (independently, so the rounded total and the rounded
//! tier sum can disagree by a head or two). Revenue and profit use
//! the rounded quantities so the scoreboard is internally consistent
//! with what it displays.

use crate::choice::{choice_shares, Segment};
use crate::error::{LabError, LabResult};
use crate::leakage::{margin_on, pocket_price, Leakages};
use crate::types::{ChoiceShares, Features, Tier, TierValues};
use serde::{Deserialize, Serialize};

/// Rounded customer counts per paid tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierQuantities {
    pub good: u64,
    pub better: u64,
    pub best: u64,
}

impl TierQuantities {
    pub fn get(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Good => self.good,
            Tier::Better => self.better,
            Tier::Best => self.best,
        }
    }

    pub fn total(&self) -> u64 {
        self.good + self.better + self.best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotKpis {
    pub shares: ChoiceShares,
    pub quantities: TierQuantities,
    /// Heads on any paid tier.
    pub active: u64,
    pub revenue: f64,
    pub profit: f64,
    /// Revenue per active customer.
    pub arpu_active: f64,
    /// Quantity-weighted gross margin, in percent.
    pub gross_margin_pct: f64,
}

fn basis_prices(prices: &TierValues, leak: &Leakages, pocket: bool) -> TierValues {
    if pocket {
        TierValues {
            good: pocket_price(prices.good, Tier::Good, leak),
            better: pocket_price(prices.better, Tier::Better, leak),
            best: pocket_price(prices.best, Tier::Best, leak),
        }
    } else {
        *prices
    }
}

/// Compute the full scoreboard for one ladder.
///
/// `use_pocket_profit` selects the price basis for revenue and
/// profit; `use_pocket_margins` independently selects the basis for
/// the blended margin. Both default to list in a fresh scenario.
#[allow(clippy::too_many_arguments)]
pub fn compute_kpis(
    prices: &TierValues,
    costs: &TierValues,
    features: &Features,
    segments: &[Segment],
    ref_prices: Option<&TierValues>,
    leak: &Leakages,
    population: f64,
    use_pocket_profit: bool,
    use_pocket_margins: bool,
) -> LabResult<SnapshotKpis> {
    if !population.is_finite() || population <= 0.0 {
        return Err(LabError::invalid(
            "population",
            format!("population must be a positive number, got {population}"),
        ));
    }
    if !costs.is_finite() {
        return Err(LabError::invalid("costs", "all tier costs must be finite"));
    }
    for (tier, cost) in costs.iter() {
        if cost < 0.0 {
            return Err(LabError::invalid(
                format!("costs.{tier}"),
                format!("cost must be non-negative, got {cost}"),
            ));
        }
    }

    let shares = choice_shares(prices, features, segments, ref_prices)?;

    let quantities = TierQuantities {
        good: (shares.good * population).round() as u64,
        better: (shares.better * population).round() as u64,
        best: (shares.best * population).round() as u64,
    };
    let active = quantities.total();

    let revenue_basis = basis_prices(prices, leak, use_pocket_profit);
    let margin_basis = basis_prices(prices, leak, use_pocket_margins);

    let mut revenue = 0.0;
    let mut profit = 0.0;
    let mut margin_weighted = 0.0;
    for tier in Tier::ALL {
        let qty = quantities.get(tier) as f64;
        revenue += qty * revenue_basis.get(tier);
        profit += qty * (revenue_basis.get(tier) - costs.get(tier));
        margin_weighted += qty * margin_on(margin_basis.get(tier), costs.get(tier));
    }

    let active_f = (active.max(1)) as f64;
    let arpu_active = revenue / active_f;
    let gross_margin_pct = (margin_weighted / active_f) * 100.0;

    log::debug!(
        "kpis: active={active} revenue={revenue:.2} profit={profit:.2} arpu={arpu_active:.2} margin={gross_margin_pct:.1}%"
    );

    Ok(SnapshotKpis {
        shares,
        quantities,
        active,
        revenue,
        profit,
        arpu_active,
        gross_margin_pct,
    })
}
