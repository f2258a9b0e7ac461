//! Pocket-price leakage waterfall.
//!
//! A list price is reduced by six deductions in a fixed order:
//! promo -> volume -> payment % -> payment fixed -> FX -> refunds.
//! Percentage stages compound against the running amount, except
//! refunds, which is provisioned on the original list price. The
//! pocket price is whatever is left, negative included.

use crate::error::{LabError, LabResult};
use crate::types::{Tier, TierValues, PRICE_EPS};
use serde::{Deserialize, Serialize};

/// Revenue leakage rates between list and pocket. Promo and volume
/// discounts are per tier; the rest apply to every tier alike.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Leakages {
    #[serde(default)]
    pub promo: TierValues,
    #[serde(default)]
    pub volume: TierValues,
    #[serde(default)]
    pub payment_pct: f64,
    #[serde(default)]
    pub payment_fixed: f64,
    #[serde(default)]
    pub fx_pct: f64,
    #[serde(default)]
    pub refunds_pct: f64,
}

/// One deduction row of the waterfall. Deltas are signed and almost
/// always negative; a zero-rate stage still emits a row so chart and
/// CSV layouts stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeakStep {
    pub label: &'static str,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PocketBreakdown {
    pub pocket: f64,
    pub steps: Vec<LeakStep>,
}

/// Pocket price only, no step rows. Same stage order as
/// [`compute_pocket_price`]; the two are pinned together by test.
pub fn pocket_price(list: f64, tier: Tier, leak: &Leakages) -> f64 {
    let mut running = list;
    running -= running * leak.promo.get(tier);
    running -= running * leak.volume.get(tier);
    running -= running * leak.payment_pct;
    running -= leak.payment_fixed;
    running -= running * leak.fx_pct;
    running -= list * leak.refunds_pct;
    running
}

/// Full waterfall for one tier: the pocket price plus the ordered
/// deduction rows. A running amount driven negative is carried
/// through as-is; the caller decides what a negative pocket means.
pub fn compute_pocket_price(list: f64, tier: Tier, leak: &Leakages) -> PocketBreakdown {
    let mut steps = Vec::with_capacity(6);
    let mut running = list;

    let promo = running * leak.promo.get(tier);
    running -= promo;
    steps.push(LeakStep { label: "Promo", delta: -promo });

    let volume = running * leak.volume.get(tier);
    running -= volume;
    steps.push(LeakStep { label: "Volume", delta: -volume });

    let payment = running * leak.payment_pct;
    running -= payment;
    steps.push(LeakStep { label: "Payment %", delta: -payment });

    running -= leak.payment_fixed;
    steps.push(LeakStep { label: "Payment fixed", delta: -leak.payment_fixed });

    let fx = running * leak.fx_pct;
    running -= fx;
    steps.push(LeakStep { label: "FX", delta: -fx });

    // Refunds are charged on the original list price, not the running
    // amount.
    let refunds = list * leak.refunds_pct;
    running -= refunds;
    steps.push(LeakStep { label: "Refunds", delta: -refunds });

    PocketBreakdown { pocket: running, steps }
}

/// Margin fraction (price - cost) / price, with the denominator
/// clamped to [`PRICE_EPS`] so near-zero and negative prices produce
/// a decisively failing margin instead of a division blowup.
pub fn margin_on(price: f64, cost: f64) -> f64 {
    (price - cost) / price.max(PRICE_EPS)
}

// ── Presets ─────────────────────────────────────────────────────────

/// A named channel profile with typical leak rates.
#[derive(Debug, Clone, Copy)]
pub struct LeakPreset {
    pub name: &'static str,
    pub blurb: &'static str,
    pub leak: Leakages,
}

pub const LEAK_PRESETS: [LeakPreset; 4] = [
    LeakPreset {
        name: "direct",
        blurb: "Card-funded direct sales, modest promos",
        leak: Leakages {
            promo: TierValues { good: 0.05, better: 0.05, best: 0.10 },
            volume: TierValues { good: 0.0, better: 0.0, best: 0.0 },
            payment_pct: 0.029,
            payment_fixed: 0.30,
            fx_pct: 0.01,
            refunds_pct: 0.02,
        },
    },
    LeakPreset {
        name: "self_serve",
        blurb: "Low-touch online checkout, light discounting",
        leak: Leakages {
            promo: TierValues { good: 0.02, better: 0.03, best: 0.05 },
            volume: TierValues { good: 0.0, better: 0.0, best: 0.0 },
            payment_pct: 0.029,
            payment_fixed: 0.30,
            fx_pct: 0.005,
            refunds_pct: 0.015,
        },
    },
    LeakPreset {
        name: "reseller",
        blurb: "Channel sales, invoiced, deep volume tiers",
        leak: Leakages {
            promo: TierValues { good: 0.10, better: 0.12, best: 0.15 },
            volume: TierValues { good: 0.08, better: 0.10, best: 0.12 },
            payment_pct: 0.0,
            payment_fixed: 0.0,
            fx_pct: 0.02,
            refunds_pct: 0.01,
        },
    },
    LeakPreset {
        name: "enterprise",
        blurb: "Negotiated contracts, heavy discounting, few refunds",
        leak: Leakages {
            promo: TierValues { good: 0.15, better: 0.18, best: 0.20 },
            volume: TierValues { good: 0.05, better: 0.08, best: 0.10 },
            payment_pct: 0.0,
            payment_fixed: 0.0,
            fx_pct: 0.015,
            refunds_pct: 0.005,
        },
    },
];

pub fn find_preset(name: &str) -> Option<&'static LeakPreset> {
    LEAK_PRESETS.iter().find(|p| p.name == name)
}

/// One row of a preset blend: a preset name and a non-negative weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendRow {
    pub preset: String,
    pub weight: f64,
}

/// Weighted average of named presets, field by field. Weights are
/// normalized by their total, so `[(p, 2.0)]` and `[(p, 0.5)]` both
/// reproduce preset `p`.
pub fn blend_leak_presets(rows: &[BlendRow]) -> LabResult<Leakages> {
    if rows.is_empty() {
        return Err(LabError::invalid("blend", "at least one preset row is required"));
    }

    let mut total = 0.0;
    let mut acc = Leakages::default();

    for row in rows {
        if !row.weight.is_finite() || row.weight < 0.0 {
            return Err(LabError::invalid(
                format!("blend.{}", row.preset),
                format!("weight must be a non-negative number, got {}", row.weight),
            ));
        }
        let preset = find_preset(&row.preset)
            .ok_or_else(|| LabError::UnknownPreset { name: row.preset.clone() })?;

        let w = row.weight;
        acc.promo.good += preset.leak.promo.good * w;
        acc.promo.better += preset.leak.promo.better * w;
        acc.promo.best += preset.leak.promo.best * w;
        acc.volume.good += preset.leak.volume.good * w;
        acc.volume.better += preset.leak.volume.better * w;
        acc.volume.best += preset.leak.volume.best * w;
        acc.payment_pct += preset.leak.payment_pct * w;
        acc.payment_fixed += preset.leak.payment_fixed * w;
        acc.fx_pct += preset.leak.fx_pct * w;
        acc.refunds_pct += preset.leak.refunds_pct * w;
        total += w;
    }

    if total <= 0.0 {
        return Err(LabError::invalid("blend", "total weight must be positive"));
    }

    let blended = Leakages {
        promo: acc.promo.map(|v| v / total),
        volume: acc.volume.map(|v| v / total),
        payment_pct: acc.payment_pct / total,
        payment_fixed: acc.payment_fixed / total,
        fx_pct: acc.fx_pct / total,
        refunds_pct: acc.refunds_pct / total,
    };

    log::debug!(
        "blended {} preset rows: payment={:.3}% fx={:.3}% refunds={:.3}%",
        rows.len(),
        blended.payment_pct * 100.0,
        blended.fx_pct * 100.0,
        blended.refunds_pct * 100.0
    );

    Ok(blended)
}
