//! Discrete-choice demand model.
//!
//! Each customer segment weighs price against feature value through a
//! multinomial logit: linear utilities per option, softmax within the
//! segment, then a weight-normalized mixture across segments. The
//! walk-away option always carries utility zero, so raising every
//! price pushes probability mass toward walking away.

use crate::error::{LabError, LabResult};
use crate::types::{ChoiceShares, Features, Tier, TierValues};
use serde::{Deserialize, Serialize};

fn default_lambda() -> f64 {
    1.0
}

/// Price and feature sensitivities for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beta {
    /// Utility per currency unit of list price. Negative for any
    /// customer who dislikes paying.
    pub price: f64,
    #[serde(default)]
    pub feat_a: f64,
    #[serde(default)]
    pub feat_b: f64,
    /// Reference-price anchoring coefficient, applied to
    /// `price - ref_price`. Negative values penalize prices above the
    /// reference point. `None` turns anchoring off for the segment.
    #[serde(default)]
    pub ref_anchor: Option<f64>,
    /// Multiplier on the anchoring term when price sits above the
    /// reference point. 1.0 means gains and losses weigh the same;
    /// loss-averse segments carry values above 1.
    #[serde(default = "default_lambda")]
    pub lambda_loss: f64,
}

/// One customer segment: a label, a mixture weight and its betas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub label: String,
    pub weight: f64,
    pub beta: Beta,
}

fn utility(price: f64, feat_a: f64, feat_b: f64, ref_price: Option<f64>, beta: &Beta) -> f64 {
    let mut u = beta.price * price + beta.feat_a * feat_a + beta.feat_b * feat_b;

    if let (Some(alpha), Some(anchor)) = (beta.ref_anchor, ref_price) {
        let diff = price - anchor;
        let term = alpha * diff;
        // Prices above the reference hurt more than equal distances
        // below it help.
        u += if diff > 0.0 { term * beta.lambda_loss } else { term };
    }

    u
}

/// Softmax over [walk away, good, better, best] with the max utility
/// subtracted first, so large negative utilities cannot underflow the
/// denominator to zero.
fn segment_shares(
    prices: &TierValues,
    features: &Features,
    ref_prices: Option<&TierValues>,
    beta: &Beta,
) -> [f64; 4] {
    let mut u = [0.0f64; 4];
    for (i, &tier) in Tier::ALL.iter().enumerate() {
        u[i + 1] = utility(
            prices.get(tier),
            features.feat_a.get(tier),
            features.feat_b.get(tier),
            ref_prices.map(|r| r.get(tier)),
            beta,
        );
    }

    let max = u.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    let mut exp = [0.0f64; 4];
    let mut denom = 0.0;
    for i in 0..4 {
        exp[i] = (u[i] - max).exp();
        denom += exp[i];
    }

    [exp[0] / denom, exp[1] / denom, exp[2] / denom, exp[3] / denom]
}

/// Mixture choice shares across all segments at the given ladder.
///
/// Segment weights are normalized by their total; an all-zero weight
/// vector falls back to a uniform mixture so a scenario mid-edit still
/// produces live numbers. An empty segment list is rejected outright.
pub fn choice_shares(
    prices: &TierValues,
    features: &Features,
    segments: &[Segment],
    ref_prices: Option<&TierValues>,
) -> LabResult<ChoiceShares> {
    if segments.is_empty() {
        return Err(LabError::invalid("segments", "at least one segment is required"));
    }
    if !prices.is_finite() {
        return Err(LabError::invalid("prices", "all tier prices must be finite"));
    }
    for (tier, price) in prices.iter() {
        if price < 0.0 {
            return Err(LabError::invalid(
                format!("prices.{tier}"),
                format!("price must be non-negative, got {price}"),
            ));
        }
    }

    let mut total_weight = 0.0;
    for segment in segments {
        if !segment.weight.is_finite() || segment.weight < 0.0 {
            return Err(LabError::invalid(
                format!("segments.{}.weight", segment.label),
                format!("weight must be a non-negative number, got {}", segment.weight),
            ));
        }
        total_weight += segment.weight;
    }

    let uniform = 1.0 / segments.len() as f64;
    let mut mix = [0.0f64; 4];

    for segment in segments {
        let w = if total_weight > 0.0 { segment.weight / total_weight } else { uniform };
        let shares = segment_shares(prices, features, ref_prices, &segment.beta);
        for i in 0..4 {
            mix[i] += w * shares[i];
        }
    }

    Ok(ChoiceShares { none: mix[0], good: mix[1], better: mix[2], best: mix[3] })
}
