//! The scenario bundle: everything the sandbox needs to price a
//! ladder, in one serde struct.
//!
//! Scenarios round-trip through JSON for share links and through the
//! sectioned CSV in `csv.rs`. Unknown JSON fields are carried in a
//! flattened map and re-emitted on save, so payloads written by a
//! newer build survive a round-trip through an older one.

use crate::choice::{choice_shares, Beta, Segment};
use crate::coverage::{feasibility_slice_gb, pocket_coverage, CoverageReport, FeasSlice};
use crate::error::{LabError, LabResult};
use crate::kpi::{compute_kpis, SnapshotKpis};
use crate::leakage::{find_preset, Leakages};
use crate::optimizer::{
    optimize, validate_costs, validate_floors, validate_gaps, validate_search_ranges,
    Constraints, OptimizeOutcome, PriceRange, SearchRanges,
};
use crate::types::{ChoiceShares, Features, Tier, TierValues};
use serde::{Deserialize, Serialize};

fn default_spread() -> f64 {
    0.20
}
fn default_draws() -> u32 {
    500
}
fn default_jitter() -> f64 {
    0.15
}
fn default_seed() -> u64 {
    42
}
fn default_population() -> f64 {
    1000.0
}

/// Knobs for the sensitivity analyses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// One-at-a-time tornado perturbation, as a fraction of each
    /// driver's current value.
    #[serde(default = "default_spread")]
    pub tornado_spread: f64,
    #[serde(default = "default_draws")]
    pub robustness_draws: u32,
    /// Multiplicative jitter half-width for robustness draws.
    #[serde(default = "default_jitter")]
    pub robustness_jitter: f64,
    #[serde(default = "default_seed")]
    pub robustness_seed: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            tornado_spread: default_spread(),
            robustness_draws: default_draws(),
            robustness_jitter: default_jitter(),
            robustness_seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub prices: TierValues,
    pub costs: TierValues,
    #[serde(default)]
    pub features: Features,
    /// Customer reference points per tier. `None` disables anchoring
    /// for every segment regardless of their coefficients.
    #[serde(default)]
    pub ref_prices: Option<TierValues>,
    #[serde(default)]
    pub leak: Leakages,
    pub segments: Vec<Segment>,
    #[serde(default = "default_population")]
    pub population: f64,
    #[serde(default)]
    pub ranges: SearchRanges,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    /// Fields this build does not know about, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Validation helpers ──────────────────────────────────────────────

fn ensure_finite(field: &str, value: f64) -> LabResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LabError::invalid(field, format!("must be a finite number, got {value}")))
    }
}

fn ensure_non_negative(field: &str, value: f64) -> LabResult<()> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(LabError::invalid(field, format!("must be non-negative, got {value}")));
    }
    Ok(())
}

fn ensure_fraction(field: &str, value: f64) -> LabResult<()> {
    ensure_finite(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(LabError::invalid(field, format!("must be a fraction in [0, 1], got {value}")));
    }
    Ok(())
}

fn ensure_tier_non_negative(field: &str, values: &TierValues) -> LabResult<()> {
    for (tier, value) in values.iter() {
        ensure_non_negative(&format!("{field}.{tier}"), value)?;
    }
    Ok(())
}

fn ensure_tier_fraction(field: &str, values: &TierValues) -> LabResult<()> {
    for (tier, value) in values.iter() {
        ensure_fraction(&format!("{field}.{tier}"), value)?;
    }
    Ok(())
}

impl Scenario {
    /// Fail-fast structural validation. Ran at every persistence
    /// boundary (share-link save and load, CSV import) and available
    /// to callers holding a hand-built scenario.
    pub fn validate(&self) -> LabResult<()> {
        ensure_tier_non_negative("prices", &self.prices)?;
        validate_costs(&self.costs)?;

        for tier in Tier::ALL {
            ensure_finite(&format!("features.feat_a.{tier}"), self.features.feat_a.get(tier))?;
            ensure_finite(&format!("features.feat_b.{tier}"), self.features.feat_b.get(tier))?;
        }
        if let Some(refs) = &self.ref_prices {
            ensure_tier_non_negative("ref_prices", refs)?;
        }

        ensure_tier_fraction("leak.promo", &self.leak.promo)?;
        ensure_tier_fraction("leak.volume", &self.leak.volume)?;
        ensure_fraction("leak.payment_pct", self.leak.payment_pct)?;
        ensure_non_negative("leak.payment_fixed", self.leak.payment_fixed)?;
        ensure_fraction("leak.fx_pct", self.leak.fx_pct)?;
        ensure_fraction("leak.refunds_pct", self.leak.refunds_pct)?;

        if self.segments.is_empty() {
            return Err(LabError::invalid("segments", "at least one segment is required"));
        }
        for segment in &self.segments {
            let name = |part: &str| format!("segments.{}.{part}", segment.label);
            ensure_non_negative(&name("weight"), segment.weight)?;
            ensure_finite(&name("beta.price"), segment.beta.price)?;
            ensure_finite(&name("beta.feat_a"), segment.beta.feat_a)?;
            ensure_finite(&name("beta.feat_b"), segment.beta.feat_b)?;
            if let Some(alpha) = segment.beta.ref_anchor {
                ensure_finite(&name("beta.ref_anchor"), alpha)?;
            }
            ensure_non_negative(&name("beta.lambda_loss"), segment.beta.lambda_loss)?;
        }

        if !self.population.is_finite() || self.population <= 0.0 {
            return Err(LabError::invalid(
                "population",
                format!("population must be a positive number, got {}", self.population),
            ));
        }

        validate_search_ranges(&self.ranges)?;
        validate_gaps(self.constraints.gap_gb, self.constraints.gap_bb)?;
        validate_floors(&self.constraints.margin_floor)?;
        if let Some(cap) = self.constraints.max_none_share {
            ensure_fraction("constraints.max_none_share", cap)?;
        }
        if let Some(floor) = self.constraints.min_take_rate {
            ensure_fraction("constraints.min_take_rate", floor)?;
        }

        let analysis = &self.analysis;
        ensure_finite("analysis.tornado_spread", analysis.tornado_spread)?;
        if analysis.tornado_spread <= 0.0 || analysis.tornado_spread > 1.0 {
            return Err(LabError::invalid(
                "analysis.tornado_spread",
                format!("must be in (0, 1], got {}", analysis.tornado_spread),
            ));
        }
        ensure_fraction("analysis.robustness_jitter", analysis.robustness_jitter)?;
        if analysis.robustness_draws == 0 {
            return Err(LabError::invalid("analysis.robustness_draws", "must be at least 1"));
        }

        Ok(())
    }

    // ── Convenience wiring into the engine ──────────────────────────

    pub fn shares(&self) -> LabResult<ChoiceShares> {
        choice_shares(&self.prices, &self.features, &self.segments, self.ref_prices.as_ref())
    }

    pub fn kpis(&self) -> LabResult<SnapshotKpis> {
        compute_kpis(
            &self.prices,
            &self.costs,
            &self.features,
            &self.segments,
            self.ref_prices.as_ref(),
            &self.leak,
            self.population,
            self.constraints.use_pocket_profit,
            self.constraints.use_pocket_margins,
        )
    }

    pub fn optimize(&self) -> LabResult<OptimizeOutcome> {
        optimize(
            &self.costs,
            &self.ranges,
            &self.constraints,
            &self.leak,
            &self.segments,
            &self.features,
            self.ref_prices.as_ref(),
            self.population,
        )
    }

    pub fn coverage(&self) -> LabResult<CoverageReport> {
        pocket_coverage(
            &self.ranges,
            &self.costs,
            &self.constraints.margin_floor,
            self.constraints.gap_gb,
            self.constraints.gap_bb,
            &self.leak,
        )
    }

    pub fn feasibility_slice(&self) -> LabResult<FeasSlice> {
        feasibility_slice_gb(
            &self.ranges,
            &self.costs,
            &self.constraints.margin_floor,
            self.constraints.gap_gb,
            self.constraints.gap_bb,
            &self.leak,
        )
    }

    /// A worked three-segment scenario for demos and tests. Direct
    /// channel leaks, anchored value hunters, charm pricing on.
    pub fn demo() -> Self {
        let leak = match find_preset("direct") {
            Some(preset) => preset.leak,
            None => Leakages::default(),
        };

        Self {
            prices: TierValues::new(49.0, 99.0, 199.0),
            costs: TierValues::new(18.0, 32.0, 55.0),
            features: Features {
                feat_a: TierValues::new(1.0, 2.0, 3.0),
                feat_b: TierValues::new(0.0, 1.0, 2.0),
            },
            ref_prices: Some(TierValues::new(59.0, 109.0, 189.0)),
            leak,
            segments: vec![
                Segment {
                    label: "value_hunters".into(),
                    weight: 0.45,
                    beta: Beta {
                        price: -0.045,
                        feat_a: 0.55,
                        feat_b: 0.25,
                        ref_anchor: Some(-0.020),
                        lambda_loss: 1.8,
                    },
                },
                Segment {
                    label: "pragmatists".into(),
                    weight: 0.35,
                    beta: Beta {
                        price: -0.028,
                        feat_a: 0.85,
                        feat_b: 0.60,
                        ref_anchor: Some(-0.012),
                        lambda_loss: 1.3,
                    },
                },
                Segment {
                    label: "premium_seekers".into(),
                    weight: 0.20,
                    beta: Beta {
                        price: -0.012,
                        feat_a: 1.10,
                        feat_b: 1.25,
                        ref_anchor: None,
                        lambda_loss: 1.0,
                    },
                },
            ],
            population: 5000.0,
            ranges: SearchRanges {
                good: PriceRange { min: 39.0, max: 69.0 },
                better: PriceRange { min: 79.0, max: 129.0 },
                best: PriceRange { min: 149.0, max: 249.0 },
                step: 5.0,
            },
            constraints: Constraints {
                gap_gb: 20.0,
                gap_bb: 40.0,
                margin_floor: TierValues::uniform(0.25),
                charm: true,
                use_pocket_profit: true,
                use_pocket_margins: true,
                max_none_share: None,
                min_take_rate: None,
            },
            analysis: AnalysisSettings::default(),
            extra: serde_json::Map::new(),
        }
    }
}
