//! Shared vocabulary types for the three-tier pricing ladder.

use serde::{Deserialize, Serialize};

/// Denominator floor for margin and per-unit ratios. Anything priced
/// closer to zero than this is treated as this when dividing.
pub const PRICE_EPS: f64 = 1e-6;

/// The three rungs of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Good,
    Better,
    Best,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Good, Tier::Better, Tier::Best];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Good => "good",
            Tier::Better => "better",
            Tier::Best => "best",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One `f64` per tier. Used for prices, unit costs, reference prices,
/// feature levels, margin floors and per-tier leak rates alike.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TierValues {
    pub good: f64,
    pub better: f64,
    pub best: f64,
}

impl TierValues {
    pub const ZERO: TierValues = TierValues { good: 0.0, better: 0.0, best: 0.0 };

    pub fn new(good: f64, better: f64, best: f64) -> Self {
        Self { good, better, best }
    }

    pub fn uniform(value: f64) -> Self {
        Self { good: value, better: value, best: value }
    }

    pub fn get(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Good => self.good,
            Tier::Better => self.better,
            Tier::Best => self.best,
        }
    }

    pub fn set(&mut self, tier: Tier, value: f64) {
        match tier {
            Tier::Good => self.good = value,
            Tier::Better => self.better = value,
            Tier::Best => self.best = value,
        }
    }

    /// Apply `f` to every tier.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self { good: f(self.good), better: f(self.better), best: f(self.best) }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, f64)> + '_ {
        Tier::ALL.iter().map(move |&t| (t, self.get(t)))
    }

    pub fn is_finite(&self) -> bool {
        self.good.is_finite() && self.better.is_finite() && self.best.is_finite()
    }
}

/// Per-tier levels for the two modeled feature axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub feat_a: TierValues,
    #[serde(default)]
    pub feat_b: TierValues,
}

/// Mixture choice probabilities over the four options a customer has.
/// Always sums to 1 (the walk-away option carries the remainder).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChoiceShares {
    pub none: f64,
    pub good: f64,
    pub better: f64,
    pub best: f64,
}

impl ChoiceShares {
    pub fn get(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Good => self.good,
            Tier::Better => self.better,
            Tier::Best => self.best,
        }
    }

    pub fn sum(&self) -> f64 {
        self.none + self.good + self.better + self.best
    }

    /// Fraction of the population choosing any paid tier.
    pub fn take_rate(&self) -> f64 {
        self.good + self.better + self.best
    }
}
