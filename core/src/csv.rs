//! Sectioned CSV export and import of the carried scenario fields.
//!
//! Three columns: kind, field, value. The value occupies the rest of
//! the line (`splitn(3)` on the way back in), so segment labels may
//! contain commas. CSV carries the pricing inputs: prices, costs,
//! features, reference prices, leaks, the search box, population and
//! segments. Constraints and analysis settings travel only in the
//! JSON bundle.
//!
//! Numbers are written with `f64`'s shortest round-trip display, so
//! export followed by import reproduces the carried fields exactly.

use crate::choice::{Beta, Segment};
use crate::error::{LabError, LabResult};
use crate::leakage::Leakages;
use crate::optimizer::{Constraints, SearchRanges};
use crate::scenario::{AnalysisSettings, Scenario};
use crate::types::{Features, Tier, TierValues};
use std::collections::BTreeMap;

pub const CSV_HEADER: &str = "kind,field,value";

fn tier_rows(out: &mut String, kind: &str, values: &TierValues) {
    for (tier, value) in values.iter() {
        out.push_str(&format!("{kind},{tier},{value}\n"));
    }
}

/// Serialize the carried fields of a valid scenario.
pub fn to_csv(scenario: &Scenario) -> LabResult<String> {
    scenario.validate()?;
    for segment in &scenario.segments {
        if segment.label.contains('\n') || segment.label.contains('\r') {
            return Err(LabError::invalid(
                format!("segments.{}", segment.label.escape_default()),
                "label must not contain line breaks",
            ));
        }
    }

    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');

    tier_rows(&mut out, "price", &scenario.prices);
    tier_rows(&mut out, "cost", &scenario.costs);
    tier_rows(&mut out, "feat_a", &scenario.features.feat_a);
    tier_rows(&mut out, "feat_b", &scenario.features.feat_b);
    if let Some(refs) = &scenario.ref_prices {
        tier_rows(&mut out, "ref_price", refs);
    }

    let leak = &scenario.leak;
    for (tier, value) in leak.promo.iter() {
        out.push_str(&format!("leak,promo.{tier},{value}\n"));
    }
    for (tier, value) in leak.volume.iter() {
        out.push_str(&format!("leak,volume.{tier},{value}\n"));
    }
    out.push_str(&format!("leak,payment_pct,{}\n", leak.payment_pct));
    out.push_str(&format!("leak,payment_fixed,{}\n", leak.payment_fixed));
    out.push_str(&format!("leak,fx_pct,{}\n", leak.fx_pct));
    out.push_str(&format!("leak,refunds_pct,{}\n", leak.refunds_pct));

    for tier in Tier::ALL {
        let range = scenario.ranges.range(tier);
        out.push_str(&format!("range,{tier}.min,{}\n", range.min));
        out.push_str(&format!("range,{tier}.max,{}\n", range.max));
    }
    out.push_str(&format!("range,step,{}\n", scenario.ranges.step));
    out.push_str(&format!("population,,{}\n", scenario.population));

    for (i, segment) in scenario.segments.iter().enumerate() {
        out.push_str(&format!("seg,{i}.label,{}\n", segment.label));
        out.push_str(&format!("seg,{i}.weight,{}\n", segment.weight));
        out.push_str(&format!("seg,{i}.beta_price,{}\n", segment.beta.price));
        out.push_str(&format!("seg,{i}.beta_feat_a,{}\n", segment.beta.feat_a));
        out.push_str(&format!("seg,{i}.beta_feat_b,{}\n", segment.beta.feat_b));
        if let Some(alpha) = segment.beta.ref_anchor {
            out.push_str(&format!("seg,{i}.ref_anchor,{alpha}\n"));
        }
        out.push_str(&format!("seg,{i}.lambda_loss,{}\n", segment.beta.lambda_loss));
    }

    Ok(out)
}

// ── Import ──────────────────────────────────────────────────────────

#[derive(Default)]
struct SegmentDraft {
    label: Option<String>,
    weight: Option<f64>,
    beta_price: Option<f64>,
    beta_feat_a: f64,
    beta_feat_b: f64,
    ref_anchor: Option<f64>,
    lambda_loss: Option<f64>,
}

impl SegmentDraft {
    fn finish(self, index: usize) -> LabResult<Segment> {
        let field = |part: &str| format!("seg.{index}.{part}");
        Ok(Segment {
            label: self
                .label
                .ok_or_else(|| LabError::invalid(field("label"), "missing row"))?,
            weight: self
                .weight
                .ok_or_else(|| LabError::invalid(field("weight"), "missing row"))?,
            beta: Beta {
                price: self
                    .beta_price
                    .ok_or_else(|| LabError::invalid(field("beta_price"), "missing row"))?,
                feat_a: self.beta_feat_a,
                feat_b: self.beta_feat_b,
                ref_anchor: self.ref_anchor,
                lambda_loss: self.lambda_loss.unwrap_or(1.0),
            },
        })
    }
}

fn parse_number(line_no: usize, raw: &str) -> LabResult<f64> {
    raw.trim().parse().map_err(|_| {
        LabError::invalid(format!("csv line {line_no}"), format!("expected a number, got '{raw}'"))
    })
}

fn parse_tier(line_no: usize, raw: &str) -> LabResult<Tier> {
    match raw {
        "good" => Ok(Tier::Good),
        "better" => Ok(Tier::Better),
        "best" => Ok(Tier::Best),
        other => Err(LabError::invalid(
            format!("csv line {line_no}"),
            format!("expected a tier name, got '{other}'"),
        )),
    }
}

/// Parse a sectioned CSV back into a scenario. Fields the CSV does
/// not carry come back at their defaults; the result is validated
/// before it is returned.
pub fn from_csv(text: &str) -> LabResult<Scenario> {
    let mut scenario = Scenario {
        prices: TierValues::ZERO,
        costs: TierValues::ZERO,
        features: Features::default(),
        ref_prices: None,
        leak: Leakages::default(),
        segments: Vec::new(),
        population: 0.0,
        ranges: SearchRanges::default(),
        constraints: Constraints::default(),
        analysis: AnalysisSettings::default(),
        extra: serde_json::Map::new(),
    };
    let mut drafts: BTreeMap<usize, SegmentDraft> = BTreeMap::new();

    for (i, raw_line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line == CSV_HEADER {
            continue;
        }

        let mut parts = line.splitn(3, ',');
        let (kind, field, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(field), Some(value)) => (kind, field, value),
            _ => {
                return Err(LabError::invalid(
                    format!("csv line {line_no}"),
                    "expected kind,field,value",
                ))
            }
        };

        match kind {
            "price" => {
                let tier = parse_tier(line_no, field)?;
                scenario.prices.set(tier, parse_number(line_no, value)?);
            }
            "cost" => {
                let tier = parse_tier(line_no, field)?;
                scenario.costs.set(tier, parse_number(line_no, value)?);
            }
            "feat_a" => {
                let tier = parse_tier(line_no, field)?;
                scenario.features.feat_a.set(tier, parse_number(line_no, value)?);
            }
            "feat_b" => {
                let tier = parse_tier(line_no, field)?;
                scenario.features.feat_b.set(tier, parse_number(line_no, value)?);
            }
            "ref_price" => {
                let tier = parse_tier(line_no, field)?;
                let refs = scenario.ref_prices.get_or_insert(TierValues::ZERO);
                refs.set(tier, parse_number(line_no, value)?);
            }
            "leak" => {
                let number = parse_number(line_no, value)?;
                match field {
                    "payment_pct" => scenario.leak.payment_pct = number,
                    "payment_fixed" => scenario.leak.payment_fixed = number,
                    "fx_pct" => scenario.leak.fx_pct = number,
                    "refunds_pct" => scenario.leak.refunds_pct = number,
                    _ => match field.split_once('.') {
                        Some(("promo", tier)) => {
                            scenario.leak.promo.set(parse_tier(line_no, tier)?, number)
                        }
                        Some(("volume", tier)) => {
                            scenario.leak.volume.set(parse_tier(line_no, tier)?, number)
                        }
                        _ => {
                            return Err(LabError::invalid(
                                format!("csv line {line_no}"),
                                format!("unknown leak field '{field}'"),
                            ))
                        }
                    },
                }
            }
            "range" => {
                let number = parse_number(line_no, value)?;
                if field == "step" {
                    scenario.ranges.step = number;
                } else {
                    match field.split_once('.') {
                        Some((tier, "min")) => {
                            let tier = parse_tier(line_no, tier)?;
                            match tier {
                                Tier::Good => scenario.ranges.good.min = number,
                                Tier::Better => scenario.ranges.better.min = number,
                                Tier::Best => scenario.ranges.best.min = number,
                            }
                        }
                        Some((tier, "max")) => {
                            let tier = parse_tier(line_no, tier)?;
                            match tier {
                                Tier::Good => scenario.ranges.good.max = number,
                                Tier::Better => scenario.ranges.better.max = number,
                                Tier::Best => scenario.ranges.best.max = number,
                            }
                        }
                        _ => {
                            return Err(LabError::invalid(
                                format!("csv line {line_no}"),
                                format!("unknown range field '{field}'"),
                            ))
                        }
                    }
                }
            }
            "population" => {
                scenario.population = parse_number(line_no, value)?;
            }
            "seg" => {
                let (index, key) = field.split_once('.').ok_or_else(|| {
                    LabError::invalid(
                        format!("csv line {line_no}"),
                        format!("expected seg,<index>.<key>, got '{field}'"),
                    )
                })?;
                let index: usize = index.parse().map_err(|_| {
                    LabError::invalid(
                        format!("csv line {line_no}"),
                        format!("segment index must be a number, got '{index}'"),
                    )
                })?;
                let draft = drafts.entry(index).or_default();
                match key {
                    "label" => draft.label = Some(value.to_string()),
                    "weight" => draft.weight = Some(parse_number(line_no, value)?),
                    "beta_price" => draft.beta_price = Some(parse_number(line_no, value)?),
                    "beta_feat_a" => draft.beta_feat_a = parse_number(line_no, value)?,
                    "beta_feat_b" => draft.beta_feat_b = parse_number(line_no, value)?,
                    "ref_anchor" => draft.ref_anchor = Some(parse_number(line_no, value)?),
                    "lambda_loss" => draft.lambda_loss = Some(parse_number(line_no, value)?),
                    other => {
                        return Err(LabError::invalid(
                            format!("csv line {line_no}"),
                            format!("unknown segment field '{other}'"),
                        ))
                    }
                }
            }
            other => {
                return Err(LabError::invalid(
                    format!("csv line {line_no}"),
                    format!("unknown kind '{other}'"),
                ))
            }
        }
    }

    for (index, draft) in drafts {
        scenario.segments.push(draft.finish(index)?);
    }

    scenario.validate()?;
    Ok(scenario)
}
