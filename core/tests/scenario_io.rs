use ladderlab_core::csv::{from_csv, to_csv};
use ladderlab_core::leakage::Leakages;
use ladderlab_core::optimizer::{Constraints, SearchRanges};
use ladderlab_core::scenario::Scenario;
use ladderlab_core::types::Features;
use serde_json::json;

// ── JSON ─────────────────────────────────────────────────────────────────────

/// Fields this build does not know about survive a load and re-save.
/// A scenario shared from a newer build must come back intact.
#[test]
fn json_round_trip_preserves_unknown_fields() {
    let mut value = serde_json::to_value(Scenario::demo()).unwrap();
    let object = value.as_object_mut().unwrap();
    object.insert("ui_theme".into(), json!("dark"));
    object.insert("panel".into(), json!({ "collapsed": true }));

    let parsed: Scenario = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.prices, Scenario::demo().prices);
    assert_eq!(parsed.extra.get("ui_theme"), Some(&json!("dark")));
    assert_eq!(parsed.extra.get("panel"), Some(&json!({ "collapsed": true })));

    let round = serde_json::to_value(&parsed).unwrap();
    assert_eq!(round.get("ui_theme"), Some(&json!("dark")));
    assert_eq!(round.get("panel"), Some(&json!({ "collapsed": true })));
}

/// A minimal document with only prices, costs and one segment parses:
/// everything else falls back to workable defaults.
#[test]
fn missing_optional_fields_get_defaults() {
    let raw = r#"{
        "prices": {"good": 19.0, "better": 39.0, "best": 79.0},
        "costs": {"good": 5.0, "better": 9.0, "best": 15.0},
        "segments": [{"label": "only", "weight": 1.0, "beta": {"price": -0.02}}]
    }"#;
    let scenario: Scenario = serde_json::from_str(raw).unwrap();
    scenario.validate().unwrap();

    assert_eq!(scenario.population, 1000.0);
    assert_eq!(scenario.features, Features::default());
    assert_eq!(scenario.ref_prices, None);
    assert_eq!(scenario.leak, Leakages::default());
    assert_eq!(scenario.ranges, SearchRanges::default());
    assert_eq!(scenario.ranges.good.min, 29.0);
    assert_eq!(scenario.ranges.best.max, 259.0);
    assert_eq!(scenario.constraints, Constraints::default());

    assert_eq!(scenario.analysis.robustness_draws, 500);
    assert_eq!(scenario.analysis.robustness_seed, 42);
    assert!((scenario.analysis.tornado_spread - 0.20).abs() < 1e-12);
    assert!((scenario.analysis.robustness_jitter - 0.15).abs() < 1e-12);

    let beta = &scenario.segments[0].beta;
    assert_eq!(beta.feat_a, 0.0);
    assert_eq!(beta.feat_b, 0.0);
    assert_eq!(beta.ref_anchor, None);
    assert_eq!(beta.lambda_loss, 1.0);
}

/// validate() names the offending field so the caller can surface it.
#[test]
fn validate_names_the_bad_field() {
    let base = Scenario::demo();

    let mut bad = base.clone();
    bad.prices.good = f64::NAN;
    let err = bad.validate().unwrap_err().to_string();
    assert!(err.contains("prices.good"), "got: {err}");

    let mut bad = base.clone();
    bad.leak.fx_pct = 1.5;
    let err = bad.validate().unwrap_err().to_string();
    assert!(err.contains("leak.fx_pct"), "got: {err}");

    let mut bad = base.clone();
    bad.analysis.tornado_spread = 0.0;
    let err = bad.validate().unwrap_err().to_string();
    assert!(err.contains("tornado_spread"), "got: {err}");

    let mut bad = base.clone();
    bad.segments.clear();
    let err = bad.validate().unwrap_err().to_string();
    assert!(err.contains("segments"), "got: {err}");

    let mut bad = base.clone();
    bad.segments[0].beta.lambda_loss = -1.0;
    let err = bad.validate().unwrap_err().to_string();
    assert!(err.contains("lambda_loss"), "got: {err}");

    let mut bad = base;
    bad.analysis.robustness_draws = 0;
    let err = bad.validate().unwrap_err().to_string();
    assert!(err.contains("robustness_draws"), "got: {err}");
}

// ── CSV ──────────────────────────────────────────────────────────────────────

/// Export then import reproduces every field the CSV carries. Floats
/// survive exactly: the writer emits the shortest round-trippable
/// decimal form.
#[test]
fn csv_round_trip_reproduces_carried_fields() {
    let original = Scenario::demo();
    let text = to_csv(&original).unwrap();
    let imported = from_csv(&text).unwrap();

    assert_eq!(imported.prices, original.prices);
    assert_eq!(imported.costs, original.costs);
    assert_eq!(imported.features, original.features);
    assert_eq!(imported.ref_prices, original.ref_prices);
    assert_eq!(imported.leak, original.leak);
    assert_eq!(imported.ranges, original.ranges);
    assert_eq!(imported.population, original.population);
    assert_eq!(imported.segments, original.segments);

    // The CSV carries model inputs only. Constraints and analysis
    // knobs come back at their defaults even though the demo sets
    // non-default constraints.
    assert_ne!(original.constraints, Constraints::default());
    assert_eq!(imported.constraints, Constraints::default());
}

/// Values occupy the rest of the row, so a label may contain commas.
#[test]
fn csv_labels_may_contain_commas() {
    let mut scenario = Scenario::demo();
    scenario.segments[0].label = "value, hunters".into();

    let text = to_csv(&scenario).unwrap();
    let imported = from_csv(&text).unwrap();
    assert_eq!(imported.segments[0].label, "value, hunters");
}

/// Newlines in a label would corrupt the row framing, so export
/// refuses them up front.
#[test]
fn csv_rejects_labels_with_newlines() {
    let mut scenario = Scenario::demo();
    scenario.segments[0].label = "two\nlines".into();
    let err = to_csv(&scenario).unwrap_err().to_string();
    assert!(err.contains("label"), "got: {err}");
}

/// Import errors name the 1-based source line, counting blank lines,
/// so the message matches what an editor shows.
#[test]
fn csv_errors_carry_line_numbers() {
    let err = from_csv("kind,field,value\nprice,good,abc\n").unwrap_err().to_string();
    assert!(err.contains("line 2"), "got: {err}");
    assert!(err.contains("expected a number"), "got: {err}");

    let err = from_csv("price,good").unwrap_err().to_string();
    assert!(err.contains("line 1"), "got: {err}");

    let err = from_csv("\n\nzz,a,1").unwrap_err().to_string();
    assert!(err.contains("line 3"), "got: {err}");
    assert!(err.contains("unknown kind"), "got: {err}");

    let err = from_csv("seg,x.label,foo").unwrap_err().to_string();
    assert!(err.contains("segment index"), "got: {err}");
}

/// A document with no population row fails validation instead of
/// producing a silently empty market.
#[test]
fn csv_missing_population_fails_validation() {
    let text = to_csv(&Scenario::demo()).unwrap();
    let without: String = text
        .lines()
        .filter(|line| !line.starts_with("population,"))
        .map(|line| format!("{line}\n"))
        .collect();

    let err = from_csv(&without).unwrap_err().to_string();
    assert!(err.contains("population"), "got: {err}");
}

/// An explicit lambda of zero is a real setting (gains-only
/// anchoring), distinct from the row being absent. It must survive
/// the trip rather than snapping back to 1.
#[test]
fn csv_lambda_zero_round_trips() {
    let mut scenario = Scenario::demo();
    scenario.segments[0].beta.lambda_loss = 0.0;

    let text = to_csv(&scenario).unwrap();
    let imported = from_csv(&text).unwrap();
    assert_eq!(imported.segments[0].beta.lambda_loss, 0.0);
}
