use ladderlab_core::choice::{choice_shares, Beta, Segment};
use ladderlab_core::error::LabError;
use ladderlab_core::types::{Features, TierValues};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn price_only(beta_price: f64) -> Beta {
    Beta {
        price: beta_price,
        feat_a: 0.0,
        feat_b: 0.0,
        ref_anchor: None,
        lambda_loss: 1.0,
    }
}

fn segment(label: &str, weight: f64, beta: Beta) -> Segment {
    Segment { label: label.into(), weight, beta }
}

fn anchored(alpha: f64, lambda: f64) -> Beta {
    Beta {
        price: 0.0,
        feat_a: 0.0,
        feat_b: 0.0,
        ref_anchor: Some(alpha),
        lambda_loss: lambda,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// One segment, beta_price -0.05, prices 50/80/120, no features:
/// utilities are 0/-2.5/-4/-6 and the softmax lands on
/// 0.9067 / 0.0744 / 0.0166 / 0.0022.
#[test]
fn single_segment_matches_hand_softmax() {
    let shares = choice_shares(
        &TierValues::new(50.0, 80.0, 120.0),
        &Features::default(),
        &[segment("all", 1.0, price_only(-0.05))],
        None,
    )
    .unwrap();

    assert!((shares.none - 0.906717461).abs() < 1e-6, "none {}", shares.none);
    assert!((shares.good - 0.074427902).abs() < 1e-6, "good {}", shares.good);
    assert!((shares.better - 0.016607110).abs() < 1e-6, "better {}", shares.better);
    assert!((shares.best - 0.002247528).abs() < 1e-6, "best {}", shares.best);
    assert!((shares.take_rate() - (1.0 - shares.none)).abs() < 1e-12);
}

/// Shares are a probability vector even with extreme utilities; the
/// max-subtracted softmax keeps the denominator away from zero.
#[test]
fn shares_always_sum_to_one() {
    for beta_price in [-0.001, -0.05, -1.0, -5.0, -100.0] {
        let shares = choice_shares(
            &TierValues::new(50.0, 80.0, 120.0),
            &Features::default(),
            &[segment("all", 1.0, price_only(beta_price))],
            None,
        )
        .unwrap();

        assert!(
            (shares.sum() - 1.0).abs() < 1e-9,
            "sum {} at beta_price {beta_price}",
            shares.sum()
        );
        for value in [shares.none, shares.good, shares.better, shares.best] {
            assert!((0.0..=1.0).contains(&value), "share {value} out of range");
        }
    }
}

/// Walking away carries utility zero, so raising every price moves
/// probability mass onto it.
#[test]
fn dearer_ladder_raises_walkaway() {
    let segments = [segment("all", 1.0, price_only(-0.02))];
    let base = choice_shares(
        &TierValues::new(50.0, 80.0, 120.0),
        &Features::default(),
        &segments,
        None,
    )
    .unwrap();
    let dearer = choice_shares(
        &TierValues::new(75.0, 120.0, 180.0),
        &Features::default(),
        &segments,
        None,
    )
    .unwrap();

    assert!(dearer.none > base.none, "{} vs {}", dearer.none, base.none);
    assert!(dearer.take_rate() < base.take_rate());
}

/// The loss multiplier only engages above the reference point. Below
/// it, lambda has no effect at all.
#[test]
fn loss_multiplier_gated_to_prices_above_reference() {
    let refs = TierValues::new(50.0, 100.0, 150.0);
    let below = TierValues::new(40.0, 100.0, 150.0);
    let above = TierValues::new(60.0, 100.0, 150.0);

    let below_tame = choice_shares(
        &below,
        &Features::default(),
        &[segment("a", 1.0, anchored(-0.02, 1.0))],
        Some(&refs),
    )
    .unwrap();
    let below_averse = choice_shares(
        &below,
        &Features::default(),
        &[segment("a", 1.0, anchored(-0.02, 3.0))],
        Some(&refs),
    )
    .unwrap();
    assert_eq!(below_tame, below_averse, "lambda must not touch the gain side");

    let above_tame = choice_shares(
        &above,
        &Features::default(),
        &[segment("a", 1.0, anchored(-0.02, 1.0))],
        Some(&refs),
    )
    .unwrap();
    let above_averse = choice_shares(
        &above,
        &Features::default(),
        &[segment("a", 1.0, anchored(-0.02, 3.0))],
        Some(&refs),
    )
    .unwrap();
    assert!(
        above_averse.good < above_tame.good,
        "loss aversion should depress the overpriced tier: {} vs {}",
        above_averse.good,
        above_tame.good
    );
}

/// With lambda 2, a $10 overshoot loses more share than a $10
/// undershoot gains, relative to the all-at-reference baseline of
/// 0.25 per option.
#[test]
fn losses_outweigh_equal_gains() {
    let refs = TierValues::new(50.0, 100.0, 150.0);
    let segments = [segment("a", 1.0, anchored(-0.02, 2.0))];

    let baseline = choice_shares(
        &TierValues::new(50.0, 100.0, 150.0),
        &Features::default(),
        &segments,
        Some(&refs),
    )
    .unwrap();
    assert_eq!(baseline.good, 0.25, "all options tie at the reference point");

    let above = choice_shares(
        &TierValues::new(60.0, 100.0, 150.0),
        &Features::default(),
        &segments,
        Some(&refs),
    )
    .unwrap();
    let below = choice_shares(
        &TierValues::new(40.0, 100.0, 150.0),
        &Features::default(),
        &segments,
        Some(&refs),
    )
    .unwrap();

    let loss = baseline.good - above.good;
    let gain = below.good - baseline.good;
    assert!(loss > gain, "loss {loss} should exceed gain {gain}");
}

/// No reference prices means no anchoring, whatever the segment's
/// coefficient says.
#[test]
fn missing_reference_prices_disable_anchoring() {
    let prices = TierValues::new(50.0, 80.0, 120.0);
    let with_coeff = choice_shares(
        &prices,
        &Features::default(),
        &[segment("a", 1.0, anchored(-0.5, 2.0))],
        None,
    )
    .unwrap();
    let without = choice_shares(
        &prices,
        &Features::default(),
        &[segment("a", 1.0, price_only(0.0))],
        None,
    )
    .unwrap();

    assert_eq!(with_coeff, without);
}

/// An all-zero weight vector falls back to an equal-weight mixture
/// instead of dividing by zero.
#[test]
fn zero_total_weight_means_uniform_mixture() {
    let prices = TierValues::new(50.0, 80.0, 120.0);
    let a = price_only(-0.01);
    let b = price_only(-0.08);

    let mixed = choice_shares(
        &prices,
        &Features::default(),
        &[segment("a", 0.0, a.clone()), segment("b", 0.0, b.clone())],
        None,
    )
    .unwrap();

    let only_a =
        choice_shares(&prices, &Features::default(), &[segment("a", 1.0, a)], None).unwrap();
    let only_b =
        choice_shares(&prices, &Features::default(), &[segment("b", 1.0, b)], None).unwrap();

    assert!((mixed.none - 0.5 * (only_a.none + only_b.none)).abs() < 1e-12);
    assert!((mixed.good - 0.5 * (only_a.good + only_b.good)).abs() < 1e-12);
}

/// Weights (2, 6) and (0.25, 0.75) are the same mixture.
#[test]
fn weights_normalize_by_total() {
    let prices = TierValues::new(50.0, 80.0, 120.0);
    let a = price_only(-0.01);
    let b = price_only(-0.08);

    let raw = choice_shares(
        &prices,
        &Features::default(),
        &[segment("a", 2.0, a.clone()), segment("b", 6.0, b.clone())],
        None,
    )
    .unwrap();
    let normalized = choice_shares(
        &prices,
        &Features::default(),
        &[segment("a", 0.25, a), segment("b", 0.75, b)],
        None,
    )
    .unwrap();

    assert!((raw.none - normalized.none).abs() < 1e-12);
    assert!((raw.best - normalized.best).abs() < 1e-12);
}

#[test]
fn rejects_structurally_bad_inputs() {
    let prices = TierValues::new(50.0, 80.0, 120.0);

    assert!(matches!(
        choice_shares(&prices, &Features::default(), &[], None),
        Err(LabError::InvalidInput { .. })
    ));
    assert!(matches!(
        choice_shares(
            &TierValues::new(-1.0, 80.0, 120.0),
            &Features::default(),
            &[segment("a", 1.0, price_only(-0.01))],
            None,
        ),
        Err(LabError::InvalidInput { .. })
    ));
    assert!(matches!(
        choice_shares(
            &TierValues::new(f64::NAN, 80.0, 120.0),
            &Features::default(),
            &[segment("a", 1.0, price_only(-0.01))],
            None,
        ),
        Err(LabError::InvalidInput { .. })
    ));
    assert!(matches!(
        choice_shares(
            &prices,
            &Features::default(),
            &[segment("a", f64::NAN, price_only(-0.01))],
            None,
        ),
        Err(LabError::InvalidInput { .. })
    ));
}
