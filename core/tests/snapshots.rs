use ladderlab_core::error::LabError;
use ladderlab_core::scenario::Scenario;
use ladderlab_core::snapshot::{diff, is_valid_slot, ScenarioSnapshot, SLOTS};
use ladderlab_core::store::ScenarioStore;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn fresh_store() -> ScenarioStore {
    let store = ScenarioStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

// ── Capture and diff ─────────────────────────────────────────────────────────

/// A capture freezes the scenario and scores it as of now. Two
/// captures of the same scenario agree on everything but identity.
#[test]
fn capture_scores_the_scenario() {
    let scenario = Scenario::demo();
    let first = ScenarioSnapshot::capture("baseline", &scenario).unwrap();
    let second = ScenarioSnapshot::capture("baseline", &scenario).unwrap();

    assert_eq!(first.label, "baseline");
    assert_eq!(first.scenario, scenario);
    assert_eq!(first.kpis, scenario.kpis().unwrap());
    assert_eq!(first.kpis, second.kpis);
    assert_ne!(first.id, second.id);
}

#[test]
fn capture_rejects_invalid_scenarios() {
    let mut scenario = Scenario::demo();
    scenario.population = 0.0;
    assert!(matches!(
        ScenarioSnapshot::capture("broken", &scenario),
        Err(LabError::InvalidInput { .. })
    ));
}

/// diff(a, b) reads as "what changed going from a to b": every field
/// is b minus a, and swapping the arguments flips the sign.
#[test]
fn diff_is_b_minus_a() {
    let a = ScenarioSnapshot::capture("before", &Scenario::demo()).unwrap();

    let mut moved = Scenario::demo();
    moved.prices.better += 10.0;
    let b = ScenarioSnapshot::capture("after", &moved).unwrap();

    let delta = diff(&a, &b);
    assert_eq!(delta.revenue, b.kpis.revenue - a.kpis.revenue);
    assert_eq!(delta.profit, b.kpis.profit - a.kpis.profit);
    assert_eq!(delta.arpu_active, b.kpis.arpu_active - a.kpis.arpu_active);
    assert_eq!(
        delta.gross_margin_pct,
        b.kpis.gross_margin_pct - a.kpis.gross_margin_pct
    );
    assert_eq!(
        delta.take_rate,
        b.kpis.shares.take_rate() - a.kpis.shares.take_rate()
    );
    assert_eq!(delta.active, b.kpis.active as i64 - a.kpis.active as i64);

    let reversed = diff(&b, &a);
    assert_eq!(reversed.profit, -delta.profit);
    assert_eq!(reversed.active, -delta.active);
}

// ── Slots ────────────────────────────────────────────────────────────────────

/// The three slots persist independently, come back whole and refuse
/// names outside A, B, C.
#[test]
fn slots_are_independent_and_validated() {
    let store = fresh_store();
    let snap_b = ScenarioSnapshot::capture("plan b", &Scenario::demo()).unwrap();
    let snap_c = ScenarioSnapshot::capture("plan c", &Scenario::demo()).unwrap();

    store.save_slot("B", &snap_b).unwrap();
    store.save_slot("C", &snap_c).unwrap();

    assert_eq!(store.get_slot("B").unwrap(), Some(snap_b.clone()));
    assert_eq!(store.get_slot("C").unwrap(), Some(snap_c.clone()));
    assert_eq!(store.get_slot("A").unwrap(), None);

    let listed = store.list_slots().unwrap();
    let names: Vec<&str> = listed.iter().map(|(slot, _)| slot.as_str()).collect();
    assert_eq!(names, ["B", "C"]);

    assert!(store.clear_slot("B").unwrap());
    assert!(!store.clear_slot("B").unwrap());
    assert_eq!(store.get_slot("B").unwrap(), None);

    let err = store.save_slot("D", &snap_b).unwrap_err();
    assert!(matches!(err, LabError::InvalidInput { .. }));
    assert!(err.to_string().contains("slot"), "got: {err}");
}

/// Overwriting a slot replaces its occupant and leaves the other
/// slots alone.
#[test]
fn saving_a_slot_twice_keeps_the_newer_capture() {
    let store = fresh_store();
    let old = ScenarioSnapshot::capture("old", &Scenario::demo()).unwrap();
    let bystander = ScenarioSnapshot::capture("bystander", &Scenario::demo()).unwrap();

    let mut moved = Scenario::demo();
    moved.prices.good += 5.0;
    let new = ScenarioSnapshot::capture("new", &moved).unwrap();

    store.save_slot("A", &old).unwrap();
    store.save_slot("B", &bystander).unwrap();
    store.save_slot("A", &new).unwrap();

    let got = store.get_slot("A").unwrap().unwrap();
    assert_eq!(got.id, new.id);
    assert_eq!(got.label, "new");
    assert_eq!(store.get_slot("B").unwrap(), Some(bystander));
}

#[test]
fn slot_names_are_fixed() {
    assert_eq!(SLOTS, ["A", "B", "C"]);
    assert!(is_valid_slot("A"));
    assert!(is_valid_slot("C"));
    assert!(!is_valid_slot("a"));
    assert!(!is_valid_slot("D"));
    assert!(!is_valid_slot(""));
}

// ── Recents ──────────────────────────────────────────────────────────────────

/// The journal keeps the 20 most recent captures, newest first.
#[test]
fn recents_cap_and_order() {
    let store = fresh_store();
    let scenario = Scenario::demo();
    for i in 0..25 {
        let snap = ScenarioSnapshot::capture(format!("snap-{i}"), &scenario).unwrap();
        store.push_recent(&snap).unwrap();
    }

    let all = store.recents(50).unwrap();
    assert_eq!(all.len(), 20);
    assert_eq!(all.first().unwrap().label, "snap-24");
    assert_eq!(all.last().unwrap().label, "snap-5");

    let top = store.recents(3).unwrap();
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].label, "snap-24");
    assert_eq!(top[2].label, "snap-22");
}
