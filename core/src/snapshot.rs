//! Point-in-time captures of a scenario and its scoreboard.
//!
//! A snapshot freezes the full scenario plus the KPIs it produced at
//! capture time, so two snapshots can be diffed without re-running
//! anything against a build whose model may have moved on.

use crate::error::LabResult;
use crate::kpi::SnapshotKpis;
use crate::scenario::Scenario;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The named comparison slots.
pub const SLOTS: [&str; 3] = ["A", "B", "C"];

pub fn is_valid_slot(slot: &str) -> bool {
    SLOTS.contains(&slot)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSnapshot {
    pub id: String,
    pub label: String,
    pub captured_at: DateTime<Utc>,
    pub scenario: Scenario,
    pub kpis: SnapshotKpis,
}

impl ScenarioSnapshot {
    /// Validate, score and freeze the scenario as of now.
    pub fn capture(label: impl Into<String>, scenario: &Scenario) -> LabResult<Self> {
        scenario.validate()?;
        let kpis = scenario.kpis()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            captured_at: Utc::now(),
            scenario: scenario.clone(),
            kpis,
        })
    }
}

/// KPI deltas, `b` minus `a`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapshotDiff {
    pub revenue: f64,
    pub profit: f64,
    pub arpu_active: f64,
    pub gross_margin_pct: f64,
    pub take_rate: f64,
    pub active: i64,
}

pub fn diff(a: &ScenarioSnapshot, b: &ScenarioSnapshot) -> SnapshotDiff {
    SnapshotDiff {
        revenue: b.kpis.revenue - a.kpis.revenue,
        profit: b.kpis.profit - a.kpis.profit,
        arpu_active: b.kpis.arpu_active - a.kpis.arpu_active,
        gross_margin_pct: b.kpis.gross_margin_pct - a.kpis.gross_margin_pct,
        take_rate: b.kpis.shares.take_rate() - a.kpis.shares.take_rate(),
        active: b.kpis.active as i64 - a.kpis.active as i64,
    }
}
