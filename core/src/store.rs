//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Everything else calls store methods; nothing executes SQL
//! directly. Scenarios and snapshots are stored as JSON payloads and
//! validated on the way in and on the way out.

use crate::error::{LabError, LabResult};
use crate::scenario::Scenario;
use crate::snapshot::{is_valid_slot, ScenarioSnapshot};
use chrono::{Duration, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

/// Share keys are this many characters from [`KEY_ALPHABET`].
pub const KEY_LEN: usize = 8;
const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const MAX_KEY_ATTEMPTS: u32 = 8;
/// Serialized scenario cap in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024;
/// Share links live this long unless saved with an explicit TTL.
pub const LINK_TTL_DAYS: i64 = 180;
/// The recents journal keeps at most this many snapshots.
pub const RECENTS_CAP: u32 = 20;

pub struct ScenarioStore {
    conn: Connection,
}

impl ScenarioStore {
    /// Open (or create) the store file at `path`.
    pub fn open(path: &str) -> LabResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // :memory: and shared-memory databases ignore the WAL request.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// An in-memory store, gone when dropped.
    pub fn in_memory() -> LabResult<Self> {
        Ok(Self { conn: Connection::open(":memory:")? })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LabResult<()> {
        self.conn
            .execute_batch(include_str!("../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Share links ────────────────────────────────────────────

    /// Persist a scenario under a fresh short key with the default
    /// TTL. Returns the key.
    pub fn save_scenario(&self, scenario: &Scenario) -> LabResult<String> {
        self.save_scenario_with_ttl(scenario, LINK_TTL_DAYS)
    }

    pub fn save_scenario_with_ttl(&self, scenario: &Scenario, ttl_days: i64) -> LabResult<String> {
        scenario.validate()?;
        let payload = serde_json::to_string(scenario)?;
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(LabError::PayloadTooLarge {
                size: payload.len(),
                cap: MAX_PAYLOAD_BYTES,
            });
        }

        let now = Utc::now();
        let expires_at = (now + Duration::days(ttl_days)).timestamp();

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let key = random_key(KEY_LEN);
            let inserted = self.conn.execute(
                "INSERT OR IGNORE INTO share_link (key, payload, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key, payload, now.timestamp(), expires_at],
            )?;
            if inserted == 1 {
                log::info!(
                    "share link '{key}' saved ({} bytes, ttl {ttl_days}d)",
                    payload.len()
                );
                return Ok(key);
            }
            log::debug!("share key collision on '{key}', attempt {attempt}");
        }
        Err(LabError::KeyExhausted { attempts: MAX_KEY_ATTEMPTS })
    }

    /// Load a live share link. Expired and unknown keys are the same
    /// error; an expired row stays in place until `purge_expired`.
    pub fn get_scenario(&self, key: &str) -> LabResult<Scenario> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT payload, expires_at FROM share_link WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((payload, expires_at)) = row else {
            return Err(LabError::LinkNotFound { key: key.to_string() });
        };
        if expires_at <= Utc::now().timestamp() {
            log::debug!("share link '{key}' has expired");
            return Err(LabError::LinkNotFound { key: key.to_string() });
        }

        let scenario: Scenario = serde_json::from_str(&payload)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Delete expired links. Returns how many went away.
    pub fn purge_expired(&self) -> LabResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM share_link WHERE expires_at <= ?1",
            params![Utc::now().timestamp()],
        )?;
        if removed > 0 {
            log::info!("purged {removed} expired share links");
        }
        Ok(removed)
    }

    // ── Snapshot slots ─────────────────────────────────────────

    pub fn save_slot(&self, slot: &str, snapshot: &ScenarioSnapshot) -> LabResult<()> {
        ensure_slot(slot)?;
        let payload = serde_json::to_string(snapshot)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshot_slot (slot, payload, saved_at)
             VALUES (?1, ?2, ?3)",
            params![slot, payload, Utc::now().timestamp()],
        )?;
        log::debug!("slot {slot} <- snapshot '{}'", snapshot.label);
        Ok(())
    }

    pub fn get_slot(&self, slot: &str) -> LabResult<Option<ScenarioSnapshot>> {
        ensure_slot(slot)?;
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshot_slot WHERE slot = ?1",
                params![slot],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    /// Empty a slot. Returns whether anything was there.
    pub fn clear_slot(&self, slot: &str) -> LabResult<bool> {
        ensure_slot(slot)?;
        let removed = self
            .conn
            .execute("DELETE FROM snapshot_slot WHERE slot = ?1", params![slot])?;
        Ok(removed > 0)
    }

    pub fn list_slots(&self) -> LabResult<Vec<(String, ScenarioSnapshot)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT slot, payload FROM snapshot_slot ORDER BY slot ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (slot, payload) = row?;
            out.push((slot, serde_json::from_str(&payload)?));
        }
        Ok(out)
    }

    // ── Recents journal ────────────────────────────────────────

    /// Append to the recents journal, trimming it to [`RECENTS_CAP`].
    pub fn push_recent(&self, snapshot: &ScenarioSnapshot) -> LabResult<()> {
        let payload = serde_json::to_string(snapshot)?;
        self.conn.execute(
            "INSERT INTO snapshot_recent (payload, saved_at) VALUES (?1, ?2)",
            params![payload, Utc::now().timestamp()],
        )?;
        self.conn.execute(
            "DELETE FROM snapshot_recent WHERE id NOT IN (
                 SELECT id FROM snapshot_recent ORDER BY id DESC LIMIT ?1)",
            params![RECENTS_CAP],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn recents(&self, limit: u32) -> LabResult<Vec<ScenarioSnapshot>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM snapshot_recent ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for payload in rows {
            out.push(serde_json::from_str(&payload?)?);
        }
        Ok(out)
    }
}

fn ensure_slot(slot: &str) -> LabResult<()> {
    if is_valid_slot(slot) {
        Ok(())
    } else {
        Err(LabError::invalid(
            "slot",
            format!("slot must be one of A, B, C, got '{slot}'"),
        ))
    }
}

fn random_key(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}
