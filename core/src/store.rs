//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The engine never touches the store; history is written by the
//! caller through `RunRecorder` after each committed step.

use crate::{
    error::SimResult,
    event::EventLogEntry,
    snapshot::StateCounts,
    types::Step,
};
use rusqlite::{params, Connection, OptionalExtension};

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    /// Open (or create) the simulation database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("opened {path} (journal_mode={mode})");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        seed: u64,
        version: &str,
        config_json: &str,
    ) -> SimResult<()> {
        let started_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, started_at, config_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, seed as i64, version, started_at, config_json],
        )?;
        Ok(())
    }

    /// Seed recorded for a run, if the run exists.
    pub fn run_seed(&self, run_id: &str) -> SimResult<Option<u64>> {
        let seed = self
            .conn
            .query_row(
                "SELECT seed FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(seed.map(|s| s as u64))
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, step, event_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.run_id, entry.step as i64, entry.event_type, entry.payload],
        )?;
        Ok(())
    }

    pub fn events_for_step(&self, run_id: &str, step: Step) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, step, event_type, payload
             FROM event_log WHERE run_id = ?1 AND step = ?2
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id, step as i64], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    step:       row.get::<_, i64>(2)? as u64,
                    event_type: row.get(3)?,
                    payload:    row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str, event_type: &str) -> SimResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
            params![run_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── State counts ───────────────────────────────────────────

    pub fn insert_state_counts(&self, run_id: &str, step: Step, counts: &StateCounts) -> SimResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO state_counts
                 (run_id, step, susceptible, infected, recovered, deceased)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                step as i64,
                counts.susceptible,
                counts.infected,
                counts.recovered,
                counts.deceased,
            ],
        )?;
        Ok(())
    }

    /// Per-step counts for a run, oldest first.
    pub fn state_count_history(&self, run_id: &str) -> SimResult<Vec<(Step, StateCounts)>> {
        let mut stmt = self.conn.prepare(
            "SELECT step, susceptible, infected, recovered, deceased
             FROM state_counts WHERE run_id = ?1
             ORDER BY step ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    StateCounts {
                        susceptible: row.get(1)?,
                        infected:    row.get(2)?,
                        recovered:   row.get(3)?,
                        deceased:    row.get(4)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Snapshot ───────────────────────────────────────────────

    pub fn save_snapshot(&self, run_id: &str, step: Step, state_json: &str) -> SimResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshot (run_id, step, state_json) VALUES (?1, ?2, ?3)",
            params![run_id, step as i64, state_json],
        )?;
        Ok(())
    }

    pub fn load_snapshot(&self, run_id: &str, step: Step) -> SimResult<Option<String>> {
        let json = self
            .conn
            .query_row(
                "SELECT state_json FROM snapshot WHERE run_id = ?1 AND step = ?2",
                params![run_id, step as i64],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(json)
    }

    pub fn latest_snapshot_before(
        &self, run_id: &str, step: Step
    ) -> SimResult<Option<(Step, String)>> {
        let result = self
            .conn
            .query_row(
                "SELECT step, state_json FROM snapshot
                 WHERE run_id = ?1 AND step <= ?2
                 ORDER BY step DESC LIMIT 1",
                params![run_id, step as i64],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(result)
    }

    pub fn snapshot_count(&self, run_id: &str) -> SimResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM snapshot WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
