//! SQLite-based phase storage and statistics.
//!
//! Provides persistent storage for:
//! - Phase records reported by the scheduler
//! - Statistics (daily and all-time)
//! - Key-value store for application state (the scheduler snapshot)

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::data_dir;
use super::migrations;
use crate::error::Result;
use crate::persistence::PersistenceSink;
use crate::scheduler::{Phase, SchedulerState, SessionType};
use crate::stats::{PhaseRecord, StatsSink, StatsSummary};

/// kv key holding the serialized [`SchedulerState`].
pub const SNAPSHOT_KEY: &str = "scheduler_state";

/// SQLite database for phase records and the scheduler snapshot.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/standwell/standwell.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("standwell.db"))
    }

    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a finished phase.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_phase(&self, record: &PhaseRecord) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO phase_records (session_type, phase, elapsed_secs, skipped, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_type_str(record.session_type),
                record.phase.map(phase_str),
                record.elapsed_secs as i64,
                record.skipped,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Records at or after `since`, oldest first.
    pub fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<PhaseRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT session_type, phase, elapsed_secs, skipped, recorded_at
             FROM phase_records
             WHERE recorded_at >= ?1
             ORDER BY recorded_at, id",
        )?;
        let rows = stmt.query_map(params![since.to_rfc3339()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (session_type, phase, elapsed_secs, skipped, recorded_at) = row?;
            let Some(session_type) = parse_session_type(&session_type) else {
                tracing::warn!(%session_type, "skipping phase record with unknown session type");
                continue;
            };
            let Ok(recorded_at) = DateTime::parse_from_rfc3339(&recorded_at) else {
                tracing::warn!(%recorded_at, "skipping phase record with bad timestamp");
                continue;
            };
            records.push(PhaseRecord {
                session_type,
                phase: phase.as_deref().and_then(parse_phase),
                elapsed_secs: elapsed_secs.max(0) as u64,
                skipped,
                recorded_at: recorded_at.with_timezone(&Utc),
            });
        }
        Ok(records)
    }

    /// Summary of records since UTC midnight of `now`'s day.
    pub fn stats_today(&self, now: DateTime<Utc>) -> Result<StatsSummary> {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        Ok(summarize(&self.records_since(midnight)?))
    }

    pub fn stats_all(&self) -> Result<StatsSummary> {
        Ok(summarize(&self.records_since(DateTime::<Utc>::UNIX_EPOCH)?))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// The last saved scheduler snapshot, if any.
    ///
    /// # Errors
    /// Returns an error on query failure or if the stored JSON is corrupt.
    pub fn load_snapshot(&self) -> Result<Option<SchedulerState>> {
        match self.kv_get(SNAPSHOT_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_snapshot(&self, state: &SchedulerState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.kv_set(SNAPSHOT_KEY, &json)
    }
}

impl StatsSink for Database {
    fn record_phase(&self, record: PhaseRecord) {
        if let Err(e) = Database::record_phase(self, &record) {
            tracing::warn!("failed to record phase: {e}");
        }
    }
}

impl PersistenceSink for Database {
    fn save(&self, state: &SchedulerState) {
        if let Err(e) = self.save_snapshot(state) {
            tracing::warn!("failed to save scheduler snapshot: {e}");
        }
    }
}

fn summarize(records: &[PhaseRecord]) -> StatsSummary {
    let mut summary = StatsSummary::default();
    for record in records {
        summary.add(record);
    }
    summary
}

fn session_type_str(t: SessionType) -> &'static str {
    match t {
        SessionType::Focus => "focus",
        SessionType::ShortBreak => "short_break",
        SessionType::LongBreak => "long_break",
    }
}

fn parse_session_type(s: &str) -> Option<SessionType> {
    match s {
        "focus" => Some(SessionType::Focus),
        "short_break" => Some(SessionType::ShortBreak),
        "long_break" => Some(SessionType::LongBreak),
        _ => None,
    }
}

fn phase_str(p: Phase) -> &'static str {
    match p {
        Phase::Sitting => "sitting",
        Phase::Standing => "standing",
    }
}

fn parse_phase(s: &str) -> Option<Phase> {
    match s {
        "sitting" => Some(Phase::Sitting),
        "standing" => Some(Phase::Standing),
        _ => None,
    }
}
