//! Phase statistics.
//!
//! The scheduler reports one [`PhaseRecord`] per phase completion, skip, or
//! stop. Sinks decide what to keep.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::{Phase, SessionType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub session_type: SessionType,
    /// `None` for Pomodoro breaks.
    pub phase: Option<Phase>,
    pub elapsed_secs: u64,
    pub skipped: bool,
    pub recorded_at: DateTime<Utc>,
}

pub trait StatsSink: Send + Sync {
    fn record_phase(&self, record: PhaseRecord);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStats;

impl StatsSink for NoStats {
    fn record_phase(&self, _record: PhaseRecord) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub sitting_secs: u64,
    pub standing_secs: u64,
    /// Focus/sit/stand phases that ended, for any reason.
    pub work_phases: u64,
    pub breaks_taken: u64,
    pub breaks_skipped: u64,
    pub break_secs: u64,
}

impl StatsSummary {
    pub fn add(&mut self, record: &PhaseRecord) {
        match (record.session_type, record.phase) {
            (SessionType::Focus, phase) => {
                match phase {
                    Some(Phase::Standing) => self.standing_secs += record.elapsed_secs,
                    _ => self.sitting_secs += record.elapsed_secs,
                }
                self.work_phases += 1;
            }
            (SessionType::ShortBreak | SessionType::LongBreak, _) => {
                self.break_secs += record.elapsed_secs;
                if record.skipped {
                    self.breaks_skipped += 1;
                } else {
                    self.breaks_taken += 1;
                }
            }
        }
    }

    /// Share of tracked work time spent standing, 0.0 .. 1.0.
    pub fn standing_ratio(&self) -> f64 {
        let total = self.sitting_secs + self.standing_secs;
        if total == 0 {
            return 0.0;
        }
        self.standing_secs as f64 / total as f64
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryStats {
    records: Mutex<Vec<PhaseRecord>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PhaseRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn summary(&self) -> StatsSummary {
        let mut summary = StatsSummary::default();
        for record in self.records.lock().unwrap_or_else(|e| e.into_inner()).iter() {
            summary.add(record);
        }
        summary
    }
}

impl StatsSink for MemoryStats {
    fn record_phase(&self, record: PhaseRecord) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(record);
    }
}
