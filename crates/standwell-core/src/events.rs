use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::{Phase, SessionType};

/// Every scheduler state change produces an Event.
/// The UI subscribes instead of polling shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        phase: Phase,
        session_type: SessionType,
        pomodoro_enabled: bool,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    SessionStopped {
        at: DateTime<Utc>,
    },
    Paused {
        remaining_ms: i64,
        at: DateTime<Utc>,
    },
    Resumed {
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from_phase: Phase,
        from_session: SessionType,
        phase: Phase,
        session_type: SessionType,
        completed_focus_sessions: u32,
        deadline: DateTime<Utc>,
        /// Ended by the user rather than the timer.
        skipped: bool,
        /// Ended while the calendar reported a meeting; no notification sent.
        muted: bool,
        at: DateTime<Utc>,
    },
    /// Phase ended with auto-start off; parked until the user resumes.
    AwaitingStart {
        phase: Phase,
        session_type: SessionType,
        at: DateTime<Utc>,
    },
    ModeChanged {
        pomodoro_enabled: bool,
        at: DateTime<Utc>,
    },
}
