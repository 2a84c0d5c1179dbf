use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Sitting,
    Standing,
}

impl Phase {
    pub fn toggled(self) -> Self {
        match self {
            Phase::Sitting => Phase::Standing,
            Phase::Standing => Phase::Sitting,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Sitting => "Sitting",
            Phase::Standing => "Standing",
        }
    }
}

/// Pomodoro sub-state. Simple mode always reports `Focus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn is_break(self) -> bool {
        !matches!(self, SessionType::Focus)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionType::Focus => "Focus",
            SessionType::ShortBreak => "Short Break",
            SessionType::LongBreak => "Long Break",
        }
    }
}

/// Longest accepted interval: one week.
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

fn in_range(secs: u64) -> bool {
    (1..=MAX_INTERVAL_SECS).contains(&secs)
}

/// Configured interval lengths, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervals {
    pub sitting_secs: u64,
    pub standing_secs: u64,
    pub focus_secs: u64,
    pub short_break_secs: u64,
    pub long_break_secs: u64,
    pub intervals_before_long_break: u32,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            sitting_secs: 45 * 60,
            standing_secs: 15 * 60,
            focus_secs: 25 * 60,
            short_break_secs: 5 * 60,
            long_break_secs: 15 * 60,
            intervals_before_long_break: 4,
        }
    }
}

impl Intervals {
    /// Both sit/stand intervals are positive and at most [`MAX_INTERVAL_SECS`].
    pub fn simple_valid(&self) -> bool {
        in_range(self.sitting_secs) && in_range(self.standing_secs)
    }

    /// Every Pomodoro interval is positive and at most [`MAX_INTERVAL_SECS`].
    pub fn pomodoro_valid(&self) -> bool {
        in_range(self.focus_secs) && in_range(self.short_break_secs) && in_range(self.long_break_secs)
    }

    /// Focus sessions per long break; zero is treated as one.
    pub fn long_break_every(&self) -> u32 {
        self.intervals_before_long_break.max(1)
    }
}

/// Persistable scheduler snapshot.
///
/// Exactly one of these holds:
/// - not running
/// - running, not paused, `next_deadline` set
/// - running, paused, `remaining_when_paused_ms` set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub is_running: bool,
    pub is_paused: bool,
    pub pomodoro_enabled: bool,
    pub current_phase: Phase,
    pub current_session_type: SessionType,
    pub next_deadline: Option<DateTime<Utc>>,
    pub remaining_when_paused_ms: Option<i64>,
    pub completed_focus_sessions: u32,
    pub intervals: Intervals,
    /// Phase finished, waiting for the user to start the next one.
    #[serde(default)]
    pub awaiting_next_phase: bool,
    /// When the current phase began.
    #[serde(default)]
    pub phase_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    /// Paused time accumulated within the current phase.
    #[serde(default)]
    pub paused_ms_in_phase: i64,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::idle(Intervals::default(), false)
    }
}

impl SchedulerState {
    /// The "not running" baseline.
    pub fn idle(intervals: Intervals, pomodoro_enabled: bool) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            pomodoro_enabled,
            current_phase: Phase::Sitting,
            current_session_type: SessionType::Focus,
            next_deadline: None,
            remaining_when_paused_ms: None,
            completed_focus_sessions: 0,
            intervals,
            awaiting_next_phase: false,
            phase_started_at: None,
            paused_at: None,
            paused_ms_in_phase: 0,
        }
    }

    pub fn is_consistent(&self) -> bool {
        match (self.is_running, self.is_paused) {
            (false, paused) => !paused,
            (true, false) => self.next_deadline.is_some() && !self.awaiting_next_phase,
            (true, true) => self.remaining_when_paused_ms.is_some(),
        }
    }

    /// Length of the phase/session currently in effect, in seconds.
    pub fn current_interval_secs(&self) -> u64 {
        if self.pomodoro_enabled {
            match self.current_session_type {
                SessionType::Focus => self.intervals.focus_secs,
                SessionType::ShortBreak => self.intervals.short_break_secs,
                SessionType::LongBreak => self.intervals.long_break_secs,
            }
        } else {
            match self.current_phase {
                Phase::Sitting => self.intervals.sitting_secs,
                Phase::Standing => self.intervals.standing_secs,
            }
        }
    }

    /// Simple mode is always work; Pomodoro only during Focus.
    pub fn is_work_period(&self) -> bool {
        !self.pomodoro_enabled || self.current_session_type == SessionType::Focus
    }

    /// What the phase switch would move to, without mutating anything.
    pub fn next_step(&self) -> NextStep {
        if !self.pomodoro_enabled {
            let phase = self.current_phase.toggled();
            let interval_secs = match phase {
                Phase::Sitting => self.intervals.sitting_secs,
                Phase::Standing => self.intervals.standing_secs,
            };
            return NextStep {
                phase,
                session_type: SessionType::Focus,
                interval_secs,
                completed_focus_sessions: self.completed_focus_sessions,
            };
        }

        match self.current_session_type {
            SessionType::Focus => {
                let completed = self.completed_focus_sessions.saturating_add(1);
                let (session_type, interval_secs) =
                    if completed % self.intervals.long_break_every() == 0 {
                        (SessionType::LongBreak, self.intervals.long_break_secs)
                    } else {
                        (SessionType::ShortBreak, self.intervals.short_break_secs)
                    };
                NextStep {
                    phase: self.current_phase,
                    session_type,
                    interval_secs,
                    completed_focus_sessions: completed,
                }
            }
            SessionType::ShortBreak | SessionType::LongBreak => NextStep {
                phase: self.current_phase.toggled(),
                session_type: SessionType::Focus,
                interval_secs: self.intervals.focus_secs,
                completed_focus_sessions: self.completed_focus_sessions,
            },
        }
    }

    /// Phase to attach to a stats record: breaks in Pomodoro mode have none.
    pub fn recorded_phase(&self) -> Option<Phase> {
        if self.pomodoro_enabled && self.current_session_type.is_break() {
            None
        } else {
            Some(self.current_phase)
        }
    }
}

/// Result of a phase switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextStep {
    pub phase: Phase,
    pub session_type: SessionType,
    pub interval_secs: u64,
    pub completed_focus_sessions: u32,
}
