//! # Standwell Core Library
//!
//! This library provides the core logic for Standwell, a sit/stand and
//! posture reminder. It follows a CLI-first philosophy: every operation is
//! available through the `standwell` binary, and any desktop shell is a thin
//! layer over the same core.
//!
//! ## Architecture
//!
//! - **Scheduler**: A deadline-based state machine alternating sitting and
//!   standing (or Pomodoro focus and breaks). The caller ticks it about once
//!   a second.
//! - **Posture**: Exponential backoff for poor-posture alerts and randomly
//!   spaced posture nudges.
//! - **Storage**: SQLite-based phase statistics and state snapshot, and
//!   TOML-based configuration.
//! - **Runtime**: tokio tasks driving the state machines in real time.
//!
//! ## Key Components
//!
//! - [`SessionScheduler`]: Core session state machine
//! - [`NotificationBackoffEngine`]: Posture alert gating
//! - [`PostureNudgeScheduler`]: Random posture reminders
//! - [`Database`]: Phase statistics and snapshot persistence
//! - [`Config`]: Application configuration management

pub mod calendar;
pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod persistence;
pub mod posture;
pub mod runtime;
pub mod scheduler;
pub mod stats;
pub mod storage;

pub use calendar::{CachedCalendar, CalendarEvent, CalendarOracle, NeverBusy};
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use error::{ConfigError, CoreError, NotifyError, Result};
pub use events::Event;
pub use notify::{Notification, NotificationKind, NotificationSink, Outbox};
pub use persistence::{NoPersistence, PersistenceSink};
pub use posture::{
    AlertDecision, BackoffConfig, NotificationBackoffEngine, NudgeConfig, PostureNudgeScheduler,
    PostureQuality, Suppression,
};
pub use runtime::Runtime;
pub use scheduler::{
    Collaborators, Intervals, Phase, SchedulerOptions, SchedulerState, SessionScheduler,
    SessionType,
};
pub use stats::{MemoryStats, NoStats, PhaseRecord, StatsSink, StatsSummary};
pub use storage::{Config, Database};
