//! Session scheduler.
//!
//! A deadline-based state machine alternating work and rest. It has no
//! internal thread: the caller invokes [`SessionScheduler::tick`] about once
//! a second and the scheduler compares the clock against its deadline.
//!
//! ## States
//!
//! ```text
//! Stopped -> Running <-> Paused -> Stopped
//!               |          ^
//!               +----------+  (phase ended, auto-start off)
//! ```
//!
//! Every guard violation is a silent no-op; nothing here returns an error.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast;

use super::messages;
use super::state::{Intervals, Phase, SchedulerState, SessionType};
use crate::calendar::{CalendarOracle, NeverBusy};
use crate::clock::Clock;
use crate::events::Event;
use crate::notify::{Notification, NotificationKind, Outbox};
use crate::persistence::{NoPersistence, PersistenceSink};
use crate::stats::{NoStats, PhaseRecord, StatsSink};

const EVENT_CAPACITY: usize = 64;

/// Behaviour switches that don't belong to the persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Start the next phase without user action.
    pub auto_start: bool,
    /// Skip notifications while the calendar reports a meeting.
    pub calendar_mute: bool,
    pub notifications_enabled: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            auto_start: true,
            calendar_mute: false,
            notifications_enabled: true,
        }
    }
}

/// Everything the scheduler talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub calendar: Arc<dyn CalendarOracle>,
    pub stats: Arc<dyn StatsSink>,
    pub persistence: Arc<dyn PersistenceSink>,
    pub outbox: Outbox,
}

impl Collaborators {
    /// No calendar, no stats, no persistence.
    pub fn new(clock: Arc<dyn Clock>, outbox: Outbox) -> Self {
        Self {
            clock,
            calendar: Arc::new(NeverBusy),
            stats: Arc::new(NoStats),
            persistence: Arc::new(NoPersistence),
            outbox,
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarOracle>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsSink>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PersistenceSink>) -> Self {
        self.persistence = persistence;
        self
    }
}

/// How a phase came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Deadline,
    Muted,
    Skipped,
    /// User resumed after an auto-start-off park.
    Manual,
}

pub struct SessionScheduler {
    state: SchedulerState,
    options: SchedulerOptions,
    deps: Collaborators,
    events: broadcast::Sender<Event>,
    /// Bumped on every start/stop so stale timers can tell they are stale.
    generation: u64,
}

impl SessionScheduler {
    pub fn new(
        intervals: Intervals,
        pomodoro_enabled: bool,
        options: SchedulerOptions,
        deps: Collaborators,
    ) -> Self {
        Self::from_parts(SchedulerState::idle(intervals, pomodoro_enabled), options, deps)
    }

    /// Rebuild from a persisted snapshot. Inconsistent snapshots are
    /// discarded in favour of a stopped scheduler with the same settings.
    pub fn restore(state: SchedulerState, options: SchedulerOptions, deps: Collaborators) -> Self {
        let state = if state.is_consistent() {
            state
        } else {
            tracing::warn!("discarding inconsistent scheduler snapshot");
            SchedulerState::idle(state.intervals, state.pomodoro_enabled)
        };
        Self::from_parts(state, options, deps)
    }

    fn from_parts(state: SchedulerState, options: SchedulerOptions, deps: Collaborators) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state,
            options,
            deps,
            events,
            generation: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused
    }

    pub fn is_awaiting_next_phase(&self) -> bool {
        self.state.awaiting_next_phase
    }

    pub fn is_work_period(&self) -> bool {
        self.state.is_work_period()
    }

    pub fn current_interval_secs(&self) -> u64 {
        self.state.current_interval_secs()
    }

    /// Time left in the current phase. Zero when stopped.
    pub fn remaining(&self) -> chrono::Duration {
        if !self.state.is_running {
            return chrono::Duration::zero();
        }
        if self.state.is_paused {
            let ms = self.state.remaining_when_paused_ms.unwrap_or(0);
            return chrono::Duration::milliseconds(ms.max(0));
        }
        match self.state.next_deadline {
            Some(deadline) => (deadline - self.now()).max(chrono::Duration::zero()),
            None => chrono::Duration::zero(),
        }
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn progress(&self) -> f64 {
        let total = self.state.current_interval_secs() as f64;
        if !self.state.is_running || total == 0.0 {
            return 0.0;
        }
        let remaining = self.remaining().num_milliseconds() as f64 / 1000.0;
        (1.0 - remaining / total).clamp(0.0, 1.0)
    }

    /// Short menu-bar text, e.g. `Standing · 12:04`.
    pub fn display_label(&self) -> String {
        if !self.state.is_running {
            return "Not running".to_string();
        }
        if self.state.awaiting_next_phase {
            let next = self.state.next_step();
            let label = if self.state.pomodoro_enabled {
                next.session_type.label()
            } else {
                next.phase.label()
            };
            return format!("Ready: {label}");
        }

        let label = if self.state.pomodoro_enabled {
            match self.state.current_session_type {
                SessionType::Focus => format!("Focus ({})", self.state.current_phase.label()),
                other => other.label().to_string(),
            }
        } else {
            self.state.current_phase.label().to_string()
        };
        let secs = (self.remaining().num_milliseconds() + 999) / 1000;
        let clock = format!("{:02}:{:02}", secs / 60, secs % 60);
        if self.state.is_paused {
            format!("{label} (paused) · {clock}")
        } else {
            format!("{label} · {clock}")
        }
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Replace stored intervals; the running deadline is left alone.
    /// Rejected if a sit/stand interval is out of range, or a Pomodoro
    /// interval is out of range while Pomodoro mode is on.
    pub fn set_intervals(&mut self, intervals: Intervals) {
        if !intervals.simple_valid() || (self.state.pomodoro_enabled && !intervals.pomodoro_valid()) {
            tracing::debug!(?intervals, "ignoring invalid intervals");
            return;
        }
        self.state.intervals = intervals;
        self.persist();
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a session, optionally overriding the stored sit/stand intervals
    /// (seconds).
    pub fn start(&mut self, sitting_secs: Option<u64>, standing_secs: Option<u64>) {
        let mut intervals = self.state.intervals;
        if let Some(secs) = sitting_secs {
            intervals.sitting_secs = secs;
        }
        if let Some(secs) = standing_secs {
            intervals.standing_secs = secs;
        }
        if !intervals.simple_valid() {
            tracing::debug!(?intervals, "start ignored: sit/stand interval out of range");
            return;
        }
        if self.state.pomodoro_enabled && !intervals.pomodoro_valid() {
            tracing::debug!(?intervals, "start ignored: pomodoro interval out of range");
            return;
        }
        let now = self.now();
        let first = if self.state.pomodoro_enabled {
            intervals.focus_secs
        } else {
            intervals.sitting_secs
        };
        let Some(deadline) = checked_after(now, first) else {
            tracing::debug!(?intervals, %now, "start ignored: deadline not representable");
            return;
        };

        self.generation = self.generation.wrapping_add(1);
        let state = &mut self.state;
        state.intervals = intervals;
        state.is_running = true;
        state.is_paused = false;
        state.awaiting_next_phase = false;
        state.remaining_when_paused_ms = None;
        state.paused_at = None;
        state.paused_ms_in_phase = 0;
        state.current_phase = Phase::Sitting;
        state.current_session_type = SessionType::Focus;
        state.phase_started_at = Some(now);
        state.next_deadline = Some(deadline);

        tracing::info!(
            phase = ?state.current_phase,
            session = ?state.current_session_type,
            pomodoro = state.pomodoro_enabled,
            %deadline,
            "session started"
        );
        self.emit(Event::SessionStarted {
            phase: self.state.current_phase,
            session_type: self.state.current_session_type,
            pomodoro_enabled: self.state.pomodoro_enabled,
            deadline,
            at: now,
        });
        self.persist();
    }

    /// End the session, recording the partial phase, and return to the
    /// stopped baseline.
    pub fn stop(&mut self) {
        if !self.state.is_running {
            tracing::debug!("stop ignored: not running");
            return;
        }
        let now = self.now();
        if !self.state.awaiting_next_phase {
            self.record_current(now, false);
        }
        self.generation = self.generation.wrapping_add(1);
        self.state = SchedulerState::idle(self.state.intervals, self.state.pomodoro_enabled);

        tracing::info!("session stopped");
        self.emit(Event::SessionStopped { at: now });
        self.persist();
    }

    pub fn pause(&mut self) {
        if !self.state.is_running || self.state.is_paused {
            tracing::debug!(
                running = self.state.is_running,
                paused = self.state.is_paused,
                "pause ignored"
            );
            return;
        }
        let now = self.now();
        let remaining_ms = self.pause_at(now);
        self.emit(Event::Paused { remaining_ms, at: now });
        self.persist();
    }

    pub fn resume(&mut self) {
        if !self.state.is_running || !self.state.is_paused {
            tracing::debug!(
                running = self.state.is_running,
                paused = self.state.is_paused,
                "resume ignored"
            );
            return;
        }
        let now = self.now();
        let remaining_ms = self.state.remaining_when_paused_ms.take().unwrap_or(0).max(0);
        if let Some(paused_at) = self.state.paused_at.take() {
            self.state.paused_ms_in_phase += (now - paused_at).num_milliseconds().max(0);
        }
        self.state.is_paused = false;

        if self.state.awaiting_next_phase {
            self.state.awaiting_next_phase = false;
            self.switch_phase(now, now, Ending::Manual);
        } else {
            let deadline = now
                .checked_add_signed(TimeDelta::milliseconds(remaining_ms))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.state.next_deadline = Some(deadline);
            self.emit(Event::Resumed { deadline, at: now });
        }
        self.persist();
    }

    /// Stop then start with the stored intervals.
    pub fn restart(&mut self) {
        if !self.state.intervals.simple_valid() {
            tracing::debug!("restart ignored: non-positive sit/stand interval");
            return;
        }
        self.stop();
        self.start(None, None);
    }

    /// End the current phase now, without a notification.
    pub fn skip_phase(&mut self) {
        if !self.state.is_running {
            tracing::debug!("skip ignored: not running");
            return;
        }
        if self.state.awaiting_next_phase {
            // The finished phase is already recorded; skipping just starts the next one.
            self.resume();
            return;
        }
        if self.state.is_paused {
            self.resume();
        }
        let now = self.now();
        let skipped = self.state.pomodoro_enabled && self.state.current_session_type.is_break();
        self.record_current(now, skipped);
        self.switch_phase(now, now, Ending::Skipped);
        self.persist();
    }

    /// Call about once a second. Returns `true` if a phase ended.
    pub fn tick(&mut self) -> bool {
        if !self.state.is_running || self.state.is_paused {
            return false;
        }
        let Some(deadline) = self.state.next_deadline else {
            return false;
        };
        let now = self.now();
        if now < deadline {
            return false;
        }
        self.fire(now, deadline);
        true
    }

    pub fn set_pomodoro_mode(&mut self, enabled: bool) {
        if self.state.pomodoro_enabled == enabled {
            return;
        }
        if enabled && !self.state.intervals.pomodoro_valid() {
            tracing::debug!("pomodoro mode ignored: non-positive pomodoro interval");
            return;
        }
        let now = self.now();
        let state = &mut self.state;
        state.pomodoro_enabled = enabled;
        state.current_session_type = SessionType::Focus;
        if enabled {
            state.completed_focus_sessions = 0;
        } else {
            state.current_phase = Phase::Sitting;
        }
        // Remaining time in the old mode is dropped, not pro-rated.
        if state.is_running && !state.is_paused {
            state.next_deadline = Some(after(now, state.current_interval_secs()));
            state.phase_started_at = Some(now);
            state.paused_ms_in_phase = 0;
        }

        tracing::info!(pomodoro = enabled, "mode changed");
        self.emit(Event::ModeChanged {
            pomodoro_enabled: enabled,
            at: now,
        });
        self.persist();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn fire(&mut self, now: DateTime<Utc>, deadline: DateTime<Utc>) {
        if self.options.calendar_mute && self.deps.calendar.is_currently_busy() {
            tracing::info!(phase = ?self.state.current_phase, "phase ended during a meeting, switching silently");
            self.record_current(now, false);
            self.switch_phase(deadline, now, Ending::Muted);
            self.persist();
            return;
        }

        if self.options.notifications_enabled {
            let msg = messages::phase_transition(&self.state, self.options.auto_start);
            self.deps.outbox.send(Notification::new(
                NotificationKind::PhaseTransition,
                msg.title,
                msg.body,
                now,
            ));
        }

        self.record_current(now, false);

        if self.options.auto_start {
            self.switch_phase(deadline, now, Ending::Deadline);
        } else {
            self.pause_at(now);
            self.state.awaiting_next_phase = true;
            let next = self.state.next_step();
            tracing::info!(next_phase = ?next.phase, next_session = ?next.session_type, "phase ended, awaiting user");
            self.emit(Event::AwaitingStart {
                phase: next.phase,
                session_type: next.session_type,
                at: now,
            });
        }
        self.persist();
    }

    /// Advance to the next phase. The new deadline counts from `base`
    /// (the old deadline for timer-driven switches) unless that would
    /// already be in the past.
    fn switch_phase(&mut self, base: DateTime<Utc>, now: DateTime<Utc>, ending: Ending) {
        let from_phase = self.state.current_phase;
        let from_session = self.state.current_session_type;
        let next = self.state.next_step();
        let mut start = base;
        if after(start, next.interval_secs) <= now {
            start = now;
        }
        let deadline = after(start, next.interval_secs);

        let state = &mut self.state;
        state.current_phase = next.phase;
        state.current_session_type = next.session_type;
        state.completed_focus_sessions = next.completed_focus_sessions;
        state.next_deadline = Some(deadline);
        state.phase_started_at = Some(start);
        state.paused_ms_in_phase = 0;
        state.paused_at = None;
        state.remaining_when_paused_ms = None;

        tracing::info!(
            from = ?from_phase,
            to = ?next.phase,
            session = ?next.session_type,
            completed = next.completed_focus_sessions,
            ?ending,
            "phase switched"
        );
        self.emit(Event::PhaseChanged {
            from_phase,
            from_session,
            phase: next.phase,
            session_type: next.session_type,
            completed_focus_sessions: next.completed_focus_sessions,
            deadline,
            skipped: ending == Ending::Skipped,
            muted: ending == Ending::Muted,
            at: now,
        });
    }

    fn pause_at(&mut self, now: DateTime<Utc>) -> i64 {
        let remaining_ms = self
            .state
            .next_deadline
            .map(|d| (d - now).num_milliseconds().max(0))
            .unwrap_or(0);
        self.state.remaining_when_paused_ms = Some(remaining_ms);
        self.state.paused_at = Some(now);
        self.state.is_paused = true;
        remaining_ms
    }

    fn record_current(&self, now: DateTime<Utc>, skipped: bool) {
        self.deps.stats.record_phase(PhaseRecord {
            session_type: self.state.current_session_type,
            phase: self.state.recorded_phase(),
            elapsed_secs: self.elapsed_in_phase(now),
            skipped,
            recorded_at: now,
        });
    }

    /// Unpaused seconds spent in the current phase.
    fn elapsed_in_phase(&self, now: DateTime<Utc>) -> u64 {
        let Some(started) = self.state.phase_started_at else {
            return 0;
        };
        let mut ms = (now - started).num_milliseconds() - self.state.paused_ms_in_phase;
        if let Some(paused_at) = self.state.paused_at {
            ms -= (now - paused_at).num_milliseconds();
        }
        (ms.max(0) / 1000) as u64
    }

    fn now(&self) -> DateTime<Utc> {
        self.deps.clock.now()
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn persist(&self) {
        self.deps.persistence.save(&self.state);
    }
}

/// `base` plus `secs`, or `None` if that is not a representable instant.
fn checked_after(base: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let delta = TimeDelta::try_seconds(i64::try_from(secs).ok()?)?;
    base.checked_add_signed(delta)
}

/// Like [`checked_after`], saturating at the latest representable instant.
fn after(base: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    checked_after(base, secs).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scheduler::MAX_INTERVAL_SECS;
    use crate::stats::MemoryStats;
    use chrono::TimeZone;
    use std::time::Duration;

    struct Harness {
        clock: ManualClock,
        stats: Arc<MemoryStats>,
        rx: tokio::sync::mpsc::UnboundedReceiver<Notification>,
        scheduler: SessionScheduler,
    }

    fn harness(pomodoro: bool, options: SchedulerOptions) -> Harness {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap());
        let stats = Arc::new(MemoryStats::new());
        let (outbox, rx) = Outbox::channel();
        let deps = Collaborators::new(Arc::new(clock.clone()), outbox).with_stats(stats.clone());
        let scheduler = SessionScheduler::new(Intervals::default(), pomodoro, options, deps);
        Harness {
            clock,
            stats,
            rx,
            scheduler,
        }
    }

    fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn start_sets_sitting_and_deadline() {
        let mut h = harness(false, SchedulerOptions::default());
        let t0 = h.clock.now();
        h.scheduler.start(None, None);
        let s = h.scheduler.state();
        assert!(s.is_running && !s.is_paused);
        assert_eq!(s.current_phase, Phase::Sitting);
        assert_eq!(s.next_deadline, Some(t0 + chrono::Duration::minutes(45)));
        assert!(s.is_consistent());
    }

    #[test]
    fn start_with_zero_interval_is_noop() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(Some(0), Some(600));
        assert!(!h.scheduler.is_running());
        assert_eq!(h.scheduler.state().intervals.sitting_secs, 45 * 60);
    }

    #[test]
    fn start_with_oversized_interval_is_noop() {
        let mut h = harness(false, SchedulerOptions::default());
        let mut rx = h.scheduler.subscribe();
        h.scheduler.start(Some(u64::MAX / 4), None);
        h.scheduler.start(Some(MAX_INTERVAL_SECS + 1), None);
        assert!(!h.scheduler.is_running());
        assert_eq!(h.scheduler.state().intervals, Intervals::default());
        assert!(rx.try_recv().is_err());

        h.scheduler.start(Some(MAX_INTERVAL_SECS), None);
        assert!(h.scheduler.is_running());
    }

    #[test]
    fn start_near_end_of_time_is_noop() {
        let mut h = harness(false, SchedulerOptions::default());
        h.clock.set(DateTime::<Utc>::MAX_UTC - chrono::Duration::seconds(10));
        h.scheduler.start(None, None);
        assert!(!h.scheduler.is_running());
    }

    #[test]
    fn restored_oversized_interval_saturates_on_switch() {
        let h = harness(false, SchedulerOptions::default());
        let mut state = SchedulerState::idle(Intervals::default(), false);
        state.intervals.standing_secs = u64::MAX;
        let mut scheduler = SessionScheduler::restore(state, SchedulerOptions::default(), h.scheduler.deps.clone());
        scheduler.state.is_running = true;
        scheduler.state.next_deadline = Some(h.clock.now());
        scheduler.state.phase_started_at = Some(h.clock.now());
        assert!(scheduler.tick());
        assert_eq!(scheduler.state().current_phase, Phase::Standing);
        assert_eq!(scheduler.state().next_deadline, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn stop_when_stopped_is_silent() {
        let mut h = harness(false, SchedulerOptions::default());
        let mut rx = h.scheduler.subscribe();
        let generation = h.scheduler.generation();
        h.scheduler.stop();
        assert!(rx.try_recv().is_err());
        assert_eq!(h.scheduler.generation(), generation);
        assert!(h.stats.records().is_empty());
    }

    #[test]
    fn start_overrides_intervals() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(Some(60), Some(30));
        assert_eq!(h.scheduler.state().intervals.sitting_secs, 60);
        assert_eq!(h.scheduler.state().intervals.standing_secs, 30);
        assert_eq!(h.scheduler.current_interval_secs(), 60);
    }

    #[test]
    fn start_bumps_generation() {
        let mut h = harness(false, SchedulerOptions::default());
        let g = h.scheduler.generation();
        h.scheduler.start(None, None);
        assert_ne!(h.scheduler.generation(), g);
        let g = h.scheduler.generation();
        h.scheduler.stop();
        assert_ne!(h.scheduler.generation(), g);
    }

    #[test]
    fn pause_excludes_time_from_elapsed() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.clock.advance(mins(10));
        h.scheduler.pause();
        h.clock.advance(mins(30));
        h.scheduler.resume();
        h.clock.advance(mins(5));
        h.scheduler.stop();
        let records = h.stats.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].elapsed_secs, 15 * 60);
        assert!(!records[0].skipped);
    }

    #[test]
    fn tick_before_deadline_does_nothing() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.clock.advance(mins(44));
        assert!(!h.scheduler.tick());
        assert_eq!(h.scheduler.state().current_phase, Phase::Sitting);
        assert!(h.rx.try_recv().is_err());
    }

    #[test]
    fn paused_tick_is_noop() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.scheduler.pause();
        h.clock.advance(mins(120));
        assert!(!h.scheduler.tick());
        assert_eq!(h.scheduler.remaining(), chrono::Duration::minutes(45));
    }

    #[test]
    fn auto_start_off_parks_until_resume() {
        let options = SchedulerOptions {
            auto_start: false,
            ..SchedulerOptions::default()
        };
        let mut h = harness(false, options);
        h.scheduler.start(None, None);
        h.clock.advance(mins(45));
        assert!(h.scheduler.tick());

        assert!(h.scheduler.is_paused());
        assert!(h.scheduler.is_awaiting_next_phase());
        assert_eq!(h.scheduler.state().current_phase, Phase::Sitting);
        let n = h.rx.try_recv().unwrap();
        assert!(n.body.contains("when you're ready"));
        assert_eq!(h.scheduler.display_label(), "Ready: Standing");

        // Parked: more time passing fires nothing.
        h.clock.advance(mins(5));
        assert!(!h.scheduler.tick());
        assert!(h.rx.try_recv().is_err());

        let resumed_at = h.clock.now();
        h.scheduler.resume();
        let s = h.scheduler.state();
        assert_eq!(s.current_phase, Phase::Standing);
        assert_eq!(s.next_deadline, Some(resumed_at + chrono::Duration::minutes(15)));
        assert_eq!(h.stats.records().len(), 1);
    }

    #[test]
    fn stop_while_awaiting_does_not_double_record() {
        let options = SchedulerOptions {
            auto_start: false,
            ..SchedulerOptions::default()
        };
        let mut h = harness(false, options);
        h.scheduler.start(None, None);
        h.clock.advance(mins(45));
        h.scheduler.tick();
        h.scheduler.stop();
        assert_eq!(h.stats.records().len(), 1);
    }

    #[test]
    fn skip_focus_in_pomodoro_is_not_marked_skipped() {
        let mut h = harness(true, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.clock.advance(mins(3));
        h.scheduler.skip_phase();
        let r = &h.stats.records()[0];
        assert!(!r.skipped);
        assert_eq!(r.elapsed_secs, 180);
        assert_eq!(h.scheduler.state().current_session_type, SessionType::ShortBreak);
        assert_eq!(h.scheduler.state().completed_focus_sessions, 1);
        assert!(h.rx.try_recv().is_err());
    }

    #[test]
    fn skip_while_paused_resumes_first() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.scheduler.pause();
        h.scheduler.skip_phase();
        assert!(!h.scheduler.is_paused());
        assert_eq!(h.scheduler.state().current_phase, Phase::Standing);
        assert!(h.scheduler.state().is_consistent());
    }

    #[test]
    fn skip_when_stopped_is_noop() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.skip_phase();
        assert_eq!(h.scheduler.state(), &SchedulerState::idle(Intervals::default(), false));
        assert!(h.stats.records().is_empty());
    }

    #[test]
    fn enabling_pomodoro_rebases_deadline() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.clock.advance(mins(20));
        let now = h.clock.now();
        h.scheduler.set_pomodoro_mode(true);
        let s = h.scheduler.state();
        assert_eq!(s.current_session_type, SessionType::Focus);
        assert_eq!(s.completed_focus_sessions, 0);
        assert_eq!(s.next_deadline, Some(now + chrono::Duration::minutes(25)));
    }

    #[test]
    fn disabling_pomodoro_returns_to_sitting() {
        let mut h = harness(true, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.clock.advance(mins(25));
        h.scheduler.tick();
        h.clock.advance(mins(5));
        h.scheduler.tick();
        assert_eq!(h.scheduler.state().current_phase, Phase::Standing);

        let now = h.clock.now();
        h.scheduler.set_pomodoro_mode(false);
        let s = h.scheduler.state();
        assert_eq!(s.current_phase, Phase::Sitting);
        assert_eq!(s.next_deadline, Some(now + chrono::Duration::minutes(45)));
    }

    #[test]
    fn mode_switch_while_paused_keeps_remaining() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.clock.advance(mins(40));
        h.scheduler.pause();
        h.scheduler.set_pomodoro_mode(true);
        assert_eq!(h.scheduler.state().remaining_when_paused_ms, Some(5 * 60 * 1000));
    }

    #[test]
    fn set_mode_unchanged_is_noop() {
        let mut h = harness(false, SchedulerOptions::default());
        let mut rx = h.scheduler.subscribe();
        h.scheduler.set_pomodoro_mode(false);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn restart_resets_to_first_phase() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(None, None);
        h.scheduler.skip_phase();
        assert_eq!(h.scheduler.state().current_phase, Phase::Standing);
        h.scheduler.restart();
        assert!(h.scheduler.is_running());
        assert_eq!(h.scheduler.state().current_phase, Phase::Sitting);
    }

    #[test]
    fn late_tick_catches_up_from_now() {
        let mut h = harness(false, SchedulerOptions::default());
        h.scheduler.start(None, None);
        // Machine slept through two phases.
        h.clock.advance(mins(180));
        let now = h.clock.now();
        assert!(h.scheduler.tick());
        assert_eq!(
            h.scheduler.state().next_deadline,
            Some(now + chrono::Duration::minutes(15))
        );
        assert!(!h.scheduler.tick());
    }

    #[test]
    fn restore_rejects_inconsistent_snapshot() {
        let h = harness(false, SchedulerOptions::default());
        let mut bad = SchedulerState::default();
        bad.is_running = true;
        bad.intervals.sitting_secs = 600;
        let restored = SessionScheduler::restore(bad, SchedulerOptions::default(), h.scheduler.deps.clone());
        assert!(!restored.is_running());
        assert_eq!(restored.state().intervals.sitting_secs, 600);
    }

    #[test]
    fn display_label_formats_remaining() {
        let mut h = harness(false, SchedulerOptions::default());
        assert_eq!(h.scheduler.display_label(), "Not running");
        h.scheduler.start(Some(60 * 12 + 4), None);
        assert_eq!(h.scheduler.display_label(), "Sitting · 12:04");
        h.scheduler.pause();
        assert_eq!(h.scheduler.display_label(), "Sitting (paused) · 12:04");
    }

    #[test]
    fn progress_tracks_elapsed_share() {
        let mut h = harness(false, SchedulerOptions::default());
        assert_eq!(h.scheduler.progress(), 0.0);
        h.scheduler.start(Some(600), None);
        h.clock.advance(Duration::from_secs(150));
        assert!((h.scheduler.progress() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn set_intervals_rejects_zero() {
        let mut h = harness(false, SchedulerOptions::default());
        let mut bad = Intervals::default();
        bad.standing_secs = 0;
        h.scheduler.set_intervals(bad);
        assert_eq!(h.scheduler.state().intervals, Intervals::default());
    }

    #[test]
    fn events_are_broadcast() {
        let mut h = harness(false, SchedulerOptions::default());
        let mut rx = h.scheduler.subscribe();
        h.scheduler.start(None, None);
        h.scheduler.pause();
        assert!(matches!(rx.try_recv().unwrap(), Event::SessionStarted { .. }));
        assert!(matches!(rx.try_recv().unwrap(), Event::Paused { remaining_ms, .. } if remaining_ms == 45 * 60 * 1000));
    }
}
