//! Async driver tying the state machines to real time.
//!
//! The state machines are synchronous and clock-driven. [`Runtime`] owns them
//! behind tokio mutexes and runs the periodic work:
//!
//! - scheduler tick, every second
//! - posture nudge check, every [`NudgeConfig::check_secs`]
//! - good-posture reset check, every [`BackoffConfig::reset_check_secs`]
//!
//! The tick and nudge timers are tied to a scheduler generation. Stopping the
//! session aborts them, and a timer that wakes up after its generation has
//! passed exits on its own. The reset check runs whenever posture tracking is
//! enabled, session or not, and exits once tracking is turned off.
//!
//! [`NudgeConfig::check_secs`]: crate::posture::NudgeConfig::check_secs
//! [`BackoffConfig::reset_check_secs`]: crate::posture::BackoffConfig::reset_check_secs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::calendar::CalendarOracle;
use crate::clock::Clock;
use crate::events::Event;
use crate::notify::{Notification, NotificationKind, NotificationSink, Outbox};
use crate::posture::{AlertDecision, NotificationBackoffEngine, PostureNudgeScheduler, PostureQuality};
use crate::scheduler::SessionScheduler;

const TICK_EVERY: Duration = Duration::from_secs(1);

/// Shared handles to everything the runtime drives.
#[derive(Clone)]
struct Shared {
    scheduler: Arc<Mutex<SessionScheduler>>,
    posture: Arc<Mutex<NotificationBackoffEngine>>,
    nudges: Arc<Mutex<PostureNudgeScheduler>>,
    calendar: Arc<dyn CalendarOracle>,
    clock: Arc<dyn Clock>,
    outbox: Outbox,
}

pub struct Runtime {
    shared: Shared,
    nudge_every: Duration,
    reset_every: Duration,
    timers: std::sync::Mutex<Vec<JoinHandle<()>>>,
    reset_timer: std::sync::Mutex<Option<JoinHandle<()>>>,
    background: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Runtime {
    /// Wrap the state machines. If the scheduler is already running (a
    /// restored session) its timers start right away, and likewise the reset
    /// check if posture tracking is already on.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        scheduler: SessionScheduler,
        posture: NotificationBackoffEngine,
        nudges: PostureNudgeScheduler,
        calendar: Arc<dyn CalendarOracle>,
        clock: Arc<dyn Clock>,
        outbox: Outbox,
    ) -> Self {
        let running = scheduler.is_running();
        let generation = scheduler.generation();
        let tracking = posture.is_enabled();
        let nudge_every = Duration::from_secs(nudges.config().check_secs.max(1));
        let reset_every = Duration::from_secs(posture.config().reset_check_secs.max(1));
        let runtime = Self {
            shared: Shared {
                scheduler: Arc::new(Mutex::new(scheduler)),
                posture: Arc::new(Mutex::new(posture)),
                nudges: Arc::new(Mutex::new(nudges)),
                calendar,
                clock,
                outbox,
            },
            nudge_every,
            reset_every,
            timers: std::sync::Mutex::new(Vec::new()),
            reset_timer: std::sync::Mutex::new(None),
            background: std::sync::Mutex::new(Vec::new()),
        };
        if running {
            runtime.spawn_timers(generation);
        }
        if tracking {
            runtime.spawn_reset_timer();
        }
        runtime
    }

    pub fn scheduler(&self) -> Arc<Mutex<SessionScheduler>> {
        Arc::clone(&self.shared.scheduler)
    }

    pub fn posture(&self) -> Arc<Mutex<NotificationBackoffEngine>> {
        Arc::clone(&self.shared.posture)
    }

    pub fn nudges(&self) -> Arc<Mutex<PostureNudgeScheduler>> {
        Arc::clone(&self.shared.nudges)
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.scheduler.lock().await.subscribe()
    }

    // ── Session commands ─────────────────────────────────────────────

    pub async fn start(&self, sitting_secs: Option<u64>, standing_secs: Option<u64>) {
        let generation = {
            let mut scheduler = self.shared.scheduler.lock().await;
            let before = scheduler.generation();
            scheduler.start(sitting_secs, standing_secs);
            if scheduler.generation() == before {
                return;
            }
            scheduler.generation()
        };
        self.spawn_timers(generation);
    }

    pub async fn stop(&self) {
        self.shared.scheduler.lock().await.stop();
        self.abort_timers();
    }

    pub async fn pause(&self) {
        self.shared.scheduler.lock().await.pause();
    }

    pub async fn resume(&self) {
        self.shared.scheduler.lock().await.resume();
    }

    pub async fn skip_phase(&self) {
        self.shared.scheduler.lock().await.skip_phase();
    }

    pub async fn restart(&self) {
        let generation = {
            let mut scheduler = self.shared.scheduler.lock().await;
            scheduler.restart();
            scheduler.is_running().then(|| scheduler.generation())
        };
        match generation {
            Some(generation) => self.spawn_timers(generation),
            None => self.abort_timers(),
        }
    }

    pub async fn set_pomodoro_mode(&self, enabled: bool) {
        self.shared.scheduler.lock().await.set_pomodoro_mode(enabled);
    }

    // ── Posture ──────────────────────────────────────────────────────

    /// Turn posture alerts on and start the good-posture reset check.
    pub async fn enable_posture_tracking(&self) {
        self.shared.posture.lock().await.enable_posture_tracking();
        self.spawn_reset_timer();
    }

    pub async fn disable_posture_tracking(&self) {
        self.shared.posture.lock().await.disable_posture_tracking();
        self.abort_reset_timer();
    }

    /// Feed one posture reading. Poor posture produces an alert candidate
    /// that the backoff engine may let through.
    pub async fn posture_changed(&self, quality: PostureQuality) {
        self.shared.posture_changed(quality).await;
    }

    /// Consume posture readings until the sender goes away.
    pub fn listen_posture(&self, mut events: mpsc::Receiver<PostureQuality>) {
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            while let Some(quality) = events.recv().await {
                shared.posture_changed(quality).await;
            }
            tracing::debug!("posture event channel closed");
        });
        self.track_background(handle);
    }

    // ── Delivery ─────────────────────────────────────────────────────

    /// Drain the outbox into `sink`. Posture alert results go back to the
    /// backoff engine.
    pub fn spawn_delivery(
        &self,
        mut queue: mpsc::UnboundedReceiver<Notification>,
        sink: Arc<dyn NotificationSink>,
    ) {
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            while let Some(notification) = queue.recv().await {
                let result = sink.deliver(&notification).await;
                if let Err(e) = &result {
                    tracing::warn!(kind = ?notification.kind, "notification delivery failed: {e}");
                }
                if notification.kind == NotificationKind::PostureAlert {
                    let now = shared.clock.now();
                    shared
                        .posture
                        .lock()
                        .await
                        .record_delivery(notification.id, now, result.is_ok());
                }
            }
            tracing::debug!("notification queue closed");
        });
        self.track_background(handle);
    }

    /// Abort every task this runtime spawned.
    pub fn shutdown(&self) {
        self.abort_timers();
        self.abort_reset_timer();
        let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
        for handle in background.drain(..) {
            handle.abort();
        }
    }

    // ── Timers ───────────────────────────────────────────────────────

    fn spawn_timers(&self, generation: u64) {
        self.abort_timers();
        let handles = vec![
            spawn_periodic(self.shared.clone(), generation, TICK_EVERY, Shared::tick),
            spawn_periodic(self.shared.clone(), generation, self.nudge_every, Shared::check_nudge),
        ];
        tracing::debug!(generation, "session timers started");
        *self.timers.lock().unwrap_or_else(|e| e.into_inner()) = handles;
    }

    fn spawn_reset_timer(&self) {
        let shared = self.shared.clone();
        let every = self.reset_every;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !shared.check_posture_reset().await {
                    tracing::debug!("posture tracking off, reset check exiting");
                    break;
                }
            }
        });
        let previous = self
            .reset_timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn abort_reset_timer(&self) {
        let handle = self.reset_timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn abort_timers(&self) {
        let mut timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        for handle in timers.drain(..) {
            handle.abort();
        }
    }

    fn track_background(&self, handle: JoinHandle<()>) {
        self.background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    async fn is_current(&self, generation: u64) -> bool {
        self.scheduler.lock().await.generation() == generation
    }

    async fn tick(self) {
        self.scheduler.lock().await.tick();
    }

    async fn check_nudge(self) {
        let work_period = {
            let scheduler = self.scheduler.lock().await;
            scheduler.is_running() && !scheduler.is_paused() && scheduler.is_work_period()
        };
        let meeting = self.calendar.is_currently_busy();
        let now = self.clock.now();
        let nudge = self.nudges.lock().await.check(now, work_period, meeting);
        if let Some(nudge) = nudge {
            self.outbox.send(nudge);
        }
    }

    /// Returns `false` once tracking is off.
    async fn check_posture_reset(&self) -> bool {
        let now = self.clock.now();
        let mut posture = self.posture.lock().await;
        if !posture.is_enabled() {
            return false;
        }
        posture.check_good_posture_reset(now);
        true
    }

    async fn posture_changed(&self, quality: PostureQuality) {
        let now = self.clock.now();
        let mut posture = self.posture.lock().await;
        posture.on_posture_change(quality, now);
        if quality != PostureQuality::Poor {
            return;
        }
        let meeting = self.calendar.is_currently_busy();
        if let AlertDecision::Deliver(alert) = posture.evaluate_alert(now, meeting) {
            let id = alert.id;
            if !self.outbox.send(alert) {
                posture.record_delivery(id, now, false);
            }
        }
    }
}

fn spawn_periodic<F, Fut>(shared: Shared, generation: u64, every: Duration, job: F) -> JoinHandle<()>
where
    F: Fn(Shared) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if !shared.is_current(generation).await {
                tracing::debug!(generation, "stale session timer exiting");
                break;
            }
            job(shared.clone()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::calendar::NeverBusy;
    use crate::clock::TokioClock;
    use crate::error::NotifyError;
    use crate::posture::{BackoffConfig, NudgeConfig};
    use crate::scheduler::{Collaborators, Intervals, Phase, SchedulerOptions};
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingSink {
        delivered: std::sync::Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl RecordingSink {
        fn kinds(&self) -> Vec<NotificationKind> {
            self.delivered.lock().unwrap().iter().map(|n| n.kind).collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.delivered.lock().unwrap().push(notification.clone());
            if self.fail {
                Err(NotifyError::Denied)
            } else {
                Ok(())
            }
        }
    }

    /// Meeting state flipped by hand.
    #[derive(Default)]
    struct Meeting(AtomicBool);

    impl CalendarOracle for Meeting {
        fn is_currently_busy(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn short_intervals() -> Intervals {
        Intervals {
            sitting_secs: 60,
            standing_secs: 30,
            ..Intervals::default()
        }
    }

    fn build(
        sink: Arc<RecordingSink>,
        intervals: Intervals,
        posture: NotificationBackoffEngine,
        calendar: Arc<dyn CalendarOracle>,
    ) -> Runtime {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let (outbox, queue) = Outbox::channel();
        let deps = Collaborators::new(Arc::clone(&clock), outbox.clone());
        let scheduler = SessionScheduler::new(intervals, false, SchedulerOptions::default(), deps);
        let runtime = Runtime::new(
            scheduler,
            posture,
            PostureNudgeScheduler::with_seed(NudgeConfig::default(), 11),
            calendar,
            clock,
            outbox,
        );
        runtime.spawn_delivery(queue, sink);
        runtime
    }

    fn runtime_with(sink: Arc<RecordingSink>) -> Runtime {
        build(
            sink,
            short_intervals(),
            NotificationBackoffEngine::new(BackoffConfig::default()),
            Arc::new(NeverBusy),
        )
    }

    fn count_kind(sink: &RecordingSink, kind: NotificationKind) -> usize {
        sink.kinds().into_iter().filter(|k| *k == kind).count()
    }

    #[tokio::test(start_paused = true)]
    async fn timers_drive_phase_changes() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.start(None, None).await;

        tokio::time::sleep(Duration::from_secs(62)).await;
        {
            let scheduler = runtime.scheduler();
            let scheduler = scheduler.lock().await;
            assert_eq!(scheduler.state().current_phase, Phase::Standing);
        }
        assert_eq!(sink.kinds(), vec![NotificationKind::PhaseTransition]);

        tokio::time::sleep(Duration::from_secs(31)).await;
        let scheduler = runtime.scheduler();
        assert_eq!(scheduler.lock().await.state().current_phase, Phase::Sitting);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_timers() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.start(None, None).await;
        runtime.stop().await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        let scheduler = runtime.scheduler();
        assert!(!scheduler.lock().await.is_running());
        assert!(sink.kinds().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delivered_alert_advances_backoff() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.enable_posture_tracking().await;

        runtime.posture_changed(PostureQuality::Poor).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runtime.posture().lock().await.state().notification_count, 1);

        // Inside the 60s window: suppressed.
        runtime.posture_changed(PostureQuality::Poor).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.kinds(), vec![NotificationKind::PostureAlert]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_alert_keeps_count() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.enable_posture_tracking().await;

        runtime.posture_changed(PostureQuality::Poor).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runtime.posture().lock().await.state().notification_count, 0);

        // Nothing in flight any more, so the same tier is retried.
        runtime.posture_changed(PostureQuality::Poor).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.kinds().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn posture_listener_consumes_channel() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.enable_posture_tracking().await;

        let (tx, rx) = mpsc::channel(8);
        runtime.listen_posture(rx);
        tx.send(PostureQuality::Good).await.unwrap();
        tx.send(PostureQuality::Poor).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.kinds(), vec![NotificationKind::PostureAlert]);
    }

    #[tokio::test(start_paused = true)]
    async fn nudges_only_while_working() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.nudges().lock().await.enable();

        // Stopped: nudges are held.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(sink.kinds().is_empty());

        runtime.start(None, None).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.kinds(), vec![NotificationKind::PostureNudge]);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_good_posture_resets_backoff() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.enable_posture_tracking().await;
        runtime.posture_changed(PostureQuality::Poor).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runtime.posture().lock().await.state().notification_count, 1);

        runtime.start(None, None).await;
        runtime.posture_changed(PostureQuality::Good).await;
        tokio::time::sleep(Duration::from_secs(30 * 60 + 31)).await;
        assert_eq!(runtime.posture().lock().await.state().notification_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn good_posture_resets_backoff_without_a_session() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.enable_posture_tracking().await;
        runtime.posture_changed(PostureQuality::Poor).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runtime.posture().lock().await.state().notification_count, 1);

        runtime.posture_changed(PostureQuality::Good).await;
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(runtime.posture().lock().await.state().notification_count, 0);
        assert!(!runtime.scheduler().lock().await.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn tracking_enabled_before_construction_starts_reset_check() {
        let sink = Arc::new(RecordingSink::default());
        let mut posture = NotificationBackoffEngine::new(BackoffConfig::default());
        posture.enable_posture_tracking();
        let runtime = build(sink, short_intervals(), posture, Arc::new(NeverBusy));

        runtime.posture_changed(PostureQuality::Poor).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        runtime.posture_changed(PostureQuality::Good).await;
        tokio::time::sleep(Duration::from_secs(31 * 60)).await;
        assert_eq!(runtime.posture().lock().await.state().notification_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_tracking_stops_reset_check() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(sink);
        runtime.enable_posture_tracking().await;
        assert!(runtime.reset_timer.lock().unwrap().is_some());
        runtime.disable_posture_tracking().await;
        assert!(runtime.reset_timer.lock().unwrap().is_none());

        // Turned off behind the runtime's back: the task notices and exits.
        runtime.enable_posture_tracking().await;
        runtime.posture().lock().await.disable_posture_tracking();
        tokio::time::sleep(Duration::from_secs(31)).await;
        let finished = runtime
            .reset_timer
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| h.is_finished());
        assert_eq!(finished, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn nudge_held_during_meeting() {
        let sink = Arc::new(RecordingSink::default());
        let meeting = Arc::new(Meeting::default());
        let intervals = Intervals {
            sitting_secs: 45 * 60,
            ..short_intervals()
        };
        let runtime = build(
            Arc::clone(&sink),
            intervals,
            NotificationBackoffEngine::new(BackoffConfig::default()),
            meeting.clone(),
        );
        runtime.nudges().lock().await.enable();
        meeting.0.store(true, Ordering::SeqCst);

        runtime.start(None, None).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count_kind(&sink, NotificationKind::PostureNudge), 0);

        meeting.0.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count_kind(&sink, NotificationKind::PostureNudge), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_exits_without_touching_new_session() {
        let runtime = runtime_with(Arc::new(RecordingSink::default()));
        runtime.start(None, None).await;
        let old = runtime.scheduler().lock().await.generation();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let stale = spawn_periodic(runtime.shared.clone(), old, Duration::from_secs(1), move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let before = runs.load(Ordering::SeqCst);
        assert!(before >= 1);

        runtime.restart().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), before);
        assert!(stale.is_finished());
        assert!(runtime.scheduler().lock().await.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_then_start_runs_one_set_of_timers() {
        let sink = Arc::new(RecordingSink::default());
        let runtime = runtime_with(Arc::clone(&sink));
        runtime.start(None, None).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        runtime.stop().await;
        runtime.start(None, None).await;
        runtime.start(None, None).await;
        assert_eq!(runtime.timers.lock().unwrap().len(), 2);

        // Only the latest start's deadline fires.
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(sink.kinds().is_empty());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.kinds(), vec![NotificationKind::PhaseTransition]);
    }
}
