use std::sync::Arc;

use clap::{Subcommand, ValueEnum};
use serde::Serialize;
use standwell_core::calendar::CalendarOracle;
use standwell_core::notify::{Notification, Outbox};
use standwell_core::scheduler::{Collaborators, SchedulerState, SessionScheduler};
use standwell_core::storage::Database;
use standwell_core::{Clock, Config, SystemClock};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session
    Start {
        /// Sitting interval in minutes (overrides config)
        #[arg(long)]
        sitting: Option<u64>,
        /// Standing interval in minutes (overrides config)
        #[arg(long)]
        standing: Option<u64>,
    },
    /// Stop the session
    Stop,
    /// Pause the running phase
    Pause,
    /// Resume a paused phase
    Resume,
    /// End the current phase now
    Skip,
    /// Stop and start again
    Restart,
    /// Print current timer state as JSON
    Status,
    /// Switch between simple sit/stand and Pomodoro
    Mode {
        #[arg(value_enum)]
        mode: Mode,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Mode {
    Simple,
    Pomodoro,
}

#[derive(Serialize)]
struct TimerSnapshot<'a> {
    label: String,
    remaining_secs: i64,
    progress: f64,
    state: &'a SchedulerState,
    notifications: Vec<Notification>,
}

/// Rebuild the scheduler from the last snapshot, or a fresh one from config.
pub fn load_scheduler(
    config: &Config,
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    calendar: Option<Arc<dyn CalendarOracle>>,
    outbox: Outbox,
) -> SessionScheduler {
    let mut deps = Collaborators::new(clock, outbox)
        .with_stats(db.clone())
        .with_persistence(db.clone());
    if let Some(calendar) = calendar {
        deps = deps.with_calendar(calendar);
    }
    let options = config.scheduler_options();

    let snapshot = match db.load_snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("ignoring unreadable scheduler snapshot: {e}");
            None
        }
    };
    match snapshot {
        Some(state) => {
            let mut scheduler = SessionScheduler::restore(state, options, deps);
            // A running session keeps the intervals it was started with.
            if !scheduler.is_running() {
                scheduler.set_intervals(config.intervals());
            }
            scheduler
        }
        None => SessionScheduler::new(
            config.intervals(),
            config.schedule.pomodoro_enabled,
            options,
            deps,
        ),
    }
}

fn minutes_to_secs(minutes: Option<u64>) -> Result<Option<u64>, String> {
    minutes
        .map(|m| m.checked_mul(60).ok_or(format!("interval of {m} minutes is too long")))
        .transpose()
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    let db = Arc::new(Database::open()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let calendar = super::calendar_from_config(&config, Arc::clone(&clock))
        .map(|c| c as Arc<dyn CalendarOracle>);
    let (outbox, mut queue) = Outbox::channel();
    let mut scheduler = load_scheduler(&config, Arc::clone(&db), clock, calendar, outbox);

    // Catch up on a deadline that passed while nothing was running.
    scheduler.tick();

    match action {
        TimerAction::Start { sitting, standing } => {
            scheduler.start(minutes_to_secs(sitting)?, minutes_to_secs(standing)?);
        }
        TimerAction::Stop => scheduler.stop(),
        TimerAction::Pause => scheduler.pause(),
        TimerAction::Resume => scheduler.resume(),
        TimerAction::Skip => scheduler.skip_phase(),
        TimerAction::Restart => scheduler.restart(),
        TimerAction::Status => {}
        TimerAction::Mode { mode } => {
            let enabled = matches!(mode, Mode::Pomodoro);
            scheduler.set_pomodoro_mode(enabled);
            if scheduler.state().pomodoro_enabled == enabled {
                config.schedule.pomodoro_enabled = enabled;
                config.save()?;
            }
        }
    }

    let mut notifications = Vec::new();
    while let Ok(n) = queue.try_recv() {
        notifications.push(n);
    }
    let snapshot = TimerSnapshot {
        label: scheduler.display_label(),
        remaining_secs: scheduler.remaining().num_seconds(),
        progress: scheduler.progress(),
        state: scheduler.state(),
        notifications,
    };
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    db.save_snapshot(scheduler.state())?;
    Ok(())
}
