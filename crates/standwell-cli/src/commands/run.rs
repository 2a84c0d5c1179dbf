//! Foreground loop: the scheduler runs in real time, notifications are
//! printed to stdout as JSON lines, and posture readings (`good` / `poor`)
//! are read from stdin.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Args;
use standwell_core::calendar::{CachedCalendar, CalendarOracle, NeverBusy};
use standwell_core::notify::{Notification, NotificationSink, Outbox};
use standwell_core::posture::{NotificationBackoffEngine, PostureNudgeScheduler, PostureQuality};
use standwell_core::storage::Database;
use standwell_core::{Clock, Config, NotifyError, Runtime, SystemClock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const CALENDAR_POLL: Duration = Duration::from_secs(60);
const POSTURE_QUEUE: usize = 32;

#[derive(Args)]
pub struct RunArgs {
    /// Start a session if none is running
    #[arg(long)]
    start: bool,
    /// Enable posture alerts regardless of config
    #[arg(long)]
    posture: bool,
    /// Enable posture nudges regardless of config
    #[arg(long)]
    nudges: bool,
}

/// Prints each notification as one JSON line.
struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let line =
            serde_json::to_string(notification).map_err(|e| NotifyError::Failed(e.to_string()))?;
        println!("{line}");
        Ok(())
    }
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_loop(args))
}

async fn run_loop(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Arc::new(Database::open()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cached = super::calendar_from_config(&config, Arc::clone(&clock));
    let calendar: Arc<dyn CalendarOracle> = match &cached {
        Some(cached) => cached.clone(),
        None => Arc::new(NeverBusy),
    };

    let (outbox, queue) = Outbox::channel();
    let scheduler = super::timer::load_scheduler(
        &config,
        Arc::clone(&db),
        Arc::clone(&clock),
        Some(Arc::clone(&calendar)),
        outbox.clone(),
    );

    let mut posture = NotificationBackoffEngine::new(config.backoff());
    if args.posture || config.posture.enabled {
        posture.enable_posture_tracking();
    }
    let mut nudges = PostureNudgeScheduler::new(config.nudges());
    if args.nudges || config.nudges.enabled {
        nudges.enable();
    }

    let runtime = Runtime::new(scheduler, posture, nudges, calendar, clock, outbox);
    runtime.spawn_delivery(queue, Arc::new(StdoutSink));

    let (posture_tx, posture_rx) = mpsc::channel(POSTURE_QUEUE);
    runtime.listen_posture(posture_rx);
    let stdin_task = tokio::spawn(read_posture(posture_tx));
    let calendar_task = cached.map(|cached| tokio::spawn(poll_calendar(config.clone(), cached)));

    let mut events = runtime.subscribe().await;
    let event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(?event, "scheduler event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "event log lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if args.start && !runtime.scheduler().lock().await.is_running() {
        runtime.start(None, None).await;
    }
    tracing::info!("standwell running, Ctrl-C to exit");

    tokio::signal::ctrl_c().await?;

    stdin_task.abort();
    event_task.abort();
    if let Some(task) = calendar_task {
        task.abort();
    }
    runtime.shutdown();
    let scheduler = runtime.scheduler();
    db.save_snapshot(scheduler.lock().await.state())?;
    Ok(())
}

async fn read_posture(tx: mpsc::Sender<PostureQuality>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match line.parse::<PostureQuality>() {
                Ok(quality) => {
                    if tx.send(quality).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{e}"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("stdin read failed: {e}");
                break;
            }
        }
    }
}

async fn poll_calendar(config: Config, calendar: Arc<CachedCalendar>) {
    let mut ticker = tokio::time::interval(CALENDAR_POLL);
    loop {
        ticker.tick().await;
        if calendar.needs_refresh() {
            super::refresh_calendar(&config, &calendar);
        }
    }
}
