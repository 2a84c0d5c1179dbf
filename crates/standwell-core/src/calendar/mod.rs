//! Meeting-mute support.
//!
//! The core only ever asks one question of the calendar: "is the user busy
//! right now?". The answer must be cheap, so implementations serve it from a
//! cache that is refreshed on its own schedule.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

/// Calendar event metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    /// Marked "free" in the source calendar; never mutes.
    #[serde(default)]
    pub free: bool,
}

impl CalendarEvent {
    pub fn new(id: String, title: String, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            start_time,
            end_time,
            all_day: false,
            free: false,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_time <= at && at < self.end_time
    }

    /// All-day and free events don't count as meetings.
    pub fn blocks(&self) -> bool {
        !self.all_day && !self.free
    }
}

pub trait CalendarOracle: Send + Sync {
    fn is_currently_busy(&self) -> bool;

    /// The meeting currently causing the busy state, if known.
    fn current_event(&self) -> Option<CalendarEvent> {
        None
    }
}

/// Used when calendar access is off or not authorized.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverBusy;

impl CalendarOracle for NeverBusy {
    fn is_currently_busy(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct Cache {
    events: Vec<CalendarEvent>,
    fetched_at: Option<DateTime<Utc>>,
    authorized: bool,
}

/// Event snapshot answered against the current time.
///
/// Whoever owns the calendar source calls [`CachedCalendar::replace_events`]
/// whenever [`CachedCalendar::needs_refresh`] says so.
pub struct CachedCalendar {
    clock: Arc<dyn Clock>,
    refresh_every: Duration,
    cache: RwLock<Cache>,
}

impl CachedCalendar {
    pub const DEFAULT_REFRESH: Duration = Duration::from_secs(15 * 60);

    pub fn new(clock: Arc<dyn Clock>, refresh_every: Duration) -> Self {
        Self {
            clock,
            refresh_every,
            cache: RwLock::new(Cache {
                authorized: true,
                ..Cache::default()
            }),
        }
    }

    pub fn replace_events(&self, events: Vec<CalendarEvent>) {
        let now = self.clock.now();
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.events = events;
        cache.fetched_at = Some(now);
        tracing::debug!(events = cache.events.len(), "calendar cache refreshed");
    }

    /// Access revoked or never granted: behave as if the feature were off.
    pub fn set_authorized(&self, authorized: bool) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.authorized = authorized;
        if !authorized {
            cache.events.clear();
            cache.fetched_at = None;
        }
    }

    pub fn needs_refresh(&self) -> bool {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        if !cache.authorized {
            return false;
        }
        match cache.fetched_at {
            None => true,
            Some(at) => {
                let age = self.clock.now() - at;
                age.to_std().map(|age| age >= self.refresh_every).unwrap_or(false)
            }
        }
    }
}

impl CalendarOracle for CachedCalendar {
    fn is_currently_busy(&self) -> bool {
        self.current_event().is_some()
    }

    fn current_event(&self) -> Option<CalendarEvent> {
        let now = self.clock.now();
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        if !cache.authorized {
            return None;
        }
        cache
            .events
            .iter()
            .find(|e| e.blocks() && e.contains(now))
            .cloned()
    }
}
