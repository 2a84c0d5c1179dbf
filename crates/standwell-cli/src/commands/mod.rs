pub mod config;
pub mod run;
pub mod stats;
pub mod timer;

use std::sync::Arc;

use standwell_core::calendar::{CachedCalendar, CalendarEvent};
use standwell_core::{Clock, Config};

/// Calendar cache filled from `calendar.events_file`, if configured.
///
/// Returns `None` when meeting mute is off or no events file is set.
pub fn calendar_from_config(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> Option<Arc<CachedCalendar>> {
    if !config.notifications.calendar_mute {
        return None;
    }
    config.calendar.events_file.as_ref()?;
    let refresh = std::time::Duration::from_secs(config.calendar.refresh_minutes.max(1) * 60);
    let calendar = Arc::new(CachedCalendar::new(clock, refresh));
    refresh_calendar(config, &calendar);
    Some(calendar)
}

/// Re-read the events file into the cache. Read errors keep the old events.
pub fn refresh_calendar(config: &Config, calendar: &CachedCalendar) {
    let Some(path) = &config.calendar.events_file else {
        return;
    };
    let events = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| {
            serde_json::from_str::<Vec<CalendarEvent>>(&json).map_err(|e| e.to_string())
        });
    match events {
        Ok(events) => calendar.replace_events(events),
        Err(e) => tracing::warn!(path = %path.display(), "could not read calendar events: {e}"),
    }
}
