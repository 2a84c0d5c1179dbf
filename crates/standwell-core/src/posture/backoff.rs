//! Exponential backoff for posture alerts.
//!
//! Each candidate alert is either delivered or suppressed. The wait between
//! delivered alerts grows with every alert the user ignores, and the message
//! text escalates in step:
//!
//! | alerts so far | wait before next | tier |
//! |---------------|------------------|------|
//! | 0             | none             | 0    |
//! | 1             | 60s              | 1    |
//! | 2             | 180s             | 2    |
//! | 3             | 540s             | 3    |
//! | 4+            | 300s             | 4    |
//!
//! Sustained good posture (30 minutes by default) drops back to the top of
//! the table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::signal::PostureQuality;
use crate::notify::{Notification, NotificationKind};

/// Title/body per escalation tier, gentlest first.
pub const MESSAGE_TIERS: [(&str, &str); 5] = [
    (
        "Posture check",
        "You're slouching a little. Sit up tall and relax your shoulders.",
    ),
    (
        "Mind your posture",
        "Still slouching. Roll your shoulders back and lift your chin.",
    ),
    (
        "Posture reminder",
        "Your posture has been poor for a while. Check your chair and screen height.",
    ),
    (
        "Time to reset",
        "Stand up and stretch for a minute, then settle back in.",
    ),
    (
        "Take a break",
        "Poor posture keeps coming back. A short break away from the desk would help.",
    ),
];

const FINAL_TIER: u32 = (MESSAGE_TIERS.len() - 1) as u32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base_secs: u64,
    pub exponent: f64,
    /// Steady wait once the final tier is reached.
    pub max_secs: u64,
    /// Continuous good posture needed to reset the count.
    pub reset_after_secs: u64,
    /// How often the runtime runs [`NotificationBackoffEngine::check_good_posture_reset`].
    pub reset_check_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_secs: 60,
            exponent: 3.0,
            max_secs: 300,
            reset_after_secs: 30 * 60,
            reset_check_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffState {
    pub notification_count: u32,
    pub last_notification_time: Option<DateTime<Utc>>,
    pub good_posture_start_time: Option<DateTime<Utc>>,
    pub is_tracking_good_posture: bool,
}

/// Why an alert was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Posture tracking is off.
    Disabled,
    /// The calendar reports a meeting.
    Meeting,
    /// Still inside the backoff window.
    Backoff { remaining_secs: u64 },
    /// A previous alert has not reported back yet.
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    Deliver(Notification),
    Suppressed(Suppression),
}

#[derive(Debug, Clone)]
pub struct NotificationBackoffEngine {
    config: BackoffConfig,
    state: BackoffState,
    enabled: bool,
    in_flight: Option<Uuid>,
}

impl NotificationBackoffEngine {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            state: BackoffState::default(),
            enabled: false,
            in_flight: None,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    pub fn state(&self) -> &BackoffState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Minimum wait after the `n`-th delivered alert before the next one.
    pub fn backoff_secs(&self, n: u32) -> u64 {
        if n == 0 {
            return 0;
        }
        if n >= FINAL_TIER {
            return self.config.max_secs;
        }
        let secs = self.config.base_secs as f64 * self.config.exponent.powi(n as i32 - 1);
        if secs.is_finite() && secs < u64::MAX as f64 {
            secs.round() as u64
        } else {
            self.config.max_secs
        }
    }

    pub fn tier(&self) -> usize {
        self.state.notification_count.min(FINAL_TIER) as usize
    }

    /// Start fresh: zero count, no history, no tracking.
    pub fn enable_posture_tracking(&mut self) {
        self.state = BackoffState::default();
        self.in_flight = None;
        self.enabled = true;
        tracing::info!("posture tracking enabled");
    }

    /// Counters are kept; disabling is usually transient.
    pub fn disable_posture_tracking(&mut self) {
        self.enabled = false;
        self.state.is_tracking_good_posture = false;
        self.state.good_posture_start_time = None;
        tracing::info!("posture tracking disabled");
    }

    /// Feed a posture-quality transition.
    pub fn on_posture_change(&mut self, quality: PostureQuality, now: DateTime<Utc>) {
        if !self.enabled {
            return;
        }
        match quality {
            PostureQuality::Good => {
                if !self.state.is_tracking_good_posture {
                    self.state.is_tracking_good_posture = true;
                    self.state.good_posture_start_time = Some(now);
                }
            }
            PostureQuality::Poor => {
                self.state.is_tracking_good_posture = false;
                self.state.good_posture_start_time = None;
            }
        }
    }

    /// Decide whether a candidate alert goes out. A `Deliver` decision must be
    /// answered with [`record_delivery`](Self::record_delivery).
    pub fn evaluate_alert(&mut self, now: DateTime<Utc>, meeting: bool) -> AlertDecision {
        let decision = self.decide(now, meeting);
        match &decision {
            AlertDecision::Deliver(n) => {
                self.in_flight = Some(n.id);
                tracing::debug!(tier = self.tier(), "posture alert approved");
            }
            AlertDecision::Suppressed(reason) => {
                tracing::debug!(?reason, "posture alert suppressed");
            }
        }
        decision
    }

    fn decide(&self, now: DateTime<Utc>, meeting: bool) -> AlertDecision {
        if !self.enabled {
            return AlertDecision::Suppressed(Suppression::Disabled);
        }
        if meeting {
            return AlertDecision::Suppressed(Suppression::Meeting);
        }
        if self.in_flight.is_some() {
            return AlertDecision::Suppressed(Suppression::InFlight);
        }
        if let Some(last) = self.state.last_notification_time {
            let wait = self.backoff_secs(self.state.notification_count) as i64;
            let since = (now - last).num_seconds();
            if since < wait {
                return AlertDecision::Suppressed(Suppression::Backoff {
                    remaining_secs: (wait - since) as u64,
                });
            }
        }
        let (title, body) = MESSAGE_TIERS[self.tier()];
        AlertDecision::Deliver(Notification::new(
            NotificationKind::PostureAlert,
            title,
            body,
            now,
        ))
    }

    /// Apply the outcome of an approved alert. Failures leave the count
    /// alone so the same tier is retried at the next opportunity.
    pub fn record_delivery(&mut self, id: Uuid, now: DateTime<Utc>, delivered: bool) {
        if self.in_flight != Some(id) {
            tracing::debug!(%id, "ignoring delivery result for unknown alert");
            return;
        }
        self.in_flight = None;
        if delivered {
            self.state.notification_count = self.state.notification_count.saturating_add(1);
            self.state.last_notification_time = Some(now);
        } else {
            tracing::warn!(tier = self.tier(), "posture alert not delivered, will retry");
        }
    }

    /// Periodic check: reset the backoff after sustained good posture.
    /// Returns `true` if a reset happened.
    pub fn check_good_posture_reset(&mut self, now: DateTime<Utc>) -> bool {
        if !self.enabled || !self.state.is_tracking_good_posture {
            return false;
        }
        let Some(since) = self.state.good_posture_start_time else {
            return false;
        };
        if (now - since).num_seconds() < self.config.reset_after_secs as i64 {
            return false;
        }
        let had_history =
            self.state.notification_count > 0 || self.state.last_notification_time.is_some();
        self.state.notification_count = 0;
        self.state.last_notification_time = None;
        if had_history {
            tracing::info!("sustained good posture, alert backoff reset");
        }
        had_history
    }
}

impl Default for NotificationBackoffEngine {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
