//! Randomly spaced posture reminders.
//!
//! Independent of the alert backoff: nudges only care about being in a work
//! period and not being in a meeting.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::notify::{Notification, NotificationKind};

const NUDGE_TITLE: &str = "Posture nudge";

pub const NUDGE_MESSAGES: [&str; 5] = [
    "Quick check: shoulders relaxed, back straight?",
    "Take a deep breath and sit up tall.",
    "Is your screen at eye level?",
    "Unclench your jaw and drop your shoulders.",
    "Feet flat on the floor, hips back in the chair.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeConfig {
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    /// How often the runtime runs [`PostureNudgeScheduler::check`].
    pub check_secs: u64,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 15 * 60,
            max_interval_secs: 45 * 60,
            check_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeState {
    pub next_nudge_interval_secs: u64,
    pub last_nudge_time: Option<DateTime<Utc>>,
}

pub struct PostureNudgeScheduler {
    config: NudgeConfig,
    state: NudgeState,
    enabled: bool,
    rng: StdRng,
}

impl PostureNudgeScheduler {
    pub fn new(config: NudgeConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic draws, for tests and simulations.
    pub fn with_seed(config: NudgeConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: NudgeConfig, rng: StdRng) -> Self {
        Self {
            config,
            state: NudgeState::default(),
            enabled: false,
            rng,
        }
    }

    pub fn config(&self) -> &NudgeConfig {
        &self.config
    }

    pub fn state(&self) -> &NudgeState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
        self.reroll();
        tracing::info!(next_secs = self.state.next_nudge_interval_secs, "posture nudges enabled");
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Periodic check. Returns the nudge to send, if one is due.
    pub fn check(&mut self, now: DateTime<Utc>, work_period: bool, meeting: bool) -> Option<Notification> {
        if !self.enabled || !work_period {
            return None;
        }
        let due = match self.state.last_nudge_time {
            None => true,
            Some(last) => (now - last).num_seconds() >= self.state.next_nudge_interval_secs as i64,
        };
        if !due {
            return None;
        }
        if meeting {
            tracing::debug!("posture nudge held back during meeting");
            return None;
        }

        let body = NUDGE_MESSAGES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(NUDGE_MESSAGES[0]);
        self.state.last_nudge_time = Some(now);
        self.reroll();
        tracing::debug!(next_secs = self.state.next_nudge_interval_secs, "posture nudge due");
        Some(Notification::new(NotificationKind::PostureNudge, NUDGE_TITLE, body, now))
    }

    fn reroll(&mut self) {
        let lo = self.config.min_interval_secs.min(self.config.max_interval_secs);
        let hi = self.config.min_interval_secs.max(self.config.max_interval_secs);
        self.state.next_nudge_interval_secs = self.rng.gen_range(lo..=hi);
    }
}
