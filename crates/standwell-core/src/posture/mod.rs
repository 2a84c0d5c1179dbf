//! Posture alerting: backoff-governed alerts and random nudges.

mod backoff;
mod nudge;
mod signal;

pub use backoff::{
    AlertDecision, BackoffConfig, BackoffState, NotificationBackoffEngine, Suppression,
    MESSAGE_TIERS,
};
pub use nudge::{NudgeConfig, NudgeState, PostureNudgeScheduler, NUDGE_MESSAGES};
pub use signal::PostureQuality;
