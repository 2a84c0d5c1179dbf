//! Sit/stand and Pomodoro session scheduling.

mod messages;
mod session;
mod state;

pub use messages::{phase_transition, TransitionMessage};
pub use session::{Collaborators, SchedulerOptions, SessionScheduler};
pub use state::{Intervals, NextStep, Phase, SchedulerState, SessionType, MAX_INTERVAL_SECS};
