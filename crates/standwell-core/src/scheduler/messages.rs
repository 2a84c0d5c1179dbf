//! Phase-transition notification text.
//!
//! Content depends on mode, the phase or session that just ended, what comes
//! next, and whether the next phase starts on its own.

use super::state::{Phase, SchedulerState, SessionType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionMessage {
    pub title: String,
    pub body: String,
}

fn minutes(secs: u64) -> u64 {
    secs.div_ceil(60)
}

/// Message for the end of the current phase of `state`.
pub fn phase_transition(state: &SchedulerState, auto_start: bool) -> TransitionMessage {
    let next = state.next_step();
    let mins = minutes(next.interval_secs);

    if !state.pomodoro_enabled {
        let (title, verb) = match next.phase {
            Phase::Standing => ("Time to stand up", "standing"),
            Phase::Sitting => ("Time to sit down", "sitting"),
        };
        let body = if auto_start {
            format!("Your {verb} interval has started: {mins} minutes.")
        } else {
            format!("Start your {mins}-minute {verb} interval when you're ready.")
        };
        return TransitionMessage {
            title: title.to_string(),
            body,
        };
    }

    match (state.current_session_type, next.session_type) {
        (SessionType::Focus, SessionType::LongBreak) => TransitionMessage {
            title: "Long break earned".to_string(),
            body: if auto_start {
                format!(
                    "{} focus sessions done. Step away for {mins} minutes.",
                    next.completed_focus_sessions
                )
            } else {
                format!(
                    "{} focus sessions done. Start your {mins}-minute break when you're ready.",
                    next.completed_focus_sessions
                )
            },
        },
        (SessionType::Focus, _) => TransitionMessage {
            title: "Focus session complete".to_string(),
            body: if auto_start {
                format!("Take a {mins}-minute break. Stretch and move around.")
            } else {
                format!("Start your {mins}-minute break when you're ready.")
            },
        },
        (_, _) => {
            let stance = match next.phase {
                Phase::Sitting => "sitting",
                Phase::Standing => "standing",
            };
            TransitionMessage {
                title: "Break's over".to_string(),
                body: if auto_start {
                    format!("Back to focus for {mins} minutes, {stance} this time.")
                } else {
                    format!("Start your next {mins}-minute focus session ({stance}) when you're ready.")
                },
            }
        }
    }
}
