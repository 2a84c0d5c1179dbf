//! Property tests for deadline ordering and Pomodoro long-break cadence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use standwell_core::notify::Outbox;
use standwell_core::scheduler::{
    Collaborators, Intervals, SchedulerOptions, SessionScheduler, SessionType,
};
use standwell_core::ManualClock;

fn scheduler(intervals: Intervals, pomodoro: bool) -> (ManualClock, SessionScheduler) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap());
    let deps = Collaborators::new(Arc::new(clock.clone()), Outbox::disconnected());
    let scheduler = SessionScheduler::new(intervals, pomodoro, SchedulerOptions::default(), deps);
    (clock, scheduler)
}

fn intervals_strategy() -> impl Strategy<Value = Intervals> {
    (1u64..600, 1u64..600, 1u64..600, 1u64..300, 1u64..900, 1u32..6).prop_map(
        |(sitting, standing, focus, short, long, every)| Intervals {
            sitting_secs: sitting,
            standing_secs: standing,
            focus_secs: focus,
            short_break_secs: short,
            long_break_secs: long,
            intervals_before_long_break: every,
        },
    )
}

proptest! {
    /// Ticking only ever moves the deadline forward, and only on a switch.
    #[test]
    fn deadline_never_moves_backward(
        intervals in intervals_strategy(),
        pomodoro in any::<bool>(),
        steps in prop::collection::vec(0u64..2000, 1..60),
    ) {
        let (clock, mut scheduler) = scheduler(intervals, pomodoro);
        scheduler.start(None, None);

        for step in steps {
            clock.advance(Duration::from_secs(step));
            let before = scheduler.state().next_deadline;
            let switched = scheduler.tick();
            let after = scheduler.state().next_deadline;
            prop_assert!(after >= before);
            prop_assert_eq!(switched, after != before);
        }
    }

    /// After each focus session: `k - 1` short breaks, then one long break.
    #[test]
    fn long_break_every_k_focus_sessions(k in 1u32..8, rounds in 1u32..20) {
        let intervals = Intervals {
            intervals_before_long_break: k,
            ..Intervals::default()
        };
        let (clock, mut scheduler) = scheduler(intervals, true);
        scheduler.start(None, None);

        for n in 1..=rounds {
            prop_assert_eq!(scheduler.state().current_session_type, SessionType::Focus);
            clock.set(scheduler.state().next_deadline.unwrap());
            prop_assert!(scheduler.tick());

            let expected = if n % k == 0 { SessionType::LongBreak } else { SessionType::ShortBreak };
            prop_assert_eq!(scheduler.state().current_session_type, expected);
            prop_assert_eq!(scheduler.state().completed_focus_sessions, n);

            clock.set(scheduler.state().next_deadline.unwrap());
            prop_assert!(scheduler.tick());
        }
    }
}
