//! Timer Scheduler
//!
//! Virtual-clock timers with cancellation tokens. The clock only moves when
//! the owner advances it, so the same sequence of `advance` calls always
//! fires the same timers in the same order.
//!
//! Timers fire in deadline order; equal deadlines fire in scheduling order.
//! A cancelled timer never fires.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Deserialize};

/// Handle to a scheduled timer. Needed to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Raw id, for logging.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Work a timer performs when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerTask {
    /// Betting window expired.
    CloseBetting,
    /// Launch delay expired; start the curve.
    StartCurve,
    /// Curve tick.
    Tick,
    /// Post-round delay expired; reopen betting.
    NextRound,
    /// Announce the NPC at this registration index.
    NpcAnnounce(usize),
}

/// A timer that came due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired {
    /// Token returned when it was scheduled.
    pub token: TimerToken,
    /// What to do.
    pub task: TimerTask,
    /// Clock reading at the deadline.
    pub at: Duration,
}

/// Cancellable timer source driving the round state machine.
pub trait Scheduler: Send {
    /// Current clock reading.
    fn now(&self) -> Duration;

    /// Fire `task` once, `delay` from now.
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerToken;

    /// Fire `task` every `period`, first at `now + period`.
    fn schedule_every(&mut self, period: Duration, task: TimerTask) -> TimerToken;

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    fn cancel(&mut self, token: TimerToken) -> bool;

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its deadline. Repeating timers are re-armed.
    fn pop_due(&mut self, until: Duration) -> Option<Fired>;

    /// Move the clock forward to `until` without firing anything.
    fn advance_to(&mut self, until: Duration);

    /// Number of armed timers.
    fn pending(&self) -> usize;
}

#[derive(Clone, Debug)]
struct Timer {
    deadline: Duration,
    period: Option<Duration>,
    task: TimerTask,
}

/// In-memory [`Scheduler`] over a virtual clock.
#[derive(Clone, Debug, Default)]
pub struct TimerWheel {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<u64, Timer>,
}

impl TimerWheel {
    /// Create an empty wheel at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, deadline: Duration, period: Option<Duration>, task: TimerTask) -> TimerToken {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert(id, Timer { deadline, period, task });
        TimerToken(id)
    }

    /// Is this timer still armed?
    pub fn is_armed(&self, token: TimerToken) -> bool {
        self.timers.contains_key(&token.0)
    }
}

impl Scheduler for TimerWheel {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerToken {
        self.insert(self.now + delay, None, task)
    }

    fn schedule_every(&mut self, period: Duration, task: TimerTask) -> TimerToken {
        // Zero periods would spin forever inside a single advance
        let period = period.max(Duration::from_millis(1));
        self.insert(self.now + period, Some(period), task)
    }

    fn cancel(&mut self, token: TimerToken) -> bool {
        self.timers.remove(&token.0).is_some()
    }

    fn pop_due(&mut self, until: Duration) -> Option<Fired> {
        let (&id, timer) = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= until)
            .min_by_key(|(id, t)| (t.deadline, **id))?;

        let fired = Fired {
            token: TimerToken(id),
            task: timer.task,
            at: timer.deadline,
        };
        self.now = self.now.max(fired.at);

        match timer.period {
            Some(period) => {
                if let Some(t) = self.timers.get_mut(&id) {
                    t.deadline += period;
                }
            }
            None => {
                self.timers.remove(&id);
            }
        }
        Some(fired)
    }

    fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    fn pending(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn drain(wheel: &mut TimerWheel, until: Duration) -> Vec<(u64, TimerTask)> {
        let mut out = Vec::new();
        while let Some(f) = wheel.pop_due(until) {
            out.push((f.at.as_millis() as u64, f.task));
        }
        wheel.advance_to(until);
        out
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(ms(300), TimerTask::NextRound);
        wheel.schedule(ms(100), TimerTask::StartCurve);
        wheel.schedule(ms(100), TimerTask::NpcAnnounce(0));

        let fired = drain(&mut wheel, ms(1000));
        assert_eq!(
            fired,
            vec![
                (100, TimerTask::StartCurve),
                (100, TimerTask::NpcAnnounce(0)),
                (300, TimerTask::NextRound),
            ]
        );
        assert_eq!(wheel.now(), ms(1000));
        assert_eq!(wheel.pending(), 0);
    }

    #[test]
    fn test_not_due_yet() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(ms(500), TimerTask::CloseBetting);
        assert!(drain(&mut wheel, ms(499)).is_empty());
        assert_eq!(drain(&mut wheel, ms(500)), vec![(500, TimerTask::CloseBetting)]);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut wheel = TimerWheel::new();
        let token = wheel.schedule(ms(100), TimerTask::StartCurve);
        assert!(wheel.is_armed(token));
        assert!(wheel.cancel(token));
        assert!(!wheel.cancel(token));
        assert!(drain(&mut wheel, ms(1000)).is_empty());
    }

    #[test]
    fn test_repeating_timer() {
        let mut wheel = TimerWheel::new();
        let token = wheel.schedule_every(ms(50), TimerTask::Tick);

        assert_eq!(drain(&mut wheel, ms(175)).len(), 3);
        assert_eq!(drain(&mut wheel, ms(200)), vec![(200, TimerTask::Tick)]);

        wheel.cancel(token);
        assert!(drain(&mut wheel, ms(1000)).is_empty());
    }

    #[test]
    fn test_schedule_relative_to_fire_time() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(ms(100), TimerTask::StartCurve);

        let fired = wheel.pop_due(ms(1000)).unwrap();
        assert_eq!(wheel.now(), ms(100));

        // Scheduled from inside the callback: counts from the deadline
        wheel.schedule(ms(50), TimerTask::NextRound);
        let next = wheel.pop_due(ms(1000)).unwrap();
        assert_eq!(fired.task, TimerTask::StartCurve);
        assert_eq!(next.at, ms(150));
    }
}
