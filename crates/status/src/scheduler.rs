//! Timer capability used by the reconnect loop and the staleness watchdog
//!
//! Timers never call back into the session directly. A fired timer is handed
//! back to the event loop as a `(TimerToken, TimerEvent)` pair, so the same
//! session logic runs against wall-clock timers in production and against
//! [`ManualScheduler`] in tests.

#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::time::Duration;

/// Opaque handle for a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Build a token from a scheduler-local sequence number
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Sequence number of this token
    pub fn seq(self) -> u64 {
        self.0
    }
}

/// What a timer means when it fires
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerEvent {
    /// Periodic reconnect attempt
    Reconnect,
    /// No update arrived for `host` within its staleness window
    Stale {
        /// Host of the target the timer watches
        host: String,
    },
}

/// Injectable timer capability
pub trait Scheduler {
    /// Fire `event` once after `delay`
    fn schedule_once(&mut self, delay: Duration, event: TimerEvent) -> TimerToken;

    /// Fire `event` every `period`, first after one full period
    fn schedule_every(&mut self, period: Duration, event: TimerEvent) -> TimerToken;

    /// Cancel a timer; unknown or already-fired tokens are ignored
    fn cancel(&mut self, token: TimerToken);
}

#[derive(Debug, Clone)]
struct PendingTimer {
    due: Duration,
    period: Option<Duration>,
    event: TimerEvent,
}

/// Deterministic scheduler driven by a virtual clock
///
/// Nothing fires on its own; callers pull due timers with
/// [`ManualScheduler::next_due`] and hand them to the session one at a time,
/// so cancellations made while handling one timer are honoured for the rest.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_seq: u64,
    pending: BTreeMap<TimerToken, PendingTimer>,
}

impl ManualScheduler {
    /// Create a scheduler with the virtual clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of armed timers
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of armed timers carrying `event`
    pub fn pending_for(&self, event: &TimerEvent) -> usize {
        self.pending.values().filter(|t| &t.event == event).count()
    }

    /// Whether `token` is still armed
    pub fn is_armed(&self, token: TimerToken) -> bool {
        self.pending.contains_key(&token)
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its due time. Periodic timers are re-armed one period later.
    pub fn next_due(&mut self, until: Duration) -> Option<(TimerToken, TimerEvent)> {
        let (token, due) = self
            .pending
            .iter()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(token, t)| (t.due, **token))
            .map(|(token, t)| (*token, t.due))?;

        self.now = self.now.max(due);

        let timer = self.pending.remove(&token)?;
        let event = timer.event.clone();
        if let Some(period) = timer.period {
            self.pending.insert(
                token,
                PendingTimer {
                    due: due + period,
                    ..timer
                },
            );
        }

        Some((token, event))
    }

    /// Move the clock forward without firing anything
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    fn insert(&mut self, due: Duration, period: Option<Duration>, event: TimerEvent) -> TimerToken {
        self.next_seq += 1;
        let token = TimerToken(self.next_seq);
        self.pending.insert(token, PendingTimer { due, period, event });
        token
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&mut self, delay: Duration, event: TimerEvent) -> TimerToken {
        let due = self.now + delay;
        self.insert(due, None, event)
    }

    fn schedule_every(&mut self, period: Duration, event: TimerEvent) -> TimerToken {
        let due = self.now + period;
        self.insert(due, Some(period), event)
    }

    fn cancel(&mut self, token: TimerToken) {
        self.pending.remove(&token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale(host: &str) -> TimerEvent {
        TimerEvent::Stale {
            host: host.to_string(),
        }
    }

    #[test]
    fn test_once_fires_at_due_time() {
        let mut scheduler = ManualScheduler::new();
        let token = scheduler.schedule_once(Duration::from_millis(100), stale("h1"));

        assert!(scheduler.next_due(Duration::from_millis(99)).is_none());
        assert_eq!(
            scheduler.next_due(Duration::from_millis(100)),
            Some((token, stale("h1")))
        );
        assert_eq!(scheduler.now(), Duration::from_millis(100));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_every_rearms() {
        let mut scheduler = ManualScheduler::new();
        let token = scheduler.schedule_every(Duration::from_secs(10), TimerEvent::Reconnect);

        let mut fired = Vec::new();
        while let Some((t, _)) = scheduler.next_due(Duration::from_secs(35)) {
            fired.push((t, scheduler.now()));
        }

        assert_eq!(
            fired,
            vec![
                (token, Duration::from_secs(10)),
                (token, Duration::from_secs(20)),
                (token, Duration::from_secs(30)),
            ]
        );
        assert!(scheduler.is_armed(token));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.schedule_once(Duration::from_millis(10), stale("a"));
        let b = scheduler.schedule_once(Duration::from_millis(20), stale("b"));
        scheduler.cancel(a);
        scheduler.cancel(TimerToken::new(999));

        assert_eq!(
            scheduler.next_due(Duration::from_secs(1)),
            Some((b, stale("b")))
        );
        assert!(scheduler.next_due(Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_fires_in_due_order() {
        let mut scheduler = ManualScheduler::new();
        scheduler.schedule_once(Duration::from_millis(30), stale("late"));
        scheduler.schedule_once(Duration::from_millis(10), stale("early"));

        assert_eq!(
            scheduler.next_due(Duration::from_secs(1)).map(|(_, e)| e),
            Some(stale("early"))
        );
        assert_eq!(
            scheduler.next_due(Duration::from_secs(1)).map(|(_, e)| e),
            Some(stale("late"))
        );
    }
}
