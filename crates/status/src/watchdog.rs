//! Per-target staleness watchdog
//!
//! One timer per host, re-armed on every update. A target is stale once two
//! probe intervals plus the probe's own timeout budget pass without an
//! update, so a single missed probe cycle is tolerated and a second is not.

#![warn(missing_docs)]

use std::collections::HashMap;
use std::time::Duration;

use crate::scheduler::{Scheduler, TimerEvent, TimerToken};

/// Probe timeout budget added on top of two probe intervals
pub const STALE_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// Time without updates after which a target with `interval_s` is stale
pub fn stale_after(interval_s: u64, margin: Duration) -> Duration {
    Duration::from_secs(interval_s.saturating_mul(2)).saturating_add(margin)
}

/// Timer bookkeeping for every host that has received an update
#[derive(Debug)]
pub struct StalenessWatchdog {
    margin: Duration,
    timers: HashMap<String, TimerToken>,
}

impl Default for StalenessWatchdog {
    fn default() -> Self {
        Self::new(STALE_TIMEOUT_MARGIN)
    }
}

impl StalenessWatchdog {
    /// Create a watchdog with a custom timeout margin
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            timers: HashMap::new(),
        }
    }

    /// Margin added to two probe intervals
    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Replace any timer for `host` with a fresh one
    pub fn arm<S: Scheduler>(
        &mut self,
        scheduler: &mut S,
        host: &str,
        interval_s: u64,
    ) -> TimerToken {
        if let Some(previous) = self.timers.remove(host) {
            scheduler.cancel(previous);
        }

        let token = scheduler.schedule_once(
            stale_after(interval_s, self.margin),
            TimerEvent::Stale {
                host: host.to_string(),
            },
        );
        self.timers.insert(host.to_string(), token);
        token
    }

    /// Claim a fired timer
    ///
    /// Returns true only if `token` is the live timer for `host`; timers that
    /// were replaced or disarmed in the meantime are ignored.
    pub fn expire<S: Scheduler>(&mut self, scheduler: &mut S, token: TimerToken, host: &str) -> bool {
        if self.timers.get(host) != Some(&token) {
            return false;
        }
        self.timers.remove(host);
        scheduler.cancel(token);
        true
    }

    /// Cancel every timer
    pub fn disarm_all<S: Scheduler>(&mut self, scheduler: &mut S) {
        for (_, token) in self.timers.drain() {
            scheduler.cancel(token);
        }
    }

    /// Whether a timer is armed for `host`
    pub fn is_armed(&self, host: &str) -> bool {
        self.timers.contains_key(host)
    }

    /// Number of armed timers
    pub fn armed(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    #[test]
    fn test_stale_after_includes_margin() {
        assert_eq!(
            stale_after(5, STALE_TIMEOUT_MARGIN),
            Duration::from_millis(5 * 2000 + 30_000)
        );
        assert_eq!(stale_after(0, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_rearm_replaces_timer() {
        let mut scheduler = ManualScheduler::new();
        let mut watchdog = StalenessWatchdog::default();

        let first = watchdog.arm(&mut scheduler, "h1", 5);
        let second = watchdog.arm(&mut scheduler, "h1", 5);

        assert_ne!(first, second);
        assert_eq!(scheduler.pending(), 1);
        assert!(!scheduler.is_armed(first));
        assert!(!watchdog.expire(&mut scheduler, first, "h1"));
        assert!(watchdog.expire(&mut scheduler, second, "h1"));
        assert!(!watchdog.is_armed("h1"));
    }

    #[test]
    fn test_disarm_all() {
        let mut scheduler = ManualScheduler::new();
        let mut watchdog = StalenessWatchdog::default();
        watchdog.arm(&mut scheduler, "h1", 5);
        watchdog.arm(&mut scheduler, "h2", 60);

        watchdog.disarm_all(&mut scheduler);

        assert_eq!(watchdog.armed(), 0);
        assert_eq!(scheduler.pending(), 0);
    }
}
