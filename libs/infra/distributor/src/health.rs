//! Notification health clock: tracks time since the last notification and
//! derives whether the poller should run at `FAST` or `SLOW` cadence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct HealthClock {
    last_notification: Mutex<Instant>,
    healthy: AtomicBool,
    threshold: Duration,
}

impl HealthClock {
    pub fn new(threshold: Duration) -> Self {
        Self { last_notification: Mutex::new(Instant::now()), healthy: AtomicBool::new(true), threshold }
    }

    /// Resets the clock to "just heard from the store" and reports whether
    /// this notification flipped the health state from unhealthy to healthy
    /// (the caller uses this to reset the poller back to `SLOW`).
    pub fn record_notification(&self) -> bool {
        *self.last_notification.lock().unwrap() = Instant::now();
        !self.healthy.swap(true, Ordering::SeqCst)
    }

    /// Re-evaluates health against the threshold; called by the periodic
    /// health timer (~100s cadence per §4.2), not on the notification path.
    pub fn reevaluate(&self) -> bool {
        let elapsed = self.last_notification.lock().unwrap().elapsed();
        let healthy = elapsed <= self.threshold;
        self.healthy.store(healthy, Ordering::SeqCst);
        healthy
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn age(&self) -> Duration {
        self.last_notification.lock().unwrap().elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_clock_is_healthy() {
        let clock = HealthClock::new(Duration::from_secs(300));
        assert!(clock.is_healthy());
    }

    #[test]
    fn reevaluate_flips_unhealthy_once_threshold_elapses() {
        let clock = HealthClock::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!clock.reevaluate());
    }

    #[test]
    fn record_notification_reports_transition_from_unhealthy() {
        let clock = HealthClock::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!clock.reevaluate());
        assert!(clock.record_notification(), "should report the unhealthy -> healthy transition");
        assert!(!clock.record_notification(), "already healthy, no transition");
    }
}
