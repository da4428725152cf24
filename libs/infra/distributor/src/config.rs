//! The four constants §6 names for this module:
//! `POLLING_INTERVAL_FAST`, `POLLING_INTERVAL_SLOW`,
//! `NOTIFICATION_HEALTH_THRESHOLD` and the health clock's own check cadence.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributorConfig {
    pub poll_fast: Duration,
    pub poll_slow: Duration,
    pub health_check_interval: Duration,
    pub health_threshold: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            poll_fast: Duration::from_secs(2),
            poll_slow: Duration::from_secs(15),
            health_check_interval: Duration::from_secs(100),
            health_threshold: Duration::from_secs(300),
        }
    }
}
