use std::time::Duration;

/// `TARGET_RESPONSE_TIME_MS` and the hard ceiling of §5 ("configurable,
/// default 50 ms target / 500 ms hard ceiling").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub target_response: Duration,
    pub hard_ceiling: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { target_response: Duration::from_millis(50), hard_ceiling: Duration::from_millis(500) }
    }
}
