//! Rolling latency window (§4.8, §5: "mutated by many callers; serialized
//! by a mutex"). Keeps at most `MAX_RESPONSE_HISTORY` samples.

use std::collections::VecDeque;
use std::sync::Mutex;

pub const MAX_RESPONSE_HISTORY: usize = 1000;

#[derive(Default)]
pub struct ResponseTimeWindow {
    samples: Mutex<VecDeque<f64>>,
}

impl ResponseTimeWindow {
    pub fn record(&self, millis: f64) {
        let mut samples = self.samples.lock().unwrap();
        if samples.len() == MAX_RESPONSE_HISTORY {
            samples.pop_front();
        }
        samples.push_back(millis);
    }

    pub fn average(&self) -> Option<f64> {
        let samples = self.samples.lock().unwrap();
        if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<f64>() / samples.len() as f64)
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_empty_window_is_none() {
        let window = ResponseTimeWindow::default();
        assert_eq!(window.average(), None);
    }

    #[test]
    fn window_caps_at_max_history() {
        let window = ResponseTimeWindow::default();
        for _ in 0..(MAX_RESPONSE_HISTORY + 10) {
            window.record(10.0);
        }
        assert_eq!(window.sample_count(), MAX_RESPONSE_HISTORY);
    }

    #[test]
    fn average_reflects_recorded_samples() {
        let window = ResponseTimeWindow::default();
        window.record(10.0);
        window.record(20.0);
        assert_eq!(window.average(), Some(15.0));
    }
}
