use crate::models::{ConnectivityState, Statistics};

/// Lifetime counters for one monitor. Never decremented.
#[derive(Debug, Default)]
pub struct StatisticsTracker {
    total_checks: u64,
    total_failures: u64,
    current_status: ConnectivityState,
}

impl StatisticsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&mut self, is_down: bool) {
        self.total_checks += 1;
        if is_down {
            self.total_failures += 1;
        }
    }

    pub fn set_status(&mut self, status: ConnectivityState) {
        self.current_status = status;
    }

    pub fn snapshot(&self) -> Statistics {
        let success_rate = if self.total_checks == 0 {
            0.0
        } else {
            (self.total_checks - self.total_failures) as f64 / self.total_checks as f64 * 100.0
        };
        Statistics {
            total_checks: self.total_checks,
            total_failures: self.total_failures,
            success_rate,
            current_status: self.current_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_reports_zero_rate() {
        let stats = StatisticsTracker::new().snapshot();
        assert_eq!(stats.total_checks, 0);
        assert_eq!(stats.total_failures, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.current_status, ConnectivityState::Connected);
    }

    #[test]
    fn counts_checks_and_failures() {
        let verdicts = [true, false, false, true, false, false, false, true];
        let mut tracker = StatisticsTracker::new();
        for down in verdicts {
            tracker.record_cycle(down);
        }

        let stats = tracker.snapshot();
        assert_eq!(stats.total_checks, 8);
        assert_eq!(stats.total_failures, 3);
        assert!((stats.success_rate - 62.5).abs() < f64::EPSILON);
    }

    #[test]
    fn all_failures_give_zero_rate() {
        let mut tracker = StatisticsTracker::new();
        tracker.record_cycle(true);
        tracker.record_cycle(true);
        tracker.set_status(ConnectivityState::Disconnected);

        let stats = tracker.snapshot();
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.current_status, ConnectivityState::Disconnected);
    }
}
