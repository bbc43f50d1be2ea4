//! Deterministic periodic timers driven by explicit timestamps.

/// A repeating timer. Fires every `period_ms` once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    period_ms: u64,
    next_due: Option<u64>,
}

impl Interval {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
            next_due: None,
        }
    }

    /// Start (or restart) the timer. The first tick is due one period after `now`.
    pub fn start(&mut self, now: u64) {
        self.next_due = Some(now.saturating_add(self.period_ms));
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Whether the timer fires at `now`.
    ///
    /// A late caller gets a single firing; the periods it slept through are
    /// dropped and the schedule resumes from the latest one.
    pub fn due(&mut self, now: u64) -> bool {
        let Some(at) = self.next_due else {
            return false;
        };
        if at > now {
            return false;
        }
        let latest = at + (now - at) / self.period_ms * self.period_ms;
        self.next_due = Some(latest.saturating_add(self.period_ms));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_until_started() {
        let mut timer = Interval::new(100);
        assert!(!timer.is_active());
        assert!(!timer.due(10_000));
    }

    #[test]
    fn test_fires_once_per_period() {
        let mut timer = Interval::new(100);
        timer.start(0);
        assert!(!timer.due(99));
        assert!(timer.due(100));
        assert!(!timer.due(150));
        assert!(timer.due(200));
    }

    #[test]
    fn test_late_call_fires_once_and_resumes_schedule() {
        let mut timer = Interval::new(100);
        timer.start(0);
        assert!(timer.due(350));
        assert!(!timer.due(399));
        assert!(timer.due(400));

        // A huge jump is still a single firing.
        let mut timer = Interval::new(100);
        timer.start(0);
        assert!(timer.due(1_700_000_000_000));
        assert!(!timer.due(1_700_000_000_050));
        assert!(timer.due(1_700_000_000_100));
    }

    #[test]
    fn test_cancel_stops_ticks() {
        let mut timer = Interval::new(1000);
        timer.start(0);
        timer.cancel();
        assert!(!timer.due(5000));
        assert!(!timer.is_active());
    }
}
