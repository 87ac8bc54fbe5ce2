//! Sliding token window: a rolling log of admitted costs over a fixed span.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Cost recorded; dispatch now.
    Admitted,
    /// No room until the oldest entry leaves the window.
    RetryAt(Instant),
    /// The cost alone exceeds the whole budget; waiting will never help.
    TooLarge,
}

#[derive(Debug)]
pub struct TokenWindow {
    budget: u64,
    span: Duration,
    entries: VecDeque<(Instant, u64)>,
    used: u64,
}

impl TokenWindow {
    pub fn new(budget: u64, span: Duration) -> Self {
        Self {
            budget,
            span,
            entries: VecDeque::new(),
            used: 0,
        }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Tokens recorded inside the window as of the last prune.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Drop entries that have aged out of the window at `now`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(&(at, cost)) = self.entries.front() {
            if now.saturating_duration_since(at) < self.span {
                break;
            }
            self.entries.pop_front();
            self.used -= cost;
        }
    }

    /// Record `cost` at `now` if it fits, otherwise say when to look again.
    pub fn try_admit(&mut self, cost: u64, now: Instant) -> Admission {
        if cost > self.budget {
            return Admission::TooLarge;
        }
        self.prune(now);
        if self.used + cost <= self.budget {
            self.entries.push_back((now, cost));
            self.used += cost;
            return Admission::Admitted;
        }
        match self.entries.front() {
            Some(&(oldest, _)) => Admission::RetryAt(oldest + self.span),
            None => Admission::RetryAt(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn admits_until_budget() {
        let now = Instant::now();
        let mut w = TokenWindow::new(1000, MINUTE);
        assert_eq!(w.try_admit(600, now), Admission::Admitted);
        assert_eq!(w.try_admit(400, now), Admission::Admitted);
        assert_eq!(w.used(), 1000);
        assert_eq!(w.try_admit(1, now), Admission::RetryAt(now + MINUTE));
    }

    #[test]
    fn rejection_records_nothing() {
        let now = Instant::now();
        let mut w = TokenWindow::new(1000, MINUTE);
        w.try_admit(900, now);
        assert!(matches!(w.try_admit(200, now), Admission::RetryAt(_)));
        assert_eq!(w.used(), 900);
    }

    #[test]
    fn entries_expire_after_span() {
        let t0 = Instant::now();
        let mut w = TokenWindow::new(1000, MINUTE);
        w.try_admit(900, t0);

        let t1 = t0 + Duration::from_secs(59);
        assert_eq!(w.try_admit(200, t1), Admission::RetryAt(t0 + MINUTE));

        let t2 = t0 + MINUTE;
        assert_eq!(w.try_admit(200, t2), Admission::Admitted);
        assert_eq!(w.used(), 200);
    }

    #[test]
    fn retry_points_at_oldest_entry() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(10);
        let mut w = TokenWindow::new(1000, MINUTE);
        w.try_admit(500, t0);
        w.try_admit(500, t1);

        // Needs both entries gone; first look-again is when the oldest expires.
        let t2 = t0 + Duration::from_secs(30);
        assert_eq!(w.try_admit(700, t2), Admission::RetryAt(t0 + MINUTE));

        // After the oldest expires there is still not enough room.
        let t3 = t0 + MINUTE;
        assert_eq!(w.try_admit(700, t3), Admission::RetryAt(t1 + MINUTE));
        assert_eq!(w.try_admit(700, t1 + MINUTE), Admission::Admitted);
    }

    #[test]
    fn oversized_cost_is_too_large() {
        let mut w = TokenWindow::new(1000, MINUTE);
        assert_eq!(w.try_admit(1001, Instant::now()), Admission::TooLarge);
        assert_eq!(w.used(), 0);
    }
}
