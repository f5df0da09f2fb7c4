// src/lifecycle/policy.rs

use std::collections::VecDeque;
use std::time::Instant;

use crate::types::CrashPolicy;

/// Sliding-window restart counter.
///
/// Allows at most `max_restarts` restarts inside any `window`, which bounds
/// crash loops without giving up forever on a backend that crashes rarely.
#[derive(Debug, Clone)]
pub struct RestartBudget {
    policy: CrashPolicy,
    recent: VecDeque<Instant>,
}

impl RestartBudget {
    pub fn new(policy: CrashPolicy) -> Self {
        Self {
            policy,
            recent: VecDeque::new(),
        }
    }

    /// Consume one restart at `now` if the budget allows it.
    pub fn try_restart(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.recent.front() {
            if now.saturating_duration_since(*oldest) >= self.policy.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        if self.recent.len() as u64 >= u64::from(self.policy.max_restarts) {
            return false;
        }
        self.recent.push_back(now);
        true
    }

    pub fn used(&self) -> usize {
        self.recent.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn zero_budget_never_restarts() {
        let mut budget = RestartBudget::new(CrashPolicy::default());
        assert!(!budget.try_restart(Instant::now()));
    }

    #[test]
    fn budget_refills_after_window() {
        let policy = CrashPolicy {
            max_restarts: 2,
            window: Duration::from_secs(60),
        };
        let mut budget = RestartBudget::new(policy);
        let t0 = Instant::now();

        assert!(budget.try_restart(t0));
        assert!(budget.try_restart(t0 + Duration::from_secs(1)));
        assert!(!budget.try_restart(t0 + Duration::from_secs(2)));
        assert_eq!(budget.used(), 2);

        assert!(budget.try_restart(t0 + Duration::from_secs(61)));
    }
}
