// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Default number of lines sent per second, per item.
pub const DEFAULT_MAX_LINES_PER_SECOND: u32 = 100;
/// Upper bound of the per-second line rate.
pub const MAX_LINES_PER_SECOND_LIMIT: u32 = 1000;

/// Limits on the work done by a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_parsed: u64,
    pub max_sent: u64,
}

impl Budget {
    pub fn new(max_parsed: u64, max_sent: u64) -> Self {
        Self {
            max_parsed,
            max_sent,
        }
    }

    /// Budget for one poll cycle: `rate * refresh` values may be sent and four
    /// times as many lines parsed, so filtered lines do not starve the item.
    pub fn per_cycle(max_lines_per_second: u32, refresh_seconds: u64) -> Self {
        let max_sent = u64::from(max_lines_per_second).saturating_mul(refresh_seconds.max(1));
        Self {
            max_parsed: max_sent.saturating_mul(4),
            max_sent,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            max_parsed: u64::MAX,
            max_sent: u64::MAX,
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::per_cycle(DEFAULT_MAX_LINES_PER_SECOND, 1)
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Every complete line available was handled.
    UpToDate,
    /// The budget ran out. Unread data stays for the next invocation.
    BudgetExhausted,
    /// The emitter refused a value. The invocation stopped after that line.
    EmitterFailed,
    /// No file matched the rotation pattern.
    NotFound,
}

/// Running counters of one invocation, shared across every file it reads.
#[derive(Debug)]
pub(crate) struct Tally {
    budget: Budget,
    pub(crate) parsed: u64,
    pub(crate) sent: u64,
    pub(crate) budget_hit: bool,
    pub(crate) emitter_failed: bool,
}

impl Tally {
    pub(crate) fn new(budget: Budget) -> Self {
        Self {
            budget,
            parsed: 0,
            sent: 0,
            budget_hit: false,
            emitter_failed: false,
        }
    }

    /// Whether another line may be parsed. Records the refusal when not.
    pub(crate) fn admit(&mut self) -> bool {
        if self.parsed >= self.budget.max_parsed || self.sent >= self.budget.max_sent {
            self.budget_hit = true;
            return false;
        }
        true
    }

    /// True once nothing else may be read in this invocation.
    pub(crate) fn stopped(&self) -> bool {
        self.budget_hit || self.emitter_failed
    }

    pub(crate) fn status(&self) -> ProcessStatus {
        if self.emitter_failed {
            ProcessStatus::EmitterFailed
        } else if self.budget_hit {
            ProcessStatus::BudgetExhausted
        } else {
            ProcessStatus::UpToDate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_cycle() {
        let budget = Budget::per_cycle(100, 1);
        assert_eq!(budget.max_sent, 100);
        assert_eq!(budget.max_parsed, 400);

        let budget = Budget::per_cycle(10, 30);
        assert_eq!(budget.max_sent, 300);
        assert_eq!(budget.max_parsed, 1200);
    }

    #[test]
    fn test_zero_refresh_counts_as_one_second() {
        assert_eq!(Budget::per_cycle(5, 0), Budget::new(20, 5));
    }

    #[test]
    fn test_tally_admit() {
        let mut tally = Tally::new(Budget::new(2, 10));
        assert!(tally.admit());
        tally.parsed = 2;
        assert!(!tally.admit());
        assert!(tally.budget_hit);
        assert_eq!(tally.status(), ProcessStatus::BudgetExhausted);
    }

    #[test]
    fn test_tally_sent_limit() {
        let mut tally = Tally::new(Budget::new(10, 1));
        tally.parsed = 1;
        tally.sent = 1;
        assert!(!tally.admit());
    }

    #[test]
    fn test_emitter_failure_takes_precedence() {
        let mut tally = Tally::new(Budget::unlimited());
        tally.budget_hit = true;
        tally.emitter_failed = true;
        assert_eq!(tally.status(), ProcessStatus::EmitterFailed);
        assert!(tally.stopped());
    }
}
