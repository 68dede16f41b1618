//! Borrower dedup tracking across scans.

use std::collections::HashMap;

use lendbot_core::Rate;
use serde::Serialize;

use crate::demand::BorrowerDemand;

/// Last sighting of a borrower that was admitted as an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedBorrower {
    pub borrower_id: String,
    pub last_seen_rate: Rate,
    pub last_seen_at_ms: u64,
}

/// Borrowers already acted on, keyed by borrower id.
#[derive(Debug, Clone)]
pub struct TrackedBorrowers {
    entries: HashMap<String, TrackedBorrower>,
    timeout_ms: u64,
}

impl TrackedBorrowers {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            timeout_ms,
        }
    }

    /// Tracked with an equal or better rate than `demand` offers now.
    pub fn is_unimproved(&self, demand: &BorrowerDemand) -> bool {
        self.entries
            .get(&demand.borrower_id)
            .is_some_and(|t| demand.rate <= t.last_seen_rate)
    }

    pub fn track(&mut self, demand: &BorrowerDemand, now_ms: u64) {
        self.entries.insert(
            demand.borrower_id.clone(),
            TrackedBorrower {
                borrower_id: demand.borrower_id.clone(),
                last_seen_rate: demand.rate,
                last_seen_at_ms: now_ms,
            },
        );
    }

    /// Forget borrowers unseen for longer than the timeout.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        let timeout = self.timeout_ms;
        self.entries
            .retain(|_, t| now_ms.saturating_sub(t.last_seen_at_ms) <= timeout);
        before - self.entries.len()
    }

    pub fn get(&self, borrower_id: &str) -> Option<&TrackedBorrower> {
        self.entries.get(borrower_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
