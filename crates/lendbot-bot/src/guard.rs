//! Single-flight guard per cycle type.

use lendbot_telemetry::Metrics;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Prevents a cycle from starting while the previous run of the same
/// cycle is still in progress. Other cycle types are unaffected.
#[derive(Debug)]
pub struct CycleGuard {
    name: &'static str,
    lock: Mutex<()>,
}

impl CycleGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: Mutex::new(()),
        }
    }

    /// Enter the guard, or `None` if a run is already in progress.
    pub fn try_enter(&self) -> Option<MutexGuard<'_, ()>> {
        match self.lock.try_lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                debug!(cycle = self.name, "Previous run still in progress, skipping");
                Metrics::cycle_overlap(self.name);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_entry_rejected_until_released() {
        let guard = CycleGuard::new("test");
        let held = guard.try_enter();
        assert!(held.is_some());
        assert!(guard.try_enter().is_none());
        drop(held);
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn test_guards_are_independent() {
        let strategy = CycleGuard::new("strategy");
        let opportunistic = CycleGuard::new("opportunistic");
        let _s = strategy.try_enter();
        assert!(opportunistic.try_enter().is_some());
    }
}
