//! Protection windows for opportunistically used tenors.
//!
//! A successful opportunistic placement protects its `(currency, period)`
//! key for a fixed number of minutes. While protected, the regular
//! reconciler neither cancels nor duplicates orders for that tenor.
//!
//! Expiry is lazy: every read compares against the caller's `now_ms`, and
//! expired entries are dropped by [`ProtectionRegistry::purge_expired`].

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Currency;

/// Protected tenor identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtectionKey {
    pub currency: Currency,
    pub period_days: u32,
}

impl ProtectionKey {
    pub fn new(currency: Currency, period_days: u32) -> Self {
        Self {
            currency,
            period_days,
        }
    }
}

/// A single protection entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionWindow {
    pub key: ProtectionKey,
    /// Unix ms; protection ends once `now_ms >= expires_at_ms`.
    pub expires_at_ms: u64,
}

impl ProtectionWindow {
    #[inline]
    pub fn is_active(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

// ============================================================================
// ProtectionRegistry
// ============================================================================

/// Shared registry of protection windows.
///
/// Thread-safe: shared between the strategy and opportunistic cycles via
/// `Arc<ProtectionRegistry>`. Locks are never held across await points.
#[derive(Debug, Default)]
pub struct ProtectionRegistry {
    windows: RwLock<HashMap<ProtectionKey, u64>>,
}

impl ProtectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect `key` for `duration_ms` from `now_ms`.
    ///
    /// Re-protecting an already protected key extends it; an existing later
    /// expiry is never shortened.
    pub fn protect(&self, key: ProtectionKey, now_ms: u64, duration_ms: u64) -> ProtectionWindow {
        let expires_at_ms = now_ms.saturating_add(duration_ms);
        let mut windows = self.windows.write();
        let entry = windows.entry(key.clone()).or_insert(expires_at_ms);
        if *entry < expires_at_ms {
            *entry = expires_at_ms;
        }
        let expires_at_ms = *entry;
        debug!(
            currency = %key.currency,
            period_days = key.period_days,
            expires_at_ms,
            "Tenor protected"
        );
        ProtectionWindow { key, expires_at_ms }
    }

    /// Whether `key` is protected at `now_ms`.
    #[must_use]
    pub fn is_protected(&self, key: &ProtectionKey, now_ms: u64) -> bool {
        self.windows
            .read()
            .get(key)
            .is_some_and(|&expires| now_ms < expires)
    }

    /// Active protected periods for one currency.
    #[must_use]
    pub fn protected_periods(&self, currency: &Currency, now_ms: u64) -> Vec<u32> {
        let mut periods: Vec<u32> = self
            .windows
            .read()
            .iter()
            .filter(|(k, &expires)| &k.currency == currency && now_ms < expires)
            .map(|(k, _)| k.period_days)
            .collect();
        periods.sort_unstable();
        periods
    }

    /// Snapshot of active windows.
    #[must_use]
    pub fn active(&self, now_ms: u64) -> Vec<ProtectionWindow> {
        self.windows
            .read()
            .iter()
            .filter(|(_, &expires)| now_ms < expires)
            .map(|(key, &expires_at_ms)| ProtectionWindow {
                key: key.clone(),
                expires_at_ms,
            })
            .collect()
    }

    /// Drop expired windows. Returns the number removed.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let mut windows = self.windows.write();
        let before = windows.len();
        windows.retain(|_, &mut expires| now_ms < expires);
        before - windows.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.read().is_empty()
    }
}
