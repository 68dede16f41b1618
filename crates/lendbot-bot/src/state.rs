//! State shared between cycles.

use std::collections::HashMap;

use lendbot_core::{Currency, ProtectionRegistry, Rate};
use parking_lot::RwLock;

use crate::offer_cache::OfferCache;

/// Shared by the strategy and opportunistic cycles.
#[derive(Debug, Default)]
pub struct BotState {
    pub offers: OfferCache,
    pub protection: ProtectionRegistry,
    /// Dynamic minimum rate published by the last strategy pass.
    dynamic_minimums: RwLock<HashMap<Currency, Rate>>,
}

impl BotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_dynamic_minimum(&self, currency: &Currency, rate: Rate) {
        self.dynamic_minimums.write().insert(currency.clone(), rate);
    }

    /// Last published minimum, or `fallback` before the first strategy pass.
    #[must_use]
    pub fn dynamic_minimum(&self, currency: &Currency, fallback: Rate) -> Rate {
        self.dynamic_minimums
            .read()
            .get(currency)
            .copied()
            .unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_dynamic_minimum_fallback() {
        let state = BotState::new();
        let usd = Currency::parse("USD").unwrap();
        let fallback = Rate::new(dec!(0.0002));
        assert_eq!(state.dynamic_minimum(&usd, fallback), fallback);

        state.publish_dynamic_minimum(&usd, Rate::new(dec!(0.00035)));
        assert_eq!(state.dynamic_minimum(&usd, fallback), Rate::new(dec!(0.00035)));
    }
}
