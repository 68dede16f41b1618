//! Dynamic rate optimization.
//!
//! Derives the safety factor, sentiment weight, step count, fund
//! distribution and dynamic minimum rate. Everything here is a pure function
//! of its inputs; the only state is the explicit [`RateHistory`] owned by the
//! caller.

use std::collections::VecDeque;

use lendbot_core::Rate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::StrategyConfig;

/// Largest ladder length the configuration accepts.
pub const MAX_LADDER_STEPS: u32 = 50;

const BASE_SAFETY_FACTOR: Decimal = dec!(0.97);
const MIN_SAFETY_FACTOR: Decimal = dec!(0.95);
const MAX_SAFETY_FACTOR: Decimal = dec!(0.99);

/// Sentiment rise over three cycles that counts toward a panic.
const PANIC_SENTIMENT_RISE: Decimal = dec!(1.5);
/// Volume growth ratio over three cycles that counts toward a panic.
const PANIC_VOLUME_RATIO: Decimal = dec!(1.5);

// ============================================================================
// RateHistory
// ============================================================================

/// Rolling per-currency history across strategy passes.
#[derive(Debug, Clone)]
pub struct RateHistory {
    capacity: usize,
    sentiments: VecDeque<Decimal>,
    high_rates: VecDeque<Decimal>,
    volumes: VecDeque<Decimal>,
}

impl RateHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            sentiments: VecDeque::with_capacity(capacity),
            high_rates: VecDeque::with_capacity(capacity),
            volumes: VecDeque::with_capacity(capacity),
        }
    }

    /// Record one pass. `high_rate` is skipped when the candle was missing.
    pub fn record(&mut self, sentiment: Decimal, high_rate: Option<Rate>, total_volume: Decimal) {
        push_capped(&mut self.sentiments, sentiment, self.capacity);
        push_capped(&mut self.volumes, total_volume, self.capacity);
        if let Some(rate) = high_rate {
            push_capped(&mut self.high_rates, rate.inner(), self.capacity);
        }
    }

    /// Relative change of `current_volume` against the last recorded pass.
    ///
    /// 0 on the first pass.
    pub fn volume_change(&self, current_volume: Decimal) -> Decimal {
        match self.volumes.back() {
            Some(last) if !last.is_zero() => (current_volume - *last) / *last,
            _ => Decimal::ZERO,
        }
    }

    /// Sentiment rose by more than 1.5 and volume grew by more than 50%
    /// across the last three recorded passes.
    pub fn panic_signal(&self) -> bool {
        let n = self.sentiments.len();
        if n < 3 || self.volumes.len() < 3 {
            return false;
        }
        let sentiment_rise = self.sentiments[n - 1] - self.sentiments[n - 3];

        let m = self.volumes.len();
        let oldest = self.volumes[m - 3];
        let volume_ratio = if oldest > Decimal::ZERO {
            self.volumes[m - 1] / oldest
        } else {
            Decimal::ONE
        };
        sentiment_rise > PANIC_SENTIMENT_RISE && volume_ratio > PANIC_VOLUME_RATIO
    }

    /// Recorded last-hour highs, oldest first.
    pub fn high_rates(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.high_rates.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.sentiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentiments.is_empty()
    }
}

fn push_capped(buf: &mut VecDeque<Decimal>, value: Decimal, capacity: usize) {
    if buf.len() >= capacity {
        buf.pop_front();
    }
    buf.push_back(value);
}

// ============================================================================
// RateOptimizer
// ============================================================================

/// Optimization rules parameterized by strategy configuration.
#[derive(Debug, Clone)]
pub struct RateOptimizer {
    highest_sentiment: Decimal,
    base_steps: u32,
    min_steps: u32,
    max_steps: u32,
    minimum_rate: Rate,
}

impl RateOptimizer {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            highest_sentiment: config.highest_sentiment,
            base_steps: config.base_steps,
            min_steps: config.min_steps,
            max_steps: config.max_steps,
            minimum_rate: config.minimum_rate,
        }
    }

    /// Safety factor applied to the last-hour high, in [0.95, 0.99].
    ///
    /// Lower (more aggressive) as sentiment and volatility rise, higher when
    /// sentiment is weak.
    pub fn safety_factor(&self, sentiment: Decimal, volatility: f64) -> Decimal {
        let emotion = if sentiment > dec!(3.0) {
            dec!(-0.02)
        } else if sentiment > dec!(2.0) {
            dec!(-0.015)
        } else if sentiment > dec!(1.5) {
            dec!(-0.01)
        } else if sentiment < dec!(0.8) {
            dec!(0.015)
        } else {
            Decimal::ZERO
        };

        let vol = if volatility > 0.1 {
            dec!(-0.01)
        } else if volatility > 0.05 {
            dec!(-0.005)
        } else {
            Decimal::ZERO
        };

        (BASE_SAFETY_FACTOR + emotion + vol).clamp(MIN_SAFETY_FACTOR, MAX_SAFETY_FACTOR)
    }

    /// Sentiment weight with acceleration above 3.0 and a volume adjustment
    /// clamped to [0.9, 1.2].
    pub fn enhanced_sentiment_weight(&self, sentiment: Decimal, volume_change: Decimal) -> Decimal {
        let mut weight = (sentiment / self.highest_sentiment).min(Decimal::TWO);
        if sentiment > dec!(3.0) {
            weight *= Decimal::ONE + (sentiment - dec!(3.0)) * dec!(0.15);
        }
        let volume_adjustment =
            Decimal::ONE + (volume_change * dec!(0.5)).clamp(dec!(-0.1), dec!(0.2));
        weight * volume_adjustment
    }

    /// Plain sentiment weight used when dynamic optimization is off.
    pub fn plain_sentiment_weight(&self, sentiment: Decimal) -> Decimal {
        sentiment / self.highest_sentiment
    }

    /// Ladder step count from activity and competition scores.
    pub fn step_count(&self, market_activity: Decimal, competition_density: Decimal) -> u32 {
        let activity_bonus = if market_activity > dec!(0.8) {
            2
        } else if market_activity > dec!(0.6) {
            1
        } else {
            0
        };
        let competition_bonus = u32::from(competition_density > dec!(0.7));
        (self.base_steps + activity_bonus + competition_bonus).clamp(self.min_steps, self.max_steps)
    }

    pub fn base_steps(&self) -> u32 {
        self.base_steps
    }

    /// `max(min, min(max(min, low24h * 0.8), avg * 0.3))`; the configured
    /// minimum when the 24 h low is unknown.
    pub fn dynamic_minimum_rate(&self, low_24h: Option<Rate>, avg_rate: Rate) -> Rate {
        let Some(low) = low_24h else {
            return self.minimum_rate;
        };
        let market_adjusted = self.minimum_rate.max(low * dec!(0.8));
        let rate_adjusted = market_adjusted.min(avg_rate * dec!(0.3));
        self.minimum_rate.max(rate_adjusted)
    }

    pub fn minimum_rate(&self) -> Rate {
        self.minimum_rate
    }
}

/// Fibonacci weights of length `steps`, largest last, normalized to sum 1.
///
/// Weights saturate past [`MAX_LADDER_STEPS`]-sized ladders instead of
/// overflowing; validated configs never get there.
pub fn fibonacci_distribution(steps: u32) -> Vec<Decimal> {
    if steps == 0 {
        return Vec::new();
    }
    let mut fib: Vec<u64> = Vec::with_capacity(steps as usize);
    for i in 0..steps as usize {
        let next = if i < 2 { 1 } else { fib[i - 1].saturating_add(fib[i - 2]) };
        fib.push(next);
    }
    let total = fib
        .iter()
        .fold(Decimal::ZERO, |acc, f| acc.saturating_add(Decimal::from(*f)));
    fib.into_iter().map(|f| Decimal::from(f) / total).collect()
}

/// Equal shares of length `steps`.
pub fn uniform_distribution(steps: u32) -> Vec<Decimal> {
    if steps == 0 {
        return Vec::new();
    }
    let share = Decimal::ONE / Decimal::from(steps);
    vec![share; steps as usize]
}

/// Sample standard deviation; 0 with fewer than two values.
pub fn rate_volatility(values: &[Decimal]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let xs: Vec<f64> = values.iter().filter_map(|v| v.to_f64()).collect();
    if xs.len() < 2 {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Volatility from the newest `window` candle highs, falling back to the
/// history buffer when fewer than two candles are available.
pub fn volatility_for(recent_highs: &[Decimal], history: &RateHistory, window: usize) -> f64 {
    let candles: Vec<Decimal> = recent_highs.iter().take(window).copied().collect();
    if candles.len() >= 2 {
        return rate_volatility(&candles);
    }
    let past: Vec<Decimal> = history.high_rates().collect();
    rate_volatility(&past)
}
