//! Ladder generation.
//!
//! `generate_levels` is the pure ladder formula. [`LadderGenerator`] wires
//! market signals and the optimizer into it for one strategy pass.

use lendbot_core::{Level, Rate, TierTable};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::config::StrategyConfig;
use crate::optimizer::{
    fibonacci_distribution, uniform_distribution, volatility_for, RateHistory, RateOptimizer,
};
use crate::signals::{guess_rate, MarketSnapshot};

/// Decimal places ladder rates are rounded to.
pub const RATE_DP: u32 = 5;

/// Inputs to the ladder formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LadderInputs {
    /// Weighted average rate of the shortest bucket.
    pub avg_rate: Rate,
    /// Upper-bound guess.
    pub guess_rate: Rate,
    /// Last-hour high after the safety factor.
    pub last_hour_high: Option<Rate>,
    pub high_avg_12h: Option<Rate>,
    /// Rate floor for this pass.
    pub minimum_rate: Rate,
    pub step_count: u32,
    /// Share per level; uniform when shorter than `step_count`.
    pub fund_shares: Vec<Decimal>,
}

impl LadderInputs {
    /// `max(avg, last-hour high, 12h average, minimum)` over known values.
    pub fn base_rate(&self) -> Rate {
        [Some(self.avg_rate), self.last_hour_high, self.high_avg_12h, Some(self.minimum_rate)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(self.minimum_rate)
    }
}

/// Build the ladder.
///
/// Level `i` (1-based) sits at `round(base + i * (guess - avg) / steps, 5)`
/// with the period of the highest tier its rate meets.
pub fn generate_levels(inputs: &LadderInputs, tiers: &TierTable, default_period_days: u32) -> Vec<Level> {
    if inputs.step_count == 0 {
        return Vec::new();
    }
    let steps = Decimal::from(inputs.step_count);
    let base = inputs.base_rate();
    let segment = (inputs.guess_rate - inputs.avg_rate) / steps;
    let uniform = Decimal::ONE / steps;

    (1..=inputs.step_count)
        .map(|i| {
            let rate = (base + segment * Decimal::from(i)).round_dp(RATE_DP);
            Level {
                rate,
                period_days: tiers.period_for_rate(rate, default_period_days),
                fund_share: inputs
                    .fund_shares
                    .get(i as usize - 1)
                    .copied()
                    .unwrap_or(uniform),
            }
        })
        .collect()
}

/// Everything computed during one ladder pass, for logging and metrics.
#[derive(Debug, Clone, Serialize)]
pub struct LadderPlan {
    pub inputs: LadderInputs,
    pub levels: Vec<Level>,
    pub sentiment: Decimal,
    pub sentiment_weight: Decimal,
    pub safety_factor: Decimal,
    pub volatility: f64,
    pub volume_change: Decimal,
    pub panic: bool,
}

impl LadderPlan {
    pub fn base_rate(&self) -> Rate {
        self.inputs.base_rate()
    }
}

/// Combines signals and optimizer into a ladder.
#[derive(Debug, Clone)]
pub struct LadderGenerator {
    config: StrategyConfig,
    optimizer: RateOptimizer,
    tiers: TierTable,
}

impl LadderGenerator {
    pub fn new(config: StrategyConfig, tiers: TierTable) -> Self {
        let optimizer = RateOptimizer::new(&config);
        Self {
            config,
            optimizer,
            tiers,
        }
    }

    /// Plan one pass and record it into `history`.
    pub fn plan(&self, snapshot: &MarketSnapshot, history: &mut RateHistory) -> LadderPlan {
        let total_volume = snapshot.total_volume();
        let volume_change = history.volume_change(total_volume);
        history.record(snapshot.sentiment, snapshot.candles.last_hour_high, total_volume);

        let panic = self.config.panic_detection && history.panic_signal();
        let activity = if panic {
            Decimal::ONE
        } else {
            self.config.market_activity
        };

        let avg_rate = snapshot.short_avg_rate();
        let volatility = volatility_for(
            &snapshot.candles.recent_highs,
            history,
            self.config.volatility_window,
        );

        let (step_count, fund_shares, minimum_rate, safety_factor, sentiment_weight) =
            if self.config.dynamic_optimization {
                let steps = self
                    .optimizer
                    .step_count(activity, self.config.competition_density);
                (
                    steps,
                    fibonacci_distribution(steps),
                    self.optimizer
                        .dynamic_minimum_rate(snapshot.candles.low_24h, avg_rate),
                    self.optimizer.safety_factor(snapshot.sentiment, volatility),
                    self.optimizer
                        .enhanced_sentiment_weight(snapshot.sentiment, volume_change),
                )
            } else {
                let steps = self.optimizer.base_steps();
                (
                    steps,
                    uniform_distribution(steps),
                    self.optimizer.minimum_rate(),
                    self.config.static_safety_factor,
                    self.optimizer.plain_sentiment_weight(snapshot.sentiment),
                )
            };

        let guess = guess_rate(
            avg_rate,
            self.config.rate_adjustment_ratio,
            self.config.base_steps,
            sentiment_weight.max(Decimal::ONE),
        );

        let inputs = LadderInputs {
            avg_rate,
            guess_rate: guess,
            last_hour_high: snapshot.candles.last_hour_high.map(|r| r * safety_factor),
            high_avg_12h: snapshot.candles.high_avg_12h,
            minimum_rate,
            step_count,
            fund_shares,
        };
        let levels = generate_levels(&inputs, &self.tiers, self.config.default_period_days);

        debug!(
            sentiment = %snapshot.sentiment,
            avg_rate = %inputs.avg_rate,
            guess_rate = %inputs.guess_rate,
            base_rate = %inputs.base_rate(),
            steps = step_count,
            safety_factor = %safety_factor,
            panic,
            "Ladder planned"
        );

        LadderPlan {
            inputs,
            levels,
            sentiment: snapshot.sentiment,
            sentiment_weight,
            safety_factor,
            volatility,
            volume_change,
            panic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendbot_core::{BookEntry, Candle, FundingStat, TenorBucket};
    use rust_decimal_macros::dec;

    fn r(d: Decimal) -> Rate {
        Rate::new(d)
    }

    fn example_inputs() -> LadderInputs {
        LadderInputs {
            avg_rate: r(dec!(0.0003)),
            guess_rate: r(dec!(0.0012)),
            last_hour_high: Some(r(dec!(0.0005))),
            high_avg_12h: Some(r(dec!(0.0004))),
            minimum_rate: r(dec!(0.0002)),
            step_count: 3,
            fund_shares: vec![dec!(0.2), dec!(0.3), dec!(0.5)],
        }
    }

    #[test]
    fn test_reference_ladder() {
        let inputs = example_inputs();
        assert_eq!(inputs.base_rate(), r(dec!(0.0005)));

        let levels = generate_levels(&inputs, &TierTable::default(), 2);
        let rates: Vec<_> = levels.iter().map(|l| l.rate).collect();
        assert_eq!(rates, vec![r(dec!(0.0008)), r(dec!(0.0011)), r(dec!(0.0014))]);

        let periods: Vec<_> = levels.iter().map(|l| l.period_days).collect();
        assert_eq!(periods, vec![90, 120, 120]);

        let shares: Vec<_> = levels.iter().map(|l| l.fund_share).collect();
        assert_eq!(shares, vec![dec!(0.2), dec!(0.3), dec!(0.5)]);
    }

    #[test]
    fn test_missing_candle_rates_excluded_from_base() {
        let inputs = LadderInputs {
            last_hour_high: None,
            high_avg_12h: None,
            ..example_inputs()
        };
        assert_eq!(inputs.base_rate(), r(dec!(0.0003)));
    }

    #[test]
    fn test_zero_steps_yields_empty_ladder() {
        let inputs = LadderInputs {
            step_count: 0,
            fund_shares: vec![],
            ..example_inputs()
        };
        assert!(generate_levels(&inputs, &TierTable::default(), 2).is_empty());
    }

    #[test]
    fn test_rates_rounded_to_five_places() {
        let inputs = LadderInputs {
            guess_rate: r(dec!(0.0010001)),
            ..example_inputs()
        };
        for level in generate_levels(&inputs, &TierTable::default(), 2) {
            assert_eq!(level.rate.inner(), level.rate.inner().round_dp(5));
        }
    }

    #[test]
    fn test_short_share_list_falls_back_to_uniform() {
        let inputs = LadderInputs {
            fund_shares: vec![dec!(0.5)],
            ..example_inputs()
        };
        let levels = generate_levels(&inputs, &TierTable::default(), 2);
        assert_eq!(levels[0].fund_share, dec!(0.5));
        assert_eq!(levels[1].fund_share, Decimal::ONE / dec!(3));
    }

    fn snapshot() -> MarketSnapshot {
        let mut stats = vec![FundingStat {
            timestamp_ms: 0,
            amount_used: dec!(100),
        }];
        stats.extend((0..12).map(|_| FundingStat {
            timestamp_ms: 0,
            amount_used: dec!(100),
        }));
        let book = vec![BookEntry {
            rate: r(dec!(0.0003)),
            period_days: 2,
            count: 1,
            amount: dec!(9999),
        }];
        let candles: Vec<_> = (0..24)
            .map(|_| Candle {
                timestamp_ms: 0,
                open: r(dec!(0.0002)),
                close: r(dec!(0.0003)),
                high: r(dec!(0.0004)),
                low: r(dec!(0.0002)),
                volume: dec!(1),
            })
            .collect();
        let (snapshot, issues) = MarketSnapshot::build(
            Some(stats.as_slice()),
            Some(book.as_slice()),
            Some(candles.as_slice()),
            &TenorBucket::defaults(),
        );
        assert!(issues.is_empty());
        snapshot
    }

    #[test]
    fn test_plan_dynamic() {
        let generator = LadderGenerator::new(StrategyConfig::default(), TierTable::default());
        let mut history = RateHistory::new(24);
        let plan = generator.plan(&snapshot(), &mut history);

        assert_eq!(history.len(), 1);
        assert_eq!(plan.sentiment, Decimal::ONE);
        assert!(!plan.panic);
        assert_eq!(plan.inputs.step_count, 3);
        assert_eq!(plan.levels.len(), 3);
        // Flat candles: zero volatility, neutral sentiment.
        assert_eq!(plan.safety_factor, dec!(0.97));
        assert_eq!(plan.inputs.last_hour_high, Some(r(dec!(0.000388))));
        // avg = 0.0003*9999/10000
        assert_eq!(plan.inputs.avg_rate, r(dec!(0.00029997)));
        // max(0.0002, min(0.00016→0.0002, 0.000089991)) = 0.0002
        assert_eq!(plan.inputs.minimum_rate, r(dec!(0.0002)));
        assert_eq!(plan.base_rate(), r(dec!(0.0004)));
        assert!(plan.levels.windows(2).all(|w| w[0].rate <= w[1].rate));
    }

    #[test]
    fn test_plan_static_when_dynamic_disabled() {
        let config = StrategyConfig {
            dynamic_optimization: false,
            ..Default::default()
        };
        let generator = LadderGenerator::new(config, TierTable::default());
        let mut history = RateHistory::new(24);
        let plan = generator.plan(&snapshot(), &mut history);

        assert_eq!(plan.safety_factor, dec!(0.95));
        assert_eq!(plan.inputs.fund_shares, vec![Decimal::ONE / dec!(3); 3]);
        assert_eq!(plan.inputs.minimum_rate, r(dec!(0.0002)));
        // sentiment 1 / 8 → ratio floored at 1
        assert_eq!(plan.sentiment_weight, dec!(0.125));
    }
}
