//! Per-strategy signal evaluation.
//!
//! Every entry point returns a signal for every input; bad data degrades to
//! NEUTRAL with a flag instead of surfacing an error. The confidence model
//! is shared across strategies: 0.6 base for any directional call, +0.1 for
//! an RSI sweet spot, +0.1 for strong distance from the reference level,
//! -0.2 for weak participation, clamped to [0, 1].

use chrono::{DateTime, Duration, Utc};

use crate::market::indicators;
use crate::market::snapshot::{MarketSnapshot, REQUIRED_LOOKBACK};

use super::selector::{Strategy, StrategyDirective};
use super::signals::{Direction, SignalFlag, TradingSignal};

#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub max_snapshot_age: Duration,
    pub fast_ma_period: usize,
    pub slow_ma_period: usize,
    pub rsi_period: usize,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Fractional distance from the reference level that earns +0.1.
    pub strong_distance_pct: f64,
    /// Latest volume below this fraction of trailing average costs 0.2.
    pub weak_volume_ratio: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            max_snapshot_age: Duration::minutes(5),
            fast_ma_period: 9,
            slow_ma_period: 21,
            rsi_period: 14,
            bollinger_window: 20,
            bollinger_k: 2.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            strong_distance_pct: 0.002,
            weak_volume_ratio: 0.7,
        }
    }
}

const BASE_CONFIDENCE: f64 = 0.6;
const SWEET_SPOT_BONUS: f64 = 0.1;
const DISTANCE_BONUS: f64 = 0.1;
const WEAK_VOLUME_PENALTY: f64 = 0.2;
/// Confidence for a mean-reversion extreme the bands did not confirm.
const UNCONFIRMED_REVERSION_CONFIDENCE: f64 = 0.4;

pub struct SignalEngine {
    config: SignalConfig,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    /// Evaluate one snapshot under the cycle's directive. Total function:
    /// stale, thin, or broken data yields a flagged NEUTRAL, never an error.
    pub fn evaluate(
        &self,
        directive: &StrategyDirective,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> TradingSignal {
        let strategy = directive.strategy;

        if strategy == Strategy::C {
            return TradingSignal::neutral(&snapshot.symbol, strategy, None);
        }

        if snapshot.is_stale(now, self.config.max_snapshot_age) {
            tracing::debug!(
                "⏸️ {} snapshot is {}s old - ignoring",
                snapshot.symbol,
                snapshot.age(now).num_seconds()
            );
            return TradingSignal::neutral(&snapshot.symbol, strategy, Some(SignalFlag::StaleData));
        }

        if !snapshot.last.is_finite() || snapshot.last <= 0.0 {
            return TradingSignal::neutral(
                &snapshot.symbol,
                strategy,
                Some(SignalFlag::InsufficientData),
            );
        }

        if !snapshot.has_lookback(REQUIRED_LOOKBACK) {
            tracing::debug!(
                "⏸️ {} has {} bars, need {} - degrading to NEUTRAL",
                snapshot.symbol,
                snapshot.closes.len(),
                REQUIRED_LOOKBACK
            );
            return TradingSignal::neutral(
                &snapshot.symbol,
                strategy,
                Some(SignalFlag::InsufficientData),
            );
        }

        match strategy {
            Strategy::A => self.evaluate_momentum(directive, snapshot),
            Strategy::B => self.evaluate_mean_reversion(directive, snapshot),
            Strategy::C => unreachable!("handled above"),
        }
    }

    /// Strategy A: fast/slow EMA crossover, RSI in the momentum band, and
    /// price on the confirming side of VWAP. All three or nothing.
    fn evaluate_momentum(
        &self,
        directive: &StrategyDirective,
        snapshot: &MarketSnapshot,
    ) -> TradingSignal {
        let cfg = &self.config;
        // A session VWAP from the feed beats one reconstructed from bars.
        let vwap_input = match snapshot.vwap {
            Some(v) if v.is_finite() && v > 0.0 => Ok(v),
            _ => indicators::vwap(
                &snapshot.closes,
                &snapshot.highs,
                &snapshot.lows,
                &snapshot.volumes,
            ),
        };
        let inputs = (
            indicators::ema(&snapshot.closes, cfg.fast_ma_period),
            indicators::ema(&snapshot.closes, cfg.slow_ma_period),
            indicators::rsi(&snapshot.closes, cfg.rsi_period),
            vwap_input,
        );
        let (Ok(fast), Ok(slow), Ok(rsi), Ok(vwap)) = inputs else {
            return TradingSignal::neutral(
                &snapshot.symbol,
                directive.strategy,
                Some(SignalFlag::InsufficientData),
            );
        };

        let price = snapshot.last;
        let long_setup = fast > slow && rsi > 50.0 && rsi < cfg.rsi_overbought && price > vwap;
        let short_setup = fast < slow && rsi < 50.0 && rsi > cfg.rsi_oversold && price < vwap;

        let direction = if long_setup {
            Direction::Long
        } else if short_setup {
            Direction::Short
        } else {
            return TradingSignal::neutral(&snapshot.symbol, directive.strategy, None);
        };

        let sweet_spot = match direction {
            Direction::Long => (55.0..=65.0).contains(&rsi),
            Direction::Short => (35.0..=45.0).contains(&rsi),
            Direction::Neutral => false,
        };
        let strong_distance = (price - vwap).abs() / vwap >= cfg.strong_distance_pct;

        let confidence = self.score(BASE_CONFIDENCE, sweet_spot, strong_distance, snapshot);

        tracing::debug!(
            "📈 {} momentum {}: fast={:.2} slow={:.2} rsi={:.1} vwap={:.2} conf={:.2}",
            snapshot.symbol,
            direction,
            fast,
            slow,
            rsi,
            vwap,
            confidence
        );

        TradingSignal::directional(
            &snapshot.symbol,
            directive.strategy,
            direction,
            confidence,
            price,
            &directive.envelope,
        )
    }

    /// Strategy B: RSI extreme plus a band touch. An extreme the bands do
    /// not confirm still reports its direction, but never confidently.
    fn evaluate_mean_reversion(
        &self,
        directive: &StrategyDirective,
        snapshot: &MarketSnapshot,
    ) -> TradingSignal {
        let cfg = &self.config;
        let inputs = (
            indicators::rsi(&snapshot.closes, cfg.rsi_period),
            indicators::bollinger(&snapshot.closes, cfg.bollinger_window, cfg.bollinger_k),
        );
        let (Ok(rsi), Ok((upper, _mid, lower))) = inputs else {
            return TradingSignal::neutral(
                &snapshot.symbol,
                directive.strategy,
                Some(SignalFlag::InsufficientData),
            );
        };

        let price = snapshot.last;
        let (direction, band, band_touched) = if rsi <= cfg.rsi_oversold {
            (Direction::Long, lower, price <= lower)
        } else if rsi >= cfg.rsi_overbought {
            (Direction::Short, upper, price >= upper)
        } else {
            return TradingSignal::neutral(&snapshot.symbol, directive.strategy, None);
        };

        let confidence = if band_touched {
            let deep_extreme = match direction {
                Direction::Long => rsi <= cfg.rsi_oversold - 5.0,
                Direction::Short => rsi >= cfg.rsi_overbought + 5.0,
                Direction::Neutral => false,
            };
            let strong_distance = (price - band).abs() / price >= cfg.strong_distance_pct;
            self.score(BASE_CONFIDENCE, deep_extreme, strong_distance, snapshot)
        } else {
            // Extreme without band confirmation: direction stands, but the
            // score stays under 0.5 so the gate's consumers treat it as weak.
            self.score(UNCONFIRMED_REVERSION_CONFIDENCE, false, false, snapshot)
        };

        tracing::debug!(
            "📉 {} reversion {}: rsi={:.1} band={:.2} touched={} conf={:.2}",
            snapshot.symbol,
            direction,
            rsi,
            band,
            band_touched,
            confidence
        );

        TradingSignal::directional(
            &snapshot.symbol,
            directive.strategy,
            direction,
            confidence,
            price,
            &directive.envelope,
        )
    }

    fn score(
        &self,
        base: f64,
        sweet_spot: bool,
        strong_distance: bool,
        snapshot: &MarketSnapshot,
    ) -> f64 {
        let mut confidence = base;
        if sweet_spot {
            confidence += SWEET_SPOT_BONUS;
        }
        if strong_distance {
            confidence += DISTANCE_BONUS;
        }
        if self.participation_is_weak(snapshot) {
            confidence -= WEAK_VOLUME_PENALTY;
        }
        confidence.clamp(0.0, 1.0)
    }

    fn participation_is_weak(&self, snapshot: &MarketSnapshot) -> bool {
        match indicators::volume_ratio(&snapshot.volumes, self.config.bollinger_window) {
            Ok(ratio) => ratio < self.config.weak_volume_ratio,
            // Thin volume history already degraded the signal elsewhere.
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::MarketRegime;

    fn directive(strategy: Strategy) -> StrategyDirective {
        StrategyDirective {
            strategy,
            allowed_symbols: strategy.default_symbols(),
            position_size_multiplier: strategy.default_multiplier(),
            envelope: strategy.envelope(),
            regime: MarketRegime::Normal,
            created_at: Utc::now(),
        }
    }

    fn snapshot(closes: Vec<f64>, volumes: Vec<f64>) -> MarketSnapshot {
        let last = *closes.last().unwrap();
        let volume = *volumes.last().unwrap();
        MarketSnapshot {
            symbol: "SPY".to_string(),
            timestamp: Utc::now(),
            last,
            bid: last - 0.05,
            ask: last + 0.05,
            volume,
            vwap: None,
            highs: closes.iter().map(|c| c + 0.5).collect(),
            lows: closes.iter().map(|c| c - 0.5).collect(),
            closes,
            volumes,
        }
    }

    /// 30 bars alternating +1.0 / -0.75: a steady uptrend whose trailing
    /// 14-change RSI lands near 57.
    fn steady_uptrend() -> MarketSnapshot {
        let mut closes = vec![100.0];
        for i in 0..29 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last + 1.0 } else { last - 0.75 });
        }
        let volumes = vec![1_000_000.0; 30];
        snapshot(closes, volumes)
    }

    fn steady_downtrend() -> MarketSnapshot {
        let mut closes = vec![100.0];
        for i in 0..29 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last - 1.0 } else { last + 0.75 });
        }
        snapshot(closes, vec![1_000_000.0; 30])
    }

    #[test]
    fn momentum_uptrend_goes_long_with_confidence() {
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(&directive(Strategy::A), &steady_uptrend(), Utc::now());

        assert_eq!(signal.direction, Direction::Long);
        assert!(signal.confidence >= 0.6, "confidence {}", signal.confidence);
        assert!(signal.entry_price.is_some());
        assert!(signal.stop_loss.unwrap() < signal.entry_price.unwrap());
        assert!(signal.take_profit.unwrap() > signal.entry_price.unwrap());
    }

    #[test]
    fn momentum_downtrend_goes_short() {
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(&directive(Strategy::A), &steady_downtrend(), Utc::now());

        assert_eq!(signal.direction, Direction::Short);
        assert!(signal.stop_loss.unwrap() > signal.entry_price.unwrap());
    }

    #[test]
    fn feed_vwap_overrides_the_derived_one() {
        let engine = SignalEngine::new(SignalConfig::default());

        // Same uptrend, but the feed says the session VWAP sits far above
        // the last price: the long's price-above-VWAP leg fails.
        let mut snap = steady_uptrend();
        snap.vwap = Some(snap.last * 2.0);
        let signal = engine.evaluate(&directive(Strategy::A), &snap, Utc::now());
        assert_eq!(signal.direction, Direction::Neutral);

        // A broken hint falls back to the derived VWAP.
        let mut snap = steady_uptrend();
        snap.vwap = Some(f64::NAN);
        let signal = engine.evaluate(&directive(Strategy::A), &snap, Utc::now());
        assert_eq!(signal.direction, Direction::Long);
    }

    #[test]
    fn momentum_needs_all_three_legs() {
        let engine = SignalEngine::new(SignalConfig::default());
        // Flat tape: no crossover edge, RSI mid, price at VWAP.
        let flat = snapshot(vec![100.0; 30], vec![1_000_000.0; 30]);
        let signal = engine.evaluate(&directive(Strategy::A), &flat, Utc::now());
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn weak_volume_costs_two_tenths() {
        let engine = SignalEngine::new(SignalConfig::default());

        let strong = engine.evaluate(&directive(Strategy::A), &steady_uptrend(), Utc::now());

        let mut thin = steady_uptrend();
        let n = thin.volumes.len();
        thin.volumes[n - 1] = 100_000.0;
        let weak = engine.evaluate(&directive(Strategy::A), &thin, Utc::now());

        assert_eq!(weak.direction, Direction::Long);
        assert!((strong.confidence - weak.confidence - 0.2).abs() < 1e-9);
    }

    #[test]
    fn stale_snapshot_degrades_to_flagged_neutral() {
        let engine = SignalEngine::new(SignalConfig::default());
        let mut snap = steady_uptrend();
        let now = Utc::now();
        snap.timestamp = now - Duration::minutes(30);

        let signal = engine.evaluate(&directive(Strategy::A), &snap, now);
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.flag, Some(SignalFlag::StaleData));
    }

    #[test]
    fn thin_history_degrades_to_flagged_neutral() {
        let engine = SignalEngine::new(SignalConfig::default());
        let snap = snapshot(vec![100.0, 101.0, 102.0], vec![1.0, 1.0, 1.0]);

        let signal = engine.evaluate(&directive(Strategy::A), &snap, Utc::now());
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.flag, Some(SignalFlag::InsufficientData));
    }

    #[test]
    fn broken_price_field_degrades_to_neutral() {
        let engine = SignalEngine::new(SignalConfig::default());
        let mut snap = steady_uptrend();
        snap.last = f64::NAN;

        let signal = engine.evaluate(&directive(Strategy::A), &snap, Utc::now());
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn strategy_c_never_signals() {
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(&directive(Strategy::C), &steady_uptrend(), Utc::now());
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.confidence, 0.0);
    }

    /// Capitulation tape: flat for 29 bars, then a 20-point plunge that
    /// punches through the lower band with RSI pinned at 0.
    fn capitulation() -> MarketSnapshot {
        let mut closes = vec![100.0; 29];
        closes.push(80.0);
        snapshot(closes, vec![1_000_000.0; 30])
    }

    /// Gentle steady slide: every change is a loss (RSI 0), but the decline
    /// is too orderly for the last price to breach the lower band.
    fn gradual_slide() -> MarketSnapshot {
        let closes: Vec<f64> = (0..30).map(|i| 110.0 - 0.3 * i as f64).collect();
        snapshot(closes, vec![1_000_000.0; 30])
    }

    #[test]
    fn reversion_extreme_with_band_touch_is_confident() {
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(&directive(Strategy::B), &capitulation(), Utc::now());

        assert_eq!(signal.direction, Direction::Long);
        assert!(signal.confidence >= 0.6, "confidence {}", signal.confidence);
    }

    #[test]
    fn reversion_extreme_without_band_touch_stays_below_half() {
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(&directive(Strategy::B), &gradual_slide(), Utc::now());

        assert_eq!(signal.direction, Direction::Long);
        assert!(signal.confidence < 0.5, "confidence {}", signal.confidence);
    }

    #[test]
    fn reversion_midrange_rsi_is_neutral() {
        let engine = SignalEngine::new(SignalConfig::default());
        let snap = steady_uptrend();
        let signal = engine.evaluate(&directive(Strategy::B), &snap, Utc::now());
        assert_eq!(signal.direction, Direction::Neutral);
    }

    #[test]
    fn confidence_is_always_in_unit_range() {
        let engine = SignalEngine::new(SignalConfig::default());
        let cases = vec![
            steady_uptrend(),
            steady_downtrend(),
            capitulation(),
            gradual_slide(),
            snapshot(vec![100.0; 30], vec![0.0; 30]),
            snapshot(vec![1e-9; 30], vec![1.0; 30]),
        ];
        for snap in cases {
            for strategy in [Strategy::A, Strategy::B, Strategy::C] {
                let signal = engine.evaluate(&directive(strategy), &snap, Utc::now());
                assert!((0.0..=1.0).contains(&signal.confidence));
            }
        }
    }
}
