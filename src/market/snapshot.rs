use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Longest lookback any evaluator needs (the 21-period slow moving average).
pub const REQUIRED_LOOKBACK: usize = 21;

/// One immutable observation of a symbol, produced by the data feed.
///
/// History vectors run oldest to newest. A snapshot with too little history
/// is still valid; evaluators degrade it to a NEUTRAL call instead of
/// rejecting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: f64,
    /// Session VWAP as reported by the feed; evaluators derive one from the
    /// bar history when it is absent.
    pub vwap: Option<f64>,
    #[serde(default)]
    pub closes: Vec<f64>,
    #[serde(default)]
    pub highs: Vec<f64>,
    #[serde(default)]
    pub lows: Vec<f64>,
    #[serde(default)]
    pub volumes: Vec<f64>,
}

impl MarketSnapshot {
    pub fn has_lookback(&self, bars: usize) -> bool {
        self.closes.len() >= bars
            && self.highs.len() >= bars
            && self.lows.len() >= bars
            && self.volumes.len() >= bars
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_bars(bars: usize) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "SPY".to_string(),
            timestamp: Utc::now(),
            last: 450.0,
            bid: 449.95,
            ask: 450.05,
            volume: 1_000_000.0,
            vwap: Some(449.5),
            closes: vec![450.0; bars],
            highs: vec![451.0; bars],
            lows: vec![449.0; bars],
            volumes: vec![1_000_000.0; bars],
        }
    }

    #[test]
    fn short_history_is_valid_but_flagged() {
        let snap = snapshot_with_bars(5);
        assert!(!snap.has_lookback(REQUIRED_LOOKBACK));
        assert_eq!(snap.latest_close(), Some(450.0));
    }

    #[test]
    fn staleness_uses_snapshot_age() {
        let mut snap = snapshot_with_bars(REQUIRED_LOOKBACK);
        let now = Utc::now();
        snap.timestamp = now - Duration::minutes(10);
        assert!(snap.is_stale(now, Duration::minutes(5)));
        assert!(!snap.is_stale(now, Duration::minutes(15)));
    }
}
