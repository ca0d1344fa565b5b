use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::selector::{RiskEnvelope, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Why a signal was degraded to NEUTRAL, when it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalFlag {
    StaleData,
    InsufficientData,
}

/// A directional read on one symbol for one cycle.
///
/// Entry/stop/target prices exist exactly when the direction is not
/// NEUTRAL, and a NEUTRAL signal always carries confidence 0. Both rules
/// are enforced by the constructors rather than trusted to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub symbol: String,
    pub strategy: Strategy,
    pub direction: Direction,
    pub confidence: f64,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub flag: Option<SignalFlag>,
    pub timestamp: DateTime<Utc>,
}

impl TradingSignal {
    pub fn neutral(symbol: &str, strategy: Strategy, flag: Option<SignalFlag>) -> Self {
        Self {
            symbol: symbol.to_string(),
            strategy,
            direction: Direction::Neutral,
            confidence: 0.0,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            flag,
            timestamp: Utc::now(),
        }
    }

    /// Build a directional signal, deriving stop/target from the strategy's
    /// risk envelope. `direction` must not be NEUTRAL.
    pub fn directional(
        symbol: &str,
        strategy: Strategy,
        direction: Direction,
        confidence: f64,
        entry_price: f64,
        envelope: &RiskEnvelope,
    ) -> Self {
        debug_assert_ne!(direction, Direction::Neutral);

        let (stop_loss, take_profit) = match direction {
            Direction::Long => (
                entry_price * (1.0 - envelope.stop_loss_pct),
                entry_price * (1.0 + envelope.take_profit_pct),
            ),
            Direction::Short => (
                entry_price * (1.0 + envelope.stop_loss_pct),
                entry_price * (1.0 - envelope.take_profit_pct),
            ),
            Direction::Neutral => (entry_price, entry_price),
        };

        Self {
            symbol: symbol.to_string(),
            strategy,
            direction,
            confidence: confidence.clamp(0.0, 1.0),
            entry_price: Some(entry_price),
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            flag: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_directional(&self) -> bool {
        self.direction != Direction::Neutral
    }
}
