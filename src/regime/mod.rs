//! Volatility regime classification. The one rule that matters: any reading
//! we cannot trust maps to `Crisis`, never to a tradeable regime.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketRegime {
    Complacency,
    Normal,
    Elevated,
    Crisis,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Complacency => write!(f, "complacency"),
            MarketRegime::Normal => write!(f, "normal"),
            MarketRegime::Elevated => write!(f, "elevated"),
            MarketRegime::Crisis => write!(f, "crisis"),
        }
    }
}

impl MarketRegime {
    pub fn implied_strategy(&self) -> Strategy {
        match self {
            MarketRegime::Complacency | MarketRegime::Normal => Strategy::A,
            MarketRegime::Elevated => Strategy::B,
            MarketRegime::Crisis => Strategy::C,
        }
    }
}

/// Map a volatility index reading to a regime. Absent, NaN, zero, or
/// negative readings classify as `Crisis` unconditionally. Total function:
/// no input panics.
pub fn classify(reading: Option<f64>) -> MarketRegime {
    let vix = match reading {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => {
            tracing::warn!("⚠️ Volatility reading missing or invalid - assuming crisis regime");
            return MarketRegime::Crisis;
        }
    };

    if vix < 15.0 {
        MarketRegime::Complacency
    } else if vix < 18.0 {
        MarketRegime::Normal
    } else if vix < 25.0 {
        MarketRegime::Elevated
    } else {
        MarketRegime::Crisis
    }
}
