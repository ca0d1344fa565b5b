use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::config::{CatalystEntry, GameplanConfig};
use crate::regime::MarketRegime;

/// Symbols strategy A may trade, in preference order.
pub const STRATEGY_A_WHITELIST: [&str; 2] = ["SPY", "QQQ"];
/// The single symbol strategy B trades.
pub const STRATEGY_B_SYMBOL: &str = "SPY";

/// Strategy tiers, ordered least to most conservative. `C` means stand down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strategy {
    A,
    B,
    C,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::A => write!(f, "A (momentum)"),
            Strategy::B => write!(f, "B (mean reversion)"),
            Strategy::C => write!(f, "C (stand down)"),
        }
    }
}

impl Strategy {
    fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Strategy::A),
            "B" => Some(Strategy::B),
            "C" => Some(Strategy::C),
            _ => None,
        }
    }

    pub fn default_symbols(&self) -> Vec<String> {
        match self {
            Strategy::A => STRATEGY_A_WHITELIST.iter().map(|s| s.to_string()).collect(),
            Strategy::B => vec![STRATEGY_B_SYMBOL.to_string()],
            Strategy::C => Vec::new(),
        }
    }

    pub fn default_multiplier(&self) -> f64 {
        match self {
            Strategy::A => 1.0,
            Strategy::B => 0.5,
            Strategy::C => 0.0,
        }
    }

    pub fn envelope(&self) -> RiskEnvelope {
        match self {
            Strategy::A => RiskEnvelope {
                max_risk_pct: 0.02,
                max_position_pct: 0.20,
                take_profit_pct: 0.30,
                stop_loss_pct: 0.15,
                time_stop: Duration::hours(4),
            },
            Strategy::B => RiskEnvelope {
                max_risk_pct: 0.01,
                max_position_pct: 0.10,
                take_profit_pct: 0.15,
                stop_loss_pct: 0.10,
                time_stop: Duration::hours(2),
            },
            Strategy::C => RiskEnvelope::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskEnvelope {
    pub max_risk_pct: f64,
    pub max_position_pct: f64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub time_stop: Duration,
}

impl RiskEnvelope {
    pub fn zero() -> Self {
        Self {
            max_risk_pct: 0.0,
            max_position_pct: 0.0,
            take_profit_pct: 0.0,
            stop_loss_pct: 0.0,
            time_stop: Duration::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalystKind {
    Earnings,
    Macro,
    News,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalystImpact {
    Low,
    High,
}

#[derive(Debug, Clone)]
pub struct Catalyst {
    pub kind: CatalystKind,
    pub impact: CatalystImpact,
    pub symbol: Option<String>,
}

impl Catalyst {
    /// Unknown kinds parse as news; unknown impact levels parse as high.
    pub fn from_entry(entry: &CatalystEntry) -> Self {
        let kind = match entry.kind.trim().to_ascii_lowercase().as_str() {
            "earnings" => CatalystKind::Earnings,
            "macro" | "fomc" | "cpi" => CatalystKind::Macro,
            _ => CatalystKind::News,
        };
        let impact = match entry.impact.trim().to_ascii_lowercase().as_str() {
            "low" => CatalystImpact::Low,
            _ => CatalystImpact::High,
        };
        Self {
            kind,
            impact,
            symbol: entry.symbol.clone(),
        }
    }
}

/// Boolean circuit breakers evaluated before any catalyst logic.
/// Any one of them forces strategy C for the cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyOverrides {
    pub data_quarantine_active: bool,
    pub weekly_drawdown_governor_active: bool,
    pub pivot_limit_hit: bool,
    pub earnings_blackout_hit: bool,
}

impl SafetyOverrides {
    pub fn any(&self) -> bool {
        self.data_quarantine_active
            || self.weekly_drawdown_governor_active
            || self.pivot_limit_hit
            || self.earnings_blackout_hit
    }
}

/// The ground truth for one decision cycle. Built once by the selector,
/// read-only afterward.
#[derive(Debug, Clone)]
pub struct StrategyDirective {
    pub strategy: Strategy,
    pub allowed_symbols: Vec<String>,
    pub position_size_multiplier: f64,
    pub envelope: RiskEnvelope,
    pub regime: MarketRegime,
    pub created_at: DateTime<Utc>,
}

impl StrategyDirective {
    /// Maximally conservative directive, used whenever the gameplan is
    /// missing, malformed, or quarantined.
    pub fn stand_down(regime: MarketRegime) -> Self {
        Self {
            strategy: Strategy::C,
            allowed_symbols: Vec::new(),
            position_size_multiplier: 0.0,
            envelope: RiskEnvelope::zero(),
            regime,
            created_at: Utc::now(),
        }
    }

    pub fn is_stand_down(&self) -> bool {
        self.strategy == Strategy::C
    }
}

pub struct StrategySelector;

impl StrategySelector {
    pub fn new() -> Self {
        Self
    }

    /// Combine regime, gameplan, catalysts, and overrides into the cycle's
    /// directive. Every rule below may only downgrade - once at C, nothing
    /// restores A or B.
    pub fn select(
        &self,
        regime: MarketRegime,
        gameplan: Option<&GameplanConfig>,
        overrides: &SafetyOverrides,
    ) -> StrategyDirective {
        let gameplan = match gameplan {
            Some(plan) if !plan.data_quality.quarantine_active => plan,
            Some(_) => {
                tracing::warn!("🔒 Data quarantine active - standing down");
                return StrategyDirective::stand_down(regime);
            }
            None => {
                tracing::warn!("🔒 No usable gameplan - standing down");
                return StrategyDirective::stand_down(regime);
            }
        };

        if overrides.any() {
            tracing::warn!(
                "🔒 Safety override active (quarantine={}, governor={}, pivots={}, blackout={}) - standing down",
                overrides.data_quarantine_active,
                overrides.weekly_drawdown_governor_active,
                overrides.pivot_limit_hit,
                overrides.earnings_blackout_hit,
            );
            return StrategyDirective::stand_down(regime);
        }

        // Regime sets the ceiling; the gameplan may only propose something
        // more conservative, never less.
        let mut strategy = regime.implied_strategy();
        if let Some(proposed) = gameplan.strategy.as_deref().and_then(Strategy::parse) {
            strategy = strategy.max(proposed);
        }

        let symbols = candidate_symbols(strategy, &gameplan.symbols);
        let mut multiplier = strategy.default_multiplier();
        if let Some(plan_mult) = gameplan.position_size_multiplier {
            multiplier = multiplier.min(plan_mult.clamp(0.0, 1.0));
        }

        let catalysts: Vec<Catalyst> =
            gameplan.catalysts.iter().map(Catalyst::from_entry).collect();

        // An earnings catalyst on any symbol we would actually trade is a
        // hard stop, whatever its impact tag says.
        if strategy != Strategy::C {
            let blackout = catalysts.iter().any(|c| {
                c.kind == CatalystKind::Earnings
                    && c.symbol
                        .as_deref()
                        .map(|s| symbols.iter().any(|sym| sym == s))
                        .unwrap_or(false)
            });
            if blackout {
                tracing::warn!("🔒 Earnings blackout on a candidate symbol - standing down");
                strategy = Strategy::C;
            }
        }

        if strategy != Strategy::C {
            let high_impact = catalysts
                .iter()
                .filter(|c| c.impact == CatalystImpact::High)
                .count();
            match high_impact {
                0 => {}
                1 => multiplier = multiplier.min(0.5),
                _ => {
                    tracing::warn!(
                        "🔒 {} high-impact catalysts in play - standing down",
                        high_impact
                    );
                    strategy = Strategy::C;
                }
            }
        }

        if strategy == Strategy::C {
            return StrategyDirective::stand_down(regime);
        }

        if symbols.is_empty() {
            tracing::warn!("⚠️ Gameplan left no tradeable symbols for strategy {}", strategy);
        }
        // A stray negative or >1 multiplier from the gameplan never survives.
        multiplier = multiplier.clamp(0.0, 1.0);

        let directive = StrategyDirective {
            strategy,
            allowed_symbols: symbols,
            position_size_multiplier: multiplier,
            envelope: strategy.envelope(),
            regime,
            created_at: Utc::now(),
        };

        tracing::info!(
            "🎯 Directive: {} | regime={} | symbols={:?} | multiplier={:.2}",
            directive.strategy,
            directive.regime,
            directive.allowed_symbols,
            directive.position_size_multiplier
        );

        directive
    }
}

/// Intersect the gameplan's symbol list with the strategy whitelist,
/// preserving whitelist order and size bounds. An empty gameplan list means
/// "use the defaults".
fn candidate_symbols(strategy: Strategy, requested: &[String]) -> Vec<String> {
    let defaults = strategy.default_symbols();
    if requested.is_empty() {
        return defaults;
    }
    defaults
        .into_iter()
        .filter(|sym| requested.iter().any(|r| r == sym))
        .collect()
}
