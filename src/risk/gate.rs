//! The single mandatory checkpoint between a signal and the broker.
//!
//! Every check runs on every request and every failure is reported, so an
//! operator reading one rejection sees the complete picture. New entries
//! have no bypass path; closing orders skip the entry-sizing checks (they
//! only reduce risk) but still pass through here so each execution carries
//! a validation record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::core::config::HardLimits;
use crate::positions::ClosureTrigger;
use crate::strategy::StrategyDirective;

use super::ledger::SessionLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderIntent {
    /// Opens or adds risk; subject to every gate check.
    Entry,
    /// Reduces or liquidates an existing position.
    Close { trigger: ClosureTrigger },
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub limit_price: f64,
    pub stop_price: Option<f64>,
    pub intent: OrderIntent,
}

impl OrderRequest {
    pub fn entry(
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        limit_price: f64,
        stop_price: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            limit_price,
            stop_price,
            intent: OrderIntent::Entry,
        }
    }

    pub fn close(
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        limit_price: f64,
        trigger: ClosureTrigger,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            limit_price,
            stop_price: None,
            intent: OrderIntent::Close { trigger },
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self.intent, OrderIntent::Entry)
    }

    pub fn notional(&self) -> f64 {
        self.quantity * self.limit_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    DayTradeBudgetExhausted,
    PositionTooLarge,
    RiskTooLarge,
    DailyLossLimitReached,
    DrawdownGovernorActive,
    InsufficientCapital,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::DayTradeBudgetExhausted => write!(f, "day-trade budget exhausted"),
            RejectReason::PositionTooLarge => write!(f, "position exceeds max position size"),
            RejectReason::RiskTooLarge => write!(f, "projected risk exceeds max risk"),
            RejectReason::DailyLossLimitReached => write!(f, "daily loss limit reached"),
            RejectReason::DrawdownGovernorActive => write!(f, "weekly drawdown governor active"),
            RejectReason::InsufficientCapital => write!(f, "insufficient capital for minimum unit"),
        }
    }
}

/// The risk numbers a decision was made on, frozen into the result.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RiskMetrics {
    pub equity: f64,
    pub requested_value: f64,
    pub projected_risk: f64,
    pub max_position_value: f64,
    pub max_risk_value: f64,
    pub daily_pnl: f64,
    pub weekly_pnl: f64,
    pub day_trades_remaining: u32,
}

/// Outcome of one gate pass. Produced fresh per attempt, never reused.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub approved: bool,
    pub reasons: Vec<RejectReason>,
    pub metrics: RiskMetrics,
    pub validated_at: DateTime<Utc>,
}

/// An order request fused with the validation that approved it. The only
/// way to obtain one is through a `ValidationResult` with `approved ==
/// true`, which makes the mandatory-gate rule a property of the type
/// system rather than of code review.
#[derive(Debug, Clone)]
pub struct ApprovedOrder {
    request: OrderRequest,
    validation: ValidationResult,
}

impl ApprovedOrder {
    pub fn new(request: OrderRequest, validation: ValidationResult) -> Option<Self> {
        if validation.approved {
            Some(Self {
                request,
                validation,
            })
        } else {
            None
        }
    }

    pub fn request(&self) -> &OrderRequest {
        &self.request
    }

    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    pub fn into_parts(self) -> (OrderRequest, ValidationResult) {
        (self.request, self.validation)
    }
}

pub struct RiskGate {
    limits: HardLimits,
}

impl RiskGate {
    pub fn new(limits: HardLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &HardLimits {
        &self.limits
    }

    /// Run every check and report every failure. Approval requires an empty
    /// reason list; there is no partial approval.
    pub fn validate(
        &self,
        request: &OrderRequest,
        directive: &StrategyDirective,
        ledger: &SessionLedger,
        equity: f64,
    ) -> ValidationResult {
        let envelope = &directive.envelope;
        let max_position_value = equity
            * envelope.max_position_pct.min(self.limits.max_position_pct)
            * directive.position_size_multiplier;
        let max_risk_value = equity * envelope.max_risk_pct;
        let requested_value = request.notional();
        let projected_risk = match request.stop_price {
            Some(stop) => request.quantity * (request.limit_price - stop).abs(),
            None => requested_value * envelope.stop_loss_pct,
        };
        let day_trades_remaining = self
            .limits
            .day_trade_budget
            .saturating_sub(ledger.day_trades_used());

        let metrics = RiskMetrics {
            equity,
            requested_value,
            projected_risk,
            max_position_value,
            max_risk_value,
            daily_pnl: ledger.daily_total(),
            weekly_pnl: ledger.weekly_total(),
            day_trades_remaining,
        };

        let mut reasons = Vec::new();

        if request.is_entry() {
            if day_trades_remaining == 0 {
                reasons.push(RejectReason::DayTradeBudgetExhausted);
            }
            if requested_value > max_position_value {
                reasons.push(RejectReason::PositionTooLarge);
            }
            if projected_risk > max_risk_value {
                reasons.push(RejectReason::RiskTooLarge);
            }
            if equity < request.limit_price {
                reasons.push(RejectReason::InsufficientCapital);
            }
        }

        // Loss limits and the governor apply to entries only; a closing
        // order under a blown daily limit is exactly what we want to allow.
        if request.is_entry() {
            let daily_loss_floor = -(equity * self.limits.max_daily_loss_pct);
            if ledger.daily_total() <= daily_loss_floor {
                reasons.push(RejectReason::DailyLossLimitReached);
            }
            if self.limits.weekly_drawdown_governor {
                reasons.push(RejectReason::DrawdownGovernorActive);
            }
        }

        let approved = reasons.is_empty();
        if approved {
            tracing::info!(
                "✅ Gate approved {} {} {:.2} {} @ {:.2} (value ${:.2}, risk ${:.2})",
                match request.intent {
                    OrderIntent::Entry => "entry",
                    OrderIntent::Close { .. } => "close",
                },
                request.side,
                request.quantity,
                request.symbol,
                request.limit_price,
                requested_value,
                projected_risk
            );
        } else {
            let listed: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
            tracing::warn!(
                "❌ Gate rejected {} {} {}: {}",
                request.side,
                request.quantity,
                request.symbol,
                listed.join("; ")
            );
        }

        ValidationResult {
            approved,
            reasons,
            metrics,
            validated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::MarketRegime;
    use crate::strategy::Strategy;

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

    fn small_entry() -> OrderRequest {
        // $450 notional against $25k equity: inside every limit.
        OrderRequest::entry("SPY", OrderSide::Buy, 1.0, 450.0, Some(440.0))
    }

    #[test]
    fn clean_entry_is_approved_with_metrics() {
        let gate = RiskGate::new(HardLimits::default());
        let ledger = SessionLedger::new();
        let result = gate.validate(&small_entry(), &directive(Strategy::A), &ledger, 25_000.0);

        assert!(result.approved);
        assert!(result.reasons.is_empty());
        assert_eq!(result.metrics.requested_value, 450.0);
        assert_eq!(result.metrics.day_trades_remaining, 3);
    }

    #[test]
    fn every_failing_check_is_reported_not_just_the_first() {
        let limits = HardLimits {
            weekly_drawdown_governor: true,
            ..Default::default()
        };
        let gate = RiskGate::new(limits);
        let mut ledger = SessionLedger::new();
        for _ in 0..3 {
            ledger.record_day_trade();
        }
        ledger.record_realized(-5_000.0);

        // Oversized order on tiny equity: every check should trip.
        let request = OrderRequest::entry("SPY", OrderSide::Buy, 100.0, 450.0, Some(300.0));
        let result = gate.validate(&request, &directive(Strategy::A), &ledger, 100.0);

        assert!(!result.approved);
        assert!(result.reasons.contains(&RejectReason::DayTradeBudgetExhausted));
        assert!(result.reasons.contains(&RejectReason::PositionTooLarge));
        assert!(result.reasons.contains(&RejectReason::RiskTooLarge));
        assert!(result.reasons.contains(&RejectReason::DailyLossLimitReached));
        assert!(result.reasons.contains(&RejectReason::DrawdownGovernorActive));
        assert!(result.reasons.contains(&RejectReason::InsufficientCapital));
        assert_eq!(result.reasons.len(), 6);
    }

    #[test]
    fn multiplier_scales_the_position_cap() {
        let gate = RiskGate::new(HardLimits::default());
        let ledger = SessionLedger::new();

        // $2000 notional: fine under strategy A (20% x 1.0 of $25k),
        // rejected under strategy B (10% x 0.5 -> $1250 cap).
        let request = OrderRequest::entry("SPY", OrderSide::Buy, 4.0, 500.0, Some(495.0));
        let a = gate.validate(&request, &directive(Strategy::A), &ledger, 25_000.0);
        let b = gate.validate(&request, &directive(Strategy::B), &ledger, 25_000.0);

        assert!(a.approved);
        assert!(!b.approved);
        assert!(b.reasons.contains(&RejectReason::PositionTooLarge));
    }

    #[test]
    fn day_trade_budget_blocks_new_entries() {
        let gate = RiskGate::new(HardLimits::default());
        let mut ledger = SessionLedger::new();
        for _ in 0..3 {
            ledger.record_day_trade();
        }

        let result = gate.validate(&small_entry(), &directive(Strategy::A), &ledger, 25_000.0);
        assert!(!result.approved);
        assert_eq!(result.reasons, vec![RejectReason::DayTradeBudgetExhausted]);
    }

    #[test]
    fn close_orders_skip_entry_checks_but_are_validated() {
        let limits = HardLimits {
            weekly_drawdown_governor: true,
            ..Default::default()
        };
        let gate = RiskGate::new(limits);
        let mut ledger = SessionLedger::new();
        ledger.record_realized(-10_000.0);
        for _ in 0..5 {
            ledger.record_day_trade();
        }

        let request = OrderRequest::close(
            "SPY",
            OrderSide::Sell,
            100.0,
            450.0,
            ClosureTrigger::EmergencyStop,
        );
        let result = gate.validate(&request, &directive(Strategy::C), &ledger, 100.0);

        assert!(result.approved);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn approved_order_requires_an_approved_validation() {
        let gate = RiskGate::new(HardLimits::default());
        let ledger = SessionLedger::new();

        let good = small_entry();
        let validation = gate.validate(&good, &directive(Strategy::A), &ledger, 25_000.0);
        assert!(ApprovedOrder::new(good, validation).is_some());

        let bad = OrderRequest::entry("SPY", OrderSide::Buy, 1000.0, 450.0, None);
        let validation = gate.validate(&bad, &directive(Strategy::A), &ledger, 25_000.0);
        assert!(ApprovedOrder::new(bad, validation).is_none());
    }

    #[test]
    fn validation_is_fresh_per_attempt() {
        let gate = RiskGate::new(HardLimits::default());
        let mut ledger = SessionLedger::new();

        let first = gate.validate(&small_entry(), &directive(Strategy::A), &ledger, 25_000.0);
        assert!(first.approved);

        ledger.record_realized(-2_000.0);
        let second = gate.validate(&small_entry(), &directive(Strategy::A), &ledger, 25_000.0);
        assert!(!second.approved);
        assert_ne!(first.metrics.daily_pnl, second.metrics.daily_pnl);
    }
}
