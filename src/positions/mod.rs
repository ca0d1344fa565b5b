//! Open-position ownership and forced-closure logic. This module holds the
//! only mutable handle to live positions; everything else sees copies.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::execution::{OrderExecutor, OrderResult, OrderStatus};
use crate::risk::{ApprovedOrder, OrderRequest, OrderSide, RiskGate, SessionLedger};
use crate::strategy::StrategyDirective;

/// Unrealized loss (fractional) at which a position is force-closed
/// regardless of anything else.
pub const EMERGENCY_STOP_PCT: f64 = -0.40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClosureTrigger {
    ThreeDte,
    EmergencyStop,
    DailyLossLimit,
    Manual,
    StrategyExit,
}

impl fmt::Display for ClosureTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosureTrigger::ThreeDte => write!(f, "3DTE"),
            ClosureTrigger::EmergencyStop => write!(f, "EMERGENCY_STOP"),
            ClosureTrigger::DailyLossLimit => write!(f, "DAILY_LOSS_LIMIT"),
            ClosureTrigger::Manual => write!(f, "MANUAL"),
            ClosureTrigger::StrategyExit => write!(f, "STRATEGY_EXIT"),
        }
    }
}

/// One open position. Quantity is signed: negative means short.
#[derive(Debug, Clone)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
    pub days_to_expiry: Option<i64>,
    pub closure_trigger: Option<ClosureTrigger>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn new(
        symbol: String,
        quantity: f64,
        entry_price: f64,
        days_to_expiry: Option<i64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            quantity,
            entry_price,
            current_price: entry_price,
            unrealized_pnl: 0.0,
            unrealized_pnl_pct: 0.0,
            days_to_expiry,
            closure_trigger: None,
            opened_at: Utc::now(),
        }
    }

    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.unrealized_pnl = (price - self.entry_price) * self.quantity;
        self.unrealized_pnl_pct = if self.entry_price != 0.0 {
            (price - self.entry_price) / self.entry_price * self.quantity.signum()
        } else {
            0.0
        };
    }

    /// Side of the order that reduces this position.
    pub fn closing_side(&self) -> OrderSide {
        if self.quantity >= 0.0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }
}

pub struct PositionManager {
    positions: HashMap<Uuid, Position>,
    emergency_stop_pct: f64,
}

impl PositionManager {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            emergency_stop_pct: EMERGENCY_STOP_PCT,
        }
    }

    pub fn open(&mut self, position: Position) -> Uuid {
        let id = position.id;
        tracing::info!(
            "📌 Opened {} {:+.2} @ {:.2} (dte: {:?})",
            position.symbol,
            position.quantity,
            position.entry_price,
            position.days_to_expiry
        );
        self.positions.insert(id, position);
        id
    }

    pub fn open_from_fill(&mut self, result: &OrderResult, request: &OrderRequest, dte: Option<i64>) -> Option<Uuid> {
        if !result.is_fill() {
            return None;
        }
        let quantity = result.fill_quantity.unwrap_or(request.quantity);
        let signed = match request.side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        let price = result.fill_price.unwrap_or(request.limit_price);
        Some(self.open(Position::new(request.symbol.clone(), signed, price, dte)))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    /// Re-mark every position for `symbol` at the latest price.
    pub fn mark_symbol(&mut self, symbol: &str, price: f64) {
        for position in self.positions.values_mut() {
            if position.symbol == symbol {
                position.mark(price);
            }
        }
    }

    pub fn total_unrealized(&self) -> f64 {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    /// Tag every position whose forced-closure condition is met. When both
    /// the expiry and the emergency condition hold, the emergency stop
    /// wins.
    pub fn evaluate_closures(&mut self, force_close_dte: i64) -> Vec<(Uuid, ClosureTrigger)> {
        let mut due = Vec::new();
        for position in self.positions.values_mut() {
            let emergency = position.unrealized_pnl_pct <= self.emergency_stop_pct;
            let expiring = position
                .days_to_expiry
                .map(|dte| dte <= force_close_dte)
                .unwrap_or(false);

            let trigger = if emergency {
                Some(ClosureTrigger::EmergencyStop)
            } else if expiring {
                Some(ClosureTrigger::ThreeDte)
            } else {
                None
            };

            if let Some(trigger) = trigger {
                tracing::warn!(
                    "🛑 {} marked for closure: {} (pnl {:.1}%, dte {:?})",
                    position.symbol,
                    trigger,
                    position.unrealized_pnl_pct * 100.0,
                    position.days_to_expiry
                );
                position.closure_trigger = Some(trigger);
                due.push((position.id, trigger));
            }
        }
        due
    }

    /// Close one position with a reducing order. The position leaves the
    /// live set only on a confirmed fill; a failed or timed-out close keeps
    /// it under management.
    pub async fn close(
        &mut self,
        id: Uuid,
        trigger: ClosureTrigger,
        gate: &RiskGate,
        directive: &StrategyDirective,
        ledger: &mut SessionLedger,
        executor: &OrderExecutor,
        equity: f64,
    ) -> Option<OrderResult> {
        let position = self.positions.get(&id)?.clone();
        let request = OrderRequest::close(
            &position.symbol,
            position.closing_side(),
            position.quantity.abs(),
            position.current_price,
            trigger,
        );

        let validation = gate.validate(&request, directive, ledger, equity);
        let result = match ApprovedOrder::new(request.clone(), validation.clone()) {
            Some(approved) => executor.execute(approved).await,
            None => executor.reject(request, validation),
        };

        self.apply_close_result(id, trigger, &result, ledger);
        Some(result)
    }

    /// Attempt to close every open position, aggregating one result per
    /// position. A failure on one never aborts the attempts on the rest:
    /// an unmanaged leftover position is strictly worse than a partially
    /// successful sweep.
    pub async fn close_all(
        &mut self,
        trigger: ClosureTrigger,
        gate: &RiskGate,
        directive: &StrategyDirective,
        ledger: &mut SessionLedger,
        executor: &OrderExecutor,
        equity: f64,
    ) -> Vec<OrderResult> {
        let targets: Vec<Position> = self.positions.values().cloned().collect();
        if targets.is_empty() {
            return Vec::new();
        }

        tracing::warn!("🛑 Liquidation sweep: closing {} positions ({})", targets.len(), trigger);

        let mut ids = Vec::with_capacity(targets.len());
        let mut attempts = Vec::with_capacity(targets.len());
        for position in &targets {
            let request = OrderRequest::close(
                &position.symbol,
                position.closing_side(),
                position.quantity.abs(),
                position.current_price,
                trigger,
            );
            let validation = gate.validate(&request, directive, ledger, equity);
            ids.push(position.id);
            attempts.push((request, validation));
        }

        // All close orders go out together; each resolves to its own
        // terminal outcome regardless of what happens to its neighbours.
        let results = join_all(attempts.into_iter().map(|(request, validation)| async {
            match ApprovedOrder::new(request.clone(), validation.clone()) {
                Some(approved) => executor.execute(approved).await,
                None => executor.reject(request, validation),
            }
        }))
        .await;

        for (id, result) in ids.iter().zip(results.iter()) {
            self.apply_close_result(*id, trigger, result, ledger);
        }

        let closed = results.iter().filter(|r| r.is_fill()).count();
        tracing::warn!(
            "🛑 Sweep complete: {}/{} closed, {} still under management",
            closed,
            results.len(),
            self.positions.len()
        );

        results
    }

    fn apply_close_result(
        &mut self,
        id: Uuid,
        trigger: ClosureTrigger,
        result: &OrderResult,
        ledger: &mut SessionLedger,
    ) {
        let Some(position) = self.positions.get_mut(&id) else {
            return;
        };

        match result.status {
            OrderStatus::Filled | OrderStatus::Simulated => {
                let exit = result.fill_price.unwrap_or(position.current_price);
                let realized = (exit - position.entry_price) * position.quantity;
                ledger.record_realized(realized);
                tracing::info!(
                    "✅ Closed {} ({}) @ {:.2}, realized {:+.2}",
                    position.symbol,
                    trigger,
                    exit,
                    realized
                );
                self.positions.remove(&id);
            }
            OrderStatus::Partial => {
                let exit = result.fill_price.unwrap_or(position.current_price);
                let closed_qty = result.fill_quantity.unwrap_or(0.0) * position.quantity.signum();
                let realized = (exit - position.entry_price) * closed_qty;
                ledger.record_realized(realized);
                position.quantity -= closed_qty;
                position.mark(position.current_price);
                tracing::warn!(
                    "⚠️ Partial close on {}: {:+.2} remains under management",
                    position.symbol,
                    position.quantity
                );
            }
            OrderStatus::Rejected | OrderStatus::Failed | OrderStatus::Timeout => {
                tracing::error!(
                    "❌ Close attempt on {} ended {} - position stays under management",
                    position.symbol,
                    result.status
                );
            }
        }
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::HardLimits;
    use crate::core::ExecutionError;
    use crate::execution::broker::{BrokerFill, MockBroker};
    use crate::execution::{ExecutionMode, OperatorIdentity, OrderExecutor};
    use crate::regime::MarketRegime;
    use crate::strategy::Strategy;
    use std::sync::Arc;

    fn directive() -> StrategyDirective {
        StrategyDirective::stand_down(MarketRegime::Crisis)
    }

    fn simulated_executor() -> OrderExecutor {
        OrderExecutor::new(
            ExecutionMode::Simulated,
            OperatorIdentity {
                operator_id: "test-op".to_string(),
                account_id: "test-acct".to_string(),
            },
        )
    }

    fn marked(symbol: &str, entry: f64, current: f64, dte: Option<i64>) -> Position {
        let mut p = Position::new(symbol.to_string(), 10.0, entry, dte);
        p.mark(current);
        p
    }

    #[test]
    fn mark_tracks_pnl_for_longs_and_shorts() {
        let mut long = Position::new("SPY".to_string(), 10.0, 100.0, None);
        long.mark(90.0);
        assert_eq!(long.unrealized_pnl, -100.0);
        assert!((long.unrealized_pnl_pct + 0.10).abs() < 1e-9);

        let mut short = Position::new("SPY".to_string(), -10.0, 100.0, None);
        short.mark(90.0);
        assert_eq!(short.unrealized_pnl, 100.0);
        assert!((short.unrealized_pnl_pct - 0.10).abs() < 1e-9);
        assert_eq!(short.closing_side(), OrderSide::Buy);
    }

    #[test]
    fn emergency_stop_beats_expiry_when_both_fire() {
        let mut manager = PositionManager::new();
        // 2 DTE and down 45%: both triggers hold.
        let id = manager.open(marked("SPY", 100.0, 55.0, Some(2)));

        let due = manager.evaluate_closures(3);
        assert_eq!(due, vec![(id, ClosureTrigger::EmergencyStop)]);
        assert_eq!(
            manager.get(id).unwrap().closure_trigger,
            Some(ClosureTrigger::EmergencyStop)
        );
    }

    #[test]
    fn expiry_alone_triggers_three_dte() {
        let mut manager = PositionManager::new();
        let id = manager.open(marked("SPY", 100.0, 101.0, Some(3)));

        let due = manager.evaluate_closures(3);
        assert_eq!(due, vec![(id, ClosureTrigger::ThreeDte)]);
    }

    #[test]
    fn healthy_non_expiring_positions_are_left_alone() {
        let mut manager = PositionManager::new();
        manager.open(marked("SPY", 100.0, 98.0, None));
        manager.open(marked("QQQ", 380.0, 385.0, Some(30)));

        assert!(manager.evaluate_closures(3).is_empty());
    }

    #[tokio::test]
    async fn close_removes_position_on_confirmed_fill() {
        let mut manager = PositionManager::new();
        let id = manager.open(marked("SPY", 100.0, 110.0, None));
        let gate = RiskGate::new(HardLimits::default());
        let mut ledger = SessionLedger::new();

        let result = manager
            .close(
                id,
                ClosureTrigger::Manual,
                &gate,
                &directive(),
                &mut ledger,
                &simulated_executor(),
                25_000.0,
            )
            .await
            .expect("position exists");

        assert_eq!(result.status, OrderStatus::Simulated);
        assert!(manager.is_empty());
        // 10 shares up 10 points.
        assert!((ledger.weekly_total() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn close_all_survives_one_failing_position() {
        let mut manager = PositionManager::new();
        manager.open(marked("AAA", 100.0, 100.0, None));
        manager.open(marked("BBB", 100.0, 100.0, None));
        manager.open(marked("CCC", 100.0, 100.0, None));

        let mut broker = MockBroker::new();
        broker.expect_submit().returning(|req, _| {
            if req.symbol == "BBB" {
                Err(ExecutionError::Rejected("venue glitch".into()))
            } else {
                Ok(BrokerFill {
                    order_id: req.id,
                    fill_price: req.limit_price,
                    fill_quantity: req.quantity,
                })
            }
        });
        let executor = OrderExecutor::new(
            ExecutionMode::Live(Arc::new(broker)),
            OperatorIdentity {
                operator_id: "test-op".to_string(),
                account_id: "test-acct".to_string(),
            },
        );

        let gate = RiskGate::new(HardLimits::default());
        let mut ledger = SessionLedger::new();
        let mut results = manager
            .close_all(
                ClosureTrigger::DailyLossLimit,
                &gate,
                &directive(),
                &mut ledger,
                &executor,
                25_000.0,
            )
            .await;

        assert_eq!(results.len(), 3);
        results.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        assert_eq!(results[0].status, OrderStatus::Filled);
        assert_eq!(results[1].status, OrderStatus::Failed);
        assert_eq!(results[2].status, OrderStatus::Filled);

        // The failed position stays under management.
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.open_positions()[0].symbol, "BBB");
    }

    #[tokio::test]
    async fn partial_close_keeps_the_remainder() {
        let mut manager = PositionManager::new();
        let id = manager.open(marked("SPY", 100.0, 105.0, None));

        let mut broker = MockBroker::new();
        broker.expect_submit().returning(|req, _| {
            Ok(BrokerFill {
                order_id: req.id,
                fill_price: req.limit_price,
                fill_quantity: req.quantity / 2.0,
            })
        });
        let executor = OrderExecutor::new(
            ExecutionMode::Live(Arc::new(broker)),
            OperatorIdentity {
                operator_id: "test-op".to_string(),
                account_id: "test-acct".to_string(),
            },
        );

        let gate = RiskGate::new(HardLimits::default());
        let mut ledger = SessionLedger::new();
        let result = manager
            .close(
                id,
                ClosureTrigger::StrategyExit,
                &gate,
                &directive(),
                &mut ledger,
                &executor,
                25_000.0,
            )
            .await
            .unwrap();

        assert_eq!(result.status, OrderStatus::Partial);
        assert_eq!(manager.len(), 1);
        assert!((manager.get(id).unwrap().quantity - 5.0).abs() < 1e-9);
        // 5 shares up 5 points realized.
        assert!((ledger.weekly_total() - 25.0).abs() < 1e-9);
    }
}
