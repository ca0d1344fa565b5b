//! The decision cycle: one full pass from volatility reading to position
//! maintenance. Cycles never interleave - the runner awaits `run_once` to
//! completion (including any in-flight order) before starting the next.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::{GameplanConfig, HardLimits};
use crate::execution::{OrderExecutor, OrderResult};
use crate::market::MarketDataFeed;
use crate::positions::{ClosureTrigger, PositionManager};
use crate::regime::{self, MarketRegime};
use crate::risk::{ApprovedOrder, OrderRequest, OrderSide, RiskGate, SessionLedger};
use crate::strategy::{
    Catalyst, CatalystKind, Direction, SafetyOverrides, SignalEngine, StrategyDirective,
    StrategySelector, TradingSignal,
};

use super::alerts::{AlertSeverity, AlertSink};

/// Directional signals below this confidence are recorded but not traded.
const MIN_EXECUTABLE_CONFIDENCE: f64 = 0.6;

/// Everything one pass decided, for logging and the audit collaborator.
#[derive(Debug)]
pub struct CycleReport {
    pub regime: MarketRegime,
    pub directive: StrategyDirective,
    pub signals: Vec<TradingSignal>,
    pub orders: Vec<OrderResult>,
    pub closures: Vec<OrderResult>,
}

pub struct DecisionCycle {
    selector: StrategySelector,
    engine: SignalEngine,
    executor: OrderExecutor,
    positions: PositionManager,
    ledger: SessionLedger,
    feed: Arc<dyn MarketDataFeed>,
    alerts: Arc<dyn AlertSink>,
    gameplan_path: PathBuf,
    equity: f64,
    /// Armed when a collaborator fails mid-cycle; the next pass runs
    /// strategy C unconditionally, then the latch clears.
    force_safe: bool,
}

impl DecisionCycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: SignalEngine,
        executor: OrderExecutor,
        feed: Arc<dyn MarketDataFeed>,
        alerts: Arc<dyn AlertSink>,
        gameplan_path: impl Into<PathBuf>,
        equity: f64,
    ) -> Self {
        Self {
            selector: StrategySelector::new(),
            engine,
            executor,
            positions: PositionManager::new(),
            ledger: SessionLedger::new(),
            feed,
            alerts,
            gameplan_path: gameplan_path.into(),
            equity,
            force_safe: false,
        }
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    pub fn is_forced_safe(&self) -> bool {
        self.force_safe
    }

    /// One full decision pass. Every failure mode inside degrades to the
    /// most conservative behavior instead of erroring out; the `Err` arm
    /// exists only for poisoned invariants, not for bad data.
    pub async fn run_once(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let forced_safe = std::mem::take(&mut self.force_safe);
        if forced_safe {
            self.alerts
                .send(
                    AlertSeverity::Warning,
                    "previous cycle failed - running this cycle on strategy C",
                )
                .await;
        }

        let reading = match self.feed.volatility_index().await {
            Ok(reading) => reading,
            Err(e) => {
                self.collaborator_down(&format!("volatility feed unavailable: {e}"))
                    .await;
                None
            }
        };
        let regime = regime::classify(reading);

        let gameplan = self.load_gameplan().await;
        let limits = gameplan
            .as_ref()
            .map(|p| p.hard_limits.clone())
            .unwrap_or_default();
        let gate = RiskGate::new(limits.clone());

        let overrides = SafetyOverrides {
            data_quarantine_active: gameplan
                .as_ref()
                .map(|p| p.data_quality.quarantine_active)
                .unwrap_or(false),
            weekly_drawdown_governor_active: limits.weekly_drawdown_governor,
            pivot_limit_hit: self.ledger.pivot_count() >= limits.pivot_limit,
            earnings_blackout_hit: gameplan
                .as_ref()
                .map(|p| self.holds_earnings_exposure(p))
                .unwrap_or(false),
        };

        let directive = if forced_safe || self.force_safe {
            StrategyDirective::stand_down(regime)
        } else {
            self.selector.select(regime, gameplan.as_ref(), &overrides)
        };

        let (signals, orders) = self.trade_signals(&directive, &gate, now).await;
        let closures = self.maintain_positions(&directive, &gate, &limits).await;

        let report = CycleReport {
            regime,
            directive,
            signals,
            orders,
            closures,
        };
        tracing::info!(
            "🏁 Cycle done: regime={} strategy={} signals={} orders={} closures={}",
            report.regime,
            report.directive.strategy,
            report.signals.len(),
            report.orders.len(),
            report.closures.len()
        );
        Ok(report)
    }

    async fn load_gameplan(&self) -> Option<GameplanConfig> {
        match GameplanConfig::load(&self.gameplan_path) {
            Ok(plan) => Some(plan),
            Err(e) => {
                self.alerts
                    .send(
                        AlertSeverity::Warning,
                        &format!("gameplan unusable, substituting strategy C: {e:#}"),
                    )
                    .await;
                None
            }
        }
    }

    /// Evaluate and (when the gate agrees) trade every allowed symbol.
    async fn trade_signals(
        &mut self,
        directive: &StrategyDirective,
        gate: &RiskGate,
        now: DateTime<Utc>,
    ) -> (Vec<TradingSignal>, Vec<OrderResult>) {
        let mut signals = Vec::new();
        let mut orders = Vec::new();

        for symbol in directive.allowed_symbols.clone() {
            let snapshot = match self.feed.snapshot(&symbol).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    tracing::debug!("📊 No snapshot for {}", symbol);
                    continue;
                }
                Err(e) => {
                    self.collaborator_down(&format!("market feed failed on {symbol}: {e}"))
                        .await;
                    // No new entries for the rest of this pass.
                    break;
                }
            };

            self.positions.mark_symbol(&symbol, snapshot.last);

            let signal = self.engine.evaluate(directive, &snapshot, now);
            tracing::info!(
                "🎯 {} {}: {} (confidence {:.2})",
                directive.strategy,
                symbol,
                signal.direction,
                signal.confidence
            );

            if signal.is_directional() && signal.confidence >= MIN_EXECUTABLE_CONFIDENCE {
                if let Some(result) = self.submit_entry(&signal, directive, gate).await {
                    orders.push(result);
                }
            }
            signals.push(signal);
        }

        (signals, orders)
    }

    async fn submit_entry(
        &mut self,
        signal: &TradingSignal,
        directive: &StrategyDirective,
        gate: &RiskGate,
    ) -> Option<OrderResult> {
        let entry_price = signal.entry_price?;

        // Size to the tighter of the position cap and the risk cap, so a
        // correctly sized order is approvable by construction.
        let envelope = &directive.envelope;
        let value_cap = self.equity * envelope.max_position_pct * directive.position_size_multiplier;
        let unit_risk = signal
            .stop_loss
            .map(|stop| (entry_price - stop).abs())
            .unwrap_or(entry_price * envelope.stop_loss_pct);
        let risk_cap_qty = if unit_risk > 0.0 {
            self.equity * envelope.max_risk_pct / unit_risk
        } else {
            0.0
        };
        let quantity = (value_cap / entry_price).min(risk_cap_qty).floor();
        if quantity < 1.0 {
            tracing::debug!(
                "⏸️ {} sized to zero at ${:.2} - skipping",
                signal.symbol,
                entry_price
            );
            return None;
        }

        let side = match signal.direction {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
            Direction::Neutral => return None,
        };

        // Entering against an existing position in the same symbol is an
        // intraday pivot; the pivot limit shows up as a safety override on
        // the next selection pass.
        let pivoting = self.positions.open_positions().iter().any(|p| {
            p.symbol == signal.symbol
                && ((p.quantity > 0.0 && side == OrderSide::Sell)
                    || (p.quantity < 0.0 && side == OrderSide::Buy))
        });
        if pivoting {
            self.ledger.record_pivot();
        }

        let request = OrderRequest::entry(
            &signal.symbol,
            side,
            quantity,
            entry_price,
            signal.stop_loss,
        );

        let validation = gate.validate(&request, directive, &self.ledger, self.equity);
        let result = match ApprovedOrder::new(request.clone(), validation.clone()) {
            Some(approved) => {
                // Point of no return: await the terminal outcome even if a
                // shutdown arrives while the order is in flight.
                let result = self.executor.execute(approved).await;
                if result.is_fill() {
                    self.positions.open_from_fill(&result, &request, None);
                    self.ledger.record_day_trade();
                }
                result
            }
            None => self.executor.reject(request, validation),
        };

        Some(result)
    }

    /// Valuation refresh plus the forced-closure sweeps. Liquidation goes
    /// through the close-intent gate path: logged and audited, but never
    /// blocked by entry sizing rules.
    async fn maintain_positions(
        &mut self,
        directive: &StrategyDirective,
        gate: &RiskGate,
        limits: &HardLimits,
    ) -> Vec<OrderResult> {
        self.refresh_marks().await;
        self.ledger.mark_unrealized(self.positions.total_unrealized());

        let mut closures = Vec::new();
        for (id, trigger) in self.positions.evaluate_closures(limits.force_close_dte) {
            if let Some(result) = self
                .positions
                .close(
                    id,
                    trigger,
                    gate,
                    directive,
                    &mut self.ledger,
                    &self.executor,
                    self.equity,
                )
                .await
            {
                self.alert_closure(trigger, &result).await;
                closures.push(result);
            }
        }

        // A blown daily limit liquidates whatever the per-position sweep
        // left behind.
        let daily_floor = -(self.equity * limits.max_daily_loss_pct);
        if self.ledger.daily_total() <= daily_floor && !self.positions.is_empty() {
            self.alerts
                .send(
                    AlertSeverity::Critical,
                    &format!(
                        "daily loss {:.2} breached floor {:.2} - liquidating all positions",
                        self.ledger.daily_total(),
                        daily_floor
                    ),
                )
                .await;
            let swept = self
                .positions
                .close_all(
                    ClosureTrigger::DailyLossLimit,
                    gate,
                    directive,
                    &mut self.ledger,
                    &self.executor,
                    self.equity,
                )
                .await;
            closures.extend(swept);
        }

        self.ledger.mark_unrealized(self.positions.total_unrealized());
        closures
    }

    /// An earnings catalyst on a symbol we already hold. Candidate-symbol
    /// blackouts are the selector's catalyst rule; this one covers exposure
    /// carried in from earlier cycles.
    fn holds_earnings_exposure(&self, gameplan: &GameplanConfig) -> bool {
        gameplan
            .catalysts
            .iter()
            .map(Catalyst::from_entry)
            .any(|c| {
                c.kind == CatalystKind::Earnings
                    && c.symbol
                        .as_deref()
                        .map(|s| self.positions.open_positions().iter().any(|p| p.symbol == s))
                        .unwrap_or(false)
            })
    }

    /// Re-mark every symbol we hold, whatever the directive allows trading.
    /// A stand-down cycle has no entry loop, but its book still gets valued
    /// so the emergency stop can fire.
    async fn refresh_marks(&mut self) {
        let held: BTreeSet<String> = self
            .positions
            .open_positions()
            .into_iter()
            .map(|p| p.symbol)
            .collect();

        for symbol in held {
            match self.feed.snapshot(&symbol).await {
                Ok(Some(snapshot)) if snapshot.last.is_finite() && snapshot.last > 0.0 => {
                    self.positions.mark_symbol(&symbol, snapshot.last);
                }
                Ok(_) => {
                    tracing::debug!("📊 No usable mark for held position {}", symbol);
                }
                Err(e) => {
                    self.collaborator_down(&format!("market feed failed on {symbol}: {e}"))
                        .await;
                    break;
                }
            }
        }
    }

    async fn alert_closure(&self, trigger: ClosureTrigger, result: &OrderResult) {
        let severity = if result.is_fill() {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Critical
        };
        self.alerts
            .send(
                severity,
                &format!(
                    "forced closure {} on {}: {}",
                    trigger, result.symbol, result.status
                ),
            )
            .await;
    }

    async fn collaborator_down(&mut self, message: &str) {
        self.force_safe = true;
        self.alerts
            .send(
                AlertSeverity::Critical,
                &format!("{message} - next cycle will run strategy C"),
            )
            .await;
    }
}
