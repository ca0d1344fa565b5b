//! Cross-cycle session counters with a single owner. The decision cycle
//! holds the only handle; RiskGate reads it, fills and closures write it.

#[derive(Debug, Default)]
pub struct SessionLedger {
    day_trades_used: u32,
    realized_daily_pnl: f64,
    unrealized_pnl: f64,
    weekly_pnl: f64,
    pivot_count: u32,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_day_trade(&mut self) {
        self.day_trades_used += 1;
        tracing::info!("📒 Day trade recorded ({} used today)", self.day_trades_used);
    }

    pub fn day_trades_used(&self) -> u32 {
        self.day_trades_used
    }

    pub fn record_realized(&mut self, pnl: f64) {
        self.realized_daily_pnl += pnl;
        self.weekly_pnl += pnl;
        tracing::info!(
            "💰 Realized P&L {:+.2} (day {:+.2}, week {:+.2})",
            pnl,
            self.realized_daily_pnl,
            self.weekly_pnl
        );
    }

    /// Replace the open-position mark; called once per valuation pass.
    pub fn mark_unrealized(&mut self, total: f64) {
        self.unrealized_pnl = total;
    }

    pub fn record_pivot(&mut self) {
        self.pivot_count += 1;
    }

    pub fn pivot_count(&self) -> u32 {
        self.pivot_count
    }

    /// Realized plus marked unrealized P&L for the session day.
    pub fn daily_total(&self) -> f64 {
        self.realized_daily_pnl + self.unrealized_pnl
    }

    pub fn weekly_total(&self) -> f64 {
        self.weekly_pnl
    }

    pub fn roll_day(&mut self) {
        tracing::info!(
            "🔄 Rolling session day (was: {:+.2}, {} day trades, {} pivots)",
            self.daily_total(),
            self.day_trades_used,
            self.pivot_count
        );
        self.day_trades_used = 0;
        self.realized_daily_pnl = 0.0;
        self.unrealized_pnl = 0.0;
        self.pivot_count = 0;
    }

    pub fn roll_week(&mut self) {
        self.roll_day();
        self.weekly_pnl = 0.0;
    }
}
