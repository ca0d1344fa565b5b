use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;

/// Process-level configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub paper_trading: bool,
    pub account_equity: f64,
    pub operator_id: String,
    pub account_id: String,
    pub gameplan_path: String,
    pub snapshots_path: Option<String>,
    pub cycle_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(AppConfig {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            // Live routing must be opted into explicitly.
            paper_trading: env::var("PAPER_TRADING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            account_equity: env::var("ACCOUNT_EQUITY")
                .unwrap_or_else(|_| "25000.0".to_string())
                .parse()
                .unwrap_or(25000.0),
            operator_id: env::var("OPERATOR_ID").unwrap_or_else(|_| "volguard-bot".to_string()),
            account_id: env::var("ACCOUNT_ID").unwrap_or_else(|_| "paper-account".to_string()),
            gameplan_path: env::var("GAMEPLAN_PATH")
                .unwrap_or_else(|_| "gameplan.json".to_string()),
            snapshots_path: env::var("SNAPSHOTS_PATH").ok(),
            cycle_interval_secs: env::var("CYCLE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        })
    }
}

/// The per-cycle configuration record handed to us by the planning
/// collaborator. Everything here is advisory input to the selector; a
/// missing or malformed gameplan degrades to the Strategy C directive
/// instead of halting the cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct GameplanConfig {
    pub regime: Option<String>,
    pub strategy: Option<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
    pub position_size_multiplier: Option<f64>,
    pub hard_limits: HardLimits,
    #[serde(default)]
    pub data_quality: DataQuality,
    #[serde(default)]
    pub catalysts: Vec<CatalystEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HardLimits {
    pub max_daily_loss_pct: f64,
    pub max_position_pct: f64,
    pub day_trade_budget: u32,
    pub force_close_dte: i64,
    #[serde(default)]
    pub weekly_drawdown_governor: bool,
    pub pivot_limit: u32,
}

impl Default for HardLimits {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: 0.05,
            max_position_pct: 0.20,
            day_trade_budget: 3,
            force_close_dte: 3,
            weekly_drawdown_governor: false,
            pivot_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataQuality {
    #[serde(default)]
    pub quarantine_active: bool,
}

/// Raw catalyst entry as written in the gameplan file; parsed into the
/// typed `strategy::Catalyst` by the selector.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalystEntry {
    pub kind: String,
    pub impact: String,
    pub symbol: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl GameplanConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read gameplan at {}", path.display()))?;
        let plan: GameplanConfig = serde_json::from_str(&raw)
            .with_context(|| format!("malformed gameplan at {}", path.display()))?;
        Ok(plan)
    }
}
