use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use volguard::core::{logging, AppConfig};
use volguard::execution::{ExecutionMode, OperatorIdentity, OrderExecutor};
use volguard::market::StaticFeed;
use volguard::strategy::{SignalConfig, SignalEngine};
use volguard::trading::{DecisionCycle, LogAlertSink};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    logging::init_logging(&config.log_level);

    tracing::info!("🚀 volguard starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Mode: {} | operator: {} | account: {}",
        if config.paper_trading { "SIMULATED" } else { "LIVE" },
        config.operator_id,
        config.account_id
    );

    if !config.paper_trading {
        // Wiring a live broker is a deployment concern; the binary only
        // ships the simulated path.
        tracing::warn!("⚠️ No broker configured - forcing simulated execution");
    }

    let feed = match &config.snapshots_path {
        Some(path) => Arc::new(StaticFeed::from_path(path)?),
        None => {
            tracing::warn!("⚠️ No SNAPSHOTS_PATH set - feed is empty, cycles will stand down");
            Arc::new(StaticFeed::empty())
        }
    };

    let executor = OrderExecutor::new(
        ExecutionMode::Simulated,
        OperatorIdentity {
            operator_id: config.operator_id.clone(),
            account_id: config.account_id.clone(),
        },
    );

    let mut cycle = DecisionCycle::new(
        SignalEngine::new(SignalConfig::default()),
        executor,
        feed,
        Arc::new(LogAlertSink),
        &config.gameplan_path,
        config.account_equity,
    );

    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(config.cycle_interval_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                // The whole pass runs to completion before the next tick or
                // a shutdown is honored; no order is left in flight.
                if let Err(e) = cycle.run_once(Utc::now()).await {
                    tracing::error!("❌ Cycle error: {e:#}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("👋 Shutdown signal received - exiting after completed cycle");
                break;
            }
        }
    }

    Ok(())
}
