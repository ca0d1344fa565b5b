use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::MarketSnapshot;

/// External market-data collaborator. A feed failure is fatal for the
/// current cycle only; the orchestrator arms its safe latch and alerts.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Latest volatility index reading, or `None` when unavailable.
    async fn volatility_index(&self) -> Result<Option<f64>>;

    /// Latest snapshot for a symbol, or `None` when the feed has nothing.
    async fn snapshot(&self, symbol: &str) -> Result<Option<MarketSnapshot>>;
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FeedFixture {
    volatility_index: Option<f64>,
    #[serde(default)]
    snapshots: Vec<MarketSnapshot>,
}

/// Fixture-backed feed for paper runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    vix: Option<f64>,
    snapshots: HashMap<String, MarketSnapshot>,
}

impl StaticFeed {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(vix: Option<f64>, snapshots: Vec<MarketSnapshot>) -> Self {
        Self {
            vix,
            snapshots: snapshots
                .into_iter()
                .map(|s| (s.symbol.clone(), s))
                .collect(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot fixture at {}", path.display()))?;
        let fixture: FeedFixture = serde_json::from_str(&raw)
            .with_context(|| format!("malformed snapshot fixture at {}", path.display()))?;
        Ok(Self::new(fixture.volatility_index, fixture.snapshots))
    }
}

#[async_trait]
impl MarketDataFeed for StaticFeed {
    async fn volatility_index(&self) -> Result<Option<f64>> {
        Ok(self.vix)
    }

    async fn snapshot(&self, symbol: &str) -> Result<Option<MarketSnapshot>> {
        Ok(self.snapshots.get(symbol).cloned())
    }
}
