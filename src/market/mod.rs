pub mod feed;
pub mod indicators;
pub mod snapshot;

pub use feed::{MarketDataFeed, StaticFeed};
pub use snapshot::MarketSnapshot;
