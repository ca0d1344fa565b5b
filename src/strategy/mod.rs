pub mod engine;
pub mod selector;
pub mod signals;

pub use engine::{SignalConfig, SignalEngine};
pub use selector::{
    Catalyst, CatalystImpact, CatalystKind, RiskEnvelope, SafetyOverrides, Strategy,
    StrategyDirective, StrategySelector,
};
pub use signals::{Direction, SignalFlag, TradingSignal};
