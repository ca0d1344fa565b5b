pub mod gate;
pub mod ledger;

pub use gate::{
    ApprovedOrder, OrderIntent, OrderRequest, OrderSide, RejectReason, RiskGate, RiskMetrics,
    ValidationResult,
};
pub use ledger::SessionLedger;
