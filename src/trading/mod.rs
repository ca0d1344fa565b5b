pub mod alerts;
pub mod cycle;

pub use alerts::{AlertSeverity, AlertSink, LogAlertSink};
pub use cycle::{CycleReport, DecisionCycle};
