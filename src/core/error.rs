use thiserror::Error;

/// Signaled when an indicator is asked for more lookback than the series holds.
///
/// Callers degrade to a NEUTRAL signal instead of propagating this upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient data: need {required} bars, have {available}")]
pub struct InsufficientDataError {
    pub required: usize,
    pub available: usize,
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("order timed out after {0}s")]
    Timeout(u64),

    #[error("order rejected by broker: {0}")]
    Rejected(String),
}
