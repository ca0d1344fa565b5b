pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, GameplanConfig, HardLimits};
pub use error::{ExecutionError, InsufficientDataError};
