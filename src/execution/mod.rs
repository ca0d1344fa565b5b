pub mod broker;
pub mod executor;

pub use broker::{Broker, BrokerFill};
pub use executor::{ExecutionMode, OperatorIdentity, OrderExecutor, OrderResult, OrderStatus};
