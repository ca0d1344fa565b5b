use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::core::ExecutionError;
use crate::risk::OrderRequest;

#[cfg(test)]
use mockall::automock;

/// One confirmed (possibly partial) fill from the broker.
#[derive(Debug, Clone)]
pub struct BrokerFill {
    pub order_id: Uuid,
    pub fill_price: f64,
    pub fill_quantity: f64,
}

/// External broker collaborator. Every call takes an explicit timeout and
/// must resolve to a terminal outcome; the executor never retries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Broker: Send + Sync {
    async fn submit(
        &self,
        request: &OrderRequest,
        timeout: Duration,
    ) -> Result<BrokerFill, ExecutionError>;

    async fn cancel(&self, order_id: Uuid) -> Result<(), ExecutionError>;
}
