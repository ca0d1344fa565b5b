//! Order routing. `execute` accepts only an `ApprovedOrder`, so there is no
//! code path from a signal to a fill that skips the risk gate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::core::ExecutionError;
use crate::risk::{ApprovedOrder, OrderRequest, ValidationResult};

use super::broker::Broker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Filled,
    Partial,
    Rejected,
    Failed,
    Timeout,
    Simulated,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Partial => write!(f, "PARTIAL"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
            OrderStatus::Failed => write!(f, "FAILED"),
            OrderStatus::Timeout => write!(f, "TIMEOUT"),
            OrderStatus::Simulated => write!(f, "SIMULATED"),
        }
    }
}

/// Fixed audit identity stamped onto every order, simulated or live.
#[derive(Debug, Clone)]
pub struct OperatorIdentity {
    pub operator_id: String,
    pub account_id: String,
}

/// Terminal outcome of one order attempt, carrying the validation that
/// gated it.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub order_id: Uuid,
    pub symbol: String,
    pub status: OrderStatus,
    pub fill_price: Option<f64>,
    pub fill_quantity: Option<f64>,
    pub reason: Option<String>,
    pub validation: ValidationResult,
    pub executed_at: DateTime<Utc>,
}

impl OrderResult {
    /// True for outcomes that put (or kept) capital in the market.
    pub fn is_fill(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::Partial | OrderStatus::Simulated
        )
    }
}

#[derive(Clone)]
pub enum ExecutionMode {
    /// Log the would-be fill; touch nothing external.
    Simulated,
    /// Route to the broker collaborator.
    Live(Arc<dyn Broker>),
}

pub struct OrderExecutor {
    mode: ExecutionMode,
    identity: OperatorIdentity,
    order_timeout: Duration,
}

impl OrderExecutor {
    pub fn new(mode: ExecutionMode, identity: OperatorIdentity) -> Self {
        Self {
            mode,
            identity,
            order_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.order_timeout = timeout;
        self
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.mode, ExecutionMode::Simulated)
    }

    /// Route an approved order to a terminal outcome. Once called, the
    /// future resolves to exactly one of the terminal statuses; it never
    /// hangs and never leaves the order ambiguous.
    pub async fn execute(&self, approved: ApprovedOrder) -> OrderResult {
        let (request, validation) = approved.into_parts();

        match &self.mode {
            ExecutionMode::Simulated => {
                tracing::info!(
                    "📝 SIMULATED: {} {:.2} {} @ {:.2} [op={} acct={} id={}]",
                    request.side,
                    request.quantity,
                    request.symbol,
                    request.limit_price,
                    self.identity.operator_id,
                    self.identity.account_id,
                    request.id
                );
                OrderResult {
                    order_id: request.id,
                    symbol: request.symbol,
                    status: OrderStatus::Simulated,
                    fill_price: Some(request.limit_price),
                    fill_quantity: Some(request.quantity),
                    reason: None,
                    validation,
                    executed_at: Utc::now(),
                }
            }
            ExecutionMode::Live(broker) => {
                tracing::info!(
                    "🎯 LIVE: {} {:.2} {} @ {:.2} [op={} acct={} id={}]",
                    request.side,
                    request.quantity,
                    request.symbol,
                    request.limit_price,
                    self.identity.operator_id,
                    self.identity.account_id,
                    request.id
                );
                self.route_live(broker.clone(), request, validation).await
            }
        }
    }

    async fn route_live(
        &self,
        broker: Arc<dyn Broker>,
        request: OrderRequest,
        validation: ValidationResult,
    ) -> OrderResult {
        let outcome =
            tokio::time::timeout(self.order_timeout, broker.submit(&request, self.order_timeout))
                .await;

        let (status, fill_price, fill_quantity, reason) = match outcome {
            Ok(Ok(fill)) => {
                let status = if fill.fill_quantity + f64::EPSILON < request.quantity {
                    tracing::warn!(
                        "⚠️ Partial fill on {}: {:.2} of {:.2}",
                        request.symbol,
                        fill.fill_quantity,
                        request.quantity
                    );
                    OrderStatus::Partial
                } else {
                    tracing::info!("✅ Filled {} @ {:.2}", request.symbol, fill.fill_price);
                    OrderStatus::Filled
                };
                (status, Some(fill.fill_price), Some(fill.fill_quantity), None)
            }
            Ok(Err(e)) => {
                tracing::error!("❌ Broker failure on {}: {}", request.symbol, e);
                let status = if matches!(e, ExecutionError::Timeout(_)) {
                    OrderStatus::Timeout
                } else {
                    OrderStatus::Failed
                };
                (status, None, None, Some(e.to_string()))
            }
            Err(_) => {
                tracing::error!(
                    "⏱️ Order on {} timed out after {:?}",
                    request.symbol,
                    self.order_timeout
                );
                (
                    OrderStatus::Timeout,
                    None,
                    None,
                    Some(format!("no terminal outcome within {:?}", self.order_timeout)),
                )
            }
        };

        OrderResult {
            order_id: request.id,
            symbol: request.symbol,
            status,
            fill_price,
            fill_quantity,
            reason,
            validation,
            executed_at: Utc::now(),
        }
    }

    /// Audit record for a request the gate turned down. Keeps the result
    /// stream symmetric: every attempt, approved or not, yields an
    /// `OrderResult` with its validation attached.
    pub fn reject(&self, request: OrderRequest, validation: ValidationResult) -> OrderResult {
        debug_assert!(!validation.approved);
        let reason = validation
            .reasons
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join("; ");

        OrderResult {
            order_id: request.id,
            symbol: request.symbol,
            status: OrderStatus::Rejected,
            fill_price: None,
            fill_quantity: None,
            reason: Some(reason),
            validation,
            executed_at: Utc::now(),
        }
    }
}
