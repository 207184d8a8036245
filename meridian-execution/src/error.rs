use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order-response error codes (`spec.md` §6). Attached to an [`crate::order::OrderTicket`]'s
/// `last_response`; no exception ever crosses the request/ticket boundary (`spec.md` §7).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum OrderResponse {
    #[error("success")]
    Success,
    #[error("algorithm is still warming up")]
    WarmingUp,
    #[error("processing error: {0}")]
    ProcessingError(String),
    #[error("an order with this id already exists")]
    OrderAlreadyExists,
    #[error("unable to find order")]
    UnableToFindOrder,
    #[error("order status does not permit this operation")]
    InvalidStatus,
    #[error("order quantity is zero")]
    ZeroQuantity,
    #[error("insufficient buying power")]
    InsufficientBuyingPower,
    #[error("brokerage model refused to submit order: {0}")]
    BrokerageModelRefusedToSubmitOrder(String),
    #[error("brokerage failed to submit order: {0}")]
    BrokerageFailedToSubmitOrder(String),
    #[error("brokerage model refused to update order: {0}")]
    BrokerageModelRefusedToUpdateOrder(String),
    #[error("brokerage failed to update order: {0}")]
    BrokerageFailedToUpdateOrder(String),
    #[error("brokerage failed to cancel order: {0}")]
    BrokerageFailedToCancelOrder(String),
    #[error("invalid request")]
    InvalidRequest,
}

impl OrderResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, OrderResponse::Success)
    }
}

/// `spec.md` §6: a brokerage-originated notification independent of any single order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum BrokerageMessageType {
    Warning,
    Error,
    Disconnect,
    Reconnect,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct BrokerageMessage {
    pub kind: BrokerageMessageType,
    pub code: String,
    pub message: String,
}

impl BrokerageMessage {
    pub fn new(kind: BrokerageMessageType, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BrokerageMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?} {}] {}", self.kind, self.code, self.message)
    }
}
