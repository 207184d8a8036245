use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced while constructing, parsing, or inspecting a [`crate::identifier::SecurityIdentifier`].
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
pub enum IdentifierError {
    #[error("malformed identifier string: {0}")]
    Format(String),

    #[error("{field} is not applicable to security type {security_type}")]
    InvalidOperation {
        field: &'static str,
        security_type: String,
    },

    #[error("{field} value {value} is out of the declared range 0..{width}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        width: i64,
    },

    #[error("unknown market: {0}")]
    UnknownMarket(String),

    #[error("market {name} is already registered with code {existing}")]
    MarketAlreadyRegistered { name: String, existing: u16 },

    #[error("market code {0} is already registered")]
    MarketCodeTaken(u16),
}
