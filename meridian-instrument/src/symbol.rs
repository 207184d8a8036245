use crate::identifier::SecurityIdentifier;
use serde::{Deserialize, Serialize};

/// Pairs a [`SecurityIdentifier`] with the *current* ticker, which may differ from the
/// identifier's originally-generated symbol due to a corporate rename (`spec.md` §3).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct Symbol {
    id: SecurityIdentifier,
    ticker: String,
}

impl Symbol {
    pub fn new(id: SecurityIdentifier, ticker: impl Into<String>) -> Self {
        Self {
            id,
            ticker: ticker.into(),
        }
    }

    /// A `Symbol` whose current ticker matches the identifier's generation-time symbol.
    pub fn from_identifier(id: SecurityIdentifier) -> Self {
        let ticker = id.symbol().to_string();
        Self { id, ticker }
    }

    pub fn id(&self) -> &SecurityIdentifier {
        &self.id
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = ticker.into();
        self
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ticker)
    }
}
