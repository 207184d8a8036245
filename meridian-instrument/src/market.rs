use crate::error::IdentifierError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lowercased, interned-at-construction market name (eg/ `"usa"`, `"fxcm"`).
///
/// [`SecurityIdentifier`](crate::identifier::SecurityIdentifier) encoding always lowercases
/// the market before looking up its numeric code; the original casing supplied by a caller
/// is not preserved.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct MarketName(pub String);

impl MarketName {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Self(name.as_ref().to_lowercase())
    }
}

impl std::fmt::Display for MarketName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide-shaped, but explicitly-constructed, `{name -> numeric code}` registry.
///
/// `spec.md` describes this as an extensible registry seeded with well-known venues; to
/// avoid the source's singleton `Composer` pattern, the registry is an explicit value
/// passed at engine construction rather than a global.
#[derive(Debug)]
pub struct MarketRegistry {
    by_name: RwLock<HashMap<String, u16>>,
    by_code: RwLock<HashMap<u16, String>>,
}

/// Market code field width from the `SecurityIdentifier` packed layout (`spec.md` §3): codes
/// must fit in `0..1000`.
pub const MARKET_CODE_WIDTH: u16 = 1000;

impl MarketRegistry {
    /// Empty registry with no markets defined.
    pub fn empty() -> Self {
        Self {
            by_name: RwLock::new(HashMap::new()),
            by_code: RwLock::new(HashMap::new()),
        }
    }

    /// Registry seeded with the venues named in `spec.md` §4.I.
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        for (name, code) in [
            ("usa", 0u16),
            ("fxcm", 1),
            ("oanda", 2),
            ("dukascopy", 3),
            ("tradier", 4),
        ] {
            registry
                .add_market(name, code)
                .expect("default market table has no internal collisions");
        }
        registry
    }

    /// Register a new market name/code pair.
    ///
    /// Fails if either the name or the code is already registered, and if the code does not
    /// fit the packed identifier's market-code field width.
    pub fn add_market(&self, name: &str, code: u16) -> Result<(), IdentifierError> {
        if code >= MARKET_CODE_WIDTH {
            return Err(IdentifierError::OutOfRange {
                field: "market code",
                value: code as i64,
                width: MARKET_CODE_WIDTH as i64,
            });
        }

        let key = name.to_lowercase();

        let mut by_name = self.by_name.write();
        if let Some(&existing) = by_name.get(&key) {
            return Err(IdentifierError::MarketAlreadyRegistered {
                name: key,
                existing,
            });
        }

        let mut by_code = self.by_code.write();
        if by_code.contains_key(&code) {
            return Err(IdentifierError::MarketCodeTaken(code));
        }

        by_name.insert(key.clone(), code);
        by_code.insert(code, key);
        Ok(())
    }

    pub fn encode(&self, name: &str) -> Option<u16> {
        self.by_name.read().get(&name.to_lowercase()).copied()
    }

    pub fn decode(&self, code: u16) -> Option<String> {
        self.by_code.read().get(&code).cloned()
    }
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
