use crate::error::IdentifierError;
use serde::{Deserialize, Serialize};

/// Security-type field of a packed [`SecurityIdentifier`](crate::identifier::SecurityIdentifier).
///
/// Width 100 in the packed layout (`spec.md` §3); only a handful of values are defined here,
/// leaving room for the registry-style extension the market code enjoys.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum SecurityType {
    Base,
    Equity,
    Option,
    Forex,
    Cfd,
}

impl SecurityType {
    pub(crate) fn to_code(self) -> u8 {
        match self {
            SecurityType::Base => 0,
            SecurityType::Equity => 1,
            SecurityType::Option => 2,
            SecurityType::Forex => 3,
            SecurityType::Cfd => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self, IdentifierError> {
        match code {
            0 => Ok(SecurityType::Base),
            1 => Ok(SecurityType::Equity),
            2 => Ok(SecurityType::Option),
            3 => Ok(SecurityType::Forex),
            4 => Ok(SecurityType::Cfd),
            other => Err(IdentifierError::OutOfRange {
                field: "security type",
                value: other as i64,
                width: 100,
            }),
        }
    }
}

impl std::fmt::Display for SecurityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecurityType::Base => "base",
            SecurityType::Equity => "equity",
            SecurityType::Option => "option",
            SecurityType::Forex => "forex",
            SecurityType::Cfd => "cfd",
        };
        write!(f, "{s}")
    }
}

/// Put/call side of an option contract. Width 1 bit's worth (0/1) within a width-10 field.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum OptionRight {
    Put,
    Call,
}

impl OptionRight {
    pub(crate) fn to_code(self) -> u8 {
        match self {
            OptionRight::Put => 0,
            OptionRight::Call => 1,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self, IdentifierError> {
        match code {
            0 => Ok(OptionRight::Put),
            1 => Ok(OptionRight::Call),
            other => Err(IdentifierError::OutOfRange {
                field: "put/call",
                value: other as i64,
                width: 10,
            }),
        }
    }
}

/// Exercise style of an option contract.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum OptionStyle {
    American,
    European,
}

impl OptionStyle {
    pub(crate) fn to_code(self) -> u8 {
        match self {
            OptionStyle::American => 0,
            OptionStyle::European => 1,
        }
    }

    pub(crate) fn from_code(code: u8) -> Result<Self, IdentifierError> {
        match code {
            0 => Ok(OptionStyle::American),
            1 => Ok(OptionStyle::European),
            other => Err(IdentifierError::OutOfRange {
                field: "option style",
                value: other as i64,
                width: 10,
            }),
        }
    }
}
