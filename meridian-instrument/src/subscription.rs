use crate::symbol::Symbol;
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Bar duration of a subscription (`spec.md` GLOSSARY).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    /// The fixed bar span of this resolution. `Tick` has no fixed span and returns `None`.
    pub fn duration(self) -> Option<Duration> {
        match self {
            Resolution::Tick => None,
            Resolution::Second => Some(Duration::seconds(1)),
            Resolution::Minute => Some(Duration::minutes(1)),
            Resolution::Hour => Some(Duration::hours(1)),
            Resolution::Daily => Some(Duration::days(1)),
        }
    }
}

/// Trade (last sale) or Quote (bid/ask) tick type (`spec.md` GLOSSARY).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum TickType {
    Trade,
    Quote,
}

/// Declarative feed descriptor (`spec.md` §3).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionDataConfig {
    pub symbol: Symbol,
    pub resolution: Resolution,
    pub data_time_zone: Tz,
    pub exchange_time_zone: Tz,
    pub fill_forward: bool,
    pub extended_hours: bool,
    pub tick_type: TickType,
}

impl SubscriptionDataConfig {
    pub fn new(
        symbol: Symbol,
        resolution: Resolution,
        data_time_zone: Tz,
        exchange_time_zone: Tz,
        tick_type: TickType,
    ) -> Self {
        Self {
            symbol,
            resolution,
            data_time_zone,
            exchange_time_zone,
            fill_forward: false,
            extended_hours: false,
            tick_type,
        }
    }

    pub fn with_fill_forward(mut self, fill_forward: bool) -> Self {
        self.fill_forward = fill_forward;
        self
    }

    pub fn with_extended_hours(mut self, extended_hours: bool) -> Self {
        self.extended_hours = extended_hours;
        self
    }
}
