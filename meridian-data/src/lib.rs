//! Exchange calendars, the `BaseData` stream model, data enumerator combinators, and the
//! consolidator chain (`spec.md` §3, §4.B, §4.C, §4.D).
//!
//! Grounded on `barter-data`'s streaming/transformer pipeline, generalized from a fixed set of
//! exchange WebSocket transformers to the resolution-agnostic, frontier-synchronized combinator
//! chain `spec.md` describes.

pub mod base_data;
pub mod calendar;
pub mod combinators;
pub mod consolidator;

pub use base_data::{BaseData, BaseDataCollection, DataKind, OptionChainUniverseDataCollection};
pub use calendar::{
    CalendarError, DaySpan, ExchangeCalendar, MarketHoursDatabase, MarketHoursEntry, MdyDate,
    Segment, SessionState,
};
pub use combinators::{
    Advance, BaseDataCollectionAggregator, Enqueueable, Enumerator, FastForward, FillForward,
    FilterEvent, FrontierAware, LiveFillForward, RateLimit, Refresh, SubscriptionFilter, TradeBar,
    TradeBarBuilder, VecSource,
};
pub use consolidator::{
    BarKind, Consolidated, Consolidator, ConsolidatorError, CountConsolidator, PeriodConsolidator,
    SequentialConsolidator,
};
