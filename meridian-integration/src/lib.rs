//! Ambient plumbing shared across the engine crates: the bounded request-queue channel and the
//! time/offset providers that back `spec.md` §4.H.

pub mod channel;
pub mod time;

pub use channel::BoundedTx;
pub use time::{ManualTimeProvider, RealTimeProvider, TimeProvider, TimeZoneOffsetProvider};
