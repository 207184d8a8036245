//! Binds the time/offset providers (`spec.md` §4.H) to a transaction handler, giving a single
//! place that owns the UTC frontier and its local-time projection. §4.C enumerators and §4.E
//! universes are driven externally against the same `time`/`offsets` pair; this struct only
//! owns the pieces that must be shared rather than duplicated per subscription.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use meridian_execution::{BrokerageGateway, PortfolioCollaborator, ResultHandler, TransactionHandler};
use meridian_integration::{ManualTimeProvider, TimeProvider, TimeZoneOffsetProvider};
use std::sync::Arc;

pub struct Engine<G, P, R> {
    pub time: Arc<ManualTimeProvider>,
    pub offsets: TimeZoneOffsetProvider,
    pub transaction_handler: Arc<TransactionHandler<G, P, R>>,
}

impl<G, P, R> Engine<G, P, R>
where
    G: BrokerageGateway,
    P: PortfolioCollaborator,
    R: ResultHandler,
{
    pub fn new(start: DateTime<Utc>, exchange_zone: Tz, transaction_handler: Arc<TransactionHandler<G, P, R>>) -> Self {
        Self {
            time: Arc::new(ManualTimeProvider::new(start)),
            offsets: TimeZoneOffsetProvider::new(exchange_zone),
            transaction_handler,
        }
    }

    /// Advance the deterministic backtest frontier. The engine loop calls this once per time
    /// slice before invoking user strategy code (`spec.md` §2).
    pub fn advance_to(&self, utc: DateTime<Utc>) {
        self.time.advance_to(utc);
    }

    pub fn utc_now(&self) -> DateTime<Utc> {
        self.time.utc_now()
    }

    pub fn local_now(&self) -> DateTime<Tz> {
        self.offsets.to_local(self.time.utc_now())
    }
}
