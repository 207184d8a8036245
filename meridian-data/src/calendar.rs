use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use chrono_tz::Tz;
use meridian_instrument::SecurityType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Session state of a calendar segment (`spec.md` §4.B).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum SessionState {
    Closed,
    PreMarket,
    Market,
    PostMarket,
}

impl SessionState {
    fn is_open(self, extended_hours: bool) -> bool {
        match self {
            SessionState::Market => true,
            SessionState::PreMarket | SessionState::PostMarket => extended_hours,
            SessionState::Closed => false,
        }
    }
}

/// Offset from local midnight, in whole seconds, `0..=86_400`. Modeled as a span rather than a
/// time-of-day so a session can close exactly at midnight (`24:00:00`), which `NaiveTime`
/// cannot represent.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DaySpan(pub i64);

impl DaySpan {
    pub const MIDNIGHT: DaySpan = DaySpan(0);
    pub const END_OF_DAY: DaySpan = DaySpan(86_400);

    pub fn hms(h: u32, m: u32, s: u32) -> Self {
        Self(h as i64 * 3600 + m as i64 * 60 + s as i64)
    }

    fn from_naive_time_of_day(seconds_from_midnight: u32) -> Self {
        Self(seconds_from_midnight as i64)
    }
}

impl Serialize for DaySpan {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let total = self.0;
        let h = total / 3600;
        let m = (total % 3600) / 60;
        let s = total % 60;
        serializer.serialize_str(&format!("{h:02}:{m:02}:{s:02}"))
    }
}

impl<'de> Deserialize<'de> for DaySpan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut parts = s.splitn(3, ':');
        let (h, m, sec) = (
            parts.next().ok_or_else(|| serde::de::Error::custom("missing hour"))?,
            parts.next().ok_or_else(|| serde::de::Error::custom("missing minute"))?,
            parts.next().ok_or_else(|| serde::de::Error::custom("missing second"))?,
        );
        let h: i64 = h.parse().map_err(serde::de::Error::custom)?;
        let m: i64 = m.parse().map_err(serde::de::Error::custom)?;
        let sec: i64 = sec.parse().map_err(serde::de::Error::custom)?;
        Ok(DaySpan(h * 3600 + m * 60 + sec))
    }
}

/// A single contiguous span of a trading day with a fixed [`SessionState`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Segment {
    pub start: DaySpan,
    pub end: DaySpan,
    pub state: SessionState,
}

impl Segment {
    pub fn new(start: DaySpan, end: DaySpan, state: SessionState) -> Self {
        Self { start, end, state }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CalendarError {
    #[error("weekday schedule segments must be sorted and non-overlapping")]
    SegmentsNotSorted,
    #[error("weekday schedule segments must contiguously cover the full day (00:00:00..24:00:00)")]
    SegmentsNotContiguous,
}

fn validate_day(segments: &[Segment]) -> Result<(), CalendarError> {
    if segments.is_empty() {
        return Err(CalendarError::SegmentsNotContiguous);
    }
    if segments[0].start != DaySpan::MIDNIGHT {
        return Err(CalendarError::SegmentsNotContiguous);
    }
    for window in segments.windows(2) {
        let (a, b) = (window[0], window[1]);
        if a.start >= a.end || a.end != b.start {
            return Err(CalendarError::SegmentsNotSorted);
        }
    }
    if segments.last().unwrap().end != DaySpan::END_OF_DAY {
        return Err(CalendarError::SegmentsNotContiguous);
    }
    Ok(())
}

/// Per-market weekly trading hours and holiday set (`spec.md` §4.B).
#[derive(Debug, Clone)]
pub struct ExchangeCalendar {
    // Indexed by `Weekday::num_days_from_monday()`.
    weekly: [Vec<Segment>; 7],
    holidays: HashSet<NaiveDate>,
}

/// Plain-data mirror of [`ExchangeCalendar`], used only to round-trip it through serde without
/// exposing a constructor that skips [`validate_day`].
#[derive(Deserialize, Serialize)]
struct ExchangeCalendarData {
    weekly: [Vec<Segment>; 7],
    holidays: HashSet<NaiveDate>,
}

impl Serialize for ExchangeCalendar {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ExchangeCalendarData {
            weekly: self.weekly.clone(),
            holidays: self.holidays.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExchangeCalendar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let data = ExchangeCalendarData::deserialize(deserializer)?;
        ExchangeCalendar::new(data.weekly, data.holidays).map_err(serde::de::Error::custom)
    }
}

impl ExchangeCalendar {
    pub fn new(weekly: [Vec<Segment>; 7], holidays: HashSet<NaiveDate>) -> Result<Self, CalendarError> {
        for day in &weekly {
            validate_day(day)?;
        }
        Ok(Self { weekly, holidays })
    }

    pub fn market_hours_segments(&self, day: Weekday) -> &[Segment] {
        &self.weekly[day.num_days_from_monday() as usize]
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    fn session_state_at(&self, local: NaiveDateTime) -> SessionState {
        if self.is_holiday(local.date()) {
            return SessionState::Closed;
        }
        let span = DaySpan::from_naive_time_of_day(local.time().num_seconds_from_midnight());
        self.market_hours_segments(local.date().weekday())
            .iter()
            .find(|seg| seg.start <= span && span < seg.end)
            .map(|seg| seg.state)
            .unwrap_or(SessionState::Closed)
    }

    pub fn is_open(&self, local: NaiveDateTime, extended_hours: bool) -> bool {
        self.session_state_at(local).is_open(extended_hours)
    }

    /// Whether any open (given `extended_hours`) segment overlaps `[start, end)` local time.
    pub fn is_open_during_bar(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        extended_hours: bool,
    ) -> bool {
        if start >= end {
            return false;
        }

        let mut date = start.date();
        loop {
            if !self.is_holiday(date) {
                let day_start = if date == start.date() {
                    DaySpan::from_naive_time_of_day(start.time().num_seconds_from_midnight())
                } else {
                    DaySpan::MIDNIGHT
                };
                let day_end = if date == end.date() {
                    DaySpan::from_naive_time_of_day(end.time().num_seconds_from_midnight())
                } else {
                    DaySpan::END_OF_DAY
                };

                let overlaps = self.market_hours_segments(date.weekday()).iter().any(|seg| {
                    seg.state.is_open(extended_hours) && seg.start < day_end && day_start < seg.end
                });
                if overlaps {
                    return true;
                }
            }

            if date == end.date() {
                return false;
            }
            date = date.succ_opt().expect("calendar dates do not overflow in practice");
        }
    }

    /// First local instant strictly after `local` at which the market is open, searching up to
    /// 14 calendar days ahead (enough to skip any realistic holiday cluster).
    pub fn next_open_after(&self, local: NaiveDateTime, extended_hours: bool) -> Option<NaiveDateTime> {
        for day_offset in 0..14 {
            let date = local.date() + chrono::Duration::days(day_offset);
            if self.is_holiday(date) {
                continue;
            }
            for seg in self.market_hours_segments(date.weekday()) {
                if !seg.state.is_open(extended_hours) {
                    continue;
                }
                let seg_start = date.and_time(chrono::NaiveTime::MIN)
                    + chrono::Duration::seconds(seg.start.0);
                if seg_start > local {
                    return Some(seg_start);
                }
            }
        }
        None
    }
}

/// Calendar date formatted per `spec.md` §6 as `M/d/yyyy` (no zero-padding), used by
/// [`MarketHoursEntry::holidays`]. Follows the same hand-written serde pattern as [`DaySpan`]'s
/// `HH:MM:SS` encoding, just with a different wire format.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MdyDate(pub NaiveDate);

impl Serialize for MdyDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{}/{}/{}", self.0.month(), self.0.day(), self.0.year()))
    }
}

impl<'de> Deserialize<'de> for MdyDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut parts = s.splitn(3, '/');
        let (m, d, y) = (
            parts.next().ok_or_else(|| serde::de::Error::custom("missing month"))?,
            parts.next().ok_or_else(|| serde::de::Error::custom("missing day"))?,
            parts.next().ok_or_else(|| serde::de::Error::custom("missing year"))?,
        );
        let m: u32 = m.parse().map_err(serde::de::Error::custom)?;
        let d: u32 = d.parse().map_err(serde::de::Error::custom)?;
        let y: i32 = y.parse().map_err(serde::de::Error::custom)?;
        NaiveDate::from_ymd_opt(y, m, d)
            .map(MdyDate)
            .ok_or_else(|| serde::de::Error::custom("invalid M/d/yyyy date"))
    }
}

/// One [`MarketHoursDatabase`] entry: the persisted, JSON-serializable form of an
/// [`ExchangeCalendar`] plus the IANA zone pair `spec.md` §6 requires alongside it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketHoursEntry {
    #[serde(rename = "dataTimeZone")]
    pub data_time_zone: Tz,
    #[serde(rename = "exchangeTimeZone")]
    pub exchange_time_zone: Tz,
    pub weekly: [Vec<Segment>; 7],
    pub holidays: Vec<MdyDate>,
}

impl MarketHoursEntry {
    pub fn to_calendar(&self) -> Result<ExchangeCalendar, CalendarError> {
        let holidays = self.holidays.iter().map(|d| d.0).collect();
        ExchangeCalendar::new(self.weekly.clone(), holidays)
    }
}

const WILDCARD: &str = "[*]";

/// Persistent market-hours configuration (`spec.md` §6): a JSON document mapping
/// `SecurityType-Market-Symbol` keys (with `[*]` wildcards for symbol or market) to
/// [`MarketHoursEntry`] records.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MarketHoursDatabase {
    entries: HashMap<String, MarketHoursEntry>,
}

impl MarketHoursDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(security_type: SecurityType, market: &str, symbol: &str) -> String {
        format!("{security_type}-{market}-{symbol}")
    }

    pub fn insert(&mut self, security_type: SecurityType, market: &str, symbol: &str, entry: MarketHoursEntry) {
        self.entries.insert(Self::key(security_type, market, symbol), entry);
    }

    /// Resolves an entry, falling back through `[*]` wildcards in priority order: exact key,
    /// symbol wildcard, market wildcard, then both wildcarded (`spec.md` §6).
    pub fn entry_for(&self, security_type: SecurityType, market: &str, symbol: &str) -> Option<&MarketHoursEntry> {
        [
            Self::key(security_type, market, symbol),
            Self::key(security_type, market, WILDCARD),
            Self::key(security_type, WILDCARD, symbol),
            Self::key(security_type, WILDCARD, WILDCARD),
        ]
        .iter()
        .find_map(|key| self.entries.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn simple_weekday_schedule() -> Vec<Segment> {
        vec![
            Segment::new(DaySpan::MIDNIGHT, DaySpan::hms(9, 30, 0), SessionState::PreMarket),
            Segment::new(DaySpan::hms(9, 30, 0), DaySpan::hms(16, 0, 0), SessionState::Market),
            Segment::new(DaySpan::hms(16, 0, 0), DaySpan::END_OF_DAY, SessionState::PostMarket),
        ]
    }

    fn weekend_closed() -> Vec<Segment> {
        vec![Segment::new(DaySpan::MIDNIGHT, DaySpan::END_OF_DAY, SessionState::Closed)]
    }

    fn usa_equity_calendar() -> ExchangeCalendar {
        let weekly = [
            simple_weekday_schedule(), // Monday
            simple_weekday_schedule(), // Tuesday
            simple_weekday_schedule(), // Wednesday
            simple_weekday_schedule(), // Thursday
            simple_weekday_schedule(), // Friday
            weekend_closed(),          // Saturday
            weekend_closed(),          // Sunday
        ];
        let mut holidays = HashSet::new();
        holidays.insert(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        ExchangeCalendar::new(weekly, holidays).unwrap()
    }

    #[test]
    fn regular_session_is_open_without_extended_hours() {
        let cal = usa_equity_calendar();
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert!(cal.is_open(dt, false));
    }

    #[test]
    fn pre_market_only_open_with_extended_hours() {
        let cal = usa_equity_calendar();
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert!(!cal.is_open(dt, false));
        assert!(cal.is_open(dt, true));
    }

    #[test]
    fn holiday_overrides_regular_session() {
        let cal = usa_equity_calendar();
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert!(!cal.is_open(dt, false));
        assert!(!cal.is_open(dt, true));
    }

    #[test]
    fn weekend_is_closed() {
        let cal = usa_equity_calendar();
        let saturday = NaiveDate::from_ymd_opt(2024, 1, 6)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert!(!cal.is_open(saturday, true));
    }

    #[test]
    fn next_open_after_skips_holiday_and_weekend() {
        let cal = usa_equity_calendar();
        // New Year's Day 2024 is a Monday holiday; next open should be Tuesday pre-market.
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        let next = cal.next_open_after(dt, true).unwrap();
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(next.time(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn construction_rejects_non_contiguous_schedule() {
        let gap = vec![Segment::new(DaySpan::MIDNIGHT, DaySpan::hms(9, 0, 0), SessionState::Closed)];
        let mut weekly: [Vec<Segment>; 7] = std::array::from_fn(|_| Vec::new());
        weekly[0] = gap;
        for day in weekly.iter_mut().skip(1) {
            *day = weekend_closed();
        }
        assert!(ExchangeCalendar::new(weekly, HashSet::new()).is_err());
    }

    #[test]
    fn day_span_serializes_as_hms_string() {
        let span = DaySpan::hms(9, 30, 0);
        let json = serde_json::to_string(&span).unwrap();
        assert_eq!(json, "\"09:30:00\"");
        let parsed: DaySpan = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, span);
    }

    #[test]
    fn mdy_date_serializes_without_zero_padding() {
        let date = MdyDate(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"1/2/2024\"");
        let parsed: MdyDate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, date);
    }

    #[test]
    fn market_hours_database_round_trips_segments_and_holidays_and_resolves_wildcards() {
        let entry = MarketHoursEntry {
            data_time_zone: chrono_tz::America::New_York,
            exchange_time_zone: chrono_tz::America::New_York,
            weekly: std::array::from_fn(|i| if i < 5 { simple_weekday_schedule() } else { weekend_closed() }),
            holidays: vec![MdyDate(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())],
        };

        let mut db = MarketHoursDatabase::new();
        db.insert(SecurityType::Equity, "usa", WILDCARD, entry.clone());

        let json = serde_json::to_string(&db).unwrap();
        let restored: MarketHoursDatabase = serde_json::from_str(&json).unwrap();

        let resolved = restored.entry_for(SecurityType::Equity, "usa", "SPY").unwrap();
        assert_eq!(resolved.holidays, entry.holidays);
        assert_eq!(resolved.weekly, entry.weekly);
        assert!(restored.entry_for(SecurityType::Equity, "fxcm", "EURUSD").is_none());

        let calendar = resolved.to_calendar().unwrap();
        assert!(calendar.is_holiday(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }
}
