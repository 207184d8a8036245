//! Data enumerator combinators (`spec.md` §4.C). Each combinator is a single-threaded, lazy,
//! single-shot producer: the engine loop drives it forward one tick at a time by calling its
//! `advance` method, never by pulling it like a plain [`Iterator`] to exhaustion. Combinators
//! that need the current instant (frontier-aware, rate-limited, live fill-forward) take it as an
//! explicit argument rather than holding a time provider themselves, so their gating logic stays
//! deterministic and directly testable.

use crate::base_data::{BaseData, BaseDataCollection, DataKind};
use crate::calendar::ExchangeCalendar;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use meridian_instrument::Symbol;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use thiserror::Error;

/// Result of a single `advance` call (`spec.md` §4.C).
#[derive(Debug, Clone, PartialEq)]
pub enum Advance<T> {
    /// A new item was produced this tick.
    Emit(T),
    /// No data this tick; the enumerator is still iterating.
    Empty,
    /// The enumerator has terminated; no further calls will produce items.
    Done,
}

impl<T> Advance<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            Advance::Emit(item) => Some(item),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Advance::Done)
    }
}

/// Parameterless single-shot producer. Combinators whose gating needs an external input (the
/// current frontier, a timeout) expose an inherent `advance(...)` instead of implementing this.
pub trait Enumerator {
    type Item;
    fn advance(&mut self) -> Advance<Self::Item>;
}

/// Wraps any [`Enumerator`] as a plain source; lets hand-written test fixtures and adapter
/// iterators feed the combinator chain.
pub struct VecSource<T> {
    items: VecDeque<T>,
}

impl<T> VecSource<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

impl<T> Enumerator for VecSource<T> {
    type Item = T;

    fn advance(&mut self) -> Advance<T> {
        match self.items.pop_front() {
            Some(item) => Advance::Emit(item),
            None => Advance::Done,
        }
    }
}

/// Gates an inner [`BaseData`] stream on a `local_frontier`: the inner's current element is
/// emitted only once its `end_time` has passed, and consecutive `Auxiliary` samples sharing
/// `end_time` and `value` are deduplicated (`spec.md` §4.C).
pub struct FrontierAware<I> {
    inner: I,
    held: Option<BaseData>,
    last_emitted: Option<(NaiveDateTime, rust_decimal::Decimal, DataKind)>,
}

impl<I: Enumerator<Item = BaseData>> FrontierAware<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            held: None,
            last_emitted: None,
        }
    }

    pub fn advance(&mut self, local_frontier: NaiveDateTime) -> Advance<BaseData> {
        if self.held.is_none() {
            match self.inner.advance() {
                Advance::Emit(item) => self.held = Some(item),
                Advance::Empty => return Advance::Empty,
                Advance::Done => return Advance::Done,
            }
        }

        let ready = self
            .held
            .as_ref()
            .map(|item| item.end_time <= local_frontier)
            .unwrap_or(false);
        if !ready {
            return Advance::Empty;
        }

        let item = self.held.take().expect("checked Some above");
        if item.kind == DataKind::Auxiliary {
            if let Some((end_time, value, kind)) = self.last_emitted {
                if kind == DataKind::Auxiliary && end_time == item.end_time && value == item.value {
                    return Advance::Empty;
                }
            }
        }
        self.last_emitted = Some((item.end_time, item.value, item.kind));
        Advance::Emit(item)
    }
}

/// Synthesizes a clone of the last sample across silent intervals of a historical (offline)
/// source, respecting exchange hours (`spec.md` §4.C).
pub struct FillForward<I> {
    inner: I,
    resolution: ChronoDuration,
    calendar: ExchangeCalendar,
    extended_hours: bool,
    subscription_end: NaiveDateTime,
    last_emitted: Option<BaseData>,
    pending_source: Option<BaseData>,
    inner_done: bool,
}

impl<I: Enumerator<Item = BaseData>> FillForward<I> {
    pub fn new(
        inner: I,
        resolution: ChronoDuration,
        calendar: ExchangeCalendar,
        extended_hours: bool,
        subscription_end: NaiveDateTime,
    ) -> Self {
        Self {
            inner,
            resolution,
            calendar,
            extended_hours,
            subscription_end,
            last_emitted: None,
            pending_source: None,
            inner_done: false,
        }
    }

    /// Next synthesized bar after `prev`, skipping any expected slot that falls outside
    /// permitted exchange hours, up to `subscription_end`.
    fn next_synthesized(&self, prev: &BaseData) -> Option<BaseData> {
        let mut start = prev.end_time;
        loop {
            let end = start + self.resolution;
            if end > self.subscription_end {
                return None;
            }
            if self
                .calendar
                .is_open_during_bar(start, end, self.extended_hours)
            {
                return Some(prev.clone_for_fill_forward(start, end));
            }
            start = end;
        }
    }

    pub fn advance(&mut self) -> Advance<BaseData> {
        let next_source = if let Some(item) = self.pending_source.take() {
            Some(item)
        } else if !self.inner_done {
            match self.inner.advance() {
                Advance::Emit(item) => Some(item),
                Advance::Empty => None,
                Advance::Done => {
                    self.inner_done = true;
                    None
                }
            }
        } else {
            None
        };

        match (self.last_emitted.clone(), next_source) {
            (None, Some(item)) => {
                self.last_emitted = Some(item.clone());
                Advance::Emit(item)
            }
            (None, None) => {
                if self.inner_done {
                    Advance::Done
                } else {
                    Advance::Empty
                }
            }
            (Some(prev), Some(item)) => {
                let expected = prev.end_time + self.resolution;
                if item.end_time <= expected {
                    self.last_emitted = Some(item.clone());
                    Advance::Emit(item)
                } else {
                    self.pending_source = Some(item);
                    match self.next_synthesized(&prev) {
                        Some(synth) => {
                            self.last_emitted = Some(synth.clone());
                            Advance::Emit(synth)
                        }
                        None => Advance::Empty,
                    }
                }
            }
            (Some(prev), None) => {
                if !self.inner_done {
                    return Advance::Empty;
                }
                match self.next_synthesized(&prev) {
                    Some(synth) => {
                        self.last_emitted = Some(synth.clone());
                        Advance::Emit(synth)
                    }
                    None => Advance::Done,
                }
            }
        }
    }
}

/// Like [`FillForward`], but for a live source: decides whether to synthesize by comparing the
/// expected next emission time to the wall clock rather than waiting on the next source sample
/// (`spec.md` §4.C).
pub struct LiveFillForward<I> {
    inner: I,
    resolution: ChronoDuration,
    calendar: ExchangeCalendar,
    extended_hours: bool,
    last_emitted: Option<BaseData>,
}

impl<I: Enumerator<Item = BaseData>> LiveFillForward<I> {
    pub fn new(inner: I, resolution: ChronoDuration, calendar: ExchangeCalendar, extended_hours: bool) -> Self {
        Self {
            inner,
            resolution,
            calendar,
            extended_hours,
            last_emitted: None,
        }
    }

    pub fn advance(&mut self, local_now: NaiveDateTime) -> Advance<BaseData> {
        match self.inner.advance() {
            Advance::Emit(item) => {
                self.last_emitted = Some(item.clone());
                Advance::Emit(item)
            }
            Advance::Done => Advance::Done,
            Advance::Empty => {
                if let Some(prev) = &self.last_emitted {
                    let expected = prev.end_time + self.resolution;
                    if expected <= local_now
                        && self
                            .calendar
                            .is_open_during_bar(prev.end_time, expected, self.extended_hours)
                    {
                        let synth = prev.clone_for_fill_forward(prev.end_time, expected);
                        self.last_emitted = Some(synth.clone());
                        return Advance::Emit(synth);
                    }
                }
                Advance::Empty
            }
        }
    }
}

/// Drops samples whose age (`local_frontier - end_time`) exceeds `max_age`; sheds stale data on
/// a live reconnect (`spec.md` §4.C).
pub struct FastForward<I> {
    inner: I,
    max_age: ChronoDuration,
}

impl<I: Enumerator<Item = BaseData>> FastForward<I> {
    pub fn new(inner: I, max_age: ChronoDuration) -> Self {
        Self { inner, max_age }
    }

    pub fn advance(&mut self, local_frontier: NaiveDateTime) -> Advance<BaseData> {
        loop {
            match self.inner.advance() {
                Advance::Emit(item) => {
                    if local_frontier - item.end_time > self.max_age {
                        continue;
                    }
                    return Advance::Emit(item);
                }
                other => return other,
            }
        }
    }
}

/// Permits at most one underlying advance per `min_interval`, measured against buckets of
/// wall-clock time rounded down to the interval (`spec.md` §4.C).
pub struct RateLimit<I> {
    inner: I,
    min_interval: ChronoDuration,
    last_permitted_bucket: Option<i64>,
}

impl<I: Enumerator<Item = BaseData>> RateLimit<I> {
    pub fn new(inner: I, min_interval: ChronoDuration) -> Self {
        Self {
            inner,
            min_interval,
            last_permitted_bucket: None,
        }
    }

    pub fn advance(&mut self, now: DateTime<Utc>) -> Advance<BaseData> {
        let interval_seconds = self.min_interval.num_seconds().max(1);
        let bucket = now.timestamp().div_euclid(interval_seconds);
        if self.last_permitted_bucket == Some(bucket) {
            return Advance::Empty;
        }
        self.last_permitted_bucket = Some(bucket);
        self.inner.advance()
    }
}

/// Regenerates its inner enumerator on every advance; for a source that represents a one-shot
/// request which must be reissued each tick (`spec.md` §4.C).
pub struct Refresh<F> {
    factory: F,
}

impl<F, I> Refresh<F>
where
    F: FnMut() -> I,
    I: Enumerator<Item = BaseData>,
{
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    pub fn advance(&mut self) -> Advance<BaseData> {
        let mut fresh = (self.factory)();
        fresh.advance()
    }
}

/// A producer-side queue drained by the consumer with a configured timeout. Terminated only by
/// an explicit [`Enqueueable::stop`] handle; after stop, drains any remaining items before ending
/// (`spec.md` §4.C).
pub struct Enqueueable<T> {
    rx: tokio::sync::mpsc::Receiver<T>,
    timeout: StdDuration,
    stopped: Arc<AtomicBool>,
}

impl<T: Send + 'static> Enqueueable<T> {
    /// Blocking mode: the producer applies back-pressure via a bounded channel.
    pub fn blocking(
        capacity: usize,
        timeout: StdDuration,
    ) -> (meridian_integration::BoundedTx<T>, Self, Arc<AtomicBool>) {
        let (tx, rx) = meridian_integration::channel::bounded(capacity);
        let stopped = Arc::new(AtomicBool::new(false));
        (
            tx,
            Self {
                rx,
                timeout,
                stopped: stopped.clone(),
            },
            stopped,
        )
    }

    pub async fn advance(&mut self) -> Advance<T> {
        match tokio::time::timeout(self.timeout, self.rx.recv()).await {
            Ok(Some(item)) => Advance::Emit(item),
            Ok(None) => Advance::Done,
            Err(_elapsed) => {
                if self.stopped.load(Ordering::Acquire) {
                    Advance::Done
                } else {
                    Advance::Empty
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum FilterEvent {
    #[error("filter for {symbol} rejected sample at {at}: {reason}")]
    Rejected {
        symbol: Symbol,
        at: NaiveDateTime,
        reason: String,
    },
}

/// Applies a per-security user filter and an exchange-open check, dropping `Auxiliary` data from
/// the latter; terminates once a sample's `time` exceeds `subscription_end` (`spec.md` §4.C).
pub struct SubscriptionFilter<I, F> {
    inner: I,
    calendar: ExchangeCalendar,
    extended_hours: bool,
    subscription_end: NaiveDateTime,
    user_filter: F,
    events: Vec<FilterEvent>,
}

impl<I, F> SubscriptionFilter<I, F>
where
    I: Enumerator<Item = BaseData>,
    F: FnMut(&BaseData) -> Result<bool, String>,
{
    pub fn new(
        inner: I,
        calendar: ExchangeCalendar,
        extended_hours: bool,
        subscription_end: NaiveDateTime,
        user_filter: F,
    ) -> Self {
        Self {
            inner,
            calendar,
            extended_hours,
            subscription_end,
            user_filter,
            events: Vec::new(),
        }
    }

    pub fn take_events(&mut self) -> Vec<FilterEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn advance(&mut self) -> Advance<BaseData> {
        match self.inner.advance() {
            Advance::Emit(item) => {
                if item.time > self.subscription_end {
                    return Advance::Done;
                }
                if item.kind != DataKind::Auxiliary
                    && !self.calendar.is_open(item.time, self.extended_hours)
                {
                    return Advance::Empty;
                }
                match (self.user_filter)(&item) {
                    Ok(true) => Advance::Emit(item),
                    Ok(false) => Advance::Empty,
                    Err(reason) => {
                        self.events.push(FilterEvent::Rejected {
                            symbol: item.symbol.clone(),
                            at: item.time,
                            reason,
                        });
                        Advance::Empty
                    }
                }
            }
            other => other,
        }
    }
}

/// Groups consecutive source samples sharing `end_time` into a single [`BaseDataCollection`]
/// bearing a fixed collector symbol (`spec.md` §4.C).
pub struct BaseDataCollectionAggregator<I> {
    inner: I,
    collector_symbol: Symbol,
    pending: Vec<BaseData>,
    pending_end_time: Option<NaiveDateTime>,
}

impl<I: Enumerator<Item = BaseData>> BaseDataCollectionAggregator<I> {
    pub fn new(inner: I, collector_symbol: Symbol) -> Self {
        Self {
            inner,
            collector_symbol,
            pending: Vec::new(),
            pending_end_time: None,
        }
    }

    fn flush(&mut self) -> BaseDataCollection {
        let end_time = self.pending_end_time.take().expect("flush called with data pending");
        let time = self.pending.first().map(|d| d.time).unwrap_or(end_time);
        BaseDataCollection::new(self.collector_symbol.clone(), time, end_time, std::mem::take(&mut self.pending))
    }

    pub fn advance(&mut self) -> Advance<BaseDataCollection> {
        match self.inner.advance() {
            Advance::Emit(item) => match self.pending_end_time {
                None => {
                    self.pending_end_time = Some(item.end_time);
                    self.pending.push(item);
                    Advance::Empty
                }
                Some(end_time) if end_time == item.end_time => {
                    self.pending.push(item);
                    Advance::Empty
                }
                Some(_) => {
                    let flushed = self.flush();
                    self.pending_end_time = Some(item.end_time);
                    self.pending.push(item);
                    Advance::Emit(flushed)
                }
            },
            Advance::Empty => Advance::Empty,
            Advance::Done => {
                if self.pending.is_empty() {
                    Advance::Done
                } else {
                    Advance::Emit(self.flush())
                }
            }
        }
    }
}

/// OHLCV bar produced by [`TradeBarBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct TradeBar {
    pub symbol: Symbol,
    pub time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub open: rust_decimal::Decimal,
    pub high: rust_decimal::Decimal,
    pub low: rust_decimal::Decimal,
    pub close: rust_decimal::Decimal,
    pub volume: rust_decimal::Decimal,
}

/// Converts ticks into OHLCV bars of a fixed size per symbol; a working bar is held until its
/// `end_time` has passed the frontier, then emitted and a new one begun rounded down to the bar
/// size (`spec.md` §4.C, live mode).
pub struct TradeBarBuilder {
    resolution: ChronoDuration,
    working: HashMap<Symbol, TradeBar>,
    ready: VecDeque<TradeBar>,
}

impl TradeBarBuilder {
    pub fn new(resolution: ChronoDuration) -> Self {
        Self {
            resolution,
            working: HashMap::new(),
            ready: VecDeque::new(),
        }
    }

    fn round_down(&self, time: NaiveDateTime) -> NaiveDateTime {
        let size = self.resolution.num_seconds().max(1);
        let epoch = time.and_utc().timestamp();
        let rounded = epoch.div_euclid(size) * size;
        DateTime::<Utc>::from_timestamp(rounded, 0)
            .expect("rounded timestamp in range")
            .naive_utc()
    }

    /// Feed a single tick. If it falls outside the currently open working bar for its symbol
    /// (a tick arrived after the builder should already have rolled over), the stale working bar
    /// is flushed to the ready queue immediately.
    pub fn on_tick(
        &mut self,
        symbol: Symbol,
        time: NaiveDateTime,
        price: rust_decimal::Decimal,
        volume: rust_decimal::Decimal,
    ) {
        let start = self.round_down(time);
        let end = start + self.resolution;

        match self.working.get_mut(&symbol) {
            Some(bar) if bar.end_time == end => {
                bar.high = bar.high.max(price);
                bar.low = bar.low.min(price);
                bar.close = price;
                bar.volume += volume;
            }
            Some(_) => {
                let stale = self.working.remove(&symbol).expect("checked Some above");
                self.ready.push_back(stale);
                self.working.insert(
                    symbol.clone(),
                    TradeBar {
                        symbol,
                        time: start,
                        end_time: end,
                        open: price,
                        high: price,
                        low: price,
                        close: price,
                        volume,
                    },
                );
            }
            None => {
                self.working.insert(
                    symbol.clone(),
                    TradeBar {
                        symbol,
                        time: start,
                        end_time: end,
                        open: price,
                        high: price,
                        low: price,
                        close: price,
                        volume,
                    },
                );
            }
        }
    }

    /// Emit any bar whose window has closed by `local_frontier`.
    pub fn poll(&mut self, local_frontier: NaiveDateTime) -> Advance<TradeBar> {
        if let Some(bar) = self.ready.pop_front() {
            return Advance::Emit(bar);
        }
        let closed_symbol = self
            .working
            .iter()
            .find(|(_, bar)| bar.end_time <= local_frontier)
            .map(|(symbol, _)| symbol.clone());
        match closed_symbol {
            Some(symbol) => Advance::Emit(self.working.remove(&symbol).expect("checked Some above")),
            None => Advance::Empty,
        }
    }
}
