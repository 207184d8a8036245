//! Bar aggregation and sequential chaining (`spec.md` §4.D).

use crate::base_data::BaseData;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConsolidatorError {
    #[error("{second} does not accept {first} as input")]
    IncompatibleType { first: &'static str, second: &'static str },
}

/// The kind of sample a [`Consolidator`] accepts or produces. Distinguishes the three bar shapes
/// the source corpus builds (`spec.md` §4.D): a tick-derived trade bar, a quote bar, or a
/// count-based tick bar.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BarKind {
    TradeBar,
    QuoteBar,
    TickBar,
}

/// A working output bar plus the event fired when it closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidated {
    pub bar: BaseData,
}

/// Transforms a stream of input samples into a lower-resolution output, firing a [`Consolidated`]
/// event when the working bar closes by time or count (`spec.md` §4.D).
pub trait Consolidator {
    fn input_kind(&self) -> BarKind;
    fn output_kind(&self) -> BarKind;

    /// Feed one input sample. Returns `Some` when feeding it closed the working bar.
    fn update(&mut self, sample: &BaseData) -> Option<Consolidated>;
}

/// A time-based consolidator: closes the working bar once a sample's `end_time` reaches or
/// exceeds the period boundary.
#[derive(Debug)]
pub struct PeriodConsolidator {
    period: chrono::Duration,
    kind: BarKind,
    working: Option<BaseData>,
}

impl PeriodConsolidator {
    pub fn new(period: chrono::Duration, kind: BarKind) -> Self {
        Self {
            period,
            kind,
            working: None,
        }
    }
}

impl Consolidator for PeriodConsolidator {
    fn input_kind(&self) -> BarKind {
        BarKind::TradeBar
    }

    fn output_kind(&self) -> BarKind {
        self.kind
    }

    fn update(&mut self, sample: &BaseData) -> Option<Consolidated> {
        match &mut self.working {
            None => {
                self.working = Some(sample.clone());
                None
            }
            Some(working) => {
                let boundary = working.time + self.period;
                if sample.end_time >= boundary {
                    working.end_time = boundary;
                    let closed = self.working.take().expect("checked Some above");
                    self.working = Some(sample.clone());
                    Some(Consolidated { bar: closed })
                } else {
                    working.end_time = sample.end_time;
                    working.value = sample.value;
                    None
                }
            }
        }
    }
}

/// A count-based consolidator: closes the working bar every `n` samples.
#[derive(Debug)]
pub struct CountConsolidator {
    n: usize,
    kind: BarKind,
    working: Option<BaseData>,
    seen: usize,
}

impl CountConsolidator {
    pub fn new(n: usize, kind: BarKind) -> Self {
        assert!(n > 0, "consolidator count must be positive");
        Self {
            n,
            kind,
            working: None,
            seen: 0,
        }
    }
}

impl Consolidator for CountConsolidator {
    fn input_kind(&self) -> BarKind {
        BarKind::TickBar
    }

    fn output_kind(&self) -> BarKind {
        self.kind
    }

    fn update(&mut self, sample: &BaseData) -> Option<Consolidated> {
        if self.working.is_none() {
            self.working = Some(sample.clone());
        } else if let Some(working) = &mut self.working {
            working.end_time = sample.end_time;
            working.value = sample.value;
        }
        self.seen += 1;

        if self.seen == self.n {
            self.seen = 0;
            self.working.take().map(|bar| Consolidated { bar })
        } else {
            None
        }
    }
}

/// Composes two consolidators so every output of `first` feeds `second`; the composite's events
/// reflect `second` (`spec.md` §4.D). Construction fails with [`ConsolidatorError::IncompatibleType`]
/// unless `second`'s input kind accepts `first`'s output kind.
#[derive(Debug)]
pub struct SequentialConsolidator<A, B> {
    first: A,
    second: B,
}

impl<A: Consolidator, B: Consolidator> SequentialConsolidator<A, B> {
    pub fn new(first: A, second: B) -> Result<Self, ConsolidatorError> {
        if first.output_kind() != second.input_kind() {
            return Err(ConsolidatorError::IncompatibleType {
                first: kind_name(first.output_kind()),
                second: kind_name(second.input_kind()),
            });
        }
        Ok(Self { first, second })
    }
}

impl<A: Consolidator, B: Consolidator> Consolidator for SequentialConsolidator<A, B> {
    fn input_kind(&self) -> BarKind {
        self.first.input_kind()
    }

    fn output_kind(&self) -> BarKind {
        self.second.output_kind()
    }

    fn update(&mut self, sample: &BaseData) -> Option<Consolidated> {
        match self.first.update(sample) {
            Some(consolidated) => self.second.update(&consolidated.bar),
            None => None,
        }
    }
}

fn kind_name(kind: BarKind) -> &'static str {
    match kind {
        BarKind::TradeBar => "TradeBar",
        BarKind::QuoteBar => "QuoteBar",
        BarKind::TickBar => "TickBar",
    }
}
