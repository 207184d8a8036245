use chrono::NaiveDateTime;
use meridian_instrument::Symbol;
use rust_decimal::Decimal;

/// Discriminator for a [`BaseData`] sample (`spec.md` §3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DataKind {
    Trade,
    Quote,
    Auxiliary,
}

/// A single market-data point. Exchange-local `time`/`end_time`; `value` is the last price or
/// equivalent scalar (close for a bar, last trade price for a tick).
#[derive(Debug, Clone, PartialEq)]
pub struct BaseData {
    pub symbol: Symbol,
    pub time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub value: Decimal,
    pub kind: DataKind,
}

impl BaseData {
    pub fn new(
        symbol: Symbol,
        time: NaiveDateTime,
        end_time: NaiveDateTime,
        value: Decimal,
        kind: DataKind,
    ) -> Self {
        Self {
            symbol,
            time,
            end_time,
            value,
            kind,
        }
    }

    /// A copy of this sample re-timed to `[time, end_time)`, used by fill-forward combinators to
    /// synthesize a repeated value across a silent interval. The clone carries the same `value`;
    /// `fill_forward` exists as a named hook so a future data kind can distinguish a genuine
    /// repeat from a synthesized one without changing every call site.
    pub fn clone_for_fill_forward(&self, time: NaiveDateTime, end_time: NaiveDateTime) -> Self {
        Self {
            symbol: self.symbol.clone(),
            time,
            end_time,
            value: self.value,
            kind: self.kind,
        }
    }
}

/// A composite [`BaseData`] carrying child samples that share `symbol`, `time`, `end_time`
/// (`spec.md` §3). The collector's own `value` is conventionally the last child's value, or
/// zero for an empty collection.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseDataCollection {
    pub symbol: Symbol,
    pub time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub data: Vec<BaseData>,
}

impl BaseDataCollection {
    pub fn new(symbol: Symbol, time: NaiveDateTime, end_time: NaiveDateTime, data: Vec<BaseData>) -> Self {
        Self {
            symbol,
            time,
            end_time,
            data,
        }
    }

    pub fn value(&self) -> Decimal {
        self.data.last().map(|d| d.value).unwrap_or(Decimal::ZERO)
    }
}

/// A [`BaseDataCollection`] specialized for option-chain universe selection (`spec.md` §4.E):
/// the underlying's own sample plus the set of contracts a `ContractFilter` may choose from.
/// `filtered_contracts` starts equal to `contracts` and is narrowed by the universe during
/// selection so downstream consumers observe only the filtered chain.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionChainUniverseDataCollection {
    pub collection: BaseDataCollection,
    pub underlying: BaseData,
    pub contracts: Vec<Symbol>,
    pub filtered_contracts: Vec<Symbol>,
}

impl OptionChainUniverseDataCollection {
    pub fn new(collection: BaseDataCollection, underlying: BaseData, contracts: Vec<Symbol>) -> Self {
        let filtered_contracts = contracts.clone();
        Self {
            collection,
            underlying,
            contracts,
            filtered_contracts,
        }
    }

    /// Narrow the selected contract set. Called by `OptionChainUniverse::select_symbols` after
    /// applying the user's `ContractFilter`.
    pub fn set_filtered_contracts(&mut self, filtered: Vec<Symbol>) {
        self.filtered_contracts = filtered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use meridian_instrument::{MarketRegistry, SecurityIdentifier};
    use rust_decimal_macros::dec;

    fn sample_symbol() -> Symbol {
        let registry = MarketRegistry::with_defaults();
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let id = SecurityIdentifier::generate_equity(date, "SPY", "usa", &registry).unwrap();
        Symbol::from_identifier(id)
    }

    #[test]
    fn fill_forward_clone_preserves_value_and_symbol() {
        let symbol = sample_symbol();
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let t1 = t0 + chrono::Duration::minutes(1);
        let original = BaseData::new(symbol.clone(), t0, t1, dec!(100.25), DataKind::Trade);

        let t2 = t1 + chrono::Duration::minutes(1);
        let forwarded = original.clone_for_fill_forward(t1, t2);

        assert_eq!(forwarded.value, dec!(100.25));
        assert_eq!(forwarded.symbol, symbol);
        assert_eq!(forwarded.time, t1);
        assert_eq!(forwarded.end_time, t2);
    }

    #[test]
    fn collection_value_is_last_child_or_zero() {
        let symbol = sample_symbol();
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let t1 = t0 + chrono::Duration::minutes(1);

        let empty = BaseDataCollection::new(symbol.clone(), t0, t1, vec![]);
        assert_eq!(empty.value(), Decimal::ZERO);

        let a = BaseData::new(symbol.clone(), t0, t1, dec!(1), DataKind::Quote);
        let b = BaseData::new(symbol.clone(), t0, t1, dec!(2), DataKind::Quote);
        let populated = BaseDataCollection::new(symbol, t0, t1, vec![a, b]);
        assert_eq!(populated.value(), dec!(2));
    }

    #[test]
    fn option_chain_collection_narrows_filtered_contracts() {
        let underlying_symbol = sample_symbol();
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let t1 = t0 + chrono::Duration::minutes(1);
        let underlying = BaseData::new(underlying_symbol.clone(), t0, t1, dec!(450), DataKind::Trade);
        let collection = BaseDataCollection::new(underlying_symbol.clone(), t0, t1, vec![]);

        let mut chain = OptionChainUniverseDataCollection::new(
            collection,
            underlying,
            vec![underlying_symbol.clone(), underlying_symbol.clone()],
        );
        assert_eq!(chain.filtered_contracts.len(), 2);

        chain.set_filtered_contracts(vec![underlying_symbol]);
        assert_eq!(chain.filtered_contracts.len(), 1);
    }
}
