//! Universe selection (`spec.md` §4.E): periodic resubscription driven by a user-supplied
//! selector, diffed against the previous selection tick, with a retention-policy override
//! point for deferring removal.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use meridian_data::OptionChainUniverseDataCollection;
use meridian_execution::SecurityContext;
use meridian_instrument::{Resolution, SubscriptionDataConfig, Symbol, TickType};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

/// A universe member: when it joined, and the security context snapshot used for brokerage
/// and sizing decisions (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Member {
    pub added_at: DateTime<Utc>,
    pub security: SecurityContext,
    /// Last date this member had data, consulted by `OptionChainUniverse`'s day-boundary
    /// removal override rather than `UniverseSettings.minimum_time_in_universe`.
    pub last_data_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct UniverseSettings {
    pub resolution: Resolution,
    pub fill_forward: bool,
    pub extended_hours: bool,
    pub minimum_time_in_universe: ChronoDuration,
}

/// A selection tick's result: either nothing changed, or a complete replacement symbol set
/// (`spec.md` §4.E step 1).
#[derive(Debug, Clone)]
pub enum SelectionResult {
    Unchanged,
    Select(HashSet<Symbol>),
}

#[derive(Debug, Clone, Default)]
pub struct UniverseDiff {
    pub added: Vec<Symbol>,
    pub removed: Vec<Symbol>,
}

/// User-pluggable selection policy, generic over the data collection type it consumes so a
/// plain universe and an `OptionChainUniverse` can share the diffing machinery
/// (`spec.md` §9: the universe hierarchy maps to a trait with a default retention override).
pub trait UniverseSelector<D>: Send + Sync {
    fn select_symbols(&mut self, utc_time: DateTime<Utc>, data: &mut D) -> SelectionResult;

    /// Default retention policy: defer removal until a member has spent at least
    /// `settings.minimum_time_in_universe` in the universe (`spec.md` §4.E).
    fn can_remove_member(&self, utc_time: DateTime<Utc>, member: &Member, settings: &UniverseSettings) -> bool {
        utc_time - member.added_at >= settings.minimum_time_in_universe
    }
}

/// Dynamic subscription set whose membership is recomputed from market data
/// (`spec.md` §3, §4.E). `selection_tick` is the only mutator; it is called from the single
/// engine thread that drives universes (`spec.md` §5), while `members()` may be read
/// concurrently from other threads.
pub struct Universe<S, D> {
    pub config: SubscriptionDataConfig,
    pub settings: UniverseSettings,
    members: RwLock<HashMap<Symbol, Member>>,
    previous_selection: RwLock<Option<HashSet<Symbol>>>,
    selector: S,
    _data: PhantomData<fn(&mut D)>,
}

impl<S, D> Universe<S, D>
where
    S: UniverseSelector<D>,
{
    pub fn new(config: SubscriptionDataConfig, settings: UniverseSettings, selector: S) -> Self {
        Self {
            config,
            settings,
            members: RwLock::new(HashMap::new()),
            previous_selection: RwLock::new(None),
            selector,
            _data: PhantomData,
        }
    }

    pub fn members(&self) -> HashMap<Symbol, Member> {
        self.members.read().clone()
    }

    pub fn is_member(&self, symbol: &Symbol) -> bool {
        self.members.read().contains_key(symbol)
    }

    /// Records the last date data was observed for `symbol`, consulted by retention policies
    /// such as `OptionChainUniverse`'s day-boundary removal override.
    pub fn record_last_data_date(&self, symbol: &Symbol, date: NaiveDate) {
        if let Some(member) = self.members.write().get_mut(symbol) {
            member.last_data_date = Some(date);
        }
    }

    /// Runs one selection tick (`spec.md` §4.E). `resolve_security` builds the `SecurityContext`
    /// snapshot for a newly added symbol; it is a closure rather than a stored collaborator so
    /// the universe itself stays free of the security/portfolio object graph (`spec.md` §1).
    pub fn selection_tick(
        &mut self,
        utc_time: DateTime<Utc>,
        data: &mut D,
        resolve_security: impl Fn(&Symbol) -> SecurityContext,
    ) -> UniverseDiff {
        let mut added = Vec::new();

        match self.selector.select_symbols(utc_time, data) {
            SelectionResult::Unchanged => {}
            SelectionResult::Select(new_set) => {
                let mut previous = self.previous_selection.write();
                if previous.as_ref() != Some(&new_set) {
                    let mut members = self.members.write();
                    for symbol in &new_set {
                        if !members.contains_key(symbol) {
                            members.insert(
                                symbol.clone(),
                                Member {
                                    added_at: utc_time,
                                    security: resolve_security(symbol),
                                    last_data_date: None,
                                },
                            );
                            added.push(symbol.clone());
                        }
                    }
                    *previous = Some(new_set);
                }
            }
        }

        // Re-evaluate deferred removals every tick, independent of whether the selection
        // itself changed this tick, so a removal blocked by `can_remove_member` is retried
        // until the selector's retention policy allows it.
        let current_selection = self.previous_selection.read().clone().unwrap_or_default();
        let mut members = self.members.write();
        let candidates: Vec<Symbol> = members
            .keys()
            .filter(|symbol| !current_selection.contains(*symbol))
            .cloned()
            .collect();

        let mut removed = Vec::new();
        for symbol in candidates {
            let can_remove = members
                .get(&symbol)
                .map(|member| self.selector.can_remove_member(utc_time, member, &self.settings))
                .unwrap_or(true);
            if can_remove {
                members.remove(&symbol);
                removed.push(symbol);
            }
        }

        UniverseDiff { added, removed }
    }
}

/// Consumes `OptionChainUniverseDataCollection`, applies a user contract filter, and writes the
/// selected contracts back into the collection so downstream consumers see the filtered chain
/// (`spec.md` §4.E).
pub struct OptionChainUniverse<F> {
    filter: F,
}

impl<F> OptionChainUniverse<F>
where
    F: FnMut(&OptionChainUniverseDataCollection) -> Vec<Symbol> + Send + Sync,
{
    pub fn new(filter: F) -> Self {
        Self { filter }
    }
}

impl<F> UniverseSelector<OptionChainUniverseDataCollection> for OptionChainUniverse<F>
where
    F: FnMut(&OptionChainUniverseDataCollection) -> Vec<Symbol> + Send + Sync,
{
    fn select_symbols(&mut self, _utc_time: DateTime<Utc>, data: &mut OptionChainUniverseDataCollection) -> SelectionResult {
        let selected = (self.filter)(data);
        data.set_filtered_contracts(selected.clone());
        SelectionResult::Select(selected.into_iter().collect())
    }

    /// Day-boundary override: ignores `minimum_time_in_universe` entirely and instead waits
    /// until local date has advanced past the member's last-data date (`spec.md` §4.E, §9 open
    /// question — the two retention policies are kept deliberately distinct, not unified).
    fn can_remove_member(&self, utc_time: DateTime<Utc>, member: &Member, _settings: &UniverseSettings) -> bool {
        match member.last_data_date {
            Some(last_date) => utc_time.date_naive() > last_date,
            None => false,
        }
    }
}

/// Builds the canonical-plus-selected-contract subscription set for an option chain universe:
/// trade and quote configs for the canonical underlying (promoting `Tick` to `Second`) and for
/// every selected contract, at the universe's resolution (`spec.md` §4.E).
pub fn option_chain_subscriptions(canonical: &Symbol, selected: &[Symbol], base: &SubscriptionDataConfig) -> Vec<SubscriptionDataConfig> {
    let underlying_resolution = if base.resolution == Resolution::Tick {
        Resolution::Second
    } else {
        base.resolution
    };

    let mut configs = vec![
        SubscriptionDataConfig::new(
            canonical.clone(),
            underlying_resolution,
            base.data_time_zone,
            base.exchange_time_zone,
            TickType::Trade,
        ),
        SubscriptionDataConfig::new(
            canonical.clone(),
            underlying_resolution,
            base.data_time_zone,
            base.exchange_time_zone,
            TickType::Quote,
        ),
    ];

    for symbol in selected {
        configs.push(SubscriptionDataConfig::new(
            symbol.clone(),
            base.resolution,
            base.data_time_zone,
            base.exchange_time_zone,
            TickType::Trade,
        ));
        configs.push(SubscriptionDataConfig::new(
            symbol.clone(),
            base.resolution,
            base.data_time_zone,
            base.exchange_time_zone,
            TickType::Quote,
        ));
    }

    configs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use meridian_data::BaseData;
    use meridian_instrument::{MarketRegistry, SecurityIdentifier, SecurityType};
    use rust_decimal::Decimal;

    fn symbol(ticker: &str) -> Symbol {
        let registry = MarketRegistry::with_defaults();
        let date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let id = SecurityIdentifier::generate_equity(date, ticker, "usa", &registry).unwrap();
        Symbol::from_identifier(id)
    }

    fn settings(min_time: ChronoDuration) -> UniverseSettings {
        UniverseSettings {
            resolution: Resolution::Daily,
            fill_forward: false,
            extended_hours: false,
            minimum_time_in_universe: min_time,
        }
    }

    fn security() -> SecurityContext {
        SecurityContext {
            security_type: SecurityType::Equity,
            lot_size: Decimal::ONE,
            last_price: Decimal::ONE,
            currency: "USD".to_string(),
        }
    }

    struct FixedSelector {
        sets: Vec<HashSet<Symbol>>,
        call: usize,
    }
    impl UniverseSelector<()> for FixedSelector {
        fn select_symbols(&mut self, _utc_time: DateTime<Utc>, _data: &mut ()) -> SelectionResult {
            let set = self.sets[self.call.min(self.sets.len() - 1)].clone();
            self.call += 1;
            SelectionResult::Select(set)
        }
    }

    fn config() -> SubscriptionDataConfig {
        SubscriptionDataConfig::new(symbol("SPY"), Resolution::Daily, chrono_tz::UTC, chrono_tz::UTC, TickType::Trade)
    }

    #[test]
    fn adds_new_members_and_defers_removal_until_minimum_time_elapses() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + ChronoDuration::days(1);
        let t2 = t0 + ChronoDuration::days(10);

        let selector = FixedSelector {
            sets: vec![
                HashSet::from([symbol("AAA"), symbol("BBB")]),
                HashSet::from([symbol("BBB")]),
            ],
            call: 0,
        };
        let mut universe = Universe::new(config(), settings(ChronoDuration::days(5)), selector);

        let diff0 = universe.selection_tick(t0, &mut (), |_| security());
        assert_eq!(diff0.added.len(), 2);
        assert!(diff0.removed.is_empty());

        // AAA dropped from selection at t1, but minimum_time_in_universe (5 days) hasn't
        // elapsed since t0, so removal is deferred.
        let diff1 = universe.selection_tick(t1, &mut (), |_| security());
        assert!(diff1.added.is_empty());
        assert!(diff1.removed.is_empty());
        assert!(universe.is_member(&symbol("AAA")));

        // By t2, 10 days have elapsed since AAA joined; removal proceeds even though the
        // selector's output set didn't change between t1 and t2.
        let diff2 = universe.selection_tick(t2, &mut (), |_| security());
        assert_eq!(diff2.removed, vec![symbol("AAA")]);
        assert!(!universe.is_member(&symbol("AAA")));
        assert!(universe.is_member(&symbol("BBB")));
    }

    #[test]
    fn identical_reselection_produces_empty_diff() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let selector = FixedSelector {
            sets: vec![HashSet::from([symbol("AAA")]), HashSet::from([symbol("AAA")])],
            call: 0,
        };
        let mut universe = Universe::new(config(), settings(ChronoDuration::zero()), selector);
        universe.selection_tick(t0, &mut (), |_| security());
        let diff = universe.selection_tick(t0, &mut (), |_| security());
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
    }

    fn option_chain_collection(underlying_time: DateTime<Utc>, contracts: Vec<Symbol>) -> OptionChainUniverseDataCollection {
        let underlying = BaseData::new(
            symbol("SPY"),
            underlying_time.naive_utc(),
            underlying_time.naive_utc(),
            Decimal::ONE,
            meridian_data::DataKind::Trade,
        );
        let collection = meridian_data::BaseDataCollection::new(
            symbol("SPY"),
            underlying_time.naive_utc(),
            underlying_time.naive_utc(),
            Vec::new(),
        );
        OptionChainUniverseDataCollection::new(collection, underlying, contracts)
    }

    #[test]
    fn option_chain_universe_overrides_removal_policy_with_day_boundary() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + ChronoDuration::days(1);

        // A huge minimum_time_in_universe would defer removal forever under the default
        // policy; the day-boundary override ignores it entirely.
        let selector = OptionChainUniverse::new(|data: &OptionChainUniverseDataCollection| data.contracts.clone());
        let mut universe = Universe::new(config(), settings(ChronoDuration::days(3650)), selector);

        let mut with_contract = option_chain_collection(t0, vec![symbol("AAACALL")]);
        universe.selection_tick(t0, &mut with_contract, |_| security());
        assert!(universe.is_member(&symbol("AAACALL")));
        assert_eq!(with_contract.filtered_contracts, vec![symbol("AAACALL")]);

        universe.record_last_data_date(&symbol("AAACALL"), t0.date_naive());

        let mut empty = option_chain_collection(t1, Vec::new());

        // Same day as last_data_date: selection dropped the contract, but the day-boundary
        // override isn't satisfied yet.
        let diff_same_day = universe.selection_tick(t0, &mut empty, |_| security());
        assert!(diff_same_day.removed.is_empty());
        assert!(universe.is_member(&symbol("AAACALL")));

        // Local date has advanced past last_data_date: override allows removal.
        let diff_next_day = universe.selection_tick(t1, &mut empty, |_| security());
        assert_eq!(diff_next_day.removed, vec![symbol("AAACALL")]);
        assert!(!universe.is_member(&symbol("AAACALL")));
    }
}
