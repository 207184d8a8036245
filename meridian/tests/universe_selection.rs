//! Composes universe selection with the subscription model it drives (`spec.md` §4.E): an
//! option-chain universe's diff is turned into the actual `SubscriptionDataConfig` set the data
//! pipeline would subscribe to, and the set shrinks as contracts roll off the chain.

use chrono::{TimeZone, Utc};
use meridian::universe::{option_chain_subscriptions, OptionChainUniverse, Universe, UniverseSettings};
use meridian_data::{BaseData, BaseDataCollection, DataKind, OptionChainUniverseDataCollection};
use meridian_execution::SecurityContext;
use meridian_instrument::{MarketRegistry, Resolution, SecurityIdentifier, SecurityType, Symbol, TickType};
use rust_decimal::Decimal;

fn symbol(ticker: &str) -> Symbol {
    let registry = MarketRegistry::with_defaults();
    let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let id = SecurityIdentifier::generate_equity(date, ticker, "usa", &registry).unwrap();
    Symbol::from_identifier(id)
}

fn security() -> SecurityContext {
    SecurityContext {
        security_type: SecurityType::Equity,
        lot_size: Decimal::ONE,
        last_price: Decimal::ONE,
        currency: "USD".to_string(),
    }
}

fn chain(underlying_time: chrono::DateTime<Utc>, contracts: Vec<Symbol>) -> OptionChainUniverseDataCollection {
    let underlying = BaseData::new(
        symbol("SPY"),
        underlying_time.naive_utc(),
        underlying_time.naive_utc(),
        Decimal::from(450),
        DataKind::Trade,
    );
    let collection = BaseDataCollection::new(symbol("SPY"), underlying_time.naive_utc(), underlying_time.naive_utc(), Vec::new());
    OptionChainUniverseDataCollection::new(collection, underlying, contracts)
}

#[test]
fn subscription_set_tracks_the_universe_as_contracts_roll_off() {
    let underlying = symbol("SPY");
    let base_config = meridian_instrument::SubscriptionDataConfig::new(
        underlying.clone(),
        Resolution::Minute,
        chrono_tz::America::New_York,
        chrono_tz::America::New_York,
        TickType::Trade,
    );

    let selector = OptionChainUniverse::new(|data: &OptionChainUniverseDataCollection| data.contracts.clone());
    let settings = UniverseSettings {
        resolution: Resolution::Minute,
        fill_forward: false,
        extended_hours: false,
        minimum_time_in_universe: chrono::Duration::zero(),
    };
    let mut universe = Universe::new(base_config.clone(), settings, selector);

    let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
    let calls = vec![symbol("AAACALL"), symbol("AAAPUT")];
    let mut data = chain(t0, calls.clone());
    let diff = universe.selection_tick(t0, &mut data, |_| security());
    assert_eq!(diff.added.len(), 2);

    let members: Vec<Symbol> = universe.members().into_keys().collect();
    let subscriptions = option_chain_subscriptions(&underlying, &members, &base_config);
    // Two configs (trade + quote) for the underlying plus two per contract.
    assert_eq!(subscriptions.len(), 2 + members.len() * 2);
    assert!(subscriptions.iter().any(|c| c.symbol == underlying && c.tick_type == TickType::Trade));
    assert!(subscriptions.iter().any(|c| c.symbol == underlying && c.tick_type == TickType::Quote));

    // The chain drops AAAPUT; `OptionChainUniverse`'s day-boundary override (not the zeroed
    // minimum_time_in_universe) governs removal, so it stays a member until the data pipeline
    // has recorded a last-data date for it and the local date has moved past that date.
    universe.record_last_data_date(&symbol("AAAPUT"), t0.date_naive());

    let mut narrowed_same_day = chain(t0, vec![symbol("AAACALL")]);
    let diff_same_day = universe.selection_tick(t0, &mut narrowed_same_day, |_| security());
    assert!(diff_same_day.removed.is_empty());
    assert!(universe.is_member(&symbol("AAAPUT")));

    let t1 = t0 + chrono::Duration::days(1);
    let mut narrowed_next_day = chain(t1, vec![symbol("AAACALL")]);
    let diff1 = universe.selection_tick(t1, &mut narrowed_next_day, |_| security());
    assert_eq!(diff1.removed, vec![symbol("AAAPUT")]);

    let members_after: Vec<Symbol> = universe.members().into_keys().collect();
    assert_eq!(members_after, vec![symbol("AAACALL")]);
    let subscriptions_after = option_chain_subscriptions(&underlying, &members_after, &base_config);
    assert_eq!(subscriptions_after.len(), 4);
}
