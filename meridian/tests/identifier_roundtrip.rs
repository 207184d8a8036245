//! Cross-crate round trip for the symbol identity model (`spec.md` §3, §4.A): an identifier
//! generated by `meridian-instrument` survives being wrapped as a `Symbol` and handed to a
//! `meridian-execution` security context the way a strategy would.

use chrono::NaiveDate;
use meridian_execution::SecurityContext;
use meridian_instrument::{
    MarketRegistry, OptionRight, OptionStyle, SecurityIdentifier, SecurityType, Symbol,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn equity_identifier_round_trips_through_symbol() {
    let registry = MarketRegistry::with_defaults();
    let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let identifier = SecurityIdentifier::generate_equity(date, "SPY", "usa", &registry).unwrap();

    let symbol = Symbol::from_identifier(identifier.clone());
    assert_eq!(symbol.id(), &identifier);
    assert_eq!(symbol.ticker(), "SPY");

    let roundtripped = Symbol::new(symbol.id().clone(), symbol.ticker().to_string());
    assert_eq!(roundtripped, symbol);
}

#[test]
fn option_identifier_carries_distinct_identity_from_its_underlying() {
    let registry = MarketRegistry::with_defaults();
    let underlying_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let underlying = SecurityIdentifier::generate_equity(underlying_date, "SPY", "usa", &registry).unwrap();

    let expiry = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();
    let contract = SecurityIdentifier::generate_option(
        expiry,
        "SPY",
        "usa",
        dec!(450),
        OptionRight::Call,
        OptionStyle::American,
        &registry,
    )
    .unwrap();

    assert_ne!(underlying, contract);
    assert_eq!(contract.symbol(), underlying.symbol());

    // Two calls with the same terms produce the same identity; a different strike does not.
    let same_contract = SecurityIdentifier::generate_option(
        expiry,
        "SPY",
        "usa",
        dec!(450),
        OptionRight::Call,
        OptionStyle::American,
        &registry,
    )
    .unwrap();
    assert_eq!(contract, same_contract);

    let different_strike = SecurityIdentifier::generate_option(
        expiry,
        "SPY",
        "usa",
        dec!(460),
        OptionRight::Call,
        OptionStyle::American,
        &registry,
    )
    .unwrap();
    assert_ne!(contract, different_strike);
}

#[test]
fn symbol_keys_a_security_context_lookup_across_crates() {
    let registry = MarketRegistry::with_defaults();
    let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let identifier = SecurityIdentifier::generate_equity(date, "AAPL", "usa", &registry).unwrap();
    let symbol = Symbol::from_identifier(identifier);

    let mut contexts = std::collections::HashMap::new();
    contexts.insert(
        symbol.clone(),
        SecurityContext {
            security_type: SecurityType::Equity,
            lot_size: Decimal::ONE,
            last_price: dec!(190.25),
            currency: "USD".to_string(),
        },
    );

    let found = contexts.get(&symbol).expect("symbol used as a stable map key");
    assert_eq!(found.security_type, SecurityType::Equity);
    assert_eq!(found.last_price, dec!(190.25));
}
