use crate::error::{BrokerageMessage, BrokerageMessageType};
use crate::order::{Direction, Order, OrderType, OrderUpdateRequest};
use meridian_instrument::{MarketName, SecurityType};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Account type consulted by `BrokerageModel::settlement_model` (`spec.md` §4.F).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AccountType {
    Cash,
    Margin,
}

/// What a `BrokerageModel` needs to know about the security an order targets, without pulling in
/// the full security/portfolio object graph that is out of this core's scope (`spec.md` §1).
#[derive(Debug, Clone)]
pub struct SecurityContext {
    pub security_type: SecurityType,
    pub lot_size: Decimal,
    pub last_price: Decimal,
    pub currency: String,
}

/// A corporate split or reverse split event (`spec.md` §4.F `applySplit`).
#[derive(Debug, Clone, Copy)]
pub struct SplitEvent {
    pub split_factor: Decimal,
}

/// Placeholder extension points for policies explicitly out of this core's scope (`spec.md` §1):
/// the core only needs to select and hand off an implementation, never evaluate one itself.
pub trait FillModel: Send + Sync {
    fn name(&self) -> &'static str;
}
pub trait FeeModel: Send + Sync {
    fn name(&self) -> &'static str;
}
pub trait SlippageModel: Send + Sync {
    fn name(&self) -> &'static str;
}
pub trait SettlementModel: Send + Sync {
    fn name(&self) -> &'static str;
}

macro_rules! marker_model {
    ($trait_name:ident, $struct_name:ident, $name:literal) => {
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $struct_name;
        impl $trait_name for $struct_name {
            fn name(&self) -> &'static str {
                $name
            }
        }
    };
}

marker_model!(FillModel, ImmediateFillModel, "ImmediateFillModel");
marker_model!(FeeModel, ZeroFeeModel, "ZeroFeeModel");
marker_model!(SlippageModel, NoSlippageModel, "NoSlippageModel");
marker_model!(SettlementModel, ImmediateSettlementModel, "ImmediateSettlementModel");

/// Order-admissibility, fee/fill/slippage/settlement policy selection (`spec.md` §4.F). Each
/// concrete broker specializes `can_submit_order` / `can_update_order` / `can_execute_order`
/// with its own trading rules; everything else has a reasonable shared default.
pub trait BrokerageModel: Send + Sync {
    fn can_submit_order(&self, security: &SecurityContext, order: &Order) -> (bool, Option<BrokerageMessage>);

    fn can_update_order(
        &self,
        security: &SecurityContext,
        order: &Order,
        update: &OrderUpdateRequest,
    ) -> (bool, Option<BrokerageMessage>);

    /// `is_regular_session` is computed by the caller against an exchange calendar; this core
    /// keeps the brokerage model itself calendar-agnostic (`spec.md` §9 design note on explicit
    /// configuration over hidden collaborators).
    fn can_execute_order(&self, security: &SecurityContext, order: &Order, is_regular_session: bool) -> bool;

    fn leverage(&self, security: &SecurityContext) -> Decimal;

    fn lot_size(&self, security: &SecurityContext) -> Decimal {
        security.lot_size
    }

    fn fill_model(&self) -> Arc<dyn FillModel> {
        Arc::new(ImmediateFillModel)
    }
    fn fee_model(&self) -> Arc<dyn FeeModel> {
        Arc::new(ZeroFeeModel)
    }
    fn slippage_model(&self) -> Arc<dyn SlippageModel> {
        Arc::new(NoSlippageModel)
    }
    fn settlement_model(&self, _security: &SecurityContext, _account_type: AccountType) -> Arc<dyn SettlementModel> {
        Arc::new(ImmediateSettlementModel)
    }

    fn default_markets(&self) -> &HashMap<SecurityType, MarketName>;
}

fn is_multiple_of(quantity: Decimal, lot_size: Decimal) -> bool {
    lot_size == Decimal::ZERO || (quantity.abs() % lot_size) == Decimal::ZERO
}

/// Accepts all order types and securities; used for backtests without a live brokerage.
pub struct DefaultBrokerageModel {
    default_markets: HashMap<SecurityType, MarketName>,
}

impl DefaultBrokerageModel {
    pub fn new(default_markets: HashMap<SecurityType, MarketName>) -> Self {
        Self { default_markets }
    }
}

impl BrokerageModel for DefaultBrokerageModel {
    fn can_submit_order(&self, _security: &SecurityContext, _order: &Order) -> (bool, Option<BrokerageMessage>) {
        (true, None)
    }

    fn can_update_order(
        &self,
        _security: &SecurityContext,
        _order: &Order,
        _update: &OrderUpdateRequest,
    ) -> (bool, Option<BrokerageMessage>) {
        (true, None)
    }

    fn can_execute_order(&self, _security: &SecurityContext, _order: &Order, _is_regular_session: bool) -> bool {
        true
    }

    fn leverage(&self, _security: &SecurityContext) -> Decimal {
        Decimal::from(2)
    }

    fn default_markets(&self) -> &HashMap<SecurityType, MarketName> {
        &self.default_markets
    }
}

/// Imposes a 1,000-unit lot size and a limit/stop price relationship to the last traded price:
/// a buy-limit must sit at or below the market, a sell-limit at or above it (`spec.md` §4.F).
pub struct FxcmBrokerageModel {
    default_markets: HashMap<SecurityType, MarketName>,
}

impl FxcmBrokerageModel {
    pub fn lot_size_constant() -> Decimal {
        Decimal::from(1000)
    }

    pub fn new(default_markets: HashMap<SecurityType, MarketName>) -> Self {
        Self { default_markets }
    }
}

impl BrokerageModel for FxcmBrokerageModel {
    fn can_submit_order(&self, security: &SecurityContext, order: &Order) -> (bool, Option<BrokerageMessage>) {
        if !is_multiple_of(order.quantity, Self::lot_size_constant()) {
            return (
                false,
                Some(BrokerageMessage::new(
                    BrokerageMessageType::Error,
                    "NotSupported",
                    "FXCM requires order quantity to be a multiple of the 1,000-unit lot size",
                )),
            );
        }

        if order.order_type == OrderType::Limit {
            if let (Some(direction), Some(limit_price)) = (order.direction(), order.limit_price) {
                let violates = match direction {
                    Direction::Buy => limit_price > security.last_price,
                    Direction::Sell => limit_price < security.last_price,
                };
                if violates {
                    return (
                        false,
                        Some(BrokerageMessage::new(
                            BrokerageMessageType::Error,
                            "NotSupported",
                            "FXCM limit price is on the wrong side of the market",
                        )),
                    );
                }
            }
        }

        (true, None)
    }

    fn can_update_order(
        &self,
        security: &SecurityContext,
        order: &Order,
        update: &OrderUpdateRequest,
    ) -> (bool, Option<BrokerageMessage>) {
        if let Some(quantity) = update.quantity {
            if !is_multiple_of(quantity, Self::lot_size_constant()) {
                return (
                    false,
                    Some(BrokerageMessage::new(
                        BrokerageMessageType::Error,
                        "NotSupported",
                        "FXCM requires order quantity to be a multiple of the 1,000-unit lot size",
                    )),
                );
            }
        }
        let _ = (security, order);
        (true, None)
    }

    fn can_execute_order(&self, _security: &SecurityContext, _order: &Order, _is_regular_session: bool) -> bool {
        true
    }

    fn leverage(&self, _security: &SecurityContext) -> Decimal {
        Decimal::from(50)
    }

    fn lot_size(&self, _security: &SecurityContext) -> Decimal {
        Self::lot_size_constant()
    }

    fn default_markets(&self) -> &HashMap<SecurityType, MarketName> {
        &self.default_markets
    }
}

/// Restricted to FX and CFD securities, and to `{Limit, Market, StopMarket}` order types
/// (`spec.md` §4.F).
pub struct OandaBrokerageModel {
    default_markets: HashMap<SecurityType, MarketName>,
}

impl OandaBrokerageModel {
    pub fn new(default_markets: HashMap<SecurityType, MarketName>) -> Self {
        Self { default_markets }
    }
}

impl BrokerageModel for OandaBrokerageModel {
    fn can_submit_order(&self, security: &SecurityContext, order: &Order) -> (bool, Option<BrokerageMessage>) {
        if !matches!(security.security_type, SecurityType::Forex | SecurityType::Cfd) {
            return (
                false,
                Some(BrokerageMessage::new(
                    BrokerageMessageType::Error,
                    "NotSupported",
                    "Oanda only supports Forex and Cfd securities",
                )),
            );
        }
        if order.order_type == OrderType::StopLimit {
            return (
                false,
                Some(BrokerageMessage::new(
                    BrokerageMessageType::Error,
                    "NotSupported",
                    "Oanda does not support stop-limit orders",
                )),
            );
        }
        (true, None)
    }

    fn can_update_order(
        &self,
        _security: &SecurityContext,
        _order: &Order,
        _update: &OrderUpdateRequest,
    ) -> (bool, Option<BrokerageMessage>) {
        (true, None)
    }

    fn can_execute_order(&self, _security: &SecurityContext, _order: &Order, _is_regular_session: bool) -> bool {
        true
    }

    fn leverage(&self, _security: &SecurityContext) -> Decimal {
        Decimal::from(20)
    }

    fn default_markets(&self) -> &HashMap<SecurityType, MarketName> {
        &self.default_markets
    }
}

/// Restricted to Equity securities; rejects quantity updates outright; refuses execution outside
/// regular trading hours (`spec.md` §4.F).
pub struct TradierBrokerageModel {
    default_markets: HashMap<SecurityType, MarketName>,
}

impl TradierBrokerageModel {
    pub fn new(default_markets: HashMap<SecurityType, MarketName>) -> Self {
        Self { default_markets }
    }
}

impl BrokerageModel for TradierBrokerageModel {
    fn can_submit_order(&self, security: &SecurityContext, _order: &Order) -> (bool, Option<BrokerageMessage>) {
        if security.security_type != SecurityType::Equity {
            return (
                false,
                Some(BrokerageMessage::new(
                    BrokerageMessageType::Error,
                    "NotSupported",
                    "Tradier only supports Equity securities",
                )),
            );
        }
        (true, None)
    }

    fn can_update_order(
        &self,
        _security: &SecurityContext,
        _order: &Order,
        update: &OrderUpdateRequest,
    ) -> (bool, Option<BrokerageMessage>) {
        if update.quantity.is_some() {
            return (
                false,
                Some(BrokerageMessage::new(
                    BrokerageMessageType::Error,
                    "NotSupported",
                    "Tradier does not support quantity updates",
                )),
            );
        }
        (true, None)
    }

    fn can_execute_order(&self, _security: &SecurityContext, _order: &Order, is_regular_session: bool) -> bool {
        is_regular_session
    }

    fn leverage(&self, _security: &SecurityContext) -> Decimal {
        Decimal::ONE
    }

    fn default_markets(&self) -> &HashMap<SecurityType, MarketName> {
        &self.default_markets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderStatus, OrderType};
    use chrono::{TimeZone, Utc};
    use meridian_instrument::{MarketRegistry, SecurityIdentifier, Symbol};
    use rust_decimal_macros::dec;

    fn order(quantity: Decimal, order_type: OrderType, limit_price: Option<Decimal>) -> Order {
        let registry = MarketRegistry::with_defaults();
        let date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let id = SecurityIdentifier::generate_equity(date, "EURUSD", "fxcm", &registry).unwrap();
        Order {
            id: 1,
            symbol: Symbol::from_identifier(id),
            quantity,
            order_type,
            status: OrderStatus::New,
            time: Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap(),
            price: Decimal::ZERO,
            limit_price,
            stop_price: None,
            price_currency: "USD".to_string(),
            tag: String::new(),
            broker_ids: Vec::new(),
        }
    }

    fn fx_context(last_price: Decimal) -> SecurityContext {
        SecurityContext {
            security_type: SecurityType::Forex,
            lot_size: Decimal::ONE,
            last_price,
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn fxcm_rejects_non_multiple_quantity() {
        let model = FxcmBrokerageModel::new(HashMap::new());
        let order = order(dec!(1500), OrderType::Market, None);
        let (ok, _) = model.can_submit_order(&fx_context(dec!(1.1)), &order);
        assert!(!ok);
    }

    #[test]
    fn fxcm_accepts_buy_limit_at_or_below_market() {
        let model = FxcmBrokerageModel::new(HashMap::new());
        let order = order(dec!(1000), OrderType::Limit, Some(dec!(1.09)));
        let (ok, _) = model.can_submit_order(&fx_context(dec!(1.10)), &order);
        assert!(ok);
    }

    #[test]
    fn fxcm_rejects_buy_limit_above_market() {
        let model = FxcmBrokerageModel::new(HashMap::new());
        let order = order(dec!(1000), OrderType::Limit, Some(dec!(1.11)));
        let (ok, message) = model.can_submit_order(&fx_context(dec!(1.10)), &order);
        assert!(!ok);
        assert_eq!(message.unwrap().code, "NotSupported");
    }

    #[test]
    fn oanda_rejects_non_fx_cfd_security() {
        let model = OandaBrokerageModel::new(HashMap::new());
        let equity_ctx = SecurityContext {
            security_type: SecurityType::Equity,
            lot_size: Decimal::ONE,
            last_price: dec!(100),
            currency: "USD".to_string(),
        };
        let order = order(dec!(10), OrderType::Market, None);
        let (ok, _) = model.can_submit_order(&equity_ctx, &order);
        assert!(!ok);
    }

    #[test]
    fn tradier_rejects_quantity_updates() {
        let model = TradierBrokerageModel::new(HashMap::new());
        let update = OrderUpdateRequest {
            quantity: Some(dec!(5)),
            ..Default::default()
        };
        let equity_ctx = SecurityContext {
            security_type: SecurityType::Equity,
            lot_size: Decimal::ONE,
            last_price: dec!(100),
            currency: "USD".to_string(),
        };
        let order = order(dec!(10), OrderType::Market, None);
        let (ok, _) = model.can_update_order(&equity_ctx, &order, &update);
        assert!(!ok);
    }

    #[test]
    fn tradier_refuses_execution_outside_regular_hours() {
        let model = TradierBrokerageModel::new(HashMap::new());
        let equity_ctx = SecurityContext {
            security_type: SecurityType::Equity,
            lot_size: Decimal::ONE,
            last_price: dec!(100),
            currency: "USD".to_string(),
        };
        let order = order(dec!(10), OrderType::Market, None);
        assert!(!model.can_execute_order(&equity_ctx, &order, false));
        assert!(model.can_execute_order(&equity_ctx, &order, true));
    }
}
