//! Minimal end-to-end wiring: submit a market order against a simulated fill-everything
//! brokerage while the engine's frontier advances through a trading day, and observe the
//! resulting order events. Demonstrates how the crates in this workspace compose; not a
//! strategy framework.

use chrono::{NaiveDate, TimeZone, Utc};
use meridian::engine::Engine;
use meridian_execution::brokerage::DefaultBrokerageModel;
use meridian_execution::{
    BrokerageGateway, CashBalance, Fill, Order, OrderEvent, OrderRequest, OrderStatus, OrderType, OrderUpdateRequest,
    PortfolioCollaborator, ResultHandler, SecurityContext, TransactionHandler,
};
use meridian_instrument::{MarketRegistry, SecurityIdentifier, SecurityType, Symbol};
use parking_lot::Mutex;
use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Fills every order immediately at the order's limit price, or a fixed price for market
/// orders, reporting no live cash balances.
struct ImmediateFillGateway {
    handler: Mutex<Option<Arc<TransactionHandler<ImmediateFillGateway, InMemoryPortfolio, LoggingResultHandler>>>>,
    market_price: Decimal,
}

impl BrokerageGateway for ImmediateFillGateway {
    fn place_order(&self, order: &Order) -> Result<(), String> {
        let price = order.limit_price.unwrap_or(self.market_price);
        if let Some(handler) = self.handler.lock().clone() {
            handler.on_fill(order.id, OrderStatus::Filled, order.quantity, price, Decimal::ONE);
        }
        Ok(())
    }
    fn update_order(&self, _order: &Order, _update: &OrderUpdateRequest) -> Result<(), String> {
        Ok(())
    }
    fn cancel_order(&self, _order: &Order) -> Result<(), String> {
        Ok(())
    }
    fn cash_balances(&self) -> Vec<CashBalance> {
        Vec::new()
    }
}

struct InMemoryPortfolio {
    cash: Mutex<Decimal>,
}

impl PortfolioCollaborator for InMemoryPortfolio {
    fn has_sufficient_buying_power(&self, order: &Order) -> bool {
        let estimated_cost = order.quantity.abs() * dec!(450);
        *self.cash.lock() >= estimated_cost
    }
    fn process_fill(&self, order: &Order, fill: &Fill, _quote_conversion_rate: Decimal) {
        let mut cash = self.cash.lock();
        *cash -= order.quantity.signum() * fill.quantity * fill.price;
    }
    fn reconcile_cash(&self, balances: &[CashBalance]) {
        if let Some(usd) = balances.iter().find(|b| b.currency == "USD") {
            *self.cash.lock() = usd.amount;
        }
    }
}

struct LoggingResultHandler;
impl ResultHandler for LoggingResultHandler {
    fn order_event(&self, event: OrderEvent) {
        tracing::info!(order_id = event.order_id, status = ?event.status, fill_quantity = %event.fill_quantity, fill_price = %event.fill_price, "order event");
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let registry = MarketRegistry::with_defaults();
    let trade_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let identifier = SecurityIdentifier::generate_equity(trade_date, "SPY", "usa", &registry).unwrap();
    let symbol = Symbol::from_identifier(identifier);

    let model = Arc::new(DefaultBrokerageModel::new(HashMap::new()));
    let gateway = Arc::new(ImmediateFillGateway {
        handler: Mutex::new(None),
        market_price: dec!(450.10),
    });
    let portfolio = Arc::new(InMemoryPortfolio {
        cash: Mutex::new(dec!(100_000)),
    });
    let result_handler = Arc::new(LoggingResultHandler);

    let start = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    let (handler, receiver) = TransactionHandler::new(
        model,
        gateway.clone(),
        portfolio,
        result_handler,
        Arc::new(meridian_integration::ManualTimeProvider::new(start)),
        64,
        10_000,
    );
    let handler = Arc::new(handler);
    *gateway.handler.lock() = Some(handler.clone());

    let engine = Engine::new(start, chrono_tz::America::New_York, handler.clone());

    // `TransactionHandler::process` uses a blocking send so it can be called from the
    // synchronous thread that runs user strategy code (`spec.md` §5); a multi-thread runtime
    // lets it be invoked here via `block_in_place` without starving the consumer task.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async move {
        let consumer = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.run(receiver).await })
        };

        let ticket = tokio::task::block_in_place(|| {
            handler.process(
                OrderRequest::Submit {
                    symbol,
                    quantity: dec!(10),
                    order_type: OrderType::Market,
                    limit_price: None,
                    stop_price: None,
                    tag: "demo".to_string(),
                },
                Some(SecurityContext {
                    security_type: SecurityType::Equity,
                    lot_size: Decimal::ONE,
                    last_price: dec!(450.10),
                    currency: "USD".to_string(),
                }),
            )
        });
        tracing::info!(order_id = ticket.order_id, "submitted order");

        engine.advance_to(start + chrono::Duration::minutes(1));
        handler.process_synchronous_events().await;

        handler.exit().await;
        let _ = consumer.await;

        let order = handler.order(ticket.order_id).unwrap();
        tracing::info!(status = ?order.status, price = %order.price, "final order state");
    });
}
