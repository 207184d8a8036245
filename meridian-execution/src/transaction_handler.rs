//! Request queue, order state machine, fill reaction, and live cash reconciliation
//! (`spec.md` §4.G). Scheduling model: `process` is called from arbitrary threads and never
//! blocks the caller beyond the queue's back-pressure; `run` drives the single dedicated
//! consumer thread that owns `orders` and `tickets` as a single writer (`spec.md` §5).

use crate::brokerage::{BrokerageModel, SecurityContext};
use crate::error::OrderResponse;
use crate::order::{Fill, Order, OrderEvent, OrderRequest, OrderStatus, OrderTicket, OrderType};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use meridian_instrument::Symbol;
use meridian_integration::TimeProvider;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::mpsc;

/// A balance reported by a live brokerage during cash reconciliation (`spec.md` §4.G).
#[derive(Debug, Clone)]
pub struct CashBalance {
    pub currency: String,
    pub amount: Decimal,
    pub conversion_rate: Decimal,
}

/// Buying-power and fill-processing hooks delegated to the portfolio, explicitly out of this
/// core's scope (`spec.md` §1, §9).
pub trait PortfolioCollaborator: Send + Sync {
    fn has_sufficient_buying_power(&self, order: &Order) -> bool;
    fn process_fill(&self, order: &Order, fill: &Fill, quote_conversion_rate: Decimal);
    fn reconcile_cash(&self, balances: &[CashBalance]);
}

/// The backtest simulator or live gateway that actually places/updates/cancels orders
/// (`spec.md` §2 control flow).
pub trait BrokerageGateway: Send + Sync {
    fn place_order(&self, order: &Order) -> Result<(), String>;
    fn update_order(&self, order: &Order, update: &crate::order::OrderUpdateRequest) -> Result<(), String>;
    fn cancel_order(&self, order: &Order) -> Result<(), String>;
    fn cash_balances(&self) -> Vec<CashBalance>;
}

pub trait ResultHandler: Send + Sync {
    fn order_event(&self, event: OrderEvent);
}

#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub order_id: u64,
    pub request: OrderRequest,
}

pub type RequestReceiver = mpsc::Receiver<QueuedRequest>;

fn round_to_lot(quantity: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size <= Decimal::ZERO {
        return quantity;
    }
    quantity - (quantity % lot_size)
}

/// The core transaction handler (`spec.md` §4.G). Generic over the three external collaborators
/// so a backtest and a live run can plug in different gateways/portfolios without the handler
/// itself changing.
pub struct TransactionHandler<G, P, R> {
    orders: RwLock<HashMap<u64, Order>>,
    tickets: RwLock<HashMap<u64, OrderTicket>>,
    security_contexts: RwLock<HashMap<u64, SecurityContext>>,
    next_order_id: AtomicU64,
    pending: Arc<AtomicUsize>,
    warming_up: AtomicBool,
    lot_rounding_warned: AtomicBool,
    cancelled: AtomicBool,
    last_fill_ts: RwLock<Option<DateTime<Utc>>>,
    last_sync_day: RwLock<Option<chrono::NaiveDate>>,
    last_sync_ts: RwLock<Option<DateTime<Utc>>>,
    syncing: AtomicBool,
    gc_threshold: u64,
    brokerage_model: Arc<dyn BrokerageModel>,
    gateway: Arc<G>,
    portfolio: Arc<P>,
    result_handler: Arc<R>,
    time_provider: Arc<dyn TimeProvider>,
    queue_tx: meridian_integration::BoundedTx<QueuedRequest>,
}

impl<G, P, R> TransactionHandler<G, P, R>
where
    G: BrokerageGateway,
    P: PortfolioCollaborator,
    R: ResultHandler,
{
    pub fn new(
        brokerage_model: Arc<dyn BrokerageModel>,
        gateway: Arc<G>,
        portfolio: Arc<P>,
        result_handler: Arc<R>,
        time_provider: Arc<dyn TimeProvider>,
        queue_capacity: usize,
        gc_threshold: u64,
    ) -> (Self, RequestReceiver) {
        let (queue_tx, queue_rx) = meridian_integration::channel::bounded(queue_capacity);
        let handler = Self {
            orders: RwLock::new(HashMap::new()),
            tickets: RwLock::new(HashMap::new()),
            security_contexts: RwLock::new(HashMap::new()),
            next_order_id: AtomicU64::new(1),
            pending: Arc::new(AtomicUsize::new(0)),
            warming_up: AtomicBool::new(false),
            lot_rounding_warned: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            last_fill_ts: RwLock::new(None),
            last_sync_day: RwLock::new(None),
            last_sync_ts: RwLock::new(None),
            syncing: AtomicBool::new(false),
            gc_threshold,
            brokerage_model,
            gateway,
            portfolio,
            result_handler,
            time_provider,
            queue_tx,
        };
        (handler, queue_rx)
    }

    pub fn set_warming_up(&self, warming_up: bool) {
        self.warming_up.store(warming_up, Ordering::Release);
    }

    pub fn ticket(&self, order_id: u64) -> Option<OrderTicket> {
        self.tickets.read().get(&order_id).cloned()
    }

    pub fn order(&self, order_id: u64) -> Option<Order> {
        self.orders.read().get(&order_id).cloned()
    }

    /// Classify, create a ticket if this is a submit, set the initial response, and push onto
    /// the request queue. Returns the ticket immediately without waiting for the consumer loop
    /// (`spec.md` §4.G).
    pub fn process(&self, request: OrderRequest, security: Option<SecurityContext>) -> OrderTicket {
        if self.warming_up.load(Ordering::Acquire) {
            if let OrderRequest::Submit { .. } = &request {
                let id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
                let mut ticket = OrderTicket::new(id, request);
                ticket.last_response = OrderResponse::WarmingUp;
                return ticket;
            }
        }

        match &request {
            OrderRequest::Submit { .. } => {
                let id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
                if let Some(ctx) = security {
                    self.security_contexts.write().insert(id, ctx);
                }
                let ticket = OrderTicket::new(id, request.clone());
                self.tickets.write().insert(id, ticket.clone());
                self.enqueue(QueuedRequest { order_id: id, request });
                ticket
            }
            OrderRequest::Update { order_id, .. } | OrderRequest::Cancel { order_id, .. } => {
                let order_id = *order_id;
                let mut tickets = self.tickets.write();
                match tickets.get_mut(&order_id) {
                    Some(ticket) => {
                        ticket.record_request(request.clone());
                        let snapshot = ticket.clone();
                        drop(tickets);
                        self.enqueue(QueuedRequest { order_id, request });
                        snapshot
                    }
                    None => {
                        let mut ticket = OrderTicket::new(order_id, request);
                        ticket.last_response = OrderResponse::UnableToFindOrder;
                        ticket
                    }
                }
            }
        }
    }

    fn enqueue(&self, queued: QueuedRequest) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.queue_tx.blocking_send(queued).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn set_ticket_response(&self, order_id: u64, response: OrderResponse) {
        if let Some(ticket) = self.tickets.write().get_mut(&order_id) {
            ticket.last_response = response;
        }
    }

    fn security_context(&self, order_id: u64) -> SecurityContext {
        self.security_contexts
            .read()
            .get(&order_id)
            .cloned()
            .unwrap_or(SecurityContext {
                security_type: meridian_instrument::SecurityType::Base,
                lot_size: Decimal::ONE,
                last_price: Decimal::ZERO,
                currency: "USD".to_string(),
            })
    }

    fn handle_submit(
        &self,
        order_id: u64,
        symbol: Symbol,
        quantity: Decimal,
        order_type: OrderType,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        tag: String,
    ) {
        let ctx = self.security_context(order_id);
        let lot_size = self.brokerage_model.lot_size(&ctx);
        let rounded_quantity = round_to_lot(quantity, lot_size);
        if rounded_quantity != quantity && self.lot_rounding_warned.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            tracing::warn!(order_id, %quantity, %rounded_quantity, "order quantity rounded to a multiple of the lot size");
        }

        let order = Order {
            id: order_id,
            symbol,
            quantity: rounded_quantity,
            order_type,
            status: OrderStatus::New,
            time: self.time_provider.utc_now(),
            price: Decimal::ZERO,
            limit_price,
            stop_price,
            price_currency: ctx.currency.clone(),
            tag,
            broker_ids: Vec::new(),
        };

        if self.orders.read().contains_key(&order_id) {
            self.set_ticket_response(order_id, OrderResponse::OrderAlreadyExists);
            return;
        }
        self.orders.write().insert(order_id, order.clone());

        if order.quantity == Decimal::ZERO {
            self.mark_invalid(order_id);
            self.set_ticket_response(order_id, OrderResponse::ZeroQuantity);
            return;
        }

        if !self.portfolio.has_sufficient_buying_power(&order) {
            self.mark_invalid(order_id);
            self.set_ticket_response(order_id, OrderResponse::InsufficientBuyingPower);
            return;
        }

        let (can_submit, message) = self.brokerage_model.can_submit_order(&ctx, &order);
        if !can_submit {
            self.mark_invalid(order_id);
            let text = message.map(|m| m.to_string()).unwrap_or_default();
            self.set_ticket_response(order_id, OrderResponse::BrokerageModelRefusedToSubmitOrder(text));
            return;
        }

        if let Err(err) = self.gateway.place_order(&order) {
            self.mark_invalid(order_id);
            self.set_ticket_response(order_id, OrderResponse::BrokerageFailedToSubmitOrder(err));
            return;
        }

        if let Some(stored) = self.orders.write().get_mut(&order_id) {
            // A synchronous brokerage gateway may have already driven this order to a fill
            // (or beyond) from inside `place_order`; don't regress a terminal status back to
            // `Submitted`.
            if stored.status == OrderStatus::New {
                stored.status = OrderStatus::Submitted;
            }
        }
        self.set_ticket_response(order_id, OrderResponse::Success);
    }

    fn mark_invalid(&self, order_id: u64) {
        if let Some(order) = self.orders.write().get_mut(&order_id) {
            order.status = OrderStatus::Invalid;
        }
    }

    fn handle_update(&self, order_id: u64, update: crate::order::OrderUpdateRequest) {
        let Some(order) = self.orders.read().get(&order_id).cloned() else {
            self.set_ticket_response(order_id, OrderResponse::UnableToFindOrder);
            return;
        };
        if order.status.is_closed() {
            self.set_ticket_response(order_id, OrderResponse::InvalidStatus);
            return;
        }

        let ctx = self.security_context(order_id);
        let mut normalized = update.clone();
        if let Some(quantity) = normalized.quantity {
            normalized.quantity = Some(round_to_lot(quantity, self.brokerage_model.lot_size(&ctx)));
        }

        let (can_update, message) = self.brokerage_model.can_update_order(&ctx, &order, &normalized);
        if !can_update {
            let text = message.map(|m| m.to_string()).unwrap_or_default();
            self.set_ticket_response(order_id, OrderResponse::BrokerageModelRefusedToUpdateOrder(text));
            return;
        }

        if let Err(err) = self.gateway.update_order(&order, &normalized) {
            self.set_ticket_response(order_id, OrderResponse::BrokerageFailedToUpdateOrder(err));
            return;
        }

        if let Some(stored) = self.orders.write().get_mut(&order_id) {
            if let Some(quantity) = normalized.quantity {
                stored.quantity = quantity;
            }
            if let Some(limit_price) = normalized.limit_price {
                stored.limit_price = Some(limit_price);
            }
            if let Some(stop_price) = normalized.stop_price {
                stored.stop_price = Some(stop_price);
            }
            if let Some(tag) = normalized.tag {
                stored.tag = tag;
            }
        }
        self.set_ticket_response(order_id, OrderResponse::Success);
    }

    fn handle_cancel(&self, order_id: u64, tag: Option<String>) {
        let Some(order) = self.orders.read().get(&order_id).cloned() else {
            self.set_ticket_response(order_id, OrderResponse::UnableToFindOrder);
            return;
        };
        if order.status.is_closed() {
            self.set_ticket_response(order_id, OrderResponse::InvalidStatus);
            return;
        }

        let claimed = self
            .tickets
            .read()
            .get(&order_id)
            .map(|ticket| ticket.try_begin_cancel())
            .unwrap_or(false);
        if !claimed {
            self.set_ticket_response(order_id, OrderResponse::InvalidRequest);
            return;
        }

        let result = self.gateway.cancel_order(&order);
        if let Some(ticket) = self.tickets.read().get(&order_id) {
            ticket.clear_cancel_in_progress();
        }

        match result {
            Ok(()) => {
                if let Some(stored) = self.orders.write().get_mut(&order_id) {
                    stored.status = OrderStatus::Canceled;
                    if let Some(tag) = tag {
                        stored.tag = tag;
                    }
                }
                self.set_ticket_response(order_id, OrderResponse::Success);
            }
            Err(err) => {
                self.set_ticket_response(order_id, OrderResponse::BrokerageFailedToCancelOrder(err));
            }
        }
    }

    /// Reacts to a brokerage fill callback (`spec.md` §4.G fill-handler). `fill_status` is the
    /// order's resulting status (`PartiallyFilled` or `Filled`).
    pub fn on_fill(&self, order_id: u64, fill_status: OrderStatus, fill_quantity: Decimal, fill_price: Decimal, quote_conversion_rate: Decimal) {
        let Some(mut order) = self.orders.read().get(&order_id).cloned() else {
            tracing::warn!(order_id, "fill for unknown order, discarding");
            return;
        };

        order.status = fill_status;
        order.price = fill_price;
        if let Some(stored) = self.orders.write().get_mut(&order_id) {
            stored.status = fill_status;
            stored.price = fill_price;
        }

        let fill = Fill {
            quantity: fill_quantity,
            price: fill_price,
            time: self.time_provider.utc_now(),
        };

        if matches!(fill_status, OrderStatus::Filled | OrderStatus::PartiallyFilled) {
            *self.last_fill_ts.write() = Some(fill.time);
            self.portfolio.process_fill(&order, &fill, quote_conversion_rate);
        }

        if let Some(ticket) = self.tickets.write().get_mut(&order_id) {
            ticket.apply_fill(fill, order.price);
        }

        self.result_handler.order_event(OrderEvent {
            order_id,
            status: fill_status,
            fill_quantity,
            fill_price,
            message: None,
        });

        self.garbage_collect();
    }

    /// Drop all orders (and their tickets) whose id is more than `gc_threshold` behind the
    /// current maximum once the order count exceeds it (`spec.md` §4.G, §8).
    fn garbage_collect(&self) {
        let mut orders = self.orders.write();
        if (orders.len() as u64) <= self.gc_threshold {
            return;
        }
        let max_id = orders.keys().copied().max().unwrap_or(0);
        let floor = max_id.saturating_sub(self.gc_threshold);
        orders.retain(|id, _| *id > floor);
        drop(orders);
        self.tickets.write().retain(|id, _| *id > floor);
        self.security_contexts.write().retain(|id, _| *id > floor);
    }

    fn dispatch(&self, queued: QueuedRequest) {
        match queued.request {
            OrderRequest::Submit {
                symbol,
                quantity,
                order_type,
                limit_price,
                stop_price,
                tag,
            } => self.handle_submit(queued.order_id, symbol, quantity, order_type, limit_price, stop_price, tag),
            OrderRequest::Update { update, .. } => self.handle_update(queued.order_id, update),
            OrderRequest::Cancel { tag, .. } => self.handle_cancel(queued.order_id, tag),
        }
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Consumer loop: dequeue, dispatch, repeat, until the channel closes or [`Self::request_exit`]
    /// has been called and the queue has drained (`spec.md` §4.G).
    pub async fn run(&self, mut rx: RequestReceiver) {
        loop {
            match tokio::time::timeout(StdDuration::from_millis(100), rx.recv()).await {
                Ok(Some(queued)) => self.dispatch(queued),
                Ok(None) => return,
                Err(_elapsed) => {
                    if self.cancelled.load(Ordering::Acquire) && self.pending.load(Ordering::Acquire) == 0 {
                        return;
                    }
                }
            }
        }
    }

    /// Block up to 1 s for the request queue to drain (backtest synchronous hook).
    pub async fn process_synchronous_events(&self) {
        self.wait_for_drain(StdDuration::from_secs(1)).await;
    }

    /// Live-mode periodic hook: reconciles cash balances once local time passes `cash_sync_time`.
    pub async fn process_asynchronous_events(&self, local_now: NaiveDateTime, cash_sync_time: NaiveTime) {
        self.maybe_reconcile_cash(local_now, cash_sync_time).await;
    }

    async fn maybe_reconcile_cash(&self, local_now: NaiveDateTime, cash_sync_time: NaiveTime) {
        if local_now.time() < cash_sync_time {
            return;
        }
        let today = local_now.date();
        if *self.last_sync_day.read() == Some(today) {
            return;
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let balances = self.gateway.cash_balances();
        if balances.is_empty() {
            self.syncing.store(false, Ordering::Release);
            return;
        }

        let sync_started_at = self.time_provider.utc_now();
        self.portfolio.reconcile_cash(&balances);

        tokio::time::sleep(StdDuration::from_secs(10)).await;

        let retry = match *self.last_fill_ts.read() {
            Some(fill_ts) => (fill_ts - sync_started_at).num_seconds().abs() <= 10,
            None => false,
        };
        if !retry {
            *self.last_sync_day.write() = Some(today);
            *self.last_sync_ts.write() = Some(sync_started_at);
        }
        self.syncing.store(false, Ordering::Release);
    }

    async fn wait_for_drain(&self, timeout: StdDuration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.pending.load(Ordering::Acquire) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    }

    /// Wait up to 60 s for the queue to drain, then signal the consumer loop to exit
    /// (`spec.md` §4.G, §5).
    pub async fn exit(&self) {
        self.wait_for_drain(StdDuration::from_secs(60)).await;
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brokerage::DefaultBrokerageModel;
    use crate::order::OrderUpdateRequest;
    use chrono::TimeZone;
    use meridian_instrument::{MarketRegistry, SecurityIdentifier, SecurityType};
    use parking_lot::Mutex as PlMutex;
    use rust_decimal_macros::dec;
    use std::collections::HashMap as StdHashMap;

    struct AcceptingGateway;
    impl BrokerageGateway for AcceptingGateway {
        fn place_order(&self, _order: &Order) -> Result<(), String> {
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

    struct AlwaysApprovingPortfolio {
        fills: PlMutex<Vec<(u64, Decimal)>>,
    }
    impl PortfolioCollaborator for AlwaysApprovingPortfolio {
        fn has_sufficient_buying_power(&self, _order: &Order) -> bool {
            true
        }
        fn process_fill(&self, order: &Order, fill: &Fill, _quote_conversion_rate: Decimal) {
            self.fills.lock().push((order.id, fill.quantity));
        }
        fn reconcile_cash(&self, _balances: &[CashBalance]) {}
    }

    struct RecordingResultHandler {
        events: PlMutex<Vec<OrderEvent>>,
    }
    impl ResultHandler for RecordingResultHandler {
        fn order_event(&self, event: OrderEvent) {
            self.events.lock().push(event);
        }
    }

    fn symbol() -> Symbol {
        let registry = MarketRegistry::with_defaults();
        let date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let id = SecurityIdentifier::generate_equity(date, "SPY", "usa", &registry).unwrap();
        Symbol::from_identifier(id)
    }

    fn handler() -> (
        TransactionHandler<AcceptingGateway, AlwaysApprovingPortfolio, RecordingResultHandler>,
        RequestReceiver,
    ) {
        let model = Arc::new(DefaultBrokerageModel::new(StdHashMap::new()));
        let gateway = Arc::new(AcceptingGateway);
        let portfolio = Arc::new(AlwaysApprovingPortfolio {
            fills: PlMutex::new(Vec::new()),
        });
        let result_handler = Arc::new(RecordingResultHandler {
            events: PlMutex::new(Vec::new()),
        });
        let time_provider: Arc<dyn TimeProvider> = Arc::new(meridian_integration::ManualTimeProvider::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap(),
        ));
        TransactionHandler::new(model, gateway, portfolio, result_handler, time_provider, 16, 10_000)
    }

    fn ctx() -> SecurityContext {
        SecurityContext {
            security_type: SecurityType::Equity,
            lot_size: Decimal::ONE,
            last_price: dec!(450),
            currency: "USD".to_string(),
        }
    }

    /// Drains whatever is already queued, dispatching inline rather than running the full `run`
    /// consumer loop, so these tests stay deterministic without relying on task scheduling.
    fn drain<G: BrokerageGateway, P: PortfolioCollaborator, Rh: ResultHandler>(
        handler: &TransactionHandler<G, P, Rh>,
        rx: &mut RequestReceiver,
    ) {
        while let Ok(queued) = rx.try_recv() {
            handler.dispatch(queued);
        }
    }

    fn submit_request(quantity: Decimal) -> OrderRequest {
        OrderRequest::Submit {
            symbol: symbol(),
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            tag: String::new(),
        }
    }

    #[test]
    fn submit_zero_quantity_is_marked_invalid() {
        let (h, mut rx) = handler();
        let ticket = h.process(submit_request(Decimal::ZERO), Some(ctx()));
        let order_id = ticket.order_id;
        drain(&h, &mut rx);

        assert_eq!(h.order(order_id).unwrap().status, OrderStatus::Invalid);
        assert_eq!(h.ticket(order_id).unwrap().last_response, OrderResponse::ZeroQuantity);
    }

    #[test]
    fn submit_then_cancel_lifecycle() {
        let (h, mut rx) = handler();
        let ticket = h.process(submit_request(dec!(10)), Some(ctx()));
        let order_id = ticket.order_id;
        drain(&h, &mut rx);
        assert_eq!(h.order(order_id).unwrap().status, OrderStatus::Submitted);

        h.process(
            OrderRequest::Cancel {
                order_id,
                tag: Some("user-cancel".to_string()),
            },
            None,
        );
        drain(&h, &mut rx);

        assert_eq!(h.order(order_id).unwrap().status, OrderStatus::Canceled);
        assert_eq!(h.ticket(order_id).unwrap().last_response, OrderResponse::Success);
    }

    #[test]
    fn update_and_cancel_on_closed_order_are_rejected() {
        let (h, mut rx) = handler();
        let ticket = h.process(submit_request(dec!(10)), Some(ctx()));
        let order_id = ticket.order_id;
        drain(&h, &mut rx);

        h.process(OrderRequest::Cancel { order_id, tag: None }, None);
        drain(&h, &mut rx);
        assert_eq!(h.order(order_id).unwrap().status, OrderStatus::Canceled);

        h.process(
            OrderRequest::Update {
                order_id,
                update: OrderUpdateRequest {
                    quantity: Some(dec!(5)),
                    ..Default::default()
                },
            },
            None,
        );
        drain(&h, &mut rx);
        assert_eq!(h.ticket(order_id).unwrap().last_response, OrderResponse::InvalidStatus);

        let second_cancel = h.process(OrderRequest::Cancel { order_id, tag: None }, None);
        drain(&h, &mut rx);
        assert_eq!(second_cancel.order_id, order_id);
        assert_eq!(h.ticket(order_id).unwrap().last_response, OrderResponse::InvalidStatus);
    }

    #[test]
    fn concurrent_cancel_attempts_resolve_to_exactly_one_success() {
        let (h, mut rx) = handler();
        let ticket = h.process(submit_request(dec!(10)), Some(ctx()));
        let order_id = ticket.order_id;
        drain(&h, &mut rx);

        h.process(OrderRequest::Cancel { order_id, tag: None }, None);
        h.process(OrderRequest::Cancel { order_id, tag: None }, None);
        drain(&h, &mut rx);

        assert_eq!(h.order(order_id).unwrap().status, OrderStatus::Canceled);
    }

    #[test]
    fn fill_updates_status_and_notifies_portfolio_and_result_handler() {
        let (h, mut rx) = handler();
        let ticket = h.process(submit_request(dec!(10)), Some(ctx()));
        let order_id = ticket.order_id;
        drain(&h, &mut rx);

        h.on_fill(order_id, OrderStatus::Filled, dec!(10), dec!(451), Decimal::ONE);

        let order = h.order(order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.price, dec!(451));
        let ticket = h.ticket(order_id).unwrap();
        assert_eq!(ticket.quantity_filled, dec!(10));
        assert_eq!(ticket.average_fill_price, dec!(451));
    }

    #[test]
    fn update_on_unknown_order_reports_unable_to_find() {
        let (h, mut rx) = handler();
        let ticket = h.process(
            OrderRequest::Update {
                order_id: 999,
                update: OrderUpdateRequest::default(),
            },
            None,
        );
        drain(&h, &mut rx);
        assert_eq!(ticket.last_response, OrderResponse::UnableToFindOrder);
    }
}
