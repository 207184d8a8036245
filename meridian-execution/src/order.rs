use chrono::{DateTime, Utc};
use meridian_instrument::Symbol;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Order side. Derived purely from the sign of `Order::quantity` rather than stored
/// independently, so the two can never diverge (`spec.md` §9).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    StopLimit,
}

/// `spec.md` §4.G order status state machine. `Filled`, `Canceled`, and `Invalid` are closed:
/// no further update or cancel may succeed against them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OrderStatus {
    New,
    Submitted,
    PartiallyFilled,
    Filled,
    Canceled,
    Invalid,
}

impl OrderStatus {
    pub fn is_closed(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Invalid)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub quantity: Decimal,
    pub price: Decimal,
    pub time: DateTime<Utc>,
}

/// Mutable order aggregate (`spec.md` §3). Created on submit; mutates only through the
/// transaction handler.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: u64,
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub time: DateTime<Utc>,
    pub price: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub price_currency: String,
    pub tag: String,
    pub broker_ids: Vec<String>,
}

impl Order {
    pub fn direction(&self) -> Option<Direction> {
        if self.quantity > Decimal::ZERO {
            Some(Direction::Buy)
        } else if self.quantity < Decimal::ZERO {
            Some(Direction::Sell)
        } else {
            None
        }
    }
}

/// A request to submit, update, or cancel an order (`spec.md` §3, §4.G).
#[derive(Debug, Clone)]
pub enum OrderRequest {
    Submit {
        symbol: Symbol,
        quantity: Decimal,
        order_type: OrderType,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        tag: String,
    },
    Update {
        order_id: u64,
        update: OrderUpdateRequest,
    },
    Cancel {
        order_id: u64,
        tag: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct OrderUpdateRequest {
    pub quantity: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub tag: Option<String>,
}

/// Emitted by the transaction handler's fill-handler to the result handler and the user's
/// `onOrderEvent` hook (`spec.md` §4.G).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OrderEvent {
    pub order_id: u64,
    pub status: OrderStatus,
    pub fill_quantity: Decimal,
    pub fill_price: Decimal,
    pub message: Option<String>,
}

/// User-visible handle to an outstanding order (`spec.md` §3): request history, the last
/// response, aggregated fill info, and cancel/update entry points. `cancel_in_progress` is a
/// shared atomic flag so two concurrent cancel requests for the same order race to exactly one
/// winner (`spec.md` §5, §8 scenario 5).
#[derive(Debug, Clone)]
pub struct OrderTicket {
    pub order_id: u64,
    pub requests: Vec<OrderRequest>,
    pub last_response: crate::error::OrderResponse,
    pub fills: Vec<Fill>,
    pub quantity_filled: Decimal,
    pub average_fill_price: Decimal,
    cancel_in_progress: Arc<AtomicBool>,
}

impl OrderTicket {
    pub fn new(order_id: u64, submit: OrderRequest) -> Self {
        Self {
            order_id,
            requests: vec![submit],
            last_response: crate::error::OrderResponse::Success,
            fills: Vec::new(),
            quantity_filled: Decimal::ZERO,
            average_fill_price: Decimal::ZERO,
            cancel_in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attempt to claim the single cancel slot for this ticket. Returns `true` exactly once per
    /// outstanding cancel attempt; a second concurrent call returns `false`.
    pub fn try_begin_cancel(&self) -> bool {
        self.cancel_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn clear_cancel_in_progress(&self) {
        self.cancel_in_progress.store(false, Ordering::Release);
    }

    pub fn record_request(&mut self, request: OrderRequest) {
        self.requests.push(request);
    }

    /// Fold a fill into the ticket's running `quantity_filled` and `average_fill_price`, set to
    /// the order's current price as the state machine requires (`spec.md` §4.G fill-handler).
    pub fn apply_fill(&mut self, fill: Fill, order_price: Decimal) {
        self.quantity_filled += fill.quantity;
        self.average_fill_price = order_price;
        self.fills.push(fill);
    }

    pub fn scale_for_split(&mut self, factor: Decimal) {
        for request in &mut self.requests {
            if let OrderRequest::Submit {
                quantity,
                limit_price,
                stop_price,
                ..
            } = request
            {
                *quantity *= factor;
                if let Some(p) = limit_price {
                    *p /= factor;
                }
                if let Some(p) = stop_price {
                    *p /= factor;
                }
            }
        }
    }
}
