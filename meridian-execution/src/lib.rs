//! Brokerage admissibility policy and the order lifecycle/transaction handler (`spec.md` §4.F,
//! §4.G). Generalizes barter-rs's exchange-specific execution clients into a brokerage-agnostic
//! order state machine driven by a single request queue.

pub mod brokerage;
pub mod error;
pub mod order;
pub mod transaction_handler;

pub use brokerage::{
    AccountType, BrokerageModel, DefaultBrokerageModel, FeeModel, FillModel, FxcmBrokerageModel, ImmediateFillModel,
    ImmediateSettlementModel, NoSlippageModel, OandaBrokerageModel, SecurityContext, SettlementModel, SlippageModel,
    SplitEvent, TradierBrokerageModel, ZeroFeeModel,
};
pub use error::{BrokerageMessage, BrokerageMessageType, OrderResponse};
pub use order::{Direction, Fill, Order, OrderEvent, OrderRequest, OrderStatus, OrderTicket, OrderType, OrderUpdateRequest};
pub use transaction_handler::{
    BrokerageGateway, CashBalance, PortfolioCollaborator, QueuedRequest, RequestReceiver, ResultHandler, TransactionHandler,
};
