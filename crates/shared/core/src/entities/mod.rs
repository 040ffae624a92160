mod order;
mod order_status;
mod order_type;
mod position;
mod side;
mod strategy_state;
mod trade_record;

pub use order::{Order, OrderId};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::Position;
pub use side::Side;
pub use strategy_state::{StrategyState, StrategyStatus};
pub use trade_record::TradeRecord;
