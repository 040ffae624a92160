//! Routes decoded pushes to their owners
//!
//! Market data goes into the [`MarketStateCache`]; order and balance updates
//! are fanned out to account subscribers. A runtime subscribes for its own
//! symbol, so nothing else queues up in its channel while it is stopped.

use meridian_gateway::{BalanceUpdate, Endpoint, InboundMessage, MessageHandler, OrderUpdate};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache::MarketStateCache;

/// Private channel update forwarded to runtimes
#[derive(Debug, Clone, PartialEq)]
pub enum AccountUpdate {
    Order(OrderUpdate),
    Balance(BalanceUpdate),
}

impl AccountUpdate {
    pub fn symbol(&self) -> Option<&str> {
        match self {
            AccountUpdate::Order(update) => Some(&update.symbol),
            AccountUpdate::Balance(_) => None,
        }
    }
}

struct AccountSubscriber {
    /// `None` receives everything, balances included
    symbol: Option<String>,
    tx: mpsc::UnboundedSender<AccountUpdate>,
}

impl AccountSubscriber {
    fn wants(&self, update: &AccountUpdate) -> bool {
        match &self.symbol {
            None => true,
            Some(symbol) => update.symbol() == Some(symbol.as_str()),
        }
    }
}

pub struct MarketDispatcher {
    cache: Arc<MarketStateCache>,
    account_subscribers: Mutex<Vec<AccountSubscriber>>,
}

impl MarketDispatcher {
    pub fn new(cache: Arc<MarketStateCache>) -> Self {
        Self {
            cache,
            account_subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn cache(&self) -> &Arc<MarketStateCache> {
        &self.cache
    }

    /// Receive every order and balance update from now on
    pub fn subscribe_account(&self) -> mpsc::UnboundedReceiver<AccountUpdate> {
        self.add_subscriber(None)
    }

    /// Receive order updates for `symbol` only
    pub fn subscribe_orders(&self, symbol: &str) -> mpsc::UnboundedReceiver<AccountUpdate> {
        self.add_subscriber(Some(symbol.to_string()))
    }

    fn add_subscriber(&self, symbol: Option<String>) -> mpsc::UnboundedReceiver<AccountUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.account_subscribers
            .lock()
            .push(AccountSubscriber { symbol, tx });
        rx
    }

    fn forward(&self, update: AccountUpdate) {
        let mut subscribers = self.account_subscribers.lock();
        // Dropped receivers are pruned on the next update
        subscribers.retain(|sub| {
            if sub.wants(&update) {
                sub.tx.send(update.clone()).is_ok()
            } else {
                !sub.tx.is_closed()
            }
        });
    }
}

impl MessageHandler for MarketDispatcher {
    fn handle(&self, endpoint: Endpoint, message: InboundMessage) {
        match message {
            InboundMessage::Ticker(ticker) => self.cache.apply_ticker(ticker),
            InboundMessage::Book(update) => self.cache.apply_book(&update),
            InboundMessage::Trades(trades) => self.cache.apply_trades(trades),
            InboundMessage::Candles(update) => self.cache.apply_candles(update),
            InboundMessage::Orders(updates) => {
                for update in updates {
                    log::debug!(
                        "[ws:{}] order {} {} {:?}",
                        endpoint,
                        update.symbol,
                        update.client_order_id,
                        update.status()
                    );
                    self.forward(AccountUpdate::Order(update));
                }
            }
            InboundMessage::Balances(balances) => {
                for balance in balances {
                    self.forward(AccountUpdate::Balance(balance));
                }
            }
            InboundMessage::SubscriptionAck {
                event,
                channel,
                inst_id,
            } => {
                log::info!(
                    "[ws:{}] {} {} {}",
                    endpoint,
                    event,
                    channel,
                    inst_id.as_deref().unwrap_or("")
                );
            }
            InboundMessage::Error { code, msg } => {
                log::warn!("[ws:{}] venue error {}: {}", endpoint, code, msg);
            }
        }
    }
}
