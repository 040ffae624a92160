//! Strategy Runtime
//!
//! Drives one strategy on one symbol. Lifecycle calls (start, stop, pause)
//! are serialized behind a gate and follow [`crate::lifecycle::transition`];
//! while running, a supervised polling task ticks the strategy and applies
//! venue fills.
//!
//! ```text
//!            ┌──────────── gate (start / stop / pause) ────────────┐
//!            │                                                      │
//!            ▼                                                      │
//!   ┌─────────────────┐  tick   ┌──────────┐  order  ┌──────────┐   │
//!   │  polling task   │───────► │ strategy │───────► │   risk   │   │
//!   │ (interval,      │         └──────────┘         └────┬─────┘   │
//!   │  account fills) │                                   ▼         │
//!   └───────┬─────────┘                             ┌──────────┐    │
//!           │ fill                                  │ executor │    │
//!           ▼                                       └────┬─────┘    │
//!   ┌─────────────────┐ ◄────────────── fill ────────────┘          │
//!   │ ledger + store  │ ───► events ───► fan-out                    │
//!   └─────────────────┘                                             │
//! ```
//!
//! A tick that errors or panics moves the runtime to Error; the task then
//! ends itself and `start` resumes it.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use log::{debug, error, info, trace, warn};
use meridian_core::{
    CandleInterval, Order, OrderStatus, Side, StrategyState, StrategyStatus, TradeRecord,
};
use meridian_market::{AccountUpdate, MarketStateCache};
use meridian_order_manager::{OrderTracker, PositionLedger};
use meridian_ports::{Clock, Execution, OrderExecutor, StateStore};
use meridian_risk_manager::{CapitalInfo, RiskCheckType, RiskEngine, RiskRejection};
use meridian_strategy::{MarketContext, Strategy, StrategyError, TickContext};
use rust_decimal::{Decimal, RoundingStrategy};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::RuntimeConfig;
use crate::error::{Result, TradeRejected};
use crate::events::{EventPublisher, RuntimeEvent, RuntimeSnapshot};
use crate::lifecycle::{Effect, LifecycleEvent, Transition, transition};

/// Decimal places kept when sizing an order from a capital cap
const QUANTITY_DP: u32 = 8;

type AccountRx = mpsc::UnboundedReceiver<AccountUpdate>;

/// Collaborators injected into a runtime
#[derive(Clone)]
pub struct RuntimeDeps {
    pub store: Arc<dyn StateStore>,
    pub executor: Arc<dyn OrderExecutor>,
    pub market: Arc<MarketStateCache>,
    pub events: Arc<dyn EventPublisher>,
    pub clock: Arc<dyn Clock>,
}

/// Result of an accepted trade intent
#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    /// Filled immediately; the ledger already reflects it
    Filled(TradeRecord),
    /// Resting at the venue; fills arrive as account updates
    Submitted {
        client_order_id: String,
        exchange_order_id: String,
    },
}

/// Everything a tick or a fill mutates, guarded by one lock
struct Core {
    strategy: Box<dyn Strategy>,
    ledger: PositionLedger,
    risk: RiskEngine,
    orders: OrderTracker,
    context: MarketContext,
    last_trade: Option<TradeRecord>,
    /// Last trade opened by a signal, for the minimum trade interval
    last_signal_trade_at: Option<DateTime<Utc>>,
    last_run_time: Option<DateTime<Utc>>,
}

struct Lifecycle {
    status: StrategyStatus,
    last_error: Option<String>,
}

struct Shared {
    name: String,
    symbol: String,
    config: RuntimeConfig,
    deps: RuntimeDeps,
    core: Mutex<Core>,
    lifecycle: parking_lot::Mutex<Lifecycle>,
}

struct PollingTask {
    shutdown: watch::Sender<bool>,
    /// Hands the account receiver back when the task ends
    handle: JoinHandle<Option<AccountRx>>,
}

#[derive(Default)]
struct Gate {
    task: Option<PollingTask>,
    account: Option<AccountRx>,
}

pub struct StrategyRuntime {
    shared: Arc<Shared>,
    gate: Mutex<Gate>,
}

impl StrategyRuntime {
    /// Build a stopped runtime, restoring the ledger from the store
    pub async fn new(
        symbol: impl Into<String>,
        config: RuntimeConfig,
        strategy: Box<dyn Strategy>,
        deps: RuntimeDeps,
    ) -> Result<Self> {
        let symbol = symbol.into();
        let name = strategy.name().to_string();
        let mut risk = RiskEngine::with_clock(config.risk.clone(), deps.clock.clone());

        let (ledger, last_error, last_run_time) =
            match deps.store.load_strategy_state(&name, &symbol).await? {
                Some(state) => {
                    info!(
                        "[strategy:{}:{}] restored qty={} avg={} realized={} status={}",
                        name,
                        symbol,
                        state.position.quantity,
                        state.position.avg_price,
                        state.total_pnl,
                        state.status
                    );
                    (
                        PositionLedger::restore(&state),
                        state.last_error.clone(),
                        state.last_run_time,
                    )
                }
                None => (PositionLedger::new(&name, &symbol), None, None),
            };
        risk.update_used_capital(ledger.position_value());

        let core = Core {
            strategy,
            ledger,
            risk,
            orders: OrderTracker::new(),
            context: MarketContext::default(),
            last_trade: None,
            last_signal_trade_at: None,
            last_run_time,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                symbol,
                config,
                deps,
                core: Mutex::new(core),
                lifecycle: parking_lot::Mutex::new(Lifecycle {
                    status: StrategyStatus::Stopped,
                    last_error,
                }),
            }),
            gate: Mutex::new(Gate::default()),
        })
    }

    /// Feed venue order updates into the polling task
    pub fn with_account_updates(mut self, updates: AccountRx) -> Self {
        self.gate.get_mut().account = Some(updates);
        self
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn symbol(&self) -> &str {
        &self.shared.symbol
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    pub fn status(&self) -> StrategyStatus {
        self.shared.lifecycle.lock().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lifecycle.lock().last_error.clone()
    }

    pub async fn start(&self) -> Result<()> {
        let mut gate = self.gate.lock().await;
        transition(self.status(), &LifecycleEvent::Start)?;

        // A task that failed has already ended; collect it
        self.cancel(&mut gate).await;
        self.shared
            .core
            .lock()
            .await
            .strategy
            .on_start(&self.shared.symbol)
            .await?;

        self.drive(&mut gate, LifecycleEvent::Start).await?;
        info!("[strategy:{}:{}] started", self.shared.name, self.shared.symbol);
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let mut gate = self.gate.lock().await;
        self.drive(&mut gate, LifecycleEvent::Stop).await?;

        if let Err(e) = self.shared.core.lock().await.strategy.on_stop().await {
            warn!(
                "[strategy:{}:{}] on_stop failed: {}",
                self.shared.name, self.shared.symbol, e
            );
        }
        info!("[strategy:{}:{}] stopped", self.shared.name, self.shared.symbol);
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let mut gate = self.gate.lock().await;
        self.drive(&mut gate, LifecycleEvent::Pause).await?;
        info!("[strategy:{}:{}] paused", self.shared.name, self.shared.symbol);
        Ok(())
    }

    /// Move a running strategy to Error, e.g. when the venue connection is gone
    ///
    /// The polling task is cancelled first; `reason` becomes the persisted
    /// last error until the next start.
    pub async fn fail(&self, reason: impl Into<String>) -> Result<()> {
        let event = LifecycleEvent::Fail(reason.into());
        let mut gate = self.gate.lock().await;
        transition(self.status(), &event)?;

        self.cancel(&mut gate).await;
        self.drive(&mut gate, event).await?;
        warn!(
            "[strategy:{}:{}] failed: {}",
            self.shared.name,
            self.shared.symbol,
            self.last_error().unwrap_or_default()
        );
        Ok(())
    }

    /// Manual buy at market, or as a limit order when `price` is given
    pub async fn buy(
        &self,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> std::result::Result<TradeOutcome, TradeRejected> {
        self.shared.manual_trade(Side::Buy, quantity, price).await
    }

    /// Manual sell at market, or as a limit order when `price` is given
    pub async fn sell(
        &self,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> std::result::Result<TradeOutcome, TradeRejected> {
        self.shared.manual_trade(Side::Sell, quantity, price).await
    }

    pub async fn snapshot(&self) -> RuntimeSnapshot {
        self.shared.snapshot().await
    }

    pub async fn capital_info(&self) -> CapitalInfo {
        self.shared.core.lock().await.risk.capital_info()
    }

    /// Run one lifecycle event through the state machine and its effects
    async fn drive(&self, gate: &mut Gate, event: LifecycleEvent) -> Result<()> {
        let planned = transition(self.status(), &event)?;
        if planned.effects.contains(&Effect::CancelTask) {
            self.cancel(gate).await;
        }

        // The task may have failed while it wound down
        let plan = transition(self.status(), &event)?;
        for effect in &plan.effects {
            match effect {
                Effect::CancelTask => self.cancel(gate).await,
                Effect::Persist => self.shared.commit(&plan).await,
                Effect::Publish => self.shared.publish_state_change().await,
                Effect::SpawnTask => self.spawn(gate),
            }
        }
        Ok(())
    }

    fn spawn(&self, gate: &mut Gate) {
        let (shutdown, signal) = watch::channel(false);
        let handle = tokio::spawn(run_polling(
            self.shared.clone(),
            signal,
            gate.account.take(),
        ));
        gate.task = Some(PollingTask { shutdown, handle });
    }

    /// Stop the polling task and wait until it has exited
    async fn cancel(&self, gate: &mut Gate) {
        let Some(task) = gate.task.take() else {
            return;
        };
        let _ = task.shutdown.send(true);
        match task.handle.await {
            Ok(account) => {
                if account.is_some() {
                    gate.account = account;
                }
            }
            Err(e) => error!(
                "[strategy:{}:{}] polling task ended abnormally: {}",
                self.shared.name, self.shared.symbol, e
            ),
        }
    }
}

impl Shared {
    fn lifecycle_view(&self) -> (StrategyStatus, Option<String>) {
        let lifecycle = self.lifecycle.lock();
        (lifecycle.status, lifecycle.last_error.clone())
    }

    /// Apply the transition's status and persist it
    async fn commit(&self, plan: &Transition) {
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.status = plan.to;
            lifecycle.last_error = plan.error.clone();
        }
        debug!(
            "[strategy:{}:{}] {} -> {}",
            self.name, self.symbol, plan.from, plan.to
        );
        let core = self.core.lock().await;
        let state = self.state(&core, self.deps.market.last_price(&self.symbol));
        self.persist(state).await;
    }

    async fn publish_state_change(&self) {
        let snapshot = self.snapshot().await;
        self.deps.events.publish(RuntimeEvent::state_change(snapshot));
    }

    async fn publish_update(&self) {
        let snapshot = self.snapshot().await;
        self.deps.events.publish(RuntimeEvent::update(snapshot));
    }

    /// Called by the polling task when a tick fails
    async fn fail(&self, reason: String) {
        let status = self.lifecycle.lock().status;
        let plan = match transition(status, &LifecycleEvent::Fail(reason)) {
            Ok(plan) => plan,
            Err(e) => {
                debug!("[strategy:{}:{}] failure ignored: {}", self.name, self.symbol, e);
                return;
            }
        };
        for effect in &plan.effects {
            match effect {
                Effect::Persist => self.commit(&plan).await,
                Effect::Publish => self.publish_state_change().await,
                Effect::CancelTask | Effect::SpawnTask => {}
            }
        }
    }

    fn state(&self, core: &Core, mark_price: Option<Decimal>) -> StrategyState {
        let (status, last_error) = self.lifecycle_view();
        StrategyState {
            strategy_name: self.name.clone(),
            symbol: self.symbol.clone(),
            position: core.ledger.position(mark_price),
            total_pnl: core.ledger.realized_pnl(),
            total_commission: core.ledger.total_commission(),
            status,
            last_error,
            last_run_time: core.last_run_time,
            updated_at: self.deps.clock.now(),
        }
    }

    async fn persist(&self, state: StrategyState) {
        if let Err(e) = self.deps.store.save_strategy_state(&state).await {
            error!("[strategy:{}:{}] failed to save state: {}", self.name, self.symbol, e);
        }
    }

    async fn snapshot(&self) -> RuntimeSnapshot {
        let core = self.core.lock().await;
        self.snapshot_of(&core)
    }

    fn snapshot_of(&self, core: &Core) -> RuntimeSnapshot {
        let market = self
            .deps
            .market
            .snapshot(&self.symbol, self.config.snapshot_depth);
        let position = core.ledger.position(market.last_price());
        let (status, last_error) = self.lifecycle_view();

        RuntimeSnapshot {
            strategy_name: self.name.clone(),
            symbol: self.symbol.clone(),
            status,
            last_error,
            unrealized_pnl: position.unrealized_pnl,
            position,
            realized_pnl: core.ledger.realized_pnl(),
            total_commission: core.ledger.total_commission(),
            risk: core.risk.risk_snapshot(),
            market,
            last_trade: core.last_trade.clone(),
            timestamp: self.deps.clock.now(),
        }
    }

    /// One polling step: observe, decide, maybe trade, publish
    async fn tick(&self) -> std::result::Result<(), StrategyError> {
        let now = self.deps.clock.now();
        let Some(price) = self.deps.market.last_price(&self.symbol) else {
            debug!("[strategy:{}:{}] no price yet, skipping tick", self.name, self.symbol);
            return Ok(());
        };
        if price <= Decimal::ZERO {
            warn!(
                "[strategy:{}:{}] non-positive price {}, skipping tick",
                self.name, self.symbol, price
            );
            return Ok(());
        }
        let ticker = self.deps.market.ticker(&self.symbol);
        let candle = self
            .deps
            .market
            .latest_candle(&self.symbol, CandleInterval::OneMinute);

        {
            let mut guard = self.core.lock().await;
            let core = &mut *guard;
            core.context
                .observe(now, price, ticker.as_ref(), candle.as_ref());
            core.last_run_time = Some(now);

            let position = core.ledger.position(Some(price));
            let ctx = TickContext {
                symbol: &self.symbol,
                price,
                now,
                position: &position,
                market: &core.context,
            };
            let decision = core.strategy.decide(&ctx).await?;
            debug!(
                "[strategy:{}:{}] {} confidence={} {}",
                self.name, self.symbol, decision.signal, decision.confidence, decision.reason
            );

            if let Some(side) = decision.signal.side()
                && decision.is_actionable(self.config.min_confidence)
            {
                if self.in_cooldown(core, now) {
                    debug!(
                        "[strategy:{}:{}] {} signal inside minimum trade interval",
                        self.name, self.symbol, side
                    );
                } else {
                    self.act_on_signal(core, side, price, now).await;
                }
            }
        }

        self.publish_update().await;
        Ok(())
    }

    fn in_cooldown(&self, core: &Core, now: DateTime<Utc>) -> bool {
        core.last_signal_trade_at
            .is_some_and(|at| now - at < self.config.min_trade_interval())
    }

    /// Close any opposite position, then open on the signal's side
    async fn act_on_signal(&self, core: &mut Core, side: Side, price: Decimal, now: DateTime<Utc>) {
        let held = core.ledger.quantity();
        if held * side.sign() > Decimal::ZERO {
            debug!(
                "[strategy:{}:{}] already positioned for {} ({})",
                self.name, self.symbol, side, held
            );
            return;
        }

        if !held.is_zero() {
            match self.execute(core, side, held.abs(), None, price).await {
                Ok(_) => info!(
                    "[strategy:{}:{}] closed {} before {}",
                    self.name, self.symbol, held, side
                ),
                Err(e) => {
                    warn!("[strategy:{}:{}] close failed: {}", self.name, self.symbol, e);
                    return;
                }
            }
        }

        let quantity = self.signal_quantity(core, price);
        if quantity <= Decimal::ZERO {
            warn!(
                "[strategy:{}:{}] no capital left to open {}",
                self.name, self.symbol, side
            );
            return;
        }
        match self.execute(core, side, quantity, None, price).await {
            Ok(_) => core.last_signal_trade_at = Some(now),
            Err(e) => warn!("[strategy:{}:{}] {} refused: {}", self.name, self.symbol, side, e),
        }
    }

    /// Configured quantity, capped by the largest single trade allowed
    fn signal_quantity(&self, core: &Core, price: Decimal) -> Decimal {
        let cap = core.risk.capital_info().max_single_trade / price;
        self.config
            .trade_quantity
            .min(cap)
            .round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::ToZero)
    }

    async fn manual_trade(
        &self,
        side: Side,
        quantity: Decimal,
        limit: Option<Decimal>,
    ) -> std::result::Result<TradeOutcome, TradeRejected> {
        let market_price = self
            .deps
            .market
            .last_price(&self.symbol)
            .or(limit)
            .ok_or_else(|| TradeRejected::NoPrice(self.symbol.clone()))?;

        let outcome = {
            let mut guard = self.core.lock().await;
            self.execute(&mut guard, side, quantity, limit, market_price)
                .await?
        };
        self.publish_update().await;
        Ok(outcome)
    }

    /// Risk-check and send one order; fills are booked immediately
    async fn execute(
        &self,
        core: &mut Core,
        side: Side,
        quantity: Decimal,
        limit: Option<Decimal>,
        market_price: Decimal,
    ) -> std::result::Result<TradeOutcome, TradeRejected> {
        if quantity <= Decimal::ZERO {
            return Err(TradeRejected::InvalidQuantity);
        }
        let order = match limit {
            Some(price) => Order::limit(&self.symbol, side, quantity, price),
            None => Order::market(&self.symbol, side, quantity),
        };

        let position = core.ledger.position(Some(market_price));
        core.risk.check_order(&order, Some(&position), market_price)?;

        let increases = core.ledger.quantity() * side.sign() >= Decimal::ZERO;
        if side == Side::Buy && increases {
            let capital = core.risk.capital_info();
            let notional = order.notional(market_price);
            if notional > capital.remaining_capital {
                let rejection = RiskRejection::new(
                    RiskCheckType::Capital,
                    format!(
                        "order value {} exceeds remaining capital {}",
                        notional, capital.remaining_capital
                    ),
                );
                warn!(
                    "[RISK REJECTED] {} {} {}: {}",
                    self.symbol, side, quantity, rejection.reason
                );
                return Err(rejection.into());
            }
        }

        match self.deps.executor.execute(&order, market_price).await? {
            Execution::Filled { price, quantity } => {
                let record = self.record_fill(core, side, quantity, price).await;
                Ok(TradeOutcome::Filled(record))
            }
            Execution::Accepted { exchange_order_id } => {
                let client_order_id = order.client_order_id();
                core.orders.track(order);
                core.orders
                    .mark_submitted(&client_order_id, &exchange_order_id);
                info!(
                    "[strategy:{}:{}] {} {} submitted as {}",
                    self.name, self.symbol, side, quantity, exchange_order_id
                );
                Ok(TradeOutcome::Submitted {
                    client_order_id,
                    exchange_order_id,
                })
            }
        }
    }

    /// Book a fill: ledger, trade log, risk counters, persisted state
    async fn record_fill(
        &self,
        core: &mut Core,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> TradeRecord {
        let record = core
            .ledger
            .apply_fill(side, quantity, price, self.config.commission_rate);

        if let Err(e) = self.deps.store.append_trade_record(&record).await {
            error!("[strategy:{}:{}] failed to append trade: {}", self.name, self.symbol, e);
        }
        if let Err(rejection) = core.risk.update_pnl(record.realized_pnl) {
            warn!("[strategy:{}:{}] {}", self.name, self.symbol, rejection.reason);
        }
        core.risk.update_used_capital(core.ledger.position_value());
        core.last_trade = Some(record.clone());
        let state = self.state(core, Some(price));
        self.persist(state).await;

        info!(
            "[strategy:{}:{}] {} {} @ {} realized={} position={}",
            self.name,
            self.symbol,
            side,
            quantity,
            price,
            record.realized_pnl,
            core.ledger.quantity()
        );
        record
    }

    async fn on_account_update(&self, update: AccountUpdate) {
        let AccountUpdate::Order(update) = update else {
            trace!("[strategy:{}:{}] balance update ignored", self.name, self.symbol);
            return;
        };
        if update.symbol != self.symbol {
            return;
        }

        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        if !update.is_fill() {
            let status = update.status();
            if matches!(status, OrderStatus::Cancelled | OrderStatus::Failed) {
                core.orders.finish(&update.client_order_id, status);
            }
            return;
        }
        let Some(price) = update.fill_price else {
            warn!(
                "[strategy:{}:{}] fill without price for {}",
                self.name, self.symbol, update.exchange_order_id
            );
            return;
        };

        core.orders
            .apply_fill(&update.client_order_id, update.fill_size, price);
        self.record_fill(core, update.side, update.fill_size, price)
            .await;
        drop(guard);
        self.publish_update().await;
    }
}

async fn next_account_update(account: &mut Option<AccountRx>) -> Option<AccountUpdate> {
    match account {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_polling(
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
    mut account: Option<AccountRx>,
) -> Option<AccountRx> {
    let period = shared.config.tick_interval();
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            update = next_account_update(&mut account) => match update {
                Some(update) => shared.on_account_update(update).await,
                None => {
                    debug!("[strategy:{}:{}] account stream closed", shared.name, shared.symbol);
                    account = None;
                }
            },

            _ = interval.tick() => {
                let outcome = AssertUnwindSafe(shared.tick()).catch_unwind().await;
                let failure = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(payload) => {
                        Some(StrategyError::Panicked(panic_message(payload.as_ref())).to_string())
                    }
                };
                if let Some(reason) = failure {
                    error!("[strategy:{}:{}] tick failed: {}", shared.name, shared.symbol, reason);
                    shared.fail(reason).await;
                    break;
                }
            }
        }
    }
    account
}
