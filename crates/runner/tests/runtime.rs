//! Strategy runtime integration tests
//!
//! Drives a scripted strategy through the real runtime with paper fills, an
//! in-memory store and a manual clock. Tokio time is paused, so each tick
//! happens exactly when the test sleeps past it.

use async_trait::async_trait;
use chrono::Utc;
use meridian_clock::ManualClock;
use meridian_core::{Position, Side, StrategyState, StrategyStatus, Ticker};
use meridian_gateway::OrderUpdate;
use meridian_market::{AccountUpdate, MarketCacheConfig, MarketStateCache};
use meridian_risk_manager::RiskCheckType;
use meridian_runner::{
    EventPublisher, InMemoryStateStore, PaperExecutor, RuntimeConfig, RuntimeDeps, RuntimeError,
    RuntimeEvent, RuntimeEventKind, StrategyRuntime, TradeOutcome, TradeRejected,
};
use meridian_strategy::{Decision, Strategy, StrategyError, TickContext};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

const SYMBOL: &str = "BTC-USDT";
const NAME: &str = "scripted";

// ============================================================================
// Test doubles
// ============================================================================

enum Step {
    Decide(Decision),
    Fail(&'static str),
    Panic,
}

/// Shared handle to what the scripted strategy will do and has done
#[derive(Clone, Default)]
struct Script {
    steps: Arc<Mutex<VecDeque<Step>>>,
    decisions: Arc<AtomicUsize>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    refuse_start: Arc<AtomicBool>,
}

impl Script {
    fn push(&self, step: Step) {
        self.steps.lock().push_back(step);
    }

    fn decisions(&self) -> usize {
        self.decisions.load(Ordering::SeqCst)
    }
}

/// Plays back scripted steps, holding once the script runs out
struct ScriptedStrategy {
    script: Script,
}

#[async_trait]
impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        NAME
    }

    async fn on_start(&mut self, _symbol: &str) -> Result<(), StrategyError> {
        if self.script.refuse_start.load(Ordering::SeqCst) {
            return Err(StrategyError::Failed("not ready".into()));
        }
        self.script.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn decide(&mut self, _ctx: &TickContext<'_>) -> Result<Decision, StrategyError> {
        self.script.decisions.fetch_add(1, Ordering::SeqCst);
        let step = self.script.steps.lock().pop_front();
        match step {
            Some(Step::Decide(decision)) => Ok(decision),
            Some(Step::Fail(reason)) => Err(StrategyError::Failed(reason.into())),
            Some(Step::Panic) => panic!("strategy exploded"),
            None => Ok(Decision::hold("idle")),
        }
    }

    async fn on_stop(&mut self) -> Result<(), StrategyError> {
        self.script.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<RuntimeEvent>>,
}

impl RecordingPublisher {
    fn state_changes(&self) -> Vec<StrategyStatus> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == RuntimeEventKind::StateChange)
            .map(|e| e.snapshot.status)
            .collect()
    }

    fn update_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == RuntimeEventKind::Update)
            .count()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: RuntimeEvent) {
        self.events.lock().push(event);
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    runtime: StrategyRuntime,
    script: Script,
    store: Arc<InMemoryStateStore>,
    market: Arc<MarketStateCache>,
    events: Arc<RecordingPublisher>,
    clock: Arc<ManualClock>,
}

impl Harness {
    async fn new() -> Self {
        Self::build(RuntimeConfig::default(), Arc::new(InMemoryStateStore::new()), None).await
    }

    async fn build(
        config: RuntimeConfig,
        store: Arc<InMemoryStateStore>,
        account: Option<mpsc::UnboundedReceiver<AccountUpdate>>,
    ) -> Self {
        let _ = env_logger::try_init();
        let script = Script::default();
        let market = Arc::new(MarketStateCache::new(MarketCacheConfig::default()));
        let events = Arc::new(RecordingPublisher::default());
        let clock = Arc::new(ManualClock::at_ymd_hms(2024, 3, 1, 12, 0, 0));

        let deps = RuntimeDeps {
            store: store.clone(),
            executor: Arc::new(PaperExecutor::new()),
            market: market.clone(),
            events: events.clone(),
            clock: clock.clone(),
        };
        let strategy = Box::new(ScriptedStrategy {
            script: script.clone(),
        });
        let mut runtime = StrategyRuntime::new(SYMBOL, config, strategy, deps)
            .await
            .unwrap();
        if let Some(account) = account {
            runtime = runtime.with_account_updates(account);
        }

        Self {
            runtime,
            script,
            store,
            market,
            events,
            clock,
        }
    }

    fn set_price(&self, price: Decimal) {
        self.market.apply_ticker(Ticker {
            symbol: SYMBOL.to_string(),
            last: price,
            bid: None,
            ask: None,
            open_24h: price,
            high_24h: price,
            low_24h: price,
            volume_24h: dec!(1250),
            timestamp: Utc::now(),
        });
    }

    async fn quantity(&self) -> Decimal {
        self.runtime.snapshot().await.position.quantity
    }
}

/// Sleep past the next `n` ticks of the default 1s interval
async fn ticks(n: u64) {
    tokio::time::sleep(Duration::from_millis(1_000 * n + 100)).await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_and_stop_are_guarded() {
    let h = Harness::new().await;
    assert_eq!(h.runtime.status(), StrategyStatus::Stopped);
    assert_eq!(h.runtime.name(), NAME);

    h.runtime.start().await.unwrap();
    assert_eq!(h.runtime.status(), StrategyStatus::Running);
    assert_eq!(h.runtime.start().await, Err(RuntimeError::AlreadyRunning));

    h.runtime.stop().await.unwrap();
    assert_eq!(h.runtime.status(), StrategyStatus::Stopped);
    assert_eq!(h.runtime.stop().await, Err(RuntimeError::NotRunning));
    assert_eq!(
        h.runtime.pause().await,
        Err(RuntimeError::CannotPause(StrategyStatus::Stopped))
    );

    assert_eq!(h.script.starts.load(Ordering::SeqCst), 1);
    assert_eq!(h.script.stops.load(Ordering::SeqCst), 1);
    let saved = h.store.state(NAME, SYMBOL).unwrap();
    assert_eq!(saved.status, StrategyStatus::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_one_state_change_per_transition() {
    let h = Harness::new().await;

    h.runtime.start().await.unwrap();
    h.runtime.pause().await.unwrap();
    h.runtime.start().await.unwrap();
    h.runtime.stop().await.unwrap();

    assert_eq!(
        h.events.state_changes(),
        vec![
            StrategyStatus::Running,
            StrategyStatus::Paused,
            StrategyStatus::Running,
            StrategyStatus::Stopped,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_starts_spawn_one_task() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));

    let (a, b) = tokio::join!(h.runtime.start(), h.runtime.start());
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.contains(&Err(RuntimeError::AlreadyRunning)));
    assert_eq!(h.events.state_changes(), vec![StrategyStatus::Running]);
    assert_eq!(h.script.starts.load(Ordering::SeqCst), 1);

    // One task means one decision per tick
    ticks(2).await;
    assert_eq!(h.script.decisions(), 2);
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_on_start_leaves_status_unchanged() {
    let h = Harness::new().await;
    h.script.refuse_start.store(true, Ordering::SeqCst);

    let result = h.runtime.start().await;
    assert!(matches!(result, Err(RuntimeError::Strategy(StrategyError::Failed(_)))));
    assert_eq!(h.runtime.status(), StrategyStatus::Stopped);
    assert!(h.events.state_changes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pause_stops_ticking() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));

    h.runtime.start().await.unwrap();
    ticks(2).await;
    assert_eq!(h.script.decisions(), 2);

    h.runtime.pause().await.unwrap();
    ticks(3).await;
    assert_eq!(h.script.decisions(), 2);

    h.runtime.start().await.unwrap();
    ticks(1).await;
    assert_eq!(h.script.decisions(), 3);
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_no_mutation_after_stop_returns() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    for _ in 0..10 {
        h.script.push(Step::Decide(Decision::buy(Decimal::ONE, "keep buying")));
    }

    h.runtime.start().await.unwrap();
    ticks(3).await;
    h.runtime.stop().await.unwrap();

    let decisions = h.script.decisions();
    let trades = h.store.trade_count();
    let quantity = h.quantity().await;

    ticks(5).await;
    assert_eq!(h.script.decisions(), decisions);
    assert_eq!(h.store.trade_count(), trades);
    assert_eq!(h.quantity().await, quantity);
}

#[tokio::test(start_paused = true)]
async fn test_stop_just_before_a_tick() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Decide(Decision::buy(Decimal::ONE, "late")));

    h.runtime.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(999)).await;
    h.runtime.stop().await.unwrap();

    ticks(2).await;
    assert_eq!(h.script.decisions(), 0);
    assert_eq!(h.quantity().await, Decimal::ZERO);
    assert_eq!(h.store.trade_count(), 0);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failing_tick_moves_to_error() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Fail("feed went stale"));

    h.runtime.start().await.unwrap();
    ticks(1).await;

    assert_eq!(h.runtime.status(), StrategyStatus::Error);
    let error = h.runtime.last_error().unwrap();
    assert!(error.contains("feed went stale"), "{}", error);

    let saved = h.store.state(NAME, SYMBOL).unwrap();
    assert_eq!(saved.status, StrategyStatus::Error);
    assert_eq!(saved.last_error.as_deref(), Some(error.as_str()));
    assert_eq!(
        h.events.state_changes(),
        vec![StrategyStatus::Running, StrategyStatus::Error]
    );

    // Never restarted on its own
    let decisions = h.script.decisions();
    ticks(3).await;
    assert_eq!(h.script.decisions(), decisions);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_tick_is_contained_and_start_resumes() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Panic);

    h.runtime.start().await.unwrap();
    ticks(1).await;
    assert_eq!(h.runtime.status(), StrategyStatus::Error);
    assert!(h.runtime.last_error().unwrap().contains("strategy exploded"));

    h.runtime.start().await.unwrap();
    assert_eq!(h.runtime.status(), StrategyStatus::Running);
    assert_eq!(h.runtime.last_error(), None);

    ticks(1).await;
    assert_eq!(h.runtime.status(), StrategyStatus::Running);
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_external_failure_records_error() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));

    assert_eq!(
        h.runtime.fail("connection lost").await,
        Err(RuntimeError::NotRunning)
    );

    h.runtime.start().await.unwrap();
    ticks(1).await;
    h.runtime.fail("connection lost").await.unwrap();

    assert_eq!(h.runtime.status(), StrategyStatus::Error);
    assert_eq!(h.runtime.last_error().as_deref(), Some("connection lost"));
    let saved = h.store.state(NAME, SYMBOL).unwrap();
    assert_eq!(saved.status, StrategyStatus::Error);
    assert_eq!(saved.last_error.as_deref(), Some("connection lost"));
    assert_eq!(
        h.events.state_changes(),
        vec![StrategyStatus::Running, StrategyStatus::Error]
    );

    // The polling task is gone
    let decisions = h.script.decisions();
    ticks(3).await;
    assert_eq!(h.script.decisions(), decisions);

    h.runtime.start().await.unwrap();
    assert_eq!(h.runtime.last_error(), None);
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_from_error() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Fail("boom"));

    h.runtime.start().await.unwrap();
    ticks(1).await;
    assert_eq!(h.runtime.status(), StrategyStatus::Error);

    h.runtime.stop().await.unwrap();
    assert_eq!(h.runtime.status(), StrategyStatus::Stopped);
}

// ============================================================================
// Signals
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_confident_signal_opens_position() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Decide(Decision::buy(dec!(0.9), "breakout")));

    h.runtime.start().await.unwrap();
    ticks(1).await;

    assert_eq!(h.quantity().await, dec!(0.01));
    let trades = h.store.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].side, Side::Buy);
    assert_eq!(trades[0].price, dec!(40000));
    assert_eq!(trades[0].commission, dec!(0.4));

    let capital = h.runtime.capital_info().await;
    assert_eq!(capital.used_capital, dec!(400));
    assert!(h.events.update_count() >= 1);

    let saved = h.store.state(NAME, SYMBOL).unwrap();
    assert_eq!(saved.position.quantity, dec!(0.01));
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_low_confidence_signal_is_ignored() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Decide(Decision::buy(dec!(0.5), "maybe")));

    h.runtime.start().await.unwrap();
    ticks(1).await;

    assert_eq!(h.quantity().await, Decimal::ZERO);
    assert_eq!(h.store.trade_count(), 0);
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_no_price_skips_tick() {
    let h = Harness::new().await;
    h.script.push(Step::Decide(Decision::buy(Decimal::ONE, "blind")));

    h.runtime.start().await.unwrap();
    ticks(2).await;

    assert_eq!(h.script.decisions(), 0);
    assert_eq!(h.events.update_count(), 0);
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_zero_price_skips_tick() {
    let h = Harness::new().await;
    h.set_price(Decimal::ZERO);
    h.script.push(Step::Decide(Decision::buy(Decimal::ONE, "free coins")));

    h.runtime.start().await.unwrap();
    ticks(2).await;

    assert_eq!(h.runtime.status(), StrategyStatus::Running);
    assert_eq!(h.runtime.last_error(), None);
    assert_eq!(h.script.decisions(), 0);
    assert_eq!(h.store.trade_count(), 0);

    // Trading resumes once a real price arrives
    h.set_price(dec!(40000));
    ticks(1).await;
    assert_eq!(h.quantity().await, dec!(0.01));
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_opposite_signal_reverses_position() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Decide(Decision::buy(Decimal::ONE, "up")));

    h.runtime.start().await.unwrap();
    ticks(1).await;
    assert_eq!(h.quantity().await, dec!(0.01));

    h.set_price(dec!(41000));
    h.clock.advance(chrono::Duration::seconds(31));
    h.script.push(Step::Decide(Decision::sell(Decimal::ONE, "down")));
    ticks(1).await;

    let snapshot = h.runtime.snapshot().await;
    assert_eq!(snapshot.position.quantity, dec!(-0.01));
    assert_eq!(snapshot.position.avg_price, dec!(41000));
    assert_eq!(snapshot.realized_pnl, dec!(10));

    let sides: Vec<Side> = h.store.trades().iter().map(|t| t.side).collect();
    assert_eq!(sides, vec![Side::Buy, Side::Sell, Side::Sell]);
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_same_side_signal_is_ignored_when_positioned() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Decide(Decision::buy(Decimal::ONE, "up")));

    h.runtime.start().await.unwrap();
    ticks(1).await;

    h.clock.advance(chrono::Duration::seconds(31));
    h.script.push(Step::Decide(Decision::buy(Decimal::ONE, "still up")));
    ticks(1).await;

    assert_eq!(h.quantity().await, dec!(0.01));
    assert_eq!(h.store.trade_count(), 1);
    h.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_minimum_trade_interval() {
    let h = Harness::new().await;
    h.set_price(dec!(40000));
    h.script.push(Step::Decide(Decision::buy(Decimal::ONE, "up")));
    h.script.push(Step::Decide(Decision::sell(Decimal::ONE, "down")));

    h.runtime.start().await.unwrap();
    ticks(2).await;

    // The sell came 1s after the buy on the runtime clock
    assert_eq!(h.quantity().await, dec!(0.01));
    assert_eq!(h.store.trade_count(), 1);
    h.runtime.stop().await.unwrap();
}

// ============================================================================
// Persistence and fills
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_restores_ledger_and_capital_from_store() {
    let store = Arc::new(InMemoryStateStore::new());
    let mut state = StrategyState::new(NAME, SYMBOL);
    state.position = Position {
        quantity: dec!(0.05),
        avg_price: dec!(40000),
        ..Position::flat(SYMBOL)
    };
    state.total_pnl = dec!(12.5);
    state.total_commission = dec!(3);
    state.status = StrategyStatus::Running;
    state.last_error = Some("previous crash".into());
    store.insert_state(state);

    let h = Harness::build(RuntimeConfig::default(), store, None).await;

    assert_eq!(h.runtime.status(), StrategyStatus::Stopped);
    assert_eq!(h.runtime.last_error().as_deref(), Some("previous crash"));
    let snapshot = h.runtime.snapshot().await;
    assert_eq!(snapshot.position.quantity, dec!(0.05));
    assert_eq!(snapshot.realized_pnl, dec!(12.5));
    assert_eq!(snapshot.total_commission, dec!(3));
    assert_eq!(h.runtime.capital_info().await.used_capital, dec!(2000));
}

fn order_update(
    symbol: &str,
    state: &str,
    fill_size: Decimal,
    fill_price: Option<Decimal>,
) -> OrderUpdate {
    OrderUpdate {
        symbol: symbol.to_string(),
        exchange_order_id: "6120598410".to_string(),
        client_order_id: "m1".to_string(),
        side: Side::Buy,
        order_type: "market".to_string(),
        price: None,
        size: dec!(0.02),
        fill_price,
        fill_size,
        accumulated_fill_size: fill_size,
        avg_price: fill_price,
        state: state.to_string(),
        fee: None,
        updated_at: Utc::now(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_account_fills_reach_the_ledger() {
    let (tx, rx) = mpsc::unbounded_channel();
    let h = Harness::build(
        RuntimeConfig::default(),
        Arc::new(InMemoryStateStore::new()),
        Some(rx),
    )
    .await;
    h.runtime.start().await.unwrap();

    let fills = [
        order_update(SYMBOL, "live", Decimal::ZERO, None),
        order_update("ETH-USDT", "filled", dec!(1), Some(dec!(2500))),
        order_update(SYMBOL, "filled", dec!(0.02), Some(dec!(40000))),
    ];
    for update in fills {
        tx.send(AccountUpdate::Order(update)).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.quantity().await, dec!(0.02));
    let trades = h.store.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, dec!(40000));

    // The receiver survives a stop/start cycle
    h.runtime.stop().await.unwrap();
    h.runtime.start().await.unwrap();
    let mut close = order_update(SYMBOL, "filled", dec!(0.02), Some(dec!(40500)));
    close.side = Side::Sell;
    tx.send(AccountUpdate::Order(close)).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let snapshot = h.runtime.snapshot().await;
    assert_eq!(snapshot.position.quantity, Decimal::ZERO);
    assert_eq!(snapshot.realized_pnl, dec!(10));
    h.runtime.stop().await.unwrap();
}

// ============================================================================
// Manual trades
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_manual_trades() {
    let h = Harness::new().await;

    assert_eq!(
        h.runtime.buy(dec!(0.01), None).await,
        Err(TradeRejected::NoPrice(SYMBOL.to_string()))
    );

    h.set_price(dec!(40000));
    assert_eq!(
        h.runtime.buy(Decimal::ZERO, None).await,
        Err(TradeRejected::InvalidQuantity)
    );

    // 1 BTC is far above the maximum order value
    match h.runtime.buy(Decimal::ONE, None).await {
        Err(TradeRejected::Risk(rejection)) => {
            assert_eq!(rejection.check, RiskCheckType::MaxOrderValue)
        }
        other => panic!("expected a risk rejection, got {:?}", other),
    }
    assert_eq!(h.store.trade_count(), 0);

    let outcome = h.runtime.buy(dec!(0.02), Some(dec!(39900))).await.unwrap();
    let TradeOutcome::Filled(record) = outcome else {
        panic!("paper fills are immediate");
    };
    assert_eq!(record.price, dec!(39900));
    assert_eq!(h.quantity().await, dec!(0.02));
    assert_eq!(h.events.update_count(), 1);

    h.runtime.sell(dec!(0.02), None).await.unwrap();
    let snapshot = h.runtime.snapshot().await;
    assert_eq!(snapshot.position.quantity, Decimal::ZERO);
    assert_eq!(snapshot.realized_pnl, dec!(2));
}

#[tokio::test(start_paused = true)]
async fn test_buy_beyond_remaining_capital_is_refused() {
    let store = Arc::new(InMemoryStateStore::new());
    let mut state = StrategyState::new(NAME, SYMBOL);
    state.position = Position {
        quantity: dec!(0.17),
        avg_price: dec!(40000),
        ..Position::flat(SYMBOL)
    };
    store.insert_state(state);

    let mut config = RuntimeConfig::default();
    config.risk.max_position_value = dec!(20000);
    let h = Harness::build(config, store, None).await;
    h.set_price(dec!(40000));

    // 7000 deployable, 6800 in use
    assert_eq!(h.runtime.capital_info().await.remaining_capital, dec!(200));
    match h.runtime.buy(dec!(0.01), None).await {
        Err(TradeRejected::Risk(rejection)) => {
            assert_eq!(rejection.check, RiskCheckType::Capital)
        }
        other => panic!("expected a capital rejection, got {:?}", other),
    }

    // Reducing is not limited by remaining capital
    h.runtime.sell(dec!(0.01), None).await.unwrap();
    assert_eq!(h.quantity().await, dec!(0.16));
}

// ============================================================================
// Strategies that are not Sync
// ============================================================================

/// Counts ticks in a `Cell`, so it is `Send` but not `Sync`
struct CellCounter {
    seen: Cell<u32>,
    decisions: Arc<AtomicUsize>,
}

#[async_trait]
impl Strategy for CellCounter {
    fn name(&self) -> &str {
        "cell-counter"
    }

    async fn decide(&mut self, _ctx: &TickContext<'_>) -> Result<Decision, StrategyError> {
        self.seen.set(self.seen.get() + 1);
        self.decisions.fetch_add(1, Ordering::SeqCst);
        if self.seen.get() == 1 {
            Ok(Decision::buy(Decimal::ONE, "first tick"))
        } else {
            Ok(Decision::hold("counted"))
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_runs_strategy_that_is_only_send() {
    let _ = env_logger::try_init();
    let market = Arc::new(MarketStateCache::new(MarketCacheConfig::default()));
    let store = Arc::new(InMemoryStateStore::new());
    let decisions = Arc::new(AtomicUsize::new(0));
    let deps = RuntimeDeps {
        store: store.clone(),
        executor: Arc::new(PaperExecutor::new()),
        market: market.clone(),
        events: Arc::new(RecordingPublisher::default()),
        clock: Arc::new(ManualClock::at_ymd_hms(2024, 3, 1, 12, 0, 0)),
    };
    let strategy = Box::new(CellCounter {
        seen: Cell::new(0),
        decisions: decisions.clone(),
    });
    let runtime = StrategyRuntime::new(SYMBOL, RuntimeConfig::default(), strategy, deps)
        .await
        .unwrap();
    market.apply_ticker(Ticker {
        symbol: SYMBOL.to_string(),
        last: dec!(40000),
        bid: None,
        ask: None,
        open_24h: dec!(40000),
        high_24h: dec!(40000),
        low_24h: dec!(40000),
        volume_24h: dec!(1250),
        timestamp: Utc::now(),
    });

    runtime.start().await.unwrap();
    ticks(2).await;
    runtime.stop().await.unwrap();

    assert_eq!(decisions.load(Ordering::SeqCst), 2);
    // The fill was persisted from inside the polling task
    let saved = store.state("cell-counter", SYMBOL).unwrap();
    assert_eq!(saved.position.quantity, dec!(0.01));
    assert_eq!(saved.status, StrategyStatus::Stopped);
}
