//! meridian - run one strategy against the venue
//!
//! Usage: meridian [--config <path>] [--symbol BTC-USDT] [--strategy ma_cross] [--testnet]

use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use meridian_broadcast::{BroadcastFanout, Sink, SinkError};
use meridian_clock::SystemClock;
use meridian_core::{CandleInterval, StrategyStatus};
use meridian_gateway::{
    ClientEvent, Credentials, Endpoint, ExchangeClient, GatewayOrderExecutor, Subscription,
    WsConnector,
};
use meridian_market::{MarketDispatcher, MarketStateCache};
use meridian_ports::OrderExecutor;
use meridian_runner::{
    AppConfig, InMemoryStateStore, PaperExecutor, RuntimeDeps, RuntimeEvent, StrategyRuntime,
    load_config, load_default_config,
};
use meridian_strategy::StrategyConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "meridian", about = "Strategy runtime for the OKX websocket API")]
struct Args {
    /// JSON config file; the embedded defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    symbol: Option<String>,

    /// Strategy kind: price_change or ma_cross
    #[arg(long)]
    strategy: Option<String>,

    /// Use the demo-trading endpoints
    #[arg(long)]
    testnet: bool,
}

/// Writes every runtime event to the log
struct LogSink;

#[async_trait]
impl Sink<RuntimeEvent> for LogSink {
    async fn deliver(&self, event: RuntimeEvent) -> Result<(), SinkError> {
        let s = &event.snapshot;
        info!(
            "[{}:{}] {:?} status={} position={} realized={} unrealized={}",
            s.strategy_name,
            s.symbol,
            event.kind,
            s.status,
            s.position.quantity,
            s.realized_pnl,
            s.unrealized_pnl
        );
        Ok(())
    }
}

fn load(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_default_config()?,
    };

    if let Some(symbol) = &args.symbol {
        config.symbol = symbol.clone();
    }
    if let Some(kind) = &args.strategy {
        match StrategyConfig::from_kind(kind) {
            Some(strategy) => config.runtime.strategy = strategy,
            None => bail!("unknown strategy '{}'", kind),
        }
    }
    if args.testnet {
        config.client.testnet = true;
    }
    if config.runtime.strategy.needs_advisor() {
        bail!(
            "strategy '{}' needs an advisor service, which this binary does not provide",
            config.runtime.strategy.kind()
        );
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load(&args)?;
    info!(
        "Starting meridian: {} with {} (testnet={}, live_execution={})",
        config.symbol,
        config.runtime.strategy.kind(),
        config.client.testnet,
        config.live_execution
    );

    let cache = Arc::new(MarketStateCache::new(config.market.clone()));
    let dispatcher = Arc::new(MarketDispatcher::new(cache.clone()));
    let account_updates = dispatcher.subscribe_orders(&config.symbol);

    let credentials = match Credentials::from_env() {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("No API credentials ({}), private channels disabled", e);
            None
        }
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let exchange = ExchangeClient::new(
        &config.client,
        credentials,
        Arc::new(WsConnector::new()),
        dispatcher.clone(),
        Some(events_tx),
    );
    exchange.connect_all().await.context("connecting to the venue")?;

    let symbol = config.symbol.as_str();
    for subscription in [
        Subscription::ticker(symbol),
        Subscription::books(symbol),
        Subscription::trades(symbol),
        Subscription::candles(symbol, CandleInterval::OneMinute),
    ] {
        exchange.subscribe(subscription).await?;
    }
    if exchange.has_private() {
        exchange.subscribe(Subscription::orders("SPOT")).await?;
    }

    let executor: Arc<dyn OrderExecutor> = match exchange.client(Endpoint::Private) {
        Some(private) if config.live_execution => {
            info!("Live execution through the private endpoint");
            Arc::new(GatewayOrderExecutor::new(private))
        }
        _ => {
            if config.live_execution {
                warn!("Live execution requested without credentials, using paper fills");
            }
            Arc::new(PaperExecutor::new())
        }
    };

    let fanout = Arc::new(BroadcastFanout::<RuntimeEvent>::new(config.fanout.clone()));
    fanout.subscribe(symbol, Arc::new(LogSink));

    let strategy = config.runtime.strategy.build(None)?;
    let deps = RuntimeDeps {
        store: Arc::new(InMemoryStateStore::new()),
        executor,
        market: cache,
        events: fanout.clone(),
        clock: Arc::new(SystemClock::new()),
    };
    let runtime = StrategyRuntime::new(symbol, config.runtime.clone(), strategy, deps)
        .await?
        .with_account_updates(account_updates);
    runtime.start().await?;

    let failure = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break None;
            }
            Some((endpoint, event)) = events_rx.recv() => match event {
                ClientEvent::ConnectionLost(reason) => {
                    error!("[ws:{}] connection lost: {}", endpoint, reason);
                    break Some(format!("connection lost on {}: {}", endpoint, reason));
                }
                ClientEvent::AuthenticationFailed(reason) => {
                    error!("[ws:{}] authentication failed: {}", endpoint, reason);
                    break Some(format!("authentication failed on {}: {}", endpoint, reason));
                }
                other => info!("[ws:{}] {:?}", endpoint, other),
            },
        }
    };

    // A venue failure leaves the strategy in Error with the reason persisted
    let outcome = match (failure, runtime.status()) {
        (Some(reason), StrategyStatus::Running) => runtime.fail(reason).await,
        (_, StrategyStatus::Error) => Ok(()),
        _ => runtime.stop().await,
    };
    if let Err(e) = outcome {
        warn!("Stopping strategy: {}", e);
    }
    let snapshot = runtime.snapshot().await;
    info!(
        "Final position {} realized={} commission={}",
        snapshot.position.quantity, snapshot.realized_pnl, snapshot.total_commission
    );
    exchange.disconnect_all().await;
    fanout.shutdown().await;
    Ok(())
}
