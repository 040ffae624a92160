//! Inbound frame classification and decoding
//!
//! Every text frame is one of: the bare `pong` heartbeat reply, an event
//! (`login`, `subscribe`, `unsubscribe`, `error`), a response to an id-tagged
//! request, or a data push `{"arg": {"channel": ..}, "data": [..]}`.
//! Numbers arrive as strings; empty strings mean "absent".

use chrono::{DateTime, Utc};
use meridian_core::{BookLevel, Candle, CandleInterval, Side, Ticker, Trade};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::error::{GatewayError, Result};
use crate::messages::{
    BalanceUpdate, BookAction, BookUpdate, CandleUpdate, InboundMessage, OrderUpdate, Response,
};

/// What a text frame turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Pong,
    Login { code: String, msg: String },
    Response(Response),
    Message(InboundMessage),
}

#[derive(Deserialize)]
struct Envelope {
    event: Option<String>,
    code: Option<String>,
    msg: Option<String>,
    id: Option<String>,
    arg: Option<Map<String, Value>>,
    action: Option<String>,
    data: Option<Value>,
}

pub fn classify(text: &str) -> Result<Classified> {
    if text == "pong" {
        return Ok(Classified::Pong);
    }

    let envelope: Envelope = serde_json::from_str(text)?;
    let code = envelope.code.clone().unwrap_or_default();
    let msg = envelope.msg.clone().unwrap_or_default();

    if let Some(event) = envelope.event.as_deref() {
        return match event {
            "login" => Ok(Classified::Login { code, msg }),
            "error" => Ok(Classified::Message(InboundMessage::Error { code, msg })),
            "subscribe" | "unsubscribe" | "channel-conn-count" => {
                let arg = envelope.arg.unwrap_or_default();
                Ok(Classified::Message(InboundMessage::SubscriptionAck {
                    event: event.to_string(),
                    channel: string_field(&arg, "channel").unwrap_or_default(),
                    inst_id: string_field(&arg, "instId"),
                }))
            }
            other => Err(GatewayError::Parse(format!("unknown event '{}'", other))),
        };
    }

    if envelope.id.is_some() && envelope.arg.is_none() {
        let response: Response = serde_json::from_str(text)?;
        return Ok(Classified::Response(response));
    }

    let arg = envelope
        .arg
        .ok_or_else(|| GatewayError::Parse("message has no arg, event or id".into()))?;
    let channel = string_field(&arg, "channel")
        .ok_or_else(|| GatewayError::Parse("push without channel".into()))?;
    let data = envelope
        .data
        .ok_or_else(|| GatewayError::Parse(format!("{} push without data", channel)))?;

    parse_push(&channel, &arg, envelope.action.as_deref(), data).map(Classified::Message)
}

fn parse_push(
    channel: &str,
    arg: &Map<String, Value>,
    action: Option<&str>,
    data: Value,
) -> Result<InboundMessage> {
    match channel {
        "tickers" => {
            let raw: Vec<RawTicker> = serde_json::from_value(data)?;
            let ticker = raw
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::Parse("empty ticker push".into()))?
                .into_ticker()?;
            Ok(InboundMessage::Ticker(ticker))
        }
        "books" | "books5" | "books50-l2-tbt" | "books-l2-tbt" | "bbo-tbt" => {
            let symbol = string_field(arg, "instId")
                .ok_or_else(|| GatewayError::Parse("book push without instId".into()))?;
            let raw: Vec<RawBook> = serde_json::from_value(data)?;
            let book = raw
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::Parse("empty book push".into()))?;
            // Depth-limited channels always push full books
            let action = match action {
                Some("update") => BookAction::Update,
                _ => BookAction::Snapshot,
            };
            Ok(InboundMessage::Book(book.into_update(symbol, action)?))
        }
        "trades" => {
            let raw: Vec<RawTrade> = serde_json::from_value(data)?;
            let trades = raw
                .into_iter()
                .map(RawTrade::into_trade)
                .collect::<Result<Vec<_>>>()?;
            Ok(InboundMessage::Trades(trades))
        }
        "orders" => {
            let raw: Vec<RawOrder> = serde_json::from_value(data)?;
            let orders = raw
                .into_iter()
                .map(RawOrder::into_update)
                .collect::<Result<Vec<_>>>()?;
            Ok(InboundMessage::Orders(orders))
        }
        "account" => {
            let raw: Vec<RawAccount> = serde_json::from_value(data)?;
            let balances = raw
                .into_iter()
                .flat_map(|account| account.details)
                .map(RawBalance::into_update)
                .collect::<Result<Vec<_>>>()?;
            Ok(InboundMessage::Balances(balances))
        }
        c if c.starts_with("candle") => {
            let interval = CandleInterval::from_channel(c)
                .ok_or_else(|| GatewayError::Parse(format!("unknown candle channel '{}'", c)))?;
            let symbol = string_field(arg, "instId")
                .ok_or_else(|| GatewayError::Parse("candle push without instId".into()))?;
            let rows: Vec<Vec<String>> = serde_json::from_value(data)?;
            let candles = rows.iter().map(|row| parse_candle(row)).collect::<Result<Vec<_>>>()?;
            Ok(InboundMessage::Candles(CandleUpdate {
                symbol,
                interval,
                candles,
            }))
        }
        other => Err(GatewayError::Parse(format!("unhandled channel '{}'", other))),
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn decimal(field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| GatewayError::Parse(format!("{} '{}': {}", field, raw, e)))
}

fn optional_decimal(field: &str, raw: &str) -> Result<Option<Decimal>> {
    if raw.is_empty() {
        Ok(None)
    } else {
        decimal(field, raw).map(Some)
    }
}

fn millis(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| GatewayError::Parse(format!("bad timestamp '{}'", raw)))
}

/// `[px, sz, deprecated, order_count]`
fn parse_level(row: &[String]) -> Result<BookLevel> {
    let [price, size, rest @ ..] = row else {
        return Err(GatewayError::Parse(format!("short book level {:?}", row)));
    };
    let order_count = rest.get(1).and_then(|c| c.parse().ok()).unwrap_or(0);
    Ok(BookLevel {
        price: decimal("px", price)?,
        size: decimal("sz", size)?,
        order_count,
    })
}

/// `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`
fn parse_candle(row: &[String]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(GatewayError::Parse(format!("short candle row {:?}", row)));
    }
    Ok(Candle {
        timestamp: millis(&row[0])?,
        open: decimal("o", &row[1])?,
        high: decimal("h", &row[2])?,
        low: decimal("l", &row[3])?,
        close: decimal("c", &row[4])?,
        volume: decimal("vol", &row[5])?,
        confirmed: row.get(8).is_some_and(|c| c == "1"),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    inst_id: String,
    last: String,
    #[serde(default)]
    bid_px: String,
    #[serde(default)]
    ask_px: String,
    #[serde(default)]
    open24h: String,
    #[serde(default)]
    high24h: String,
    #[serde(default)]
    low24h: String,
    #[serde(default)]
    vol24h: String,
    ts: String,
}

impl RawTicker {
    fn into_ticker(self) -> Result<Ticker> {
        Ok(Ticker {
            last: decimal("last", &self.last)?,
            bid: optional_decimal("bidPx", &self.bid_px)?,
            ask: optional_decimal("askPx", &self.ask_px)?,
            open_24h: optional_decimal("open24h", &self.open24h)?.unwrap_or_default(),
            high_24h: optional_decimal("high24h", &self.high24h)?.unwrap_or_default(),
            low_24h: optional_decimal("low24h", &self.low24h)?.unwrap_or_default(),
            volume_24h: optional_decimal("vol24h", &self.vol24h)?.unwrap_or_default(),
            timestamp: millis(&self.ts)?,
            symbol: self.inst_id,
        })
    }
}

#[derive(Deserialize)]
struct RawBook {
    #[serde(default)]
    asks: Vec<Vec<String>>,
    #[serde(default)]
    bids: Vec<Vec<String>>,
    ts: String,
    #[serde(default)]
    checksum: Option<i64>,
}

impl RawBook {
    fn into_update(self, symbol: String, action: BookAction) -> Result<BookUpdate> {
        Ok(BookUpdate {
            symbol,
            action,
            bids: self.bids.iter().map(|r| parse_level(r)).collect::<Result<_>>()?,
            asks: self.asks.iter().map(|r| parse_level(r)).collect::<Result<_>>()?,
            checksum: self.checksum,
            timestamp: millis(&self.ts)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrade {
    inst_id: String,
    trade_id: String,
    px: String,
    sz: String,
    side: Side,
    ts: String,
}

impl RawTrade {
    fn into_trade(self) -> Result<Trade> {
        Ok(Trade {
            price: decimal("px", &self.px)?,
            size: decimal("sz", &self.sz)?,
            timestamp: millis(&self.ts)?,
            side: self.side,
            trade_id: self.trade_id,
            symbol: self.inst_id,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrder {
    inst_id: String,
    ord_id: String,
    #[serde(default)]
    cl_ord_id: String,
    side: Side,
    #[serde(default)]
    ord_type: String,
    #[serde(default)]
    px: String,
    #[serde(default)]
    sz: String,
    #[serde(default)]
    fill_px: String,
    #[serde(default)]
    fill_sz: String,
    #[serde(default)]
    acc_fill_sz: String,
    #[serde(default)]
    avg_px: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    fee: String,
    u_time: String,
}

impl RawOrder {
    fn into_update(self) -> Result<OrderUpdate> {
        Ok(OrderUpdate {
            price: optional_decimal("px", &self.px)?,
            size: optional_decimal("sz", &self.sz)?.unwrap_or_default(),
            fill_price: optional_decimal("fillPx", &self.fill_px)?,
            fill_size: optional_decimal("fillSz", &self.fill_sz)?.unwrap_or_default(),
            accumulated_fill_size: optional_decimal("accFillSz", &self.acc_fill_sz)?
                .unwrap_or_default(),
            avg_price: optional_decimal("avgPx", &self.avg_px)?,
            fee: optional_decimal("fee", &self.fee)?,
            updated_at: millis(&self.u_time)?,
            symbol: self.inst_id,
            exchange_order_id: self.ord_id,
            client_order_id: self.cl_ord_id,
            side: self.side,
            order_type: self.ord_type,
            state: self.state,
        })
    }
}

#[derive(Deserialize)]
struct RawAccount {
    #[serde(default)]
    details: Vec<RawBalance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBalance {
    ccy: String,
    #[serde(default)]
    cash_bal: String,
    #[serde(default)]
    avail_bal: String,
    #[serde(default)]
    eq: String,
    u_time: String,
}

impl RawBalance {
    fn into_update(self) -> Result<BalanceUpdate> {
        Ok(BalanceUpdate {
            cash_balance: optional_decimal("cashBal", &self.cash_bal)?.unwrap_or_default(),
            available_balance: optional_decimal("availBal", &self.avail_bal)?.unwrap_or_default(),
            equity: optional_decimal("eq", &self.eq)?.unwrap_or_default(),
            updated_at: millis(&self.u_time)?,
            currency: self.ccy,
        })
    }
}
