//! Websocket connector backed by tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{Connector, Frame, FrameSink, FrameStream};
use crate::error::{GatewayError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        WsConnector
    }
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Control => Message::Pong(Default::default()),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
        Message::Close(_) => Some(Frame::Close),
        Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => Some(Frame::Control),
        Message::Frame(_) => None,
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream)> {
        let (ws_stream, _) = connect_async(url).await?;
        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(GatewayError::from)
            .with(|frame: Frame| future::ready(Ok::<_, GatewayError>(into_message(frame))));

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(message) => from_message(message).map(Ok),
                Err(e) => Some(Err(GatewayError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
