// ABOUTME: Connector abstraction that opens a text-message duplex to the analysis backend
// ABOUTME: WebSocket implementation over tokio-tungstenite with boxed sink and stream halves
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

/// Outbound half of an open connection
pub type WireSink = Pin<Box<dyn Sink<String, Error = AppError> + Send>>;

/// Inbound half of an open connection; ends when the peer closes
pub type WireStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// Opens fresh connections to the backend
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to `url`
    ///
    /// # Errors
    ///
    /// Returns a `ConnectionFailed` error when the handshake does not complete
    async fn connect(&self, url: &str) -> AppResult<(WireSink, WireStream)>;
}

/// Connector speaking the WebSocket protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> AppResult<(WireSink, WireStream)> {
        let (socket, response) = connect_async(url).await?;
        debug!(status = %response.status(), "WebSocket handshake completed");

        let (write, read) = socket.split();
        let sink = write
            .sink_map_err(AppError::from)
            .with(|text: String| future::ready(Ok::<_, AppError>(Message::Text(text))));
        let stream = read.filter_map(|item| {
            future::ready(match item {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(
                    String::from_utf8(bytes)
                        .map_err(|e| AppError::malformed_message(format!("binary frame: {e}"))),
                ),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Backend sent close frame");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(AppError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
