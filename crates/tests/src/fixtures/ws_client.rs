use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// A thin wrapper over a client-side WebSocket connection for driving the
/// signaling protocol in tests, the same "connect, send JSON, read JSON
/// back" shape the server itself uses over axum's split sink/stream.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(url: &str) -> Self {
        let (stream, _) = connect_async(url).await.expect("failed to connect websocket");
        Self { stream }
    }

    /// Sends `data`'s fields flattened alongside `type`, matching the wire
    /// protocol's internally tagged shape (`{"type":"...", ...fields}`, no
    /// nested `data` object).
    pub async fn send(&mut self, message_type: &str, data: Value) {
        let mut fields = match data {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => panic!("send() payload must be a JSON object, got: {other:?}"),
        };
        fields.insert("type".to_string(), Value::String(message_type.to_string()));
        self.stream
            .send(Message::Text(Value::Object(fields).to_string().into()))
            .await
            .expect("failed to send websocket message");
    }

    /// Reads the next JSON text frame, skipping ping/pong control frames.
    /// Times out rather than hanging forever if the server never replies.
    pub async fn recv(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str(&text).expect("server sent invalid JSON");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Ok(other)) => panic!("unexpected websocket message: {other:?}"),
                    Some(Err(e)) => panic!("websocket error: {e}"),
                    None => panic!("websocket closed before expected message"),
                }
            }
        })
        .await
        .expect("timed out waiting for websocket message")
    }

    /// Drains frames until the server closes the connection (or the stream
    /// ends), for tests that expect the channel to be torn down after an
    /// `error` frame (spec.md §6: auth failures close the channel).
    pub async fn expect_close(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Ok(other)) => panic!("expected websocket close, got: {other:?}"),
                    Some(Err(_)) => return,
                }
            }
        })
        .await
        .expect("timed out waiting for websocket close")
    }

    /// Reads frames until one matches `message_type`, discarding others.
    /// Real clients can't assume strict fan-out ordering across peers
    /// (spec.md §8 scenario 1's "if ordered before" hedge), so tests that
    /// care about a specific message look for it rather than asserting it's
    /// the very next frame.
    pub async fn recv_type(&mut self, message_type: &str) -> Value {
        loop {
            let value = self.recv().await;
            if value.get("type").and_then(Value::as_str) == Some(message_type) {
                return value;
            }
        }
    }
}
