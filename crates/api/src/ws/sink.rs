use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use relaymesh_core::ClientSink;
use tokio::sync::Mutex;
use tracing::warn;

/// `ClientSink` implementation over a split axum websocket sink. A send
/// failure flips `closed` but does not itself tear anything down — per
/// spec.md §9, a failing channel is left to its own close path rather than
/// proactively closed from handler code.
pub struct AxumSink {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl AxumSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    /// Sends a close frame and marks the sink closed. Used to tear down a
    /// channel that was opened but must not proceed (spec.md §6: a bad auth
    /// token closes the channel only after the `error` frame is observed on
    /// the wire, so the upgrade itself cannot simply be refused).
    pub async fn close(&self) {
        let mut guard = self.sink.lock().await;
        let _ = guard.close().await;
        self.closed.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl ClientSink for AxumSink {
    async fn send_text(&self, payload: String) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        let mut guard = self.sink.lock().await;
        if let Err(e) = guard.send(Message::Text(payload.into())).await {
            warn!(%e, "websocket send failed");
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
