//! WebSocket connection to the watcher service.
//!
//! The loop owns the socket; the rest of the dashboard only sees
//! channels. Outbound frames are written fire-and-forget, inbound
//! frames are decoded and forwarded as [`WatchEvent`]s. Connection
//! loss is reported so the app can reset to unsubscribed-for-all, then
//! the loop reconnects with doubling backoff.

use futures_util::{SinkExt, StreamExt};
use repowatch_core::wire::{self, RefreshEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum WatchEvent {
    Connected,
    Disconnected,
    Refresh(RefreshEvent),
}

pub async fn hub_loop(
    watcher_url: Url,
    mut outbound: mpsc::Receiver<String>,
    events: mpsc::Sender<WatchEvent>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        let (mut ws, _) = match connect_async(watcher_url.clone()).await {
            Ok(value) => value,
            Err(err) => {
                warn!(event = "watcher_connect_error", error = %err);
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                continue;
            }
        };
        backoff = INITIAL_BACKOFF;
        debug!(event = "watcher_connected", url = %watcher_url);
        if events.send(WatchEvent::Connected).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                inbound = ws.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            match wire::decode_event(&text) {
                                Ok(event) => {
                                    if events.send(WatchEvent::Refresh(event)).await.is_err() {
                                        return;
                                    }
                                }
                                // Non-fatal: drop the frame, keep the
                                // connection and all subscriptions.
                                Err(err) => warn!(event = "frame_discarded", error = %err),
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(event = "watcher_read_error", error = %err);
                            break;
                        }
                        None => break,
                    }
                }
                request = outbound.recv() => {
                    match request {
                        Some(frame) => {
                            if ws.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        // App side is gone, shut the loop down.
                        None => {
                            let _ = ws.close(None).await;
                            return;
                        }
                    }
                }
            }
        }

        let _ = ws.close(None).await;
        warn!(event = "watcher_disconnected", url = %watcher_url);
        if events.send(WatchEvent::Disconnected).await.is_err() {
            return;
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
