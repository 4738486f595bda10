//! Persistent duplex channel transport.
//!
//! One connection per conversation identifier. On any unexpected drop a
//! single reconnect is scheduled after a fixed delay; independently, a
//! liveness timeout abandons a connect attempt that never completes. The
//! loop keeps retrying for as long as the panel stays visible.

use anyhow::Result;
use colored::Colorize;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;

use assistchat_types::{ClientFrame, ServerFrame, LIVENESS_INTERVAL, RECONNECT_DELAY};

#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    pub reconnect_delay: Duration,
    pub liveness_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: RECONNECT_DELAY,
            liveness_interval: LIVENESS_INTERVAL,
        }
    }
}

/// What the channel reports back to the session.
#[derive(Debug)]
pub enum ChannelEvent {
    Opened,
    Frame(ServerFrame),
    Closed,
}

/// Derive the channel endpoint from the HTTP base URL.
pub fn channel_url(base_url: &str, conversation_id: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{base}")
    };
    format!("{ws_base}/ws/assistant/{conversation_id}/")
}

/// Run the channel until cancelled or until every peer handle is gone.
///
/// Outbound frames arrive over `outbound_rx`; parsed inbound frames and
/// open/close transitions are reported over `events`. Hiding the panel
/// closes the connection cleanly and pauses the loop until it is shown
/// again. The endpoint is re-read from `url_rx` before every dial, so a
/// conversation identifier re-created while the panel was closed takes
/// effect on the next connection.
pub async fn run_channel(
    url_rx: watch::Receiver<String>,
    config: ChannelConfig,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientFrame>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut visible: watch::Receiver<bool>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        // Panel hidden: leave the network alone until it is shown again.
        while !*visible.borrow() {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                changed = visible.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }

        let url = url_rx.borrow().clone();
        let attempt = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = connect_async(url.as_str()) => result,
            _ = tokio::time::sleep(config.liveness_interval) => {
                // Wedged connect attempt; the liveness check starts over.
                continue;
            }
        };

        let (ws, _) = match attempt {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("{}", format!("Channel connect failed: {}", e).bright_black());
                let _ = events.send(ChannelEvent::Closed);
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(config.reconnect_delay) => {}
                }
                continue;
            }
        };

        let _ = events.send(ChannelEvent::Opened);
        let (mut sink, mut stream) = ws.split();

        // None means a deliberate close (panel hidden); Some carries the
        // reason for an unexpected drop.
        let drop_reason: Option<String> = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Ok(());
                }
                changed = visible.changed() => {
                    if changed.is_err() || !*visible.borrow() {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break None;
                    }
                }
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let json = serde_json::to_string(&frame)?;
                            if let Err(e) = sink.send(WsMessage::Text(json)).await {
                                break Some(e.to_string());
                            }
                        }
                        None => {
                            // Every sender is gone; shut down cleanly.
                            let _ = sink.send(WsMessage::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            match serde_json::from_str::<ServerFrame>(&text) {
                                Ok(frame) => {
                                    let _ = events.send(ChannelEvent::Frame(frame));
                                }
                                Err(e) => {
                                    eprintln!(
                                        "{}",
                                        format!("Dropping malformed channel frame: {}", e)
                                            .bright_black()
                                    );
                                }
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            break Some("closed by server".to_string());
                        }
                        Some(Ok(_)) => {} // ping/pong/binary: nothing to render
                        Some(Err(e)) => break Some(e.to_string()),
                    }
                }
            }
        };

        if let Some(reason) = drop_reason {
            eprintln!("{}", format!("Channel dropped: {}", reason).bright_black());
            let _ = events.send(ChannelEvent::Closed);
            // Exactly one reconnect per drop, after the fixed delay.
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(config.reconnect_delay) => {}
            }
        }
    }
}
