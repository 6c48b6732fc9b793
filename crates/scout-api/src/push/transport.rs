// Websocket transport for the push channel, with auto-reconnect.
//
// Owns exactly one long-lived connection. Inbound frames are decoded and
// forwarded to the listener task over an mpsc channel; outbound frames
// (subscriptions) arrive over a command channel. Keepalive pings are
// answered here and never surface to the listener.
//
// Reconnection is this layer's responsibility: on any transport failure
// it backs off and redials. The server replays the handshake on every
// new connection, which is what lets the listener re-subscribe.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::protocol::{self, InboundFrame};
use crate::error::Error;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Backoff configuration for transport reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── Transport loop ───────────────────────────────────────────────────

/// Main loop: connect, pump frames until the connection drops, back off,
/// reconnect. Exits when cancelled or when the listener goes away.
pub(crate) async fn run(
    url: Url,
    inbound_tx: mpsc::Sender<InboundFrame>,
    mut outbound_rx: mpsc::Receiver<String>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_pump(&url, &inbound_tx, &mut outbound_rx, &cancel) => {
                match result {
                    Ok(PumpExit::ListenerGone) => break,
                    Ok(PumpExit::Disconnected) => {
                        tracing::info!("push connection closed cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "push transport error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(max_retries = max, "push reconnection limit reached, giving up");
                                break;
                            }
                        }

                        let delay = backoff_delay(attempt, &reconnect);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("push transport loop exiting");
}

enum PumpExit {
    /// Connection dropped; redial.
    Disconnected,
    /// The listener's inbound receiver is gone; stop for good.
    ListenerGone,
}

/// One connection lifecycle: dial, then pump frames both ways until the
/// stream ends or errors.
async fn connect_and_pump(
    url: &Url,
    inbound_tx: &mpsc::Sender<InboundFrame>,
    outbound_rx: &mut mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> Result<PumpExit, Error> {
    tracing::info!(url = %url, "connecting to push host");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::PushConnect(e.to_string()))?;
    let request = ClientRequestBuilder::new(uri);

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::PushConnect(e.to_string()))?;

    tracing::info!("push connection open");

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PumpExit::Disconnected),
            outbound = outbound_rx.recv() => {
                let Some(frame) = outbound else {
                    return Ok(PumpExit::ListenerGone);
                };
                write
                    .send(tungstenite::Message::text(frame))
                    .await
                    .map_err(|e| Error::PushConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        match protocol::decode(&text) {
                            Some(InboundFrame::Ping) => {
                                write
                                    .send(tungstenite::Message::text(protocol::encode_pong()))
                                    .await
                                    .map_err(|e| Error::PushConnect(e.to_string()))?;
                            }
                            Some(decoded) => {
                                if inbound_tx.send(decoded).await.is_err() {
                                    return Ok(PumpExit::ListenerGone);
                                }
                            }
                            None => {
                                tracing::trace!(frame = %&*text, "ignoring push frame");
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers websocket-level pings itself
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "push close frame");
                        }
                        return Ok(PumpExit::Disconnected);
                    }
                    Some(Err(e)) => {
                        return Err(Error::PushConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("push stream ended");
                        return Ok(PumpExit::Disconnected);
                    }
                    _ => {}
                }
            }
        }
    }
}

// ── Backoff ──────────────────────────────────────────────────────────

/// Exponential backoff capped at `max_delay`, with a small deterministic
/// spread seeded from the attempt number.
fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(16) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());
    let spread = 1.0 + 0.2 * (f64::from(attempt) * 3.7).sin();
    Duration::from_secs_f64((capped * spread).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────
