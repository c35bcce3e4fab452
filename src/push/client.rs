//! Push Client
//!
//! Keeps one WebSocket connection to the server's push endpoint open and
//! turns incoming frames into [`RemoteEvent`]s for the sync engine.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use super::error::PushError;
use super::messages::{ClientPush, ServerPush};
use crate::sync::RemoteEvent;

/// Push connection settings
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// WebSocket URL of the push endpoint
    pub url: String,
    /// Delay before the first reconnect attempt
    pub initial_backoff: Duration,
    /// Upper bound of the reconnect delay
    pub max_backoff: Duration,
    /// Keepalive interval
    pub ping_interval: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/api/ws".to_string(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// Derive the push URL from the HTTP base URL
pub fn push_url(base_url: &str, path: &str) -> Result<String, PushError> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(PushError::InvalidUrl(base_url.to_string()));
    };

    Ok(format!("{}/{}", ws_base, path.trim_start_matches('/')))
}

/// Reconnecting push channel client
pub struct PushClient {
    config: PushConfig,
    session_id: String,
    token: watch::Receiver<Option<String>>,
    events: mpsc::Sender<RemoteEvent>,
}

impl PushClient {
    pub fn new(
        config: PushConfig,
        session_id: impl Into<String>,
        token: watch::Receiver<Option<String>>,
        events: mpsc::Sender<RemoteEvent>,
    ) -> Self {
        Self {
            config,
            session_id: session_id.into(),
            token,
            events,
        }
    }

    /// Connect, and reconnect with exponential backoff, until the receiving
    /// side of the event queue goes away
    pub async fn run(mut self) {
        let mut attempt: u32 = 0;
        let mut connected_before = false;

        while !self.events.is_closed() {
            match connect_async(self.config.url.as_str()).await {
                Ok((stream, _)) => {
                    attempt = 0;
                    tracing::info!(url = %self.config.url, "Push channel connected");

                    let result = self.serve(stream, connected_before).await;
                    connected_before = true;
                    match result {
                        Ok(()) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "Push channel lost");
                            if self.events.send(RemoteEvent::Disconnected).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        url = %self.config.url,
                        error = %e,
                        "Push connect failed"
                    );
                }
            }

            let delay = self.backoff(attempt);
            attempt = attempt.saturating_add(1);
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Reconnecting push channel");
            tokio::time::sleep(delay).await;
        }

        tracing::info!("Push client stopped");
    }

    /// Reconnect delay for the given attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.config
            .initial_backoff
            .saturating_mul(factor)
            .min(self.config.max_backoff)
    }

    /// Drive one connection. `Ok` means the engine is gone and the client
    /// should stop; `Err` means the transport dropped.
    async fn serve<S>(&mut self, stream: S, reconnect: bool) -> Result<(), PushError>
    where
        S: futures_util::Stream<Item = Result<Message, tungstenite::Error>>
            + Sink<Message, Error = tungstenite::Error>
            + Unpin,
    {
        let (mut sink, mut source) = stream.split();

        send(&mut sink, &self.auth_message()).await?;
        if self.events.send(RemoteEvent::Connected { reconnect }).await.is_err() {
            return Ok(());
        }

        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.tick().await;

        loop {
            tokio::select! {
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if !dispatch(&self.events, &text).await {
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Err(PushError::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
                changed = self.token.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    tracing::debug!("Session token changed, re-authenticating push channel");
                    send(&mut sink, &self.auth_message()).await?;
                }
                _ = ping.tick() => send(&mut sink, &ClientPush::Ping).await?,
            }
        }
    }

    fn auth_message(&mut self) -> ClientPush {
        ClientPush::Auth {
            token: self.token.borrow_and_update().clone(),
            session_id: self.session_id.clone(),
        }
    }
}

async fn send<S>(sink: &mut S, message: &ClientPush) -> Result<(), PushError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

/// Forward one text frame. Returns false once the engine is gone.
async fn dispatch(events: &mpsc::Sender<RemoteEvent>, text: &str) -> bool {
    match serde_json::from_str::<ServerPush>(text) {
        Ok(message) => match message.into_event() {
            Some(event) => events.send(event).await.is_ok(),
            None => true,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed push message");
            true
        }
    }
}
