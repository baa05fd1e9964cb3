//! Reconnecting market data stream over `gloo_net` websockets.

use super::dto::{ControlMessage, StreamMessage};
use crate::config::StreamConfig;
use crate::domain::logging::{LogComponent, get_logger};
use crate::{log_debug, log_warn};
use derive_more::Display;
use futures::{SinkExt, StreamExt, select};
use gloo_net::websocket::{Message, State, WebSocketError, futures::WebSocket};
use serde::Serialize;
use std::time::Duration;

/// Close code of a deliberate shutdown. Any other close reconnects.
pub const NORMAL_CLOSURE: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    #[display(fmt = "disconnected")]
    Disconnected,
    #[display(fmt = "connecting")]
    Connecting,
    #[display(fmt = "connected")]
    Connected,
    #[display(fmt = "reconnecting")]
    Reconnecting,
    #[display(fmt = "error")]
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(StreamStatus),
    Message(StreamMessage),
}

/// Exponential backoff: `base * 2^attempt`, capped, for a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            base_ms: config.reconnect_interval_ms,
            max_delay_ms: config.max_reconnect_delay_ms,
            max_attempts: config.max_reconnect_attempts,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Delay before the next attempt, counting it. `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let factor = 2u64.checked_pow(self.attempts).unwrap_or(u64::MAX);
        let delay = self.base_ms.saturating_mul(factor).min(self.max_delay_ms);
        self.attempts += 1;
        Some(Duration::from_millis(delay))
    }
}

pub fn should_reconnect(close_code: u16) -> bool {
    close_code != NORMAL_CLOSURE
}

/// What the run loop does after a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    Stop,
    Retry(Duration),
    GiveUp,
}

/// Attempt bookkeeping for the run loop. Backoff only resets once a socket has
/// actually opened, so a server that never accepts runs out of attempts.
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    policy: ReconnectPolicy,
}

impl ConnectionSupervisor {
    pub fn new(config: &StreamConfig) -> Self {
        Self { policy: ReconnectPolicy::new(config) }
    }

    pub fn attempts(&self) -> u32 {
        self.policy.attempts()
    }

    /// Status to announce when a connection attempt starts.
    pub fn attempt_status(&self) -> StreamStatus {
        if self.policy.attempts() == 0 { StreamStatus::Connecting } else { StreamStatus::Reconnecting }
    }

    /// The handshake completed and the subscription went out.
    pub fn opened(&mut self) {
        self.policy.reset();
    }

    /// `close_code` is `None` when the socket failed, dropped, or never opened.
    pub fn session_ended(&mut self, close_code: Option<u16>) -> Reconnect {
        if let Some(code) = close_code {
            if !should_reconnect(code) {
                return Reconnect::Stop;
            }
        }
        match self.policy.next_delay() {
            Some(delay) => Reconnect::Retry(delay),
            None => Reconnect::GiveUp,
        }
    }
}

/// One subscription to one stream URL.
pub struct StreamClient {
    url: String,
    symbol: String,
    config: StreamConfig,
    status: StreamStatus,
}

impl StreamClient {
    pub fn new(url: impl Into<String>, symbol: impl Into<String>, config: StreamConfig) -> Self {
        Self { url: url.into(), symbol: symbol.into(), config, status: StreamStatus::Disconnected }
    }

    fn set_status<F: FnMut(StreamEvent)>(&mut self, status: StreamStatus, on_event: &mut F) {
        if self.status != status {
            self.status = status;
            on_event(StreamEvent::Status(status));
        }
    }

    /// Run until a normal close or until reconnect attempts are exhausted.
    /// Dropping the future (e.g. through an abort handle) closes the socket.
    pub async fn run<F: FnMut(StreamEvent)>(mut self, mut on_event: F) {
        let mut supervisor = ConnectionSupervisor::new(&self.config);

        loop {
            self.set_status(supervisor.attempt_status(), &mut on_event);

            let close_code = match WebSocket::open(&self.url) {
                Ok(mut socket) => {
                    if self.subscribe(&mut socket).await {
                        get_logger().info(
                            LogComponent::Infrastructure("StreamClient"),
                            &format!("Connected to {}", self.url),
                        );
                        supervisor.opened();
                        self.set_status(StreamStatus::Connected, &mut on_event);
                        self.session(socket, &mut on_event).await
                    } else {
                        log_warn!(LogComponent::Infrastructure("StreamClient"), "{} closed before opening", self.url);
                        None
                    }
                }
                Err(e) => {
                    get_logger().error(
                        LogComponent::Infrastructure("StreamClient"),
                        &format!("Failed to open {}: {e:?}", self.url),
                    );
                    None
                }
            };

            match supervisor.session_ended(close_code) {
                Reconnect::Stop => {
                    self.set_status(StreamStatus::Disconnected, &mut on_event);
                    return;
                }
                Reconnect::Retry(delay) => {
                    match close_code {
                        Some(code) => {
                            log_warn!(LogComponent::Infrastructure("StreamClient"), "Stream closed with code {}", code)
                        }
                        None => log_warn!(LogComponent::Infrastructure("StreamClient"), "Stream dropped"),
                    }
                    self.set_status(StreamStatus::Reconnecting, &mut on_event);
                    log_debug!(
                        LogComponent::Infrastructure("StreamClient"),
                        "Reconnect attempt {} in {:?}",
                        supervisor.attempts(),
                        delay
                    );
                    gloo_timers::future::sleep(delay).await;
                }
                Reconnect::GiveUp => {
                    get_logger().error(
                        LogComponent::Infrastructure("StreamClient"),
                        "Max reconnect attempts reached",
                    );
                    self.set_status(StreamStatus::Error, &mut on_event);
                    return;
                }
            }
        }
    }

    /// Waits for the handshake and sends the subscription. `false` when the
    /// socket failed instead of opening.
    async fn subscribe(&self, socket: &mut WebSocket) -> bool {
        let subscribe = ControlMessage::Subscribe { symbol: self.symbol.clone() };
        // the sink stays pending while the socket connects; an error event
        // releases it with the socket already closed
        match socket.send(Message::Text(subscribe.to_json())).await {
            Ok(()) => matches!(socket.state(), State::Open),
            Err(e) => {
                log_warn!(LogComponent::Infrastructure("StreamClient"), "Subscribe failed: {:?}", e);
                false
            }
        }
    }

    /// Pumps frames until the socket ends. Returns the close code of a close frame.
    async fn session<F: FnMut(StreamEvent)>(&self, socket: WebSocket, on_event: &mut F) -> Option<u16> {
        let (mut sink, stream) = socket.split();
        let mut stream = stream.fuse();

        let heartbeat_ms = u32::try_from(self.config.heartbeat_interval_ms).unwrap_or(u32::MAX);
        let mut heartbeat = gloo_timers::future::IntervalStream::new(heartbeat_ms).fuse();

        loop {
            select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text, on_event),
                    Some(Ok(Message::Bytes(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => self.dispatch(&text, on_event),
                        Err(_) => log_debug!(LogComponent::Infrastructure("StreamClient"), "Ignoring binary frame"),
                    },
                    Some(Err(WebSocketError::ConnectionClose(event))) => return Some(event.code),
                    Some(Err(e)) => {
                        get_logger().error(
                            LogComponent::Infrastructure("StreamClient"),
                            &format!("WebSocket error: {e:?}"),
                        );
                        return None;
                    }
                    None => return None,
                },
                _ = heartbeat.next() => {
                    if sink.send(Message::Text(ControlMessage::Ping.to_json())).await.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    fn dispatch<F: FnMut(StreamEvent)>(&self, text: &str, on_event: &mut F) {
        match StreamMessage::decode(text) {
            Ok(message) if message.is_heartbeat() => {}
            Ok(message) => on_event(StreamEvent::Message(message)),
            Err(e) => log_warn!(LogComponent::Infrastructure("StreamClient"), "{}", e),
        }
    }
}
