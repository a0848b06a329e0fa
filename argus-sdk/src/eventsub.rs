//! EventSub session state machine.
//!
//! One [`EventSession`] lives for one WebSocket connection:
//!
//! ```text
//! Connecting → Welcomed → Subscribing → Active → Terminated
//! ```
//!
//! Subscriptions are registered once, right after the first
//! `session_welcome`. Revocation, a reconnect request or a dropped socket
//! end the session; redialing is left to the caller.

use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::config::ConnectionConfig;
use crate::event::{Event, Feed};
use crate::notification::{self, Notification, SUBSCRIPTION_TYPES};
use crate::registrar::{SubscriptionRegistrar, SubscriptionRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Welcomed,
    Subscribing,
    Active,
    Terminated,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Server revoked the session's subscriptions. Final.
    Revoked,
    /// Server asked the client to move to `reconnect_url`.
    ReconnectRequested { reconnect_url: Option<String> },
    /// The socket closed or failed.
    ConnectionLost { reason: String },
}

impl Termination {
    fn describe(&self) -> String {
        match self {
            Termination::Revoked => "session revoked".to_string(),
            Termination::ReconnectRequested { reconnect_url: Some(url) } => {
                format!("reconnect requested ({url})")
            }
            Termination::ReconnectRequested { reconnect_url: None } => "reconnect requested".to_string(),
            Termination::ConnectionLost { reason } => reason.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    metadata: Metadata,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    message_type: String,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    session: SessionInfo,
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    id: String,
    #[serde(default)]
    reconnect_url: Option<String>,
}

/// Per-connection EventSub state.
pub struct EventSession<'a> {
    config: &'a ConnectionConfig,
    registrar: &'a dyn SubscriptionRegistrar,
    event_tx: &'a mpsc::Sender<Event>,
    state: SessionState,
    session_id: String,
}

impl<'a> EventSession<'a> {
    pub fn new(
        config: &'a ConnectionConfig,
        registrar: &'a dyn SubscriptionRegistrar,
        event_tx: &'a mpsc::Sender<Event>,
    ) -> Self {
        Self {
            config,
            registrar,
            event_tx,
            state: SessionState::Connecting,
            session_id: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Empty until the session is welcomed.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Process one text frame.
    ///
    /// Undecodable frames are skipped. Returns `Break` once the session
    /// has reached [`SessionState::Terminated`].
    pub async fn handle_text(&mut self, text: &str) -> ControlFlow<Termination> {
        if self.state == SessionState::Terminated {
            return ControlFlow::Break(Termination::ConnectionLost {
                reason: "session already terminated".to_string(),
            });
        }

        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!("Skipping undecodable EventSub message: {e}");
                return ControlFlow::Continue(());
            }
        };

        match envelope.metadata.message_type.as_str() {
            "session_welcome" => self.on_welcome(envelope.payload).await,
            "session_keepalive" => tracing::debug!("Received keepalive message"),
            "notification" => self.on_notification(envelope.payload).await,
            "revocation" => {
                tracing::debug!("Received revocation. Session revoked");
                return self.terminate(Termination::Revoked);
            }
            "session_reconnect" => {
                let reconnect_url = serde_json::from_value::<SessionPayload>(envelope.payload)
                    .ok()
                    .and_then(|p| p.session.reconnect_url);
                tracing::debug!(?reconnect_url, "Received reconnect message");
                return self.terminate(Termination::ReconnectRequested { reconnect_url });
            }
            other => tracing::debug!("Received unhandled message type: {other}"),
        }
        ControlFlow::Continue(())
    }

    async fn on_welcome(&mut self, payload: serde_json::Value) {
        if self.state != SessionState::Connecting {
            tracing::debug!(
                "Ignoring repeated session welcome; already registered for session {}",
                self.session_id
            );
            return;
        }
        let payload: SessionPayload = match serde_json::from_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("Session welcome without a session id: {e}");
                return;
            }
        };

        self.session_id = payload.session.id;
        self.state = SessionState::Welcomed;
        tracing::debug!("Received session welcome. Session ID: {}", self.session_id);
        let _ = self
            .event_tx
            .send(Event::Welcomed {
                session_id: self.session_id.clone(),
            })
            .await;

        self.state = SessionState::Subscribing;
        for kind in SUBSCRIPTION_TYPES {
            let request = SubscriptionRequest::websocket(kind, &self.config.channel_id, &self.session_id);
            match self.registrar.register(&request).await {
                Ok(()) => tracing::debug!("Successfully subscribed to {kind}"),
                Err(e) => tracing::debug!("{e:#}"),
            }
        }

        self.state = SessionState::Active;
        let _ = self.event_tx.send(Event::ActivityFeedReady).await;
    }

    async fn on_notification(&mut self, payload: serde_json::Value) {
        match notification::decode(payload) {
            Ok(Notification::Unrecognized { subscription_type }) => {
                tracing::debug!("Ignoring notification of type {subscription_type}");
            }
            Ok(notification) => {
                let _ = self.event_tx.send(Event::Activity(notification)).await;
            }
            Err(e) => tracing::debug!("Dropping notification: {e:#}"),
        }
    }

    fn terminate(&mut self, termination: Termination) -> ControlFlow<Termination> {
        self.state = SessionState::Terminated;
        ControlFlow::Break(termination)
    }
}

/// Connect to EventSub and run one session until it terminates.
///
/// A failed dial is returned as an error; the caller should treat it as
/// fatal. Once connected this always returns the session's [`Termination`].
pub async fn connect(
    config: Arc<ConnectionConfig>,
    registrar: Arc<dyn SubscriptionRegistrar>,
    event_tx: mpsc::Sender<Event>,
) -> Result<Termination> {
    tracing::debug!("Connecting to EventSub at {}", config.eventsub_url);
    let (ws, _resp) = connect_async(config.eventsub_url.as_str())
        .await
        .with_context(|| format!("WebSocket connection error ({})", config.eventsub_url))?;
    tracing::debug!("Connected to EventSub");

    Ok(run_session(ws, &config, registrar.as_ref(), &event_tx).await)
}

/// Drive one session over an already-open WebSocket.
///
/// Frames are handled one at a time; registration calls made on welcome
/// hold up the next read until they finish.
pub async fn run_session<S>(
    mut ws: S,
    config: &ConnectionConfig,
    registrar: &dyn SubscriptionRegistrar,
    event_tx: &mpsc::Sender<Event>,
) -> Termination
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message> + Unpin,
{
    let mut session = EventSession::new(config, registrar, event_tx);

    let termination = loop {
        let Some(frame) = ws.next().await else {
            break Termination::ConnectionLost {
                reason: "stream ended".to_string(),
            };
        };
        match frame {
            Ok(Message::Text(text)) => {
                if let ControlFlow::Break(termination) = session.handle_text(&text).await {
                    break termination;
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = ws.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(frame)) => {
                break Termination::ConnectionLost {
                    reason: format!("closed by server: {frame:?}"),
                };
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Read error: {e}");
                break Termination::ConnectionLost { reason: e.to_string() };
            }
        }
    };

    session.state = SessionState::Terminated;
    let reason = termination.describe();
    tracing::debug!("EventSub connection closed: {reason}");
    let _ = event_tx
        .send(Event::Disconnected {
            feed: Feed::EventSub,
            reason,
        })
        .await;
    termination
}
