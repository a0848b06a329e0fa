//! EventSub subscription registration.
//!
//! Handles:
//! - The Helix `POST /eventsub/subscriptions` request body
//! - The `SubscriptionRegistrar` trait used by the session state machine
//! - `HelixRegistrar`: the real HTTP implementation

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;

/// Transport method for subscriptions delivered over the session socket.
pub const WEBSOCKET_TRANSPORT: &str = "websocket";

/// Body of a Helix create-subscription request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub condition: Condition,
    pub transport: Transport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub broadcaster_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transport {
    pub method: String,
    pub session_id: String,
}

impl SubscriptionRequest {
    /// Version-1 subscription for `kind`, delivered to the given session.
    pub fn websocket(kind: &str, broadcaster_user_id: &str, session_id: &str) -> Self {
        Self {
            kind: kind.to_string(),
            version: "1".to_string(),
            condition: Condition {
                broadcaster_user_id: broadcaster_user_id.to_string(),
            },
            transport: Transport {
                method: WEBSOCKET_TRANSPORT.to_string(),
                session_id: session_id.to_string(),
            },
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for registering subscriptions.
pub trait SubscriptionRegistrar: Send + Sync {
    /// Register one subscription. `Ok` means the server accepted it.
    fn register<'a>(&'a self, request: &'a SubscriptionRequest) -> BoxFuture<'a, Result<()>>;
}

/// Registers subscriptions through the Helix HTTP API.
pub struct HelixRegistrar {
    http: reqwest::Client,
    url: String,
    client_id: String,
    token: String,
}

impl HelixRegistrar {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.subscriptions_url.clone(),
            client_id: config.client_id.clone(),
            token: config.token.clone(),
        }
    }
}

impl SubscriptionRegistrar for HelixRegistrar {
    fn register<'a>(&'a self, request: &'a SubscriptionRequest) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // .json() also sets Content-Type: application/json
            let resp = self
                .http
                .post(&self.url)
                .header("Client-ID", &self.client_id)
                .header("Authorization", format!("Bearer {}", self.token))
                .json(request)
                .send()
                .await
                .with_context(|| format!("Error making request for {}", request.kind))?;

            let status = resp.status();
            if status == StatusCode::OK || status == StatusCode::ACCEPTED {
                return Ok(());
            }
            let text = resp.text().await.unwrap_or_default();
            bail!("Failed to subscribe to {} ({status}): {text}", request.kind);
        })
    }
}
