//! Connection settings shared by the chat and EventSub clients.

use std::fmt;

/// Twitch IRC endpoint (plaintext).
pub const CHAT_ADDR: &str = "irc.chat.twitch.tv:6667";
/// Twitch EventSub WebSocket endpoint.
pub const EVENTSUB_URL: &str = "wss://eventsub.wss.twitch.tv/ws";
/// Helix endpoint that creates EventSub subscriptions.
pub const SUBSCRIPTIONS_URL: &str = "https://api.twitch.tv/helix/eventsub/subscriptions";

/// Validated, read-only settings for both clients.
///
/// Built once by the binary and shared as `Arc<ConnectionConfig>`.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// IRC nickname (a login name, or a `justinfanNNN` guest).
    pub nick: String,
    /// OAuth token, without the `oauth:` marker.
    pub token: String,
    /// Channel to join, including the leading `#`.
    pub channel: String,
    /// Numeric broadcaster user ID used as the subscription condition.
    pub channel_id: String,
    /// Application client ID sent to Helix.
    pub client_id: String,
    /// Emit diagnostics and banners.
    pub verbose: bool,
    /// Chat server address (host:port).
    pub chat_addr: String,
    /// EventSub WebSocket URL.
    pub eventsub_url: String,
    /// Helix subscriptions URL.
    pub subscriptions_url: String,
}

impl ConnectionConfig {
    /// Settings pointed at the production Twitch endpoints.
    ///
    /// A channel given without `#` gets one prepended.
    pub fn new(
        nick: impl Into<String>,
        token: impl Into<String>,
        channel: impl AsRef<str>,
        channel_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        let channel = channel.as_ref();
        let channel = if channel.starts_with('#') {
            channel.to_string()
        } else {
            format!("#{channel}")
        };
        Self {
            nick: nick.into(),
            token: token.into(),
            channel,
            channel_id: channel_id.into(),
            client_id: client_id.into(),
            verbose: false,
            chat_addr: CHAT_ADDR.to_string(),
            eventsub_url: EVENTSUB_URL.to_string(),
            subscriptions_url: SUBSCRIPTIONS_URL.to_string(),
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("nick", &self.nick)
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .field("channel_id", &self.channel_id)
            .field("client_id", &self.client_id)
            .field("verbose", &self.verbose)
            .field("chat_addr", &self.chat_addr)
            .field("eventsub_url", &self.eventsub_url)
            .field("subscriptions_url", &self.subscriptions_url)
            .finish()
    }
}
