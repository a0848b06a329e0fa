//! Events emitted by the chat and EventSub clients for the output layer to consume.

use crate::chat::ChatMessage;
use crate::notification::Notification;

/// Which of the two feeds an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Chat,
    EventSub,
}

/// Events that the SDK emits to the consumer (terminal printer, tests, etc.)
#[derive(Debug, Clone)]
pub enum Event {
    /// Chat handshake sent; the JOIN for `channel` is on the wire.
    Joined { channel: String },

    /// A chat message in the joined channel.
    Chat(ChatMessage),

    /// EventSub welcome received for this session.
    Welcomed { session_id: String },

    /// Every subscription registration has been attempted.
    ActivityFeedReady,

    /// A recognized channel activity notification.
    Activity(Notification),

    /// A feed stopped. No reconnect follows.
    Disconnected { feed: Feed, reason: String },
}
