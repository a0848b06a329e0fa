//! Typed decoding of EventSub `notification` payloads.
//!
//! The payload's `subscription.type` selects one of a closed set of event
//! shapes. Types outside that set decode to [`Notification::Unrecognized`].

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CHANNEL_SUBSCRIBE: &str = "channel.subscribe";
pub const CHANNEL_CHEER: &str = "channel.cheer";
pub const CHANNEL_POINTS_REDEMPTION: &str = "channel.channel_points_custom_reward_redemption.add";

/// Subscription types registered for every session, in registration order.
pub const SUBSCRIPTION_TYPES: [&str; 3] = [CHANNEL_SUBSCRIBE, CHANNEL_CHEER, CHANNEL_POINTS_REDEMPTION];

/// A decoded channel activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Subscription { user_name: String },
    Cheer { user_name: String, bits: i64 },
    PointRedemption {
        user_name: String,
        reward_title: String,
        reward_cost: i64,
    },
    Unrecognized { subscription_type: String },
}

#[derive(Debug, Deserialize)]
struct NotificationPayload {
    subscription: SubscriptionInfo,
    event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionInfo {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct SubscribeEvent {
    user_name: String,
}

#[derive(Debug, Deserialize)]
struct CheerEvent {
    user_name: String,
    bits: f64,
}

#[derive(Debug, Deserialize)]
struct RedemptionEvent {
    user_name: String,
    reward: Reward,
}

#[derive(Debug, Deserialize)]
struct Reward {
    title: String,
    cost: f64,
}

/// Decode the `payload` object of a `notification` message.
///
/// Errors when the payload or a recognized event body is missing fields;
/// the caller drops such notifications.
pub fn decode(payload: serde_json::Value) -> Result<Notification> {
    let payload: NotificationPayload =
        serde_json::from_value(payload).context("notification payload missing subscription or event")?;

    let notification = match payload.subscription.kind.as_str() {
        CHANNEL_SUBSCRIBE => {
            let event: SubscribeEvent =
                serde_json::from_value(payload.event).context("malformed channel.subscribe event")?;
            Notification::Subscription {
                user_name: event.user_name,
            }
        }
        CHANNEL_CHEER => {
            let event: CheerEvent =
                serde_json::from_value(payload.event).context("malformed channel.cheer event")?;
            Notification::Cheer {
                user_name: event.user_name,
                bits: event.bits.trunc() as i64,
            }
        }
        CHANNEL_POINTS_REDEMPTION => {
            let event: RedemptionEvent = serde_json::from_value(payload.event)
                .context("malformed channel points redemption event")?;
            Notification::PointRedemption {
                user_name: event.user_name,
                reward_title: event.reward.title,
                reward_cost: event.reward.cost.trunc() as i64,
            }
        }
        _ => Notification::Unrecognized {
            subscription_type: payload.subscription.kind,
        },
    };
    Ok(notification)
}
