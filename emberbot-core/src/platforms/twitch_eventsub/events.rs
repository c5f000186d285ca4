// File: emberbot-core/src/platforms/twitch_eventsub/events.rs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// Subscription metadata carried alongside every notification.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionData {
    pub id: String,
    #[serde(rename = "type")]
    pub sub_type: String,
    pub version: String,
    pub status: String,
    #[serde(default)]
    pub condition: serde_json::Value,
}

/// The `payload` of a "notification" message:
/// { "subscription": { ... }, "event": { ... } }
#[derive(Debug, Clone, Deserialize)]
pub struct EventSubNotificationEnvelope {
    pub subscription: SubscriptionData,
    pub event: serde_json::Value,
}

// --------------------------------------------------------------------------------
// "channel.chat.message"
// --------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelChatMessage {
    pub broadcaster_user_id: String,
    pub broadcaster_user_login: String,
    pub chatter_user_id: String,
    pub chatter_user_login: String,
    pub chatter_user_name: String,
    pub message_id: String,
    pub message: ChatMessageBody,
    #[serde(default)]
    pub badges: Vec<ChatBadge>,
}

impl ChannelChatMessage {
    /// Role badges that grant moderator-level commands.
    pub fn is_moderator(&self) -> bool {
        self.badges.iter().any(|b| {
            matches!(
                b.set_id.as_str(),
                "moderator" | "broadcaster" | "lead_moderator"
            )
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageBody {
    pub text: String,
    #[serde(default)]
    pub fragments: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatBadge {
    pub set_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub info: String,
}

// --------------------------------------------------------------------------------
// "channel.channel_points_custom_reward_redemption.add"
// --------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPointsRedemption {
    pub id: String,
    pub broadcaster_user_id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    #[serde(default)]
    pub user_input: String,
    pub reward: RedemptionReward,
    #[serde(default)]
    pub redeemed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedemptionReward {
    pub id: String,
    pub title: String,
    pub cost: i64,
    #[serde(default)]
    pub prompt: String,
}

// --------------------------------------------------------------------------------
// "channel.raid"
// --------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRaid {
    pub from_broadcaster_user_id: String,
    pub from_broadcaster_user_login: String,
    pub from_broadcaster_user_name: String,
    pub to_broadcaster_user_id: String,
    pub to_broadcaster_user_login: String,
    pub to_broadcaster_user_name: String,
    pub viewers: u64,
}

/// The decoded notifications the dispatcher consumes.
#[derive(Debug, Clone)]
pub enum EventSubEvent {
    ChatMessage(ChannelChatMessage),
    RewardRedemption(ChannelPointsRedemption),
    Raid(ChannelRaid),
}

/// Decode a notification's `event` object by its subscription type.
/// Unhandled types return None; undecodable payloads are logged and dropped.
pub fn parse_notification(sub_type: &str, event: &serde_json::Value) -> Option<EventSubEvent> {
    let result = match sub_type {
        "channel.chat.message" => {
            serde_json::from_value(event.clone()).map(EventSubEvent::ChatMessage)
        }
        "channel.channel_points_custom_reward_redemption.add" => {
            serde_json::from_value(event.clone()).map(EventSubEvent::RewardRedemption)
        }
        "channel.raid" => serde_json::from_value(event.clone()).map(EventSubEvent::Raid),
        _ => return None,
    };

    match result {
        Ok(evt) => Some(evt),
        Err(e) => {
            warn!(sub_type, err = %e, "undecodable eventsub notification");
            None
        }
    }
}
