// emberbot-core/src/platforms/twitch_eventsub/mod.rs

pub mod events;
pub mod runtime;

pub use events::{ChannelChatMessage, ChannelPointsRedemption, ChannelRaid, EventSubEvent};
pub use runtime::EventSubRuntime;
