// emberbot-core/src/platforms/twitch/requests/mod.rs

pub mod chat;
pub mod users;
