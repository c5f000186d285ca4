// emberbot-server/src/config.rs

use emberbot_core::Error;
use emberbot_core::models::TokenPair;

/// Secrets and channel identity, loaded from the environment (a `.env`
/// file is honored). The seed token pairs are only used until the first
/// refresh persists a pair to the database.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub owner_tokens: TokenPair,
    pub bot_tokens: TokenPair,
    pub bot_user_id: String,
    pub channel_user_id: String,
}

fn required(name: &str) -> Result<String, Error> {
    std::env::var(name)
        .map_err(|_| Error::Parse(format!("missing required environment variable {name}")))
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Ok(Self {
            client_id: required("TWITCH_CLIENT_ID")?,
            client_secret: required("TWITCH_CLIENT_SECRET")?,
            owner_tokens: TokenPair::new(
                required("TWITCH_OWNER_ACCESS_TOKEN")?,
                required("TWITCH_OWNER_REFRESH_TOKEN")?,
            ),
            bot_tokens: TokenPair::new(
                required("TWITCH_BOT_ACCESS_TOKEN")?,
                required("TWITCH_BOT_REFRESH_TOKEN")?,
            ),
            bot_user_id: required("TWITCH_BOT_USER_ID")?,
            channel_user_id: required("TWITCH_CHANNEL_USER_ID")?,
        })
    }
}
