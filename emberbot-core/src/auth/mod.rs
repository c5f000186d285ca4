// emberbot-core/src/auth/mod.rs

pub mod manager;

use async_trait::async_trait;

use crate::Error;
use crate::models::TokenPair;

pub use manager::CredentialManager;

/// Exchanges a refresh token for a fresh token pair. Implemented by the
/// Twitch OAuth client; mocked in tests.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, Error>;
}
