// File: emberbot-core/src/platforms/twitch/client.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tracing::info;

use crate::Error;
use crate::auth::CredentialManager;
use crate::platforms::twitch::requests::chat::{self, SendChatMessageParams};
use crate::platforms::twitch::requests::users::{self, HelixUser};

const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";

/// A small wrapper client for calling Helix endpoints. The individual
/// request shapes live in `requests::*`; this struct is the reusable entry
/// point carrying the HTTP client and app identity.
#[derive(Clone)]
pub struct TwitchHelixClient {
    http: Arc<ReqwestClient>,
    client_id: String,
    base_url: String,
}

impl TwitchHelixClient {
    pub fn new(client_id: &str) -> Self {
        Self {
            http: Arc::new(ReqwestClient::new()),
            client_id: client_id.to_string(),
            base_url: HELIX_BASE_URL.to_string(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &ReqwestClient {
        &self.http
    }
}

/// The raw chat-send call, separated from the retry policy in
/// `services::message_sender` so the policy is testable without a network.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_chat_message(
        &self,
        access_token: &str,
        params: &SendChatMessageParams,
    ) -> Result<(), Error>;
}

pub struct HelixChatApi {
    client: TwitchHelixClient,
}

impl HelixChatApi {
    pub fn new(client: TwitchHelixClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatApi for HelixChatApi {
    async fn send_chat_message(
        &self,
        access_token: &str,
        params: &SendChatMessageParams,
    ) -> Result<(), Error> {
        chat::send_chat_message(&self.client, access_token, params).await
    }
}

/// Resolves chat logins to platform users (used by moderator commands that
/// act on an @mention).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_by_login(&self, login: &str) -> Result<Option<HelixUser>, Error>;
}

pub struct HelixUserDirectory {
    client: TwitchHelixClient,
    credentials: Arc<CredentialManager>,
}

impl HelixUserDirectory {
    pub fn new(client: TwitchHelixClient, credentials: Arc<CredentialManager>) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl UserDirectory for HelixUserDirectory {
    async fn user_by_login(&self, login: &str) -> Result<Option<HelixUser>, Error> {
        let token = self.credentials.access_token().await;
        match users::get_user_by_login(&self.client, &token, login).await {
            Err(Error::Unauthorized(reason)) => {
                info!(%reason, "user lookup token rejected; refreshing and retrying");
                self.credentials.refresh_if_stale(&token).await?;
                let token = self.credentials.access_token().await;
                users::get_user_by_login(&self.client, &token, login).await
            }
            other => other,
        }
    }
}
