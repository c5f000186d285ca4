// emberbot-core/src/platforms/twitch/auth.rs

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;

use crate::Error;
use crate::auth::TokenRefresher;
use crate::models::TokenPair;

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

#[derive(Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[allow(dead_code)]
    expires_in: u64,
    #[serde(default)]
    #[allow(dead_code)]
    scope: Vec<String>,
}

/// Client for the Twitch OAuth token endpoint (refresh-token grant).
pub struct TwitchAuthenticator {
    client_id: String,
    client_secret: String,
    http: ReqwestClient,
}

impl TwitchAuthenticator {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            http: ReqwestClient::new(),
        }
    }
}

#[async_trait]
impl TokenRefresher for TwitchAuthenticator {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("HTTP error refreshing token: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Auth(format!("Twitch token endpoint error: {e}")))?
            .json::<TwitchTokenResponse>()
            .await
            .map_err(|e| Error::Auth(format!("Parse error on token JSON: {e}")))?;

        Ok(TokenPair {
            access_token: resp.access_token,
            // Twitch normally rotates the refresh token; keep the old one if
            // the response omits it.
            refresh_token: resp
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }
}
