// emberbot-core/src/platforms/twitch/requests/users.rs

use reqwest::StatusCode;
use serde::Deserialize;

use crate::Error;
use crate::platforms::twitch::client::TwitchHelixClient;

#[derive(Debug, Clone, Deserialize)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

#[derive(Deserialize)]
struct UsersResponse {
    data: Vec<HelixUser>,
}

/// GET /helix/users?login=<login>.
pub async fn get_user_by_login(
    client: &TwitchHelixClient,
    access_token: &str,
    login: &str,
) -> Result<Option<HelixUser>, Error> {
    let resp = client
        .http()
        .get(format!("{}/users", client.base_url()))
        .query(&[("login", login)])
        .header("Client-Id", client.client_id())
        .bearer_auth(access_token)
        .send()
        .await?;

    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Unauthorized(format!(
            "helix user lookup rejected: HTTP {status}"
        )));
    }
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(Error::Platform(format!(
            "helix user lookup failed: HTTP {status}: {text}"
        )));
    }

    let parsed: UsersResponse = resp.json().await?;
    Ok(parsed.data.into_iter().next())
}
