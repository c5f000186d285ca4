// emberbot-core/src/platforms/twitch/requests/chat.rs

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::Error;
use crate::platforms::twitch::client::TwitchHelixClient;

#[derive(Debug, Clone)]
pub struct SendChatMessageParams {
    pub broadcaster_id: String,
    pub sender_id: String,
    pub message: String,
    pub reply_parent_message_id: Option<String>,
}

#[derive(Deserialize)]
struct SendChatMessageData {
    is_sent: bool,
    #[serde(default)]
    drop_reason: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct SendChatMessageResponse {
    data: Vec<SendChatMessageData>,
}

/// POST /helix/chat/messages. A 401/403 surfaces as `Error::Unauthorized`
/// so the sender can run its refresh-and-retry pass.
pub async fn send_chat_message(
    client: &TwitchHelixClient,
    access_token: &str,
    params: &SendChatMessageParams,
) -> Result<(), Error> {
    let mut body = json!({
        "broadcaster_id": params.broadcaster_id,
        "sender_id": params.sender_id,
        "message": params.message,
    });
    if let Some(reply_id) = &params.reply_parent_message_id {
        body["reply_parent_message_id"] = json!(reply_id);
    }

    let resp = client
        .http()
        .post(format!("{}/chat/messages", client.base_url()))
        .header("Client-Id", client.client_id())
        .bearer_auth(access_token)
        .json(&body)
        .send()
        .await?;

    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Unauthorized(format!(
            "helix chat send rejected: HTTP {status}"
        )));
    }
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(Error::Platform(format!(
            "helix chat send failed: HTTP {status}: {text}"
        )));
    }

    // Helix reports per-message drop reasons inside a 200 response.
    let parsed: SendChatMessageResponse = resp.json().await?;
    if let Some(data) = parsed.data.first() {
        if !data.is_sent {
            warn!(drop_reason = ?data.drop_reason, "chat message was not delivered");
        }
    }
    Ok(())
}
