// twitch_eventsub/runtime.rs

use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::Client as ReqwestClient;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::{Duration, sleep};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::Error;
use crate::auth::CredentialManager;
use crate::platforms::twitch_eventsub::events::{
    EventSubEvent, EventSubNotificationEnvelope, parse_notification,
};
use crate::services::twitch::dispatcher::Dispatcher;

const SUBSCRIPTIONS_URL: &str = "https://api.twitch.tv/helix/eventsub/subscriptions";
const RECONNECT_BACKOFF: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Owns the EventSub websocket session: connects, subscribes with the owner
/// identity on welcome, decodes notifications into dispatcher calls, and
/// follows reconnect hops until cancelled.
pub struct EventSubRuntime {
    dispatcher: Arc<Dispatcher>,
    owner: Arc<CredentialManager>,
    client_id: String,
    broadcaster_id: String,
    ws_url: String,
    shutdown: CancellationToken,
    http: ReqwestClient,
}

impl EventSubRuntime {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        owner: Arc<CredentialManager>,
        client_id: String,
        broadcaster_id: String,
        ws_url: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            owner,
            client_id,
            broadcaster_id,
            ws_url,
            shutdown,
            http: ReqwestClient::new(),
        }
    }

    /// Entrypoint. Keeps the socket alive, hopping whenever Twitch asks.
    pub async fn run(&self) -> Result<(), Error> {
        let mut url = self.ws_url.clone();

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let ws = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = connect_async(&url) => match result {
                    Ok((ws, _)) => ws,
                    Err(e) => {
                        error!(err = %e, "eventsub connect error");
                        url = self.ws_url.clone();
                        sleep(RECONNECT_BACKOFF).await;
                        continue;
                    }
                },
            };

            info!(%url, "connected to eventsub");

            match self.read_loop(ws).await {
                // Twitch asked us to hop to a new URL.
                Ok(Some(new_url)) => {
                    warn!(%new_url, "eventsub reconnect requested");
                    url = new_url;
                }
                Ok(None) => {
                    if self.shutdown.is_cancelled() {
                        info!("eventsub connection closed for shutdown");
                        break;
                    }
                    warn!("eventsub connection closed; reconnecting");
                    url = self.ws_url.clone();
                    sleep(RECONNECT_BACKOFF).await;
                }
                Err(e) => {
                    error!(err = %e, "eventsub loop error");
                    url = self.ws_url.clone();
                    sleep(RECONNECT_BACKOFF).await;
                }
            }
        }

        Ok(())
    }

    /// Reads until the socket closes or a reconnect URL arrives.
    /// `Ok(Some(url))` → caller must reconnect to `url`.
    async fn read_loop(&self, mut ws: WsStream) -> Result<Option<String>, Error> {
        loop {
            let msg_res = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(None);
                }
                msg = ws.next() => msg,
            };

            let Some(msg_res) = msg_res else {
                return Ok(None);
            };
            let msg = msg_res.map_err(|e| Error::Platform(format!("websocket error: {e}")))?;

            if msg.is_close() {
                return Ok(None);
            }
            if msg.is_ping() || msg.is_pong() {
                continue;
            }
            let Message::Text(txt) = msg else { continue };

            let parsed: serde_json::Value = serde_json::from_str(&txt)
                .map_err(|e| Error::Platform(format!("bad eventsub json: {e}")))?;

            match parsed
                .get("metadata")
                .and_then(|m| m.get("message_type"))
                .and_then(|v| v.as_str())
            {
                Some("session_welcome") => {
                    if let Some(id) = parsed
                        .pointer("/payload/session/id")
                        .and_then(|v| v.as_str())
                    {
                        info!(session_id = id, "eventsub session established");
                        if let Err(e) = self.subscribe_all(id).await {
                            error!(err = %e, "eventsub subscribe failed");
                        }
                    }
                }
                Some("session_keepalive") => trace!("keepalive"),
                Some("session_reconnect") => {
                    let url = parsed
                        .pointer("/payload/session/reconnect_url")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| Error::Platform("missing reconnect_url".into()))?
                        .to_string();
                    return Ok(Some(url));
                }
                Some("notification") => self.handle_notification(&parsed),
                Some("revocation") => warn!("eventsub subscription revoked - check scopes"),
                other => debug!(message_type = ?other, "unhandled eventsub message"),
            }
        }
    }

    fn handle_notification(&self, parsed: &serde_json::Value) {
        let Some(payload) = parsed.get("payload") else {
            return;
        };
        match serde_json::from_value::<EventSubNotificationEnvelope>(payload.clone()) {
            Ok(envelope) => {
                if let Some(event) = parse_notification(&envelope.subscription.sub_type, &envelope.event) {
                    match event {
                        EventSubEvent::ChatMessage(e) => self.dispatcher.dispatch_chat_message(e),
                        EventSubEvent::RewardRedemption(e) => self.dispatcher.dispatch_redemption(e),
                        EventSubEvent::Raid(e) => self.dispatcher.dispatch_raid(e),
                    }
                }
            }
            Err(e) => warn!(err = %e, "undecodable notification envelope"),
        }
    }

    /// Subscribe to everything this bot consumes, authorized by the owner
    /// identity. Individual failures are logged, not fatal; the session is
    /// still useful with a partial set.
    async fn subscribe_all(&self, session_id: &str) -> Result<(), Error> {
        let access_token = self.owner.access_token().await;
        let broadcaster_id = &self.broadcaster_id;

        let subscriptions = [
            (
                "channel.chat.message",
                "1",
                json!({
                    "broadcaster_user_id": broadcaster_id,
                    "user_id": broadcaster_id,
                }),
            ),
            (
                "channel.channel_points_custom_reward_redemption.add",
                "1",
                json!({ "broadcaster_user_id": broadcaster_id }),
            ),
            (
                "channel.raid",
                "1",
                json!({ "to_broadcaster_user_id": broadcaster_id }),
            ),
        ];

        for (sub_type, version, condition) in subscriptions {
            let body = json!({
                "type": sub_type,
                "version": version,
                "condition": condition,
                "transport": {
                    "method": "websocket",
                    "session_id": session_id,
                }
            });

            let resp = self
                .http
                .post(SUBSCRIPTIONS_URL)
                .header("Client-Id", &self.client_id)
                .bearer_auth(&access_token)
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Platform(format!("error subscribing to {sub_type}: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                warn!(sub_type, %status, response = %text, "eventsub subscribe rejected");
            } else {
                debug!(sub_type, "eventsub subscription created");
            }
        }

        Ok(())
    }
}
