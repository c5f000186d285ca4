// emberbot-core/src/services/message_sender.rs

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::Error;
use crate::auth::CredentialManager;
use crate::platforms::twitch::ChatApi;
use crate::platforms::twitch::requests::chat::SendChatMessageParams;

/// What behaviors see of the outbound chat path.
#[async_trait]
pub trait OutboundChat: Send + Sync {
    async fn send(&self, message: &str, reply_to: Option<&str>) -> Result<(), Error>;
}

/// Sends chat messages as the bot identity, refreshing the token once and
/// retrying once when the platform rejects it. A second rejection is
/// surfaced to the caller; we never loop on a revoked grant.
pub struct MessageSender {
    api: Arc<dyn ChatApi>,
    credentials: Arc<CredentialManager>,
    bot_user_id: String,
    broadcaster_id: String,
}

impl MessageSender {
    pub fn new(
        api: Arc<dyn ChatApi>,
        credentials: Arc<CredentialManager>,
        bot_user_id: String,
        broadcaster_id: String,
    ) -> Self {
        Self {
            api,
            credentials,
            bot_user_id,
            broadcaster_id,
        }
    }

    fn params(&self, message: &str, reply_to: Option<&str>) -> SendChatMessageParams {
        SendChatMessageParams {
            broadcaster_id: self.broadcaster_id.clone(),
            sender_id: self.bot_user_id.clone(),
            message: message.to_string(),
            reply_parent_message_id: reply_to.map(str::to_string),
        }
    }
}

#[async_trait]
impl OutboundChat for MessageSender {
    async fn send(&self, message: &str, reply_to: Option<&str>) -> Result<(), Error> {
        let params = self.params(message, reply_to);
        let token = self.credentials.access_token().await;

        match self.api.send_chat_message(&token, &params).await {
            Ok(()) => {
                debug!(text = message, "chat message sent");
                Ok(())
            }
            Err(Error::Unauthorized(reason)) => {
                info!(%reason, "chat token rejected, refreshing and retrying");
                self.credentials.refresh_if_stale(&token).await?;
                let token = self.credentials.access_token().await;
                self.api.send_chat_message(&token, &params).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Shared chat double for behavior and dispatcher tests: records every send
/// and can be scripted to fail upcoming calls.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub(crate) struct RecordingChat {
        sent: parking_lot::Mutex<Vec<(String, Option<String>)>>,
        script: parking_lot::Mutex<VecDeque<Result<(), Error>>>,
    }

    impl RecordingChat {
        pub(crate) fn sent(&self) -> Vec<(String, Option<String>)> {
            self.sent.lock().clone()
        }

        pub(crate) fn messages(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(m, _)| m.clone()).collect()
        }

        pub(crate) fn fail_next(&self, err: Error) {
            self.script.lock().push_back(Err(err));
        }
    }

    #[async_trait]
    impl OutboundChat for RecordingChat {
        async fn send(&self, message: &str, reply_to: Option<&str>) -> Result<(), Error> {
            self.sent
                .lock()
                .push((message.to_string(), reply_to.map(str::to_string)));
            match self.script.lock().pop_front() {
                Some(result) => result,
                None => Ok(()),
            }
        }
    }
}
