// emberbot-core/src/services/twitch/builtin_triggers/vocabulary.rs

use async_trait::async_trait;

use crate::Error;
use crate::platforms::twitch_eventsub::events::ChannelChatMessage;
use crate::services::twitch::dispatcher::{BotContext, ChatTrigger};

/// Fires when any whole word of a message is in the vocabulary, replying
/// with a canned line. Whole-word means "welcome" never matches "come".
pub struct VocabularyTrigger {
    words: Vec<String>,
    chance: i32,
    reply: String,
}

impl VocabularyTrigger {
    pub fn new(words: &[&str], chance: i32, reply: &str) -> Self {
        Self {
            words: words.iter().map(|w| w.to_lowercase()).collect(),
            chance,
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl ChatTrigger for VocabularyTrigger {
    fn chance(&self) -> i32 {
        self.chance
    }

    fn matches(&self, event: &ChannelChatMessage) -> bool {
        event
            .message
            .text
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| self.words.iter().any(|w| w == word))
    }

    async fn execute(&self, ctx: &BotContext, event: &ChannelChatMessage) -> Result<(), Error> {
        ctx.chat.send(&self.reply, Some(&event.message_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::twitch_eventsub::events::ChatMessageBody;

    fn event(text: &str) -> ChannelChatMessage {
        ChannelChatMessage {
            broadcaster_user_id: "100".into(),
            broadcaster_user_login: "emberlily".into(),
            chatter_user_id: "200".into(),
            chatter_user_login: "viewer".into(),
            chatter_user_name: "Viewer".into(),
            message_id: "msg-1".into(),
            message: ChatMessageBody {
                text: text.into(),
                fragments: vec![],
            },
            badges: vec![],
        }
    }

    fn trigger() -> VocabularyTrigger {
        VocabularyTrigger::new(&["come", "coming"], 20, "no coming")
    }

    #[test]
    fn matches_whole_words_only() {
        let t = trigger();
        assert!(t.matches(&event("come on over")));
        assert!(t.matches(&event("COMING through!")));
        assert!(t.matches(&event("come!")));
        assert!(!t.matches(&event("welcome everyone")));
        assert!(!t.matches(&event("newcomer here")));
        assert!(!t.matches(&event("hello")));
    }

    #[test]
    fn reports_its_configured_chance() {
        assert_eq!(trigger().chance(), 20);
    }
}
