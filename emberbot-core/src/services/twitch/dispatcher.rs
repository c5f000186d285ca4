// emberbot-core/src/services/twitch/dispatcher.rs
//
// The hub: classifies inbound events against the registered behaviors and
// runs each matching behavior on its own task, so a slow handler never
// stalls ingestion of the next transport message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::overlay::OverlayBroadcaster;
use crate::platforms::twitch::UserDirectory;
use crate::platforms::twitch_eventsub::events::{
    ChannelChatMessage, ChannelPointsRedemption, ChannelRaid,
};
use crate::repositories::{CollectionRepository, StatsRepository};
use crate::services::message_sender::OutboundChat;

const MODERATOR_REJECTION: &str = "You must be a moderator to use this command";

/// Seedable random source shared between the dispatcher's chance rolls and
/// the behaviors' own draws. Tests construct it from a fixed seed.
#[derive(Clone)]
pub struct SharedRng(Arc<parking_lot::Mutex<StdRng>>);

impl SharedRng {
    pub fn from_os() -> Self {
        Self(Arc::new(parking_lot::Mutex::new(StdRng::from_os_rng())))
    }

    pub fn seeded(seed: u64) -> Self {
        Self(Arc::new(parking_lot::Mutex::new(StdRng::seed_from_u64(seed))))
    }

    pub fn roll_percent(&self) -> i32 {
        self.0.lock().random_range(1..=100)
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        f(&mut self.0.lock())
    }
}

/// Everything a behavior can reach: the stores, the outbound chat path, the
/// overlay fan-out, the user directory and the shared random source.
pub struct BotContext {
    pub chat: Arc<dyn OutboundChat>,
    pub stats: Arc<dyn StatsRepository>,
    pub collections: Arc<dyn CollectionRepository>,
    pub overlay: Arc<OverlayBroadcaster>,
    pub directory: Arc<dyn UserDirectory>,
    pub rng: SharedRng,
    pub bot_user_id: String,
}

/// A `!command`. The keyword arrives lowercased with the prefix stripped.
#[async_trait]
pub trait ChatCommand: Send + Sync {
    fn moderator_only(&self) -> bool {
        false
    }
    fn matches(&self, keyword: &str) -> bool;
    async fn execute(&self, ctx: &BotContext, event: &ChannelChatMessage) -> Result<(), Error>;
}

/// An ambient trigger evaluated against every chat message. A chance
/// outside (0,100) always fires when matched.
#[async_trait]
pub trait ChatTrigger: Send + Sync {
    fn chance(&self) -> i32 {
        100
    }
    fn matches(&self, event: &ChannelChatMessage) -> bool;
    async fn execute(&self, ctx: &BotContext, event: &ChannelChatMessage) -> Result<(), Error>;
}

/// A channel-point reward handler, matched on the reward's display title.
#[async_trait]
pub trait RewardRedemption: Send + Sync {
    fn matches(&self, reward_title: &str) -> bool;
    async fn execute(&self, ctx: &BotContext, event: &ChannelPointsRedemption)
    -> Result<(), Error>;
}

pub struct Dispatcher {
    ctx: Arc<BotContext>,
    commands: Vec<Arc<dyn ChatCommand>>,
    triggers: Vec<Arc<dyn ChatTrigger>>,
    redemptions: Vec<Arc<dyn RewardRedemption>>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<BotContext>,
        commands: Vec<Arc<dyn ChatCommand>>,
        triggers: Vec<Arc<dyn ChatTrigger>>,
        redemptions: Vec<Arc<dyn RewardRedemption>>,
    ) -> Self {
        Self {
            ctx,
            commands,
            triggers,
            redemptions,
            tracker: TaskTracker::new(),
        }
    }

    pub fn context(&self) -> &Arc<BotContext> {
        &self.ctx
    }

    /// Classify one chat message. Returns as soon as the matching behaviors
    /// are spawned; it never waits for them.
    pub fn dispatch_chat_message(&self, event: ChannelChatMessage) {
        // The bot's own messages would echo forever.
        if event.chatter_user_id == self.ctx.bot_user_id {
            return;
        }

        debug!(user = %event.chatter_user_login, text = %event.message.text, "processing chat message");

        let event = Arc::new(event);
        self.match_command(&event);
        self.match_triggers(&event);
    }

    fn match_command(&self, event: &Arc<ChannelChatMessage>) {
        let text = event.message.text.trim();
        if !text.starts_with('!') {
            return;
        }
        let Some(first) = text.split_whitespace().next() else {
            return;
        };
        let keyword = first.trim_start_matches('!').to_lowercase();
        if keyword.is_empty() {
            return;
        }

        for command in &self.commands {
            if !command.matches(&keyword) {
                continue;
            }

            // The gate decision happens here, before anything runs.
            if command.moderator_only() && !event.is_moderator() {
                warn!(user = %event.chatter_user_login, command = %keyword,
                      "non-moderator attempted mod command");
                let ctx = self.ctx.clone();
                let event = event.clone();
                self.spawn(async move {
                    if let Err(e) = ctx
                        .chat
                        .send(MODERATOR_REJECTION, Some(&event.message_id))
                        .await
                    {
                        error!(err = %e, "failed to send rejection reply");
                    }
                });
                return;
            }

            info!(command = %keyword, user = %event.chatter_user_login, "executing command");
            let ctx = self.ctx.clone();
            let command = command.clone();
            let event = event.clone();
            self.spawn(async move {
                if let Err(e) = command.execute(&ctx, &event).await {
                    error!(err = %e, "command handler failed");
                }
            });
            // First match wins; later registrations never see the message.
            return;
        }
    }

    fn match_triggers(&self, event: &Arc<ChannelChatMessage>) {
        for trigger in &self.triggers {
            if !trigger.matches(event) {
                continue;
            }

            let chance = trigger.chance();
            if chance > 0 && chance < 100 {
                let roll = self.ctx.rng.roll_percent();
                if roll > chance {
                    debug!(roll, chance, "trigger failed chance roll");
                    continue;
                }
            }

            info!(user = %event.chatter_user_login, "executing trigger");
            let ctx = self.ctx.clone();
            let trigger = trigger.clone();
            let event = event.clone();
            self.spawn(async move {
                if let Err(e) = trigger.execute(&ctx, &event).await {
                    error!(err = %e, "trigger handler failed");
                }
            });
        }
    }

    /// Every redemption whose title matches executes, not just the first.
    pub fn dispatch_redemption(&self, event: ChannelPointsRedemption) {
        info!(user = %event.user_login, reward = %event.reward.title, "channel point redemption");

        let event = Arc::new(event);
        for redemption in &self.redemptions {
            if !redemption.matches(&event.reward.title) {
                continue;
            }

            let ctx = self.ctx.clone();
            let redemption = redemption.clone();
            let event = event.clone();
            self.spawn(async move {
                if let Err(e) = redemption.execute(&ctx, &event).await {
                    error!(err = %e, "redemption handler failed");
                }
            });
        }
    }

    /// Shout out incoming raids.
    pub fn dispatch_raid(&self, event: ChannelRaid) {
        info!(from = %event.from_broadcaster_user_login, viewers = event.viewers, "incoming raid");

        let ctx = self.ctx.clone();
        self.spawn(async move {
            let message = format!("!so @{}", event.from_broadcaster_user_name);
            if let Err(e) = ctx.chat.send(&message, None).await {
                error!(err = %e, "failed to send raid shoutout");
            }
        });
    }

    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(fut);
    }

    /// Let in-flight behaviors finish, up to `grace`. Exceeding the grace
    /// period is logged, never fatal.
    pub async fn drain(&self, grace: Duration) {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!("behavior tasks still running after shutdown grace period");
        }
    }
}
