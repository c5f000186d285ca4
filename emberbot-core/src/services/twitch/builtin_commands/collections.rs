// emberbot-core/src/services/twitch/builtin_commands/collections.rs

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use crate::Error;
use crate::overlay::{OverlayEvent, OverlayEventType};
use crate::platforms::twitch_eventsub::events::ChannelChatMessage;
use crate::services::twitch::dispatcher::{BotContext, ChatCommand};
use crate::services::twitch::series::{CollectionSeries, redeem_series, slot_keys};

/// Moderator command that draws from a series without a channel-point
/// redemption (used for testing rewards and for off-platform redemptions).
pub struct SeriesRedeemCommand {
    series: CollectionSeries,
}

impl SeriesRedeemCommand {
    pub fn new(series: CollectionSeries) -> Self {
        Self { series }
    }
}

#[async_trait]
impl ChatCommand for SeriesRedeemCommand {
    fn moderator_only(&self) -> bool {
        true
    }

    fn matches(&self, keyword: &str) -> bool {
        keyword == self.series.redeem_command
    }

    async fn execute(&self, ctx: &BotContext, event: &ChannelChatMessage) -> Result<(), Error> {
        redeem_series(
            ctx,
            &event.chatter_user_id,
            &event.chatter_user_name,
            &self.series,
        )
        .await
    }
}

/// Shows the caller's collection on the overlay.
pub struct SeriesShowCommand {
    series: CollectionSeries,
}

impl SeriesShowCommand {
    pub fn new(series: CollectionSeries) -> Self {
        Self { series }
    }
}

#[async_trait]
impl ChatCommand for SeriesShowCommand {
    fn matches(&self, keyword: &str) -> bool {
        keyword == self.series.display_command
    }

    async fn execute(&self, ctx: &BotContext, event: &ChannelChatMessage) -> Result<(), Error> {
        let user_id = &event.chatter_user_id;
        let username = &event.chatter_user_name;

        let owned = match ctx
            .collections
            .get_collection(user_id, &self.series.collection_type)
            .await
        {
            Ok(row) => row.map(|r| r.owned_slots()).unwrap_or_default(),
            Err(e) => {
                error!(err = %e, user = %username, "failed to get collection");
                return ctx
                    .chat
                    .send(&format!("Failed to get {username}'s collection"), None)
                    .await;
            }
        };

        ctx.overlay.broadcast(OverlayEvent::with_data(
            OverlayEventType::CollectionDisplay,
            json!({
                "userId": user_id,
                "username": username,
                "collectionType": self.series.collection_type,
                "collection": slot_keys(&owned),
                "collectionSize": owned.len(),
            }),
        ));

        info!(user = %username, collection = %self.series.collection_type,
              size = owned.len(), "displaying collection");
        Ok(())
    }
}

/// Moderator command that zeroes the caller's collection for this series.
pub struct SeriesResetCommand {
    series: CollectionSeries,
}

impl SeriesResetCommand {
    pub fn new(series: CollectionSeries) -> Self {
        Self { series }
    }
}

#[async_trait]
impl ChatCommand for SeriesResetCommand {
    fn moderator_only(&self) -> bool {
        true
    }

    fn matches(&self, keyword: &str) -> bool {
        keyword == self.series.reset_command
    }

    async fn execute(&self, ctx: &BotContext, event: &ChannelChatMessage) -> Result<(), Error> {
        ctx.collections
            .reset_collection(&event.chatter_user_id, &self.series.collection_type)
            .await?;
        info!(user = %event.chatter_user_name, collection = %self.series.collection_type,
              "collection reset");
        Ok(())
    }
}

/// !collections lists who has completed each series. One header line, then one
/// line per completed series; a failed send aborts the rest of the listing.
pub struct CompletedSeriesCommand;

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[async_trait]
impl ChatCommand for CompletedSeriesCommand {
    fn matches(&self, keyword: &str) -> bool {
        keyword == "collections"
    }

    async fn execute(&self, ctx: &BotContext, _event: &ChannelChatMessage) -> Result<(), Error> {
        let completed = ctx.collections.completed_collections().await?;
        if completed.is_empty() {
            return ctx
                .chat
                .send("Nobody has completed a collection yet.", None)
                .await;
        }

        ctx.chat
            .send(
                "The following chatters have completed the below collections:",
                None,
            )
            .await?;

        for collection in completed {
            let message = format!(
                "{}: {}",
                capitalize(&collection.collection_type),
                collection.usernames.join(", ")
            );
            ctx.chat.send(&message, None).await?;
        }
        Ok(())
    }
}
