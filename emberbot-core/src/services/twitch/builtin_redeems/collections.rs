// emberbot-core/src/services/twitch/builtin_redeems/collections.rs

use async_trait::async_trait;

use crate::Error;
use crate::platforms::twitch_eventsub::events::ChannelPointsRedemption;
use crate::services::twitch::dispatcher::{BotContext, RewardRedemption};
use crate::services::twitch::series::{CollectionSeries, redeem_series};

/// Channel-point redemption that draws one box from a collection series.
pub struct SeriesRedemption {
    series: CollectionSeries,
}

impl SeriesRedemption {
    pub fn new(series: CollectionSeries) -> Self {
        Self { series }
    }
}

#[async_trait]
impl RewardRedemption for SeriesRedemption {
    fn matches(&self, reward_title: &str) -> bool {
        reward_title == self.series.reward_title
    }

    async fn execute(
        &self,
        ctx: &BotContext,
        event: &ChannelPointsRedemption,
    ) -> Result<(), Error> {
        redeem_series(ctx, &event.user_id, &event.user_name, &self.series).await
    }
}
