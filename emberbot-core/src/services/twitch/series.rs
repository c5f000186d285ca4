// emberbot-core/src/services/twitch/series.rs

use serde_json::json;
use tracing::info;

use crate::Error;
use crate::models::{RewardWeight, draw_weighted_reward};
use crate::overlay::{OverlayEvent, OverlayEventType};
use crate::services::twitch::dispatcher::BotContext;

/// One configured collection series: the channel-point reward that draws
/// from it, the chat commands around it, and the draw weights.
#[derive(Debug, Clone)]
pub struct CollectionSeries {
    pub collection_type: String,
    pub reward_title: String,
    pub redeem_command: String,
    pub display_command: String,
    pub reset_command: String,
    pub weights: Vec<RewardWeight>,
}

/// The series this channel runs. Slot 8 is the chase item in each box.
pub fn default_series() -> Vec<CollectionSeries> {
    let standard_weights = |chase: u32| -> Vec<RewardWeight> {
        (1..=7)
            .map(|slot| RewardWeight::new(slot, 12))
            .chain(std::iter::once(RewardWeight::new(8, chase)))
            .collect()
    };

    vec![
        CollectionSeries {
            collection_type: "ember".into(),
            reward_title: "Ember Series Mystery Box".into(),
            redeem_command: "ember-redeem".into(),
            display_command: "ember".into(),
            reset_command: "ember-reset".into(),
            weights: standard_weights(1),
        },
        CollectionSeries {
            collection_type: "aurora".into(),
            reward_title: "Aurora Series Mystery Box".into(),
            redeem_command: "aurora-redeem".into(),
            display_command: "aurora".into(),
            reset_command: "aurora-reset".into(),
            weights: standard_weights(1),
        },
    ]
}

pub fn slot_keys(slots: &[u8]) -> Vec<String> {
    slots.iter().map(|n| format!("reward{n}")).collect()
}

/// The draw shared by the channel-point redemption and the moderator
/// command: pick a weighted slot, record it, announce it on the overlay.
pub async fn redeem_series(
    ctx: &BotContext,
    user_id: &str,
    username: &str,
    series: &CollectionSeries,
) -> Result<(), Error> {
    let slot = ctx.rng.with(|rng| draw_weighted_reward(&series.weights, rng));

    let outcome = ctx
        .collections
        .add_reward(user_id, username, &series.collection_type, slot)
        .await?;

    ctx.overlay.broadcast(OverlayEvent::with_data(
        OverlayEventType::SeriesRedemption,
        json!({
            "userId": user_id,
            "username": username,
            "collectionType": series.collection_type,
            "seriesName": series.reward_title,
            "reward": format!("reward{slot}"),
            "isNew": outcome.is_new,
            "collectionSize": outcome.owned.len(),
            "collection": slot_keys(&outcome.owned),
        }),
    ));

    info!(
        user = %username,
        collection = %series.collection_type,
        slot,
        is_new = outcome.is_new,
        "series box redeemed"
    );
    Ok(())
}
