// emberbot-core/src/services/twitch/builtin_redeems/stats.rs
//
// Multi-message redemptions abort on the first failed send: the follow-up
// lines describe state the first message introduced, so a partial sequence
// is worse than none.

use async_trait::async_trait;
use rand::Rng;

use crate::Error;
use crate::models::StatColumn;
use crate::platforms::twitch_eventsub::events::ChannelPointsRedemption;
use crate::services::twitch::dispatcher::{BotContext, RewardRedemption};

/// "Drink a Potion": a random stat goes up (or, rarely, down).
pub struct PotionRedemption;

#[async_trait]
impl RewardRedemption for PotionRedemption {
    fn matches(&self, reward_title: &str) -> bool {
        reward_title == "Drink a Potion"
    }

    async fn execute(
        &self,
        ctx: &BotContext,
        event: &ChannelPointsRedemption,
    ) -> Result<(), Error> {
        let (column, delta) = ctx.rng.with(|rng| {
            let column = StatColumn::ALL[rng.random_range(0..StatColumn::ALL.len())];
            // 1-in-20 potions are duds.
            let delta: i64 = if rng.random_range(0..20) == 0 { -1 } else { 1 };
            (column, delta)
        });

        let username = &event.user_name;
        ctx.stats
            .modify_stat(&event.user_id, username, column, delta)
            .await?;

        let outcome = if delta > 0 { "gained" } else { "lost" };
        let message = format!(
            "A shifty looking merchant hands {username} a glittering potion. \
             Without hesitation, they sink the whole drink. {username} {outcome} {}",
            column.display()
        );
        ctx.chat.send(&message, None).await?;

        let stats = ctx
            .stats
            .upsert_and_get(&event.user_id, username)
            .await?;
        ctx.chat.send(&stats.format_line(username), None).await
    }
}

/// "Tempt the Dice": announce the roll, then show the caller's stats.
pub struct DiceRedemption;

#[async_trait]
impl RewardRedemption for DiceRedemption {
    fn matches(&self, reward_title: &str) -> bool {
        reward_title == "Tempt the Dice"
    }

    async fn execute(
        &self,
        ctx: &BotContext,
        event: &ChannelPointsRedemption,
    ) -> Result<(), Error> {
        let username = &event.user_name;
        ctx.chat
            .send(&format!("{username} has rolled with initiative."), None)
            .await?;

        let stats = ctx
            .stats
            .upsert_and_get(&event.user_id, username)
            .await?;
        ctx.chat.send(&stats.format_line(username), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stats;
    use crate::overlay::OverlayBroadcaster;
    use crate::platforms::twitch::client::MockUserDirectory;
    use crate::platforms::twitch_eventsub::events::RedemptionReward;
    use crate::repositories::postgres::collections::MockCollectionRepository;
    use crate::repositories::postgres::stats::MockStatsRepository;
    use crate::services::message_sender::testing::RecordingChat;
    use crate::services::twitch::dispatcher::SharedRng;
    use std::sync::Arc;

    fn redemption(title: &str) -> ChannelPointsRedemption {
        ChannelPointsRedemption {
            id: "redeem-1".into(),
            broadcaster_user_id: "100".into(),
            user_id: "200".into(),
            user_login: "viewer".into(),
            user_name: "Viewer".into(),
            user_input: String::new(),
            reward: RedemptionReward {
                id: "r1".into(),
                title: title.into(),
                cost: 500,
                prompt: String::new(),
            },
            redeemed_at: None,
        }
    }

    fn stats_row() -> Stats {
        Stats {
            user_id: "200".into(),
            username: "Viewer".into(),
            strength: 1,
            intelligence: 0,
            charisma: 0,
            luck: 0,
            dexterity: 0,
            vigor: 0,
        }
    }

    fn ctx(chat: Arc<RecordingChat>, stats: MockStatsRepository) -> BotContext {
        BotContext {
            chat,
            stats: Arc::new(stats),
            collections: Arc::new(MockCollectionRepository::new()),
            overlay: Arc::new(OverlayBroadcaster::new()),
            directory: Arc::new(MockUserDirectory::new()),
            rng: SharedRng::seeded(7),
            bot_user_id: "900".into(),
        }
    }

    #[tokio::test]
    async fn potion_modifies_a_stat_and_sends_two_messages() {
        let mut stats = MockStatsRepository::new();
        stats
            .expect_modify_stat()
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        stats
            .expect_upsert_and_get()
            .times(1)
            .returning(|_, _| Ok(stats_row()));

        let chat = Arc::new(RecordingChat::default());
        PotionRedemption
            .execute(&ctx(chat.clone(), stats), &redemption("Drink a Potion"))
            .await
            .unwrap();

        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("glittering potion"));
        assert!(messages[1].starts_with("Viewer's stats:"));
    }

    #[tokio::test]
    async fn dice_aborts_sequence_when_first_send_fails() {
        let mut stats = MockStatsRepository::new();
        // The stats fetch never happens if the first send fails.
        stats.expect_upsert_and_get().times(0);

        let chat = Arc::new(RecordingChat::default());
        chat.fail_next(Error::Platform("send failed".into()));

        let result = DiceRedemption
            .execute(&ctx(chat.clone(), stats), &redemption("Tempt the Dice"))
            .await;

        assert!(result.is_err());
        assert_eq!(chat.messages().len(), 1, "no follow-up after a failed send");
    }

    #[tokio::test]
    async fn dice_sends_initiative_then_stats() {
        let mut stats = MockStatsRepository::new();
        stats
            .expect_upsert_and_get()
            .times(1)
            .returning(|_, _| Ok(stats_row()));

        let chat = Arc::new(RecordingChat::default());
        DiceRedemption
            .execute(&ctx(chat.clone(), stats), &redemption("Tempt the Dice"))
            .await
            .unwrap();

        assert_eq!(
            chat.messages(),
            vec![
                "Viewer has rolled with initiative.".to_string(),
                stats_row().format_line("Viewer"),
            ]
        );
    }
}
