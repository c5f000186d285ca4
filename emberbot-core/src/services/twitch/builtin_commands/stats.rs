// emberbot-core/src/services/twitch/builtin_commands/stats.rs

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, warn};

use crate::Error;
use crate::models::StatColumn;
use crate::platforms::twitch_eventsub::events::ChannelChatMessage;
use crate::services::twitch::dispatcher::{BotContext, ChatCommand};

/// !stats: show the caller's stat line, creating the record on first use.
pub struct StatsCommand;

#[async_trait]
impl ChatCommand for StatsCommand {
    fn matches(&self, keyword: &str) -> bool {
        keyword == "stats"
    }

    async fn execute(&self, ctx: &BotContext, event: &ChannelChatMessage) -> Result<(), Error> {
        let stats = ctx
            .stats
            .upsert_and_get(&event.chatter_user_id, &event.chatter_user_name)
            .await?;
        ctx.chat
            .send(
                &stats.format_line(&event.chatter_user_name),
                Some(&event.message_id),
            )
            .await
    }
}

/// !leaderboard: the top holder of every stat, one line.
pub struct LeaderboardCommand;

fn column_emoji(column: StatColumn) -> &'static str {
    match column {
        StatColumn::Strength => "💪",
        StatColumn::Intelligence => "🧠",
        StatColumn::Charisma => "✨",
        StatColumn::Luck => "🍀",
        StatColumn::Dexterity => "🤸",
        StatColumn::Vigor => "🔥",
    }
}

#[async_trait]
impl ChatCommand for LeaderboardCommand {
    fn matches(&self, keyword: &str) -> bool {
        keyword == "leaderboard"
    }

    async fn execute(&self, ctx: &BotContext, _event: &ChannelChatMessage) -> Result<(), Error> {
        let entries = ctx.stats.leaderboard().await?;
        if entries.is_empty() {
            return ctx.chat.send("No stats recorded yet.", None).await;
        }

        let parts: Vec<String> = entries
            .iter()
            .map(|e| format!("{} {}({})", column_emoji(e.column), e.username, e.value))
            .collect();
        let message = format!("Stats leaderboard: {}", parts.join(" | "));
        ctx.chat.send(&message, None).await
    }
}

/// !addstat / !rmstat: moderator-only stat adjustment for a mentioned user.
pub struct ModifyStatCommand;

static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)").unwrap());

/// Parses `!addstat @user column amount` (or !rmstat). The column goes
/// through `StatColumn::from_str`, so arbitrary text never reaches SQL.
fn parse_modify_stat(text: &str) -> Result<(String, StatColumn, i64), Error> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(Error::Parse(
            "expected format: !addstat/!rmstat @user stat amount".into(),
        ));
    }

    let Some(caps) = MENTION_RE.captures(text) else {
        return Err(Error::Parse("no user mention found".into()));
    };
    let login = caps[1].to_lowercase();

    let column: StatColumn = parts[2].parse()?;
    let amount: i64 = parts[3]
        .parse()
        .map_err(|_| Error::Parse("invalid amount".into()))?;

    Ok((login, column, amount))
}

#[async_trait]
impl ChatCommand for ModifyStatCommand {
    fn moderator_only(&self) -> bool {
        true
    }

    fn matches(&self, keyword: &str) -> bool {
        keyword == "addstat" || keyword == "rmstat"
    }

    async fn execute(&self, ctx: &BotContext, event: &ChannelChatMessage) -> Result<(), Error> {
        let text = event.message.text.trim();
        let is_remove = text.to_lowercase().starts_with("!rmstat");

        let (login, column, amount) = match parse_modify_stat(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(err = %e, msg = %text, "invalid modify stat command");
                return ctx.chat.send(&e.to_string(), Some(&event.message_id)).await;
            }
        };

        let Some(user) = ctx.directory.user_by_login(&login).await? else {
            error!(login = %login, "no such user for stat modification");
            return ctx.chat.send("Failed to find user", Some(&event.message_id)).await;
        };

        let delta = if is_remove { -amount } else { amount };
        ctx.stats
            .modify_stat(&user.id, &user.login, column, delta)
            .await?;

        let stats = ctx.stats.upsert_and_get(&user.id, &user.login).await?;
        ctx.chat.send(&stats.format_line(&user.login), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_commands() {
        let (login, column, amount) = parse_modify_stat("!addstat @Viewer luck 5").unwrap();
        assert_eq!(login, "viewer");
        assert_eq!(column, StatColumn::Luck);
        assert_eq!(amount, 5);
    }

    #[test]
    fn rejects_missing_mention() {
        assert!(parse_modify_stat("!addstat viewer luck 5").is_err());
    }

    #[test]
    fn rejects_unknown_columns() {
        assert!(parse_modify_stat("!addstat @viewer mana 5").is_err());
        assert!(parse_modify_stat("!addstat @viewer \"luck;--\" 5").is_err());
    }

    #[test]
    fn rejects_short_and_malformed_input() {
        assert!(parse_modify_stat("!addstat @viewer luck").is_err());
        assert!(parse_modify_stat("!addstat @viewer luck five").is_err());
    }

    #[test]
    fn accepts_negative_amounts() {
        let (_, _, amount) = parse_modify_stat("!addstat @viewer luck -3").unwrap();
        assert_eq!(amount, -3);
    }
}
