// emberbot-core/src/services/twitch/builtin_commands/mod.rs

pub mod collections;
pub mod stats;

pub use collections::{
    CompletedSeriesCommand, SeriesRedeemCommand, SeriesResetCommand, SeriesShowCommand,
};
pub use stats::{LeaderboardCommand, ModifyStatCommand, StatsCommand};
