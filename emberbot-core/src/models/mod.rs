// emberbot-core/src/models/mod.rs

pub mod collection;
pub mod credential;
pub mod stats;

pub use collection::{CollectionRow, CompletedCollection, RewardOutcome, RewardWeight, draw_weighted_reward, REWARD_SLOTS};
pub use credential::{IdentityRole, TokenPair};
pub use stats::{LeaderboardEntry, StatColumn, Stats};
