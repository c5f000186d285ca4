// emberbot-core/src/repositories/mod.rs

pub mod postgres;

pub use postgres::collections::{CollectionRepository, PostgresCollectionRepository};
pub use postgres::stats::{PostgresStatsRepository, StatsRepository};
pub use postgres::tokens::{PostgresTokenRepository, TokenRepository};
