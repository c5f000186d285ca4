// emberbot-core/src/repositories/postgres/stats.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use crate::Error;
use crate::models::{LeaderboardEntry, StatColumn, Stats};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Apply an additive delta to one column, creating the row with default
    /// values on first touch. Safe under concurrent first-touch for the same
    /// user: the final state is always "defaults plus every applied delta".
    async fn modify_stat(
        &self,
        user_id: &str,
        username: &str,
        column: StatColumn,
        delta: i64,
    ) -> Result<(), Error>;

    async fn get_stats(&self, user_id: &str) -> Result<Option<Stats>, Error>;

    /// Fetch the user's record, creating it with defaults if absent. The
    /// stored username is overwritten on every touch.
    async fn upsert_and_get(&self, user_id: &str, username: &str) -> Result<Stats, Error>;

    /// Top holder per stat column. Columns with no rows are omitted.
    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, Error>;
}

#[derive(Clone)]
pub struct PostgresStatsRepository {
    pool: Pool<Postgres>,
}

impl PostgresStatsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn try_increment(
        &self,
        user_id: &str,
        username: &str,
        column: StatColumn,
        delta: i64,
    ) -> Result<u64, Error> {
        // `column` is a parsed StatColumn, never raw user text.
        let sql = format!(
            "UPDATE stats SET {col} = {col} + $1, username = $2 WHERE user_id = $3",
            col = column.as_str()
        );
        let result = sqlx::query(&sql)
            .bind(delta)
            .bind(username)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_default_row(&self, user_id: &str, username: &str) -> Result<(), Error> {
        // DO NOTHING tolerates losing the insert race to a concurrent
        // first-touch; both writers retry the update against the same row.
        sqlx::query(
            r#"
            INSERT INTO stats (user_id, username)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    async fn modify_stat(
        &self,
        user_id: &str,
        username: &str,
        column: StatColumn,
        delta: i64,
    ) -> Result<(), Error> {
        let updated = self.try_increment(user_id, username, column, delta).await?;
        if updated == 0 {
            self.insert_default_row(user_id, username).await?;
            let retried = self.try_increment(user_id, username, column, delta).await?;
            if retried == 0 {
                return Err(Error::Database(sqlx::Error::RowNotFound));
            }
        }
        Ok(())
    }

    async fn get_stats(&self, user_id: &str) -> Result<Option<Stats>, Error> {
        let row = sqlx::query_as::<_, Stats>(
            r#"
            SELECT user_id, username, strength, intelligence, charisma, luck, dexterity, vigor
            FROM stats
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_and_get(&self, user_id: &str, username: &str) -> Result<Stats, Error> {
        let stats = sqlx::query_as::<_, Stats>(
            r#"
            INSERT INTO stats (user_id, username)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET username = EXCLUDED.username
            RETURNING user_id, username, strength, intelligence, charisma, luck, dexterity, vigor
            "#,
        )
        .bind(user_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, Error> {
        let mut entries = Vec::with_capacity(StatColumn::ALL.len());
        for column in StatColumn::ALL {
            let sql = format!(
                "SELECT username, {col} AS value FROM stats ORDER BY {col} DESC, username ASC LIMIT 1",
                col = column.as_str()
            );
            if let Some(row) = sqlx::query(&sql).fetch_optional(&self.pool).await? {
                entries.push(LeaderboardEntry {
                    column,
                    username: row.try_get("username")?,
                    value: row.try_get("value")?,
                });
            }
        }
        Ok(entries)
    }
}
