// emberbot-core/src/repositories/postgres/collections.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use crate::Error;
use crate::models::{CollectionRow, CompletedCollection, RewardOutcome};

/// Map a slot number onto its column name. Rejecting out-of-range slots here
/// is what keeps the formatted query structurally safe.
fn slot_column(slot: u8) -> Result<&'static str, Error> {
    match slot {
        1 => Ok("reward1"),
        2 => Ok("reward2"),
        3 => Ok("reward3"),
        4 => Ok("reward4"),
        5 => Ok("reward5"),
        6 => Ok("reward6"),
        7 => Ok("reward7"),
        8 => Ok("reward8"),
        other => Err(Error::Parse(format!("invalid reward slot: {other}"))),
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    async fn get_collection(
        &self,
        user_id: &str,
        collection_type: &str,
    ) -> Result<Option<CollectionRow>, Error>;

    /// Set one slot, creating the row on first touch. Reports whether the
    /// slot was newly acquired and returns the updated owned-slot list; a
    /// draw landing on an already-owned slot is a state no-op but still a
    /// reportable redemption.
    async fn add_reward(
        &self,
        user_id: &str,
        username: &str,
        collection_type: &str,
        slot: u8,
    ) -> Result<RewardOutcome, Error>;

    /// Zero every slot for the (user, collection type) pair.
    async fn reset_collection(&self, user_id: &str, collection_type: &str) -> Result<(), Error>;

    /// Users owning every slot, grouped by collection type.
    async fn completed_collections(&self) -> Result<Vec<CompletedCollection>, Error>;
}

#[derive(Clone)]
pub struct PostgresCollectionRepository {
    pool: Pool<Postgres>,
}

impl PostgresCollectionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const COLLECTION_COLUMNS: &str = "user_id, username, collection_type, \
     reward1, reward2, reward3, reward4, reward5, reward6, reward7, reward8";

#[async_trait]
impl CollectionRepository for PostgresCollectionRepository {
    async fn get_collection(
        &self,
        user_id: &str,
        collection_type: &str,
    ) -> Result<Option<CollectionRow>, Error> {
        let sql = format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE user_id = $1 AND collection_type = $2"
        );
        let row = sqlx::query_as::<_, CollectionRow>(&sql)
            .bind(user_id)
            .bind(collection_type)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn add_reward(
        &self,
        user_id: &str,
        username: &str,
        collection_type: &str,
        slot: u8,
    ) -> Result<RewardOutcome, Error> {
        let column = slot_column(slot)?;

        let had_before = self
            .get_collection(user_id, collection_type)
            .await?
            .map(|row| row.has_slot(slot))
            .unwrap_or(false);

        let sql = format!(
            r#"
            INSERT INTO collections (user_id, username, collection_type, {column})
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (user_id, collection_type)
            DO UPDATE SET {column} = TRUE, username = EXCLUDED.username
            "#
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(username)
            .bind(collection_type)
            .execute(&self.pool)
            .await?;

        let updated = self
            .get_collection(user_id, collection_type)
            .await?
            .ok_or(Error::Database(sqlx::Error::RowNotFound))?;

        Ok(RewardOutcome {
            is_new: !had_before,
            owned: updated.owned_slots(),
        })
    }

    async fn reset_collection(&self, user_id: &str, collection_type: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE collections
            SET reward1 = FALSE, reward2 = FALSE, reward3 = FALSE, reward4 = FALSE,
                reward5 = FALSE, reward6 = FALSE, reward7 = FALSE, reward8 = FALSE
            WHERE user_id = $1 AND collection_type = $2
            "#,
        )
        .bind(user_id)
        .bind(collection_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn completed_collections(&self) -> Result<Vec<CompletedCollection>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT collection_type, string_agg(username, ',' ORDER BY username) AS usernames_csv
            FROM collections
            WHERE reward1 AND reward2 AND reward3 AND reward4
              AND reward5 AND reward6 AND reward7 AND reward8
            GROUP BY collection_type
            ORDER BY collection_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let csv: String = row.try_get("usernames_csv")?;
            results.push(CompletedCollection {
                collection_type: row.try_get("collection_type")?,
                usernames: csv.split(',').map(str::to_string).collect(),
            });
        }
        Ok(results)
    }
}
