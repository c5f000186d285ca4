// emberbot-core/src/repositories/postgres/tokens.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use crate::Error;
use crate::models::{IdentityRole, TokenPair};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn load(&self, role: IdentityRole) -> Result<Option<TokenPair>, Error>;
    async fn save(&self, role: IdentityRole, pair: &TokenPair) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct PostgresTokenRepository {
    pool: Pool<Postgres>,
}

impl PostgresTokenRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn load(&self, role: IdentityRole) -> Result<Option<TokenPair>, Error> {
        let row = sqlx::query(
            r#"
            SELECT access_token, refresh_token
            FROM oauth_tokens
            WHERE identity_role = $1
            "#,
        )
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(TokenPair {
                access_token: r.try_get("access_token")?,
                refresh_token: r.try_get("refresh_token")?,
            })),
            None => Ok(None),
        }
    }

    async fn save(&self, role: IdentityRole, pair: &TokenPair) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens (identity_role, access_token, refresh_token, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (identity_role) DO UPDATE
               SET access_token  = EXCLUDED.access_token,
                   refresh_token = EXCLUDED.refresh_token,
                   updated_at    = now()
            "#,
        )
        .bind(role.as_str())
        .bind(&pair.access_token)
        .bind(&pair.refresh_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
