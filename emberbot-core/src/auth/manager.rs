// emberbot-core/src/auth/manager.rs

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::Error;
use crate::auth::TokenRefresher;
use crate::models::{IdentityRole, TokenPair};
use crate::repositories::TokenRepository;

/// Owns one identity's token pair for the life of the process.
///
/// Reads are cheap and tear-free; refreshes are single-flighted per
/// identity so a stampede of 401s from concurrent senders produces exactly
/// one refresh, with the stragglers reusing its result.
pub struct CredentialManager {
    role: IdentityRole,
    refresher: Arc<dyn TokenRefresher>,
    repo: Arc<dyn TokenRepository>,
    tokens: RwLock<TokenPair>,
    refresh_lock: Mutex<()>,
}

impl CredentialManager {
    /// Build the manager from the best available pair (stored row wins over
    /// the configured seed pair) and refresh once up front. A failed initial
    /// refresh is fatal for this identity.
    pub async fn bootstrap(
        role: IdentityRole,
        refresher: Arc<dyn TokenRefresher>,
        repo: Arc<dyn TokenRepository>,
        seed: TokenPair,
    ) -> Result<Arc<Self>, Error> {
        let initial = match repo.load(role).await? {
            Some(pair) => {
                info!(role = %role, "loaded tokens from database");
                pair
            }
            None => {
                info!(role = %role, "using seed tokens from configuration");
                seed
            }
        };

        let manager = Arc::new(Self {
            role,
            refresher,
            repo,
            tokens: RwLock::new(initial),
            refresh_lock: Mutex::new(()),
        });
        manager
            .refresh_now()
            .await
            .map_err(|e| Error::Auth(format!("initial refresh for {role} failed: {e}")))?;
        Ok(manager)
    }

    pub fn role(&self) -> IdentityRole {
        self.role
    }

    pub async fn access_token(&self) -> String {
        self.tokens.read().await.access_token.clone()
    }

    /// Refresh unless another caller already did. `seen_token` is the access
    /// token the caller just had rejected; if the current token differs, a
    /// concurrent refresh has already replaced it and we reuse that result.
    pub async fn refresh_if_stale(&self, seen_token: &str) -> Result<(), Error> {
        let _guard = self.refresh_lock.lock().await;
        if self.tokens.read().await.access_token != seen_token {
            debug!(role = %self.role, "token already refreshed by a concurrent caller");
            return Ok(());
        }
        self.do_refresh().await
    }

    pub async fn refresh_now(&self) -> Result<(), Error> {
        let _guard = self.refresh_lock.lock().await;
        self.do_refresh().await
    }

    // Caller must hold `refresh_lock`.
    async fn do_refresh(&self) -> Result<(), Error> {
        let refresh_token = self.tokens.read().await.refresh_token.clone();
        let pair = self.refresher.refresh(&refresh_token).await?;
        *self.tokens.write().await = pair.clone();
        info!(role = %self.role, "tokens refreshed");

        // The in-memory pair stays authoritative even if persistence fails.
        if let Err(e) = self.repo.save(self.role, &pair).await {
            warn!(role = %self.role, err = %e, "failed to persist refreshed tokens");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingRefresher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(Error::Auth("refresh grant revoked".into()));
            }
            Ok(TokenPair::new(
                format!("access-{n}"),
                format!("refresh-from-{refresh_token}"),
            ))
        }
    }

    #[derive(Default)]
    struct MemoryTokenRepo {
        stored: parking_lot::Mutex<Option<TokenPair>>,
        fail_save: bool,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl TokenRepository for MemoryTokenRepo {
        async fn load(&self, _role: IdentityRole) -> Result<Option<TokenPair>, Error> {
            Ok(self.stored.lock().clone())
        }

        async fn save(&self, _role: IdentityRole, pair: &TokenPair) -> Result<(), Error> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail_save {
                return Err(Error::Database(sqlx::Error::PoolClosed));
            }
            *self.stored.lock() = Some(pair.clone());
            Ok(())
        }
    }

    fn seed() -> TokenPair {
        TokenPair::new("seed-access", "seed-refresh")
    }

    #[tokio::test]
    async fn bootstrap_refreshes_and_persists() {
        let refresher = CountingRefresher::new();
        let repo = Arc::new(MemoryTokenRepo::default());
        let manager = CredentialManager::bootstrap(
            IdentityRole::Bot,
            refresher.clone(),
            repo.clone(),
            seed(),
        )
        .await
        .unwrap();

        assert_eq!(refresher.calls(), 1);
        assert_eq!(manager.access_token().await, "access-1");
        assert_eq!(
            repo.stored.lock().as_ref().unwrap().access_token,
            "access-1"
        );
    }

    #[tokio::test]
    async fn bootstrap_prefers_stored_tokens_over_seed() {
        let refresher = CountingRefresher::new();
        let repo = Arc::new(MemoryTokenRepo::default());
        *repo.stored.lock() = Some(TokenPair::new("db-access", "db-refresh"));

        let manager = CredentialManager::bootstrap(
            IdentityRole::Owner,
            refresher.clone(),
            repo.clone(),
            seed(),
        )
        .await
        .unwrap();

        // The refresher saw the stored refresh token, not the seed one.
        let pair = manager.tokens.read().await.clone();
        assert_eq!(pair.refresh_token, "refresh-from-db-refresh");
    }

    #[tokio::test]
    async fn bootstrap_fails_when_initial_refresh_fails() {
        let refresher = CountingRefresher::failing();
        let repo = Arc::new(MemoryTokenRepo::default());
        let result =
            CredentialManager::bootstrap(IdentityRole::Bot, refresher, repo, seed()).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn concurrent_stale_refreshes_single_flight() {
        let refresher = CountingRefresher::new();
        let repo = Arc::new(MemoryTokenRepo::default());
        let manager = CredentialManager::bootstrap(
            IdentityRole::Bot,
            refresher.clone(),
            repo,
            seed(),
        )
        .await
        .unwrap();

        let seen = manager.access_token().await;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let seen = seen.clone();
            handles.push(tokio::spawn(async move {
                manager.refresh_if_stale(&seen).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // One bootstrap refresh plus exactly one for the whole stampede.
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test]
    async fn refresh_if_stale_skips_when_token_already_rotated() {
        let refresher = CountingRefresher::new();
        let repo = Arc::new(MemoryTokenRepo::default());
        let manager = CredentialManager::bootstrap(
            IdentityRole::Bot,
            refresher.clone(),
            repo,
            seed(),
        )
        .await
        .unwrap();

        manager.refresh_if_stale("some-older-token").await.unwrap();
        assert_eq!(refresher.calls(), 1, "no refresh for an already-rotated token");
    }

    #[tokio::test]
    async fn persistence_failure_keeps_in_memory_pair() {
        let refresher = CountingRefresher::new();
        let repo = Arc::new(MemoryTokenRepo {
            fail_save: true,
            ..Default::default()
        });
        let manager = CredentialManager::bootstrap(
            IdentityRole::Bot,
            refresher.clone(),
            repo.clone(),
            seed(),
        )
        .await
        .unwrap();

        assert_eq!(manager.access_token().await, "access-1");
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }
}
