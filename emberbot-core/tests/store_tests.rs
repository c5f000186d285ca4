// emberbot-core/tests/store_tests.rs
//
// Exercises the Postgres repositories against a live database. Set
// TEST_DATABASE_URL to run these; without it each test is a no-op skip so
// the suite stays green on machines without Postgres.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use emberbot_core::Database;
use emberbot_core::models::{IdentityRole, StatColumn, TokenPair};
use emberbot_core::repositories::{
    CollectionRepository, PostgresCollectionRepository, PostgresStatsRepository,
    PostgresTokenRepository, StatsRepository, TokenRepository,
};

static NEXT_USER: AtomicU64 = AtomicU64::new(1);

/// Unique per test run and per call, so concurrent tests never share rows.
fn unique_user_id(tag: &str) -> String {
    let n = NEXT_USER.fetch_add(1, Ordering::SeqCst);
    format!("test-{tag}-{}-{n}", std::process::id())
}

async fn test_pool() -> Option<Pool<Postgres>> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");
    Database::from_pool(pool.clone())
        .migrate()
        .await
        .expect("failed to run migrations");
    Some(pool)
}

macro_rules! require_db {
    ($pool:ident) => {
        let Some($pool) = test_pool().await else {
            eprintln!("skipping: TEST_DATABASE_URL not set");
            return;
        };
    };
}

#[tokio::test]
async fn first_touch_creates_defaults_plus_delta() {
    require_db!(pool);
    let repo = PostgresStatsRepository::new(pool);

    for column in StatColumn::ALL {
        let user_id = unique_user_id("first-touch");
        repo.modify_stat(&user_id, "tester", column, 5)
            .await
            .unwrap();

        let stats = repo.get_stats(&user_id).await.unwrap().unwrap();
        assert_eq!(stats.value(column), 5, "column {column}");
        assert_eq!(stats.username, "tester");

        // Every other column stays at its default.
        for other in StatColumn::ALL {
            if other != column {
                assert_eq!(stats.value(other), 0);
            }
        }
    }
}

#[tokio::test]
async fn deltas_accumulate_and_may_go_negative() {
    require_db!(pool);
    let repo = PostgresStatsRepository::new(pool);
    let user_id = unique_user_id("accumulate");

    repo.modify_stat(&user_id, "tester", StatColumn::Luck, 3)
        .await
        .unwrap();
    repo.modify_stat(&user_id, "tester", StatColumn::Luck, -10)
        .await
        .unwrap();

    let stats = repo.get_stats(&user_id).await.unwrap().unwrap();
    assert_eq!(stats.luck, -7);
}

#[tokio::test]
async fn concurrent_first_touch_loses_no_delta() {
    require_db!(pool);
    let repo = Arc::new(PostgresStatsRepository::new(pool.clone()));
    let user_id = unique_user_id("race");

    let mut handles = Vec::new();
    for delta in [7i64, 11] {
        let repo = repo.clone();
        let user_id = user_id.clone();
        handles.push(tokio::spawn(async move {
            repo.modify_stat(&user_id, "racer", StatColumn::Strength, delta)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = repo.get_stats(&user_id).await.unwrap().unwrap();
    assert_eq!(stats.strength, 18, "one of the concurrent deltas was lost");

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM stats WHERE user_id = $1")
        .bind(&user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "concurrent first-touch duplicated the row");
}

#[tokio::test]
async fn upsert_and_get_overwrites_username() {
    require_db!(pool);
    let repo = PostgresStatsRepository::new(pool);
    let user_id = unique_user_id("rename");

    let first = repo.upsert_and_get(&user_id, "old_name").await.unwrap();
    assert_eq!(first.username, "old_name");

    let second = repo.upsert_and_get(&user_id, "new_name").await.unwrap();
    assert_eq!(second.username, "new_name");
    assert_eq!(second.strength, first.strength);
}

#[tokio::test]
async fn reward_is_new_exactly_once_until_reset() {
    require_db!(pool);
    let repo = PostgresCollectionRepository::new(pool);
    let user_id = unique_user_id("collection");

    let first = repo
        .add_reward(&user_id, "tester", "ember", 3)
        .await
        .unwrap();
    assert!(first.is_new);
    assert_eq!(first.owned, vec![3]);

    let second = repo
        .add_reward(&user_id, "tester", "ember", 3)
        .await
        .unwrap();
    assert!(!second.is_new, "duplicate draw reported as new");
    assert_eq!(second.owned, vec![3]);

    let other_slot = repo
        .add_reward(&user_id, "tester", "ember", 7)
        .await
        .unwrap();
    assert!(other_slot.is_new);
    assert_eq!(other_slot.owned, vec![3, 7]);

    // Collection types are independent.
    let other_type = repo
        .add_reward(&user_id, "tester", "aurora", 3)
        .await
        .unwrap();
    assert!(other_type.is_new);

    repo.reset_collection(&user_id, "ember").await.unwrap();
    let after_reset = repo
        .add_reward(&user_id, "tester", "ember", 3)
        .await
        .unwrap();
    assert!(after_reset.is_new, "reset should clear acquired slots");
    assert_eq!(after_reset.owned, vec![3]);
}

#[tokio::test]
async fn completed_collections_lists_full_sets_only() {
    require_db!(pool);
    let repo = PostgresCollectionRepository::new(pool);
    let finisher = unique_user_id("finisher");
    let partial = unique_user_id("partial");
    let collection_type = format!("series-{finisher}");

    for slot in 1..=8 {
        repo.add_reward(&finisher, "finisher", &collection_type, slot)
            .await
            .unwrap();
    }
    repo.add_reward(&partial, "partial", &collection_type, 1)
        .await
        .unwrap();

    let completed = repo.completed_collections().await.unwrap();
    let ours = completed
        .iter()
        .find(|c| c.collection_type == collection_type)
        .expect("completed collection missing");
    assert_eq!(ours.usernames, vec!["finisher".to_string()]);
}

#[tokio::test]
async fn token_rows_upsert_per_role() {
    require_db!(pool);
    let repo = PostgresTokenRepository::new(pool);

    let pair = TokenPair::new("access-1", "refresh-1");
    repo.save(IdentityRole::Bot, &pair).await.unwrap();
    assert_eq!(repo.load(IdentityRole::Bot).await.unwrap(), Some(pair));

    let rotated = TokenPair::new("access-2", "refresh-2");
    repo.save(IdentityRole::Bot, &rotated).await.unwrap();
    assert_eq!(repo.load(IdentityRole::Bot).await.unwrap(), Some(rotated));
}

#[tokio::test]
async fn leaderboard_reports_top_holder() {
    require_db!(pool);
    let repo = PostgresStatsRepository::new(pool);
    let user_id = unique_user_id("leader");
    let username = format!("leader-{user_id}");

    // Big enough that no other test's rows can outrank it.
    repo.modify_stat(&user_id, &username, StatColumn::Charisma, 9_999_999)
        .await
        .unwrap();

    let entries = repo.leaderboard().await.unwrap();
    let charisma = entries
        .iter()
        .find(|e| e.column == StatColumn::Charisma)
        .expect("charisma entry missing");
    assert_eq!(charisma.username, username);
    assert!(charisma.value >= 9_999_999);
}
