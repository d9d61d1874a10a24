//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Setup test database:
//!   docker-compose -f docker-compose.test.yml up -d test-db
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `voteroom_test`)
//!   `TEST_DB_PASSWORD` (default: `voteroom_test`)
//!   `TEST_DB_NAME` (default: `voteroom_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set, SqlxPostgresConnector};
use voteroom_common::AppError;
use voteroom_db::{
    entities::{Candidate, candidate, room, user},
    repositories::{CandidateRepository, RoomRepository, UserRepository, VoteReceiptRepository},
    test_utils::{TestDatabase, TestDbConfig},
};

async fn seed_user(db: &Arc<DatabaseConnection>, id: &str) -> user::Model {
    UserRepository::new(Arc::clone(db))
        .create(user::ActiveModel {
            id: Set(id.to_string()),
            email: Set(format!("{id}@example.com")),
            password_hash: Set("x".to_string()),
            role: Set(user::UserRole::Voter),
            token: Set(Some(format!("token-{id}"))),
            name: Set(None),
            national_id: Set(None),
            address: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        })
        .await
        .unwrap()
}

async fn seed_room(db: &Arc<DatabaseConnection>, id: &str) -> room::Model {
    RoomRepository::new(Arc::clone(db))
        .create(room::ActiveModel {
            id: Set(id.to_string()),
            code: Set(format!("CODE-{id}")),
            name: Set("Election".to_string()),
            allowed_emails: Set(serde_json::json!([])),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap()
}

async fn seed_candidate(db: &Arc<DatabaseConnection>, room_id: &str, id: &str) -> candidate::Model {
    CandidateRepository::new(Arc::clone(db))
        .create(candidate::ActiveModel {
            id: Set(id.to_string()),
            room_id: Set(room_id.to_string()),
            name: Set(id.to_string()),
            votes: Set(0),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_cleanup() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    let result = db.cleanup().await;
    assert!(result.is_ok(), "Cleanup failed: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_votes_both_count() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        test_db.conn.get_postgres_connection_pool().clone(),
    ));

    seed_room(&db, "r1").await;
    seed_candidate(&db, "r1", "alice").await;
    seed_user(&db, "u1").await;
    seed_user(&db, "u2").await;

    let repo = VoteReceiptRepository::new(Arc::clone(&db));
    let (a, b) = tokio::join!(
        repo.record_vote("r1", "u1", "alice"),
        repo.record_vote("r1", "u2", "alice"),
    );
    a.unwrap();
    b.unwrap();

    let alice = Candidate::find_by_id("alice")
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.votes, 2);
    assert_eq!(repo.count_for_candidate("alice").await.unwrap(), 2);

    test_db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_second_vote_is_refused_and_tally_unchanged() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        test_db.conn.get_postgres_connection_pool().clone(),
    ));

    seed_room(&db, "r1").await;
    seed_candidate(&db, "r1", "alice").await;
    seed_candidate(&db, "r1", "bob").await;
    seed_user(&db, "u1").await;

    let repo = VoteReceiptRepository::new(Arc::clone(&db));
    repo.record_vote("r1", "u1", "alice").await.unwrap();

    let second = repo.record_vote("r1", "u1", "bob").await;
    assert!(matches!(second, Err(AppError::AlreadyVoted)));

    let bob = Candidate::find_by_id("bob")
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.votes, 0);
    assert_eq!(repo.count_for_candidate("alice").await.unwrap(), 1);

    test_db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_racing_double_vote_counts_once() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        test_db.conn.get_postgres_connection_pool().clone(),
    ));

    seed_room(&db, "r1").await;
    seed_candidate(&db, "r1", "alice").await;
    seed_user(&db, "u1").await;

    let repo = VoteReceiptRepository::new(Arc::clone(&db));
    let (a, b) = tokio::join!(
        repo.record_vote("r1", "u1", "alice"),
        repo.record_vote("r1", "u1", "alice"),
    );
    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);

    let alice = Candidate::find_by_id("alice")
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice.votes, 1);

    test_db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delete_room_cascades() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    let db = Arc::new(SqlxPostgresConnector::from_sqlx_postgres_pool(
        test_db.conn.get_postgres_connection_pool().clone(),
    ));

    seed_room(&db, "r1").await;
    seed_candidate(&db, "r1", "alice").await;
    seed_user(&db, "u1").await;
    VoteReceiptRepository::new(Arc::clone(&db))
        .record_vote("r1", "u1", "alice")
        .await
        .unwrap();

    assert!(RoomRepository::new(Arc::clone(&db)).delete("r1").await.unwrap());

    let remaining = CandidateRepository::new(Arc::clone(&db))
        .find_by_room("r1")
        .await
        .unwrap();
    assert!(remaining.is_empty());
    assert!(
        !VoteReceiptRepository::new(Arc::clone(&db))
            .has_voted("r1", "u1")
            .await
            .unwrap()
    );

    test_db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}
