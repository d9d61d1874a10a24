//! Vote receipt repository.
//!
//! Casting a vote touches two rows: the candidate counter and the receipt.
//! [`VoteReceiptRepository::record_vote`] performs both inside one
//! transaction that first asserts the receipt is absent, so a committed
//! receipt always has exactly one matching increment.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set, SqlErr, TransactionTrait, sea_query::Expr,
};
use tracing::debug;
use voteroom_common::{AppError, AppResult};

use crate::entities::{Candidate, VoteReceipt, candidate, vote_receipt};

/// Vote receipt repository for database operations.
#[derive(Clone)]
pub struct VoteReceiptRepository {
    db: Arc<DatabaseConnection>,
}

fn db_err(e: DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Roll back and surface `err`. A failed rollback is logged; the connection
/// discards the transaction either way.
async fn abort<T>(txn: DatabaseTransaction, err: AppError) -> AppResult<T> {
    if let Err(e) = txn.rollback().await {
        tracing::warn!(error = %e, "Rollback failed");
    }
    Err(err)
}

impl VoteReceiptRepository {
    /// Create a new vote receipt repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the receipt for a (room, user) pair.
    pub async fn find(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> AppResult<Option<vote_receipt::Model>> {
        VoteReceipt::find_by_id((room_id.to_string(), user_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Check if a user has voted in a room.
    pub async fn has_voted(&self, room_id: &str, user_id: &str) -> AppResult<bool> {
        Ok(self.find(room_id, user_id).await?.is_some())
    }

    /// Count receipts referencing a candidate.
    pub async fn count_for_candidate(&self, candidate_id: &str) -> AppResult<u64> {
        VoteReceipt::find()
            .filter(vote_receipt::Column::CandidateId.eq(candidate_id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Record a vote: increment the candidate and write the receipt in one
    /// transaction.
    ///
    /// Fails with [`AppError::AlreadyVoted`] if a receipt exists when the
    /// transaction reads it, or if a concurrent transaction inserts one
    /// first (unique violation on the primary key). Fails with
    /// [`AppError::NotFound`] if the candidate is not in the room. Nothing
    /// is written in either case.
    pub async fn record_vote(
        &self,
        room_id: &str,
        user_id: &str,
        candidate_id: &str,
    ) -> AppResult<vote_receipt::Model> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let existing = VoteReceipt::find_by_id((room_id.to_string(), user_id.to_string()))
            .one(&txn)
            .await;
        match existing {
            Ok(Some(_)) => return abort(txn, AppError::AlreadyVoted).await,
            Ok(None) => {}
            Err(e) => return abort(txn, db_err(e)).await,
        }

        let updated = Candidate::update_many()
            .col_expr(
                candidate::Column::Votes,
                Expr::col(candidate::Column::Votes).add(1),
            )
            .filter(candidate::Column::Id.eq(candidate_id))
            .filter(candidate::Column::RoomId.eq(room_id))
            .exec(&txn)
            .await;
        match updated {
            Ok(res) if res.rows_affected == 0 => {
                return abort(
                    txn,
                    AppError::NotFound(format!("Candidate not found: {candidate_id}")),
                )
                .await;
            }
            Ok(_) => {}
            Err(e) => return abort(txn, db_err(e)).await,
        }

        let receipt = vote_receipt::ActiveModel {
            room_id: Set(room_id.to_string()),
            user_id: Set(user_id.to_string()),
            candidate_id: Set(candidate_id.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await;
        let receipt = match receipt {
            Ok(receipt) => receipt,
            Err(e) => {
                let err = match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => AppError::AlreadyVoted,
                    _ => db_err(e),
                };
                return abort(txn, err).await;
            }
        };

        txn.commit().await.map_err(db_err)?;

        debug!(room_id, user_id, candidate_id, "Vote committed");
        Ok(receipt)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_receipt(candidate_id: &str) -> vote_receipt::Model {
        vote_receipt::Model {
            room_id: "room1".to_string(),
            user_id: "user1".to_string(),
            candidate_id: candidate_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_record_vote_commits_increment_and_receipt() {
        let receipt = create_test_receipt("alice");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<vote_receipt::Model>::new()])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([[receipt.clone()]])
                .into_connection(),
        );

        let repo = VoteReceiptRepository::new(db);
        let result = repo.record_vote("room1", "user1", "alice").await.unwrap();

        assert_eq!(result.candidate_id, "alice");
        assert_eq!(result.user_id, "user1");
    }

    #[tokio::test]
    async fn test_record_vote_refuses_existing_receipt() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_receipt("alice")]])
                .into_connection(),
        );

        let repo = VoteReceiptRepository::new(db);
        let result = repo.record_vote("room1", "user1", "bob").await;

        assert!(matches!(result, Err(AppError::AlreadyVoted)));
    }

    #[tokio::test]
    async fn test_record_vote_unknown_candidate() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<vote_receipt::Model>::new()])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = VoteReceiptRepository::new(db);
        let result = repo.record_vote("room1", "user1", "ghost").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_has_voted() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_receipt("alice")]])
                .append_query_results([Vec::<vote_receipt::Model>::new()])
                .into_connection(),
        );

        let repo = VoteReceiptRepository::new(db);
        assert!(repo.has_voted("room1", "user1").await.unwrap());
        assert!(!repo.has_voted("room1", "user2").await.unwrap());
    }
}
