//! Candidate repository.

use std::sync::Arc;

use crate::entities::{Candidate, candidate};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use voteroom_common::{AppError, AppResult};

/// Candidate repository for database operations.
#[derive(Clone)]
pub struct CandidateRepository {
    db: Arc<DatabaseConnection>,
}

impl CandidateRepository {
    /// Create a new candidate repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// List a room's candidates in insertion order.
    pub async fn find_by_room(&self, room_id: &str) -> AppResult<Vec<candidate::Model>> {
        Candidate::find()
            .filter(candidate::Column::RoomId.eq(room_id))
            .order_by_asc(candidate::Column::CreatedAt)
            .order_by_asc(candidate::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new candidate.
    pub async fn create(&self, model: candidate::ActiveModel) -> AppResult<candidate::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
