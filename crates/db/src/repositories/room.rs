//! Room repository.

use std::sync::Arc;

use crate::entities::{Room, room};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::json;
use voteroom_common::{AppError, AppResult};

/// Room repository for database operations.
#[derive(Clone)]
pub struct RoomRepository {
    db: Arc<DatabaseConnection>,
}

impl RoomRepository {
    /// Create a new room repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a room by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<room::Model>> {
        Room::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a room by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<room::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::RoomNotFound(id.to_string()))
    }

    /// Find a room by its join code (exact match).
    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<room::Model>> {
        Room::find()
            .filter(room::Column::Code.eq(code))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all rooms, newest first.
    pub async fn find_all(&self) -> AppResult<Vec<room::Model>> {
        Room::find()
            .order_by_desc(room::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new room.
    pub async fn create(&self, model: room::ActiveModel) -> AppResult<room::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite a room's allow-list.
    pub async fn set_allowed_emails(
        &self,
        room: room::Model,
        emails: &[String],
    ) -> AppResult<room::Model> {
        let mut active: room::ActiveModel = room.into();
        active.allowed_emails = Set(json!(emails));

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a room. Candidates and receipts go with it through the
    /// foreign-key cascade. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = Room::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_room(id: &str, code: &str) -> room::Model {
        room::Model {
            id: id.to_string(),
            code: code.to_string(),
            name: "Test Room".to_string(),
            allowed_emails: json!(["voter@x.com"]),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_code() {
        let room = create_test_room("room1", "ABC123");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[room.clone()]])
                .into_connection(),
        );

        let repo = RoomRepository::new(db);
        let result = repo.find_by_code("ABC123").await.unwrap();

        assert_eq!(result.unwrap().id, "room1");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<room::Model>::new()])
                .into_connection(),
        );

        let repo = RoomRepository::new(db);
        let result = repo.get_by_id("nope").await;

        match result {
            Err(AppError::RoomNotFound(id)) => assert_eq!(id, "nope"),
            _ => panic!("Expected RoomNotFound error"),
        }
    }

    #[tokio::test]
    async fn test_delete_reports_missing_row() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = RoomRepository::new(db);
        assert!(!repo.delete("room1").await.unwrap());
    }
}
