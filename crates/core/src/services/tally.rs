//! Live tally service.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use voteroom_common::{AppError, AppResult};
use voteroom_db::{
    entities::candidate,
    repositories::{CandidateRepository, RoomRepository, VoteReceiptRepository},
};

use crate::access::SessionUser;
use crate::services::hub::{Hub, Subscription};

/// Per-room channel buffer. Each value is a full snapshot, so a lagging
/// listener only needs the latest one.
const TALLY_CHANNEL_CAPACITY: usize = 16;

/// One candidate's line in a tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTally {
    pub id: String,
    pub name: String,
    pub votes: i32,
}

impl From<candidate::Model> for CandidateTally {
    fn from(c: candidate::Model) -> Self {
        Self {
            id: c.id,
            name: c.name,
            votes: c.votes,
        }
    }
}

/// Every candidate of a room with its current count, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallySnapshot {
    pub room_id: String,
    pub candidates: Vec<CandidateTally>,
    /// Sum of all counts.
    pub total_votes: i64,
}

impl TallySnapshot {
    fn new(room_id: &str, candidates: Vec<candidate::Model>) -> Self {
        let candidates: Vec<CandidateTally> =
            candidates.into_iter().map(CandidateTally::from).collect();
        Self {
            room_id: room_id.to_string(),
            total_votes: candidates.iter().map(|c| i64::from(c.votes)).sum(),
            candidates,
        }
    }
}

/// Tally service: snapshots and live updates of room results.
#[derive(Clone)]
pub struct TallyService {
    room_repo: RoomRepository,
    candidate_repo: CandidateRepository,
    receipt_repo: VoteReceiptRepository,
    hub: Hub<TallySnapshot>,
}

impl TallyService {
    /// Create a new tally service.
    #[must_use]
    pub fn new(
        room_repo: RoomRepository,
        candidate_repo: CandidateRepository,
        receipt_repo: VoteReceiptRepository,
    ) -> Self {
        Self {
            room_repo,
            candidate_repo,
            receipt_repo,
            hub: Hub::new(TALLY_CHANNEL_CAPACITY),
        }
    }

    /// Read the current tally of a room.
    pub async fn snapshot(&self, room_id: &str) -> AppResult<TallySnapshot> {
        self.room_repo.get_by_id(room_id).await?;
        self.read(room_id).await
    }

    /// Subscribe to a room's tally and read its current state.
    ///
    /// The listener is registered before the read, so a change landing in
    /// between is delivered on the subscription.
    pub async fn watch(
        &self,
        room_id: &str,
    ) -> AppResult<(TallySnapshot, Subscription<TallySnapshot>)> {
        self.room_repo.get_by_id(room_id).await?;

        let subscription = self.hub.subscribe(room_id);
        let snapshot = self.read(room_id).await?;
        Ok((snapshot, subscription))
    }

    /// Re-read a room's tally and push it to its listeners.
    ///
    /// Failures are logged, not returned: the triggering write has already
    /// committed.
    pub async fn publish(&self, room_id: &str) {
        if self.hub.listener_count(room_id) == 0 {
            return;
        }
        match self.read(room_id).await {
            Ok(snapshot) => {
                let reached = self.hub.publish(room_id, snapshot);
                debug!(room_id, reached, "Tally published");
            }
            Err(e) => warn!(room_id, error = %e, "Failed to publish tally"),
        }
    }

    /// Check that `user` may see a room's results: admins always, voters
    /// only while on the allow-list and once they have voted there.
    pub async fn ensure_can_view(&self, room_id: &str, user: &SessionUser) -> AppResult<()> {
        if user.is_admin() {
            return Ok(());
        }
        let room = self.room_repo.get_by_id(room_id).await?;
        if !room.allows(&user.email) {
            return Err(AppError::NotEligible);
        }
        if self.receipt_repo.has_voted(room_id, &user.id).await? {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Results are available after voting".to_string(),
            ))
        }
    }

    /// End every live view of a room. Call once the room is deleted.
    pub fn close_room(&self, room_id: &str) {
        let closed = self.hub.close(room_id);
        if closed > 0 {
            debug!(room_id, closed, "Live tally views ended");
        }
    }

    /// Number of live result listeners for a room.
    #[must_use]
    pub fn listener_count(&self, room_id: &str) -> usize {
        self.hub.listener_count(room_id)
    }

    async fn read(&self, room_id: &str) -> AppResult<TallySnapshot> {
        let candidates = self.candidate_repo.find_by_room(room_id).await?;
        Ok(TallySnapshot::new(room_id, candidates))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;
    use std::sync::Arc;
    use voteroom_db::entities::{room, user::UserRole, vote_receipt};

    fn create_test_room() -> room::Model {
        room_allowing(&[])
    }

    fn room_allowing(emails: &[&str]) -> room::Model {
        room::Model {
            id: "room1".to_string(),
            code: "ABC123".to_string(),
            name: "Election".to_string(),
            allowed_emails: json!(emails),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_receipt() -> vote_receipt::Model {
        vote_receipt::Model {
            room_id: "room1".to_string(),
            user_id: "user1".to_string(),
            candidate_id: "a".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_candidate(id: &str, votes: i32) -> candidate::Model {
        candidate::Model {
            id: id.to_string(),
            room_id: "room1".to_string(),
            name: id.to_uppercase(),
            votes,
            created_at: Utc::now().into(),
        }
    }

    fn create_service(db: sea_orm::DatabaseConnection) -> TallyService {
        let db = Arc::new(db);
        TallyService::new(
            RoomRepository::new(Arc::clone(&db)),
            CandidateRepository::new(Arc::clone(&db)),
            VoteReceiptRepository::new(db),
        )
    }

    fn voter(role: UserRole) -> SessionUser {
        SessionUser {
            id: "user1".to_string(),
            email: "a@x.com".to_string(),
            name: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_snapshot_keeps_order_and_counts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_room()]])
            .append_query_results([[create_test_candidate("a", 3), create_test_candidate("b", 5)]])
            .into_connection();
        let service = create_service(db);

        let snapshot = service.snapshot("room1").await.unwrap();
        assert_eq!(snapshot.candidates[0].id, "a");
        assert_eq!(snapshot.candidates[1].votes, 5);
        assert_eq!(snapshot.total_votes, 8);
    }

    #[tokio::test]
    async fn test_snapshot_unknown_room() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<room::Model>::new()])
            .into_connection();
        let service = create_service(db);

        let result = service.snapshot("ghost").await;
        assert!(matches!(result, Err(AppError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn test_watch_delivers_published_snapshot() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_room()]])
            .append_query_results([[create_test_candidate("a", 0)]])
            .append_query_results([[create_test_candidate("a", 1)]])
            .into_connection();
        let service = create_service(db);

        let (initial, mut subscription) = service.watch("room1").await.unwrap();
        assert_eq!(initial.candidates[0].votes, 0);
        assert_eq!(service.listener_count("room1"), 1);

        service.publish("room1").await;
        let next = subscription.recv().await.unwrap();
        assert_eq!(next.candidates[0].votes, 1);

        subscription.stop();
        assert_eq!(service.listener_count("room1"), 0);
    }

    #[tokio::test]
    async fn test_publish_without_listeners_skips_read() {
        let service = create_service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        service.publish("room1").await;
    }

    #[tokio::test]
    async fn test_admin_can_always_view() {
        let service = create_service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        assert!(
            service
                .ensure_can_view("room1", &voter(UserRole::Admin))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_voter_must_vote_before_viewing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[room_allowing(&["a@x.com"])]])
            .append_query_results([Vec::<vote_receipt::Model>::new()])
            .append_query_results([[room_allowing(&["a@x.com"])]])
            .append_query_results([[create_test_receipt()]])
            .into_connection();
        let service = create_service(db);

        let before = service.ensure_can_view("room1", &voter(UserRole::Voter)).await;
        assert!(matches!(before, Err(AppError::Forbidden(_))));

        let after = service.ensure_can_view("room1", &voter(UserRole::Voter)).await;
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn test_voter_removed_from_allow_list_loses_results() {
        // Voted earlier, then dropped from the list by an admin.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[room_allowing(&["other@x.com"])]])
            .append_query_results([[create_test_receipt()]])
            .into_connection();
        let service = create_service(db);

        let result = service.ensure_can_view("room1", &voter(UserRole::Voter)).await;
        assert!(matches!(result, Err(AppError::NotEligible)));
    }

    #[tokio::test]
    async fn test_voter_results_for_unknown_room() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<room::Model>::new()])
            .into_connection();
        let service = create_service(db);

        let result = service.ensure_can_view("ghost", &voter(UserRole::Voter)).await;
        assert!(matches!(result, Err(AppError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn test_close_room_ends_live_views() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_room()]])
            .append_query_results([[create_test_candidate("a", 2)]])
            .into_connection();
        let service = create_service(db);

        let (_, mut subscription) = service.watch("room1").await.unwrap();
        service.close_room("room1");

        assert_eq!(subscription.recv().await, None);
        assert_eq!(service.listener_count("room1"), 0);
    }
}
