//! Candidate service.

use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use tracing::info;
use validator::Validate;
use voteroom_common::{AppError, AppResult, IdGenerator};
use voteroom_db::{
    entities::candidate,
    repositories::{CandidateRepository, RoomRepository},
};

use crate::services::tally::TallyService;

/// Input for adding a candidate.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddCandidateInput {
    #[validate(length(max = 256))]
    pub name: String,
}

/// Candidate service for business logic.
#[derive(Clone)]
pub struct CandidateService {
    room_repo: RoomRepository,
    candidate_repo: CandidateRepository,
    tally: TallyService,
    id_gen: IdGenerator,
}

impl CandidateService {
    /// Create a new candidate service.
    #[must_use]
    pub const fn new(
        room_repo: RoomRepository,
        candidate_repo: CandidateRepository,
        tally: TallyService,
    ) -> Self {
        Self {
            room_repo,
            candidate_repo,
            tally,
            id_gen: IdGenerator::new(),
        }
    }

    /// Add a candidate to a room with a zero count.
    pub async fn add(&self, room_id: &str, input: AddCandidateInput) -> AppResult<candidate::Model> {
        input.validate()?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "Candidate name is required".to_string(),
            ));
        }

        self.room_repo.get_by_id(room_id).await?;

        let model = candidate::ActiveModel {
            id: Set(self.id_gen.generate()),
            room_id: Set(room_id.to_string()),
            name: Set(name.to_string()),
            votes: Set(0),
            created_at: Set(Utc::now().into()),
        };
        let candidate = self.candidate_repo.create(model).await?;

        info!(room_id, candidate_id = %candidate.id, "Candidate added");
        self.tally.publish(room_id).await;

        Ok(candidate)
    }

    /// List a room's candidates in insertion order.
    pub async fn list(&self, room_id: &str) -> AppResult<Vec<candidate::Model>> {
        self.room_repo.get_by_id(room_id).await?;
        self.candidate_repo.find_by_room(room_id).await
    }
}
