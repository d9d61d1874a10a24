//! Vote service.

use serde::{Deserialize, Serialize};
use tracing::info;
use voteroom_common::{AppError, AppResult};
use voteroom_db::{entities::vote_receipt, repositories::VoteReceiptRepository};

use crate::access::SessionUser;
use crate::services::room::{RoomService, VoterState};
use crate::services::tally::TallyService;

/// Input for casting a vote.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteInput {
    pub candidate_id: String,
    /// The voter's explicit confirmation of the choice.
    #[serde(default)]
    pub confirm: bool,
}

/// Result of a committed vote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub receipt: vote_receipt::Model,
    pub state: VoterState,
}

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    rooms: RoomService,
    receipt_repo: VoteReceiptRepository,
    tally: TallyService,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(
        rooms: RoomService,
        receipt_repo: VoteReceiptRepository,
        tally: TallyService,
    ) -> Self {
        Self {
            rooms,
            receipt_repo,
            tally,
        }
    }

    /// Where the caller stands in a room.
    pub async fn status(&self, room_id: &str, user: &SessionUser) -> AppResult<VoterState> {
        self.rooms.voter_state(room_id, user).await
    }

    /// Cast the caller's single vote in a room.
    ///
    /// The counter increment and the receipt commit together or not at
    /// all; a second vote by the same user fails with
    /// [`AppError::AlreadyVoted`] whether it arrives later or races the
    /// first one.
    pub async fn cast_vote(
        &self,
        room_id: &str,
        user: &SessionUser,
        input: CastVoteInput,
    ) -> AppResult<VoteOutcome> {
        if !input.confirm {
            return Err(AppError::ConfirmationRequired);
        }
        if input.candidate_id.trim().is_empty() {
            return Err(AppError::BadRequest("candidateId is required".to_string()));
        }

        self.rooms.gate(room_id, user).await?;

        if self.receipt_repo.has_voted(room_id, &user.id).await? {
            return Err(AppError::AlreadyVoted);
        }

        let receipt = self
            .receipt_repo
            .record_vote(room_id, &user.id, &input.candidate_id)
            .await?;

        info!(
            room_id,
            user_id = %user.id,
            candidate_id = %input.candidate_id,
            "Vote cast"
        );

        self.tally.publish(room_id).await;

        Ok(VoteOutcome {
            receipt,
            state: VoterState::Voted,
        })
    }
}
