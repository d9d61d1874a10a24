//! Room service.
//!
//! Owns the room access gate (join code plus allow-list) and the admin
//! operations on rooms.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;
use voteroom_common::{AppError, AppResult, IdGenerator};
use voteroom_db::{
    entities::{candidate, room},
    repositories::{CandidateRepository, RoomRepository, VoteReceiptRepository},
};

use crate::access::SessionUser;

#[allow(clippy::expect_used)]
static EMAIL_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Where a user stands in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoterState {
    /// Not eligible for the room, so never admitted.
    NotJoined,
    /// Admitted, no vote cast yet.
    JoinedNotVoted,
    /// Vote recorded.
    Voted,
}

/// Input for creating a room.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomInput {
    #[validate(length(max = 64))]
    pub code: String,

    #[validate(length(max = 256))]
    pub name: String,
}

/// Room as shown to an admitted voter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoom {
    pub room_id: String,
    pub name: String,
    pub candidates: Vec<candidate::Model>,
    pub state: VoterState,
}

/// Parse a newline-separated allow-list.
///
/// Lines are trimmed, kept only when they look like an email address,
/// lower-cased and de-duplicated. First occurrence wins the position.
#[must_use]
pub fn parse_allowed_emails(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| EMAIL_LINE_RE.is_match(line))
        .map(str::to_lowercase)
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

/// Room service for business logic.
#[derive(Clone)]
pub struct RoomService {
    room_repo: RoomRepository,
    candidate_repo: CandidateRepository,
    receipt_repo: VoteReceiptRepository,
    id_gen: IdGenerator,
}

impl RoomService {
    /// Create a new room service.
    #[must_use]
    pub const fn new(
        room_repo: RoomRepository,
        candidate_repo: CandidateRepository,
        receipt_repo: VoteReceiptRepository,
    ) -> Self {
        Self {
            room_repo,
            candidate_repo,
            receipt_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Look up a room by join code and admit the caller if eligible.
    ///
    /// Candidates are only read once the allow-list check has passed.
    pub async fn join(&self, user: &SessionUser, code: &str) -> AppResult<JoinedRoom> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::Validation("Room code is required".to_string()));
        }

        let room = self
            .room_repo
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::RoomNotFound(code.to_string()))?;

        if !room.allows(&user.email) {
            info!(room_id = %room.id, user_id = %user.id, "Join refused: not on allow-list");
            return Err(AppError::NotEligible);
        }

        let candidates = self.candidate_repo.find_by_room(&room.id).await?;
        let state = if self.receipt_repo.has_voted(&room.id, &user.id).await? {
            VoterState::Voted
        } else {
            VoterState::JoinedNotVoted
        };

        info!(room_id = %room.id, user_id = %user.id, "Joined room");
        Ok(JoinedRoom {
            room_id: room.id,
            name: room.name,
            candidates,
            state,
        })
    }

    /// Resolve a room and check the caller is on its allow-list.
    pub async fn gate(&self, room_id: &str, user: &SessionUser) -> AppResult<room::Model> {
        let room = self.room_repo.get_by_id(room_id).await?;
        if room.allows(&user.email) {
            Ok(room)
        } else {
            Err(AppError::NotEligible)
        }
    }

    /// Where the caller stands in a room.
    pub async fn voter_state(&self, room_id: &str, user: &SessionUser) -> AppResult<VoterState> {
        let room = self.room_repo.get_by_id(room_id).await?;
        if !room.allows(&user.email) {
            return Ok(VoterState::NotJoined);
        }
        if self.receipt_repo.has_voted(room_id, &user.id).await? {
            Ok(VoterState::Voted)
        } else {
            Ok(VoterState::JoinedNotVoted)
        }
    }

    /// Create a room with an empty allow-list.
    pub async fn create_room(&self, input: CreateRoomInput) -> AppResult<room::Model> {
        input.validate()?;

        let code = input.code.trim();
        let name = input.name.trim();
        if code.is_empty() || name.is_empty() {
            return Err(AppError::Validation(
                "Room code and name are required".to_string(),
            ));
        }

        if self.room_repo.find_by_code(code).await?.is_some() {
            return Err(AppError::Conflict(format!("Room code already in use: {code}")));
        }

        let model = room::ActiveModel {
            id: Set(self.id_gen.generate()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            allowed_emails: Set(json!([])),
            created_at: Set(Utc::now().into()),
        };

        let room = self.room_repo.create(model).await?;
        info!(room_id = %room.id, code = %room.code, "Room created");
        Ok(room)
    }

    /// List all rooms, newest first.
    pub async fn list_rooms(&self) -> AppResult<Vec<room::Model>> {
        self.room_repo.find_all().await
    }

    /// Delete a room together with its candidates and receipts.
    pub async fn delete_room(&self, room_id: &str) -> AppResult<()> {
        if !self.room_repo.delete(room_id).await? {
            return Err(AppError::RoomNotFound(room_id.to_string()));
        }
        info!(room_id, "Room deleted");
        Ok(())
    }

    /// Replace a room's allow-list with the addresses found in `text`.
    pub async fn replace_allowed_emails(&self, room_id: &str, text: &str) -> AppResult<room::Model> {
        let emails = parse_allowed_emails(text);
        if emails.is_empty() {
            return Err(AppError::Validation(
                "No valid email addresses found".to_string(),
            ));
        }

        let room = self.room_repo.get_by_id(room_id).await?;
        let room = self.room_repo.set_allowed_emails(room, &emails).await?;

        info!(room_id, count = emails.len(), "Allow-list replaced");
        Ok(room)
    }
}
