//! Admin endpoints.
//!
//! Every handler takes [`AdminUser`], so non-admins are redirected before
//! any room data is read.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
    routing::{delete, get, post, put},
};
use futures::Stream;
use serde::Serialize;
use tracing::info;
use voteroom_common::AppResult;
use voteroom_core::{AddCandidateInput, CreateRoomInput, TallySnapshot};
use voteroom_db::entities::{candidate, room};

use crate::{
    extractors::AdminUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
    sse,
};

/// Room as shown to admins.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub id: String,
    pub code: String,
    pub name: String,
    pub allowed_emails: Vec<String>,
    pub created_at: String,
}

impl From<room::Model> for RoomResponse {
    fn from(room: room::Model) -> Self {
        Self {
            allowed_emails: room.allowed_emails(),
            id: room.id,
            code: room.code,
            name: room.name,
            created_at: room.created_at.to_rfc3339(),
        }
    }
}

/// Candidate as shown to admins.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResponse {
    pub id: String,
    pub room_id: String,
    pub name: String,
    pub votes: i32,
}

impl From<candidate::Model> for CandidateResponse {
    fn from(c: candidate::Model) -> Self {
        Self {
            id: c.id,
            room_id: c.room_id,
            name: c.name,
            votes: c.votes,
        }
    }
}

/// Create a room.
async fn create_room(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(input): Json<CreateRoomInput>,
) -> AppResult<ApiResponse<RoomResponse>> {
    let room = state.room_service.create_room(input).await?;
    info!(admin_id = %admin.id, room_id = %room.id, "Admin created room");
    Ok(ApiResponse::ok(room.into()))
}

/// List rooms, newest first.
async fn list_rooms(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<RoomResponse>>> {
    let rooms = state.room_service.list_rooms().await?;
    Ok(ApiResponse::ok(rooms.into_iter().map(Into::into).collect()))
}

/// Delete a room with its candidates and votes.
async fn delete_room(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.room_service.delete_room(&room_id).await?;
    state.tally_service.close_room(&room_id);
    info!(admin_id = %admin.id, room_id = %room_id, "Admin deleted room");
    Ok(no_content())
}

/// Replace the allow-list from a newline-separated text body.
async fn replace_allowed_emails(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    body: String,
) -> AppResult<ApiResponse<RoomResponse>> {
    let room = state
        .room_service
        .replace_allowed_emails(&room_id, &body)
        .await?;
    Ok(ApiResponse::ok(room.into()))
}

/// Add a candidate.
async fn add_candidate(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(input): Json<AddCandidateInput>,
) -> AppResult<ApiResponse<CandidateResponse>> {
    let candidate = state.candidate_service.add(&room_id, input).await?;
    Ok(ApiResponse::ok(candidate.into()))
}

/// List a room's candidates.
async fn list_candidates(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CandidateResponse>>> {
    let candidates = state.candidate_service.list(&room_id).await?;
    Ok(ApiResponse::ok(
        candidates.into_iter().map(Into::into).collect(),
    ))
}

/// Current results.
async fn results(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<ApiResponse<TallySnapshot>> {
    let snapshot = state.tally_service.snapshot(&room_id).await?;
    Ok(ApiResponse::ok(snapshot))
}

/// Live results.
async fn results_stream(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let (snapshot, subscription) = state.tally_service.watch(&room_id).await?;
    Ok(sse::live("tally", snapshot, subscription))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{room_id}", delete(delete_room))
        .route("/rooms/{room_id}/allowed-emails", put(replace_allowed_emails))
        .route(
            "/rooms/{room_id}/candidates",
            post(add_candidate).get(list_candidates),
        )
        .route("/rooms/{room_id}/results", get(results))
        .route("/rooms/{room_id}/results/stream", get(results_stream))
}
