//! Voter room endpoints.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use voteroom_common::AppResult;
use voteroom_core::{CastVoteInput, JoinedRoom, TallySnapshot, VoterState};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse, sse};

/// Join request.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub code: String,
}

/// Candidate as shown on the ballot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotCandidate {
    pub id: String,
    pub name: String,
}

/// Join response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub room_id: String,
    pub name: String,
    pub candidates: Vec<BallotCandidate>,
    pub state: VoterState,
}

impl From<JoinedRoom> for JoinResponse {
    fn from(joined: JoinedRoom) -> Self {
        Self {
            room_id: joined.room_id,
            name: joined.name,
            candidates: joined
                .candidates
                .into_iter()
                .map(|c| BallotCandidate {
                    id: c.id,
                    name: c.name,
                })
                .collect(),
            state: joined.state,
        }
    }
}

/// Voter status response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub room_id: String,
    pub state: VoterState,
}

/// Vote response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub room_id: String,
    pub candidate_id: String,
    pub voted_at: String,
    pub state: VoterState,
}

/// Enter a room by join code.
async fn join(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> AppResult<ApiResponse<JoinResponse>> {
    let joined = state.room_service.join(&user, &req.code).await?;
    Ok(ApiResponse::ok(joined.into()))
}

/// Where the caller stands in a room.
async fn status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<ApiResponse<StatusResponse>> {
    let voter_state = state.vote_service.status(&room_id, &user).await?;
    Ok(ApiResponse::ok(StatusResponse {
        room_id,
        state: voter_state,
    }))
}

/// Cast the caller's vote.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(input): Json<CastVoteInput>,
) -> AppResult<ApiResponse<VoteResponse>> {
    let outcome = state.vote_service.cast_vote(&room_id, &user, input).await?;
    Ok(ApiResponse::ok(VoteResponse {
        room_id: outcome.receipt.room_id,
        candidate_id: outcome.receipt.candidate_id,
        voted_at: outcome.receipt.created_at.to_rfc3339(),
        state: outcome.state,
    }))
}

/// Current results, once the caller has voted.
async fn results(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<ApiResponse<TallySnapshot>> {
    state.tally_service.ensure_can_view(&room_id, &user).await?;
    let snapshot = state.tally_service.snapshot(&room_id).await?;
    Ok(ApiResponse::ok(snapshot))
}

/// Live results, once the caller has voted.
async fn results_stream(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.tally_service.ensure_can_view(&room_id, &user).await?;
    let (snapshot, subscription) = state.tally_service.watch(&room_id).await?;
    Ok(sse::live("tally", snapshot, subscription))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/join", post(join))
        .route("/{room_id}/status", get(status))
        .route("/{room_id}/vote", post(vote))
        .route("/{room_id}/results", get(results))
        .route("/{room_id}/results/stream", get(results_stream))
}
