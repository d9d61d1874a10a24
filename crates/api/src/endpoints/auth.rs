//! Authentication endpoints.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use voteroom_common::AppResult;
use voteroom_core::{SessionChange, SessionGrant, SessionUser, SignInInput, SignUpInput};

use crate::{
    extractors::{AuthUser, GuestOnly},
    middleware::AppState,
    response::{ApiResponse, no_content},
    sse,
};

/// Create an account.
async fn signup(
    _guest: GuestOnly,
    State(state): State<AppState>,
    Json(input): Json<SignUpInput>,
) -> AppResult<ApiResponse<SessionGrant>> {
    let grant = state.auth_service.sign_up(input).await?;
    Ok(ApiResponse::ok(grant))
}

/// Sign in with email and password.
async fn signin(
    _guest: GuestOnly,
    State(state): State<AppState>,
    Json(input): Json<SignInInput>,
) -> AppResult<ApiResponse<SessionGrant>> {
    let grant = state.auth_service.sign_in(input).await?;
    Ok(ApiResponse::ok(grant))
}

/// Sign out; the current token stops working.
async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    state.auth_service.sign_out(&user.id).await?;
    Ok(no_content())
}

/// Current session.
async fn session(AuthUser(user): AuthUser) -> ApiResponse<SessionUser> {
    ApiResponse::ok(user)
}

/// Live session: the current user first, then every change.
async fn session_stream(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.auth_service.watch_session(&user.id);
    sse::live("session", SessionChange::SignedIn { user }, subscription)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/session", get(session))
        .route("/streaming/session", get(session_stream))
}
