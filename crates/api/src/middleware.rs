//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;
use voteroom_common::AppError;
use voteroom_core::{
    AuthService, CandidateService, RoomService, SessionState, TallyService, VoteService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub room_service: RoomService,
    pub candidate_service: CandidateService,
    pub vote_service: VoteService,
    pub tally_service: TallyService,
}

/// Extract the bearer token from an `Authorization` header.
pub(crate) fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
///
/// Resolves the caller's session and stores it in the request extensions.
/// A missing or stale token resolves to [`SessionState::Anonymous`]. Any
/// other failure (the store being down) ends the request with that error.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let session = match bearer_token(&req) {
        Some(token) => match state.auth_service.authenticate_by_token(token).await {
            Ok(user) => SessionState::Authenticated(user),
            Err(AppError::Unauthorized) => {
                debug!("Bearer token rejected");
                SessionState::Anonymous
            }
            Err(e) => return e.into_response(),
        },
        None => SessionState::Anonymous,
    };

    req.extensions_mut().insert(session);
    next.run(req).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request_with(header_value: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/session");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&request_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&request_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&request_with(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&request_with(None)), None);
    }
}
