//! Request extractors.
//!
//! Each extractor applies one [`AccessPolicy`] to the session resolved by
//! the auth middleware. Refused callers are redirected, never shown a
//! permission error.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use voteroom_core::{AccessDecision, AccessPolicy, Landing, SessionState, SessionUser};

/// Why a policy extractor refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRejection {
    /// The session was never resolved (auth middleware not installed).
    SessionUnresolved,
    /// Send the caller to a landing page.
    Redirect(Landing),
}

impl IntoResponse for AccessRejection {
    fn into_response(self) -> Response {
        match self {
            Self::SessionUnresolved => {
                (StatusCode::SERVICE_UNAVAILABLE, "Session unresolved").into_response()
            }
            Self::Redirect(landing) => Redirect::to(landing.path()).into_response(),
        }
    }
}

fn session_state(parts: &Parts) -> SessionState {
    parts
        .extensions
        .get::<SessionState>()
        .cloned()
        .unwrap_or(SessionState::Pending)
}

fn admit(policy: AccessPolicy, state: &SessionState) -> Result<(), AccessRejection> {
    match policy.evaluate(state) {
        AccessDecision::Allow => Ok(()),
        AccessDecision::Loading => Err(AccessRejection::SessionUnresolved),
        AccessDecision::Redirect(landing) => Err(AccessRejection::Redirect(landing)),
    }
}

/// Any signed-in user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub SessionUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AccessRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = session_state(parts);
        admit(AccessPolicy::Authenticated, &state)?;
        match state {
            SessionState::Authenticated(user) => Ok(Self(user)),
            SessionState::Pending | SessionState::Anonymous => {
                Err(AccessRejection::Redirect(Landing::Login))
            }
        }
    }
}

/// A signed-in admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub SessionUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AccessRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = session_state(parts);
        admit(AccessPolicy::AdminOnly, &state)?;
        match state {
            SessionState::Authenticated(user) => Ok(Self(user)),
            SessionState::Pending | SessionState::Anonymous => {
                Err(AccessRejection::Redirect(Landing::Login))
            }
        }
    }
}

/// A caller who is not signed in.
#[derive(Debug, Clone, Copy)]
pub struct GuestOnly;

impl<S> FromRequestParts<S> for GuestOnly
where
    S: Send + Sync,
{
    type Rejection = AccessRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        admit(AccessPolicy::Unauthenticated, &session_state(parts))?;
        Ok(Self)
    }
}
