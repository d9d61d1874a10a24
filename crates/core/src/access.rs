//! Role-gated access policies.
//!
//! Every view declares an [`AccessPolicy`]. Evaluating it against the
//! caller's [`SessionState`] yields an [`AccessDecision`]: render, keep
//! waiting for the session to resolve, or send the caller elsewhere.

use serde::{Deserialize, Serialize};
use voteroom_db::entities::user::{self, UserRole};

/// The signed-in user as seen by views and handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// User ID.
    pub id: String,
    /// Lower-cased email.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Account role.
    pub role: UserRole,
}

impl SessionUser {
    /// Whether the user holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<user::Model> for SessionUser {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

/// What is known about the caller's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Not resolved yet.
    Pending,
    /// Resolved, nobody signed in.
    Anonymous,
    /// Resolved to a signed-in user.
    Authenticated(SessionUser),
}

impl SessionState {
    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Pending | Self::Anonymous => None,
        }
    }
}

/// Where a refused caller is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// The sign-in page.
    Login,
    /// The voter's join page.
    VoterLanding,
}

impl Landing {
    /// Path of the landing page.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::VoterLanding => "/vote",
        }
    }
}

/// Result of evaluating a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Session still resolving; render nothing yet.
    Loading,
    /// Render the view.
    Allow,
    /// Send the caller to a landing page without rendering.
    Redirect(Landing),
}

/// Access requirement of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Signed-in admins only.
    AdminOnly,
    /// Any signed-in user.
    Authenticated,
    /// Only callers who are not signed in (sign-in and sign-up pages).
    Unauthenticated,
}

impl AccessPolicy {
    /// Decide what to do with a caller in `state`.
    #[must_use]
    pub const fn evaluate(self, state: &SessionState) -> AccessDecision {
        match (self, state) {
            (_, SessionState::Pending) => AccessDecision::Loading,

            (Self::AdminOnly | Self::Authenticated, SessionState::Anonymous) => {
                AccessDecision::Redirect(Landing::Login)
            }
            (Self::AdminOnly, SessionState::Authenticated(user)) => {
                if matches!(user.role, UserRole::Admin) {
                    AccessDecision::Allow
                } else {
                    AccessDecision::Redirect(Landing::VoterLanding)
                }
            }
            (Self::Authenticated, SessionState::Authenticated(_))
            | (Self::Unauthenticated, SessionState::Anonymous) => AccessDecision::Allow,

            (Self::Unauthenticated, SessionState::Authenticated(_)) => {
                AccessDecision::Redirect(Landing::VoterLanding)
            }
        }
    }
}
