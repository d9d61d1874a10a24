//! Authentication service.
//!
//! Accounts sign in with email and password and hold one bearer token at a
//! time. Signing out rotates the token, which invalidates every copy of
//! the old one.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;
use voteroom_common::{AppError, AppResult, IdGenerator, config::AdminConfig};
use voteroom_db::{
    entities::user::{self, UserRole},
    repositories::UserRepository,
};

use crate::access::SessionUser;
use crate::services::hub::{Hub, Subscription};

const SESSION_CHANNEL_CAPACITY: usize = 8;

/// A change to a user's session, pushed to that user's session listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionChange {
    /// Signed in (possibly from another client).
    SignedIn { user: SessionUser },
    /// Signed out; the previous token no longer authenticates.
    SignedOut,
}

/// Input for creating an account.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    #[validate(length(max = 256))]
    pub name: Option<String>,

    #[validate(length(max = 32))]
    pub national_id: Option<String>,

    #[validate(length(max = 1024))]
    pub address: Option<String>,
}

/// Input for signing in.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignInInput {
    #[validate(length(min = 1))]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// A signed-in user together with the token that authenticates them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub user: SessionUser,
    pub token: String,
}

/// Authentication service for business logic.
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    admin: AdminConfig,
    sessions: Hub<SessionChange>,
    id_gen: IdGenerator,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AuthService {
    /// Create a new auth service.
    #[must_use]
    pub fn new(user_repo: UserRepository, admin: AdminConfig) -> Self {
        Self {
            user_repo,
            admin,
            sessions: Hub::new(SESSION_CHANNEL_CAPACITY),
            id_gen: IdGenerator::new(),
        }
    }

    /// Create an account and sign it in.
    pub async fn sign_up(&self, input: SignUpInput) -> AppResult<SessionGrant> {
        input.validate()?;

        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let role = if self.admin.is_bootstrap_admin(&email) {
            UserRole::Admin
        } else {
            UserRole::Voter
        };

        let password_hash = hash_password(&input.password)?;
        let token = self.id_gen.generate_token();

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(role),
            token: Set(Some(token.clone())),
            name: Set(blank_to_none(input.name)),
            national_id: Set(blank_to_none(input.national_id)),
            address: Set(blank_to_none(input.address)),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        let user = self.user_repo.create(model).await?;

        info!(user_id = %user.id, role = ?user.role, "Account created");
        Ok(SessionGrant {
            user: SessionUser::from(user),
            token,
        })
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, input: SignInInput) -> AppResult<SessionGrant> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        let (user, token) = match user.token.clone() {
            Some(token) => (user, token),
            None => {
                let token = self.id_gen.generate_token();
                let mut active: user::ActiveModel = user.into();
                active.token = Set(Some(token.clone()));
                active.updated_at = Set(Some(Utc::now().into()));
                (self.user_repo.update(active).await?, token)
            }
        };

        let session = SessionUser::from(user);
        info!(user_id = %session.id, "Signed in");
        self.sessions.publish(
            &session.id,
            SessionChange::SignedIn {
                user: session.clone(),
            },
        );

        Ok(SessionGrant {
            user: session,
            token,
        })
    }

    /// Sign out by rotating the user's token.
    pub async fn sign_out(&self, user_id: &str) -> AppResult<()> {
        let user = self.user_repo.get_by_id(user_id).await?;

        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(self.id_gen.generate_token()));
        active.updated_at = Set(Some(Utc::now().into()));
        self.user_repo.update(active).await?;

        info!(user_id, "Signed out");
        self.sessions.publish(user_id, SessionChange::SignedOut);
        Ok(())
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<SessionUser> {
        self.user_repo
            .find_by_token(token)
            .await?
            .map(|user| {
                let mut session = SessionUser::from(user);
                if self.admin.is_bootstrap_admin(&session.email) {
                    session.role = UserRole::Admin;
                }
                session
            })
            .ok_or(AppError::Unauthorized)
    }

    /// Listen for session changes of one user.
    #[must_use]
    pub fn watch_session(&self, user_id: &str) -> Subscription<SessionChange> {
        self.sessions.subscribe(user_id)
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
