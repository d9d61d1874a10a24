//! Core business logic for voteroom.

pub mod access;
pub mod services;

pub use access::{AccessDecision, AccessPolicy, Landing, SessionState, SessionUser};
pub use services::*;
