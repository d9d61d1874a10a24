//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod candidate;
pub mod hub;
pub mod room;
pub mod tally;
pub mod vote;

pub use auth::{AuthService, SessionChange, SessionGrant, SignInInput, SignUpInput};
pub use candidate::{AddCandidateInput, CandidateService};
pub use hub::{Hub, Subscription};
pub use room::{CreateRoomInput, JoinedRoom, RoomService, VoterState, parse_allowed_emails};
pub use tally::{CandidateTally, TallyService, TallySnapshot};
pub use vote::{CastVoteInput, VoteOutcome, VoteService};
