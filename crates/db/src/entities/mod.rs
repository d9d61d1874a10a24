//! Database entities.

#![allow(missing_docs)]

pub mod candidate;
pub mod room;
pub mod user;
pub mod vote_receipt;

pub use candidate::Entity as Candidate;
pub use room::Entity as Room;
pub use user::Entity as User;
pub use vote_receipt::Entity as VoteReceipt;
