//! Database repositories.

mod candidate;
mod room;
mod user;
mod vote_receipt;

pub use candidate::CandidateRepository;
pub use room::RoomRepository;
pub use user::UserRepository;
pub use vote_receipt::VoteReceiptRepository;
