//! HTTP API layer for voteroom.
//!
//! - **Endpoints**: sign-up/sign-in, voter rooms, room administration
//! - **Extractors**: role-gated access (`AuthUser`, `AdminUser`, `GuestOnly`)
//! - **Middleware**: session resolution, rate limiting
//! - **SSE**: live results and session streams
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod rate_limit;
pub mod response;
pub mod sse;

pub use endpoints::router;
pub use rate_limit::{Limit, RateLimiterState, RequestClass};
