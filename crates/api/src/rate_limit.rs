//! Request rate limiting.
//!
//! Fixed windows keyed by request class and caller: the signed-in user when
//! the session resolved, the client IP otherwise. The session must already
//! be in the request extensions, so this layer sits inside the auth layer.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Method, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use voteroom_common::AppError;
use voteroom_core::SessionState;

/// Requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    /// Requests admitted per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl Limit {
    const fn per_secs(max_requests: u32, secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(secs),
        }
    }
}

/// Bucket a request is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Sign-in and sign-up attempts.
    Auth,
    /// Anything that writes: votes, sign-out, room administration.
    Write,
    /// Reads, including stream connections.
    Read,
}

impl RequestClass {
    /// Classify a request by method and path.
    #[must_use]
    pub fn of(method: &Method, path: &str) -> Self {
        let path = path.trim_end_matches('/');
        if *method == Method::POST && (path.ends_with("/signin") || path.ends_with("/signup")) {
            Self::Auth
        } else if *method == Method::GET || *method == Method::HEAD {
            Self::Read
        } else {
            Self::Write
        }
    }

    /// The limit applied to this class.
    #[must_use]
    pub const fn limit(self) -> Limit {
        match self {
            Self::Auth => Limit::per_secs(10, 300),
            Self::Write => Limit::per_secs(30, 60),
            Self::Read => Limit::per_secs(300, 60),
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Write => "write",
            Self::Read => "read",
        }
    }
}

/// Longest window of any class.
const LONGEST_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct Window {
    started: Instant,
    used: u32,
}

/// Outcome of charging one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Admitted.
    Allowed {
        /// Requests left in the current window.
        remaining: u32,
        /// Seconds until the window resets.
        reset_secs: u64,
    },
    /// Refused until the window resets.
    Limited {
        /// Seconds until the window resets.
        retry_after_secs: u64,
    },
}

/// Shared limiter state handed to [`rate_limit_middleware`].
#[derive(Clone, Default)]
pub struct RateLimiterState {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiterState {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one request to `key`.
    pub async fn charge(&self, key: &str, limit: Limit) -> Verdict {
        self.charge_at(key, limit, Instant::now()).await
    }

    async fn charge_at(&self, key: &str, limit: Limit, now: Instant) -> Verdict {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            used: 0,
        });

        if now.duration_since(window.started) >= limit.window {
            window.started = now;
            window.used = 0;
        }

        let reset_secs = limit
            .window
            .saturating_sub(now.duration_since(window.started))
            .as_secs();

        if window.used >= limit.max_requests {
            return Verdict::Limited {
                retry_after_secs: reset_secs.max(1),
            };
        }

        window.used += 1;
        Verdict::Allowed {
            remaining: limit.max_requests - window.used,
            reset_secs,
        }
    }

    /// Forget windows that ended more than one full window ago.
    pub async fn cleanup(&self) {
        self.cleanup_at(Instant::now()).await;
    }

    async fn cleanup_at(&self, now: Instant) {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) < LONGEST_WINDOW * 2);
        let evicted = before - windows.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Rate limit windows evicted");
        }
    }

    /// Number of tracked keys.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

/// First address in `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real_ip = headers.get("x-real-ip").and_then(|v| v.to_str().ok());

    forwarded
        .into_iter()
        .chain(real_ip)
        .find_map(|v| v.trim().parse().ok())
}

fn caller_key(class: RequestClass, req: &Request<Body>) -> String {
    let user = req
        .extensions()
        .get::<SessionState>()
        .and_then(SessionState::user);

    match (user, client_ip(req.headers())) {
        (Some(user), _) => format!("{}:user:{}", class.label(), user.id),
        (None, Some(ip)) => format!("{}:ip:{ip}", class.label()),
        (None, None) => format!("{}:unknown", class.label()),
    }
}

/// Charge the request to its bucket; refuse with 429 and `Retry-After`
/// when the bucket is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiterState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let class = RequestClass::of(req.method(), req.uri().path());
    let limit = class.limit();
    let key = caller_key(class, &req);

    match limiter.charge(&key, limit).await {
        Verdict::Allowed {
            remaining,
            reset_secs,
        } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                limit.max_requests.into(),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                remaining.into(),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-reset"),
                reset_secs.into(),
            );
            response
        }
        Verdict::Limited { retry_after_secs } => {
            tracing::debug!(key = %key, retry_after_secs, "Rate limited");
            (
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                AppError::RateLimited,
            )
                .into_response()
        }
    }
}
