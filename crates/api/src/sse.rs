//! Server-Sent Events (SSE) for live views.
//!
//! A live view sends its current state first, then one event per change
//! pushed on the matching [`Subscription`]. Closing the connection drops
//! the stream and with it the subscription.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use voteroom_core::Subscription;

/// Interval between keep-alive comments.
pub const KEEP_ALIVE_SECS: u64 = 30;

fn to_event<T: Serialize>(name: &'static str, value: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(value)
        .unwrap_or_else(|_| Event::default().event("error").data("serialization failed"))
}

/// Build an SSE response from an initial value and its subscription.
pub fn live<T>(
    name: &'static str,
    initial: T,
    subscription: Subscription<T>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Clone + Send + 'static,
{
    let first = stream::once(async move { Ok(to_event(name, &initial)) });
    let updates = subscription
        .into_stream()
        .map(move |value| Ok(to_event(name, &value)));

    Sse::new(first.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("ping"),
    )
}
