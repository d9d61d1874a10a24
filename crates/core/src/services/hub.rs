//! Keyed broadcast hub.
//!
//! Listeners subscribe to a key (a room ID, a user ID) and receive every
//! value published under that key afterwards. A key's channel exists only
//! while it has listeners: the last [`Subscription`] to go away removes it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

type Channels<T> = Arc<Mutex<HashMap<String, broadcast::Sender<T>>>>;

fn lock<T>(channels: &Channels<T>) -> MutexGuard<'_, HashMap<String, broadcast::Sender<T>>> {
    channels.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Broadcast channels keyed by string.
pub struct Hub<T> {
    channels: Channels<T>,
    capacity: usize,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone + Send + 'static> Hub<T> {
    /// Create a hub whose per-key channels buffer `capacity` values.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Register a listener for `key`.
    #[must_use]
    pub fn subscribe(&self, key: &str) -> Subscription<T> {
        let mut channels = lock(&self.channels);
        let receiver = match channels.get(key) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(self.capacity);
                channels.insert(key.to_string(), sender);
                receiver
            }
        };
        drop(channels);

        debug!(key, "Listener registered");
        Subscription {
            key: key.to_string(),
            receiver: Some(receiver),
            channels: Arc::clone(&self.channels),
        }
    }

    /// Publish `value` to every listener of `key`. Returns how many
    /// listeners it reached.
    pub fn publish(&self, key: &str, value: T) -> usize {
        let channels = lock(&self.channels);
        channels
            .get(key)
            .and_then(|sender| sender.send(value).ok())
            .unwrap_or(0)
    }

    /// Drop the channel for `key`. Its listeners see the end of their
    /// subscription. Returns how many were listening.
    pub fn close(&self, key: &str) -> usize {
        let removed = lock(&self.channels).remove(key);
        removed.map_or(0, |sender| {
            debug!(key, "Channel closed by publisher");
            sender.receiver_count()
        })
    }

    /// Number of live listeners for `key`.
    #[must_use]
    pub fn listener_count(&self, key: &str) -> usize {
        lock(&self.channels)
            .get(key)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Whether `key` currently has a channel.
    #[must_use]
    pub fn has_channel(&self, key: &str) -> bool {
        lock(&self.channels).contains_key(key)
    }
}

/// A live registration on a [`Hub`] key.
///
/// Ends either through [`Subscription::stop`] or by being dropped; the
/// teardown runs once in both cases.
pub struct Subscription<T> {
    key: String,
    receiver: Option<broadcast::Receiver<T>>,
    channels: Channels<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Wait for the next value. Returns `None` once stopped or when the
    /// channel is gone. Values missed through lag are skipped.
    pub async fn recv(&mut self) -> Option<T> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(key = %self.key, skipped, "Listener lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// End the subscription.
    pub fn stop(mut self) {
        self.teardown();
    }

    /// Turn the subscription into a stream of values. Dropping the stream
    /// ends the subscription.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        stream::unfold(self, |mut sub| async move {
            let value = sub.recv().await?;
            Some((value, sub))
        })
    }
}

impl<T> Subscription<T> {
    fn teardown(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        drop(receiver);

        let mut channels = lock(&self.channels);
        if channels
            .get(&self.key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&self.key);
            debug!(key = %self.key, "Channel closed");
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_publish_reaches_listener() {
        let hub: Hub<u32> = Hub::new(8);
        let mut sub = hub.subscribe("room1");

        assert_eq!(hub.publish("room1", 7), 1);
        assert_eq!(sub.recv().await, Some(7));
    }

    #[test]
    fn test_publish_without_listeners() {
        let hub: Hub<u32> = Hub::new(8);
        assert_eq!(hub.publish("room1", 7), 0);
        assert!(!hub.has_channel("room1"));
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let hub: Hub<u32> = Hub::new(8);
        let mut a = hub.subscribe("a");
        let _b = hub.subscribe("b");

        hub.publish("b", 1);
        hub.publish("a", 2);

        assert_eq!(a.recv().await, Some(2));
    }

    #[test]
    fn test_stop_tears_down_once() {
        let hub: Hub<u32> = Hub::new(8);
        let first = hub.subscribe("room1");
        let second = hub.subscribe("room1");
        assert_eq!(hub.listener_count("room1"), 2);

        first.stop();
        assert_eq!(hub.listener_count("room1"), 1);
        assert!(hub.has_channel("room1"));

        second.stop();
        assert_eq!(hub.listener_count("room1"), 0);
        assert!(!hub.has_channel("room1"));
    }

    #[test]
    fn test_drop_tears_down() {
        let hub: Hub<u32> = Hub::new(8);
        {
            let _sub = hub.subscribe("room1");
            assert!(hub.has_channel("room1"));
        }
        assert!(!hub.has_channel("room1"));
    }

    #[test]
    fn test_resubscribe_after_teardown() {
        let hub: Hub<u32> = Hub::new(8);
        hub.subscribe("room1").stop();
        let _sub = hub.subscribe("room1");
        assert_eq!(hub.listener_count("room1"), 1);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let hub: Hub<u32> = Hub::new(8);
        let stream = hub.subscribe("room1").into_stream();
        hub.publish("room1", 1);
        hub.publish("room1", 2);

        let values: Vec<u32> = stream.take(2).collect().await;
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_dropping_stream_tears_down() {
        let hub: Hub<u32> = Hub::new(8);
        let stream = hub.subscribe("room1").into_stream();
        assert!(hub.has_channel("room1"));
        drop(stream);
        assert!(!hub.has_channel("room1"));
    }

    #[tokio::test]
    async fn test_close_ends_stream_and_allows_resubscribe() {
        let hub: Hub<u32> = Hub::new(8);
        let stream = hub.subscribe("room1").into_stream();
        assert_eq!(hub.close("room1"), 1);

        let values: Vec<u32> = stream.collect().await;
        assert!(values.is_empty());

        let fresh = hub.subscribe("room1");
        assert_eq!(hub.listener_count("room1"), 1);
        drop(fresh);
        assert!(!hub.has_channel("room1"));
    }
}
