//! Cross-tab broadcast channel
//!
//! Every open page joins the same named channel. Messages carry the
//! sender's origin id and a channel-wide monotonic sequence number;
//! receivers drop their own messages and anything not newer than the last
//! message they accepted.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::marker::VersionMarker;
use crate::constants::BROADCAST_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastPayload {
    UpdateAvailable,
    Version { marker: VersionMarker },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub origin: u64,
    pub seq: u64,
    #[serde(flatten)]
    pub payload: BroadcastPayload,
}

/// A named channel shared by every page of an origin
#[derive(Clone)]
pub struct UpdateChannel {
    name: Arc<str>,
    sender: broadcast::Sender<BroadcastMessage>,
    seq: Arc<AtomicU64>,
    next_origin: Arc<AtomicU64>,
}

impl UpdateChannel {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            name: Arc::from(name.into()),
            sender,
            seq: Arc::new(AtomicU64::new(0)),
            next_origin: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join the channel as a new participant
    pub fn join(&self) -> (ChannelPublisher, ChannelSubscription) {
        let origin = self.next_origin.fetch_add(1, Ordering::Relaxed);
        let publisher = ChannelPublisher {
            origin,
            channel: self.clone(),
        };
        let subscription = ChannelSubscription {
            origin,
            receiver: self.sender.subscribe(),
            last_seen: 0,
        };
        (publisher, subscription)
    }
}

/// Sending half of one participant
#[derive(Clone)]
pub struct ChannelPublisher {
    origin: u64,
    channel: UpdateChannel,
}

impl ChannelPublisher {
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Broadcast `payload`; returns the sequence number it was sent with
    pub fn publish(&self, payload: BroadcastPayload) -> u64 {
        let seq = self.channel.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let message = BroadcastMessage {
            origin: self.origin,
            seq,
            payload,
        };
        // no other page listening
        if self.channel.sender.send(message).is_err() {
            tracing::debug!(channel = %self.channel.name, seq = seq, "Broadcast had no receivers");
        }
        seq
    }
}

/// Receiving half of one participant
pub struct ChannelSubscription {
    origin: u64,
    receiver: broadcast::Receiver<BroadcastMessage>,
    last_seen: u64,
}

impl ChannelSubscription {
    /// Whether `message` should be handled; records it as seen if so
    pub fn accept(&mut self, message: &BroadcastMessage) -> bool {
        if message.origin == self.origin {
            return false;
        }
        if message.seq <= self.last_seen {
            tracing::debug!(
                seq = message.seq,
                last_seen = self.last_seen,
                "Discarding stale broadcast"
            );
            return false;
        }
        self.last_seen = message.seq;
        true
    }

    /// Next message from another page; `None` once the channel is closed
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => {
                    if self.accept(&message) {
                        return Some(message);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Broadcast receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(origin: u64, seq: u64) -> BroadcastMessage {
        BroadcastMessage {
            origin,
            seq,
            payload: BroadcastPayload::UpdateAvailable,
        }
    }

    #[test]
    fn test_wire_format() {
        let msg = BroadcastMessage {
            origin: 1,
            seq: 7,
            payload: BroadcastPayload::Version {
                marker: VersionMarker::new("v3"),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"origin": 1, "seq": 7, "type": "VERSION", "marker": "v3"})
        );
    }

    #[test]
    fn test_accept_drops_own_stale_and_duplicate() {
        let channel = UpdateChannel::new("sw-updates");
        let (_, mut sub) = channel.join();
        let own = sub.origin;

        assert!(!sub.accept(&message(own, 1)));
        assert!(sub.accept(&message(own + 1, 2)));
        assert!(!sub.accept(&message(own + 1, 2)));
        assert!(!sub.accept(&message(own + 2, 1)));
        assert!(sub.accept(&message(own + 2, 3)));
    }

    #[tokio::test]
    async fn test_other_page_receives_publish() {
        let channel = UpdateChannel::new("sw-updates");
        let (tab_a, mut sub_a) = channel.join();
        let (tab_b, mut sub_b) = channel.join();

        let seq = tab_a.publish(BroadcastPayload::UpdateAvailable);
        let received = sub_b.recv().await.unwrap();
        assert_eq!(received.seq, seq);
        assert_eq!(received.origin, tab_a.origin());

        tab_b.publish(BroadcastPayload::UpdateAvailable);
        // tab A skips its own message and sees B's
        let received = sub_a.recv().await.unwrap();
        assert_eq!(received.origin, tab_b.origin());
    }

    #[tokio::test]
    async fn test_recv_ends_when_channel_dropped() {
        let channel = UpdateChannel::new("sw-updates");
        let (publisher, mut sub) = channel.join();
        drop(publisher);
        drop(channel);
        assert!(sub.recv().await.is_none());
    }
}
