//! Outward delivery to remote participants.

use std::collections::VecDeque;

use crate::messages::Message;
use crate::routing::codec;
use crate::sync::{Arc, Mutex};
use crate::telemetry::{ViolationKind, ViolationSeverity};
use crate::{report_violation, RemoteClient, RemoteHandle};

/// The outward half of a networked sink.
///
/// Implementations own the transport. The engine never hands a channel a message meant
/// only for the local pipeline.
pub trait BroadcastChannel {
    /// Sends `message` to every remote participant.
    fn broadcast(&mut self, message: &Message);

    /// Sends `message` to one remote participant.
    fn send_to(&mut self, target: RemoteHandle, message: &Message);
}

impl<C: BroadcastChannel + ?Sized> BroadcastChannel for Box<C> {
    fn broadcast(&mut self, message: &Message) {
        (**self).broadcast(message);
    }

    fn send_to(&mut self, target: RemoteHandle, message: &Message) {
        (**self).send_to(target, message);
    }
}

/// An encoded message waiting for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    /// [`RemoteClient::All`] or a single [`RemoteClient::Remote`].
    pub target: RemoteClient,
    /// The message, encoded with [`codec::encode_message`].
    pub bytes: Vec<u8>,
}

/// A [`BroadcastChannel`] that encodes messages into a packet queue.
///
/// Clones share the queue: hand one clone to the session and drain the other from the
/// transport.
///
/// ```
/// use pitlane::{BroadcastChannel, Message, QueuedChannel, RemoteClient};
///
/// let mut channel = QueuedChannel::new();
/// let transport = channel.clone();
/// channel.broadcast(&Message::CupEnd);
///
/// let packets = transport.drain();
/// assert_eq!(packets.len(), 1);
/// assert_eq!(packets[0].target, RemoteClient::All);
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueuedChannel {
    queue: Arc<Mutex<VecDeque<OutboundPacket>>>,
}

impl QueuedChannel {
    /// Creates a channel with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every queued packet, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<OutboundPacket> {
        self.queue.lock().drain(..).collect()
    }

    /// Number of queued packets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn enqueue(&self, target: RemoteClient, message: &Message) {
        match codec::encode_message(message) {
            Ok(bytes) => self.queue.lock().push_back(OutboundPacket { target, bytes }),
            Err(e) => {
                report_violation!(
                    ViolationSeverity::Error,
                    ViolationKind::MessageRouting,
                    "dropping {:?} for {:?}: {}",
                    message.kind(),
                    target,
                    e
                );
            },
        }
    }
}

impl BroadcastChannel for QueuedChannel {
    fn broadcast(&mut self, message: &Message) {
        self.enqueue(RemoteClient::All, message);
    }

    fn send_to(&mut self, target: RemoteHandle, message: &Message) {
        self.enqueue(RemoteClient::Remote(target), message);
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::StageId;

    #[test]
    fn packets_decode_back_to_their_messages() {
        let mut channel = QueuedChannel::new();
        let handle = RemoteHandle::new(42);
        channel.send_to(handle, &Message::Restart);
        channel.broadcast(&Message::StageEnd {
            stage_id: StageId::new(3),
        });

        let packets = channel.drain();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].target, RemoteClient::Remote(handle));
        assert_eq!(
            codec::decode_message(&packets[0].bytes).unwrap(),
            Message::Restart
        );
        assert_eq!(
            codec::decode_message(&packets[1].bytes).unwrap(),
            Message::StageEnd {
                stage_id: StageId::new(3)
            }
        );
        assert!(channel.is_empty());
    }

    #[test]
    fn clones_share_the_queue() {
        let mut channel = QueuedChannel::new();
        let other = channel.clone();
        channel.broadcast(&Message::CupEnd);
        assert_eq!(other.len(), 1);
        let _ = other.drain();
        assert!(channel.is_empty());
    }
}
