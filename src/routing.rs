//! Message routing: outbound dispatch and inbound conveyance.
//!
//! Every component that emits messages does so through a [`MessageSink`]. The two
//! bundled sinks are [`LocalSink`](distributor::LocalSink), which only feeds the local
//! [`Conveyor`](conveyor::Conveyor), and
//! [`MessageDistributor`](distributor::MessageDistributor), which feeds the local
//! conveyor first and then hands the message to a [`BroadcastChannel`](channel::BroadcastChannel).

pub mod channel;
pub mod codec;
pub mod conveyor;
pub mod dispatcher;
pub mod distributor;

use crate::messages::Message;
use crate::RemoteClient;

/// Destination for emitted messages.
///
/// A message sent to [`RemoteClient::Local`] or [`RemoteClient::All`] reaches the local
/// pipeline exactly once. A message sent to [`RemoteClient::All`] or
/// [`RemoteClient::Remote`] leaves the process exactly once.
pub trait MessageSink {
    /// Delivers `message` to `destination`.
    fn send(&mut self, message: Message, destination: RemoteClient);
}

impl<S: MessageSink + ?Sized> MessageSink for Box<S> {
    fn send(&mut self, message: Message, destination: RemoteClient) {
        (**self).send(message, destination);
    }
}
