//! Outbound fan-out.

use std::fmt;

use tracing::trace;

use crate::messages::Message;
use crate::routing::channel::BroadcastChannel;
use crate::routing::conveyor::MessageReceiver;
use crate::RemoteClient;

/// Decides, per message, whether it goes to the local pipeline, out of the process, or
/// both.
///
/// Local delivery always happens first. A message addressed to
/// [`RemoteClient::Local`] never reaches the channel, and a message addressed to a
/// single remote never reaches the local pipeline.
#[derive(Default)]
pub struct Dispatcher {
    channel: Option<Box<dyn BroadcastChannel>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("has_channel", &self.channel.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with no outward channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher that broadcasts through `channel`.
    #[must_use]
    pub fn with_channel(channel: impl BroadcastChannel + 'static) -> Self {
        Self {
            channel: Some(Box::new(channel)),
        }
    }

    /// Returns `true` if messages can leave the process.
    #[must_use]
    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Routes one message.
    pub fn send(
        &mut self,
        message: Message,
        destination: RemoteClient,
        local: &mut dyn MessageReceiver,
    ) {
        if destination.includes_local() && local.accepts(message.kind()) {
            local.receive(&message);
        }
        let Some(channel) = self.channel.as_mut() else {
            if destination.includes_remote() {
                trace!(kind = ?message.kind(), "no channel, remote delivery skipped");
            }
            return;
        };
        match destination {
            RemoteClient::All => channel.broadcast(&message),
            RemoteClient::Remote(handle) => channel.send_to(handle, &message),
            RemoteClient::Local => {},
        }
    }
}
