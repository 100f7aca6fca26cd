//! The two bundled [`MessageSink`]s.

use tracing::trace;

use crate::messages::Message;
use crate::routing::channel::BroadcastChannel;
use crate::routing::conveyor::Conveyor;
use crate::routing::dispatcher::Dispatcher;
use crate::routing::MessageSink;
use crate::RemoteClient;

/// Sink for networked sessions: the local conveyor, then the broadcast channel.
#[derive(Debug, Default)]
pub struct MessageDistributor {
    dispatcher: Dispatcher,
    conveyor: Conveyor,
}

impl MessageDistributor {
    /// Creates a distributor broadcasting through `channel`.
    #[must_use]
    pub fn new(channel: impl BroadcastChannel + 'static) -> Self {
        Self {
            dispatcher: Dispatcher::with_channel(channel),
            conveyor: Conveyor::new(),
        }
    }

    /// Creates a distributor around an existing conveyor.
    #[must_use]
    pub fn with_conveyor(channel: impl BroadcastChannel + 'static, conveyor: Conveyor) -> Self {
        Self {
            dispatcher: Dispatcher::with_channel(channel),
            conveyor,
        }
    }

    /// The local conveyor.
    #[must_use]
    pub fn conveyor(&self) -> &Conveyor {
        &self.conveyor
    }

    /// The local conveyor, for attaching receivers.
    pub fn conveyor_mut(&mut self) -> &mut Conveyor {
        &mut self.conveyor
    }
}

impl MessageSink for MessageDistributor {
    fn send(&mut self, message: Message, destination: RemoteClient) {
        self.dispatcher.send(message, destination, &mut self.conveyor);
    }
}

/// Sink for single-player sessions: the local conveyor only.
///
/// Messages addressed to a single remote participant are dropped.
#[derive(Debug, Default)]
pub struct LocalSink {
    conveyor: Conveyor,
}

impl LocalSink {
    /// Creates a sink with an empty conveyor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink around an existing conveyor.
    #[must_use]
    pub fn with_conveyor(conveyor: Conveyor) -> Self {
        Self { conveyor }
    }

    /// The local conveyor.
    #[must_use]
    pub fn conveyor(&self) -> &Conveyor {
        &self.conveyor
    }

    /// The local conveyor, for attaching receivers.
    pub fn conveyor_mut(&mut self) -> &mut Conveyor {
        &mut self.conveyor
    }
}

impl MessageSink for LocalSink {
    fn send(&mut self, message: Message, destination: RemoteClient) {
        if destination.includes_local() {
            self.conveyor.process(&message);
        } else {
            trace!(kind = ?message.kind(), ?destination, "local sink dropped remote-only message");
        }
    }
}
