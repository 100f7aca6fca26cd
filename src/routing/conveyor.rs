//! Inbound delivery to the local receivers.

use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::messages::{Message, MessageKind};
use crate::sync::{Arc, Mutex};

/// A local consumer of messages.
///
/// Receivers are only handed the kinds they accept.
pub trait MessageReceiver {
    /// Returns `true` if this receiver handles messages of `kind`.
    fn accepts(&self, kind: MessageKind) -> bool;

    /// Handles one message.
    fn receive(&mut self, message: &Message);
}

impl<R: MessageReceiver + ?Sized> MessageReceiver for Box<R> {
    fn accepts(&self, kind: MessageKind) -> bool {
        (**self).accepts(kind)
    }

    fn receive(&mut self, message: &Message) {
        (**self).receive(message);
    }
}

/// Shared receivers let the owner inspect state the conveyor is feeding.
impl<R: MessageReceiver + ?Sized> MessageReceiver for Arc<Mutex<R>> {
    fn accepts(&self, kind: MessageKind) -> bool {
        self.lock().accepts(kind)
    }

    fn receive(&mut self, message: &Message) {
        self.lock().receive(message);
    }
}

/// The attachment points of a [`Conveyor`], in delivery order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReceiverSlot {
    /// Mirrors the cup lifecycle.
    CupSynchronizer,
    /// The stage-side consumer (race presentation, replays).
    Stage,
    /// The client-side consumer (menus, HUD).
    Client,
}

/// Delivers each message to whichever receivers are attached.
///
/// A slot may be empty at any time. A message no receiver accepts is simply not
/// delivered.
#[derive(Default)]
pub struct Conveyor {
    receivers: BTreeMap<ReceiverSlot, Box<dyn MessageReceiver>>,
}

impl fmt::Debug for Conveyor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conveyor")
            .field("attached", &self.receivers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Conveyor {
    /// Creates a conveyor with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a receiver, returning the one it replaces.
    pub fn attach(
        &mut self,
        slot: ReceiverSlot,
        receiver: impl MessageReceiver + 'static,
    ) -> Option<Box<dyn MessageReceiver>> {
        self.receivers.insert(slot, Box::new(receiver))
    }

    /// Detaches the receiver in `slot`.
    pub fn detach(&mut self, slot: ReceiverSlot) -> Option<Box<dyn MessageReceiver>> {
        self.receivers.remove(&slot)
    }

    /// Returns `true` if `slot` holds a receiver.
    #[must_use]
    pub fn is_attached(&self, slot: ReceiverSlot) -> bool {
        self.receivers.contains_key(&slot)
    }

    /// Delivers `message` to every attached receiver that accepts it, in slot order.
    ///
    /// Returns the number of receivers reached.
    pub fn process(&mut self, message: &Message) -> usize {
        let kind = message.kind();
        let mut reached = 0;
        for receiver in self.receivers.values_mut() {
            if receiver.accepts(kind) {
                receiver.receive(message);
                reached += 1;
            }
        }
        if reached == 0 {
            trace!(?kind, "no local receiver for message");
        }
        reached
    }
}

impl MessageReceiver for Conveyor {
    fn accepts(&self, kind: MessageKind) -> bool {
        self.receivers.values().any(|r| r.accepts(kind))
    }

    fn receive(&mut self, message: &Message) {
        self.process(message);
    }
}
