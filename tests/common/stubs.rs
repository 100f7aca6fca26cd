//! Stub collaborators: a scripted world, stage factories and recording endpoints.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    dead_code
)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pitlane::{
    BroadcastChannel, CarInstanceId, ControlsMask, LoadError, Message, MessageKind,
    MessageReceiver, Millis, RemoteClient, RemoteHandle, StageDescription, StageFactory, World,
    WorldEvent,
};

/// Events the scripted world reports, one batch per step.
pub type Script = Arc<Mutex<VecDeque<Vec<WorldEvent>>>>;

/// A world that replays a shared script and records the controls it is given.
pub struct ScriptedWorld {
    cars: Vec<CarInstanceId>,
    script: Script,
    controls: Arc<Mutex<Vec<(CarInstanceId, ControlsMask)>>>,
}

impl World for ScriptedWorld {
    fn advance(&mut self, _frame_duration: Millis, events: &mut Vec<WorldEvent>) {
        if let Some(batch) = self.script.lock().pop_front() {
            events.extend(batch);
        }
    }

    fn set_controls(&mut self, controllable: CarInstanceId, controls: ControlsMask) -> bool {
        if !self.cars.contains(&controllable) {
            return false;
        }
        self.controls.lock().push((controllable, controls));
        true
    }
}

/// Builds [`ScriptedWorld`]s. Can be told to fail its first `n` builds.
#[derive(Default)]
pub struct StubFactory {
    pub script: Script,
    pub controls: Arc<Mutex<Vec<(CarInstanceId, ControlsMask)>>>,
    pub builds: AtomicUsize,
    fail_first: usize,
    panic_instead: bool,
}

impl StubFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_first(n: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first: n,
            ..Self::default()
        })
    }

    pub fn panicking() -> Arc<Self> {
        Arc::new(Self {
            fail_first: usize::MAX,
            panic_instead: true,
            ..Self::default()
        })
    }

    pub fn push_step(&self, events: Vec<WorldEvent>) {
        self.script.lock().push_back(events);
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl StageFactory for StubFactory {
    fn build(&self, description: &StageDescription) -> Result<Box<dyn World>, LoadError> {
        let attempt = self.builds.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            if self.panic_instead {
                panic!("stub factory asked to panic");
            }
            return Err(LoadError::factory(format!(
                "stub failure {} for {}",
                attempt, description.track.name
            )));
        }
        Ok(Box::new(ScriptedWorld {
            cars: description.cars.iter().map(|c| c.instance_id).collect(),
            script: Arc::clone(&self.script),
            controls: Arc::clone(&self.controls),
        }))
    }
}

/// Records every message it accepts.
#[derive(Default)]
pub struct RecordingReceiver {
    pub messages: Vec<Message>,
}

impl RecordingReceiver {
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.messages.iter().map(Message::kind).collect()
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.messages.iter().filter(|m| m.kind() == kind).count()
    }
}

impl MessageReceiver for RecordingReceiver {
    fn accepts(&self, _kind: MessageKind) -> bool {
        true
    }

    fn receive(&mut self, message: &Message) {
        self.messages.push(message.clone());
    }
}

/// One delivery, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Local(MessageKind),
    Remote(RemoteClient, MessageKind),
}

/// A shared delivery log fed by [`LoggingReceiver`] and [`RecordingChannel`].
pub type DeliveryLog = Arc<Mutex<Vec<Delivery>>>;

/// Local end of a delivery log.
pub struct LoggingReceiver(pub DeliveryLog);

impl MessageReceiver for LoggingReceiver {
    fn accepts(&self, _kind: MessageKind) -> bool {
        true
    }

    fn receive(&mut self, message: &Message) {
        self.0.lock().push(Delivery::Local(message.kind()));
    }
}

/// Remote end of a delivery log.
pub struct RecordingChannel(pub DeliveryLog);

impl BroadcastChannel for RecordingChannel {
    fn broadcast(&mut self, message: &Message) {
        self.0
            .lock()
            .push(Delivery::Remote(RemoteClient::All, message.kind()));
    }

    fn send_to(&mut self, target: RemoteHandle, message: &Message) {
        self.0
            .lock()
            .push(Delivery::Remote(RemoteClient::Remote(target), message.kind()));
    }
}
