//! # pitlane
//!
//! pitlane is the session lifecycle and event-synchronization engine of a multiplayer
//! racing game. It takes any number of connected clients through a cup (a tournament of
//! stages), gates stage transitions on asynchronous stage loading and client readiness,
//! routes gameplay messages to the local pipeline and to remote participants exactly once,
//! and derives lap and sector results from raw control-point crossings.
//!
//! Rendering, audio, input translation and the physics world itself are external
//! collaborators. The engine only consumes world events through the [`World`] trait,
//! builds worlds through a [`StageFactory`], and emits [`Message`]s through a
//! [`MessageSink`].
//!
//! ```
//! use pitlane::prelude::*;
//!
//! # fn main() -> Result<(), CupError> {
//! let settings = CupSettings::single_race(TrackDescription::new("harbor loop", 3, 2));
//! let mut session = SessionBuilder::new()
//!     .with_settings(settings)
//!     .with_seed(7)
//!     .start_session()?;
//!
//! let players = vec![PlayerDefinition::new("Ada", 0)];
//! let client = session.register_client(RemoteClient::Local, players)?;
//! assert_eq!(client, ClientId::new(0));
//!
//! session.advance(); // Registration -> Intermission
//! assert_eq!(session.state(), CupState::Intermission);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use client::{CupSynchronizer, RaceBoard, RaceStanding};
pub use cup::{
    CarDefinition, Client, ClientSlots, Cup, CupSettings, PlayerDefinition, TrackDescription,
};
pub use error::{ConfigErrorKind, CupError, RegistrationStatus};
pub use messages::{
    CarInstance, CollisionResult, ControlPointFlags, ControlsMask, Message, MessageKind,
    StageDescription,
};
pub use routing::channel::{BroadcastChannel, OutboundPacket, QueuedChannel};
pub use routing::conveyor::{Conveyor, MessageReceiver, ReceiverSlot};
pub use routing::dispatcher::Dispatcher;
pub use routing::distributor::{LocalSink, MessageDistributor};
pub use routing::MessageSink;
pub use sessions::builder::SessionBuilder;
pub use sessions::controller::CupController;
pub use sessions::host::RegistrationHost;
pub use sessions::readiness::ReadinessTable;
pub use sessions::session::CupSession;
pub use stage::loader::{
    HeadlessFactory, HeadlessWorld, LoadError, LoadHandle, StageFactory, StageLoader,
};
pub use stage::race_tracker::{RaceTracker, TrackedCar};
pub use stage::regulator::StageRegulator;
pub use stage::{Stage, World, WorldEvent};

pub mod client;
pub mod cup;
#[doc(hidden)]
pub mod error;
pub mod messages;
pub mod prelude;
/// Internal random number generator module based on PCG32.
///
/// Provides client keys and random car assignment without the `rand` crate.
pub mod rng;
pub mod routing;
/// Session orchestration: builder, facade, state machine, registration host and the
/// readiness barrier.
pub mod sessions {
    pub mod builder;
    pub mod controller;
    pub mod host;
    pub mod readiness;
    pub mod session;
}
pub mod stage;
#[doc(hidden)]
pub mod sync;
pub mod telemetry;

// #############
// # CONSTANTS #
// #############

/// The size of the cup's client slot table. Client ids are `0..MAX_CLIENT_COUNT`.
pub const MAX_CLIENT_COUNT: usize = 256;

/// Milliseconds of simulated time. Stage and race clocks count in this unit.
pub type Millis = u32;

/// Identifies a registered client inside a cup.
///
/// Ids are allocated lowest-free-first and stay stable for as long as the client
/// is registered.
///
/// # Examples
///
/// ```
/// use pitlane::ClientId;
///
/// let id = ClientId::new(3);
/// assert_eq!(id.as_usize(), 3);
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct ClientId(u8);

impl ClientId {
    /// Creates a new `ClientId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u8) -> Self {
        ClientId(id)
    }

    /// Returns the id as an index into the client slot table.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a stage (race) within the cup's track list.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct StageId(u32);

impl StageId {
    /// Creates a new `StageId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        StageId(id)
    }

    /// Returns the id as an index into the track list.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the id of the stage after this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        StageId(self.0 + 1)
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a car instance in a loaded stage. Also the id of its in-world controllable.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct CarInstanceId(u16);

impl CarInstanceId {
    /// Creates a new `CarInstanceId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        CarInstanceId(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for CarInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque transport handle for a remote participant.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct RemoteHandle(u64);

impl RemoteHandle {
    /// Creates a new `RemoteHandle`.
    #[inline]
    #[must_use]
    pub const fn new(handle: u64) -> Self {
        RemoteHandle(handle)
    }

    /// Returns the raw handle value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

// #############
// #   ENUMS   #
// #############

/// Routing capability of a message target.
///
/// This is a capability flag, not a network address: the local participant is always
/// addressable as [`RemoteClient::Local`] even when no transport exists, which lets
/// single-player and networked sessions share one routing implementation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemoteClient {
    /// The in-process participant of the host.
    #[default]
    Local,
    /// One remote participant, identified by its transport handle.
    Remote(RemoteHandle),
    /// Everyone: the local participant and every remote participant.
    All,
}

impl RemoteClient {
    /// Returns `true` if a message addressed here must be delivered to the local pipeline.
    #[inline]
    #[must_use]
    pub const fn includes_local(self) -> bool {
        matches!(self, Self::Local | Self::All)
    }

    /// Returns `true` if a message addressed here must leave the process.
    #[inline]
    #[must_use]
    pub const fn includes_remote(self) -> bool {
        matches!(self, Self::Remote(_) | Self::All)
    }
}

/// A cup is always in exactly one of these states. Query it via [`CupSession::state`].
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub enum CupState {
    /// Clients may register. The cup has not started.
    #[default]
    Registration,
    /// Between stages. The next stage has been announced.
    Intermission,
    /// Reserved for car selection. The controller never enters it.
    CarSelection,
    /// A stage description has been published and the stage is loading.
    PreInitialization,
    /// The stage is loaded. Waiting for every client to signal readiness.
    Initialization,
    /// The race is running.
    Action,
    /// Every stage has been raced.
    End,
}

impl std::fmt::Display for CupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Registration => "registration",
            Self::Intermission => "intermission",
            Self::CarSelection => "car_selection",
            Self::PreInitialization => "pre_initialization",
            Self::Initialization => "initialization",
            Self::Action => "action",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// How car models are assigned to players when a stage is built.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub enum CarMode {
    /// Every player drives the first selected car.
    #[default]
    Fixed,
    /// Every player drives a car drawn at random from the selection.
    Random,
    /// Every player drives the car they asked for, if it is part of the selection.
    Free,
}
