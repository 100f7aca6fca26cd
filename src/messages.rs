//! Message payloads exchanged between the host, its local pipeline and remote clients.
//!
//! Every payload is a plain struct of ids, counts, masks and timestamps deriving
//! `serde` traits, so an external transport can serialize it directly (the bundled
//! [`codec`](crate::routing::codec) does so with bincode).
//!
//! Handling is type-directed: a receiver declares the [`MessageKind`]s it understands
//! and is never handed anything else, so adding a message kind never breaks an older
//! receiver.

use serde::{Deserialize, Serialize};

use crate::cup::{CarDefinition, PlayerDefinition, TrackDescription};
use crate::error::RegistrationStatus;
use crate::{CarInstanceId, ClientId, CupState, Millis, StageId};

/// Bit mask of the controls a player is holding.
///
/// # Examples
///
/// ```
/// use pitlane::ControlsMask;
///
/// let controls = ControlsMask::ACCELERATE | ControlsMask::LEFT;
/// assert!(controls.contains(ControlsMask::LEFT));
/// assert!(!controls.contains(ControlsMask::BRAKE));
/// ```
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct ControlsMask(u16);

impl ControlsMask {
    /// No control held.
    pub const NONE: Self = Self(0);
    /// Throttle.
    pub const ACCELERATE: Self = Self(1);
    /// Brake / reverse.
    pub const BRAKE: Self = Self(1 << 1);
    /// Steer left.
    pub const LEFT: Self = Self(1 << 2);
    /// Steer right.
    pub const RIGHT: Self = Self(1 << 3);
    /// Handbrake.
    pub const HANDBRAKE: Self = Self(1 << 4);
    /// Use the held item.
    pub const ACTION: Self = Self(1 << 5);

    /// Creates a mask from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns `true` if every control in `other` is held.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ControlsMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Flags the world attaches to a control point.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct ControlPointFlags(u8);

impl ControlPointFlags {
    /// An ordinary checkpoint.
    pub const NONE: Self = Self(0);
    /// Crossing this point completes a lap.
    pub const FINISH_LINE: Self = Self(1);

    /// Creates flags from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns `true` if this point completes a lap.
    #[inline]
    #[must_use]
    pub const fn is_finish_line(self) -> bool {
        self.0 & Self::FINISH_LINE.0 != 0
    }
}

/// Outcome of a collision as reported by the world.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct CollisionResult {
    /// Impulse magnitude, in world units.
    pub impulse: u32,
}

/// One car taking part in a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarInstance {
    /// Dense id, assigned from 0 in roster order.
    pub instance_id: CarInstanceId,
    /// Index into [`StageDescription::car_models`].
    pub model_id: u16,
    /// The client that controls this car.
    pub controller_id: ClientId,
    /// The player's control slot on that client.
    pub slot_id: u8,
    /// Grid position, 0 is pole.
    pub start_position: u16,
    /// Paint scheme of the player.
    pub color_scheme: u32,
}

/// Everything a stage loader needs to build a stage. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescription {
    /// The stage this description belongs to.
    pub stage_id: StageId,
    /// The track raced on.
    pub track: TrackDescription,
    /// The car models in use; [`CarInstance::model_id`] indexes this list.
    pub car_models: Vec<CarDefinition>,
    /// Every car on the grid.
    pub cars: Vec<CarInstance>,
}

impl StageDescription {
    /// Returns the car with the given instance id.
    #[must_use]
    pub fn car(&self, instance_id: CarInstanceId) -> Option<&CarInstance> {
        self.cars.iter().find(|car| car.instance_id == instance_id)
    }

    /// Returns the cars controlled by the given client.
    pub fn cars_of(&self, client: ClientId) -> impl Iterator<Item = &CarInstance> + '_ {
        self.cars
            .iter()
            .filter(move |car| car.controller_id == client)
    }
}

/// Every message the engine sends or accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    // Client commands.
    /// Ask the cup to move on to its next phase.
    Advance,
    /// The client has finished loading and is ready to race.
    Ready {
        /// The client signalling readiness.
        client_id: ClientId,
    },
    /// Ask to join the cup with the given players.
    RegisterClient {
        /// The players the client brings.
        players: Vec<PlayerDefinition>,
    },
    /// Leave the cup.
    UnregisterClient {
        /// The client leaving.
        client_id: ClientId,
    },
    /// New control input for one car.
    ControlUpdate {
        /// The in-world controllable (the car instance).
        controllable: CarInstanceId,
        /// The controls held.
        controls: ControlsMask,
    },

    // Registration replies, addressed to the requesting client only.
    /// The client was accepted.
    RegistrationSuccess {
        /// The id assigned to the client.
        client_id: ClientId,
        /// A random key the client can use to tell its own replies apart.
        client_key: u64,
    },
    /// The client was rejected.
    ServerFull {
        /// Why the client was rejected.
        status: RegistrationStatus,
    },

    // Cup lifecycle, broadcast to everyone.
    /// The next stage is announced.
    Intermission {
        /// The announced stage.
        stage_id: StageId,
        /// Its track.
        track: TrackDescription,
    },
    /// The stage is being built from this description.
    PreInitialization {
        /// The stage being built.
        stage_id: StageId,
        /// Its full description.
        description: StageDescription,
    },
    /// The stage could not be built. An `Intermission` for the same stage follows.
    StageLoadFailed {
        /// The stage that failed.
        stage_id: StageId,
    },
    /// The stage is loaded. Clients should signal `Ready`.
    Initialization {
        /// The loaded stage.
        stage_id: StageId,
    },
    /// Every client is ready. The race starts.
    StageBegin {
        /// The running stage.
        stage_id: StageId,
    },
    /// The race is over.
    StageEnd {
        /// The finished stage.
        stage_id: StageId,
    },
    /// Every stage has been raced.
    CupEnd,
    /// The cup starts over from registration.
    Restart,

    // Race events, broadcast to everyone.
    /// The race clock moved.
    RaceTimeUpdate {
        /// Current race time.
        race_time: Millis,
    },
    /// A car passed its next control point.
    SectorComplete {
        /// The car.
        car: CarInstanceId,
        /// Zero-based sector index within the lap.
        sector: u16,
        /// Time spent in the sector.
        time: Millis,
    },
    /// A car completed a lap.
    LapComplete {
        /// The car.
        car: CarInstanceId,
        /// Laps completed so far, from 1.
        lap: u32,
        /// Time of this lap.
        time: Millis,
        /// Whether this lap is the car's best so far.
        personal_best: bool,
    },
    /// A car completed its last lap.
    CarFinished {
        /// The car.
        car: CarInstanceId,
        /// Race time at the finish.
        race_time: Millis,
        /// Finishing position, from 1.
        position: u16,
    },
    /// A car hit the environment.
    Collision {
        /// The car.
        entity: CarInstanceId,
        /// What the world reported.
        result: CollisionResult,
    },
    /// Two cars hit each other.
    CarCollision {
        /// The car that initiated contact.
        subject: CarInstanceId,
        /// The car that was hit.
        object: CarInstanceId,
        /// What the world reported.
        result: CollisionResult,
    },
}

/// The kind of a [`Message`], without its payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum MessageKind {
    Advance,
    Ready,
    RegisterClient,
    UnregisterClient,
    ControlUpdate,
    RegistrationSuccess,
    ServerFull,
    Intermission,
    PreInitialization,
    StageLoadFailed,
    Initialization,
    StageBegin,
    StageEnd,
    CupEnd,
    Restart,
    RaceTimeUpdate,
    SectorComplete,
    LapComplete,
    CarFinished,
    Collision,
    CarCollision,
}

impl MessageKind {
    /// Returns `true` for messages that drive the cup state machine.
    #[must_use]
    pub const fn is_lifecycle(self) -> bool {
        matches!(
            self,
            Self::Intermission
                | Self::PreInitialization
                | Self::StageLoadFailed
                | Self::Initialization
                | Self::StageBegin
                | Self::StageEnd
                | Self::CupEnd
                | Self::Restart
        )
    }

    /// Returns `true` for messages produced by a running stage.
    #[must_use]
    pub const fn is_race_event(self) -> bool {
        matches!(
            self,
            Self::RaceTimeUpdate
                | Self::SectorComplete
                | Self::LapComplete
                | Self::CarFinished
                | Self::Collision
                | Self::CarCollision
        )
    }
}

impl Message {
    /// Returns the kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Advance => MessageKind::Advance,
            Self::Ready { .. } => MessageKind::Ready,
            Self::RegisterClient { .. } => MessageKind::RegisterClient,
            Self::UnregisterClient { .. } => MessageKind::UnregisterClient,
            Self::ControlUpdate { .. } => MessageKind::ControlUpdate,
            Self::RegistrationSuccess { .. } => MessageKind::RegistrationSuccess,
            Self::ServerFull { .. } => MessageKind::ServerFull,
            Self::Intermission { .. } => MessageKind::Intermission,
            Self::PreInitialization { .. } => MessageKind::PreInitialization,
            Self::StageLoadFailed { .. } => MessageKind::StageLoadFailed,
            Self::Initialization { .. } => MessageKind::Initialization,
            Self::StageBegin { .. } => MessageKind::StageBegin,
            Self::StageEnd { .. } => MessageKind::StageEnd,
            Self::CupEnd => MessageKind::CupEnd,
            Self::Restart => MessageKind::Restart,
            Self::RaceTimeUpdate { .. } => MessageKind::RaceTimeUpdate,
            Self::SectorComplete { .. } => MessageKind::SectorComplete,
            Self::LapComplete { .. } => MessageKind::LapComplete,
            Self::CarFinished { .. } => MessageKind::CarFinished,
            Self::Collision { .. } => MessageKind::Collision,
            Self::CarCollision { .. } => MessageKind::CarCollision,
        }
    }

    /// The cup state a lifecycle message puts its receiver in.
    ///
    /// `StageEnd` and `StageLoadFailed` return `None`: the message that follows them
    /// (`Intermission` or `CupEnd`) decides where the cup goes.
    #[must_use]
    pub const fn lifecycle_state(&self) -> Option<CupState> {
        match self {
            Self::Intermission { .. } => Some(CupState::Intermission),
            Self::PreInitialization { .. } => Some(CupState::PreInitialization),
            Self::Initialization { .. } => Some(CupState::Initialization),
            Self::StageBegin { .. } => Some(CupState::Action),
            Self::CupEnd => Some(CupState::End),
            Self::Restart => Some(CupState::Registration),
            _ => None,
        }
    }
}
