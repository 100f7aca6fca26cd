use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::routing::codec::CodecError;
use crate::{ClientId, CupState};

/// This enum contains all error messages this library can return. Most API functions will
/// generally return a [`Result<_, CupError>`].
///
/// Nothing in here is fatal: capacity errors are reported to the requesting participant
/// and leave the cup untouched.
///
/// [`Result<_, CupError>`]: std::result::Result
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CupError {
    /// Every client slot is taken.
    TooManyClients,
    /// Accepting the incoming players would exceed the cup's player limit.
    TooManyPlayers {
        /// Number of players the client tried to register.
        requested: usize,
        /// Number of player places still free.
        available: usize,
    },
    /// Clients can only register while the cup is in [`CupState::Registration`].
    RegistrationClosed {
        /// The state the cup was in when the request arrived.
        state: CupState,
    },
    /// The client id does not refer to a registered client.
    UnknownClient {
        /// The id that was looked up.
        client: ClientId,
    },
    /// The session configuration was rejected.
    InvalidConfiguration {
        /// Why the configuration is invalid.
        kind: ConfigErrorKind,
    },
    /// A message could not be encoded or decoded.
    Codec(CodecError),
}

/// Reasons a [`CupSettings`](crate::CupSettings) or builder configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigErrorKind {
    /// `max_players` must be at least 1.
    NoPlayerCapacity,
    /// At least one car must be selected.
    NoCarsSelected,
    /// `max_players` exceeds the number of car instances a stage can address.
    PlayerCapacityTooLarge {
        /// The requested limit.
        max_players: usize,
        /// The largest accepted limit.
        limit: usize,
    },
    /// More cars are selected than a model id can address.
    TooManyCars {
        /// Number of selected cars.
        selected: usize,
        /// The largest accepted selection.
        limit: usize,
    },
    /// A track needs at least one control point (the finish line).
    NoControlPoints {
        /// Name of the offending track.
        track: String,
    },
    /// A race needs at least one lap.
    NoLaps {
        /// Name of the offending track.
        track: String,
    },
    /// The settings could not be parsed.
    Malformed {
        /// Parser diagnostic.
        context: String,
    },
}

impl Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPlayerCapacity => write!(f, "max_players must be at least 1"),
            Self::NoCarsSelected => write!(f, "at least one car must be selected"),
            Self::PlayerCapacityTooLarge { max_players, limit } => write!(
                f,
                "max_players is {} but a stage holds at most {} cars",
                max_players, limit
            ),
            Self::TooManyCars { selected, limit } => {
                write!(f, "{} cars selected, at most {} allowed", selected, limit)
            },
            Self::NoControlPoints { track } => {
                write!(f, "track '{}' has no control points", track)
            },
            Self::NoLaps { track } => write!(f, "track '{}' is raced over zero laps", track),
            Self::Malformed { context } => write!(f, "malformed settings: {}", context),
        }
    }
}

impl From<ConfigErrorKind> for CupError {
    fn from(kind: ConfigErrorKind) -> Self {
        Self::InvalidConfiguration { kind }
    }
}

impl From<CodecError> for CupError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl Display for CupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CupError::TooManyClients => {
                write!(f, "Registration rejected: every client slot is taken.")
            },
            CupError::TooManyPlayers {
                requested,
                available,
            } => {
                write!(
                    f,
                    "Registration rejected: {} players requested but only {} places left.",
                    requested, available
                )
            },
            CupError::RegistrationClosed { state } => {
                write!(f, "Registration is closed while the cup is in {}.", state)
            },
            CupError::UnknownClient { client } => {
                write!(f, "Client {} is not registered.", client)
            },
            CupError::InvalidConfiguration { kind } => {
                write!(f, "Invalid configuration: {}", kind)
            },
            CupError::Codec(err) => write!(f, "Codec error: {}", err),
        }
    }
}

impl Error for CupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CupError::Codec(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of a registration request, in the form conveyed to clients.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum RegistrationStatus {
    /// The client was registered.
    Success,
    /// Every client slot is taken.
    TooManyClients,
    /// The player limit would be exceeded.
    TooManyPlayers,
    /// The cup is past its registration phase.
    RegistrationClosed,
}

impl CupError {
    /// Maps a registration failure onto the status reported to the requesting client.
    ///
    /// Returns `None` for errors that registration never produces.
    #[must_use]
    pub const fn registration_status(&self) -> Option<RegistrationStatus> {
        match self {
            Self::TooManyClients => Some(RegistrationStatus::TooManyClients),
            Self::TooManyPlayers { .. } => Some(RegistrationStatus::TooManyPlayers),
            Self::RegistrationClosed { .. } => Some(RegistrationStatus::RegistrationClosed),
            _ => None,
        }
    }
}
