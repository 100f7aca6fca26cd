//! The cup data model: settings, roster and client slot table.
//!
//! A [`Cup`] is only ever mutated by registration and by lifecycle messages passed to
//! [`Cup::apply`]. The controller applies every message it emits through the same
//! method any other consumer uses, so its view of the cup cannot drift from what the
//! clients were told.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{ConfigErrorKind, CupError};
use crate::messages::Message;
use crate::telemetry::{InvariantChecker, InvariantViolation};
use crate::{CarMode, ClientId, CupState, StageId, MAX_CLIENT_COUNT};

/// Default player limit for a cup.
const DEFAULT_MAX_PLAYERS: usize = 16;

/// Car instance ids are `u16`, so a stage holds at most this many cars.
pub const MAX_STAGE_CARS: usize = u16::MAX as usize;

/// Model ids are `u16` indices into the selected cars.
pub const MAX_SELECTED_CARS: usize = u16::MAX as usize + 1;

/// A track raced in one stage of the cup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackDescription {
    /// Resource name of the track.
    pub name: String,
    /// Number of control points on the course. The last one is the finish line.
    pub control_points: u16,
    /// Laps raced on this track.
    pub laps: u32,
}

impl TrackDescription {
    /// Creates a new track description.
    #[must_use]
    pub fn new(name: impl Into<String>, control_points: u16, laps: u32) -> Self {
        Self {
            name: name.into(),
            control_points,
            laps,
        }
    }
}

/// A selectable car model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarDefinition {
    /// Resource name of the car model.
    pub name: String,
}

impl CarDefinition {
    /// Creates a new car definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A player brought into the cup by a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerDefinition {
    /// Display name.
    pub name: String,
    /// Numeric id chosen by the client.
    pub id: u32,
    /// The control slot (local input device) this player uses on its client.
    pub control_slot: u8,
    /// Paint scheme.
    pub color_scheme: u32,
    /// Index of the car this player asked for. Only honored with [`CarMode::Free`].
    pub preferred_car: Option<u16>,
}

impl PlayerDefinition {
    /// Creates a player on the given control slot.
    #[must_use]
    pub fn new(name: impl Into<String>, control_slot: u8) -> Self {
        Self {
            name: name.into(),
            id: u32::from(control_slot),
            control_slot,
            color_scheme: 0,
            preferred_car: None,
        }
    }

    /// Sets the paint scheme.
    #[must_use]
    pub fn with_color_scheme(mut self, color_scheme: u32) -> Self {
        self.color_scheme = color_scheme;
        self
    }

    /// Sets the preferred car model.
    #[must_use]
    pub fn with_preferred_car(mut self, car: u16) -> Self {
        self.preferred_car = Some(car);
        self
    }
}

/// A registered client and its players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Slot id of this client.
    pub id: ClientId,
    /// Players in registration order.
    pub players: SmallVec<[PlayerDefinition; 4]>,
}

/// Settings a cup is built from.
///
/// # Example
///
/// ```
/// use pitlane::{CarMode, CupSettings, TrackDescription};
///
/// let settings = CupSettings {
///     tracks: vec![
///         TrackDescription::new("harbor loop", 6, 3),
///         TrackDescription::new("canyon run", 9, 2),
///     ],
///     car_mode: CarMode::Random,
///     max_players: 8,
///     ..CupSettings::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "CupSettings has no effect unless passed to SessionBuilder::with_settings()"]
#[serde(default)]
pub struct CupSettings {
    /// Tracks in racing order, one per stage.
    pub tracks: Vec<TrackDescription>,
    /// Selected car models.
    pub cars: Vec<CarDefinition>,
    /// How car models are assigned.
    pub car_mode: CarMode,
    /// Maximum number of players across all clients.
    pub max_players: usize,
}

impl Default for CupSettings {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            cars: vec![CarDefinition::new("standard")],
            car_mode: CarMode::Fixed,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }
}

impl CupSettings {
    /// A cup of one race on the given track.
    pub fn single_race(track: TrackDescription) -> Self {
        Self {
            tracks: vec![track],
            ..Self::default()
        }
    }

    /// Checks the settings for values no cup can run with.
    ///
    /// An empty track list is valid: the cup goes straight to its end.
    pub fn validate(&self) -> Result<(), CupError> {
        if self.max_players == 0 {
            return Err(ConfigErrorKind::NoPlayerCapacity.into());
        }
        if self.max_players > MAX_STAGE_CARS {
            return Err(ConfigErrorKind::PlayerCapacityTooLarge {
                max_players: self.max_players,
                limit: MAX_STAGE_CARS,
            }
            .into());
        }
        if self.cars.is_empty() {
            return Err(ConfigErrorKind::NoCarsSelected.into());
        }
        if self.cars.len() > MAX_SELECTED_CARS {
            return Err(ConfigErrorKind::TooManyCars {
                selected: self.cars.len(),
                limit: MAX_SELECTED_CARS,
            }
            .into());
        }
        for track in &self.tracks {
            if track.control_points == 0 {
                return Err(ConfigErrorKind::NoControlPoints {
                    track: track.name.clone(),
                }
                .into());
            }
            if track.laps == 0 {
                return Err(ConfigErrorKind::NoLaps {
                    track: track.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Parses settings from JSON. Missing fields take their default values.
    #[cfg(feature = "json")]
    pub fn from_json_str(json: &str) -> Result<Self, CupError> {
        let settings: Self = serde_json::from_str(json).map_err(|e| {
            CupError::from(ConfigErrorKind::Malformed {
                context: e.to_string(),
            })
        })?;
        settings.validate()?;
        Ok(settings)
    }
}

/// The fixed-size client slot table.
///
/// Slots are allocated lowest-free-first. Iteration only covers slots below the
/// high-water mark [`end`](Self::end): removing the highest client lowers the mark past
/// any trailing empty slots, removing any other client leaves it alone.
#[derive(Debug, Clone)]
pub struct ClientSlots {
    slots: Vec<Option<Client>>,
    end: usize,
}

impl Default for ClientSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSlots {
    /// Creates an empty table of [`MAX_CLIENT_COUNT`] slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![None; MAX_CLIENT_COUNT],
            end: 0,
        }
    }

    /// The iteration bound: one past the highest occupied slot.
    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` if no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    /// Returns the lowest free slot id, if any.
    #[must_use]
    pub fn lowest_free(&self) -> Option<ClientId> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(|index| ClientId::new(index as u8))
    }

    /// Stores the players in the lowest free slot.
    pub fn insert(&mut self, players: SmallVec<[PlayerDefinition; 4]>) -> Option<ClientId> {
        let id = self.lowest_free()?;
        self.slots[id.as_usize()] = Some(Client { id, players });
        self.end = self.end.max(id.as_usize() + 1);
        Some(id)
    }

    /// Frees the slot, returning its client.
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        let client = self.slots.get_mut(id.as_usize())?.take()?;
        if id.as_usize() + 1 == self.end {
            while self.end > 0 && self.slots[self.end - 1].is_none() {
                self.end -= 1;
            }
        }
        Some(client)
    }

    /// Returns the client in the slot.
    #[must_use]
    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.slots.get(id.as_usize())?.as_ref()
    }

    /// Iterates the registered clients in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Client> + '_ {
        self.slots[..self.end].iter().flatten()
    }
}

/// The cup: roster, tracks, cars and current state.
#[derive(Debug, Clone)]
pub struct Cup {
    tracks: Vec<TrackDescription>,
    cars: Vec<CarDefinition>,
    car_mode: CarMode,
    max_players: usize,
    clients: ClientSlots,
    player_count: usize,
    current_stage: StageId,
    state: CupState,
}

impl Cup {
    /// Builds an empty cup in [`CupState::Registration`].
    pub fn new(settings: CupSettings) -> Self {
        let CupSettings {
            tracks,
            cars,
            car_mode,
            max_players,
        } = settings;
        Self {
            tracks,
            cars,
            car_mode,
            max_players,
            clients: ClientSlots::new(),
            player_count: 0,
            current_stage: StageId::default(),
            state: CupState::Registration,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CupState {
        self.state
    }

    /// Index of the current (or next) stage.
    #[must_use]
    pub fn current_stage(&self) -> StageId {
        self.current_stage
    }

    /// Track of the current stage, if the cup has not run out of stages.
    #[must_use]
    pub fn current_track(&self) -> Option<&TrackDescription> {
        self.tracks.get(self.current_stage.as_usize())
    }

    /// All tracks in racing order.
    #[must_use]
    pub fn tracks(&self) -> &[TrackDescription] {
        &self.tracks
    }

    /// Selected car models.
    #[must_use]
    pub fn cars(&self) -> &[CarDefinition] {
        &self.cars
    }

    /// Car assignment mode.
    #[must_use]
    pub fn car_mode(&self) -> CarMode {
        self.car_mode
    }

    /// Player limit.
    #[must_use]
    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Players currently registered across all clients.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.player_count
    }

    /// The client slot table.
    #[must_use]
    pub fn clients(&self) -> &ClientSlots {
        &self.clients
    }

    /// Returns a registered client.
    #[must_use]
    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Iteration bound of the client table.
    #[must_use]
    pub fn clients_end(&self) -> usize {
        self.clients.end()
    }

    /// Registers a client with its players.
    ///
    /// Capacity is checked before slot availability, and nothing changes on rejection.
    pub fn register_client(&mut self, players: Vec<PlayerDefinition>) -> Result<ClientId, CupError> {
        if self.state != CupState::Registration {
            return Err(CupError::RegistrationClosed { state: self.state });
        }
        let available = self.max_players.saturating_sub(self.player_count);
        if players.len() > available {
            return Err(CupError::TooManyPlayers {
                requested: players.len(),
                available,
            });
        }
        if self.clients.lowest_free().is_none() {
            return Err(CupError::TooManyClients);
        }

        let incoming = players.len();
        let id = self
            .clients
            .insert(SmallVec::from_vec(players))
            .ok_or(CupError::TooManyClients)?;
        self.player_count += incoming;
        debug!(client = %id, players = incoming, total = self.player_count, "client registered");
        crate::debug_check_invariants!(self, "after register_client");
        Ok(id)
    }

    /// Removes a client and frees its players' places.
    pub fn unregister_client(&mut self, id: ClientId) -> Result<Client, CupError> {
        let client = self
            .clients
            .remove(id)
            .ok_or(CupError::UnknownClient { client: id })?;
        self.player_count -= client.players.len();
        debug!(client = %id, total = self.player_count, "client unregistered");
        crate::debug_check_invariants!(self, "after unregister_client");
        Ok(client)
    }

    /// Applies a lifecycle message. Returns `true` if the message changed the cup.
    ///
    /// Any other message is ignored.
    pub fn apply(&mut self, message: &Message) -> bool {
        match message {
            Message::Intermission { stage_id, .. } => {
                self.current_stage = *stage_id;
            },
            Message::StageEnd { stage_id } => {
                self.current_stage = stage_id.next();
                return true;
            },
            Message::Restart => {
                self.current_stage = StageId::default();
            },
            _ => {},
        }
        match message.lifecycle_state() {
            Some(state) => {
                self.state = state;
                true
            },
            None => false,
        }
    }
}

impl InvariantChecker for Cup {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let counted: usize = self.clients.iter().map(|c| c.players.len()).sum();
        if counted != self.player_count {
            return Err(InvariantViolation::new("Cup", "player count out of sync with roster")
                .with_details(format!("counted={}, tracked={}", counted, self.player_count)));
        }
        if self.player_count > self.max_players {
            return Err(InvariantViolation::new("Cup", "player count exceeds limit")
                .with_details(format!("{} > {}", self.player_count, self.max_players)));
        }
        let end = self.clients.end();
        if end > 0 && self.clients.slots[end - 1].is_none() {
            return Err(InvariantViolation::new(
                "Cup",
                "client iteration bound past the highest occupied slot",
            )
            .with_details(format!("end={}", end)));
        }
        if self.clients.slots[end..].iter().any(Option::is_some) {
            return Err(InvariantViolation::new("Cup", "client registered beyond iteration bound")
                .with_details(format!("end={}", end)));
        }
        Ok(())
    }
}
