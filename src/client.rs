//! Receivers a participant attaches to its conveyor.
//!
//! A remote participant does not run a [`CupController`](crate::CupController). It
//! learns where the cup is from the lifecycle messages the host broadcasts, and keeps
//! its race display current from the race events.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::cup::TrackDescription;
use crate::error::RegistrationStatus;
use crate::messages::{Message, MessageKind, StageDescription};
use crate::routing::conveyor::MessageReceiver;
use crate::{CarInstanceId, ClientId, CupState, Millis, StageId};

/// Mirrors the cup lifecycle from received messages.
///
/// ```
/// use pitlane::{CupState, CupSynchronizer, Message, MessageReceiver, StageId};
///
/// let mut mirror = CupSynchronizer::new();
/// mirror.receive(&Message::StageBegin { stage_id: StageId::new(0) });
/// assert_eq!(mirror.state(), CupState::Action);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CupSynchronizer {
    state: CupState,
    stage_id: StageId,
    track: Option<TrackDescription>,
    description: Option<StageDescription>,
    registration: Option<(ClientId, u64)>,
    rejection: Option<RegistrationStatus>,
    stages_completed: u32,
    failed_loads: u32,
}

impl CupSynchronizer {
    /// Creates a mirror of a cup in Registration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The mirrored state.
    #[must_use]
    pub fn state(&self) -> CupState {
        self.state
    }

    /// The current (or next) stage.
    #[must_use]
    pub fn stage_id(&self) -> StageId {
        self.stage_id
    }

    /// The announced track.
    #[must_use]
    pub fn track(&self) -> Option<&TrackDescription> {
        self.track.as_ref()
    }

    /// The published stage description.
    #[must_use]
    pub fn description(&self) -> Option<&StageDescription> {
        self.description.as_ref()
    }

    /// The id and key this participant was registered with.
    #[must_use]
    pub fn registration(&self) -> Option<(ClientId, u64)> {
        self.registration
    }

    /// Why registration was refused, if it was.
    #[must_use]
    pub fn rejection(&self) -> Option<RegistrationStatus> {
        self.rejection
    }

    /// Stages raced to the end since the last restart.
    #[must_use]
    pub fn stages_completed(&self) -> u32 {
        self.stages_completed
    }

    /// Stage loads the host reported as failed since the last restart.
    #[must_use]
    pub fn failed_loads(&self) -> u32 {
        self.failed_loads
    }

    /// The `Ready` message to send once the local stage is loaded.
    ///
    /// `None` unless the cup is in Initialization and this participant is registered.
    #[must_use]
    pub fn ready_message(&self) -> Option<Message> {
        match (self.state, self.registration) {
            (CupState::Initialization, Some((client_id, _))) => Some(Message::Ready { client_id }),
            _ => None,
        }
    }
}

impl MessageReceiver for CupSynchronizer {
    fn accepts(&self, kind: MessageKind) -> bool {
        kind.is_lifecycle()
            || matches!(kind, MessageKind::RegistrationSuccess | MessageKind::ServerFull)
    }

    fn receive(&mut self, message: &Message) {
        match message {
            Message::RegistrationSuccess {
                client_id,
                client_key,
            } => {
                self.registration = Some((*client_id, *client_key));
                self.rejection = None;
            },
            Message::ServerFull { status } => self.rejection = Some(*status),
            Message::Intermission { stage_id, track } => {
                self.stage_id = *stage_id;
                self.track = Some(track.clone());
                self.description = None;
            },
            Message::PreInitialization {
                stage_id,
                description,
            } => {
                self.stage_id = *stage_id;
                self.description = Some(description.clone());
            },
            Message::StageLoadFailed { .. } => self.failed_loads += 1,
            Message::StageEnd { stage_id } => {
                self.stages_completed += 1;
                self.stage_id = stage_id.next();
            },
            Message::Restart => {
                let registration = self.registration;
                *self = Self {
                    registration,
                    ..Self::default()
                };
            },
            _ => {},
        }
        if let Some(state) = message.lifecycle_state() {
            self.state = state;
        }
    }
}

/// One car's results as seen on the race board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaceStanding {
    /// The car.
    pub car: CarInstanceId,
    /// Laps completed.
    pub laps: u32,
    /// Sectors completed over the whole race.
    pub sectors: u32,
    /// Time of the last lap.
    pub last_lap_time: Option<Millis>,
    /// Time of the best lap.
    pub best_lap_time: Option<Millis>,
    /// Finishing position, once finished.
    pub position: Option<u16>,
    /// Race time at the finish, once finished.
    pub finish_time: Option<Millis>,
    /// Collisions the car took part in.
    pub collisions: u32,
}

impl RaceStanding {
    fn new(car: CarInstanceId) -> Self {
        Self {
            car,
            ..Self::default()
        }
    }
}

/// Accumulates race events into per-car standings.
#[derive(Debug, Clone, Default)]
pub struct RaceBoard {
    race_time: Millis,
    standings: BTreeMap<CarInstanceId, RaceStanding>,
}

impl RaceBoard {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last race time received.
    #[must_use]
    pub fn race_time(&self) -> Millis {
        self.race_time
    }

    /// One car's standing.
    #[must_use]
    pub fn standing(&self, car: CarInstanceId) -> Option<&RaceStanding> {
        self.standings.get(&car)
    }

    /// Standings in race order: finishers by position, then the rest by progress.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<&RaceStanding> {
        let mut rows: Vec<&RaceStanding> = self.standings.values().collect();
        rows.sort_by_key(|s| {
            (
                s.position.map_or((1, 0), |p| (0, p)),
                Reverse(s.laps),
                Reverse(s.sectors),
                s.car,
            )
        });
        rows
    }

    fn entry(&mut self, car: CarInstanceId) -> &mut RaceStanding {
        self.standings
            .entry(car)
            .or_insert_with(|| RaceStanding::new(car))
    }
}

impl MessageReceiver for RaceBoard {
    fn accepts(&self, kind: MessageKind) -> bool {
        kind.is_race_event() || kind == MessageKind::PreInitialization
    }

    fn receive(&mut self, message: &Message) {
        match message {
            Message::PreInitialization { description, .. } => {
                self.race_time = 0;
                self.standings = description
                    .cars
                    .iter()
                    .map(|car| (car.instance_id, RaceStanding::new(car.instance_id)))
                    .collect();
            },
            Message::RaceTimeUpdate { race_time } => self.race_time = *race_time,
            Message::SectorComplete { car, .. } => self.entry(*car).sectors += 1,
            Message::LapComplete { car, lap, time, .. } => {
                let standing = self.entry(*car);
                standing.laps = *lap;
                standing.last_lap_time = Some(*time);
                standing.best_lap_time = Some(standing.best_lap_time.map_or(*time, |b| b.min(*time)));
            },
            Message::CarFinished {
                car,
                race_time,
                position,
            } => {
                let standing = self.entry(*car);
                standing.position = Some(*position);
                standing.finish_time = Some(*race_time);
            },
            Message::Collision { entity, .. } => self.entry(*entity).collisions += 1,
            Message::CarCollision {
                subject, object, ..
            } => {
                self.entry(*subject).collisions += 1;
                self.entry(*object).collisions += 1;
            },
            _ => {},
        }
    }
}
