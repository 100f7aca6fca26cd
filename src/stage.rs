//! Loaded stages and the world they wrap.

pub mod loader;
pub mod race_tracker;
pub mod regulator;

use std::fmt;

use crate::messages::{CollisionResult, ControlPointFlags, ControlsMask, StageDescription};
use crate::stage::race_tracker::RaceTracker;
use crate::{CarInstanceId, Millis, StageId};

/// Something the world reports after a simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    /// A car crossed a control point.
    ControlPointHit {
        /// The car.
        entity: CarInstanceId,
        /// The control point, from 1.
        point: u16,
        /// The point's flags.
        flags: ControlPointFlags,
        /// When, relative to the start of the step.
        frame_offset: Millis,
    },
    /// A car hit the environment.
    Collision {
        /// The car.
        entity: CarInstanceId,
        /// The outcome.
        result: CollisionResult,
    },
    /// Two cars hit each other.
    CarCollision {
        /// The car that initiated contact.
        subject: CarInstanceId,
        /// The car that was hit.
        object: CarInstanceId,
        /// The outcome.
        result: CollisionResult,
    },
}

/// The simulated world of one stage.
///
/// Implemented by the physics layer. Worlds are built on the loader thread and then
/// moved to the update thread, hence `Send`.
pub trait World: Send {
    /// Simulates `frame_duration` milliseconds, appending what happened to `events`.
    fn advance(&mut self, frame_duration: Millis, events: &mut Vec<WorldEvent>);

    /// Applies control input to a controllable. Returns `false` if there is no such
    /// controllable.
    fn set_controls(&mut self, controllable: CarInstanceId, controls: ControlsMask) -> bool;
}

/// A loaded stage: its world, description, clock and race tracker.
pub struct Stage {
    pub(crate) world: Box<dyn World>,
    pub(crate) description: StageDescription,
    pub(crate) clock: Millis,
    pub(crate) tracker: RaceTracker,
    pub(crate) events: Vec<WorldEvent>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("stage_id", &self.description.stage_id)
            .field("track", &self.description.track.name)
            .field("clock", &self.clock)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl Stage {
    /// Wraps a freshly built world. The tracker follows every car in `description`.
    #[must_use]
    pub fn new(world: Box<dyn World>, description: StageDescription) -> Self {
        let tracker = RaceTracker::new(
            description.track.control_points,
            description.track.laps,
            description.cars.iter().map(|car| car.instance_id),
        );
        Self {
            world,
            description,
            clock: 0,
            tracker,
            events: Vec::new(),
        }
    }

    /// The stage's id.
    #[must_use]
    pub fn stage_id(&self) -> StageId {
        self.description.stage_id
    }

    /// The description this stage was built from.
    #[must_use]
    pub fn description(&self) -> &StageDescription {
        &self.description
    }

    /// Milliseconds simulated since the stage began.
    #[must_use]
    pub fn clock(&self) -> Millis {
        self.clock
    }

    /// The race tracker.
    #[must_use]
    pub fn tracker(&self) -> &RaceTracker {
        &self.tracker
    }
}
