//! Off-thread stage construction.
//!
//! The loader hands a [`StageDescription`] to a [`StageFactory`] on a worker thread
//! and returns a [`LoadHandle`] the session polls once per tick. Polling never blocks.
//! Taking the result joins a thread that has already finished.

use std::fmt;
use std::thread::{self, JoinHandle};

use web_time::{Duration, Instant};

use crate::messages::{ControlsMask, StageDescription};
use crate::stage::{Stage, World, WorldEvent};
use crate::sync::Arc;
use crate::{CarInstanceId, Millis, StageId};

/// Why a stage could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoadError {
    /// The factory rejected the description.
    Factory {
        /// Factory diagnostic.
        reason: String,
    },
    /// The worker thread panicked.
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },
    /// The worker thread could not be started.
    Spawn {
        /// OS diagnostic.
        reason: String,
    },
}

impl LoadError {
    /// Creates a factory error.
    pub fn factory(reason: impl Into<String>) -> Self {
        Self::Factory {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Factory { reason } => write!(f, "stage factory failed: {}", reason),
            Self::Panicked { message } => write!(f, "stage loader panicked: {}", message),
            Self::Spawn { reason } => write!(f, "could not start stage loader: {}", reason),
        }
    }
}

impl std::error::Error for LoadError {}

/// Builds worlds. Called on the loader thread.
pub trait StageFactory: Send + Sync {
    /// Builds the world for `description`.
    fn build(&self, description: &StageDescription) -> Result<Box<dyn World>, LoadError>;
}

/// Builds [`HeadlessWorld`]s: for hosts that only relay messages and never simulate.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessFactory;

impl StageFactory for HeadlessFactory {
    fn build(&self, description: &StageDescription) -> Result<Box<dyn World>, LoadError> {
        Ok(Box::new(HeadlessWorld {
            cars: description.cars.iter().map(|car| car.instance_id).collect(),
        }))
    }
}

/// A world with cars but no physics. Accepts controls for its cars and reports nothing.
#[derive(Debug, Clone, Default)]
pub struct HeadlessWorld {
    cars: Vec<CarInstanceId>,
}

impl World for HeadlessWorld {
    fn advance(&mut self, _frame_duration: Millis, _events: &mut Vec<WorldEvent>) {}

    fn set_controls(&mut self, controllable: CarInstanceId, _controls: ControlsMask) -> bool {
        self.cars.contains(&controllable)
    }
}

/// Starts stage loads.
#[derive(Clone)]
pub struct StageLoader {
    factory: Arc<dyn StageFactory>,
}

impl fmt::Debug for StageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageLoader").finish_non_exhaustive()
    }
}

impl StageLoader {
    /// Creates a loader around `factory`.
    pub fn new(factory: Arc<dyn StageFactory>) -> Self {
        Self { factory }
    }

    /// Starts building the stage on a worker thread.
    pub fn load(&self, description: StageDescription) -> Result<LoadHandle, LoadError> {
        let stage_id = description.stage_id;
        let factory = Arc::clone(&self.factory);
        let join = thread::Builder::new()
            .name(format!("pitlane-stage-{}", stage_id))
            .spawn(move || {
                let world = factory.build(&description)?;
                Ok(Stage::new(world, description))
            })
            .map_err(|e| LoadError::Spawn {
                reason: e.to_string(),
            })?;
        Ok(LoadHandle {
            stage_id,
            started: Instant::now(),
            join,
        })
    }
}

/// A stage load in flight.
///
/// Dropping the handle abandons the load: the worker runs to completion and its
/// result is discarded.
pub struct LoadHandle {
    stage_id: StageId,
    started: Instant,
    join: JoinHandle<Result<Stage, LoadError>>,
}

impl fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandle")
            .field("stage_id", &self.stage_id)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl LoadHandle {
    /// The stage being loaded.
    #[must_use]
    pub fn stage_id(&self) -> StageId {
        self.stage_id
    }

    /// Time since the load started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns `true` once the worker has finished. Never blocks.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the worker and returns the stage.
    pub fn take_result(self) -> Result<Stage, LoadError> {
        match self.join.join() {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_owned());
                Err(LoadError::Panicked { message })
            },
        }
    }
}
