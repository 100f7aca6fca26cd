//! Convenient re-exports for common usage.
//!
//! This module provides a "prelude" that re-exports the most commonly used types
//! from pitlane, allowing you to import them all at once.
//!
//! # Usage
//!
//! ```rust
//! use pitlane::prelude::*;
//! ```
//!
//! # What's Included
//!
//! - **Session types**: [`CupSession`], [`SessionBuilder`]
//! - **Cup model**: [`CupSettings`], [`TrackDescription`], [`CarDefinition`], [`PlayerDefinition`]
//! - **Fundamental types**: [`ClientId`], [`StageId`], [`CarInstanceId`], [`RemoteClient`],
//!   [`RemoteHandle`], [`CupState`], [`CarMode`], [`Millis`]
//! - **Messages**: [`Message`], [`MessageKind`], [`ControlsMask`], [`ControlPointFlags`]
//! - **Routing**: [`MessageSink`], [`MessageReceiver`], [`Conveyor`], [`ReceiverSlot`],
//!   [`LocalSink`], [`MessageDistributor`], [`QueuedChannel`]
//! - **Stage integration**: [`World`], [`WorldEvent`], [`StageFactory`], [`LoadError`]
//! - **Client receivers**: [`CupSynchronizer`], [`RaceBoard`]
//! - **Error handling**: [`CupError`], [`RegistrationStatus`]
//!
//! # Example
//!
//! ```rust
//! use pitlane::prelude::*;
//!
//! let mut sink = LocalSink::new();
//! let mirror = std::sync::Arc::new(parking_lot::Mutex::new(CupSynchronizer::new()));
//! sink.conveyor_mut().attach(ReceiverSlot::CupSynchronizer, mirror.clone());
//!
//! let mut session = SessionBuilder::new()
//!     .with_settings(CupSettings::single_race(TrackDescription::new("oval", 4, 3)))
//!     .with_sink(sink)
//!     .start_session()
//!     .expect("settings are valid");
//!
//! session.advance();
//! assert_eq!(mirror.lock().state(), CupState::Intermission);
//! ```

// Core session types
pub use crate::sessions::builder::SessionBuilder;
pub use crate::sessions::session::CupSession;

// Cup model
pub use crate::cup::{CarDefinition, CupSettings, PlayerDefinition, TrackDescription};

// Fundamental types
pub use crate::{
    CarInstanceId, CarMode, ClientId, CupState, Millis, RemoteClient, RemoteHandle, StageId,
};

// Messages
pub use crate::messages::{ControlPointFlags, ControlsMask, Message, MessageKind};

// Routing
pub use crate::routing::channel::QueuedChannel;
pub use crate::routing::conveyor::{Conveyor, MessageReceiver, ReceiverSlot};
pub use crate::routing::distributor::{LocalSink, MessageDistributor};
pub use crate::routing::MessageSink;

// Stage integration
pub use crate::stage::loader::{LoadError, StageFactory};
pub use crate::stage::{World, WorldEvent};

// Client-side receivers
pub use crate::client::{CupSynchronizer, RaceBoard};

// Error handling
pub use crate::error::{CupError, RegistrationStatus};
