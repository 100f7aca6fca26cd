//! Synchronization primitives used across the crate.
//!
//! Import from this module instead of directly from `parking_lot` or `std::sync`:
//!
//! ```ignore
//! use crate::sync::{Arc, Mutex};
//! ```
//!
//! The game loop itself is single-threaded. Locks only guard state shared with
//! observers and receivers that callers keep a handle to (see
//! [`MessageReceiver`](crate::MessageReceiver) for `Arc<Mutex<R>>`).

pub use parking_lot::Mutex;
pub use std::sync::Arc;
