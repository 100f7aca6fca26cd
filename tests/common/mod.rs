//! Common test infrastructure shared across integration tests.
//!
//! This module provides:
//! - `stubs`: scripted world, stage factories, recording receivers and channels
//! - `test_utils`: session setup and load-wait helpers
//!
//! # Usage
//!
//! From any integration test file:
//! ```ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! use common::stubs::{RecordingReceiver, StubFactory};
//! use common::{local_session, wait_for_load};
//! ```

pub mod stubs;
pub mod test_utils;

// These are public utilities for integration tests - allow unused until tests adopt them.
#[allow(unused_imports)]
pub use test_utils::{
    init_tracing, local_session, players, wait_for_load, LOAD_TIMEOUT, POLL_INTERVAL,
};
