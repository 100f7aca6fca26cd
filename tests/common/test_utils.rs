//! Shared helpers for session tests.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pitlane::{
    Conveyor, CupSession, CupSettings, LocalSink, PlayerDefinition, ReceiverSlot,
    SessionBuilder, StageFactory,
};

use super::stubs::RecordingReceiver;

/// How long a stub stage load may take before a test gives up.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(5);
/// Sleep between load polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Installs a test-writer subscriber so `tracing` output shows up in failing tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// `n` players on consecutive control slots.
pub fn players(n: usize) -> Vec<PlayerDefinition> {
    (0..n)
        .map(|i| PlayerDefinition::new(format!("driver{i}"), i as u8))
        .collect()
}

/// A seeded single-process session whose local pipeline is recorded.
pub fn local_session(
    settings: CupSettings,
    factory: Arc<dyn StageFactory>,
) -> (CupSession, Arc<Mutex<RecordingReceiver>>) {
    init_tracing();
    let recorder = RecordingReceiver::shared();
    let mut conveyor = Conveyor::new();
    conveyor.attach(ReceiverSlot::Client, Arc::clone(&recorder));
    let session = SessionBuilder::new()
        .with_settings(settings)
        .with_sink(LocalSink::with_conveyor(conveyor))
        .with_stage_factory(factory)
        .with_seed(0x5eed)
        .start_session()
        .expect("test settings are valid");
    (session, recorder)
}

/// Ticks the session until its stage load resolves.
pub fn wait_for_load(session: &mut CupSession) {
    let start = Instant::now();
    while session.is_loading() {
        assert!(start.elapsed() < LOAD_TIMEOUT, "stage load timed out");
        std::thread::sleep(POLL_INTERVAL);
        session.update(0);
    }
}
