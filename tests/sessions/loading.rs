//! Asynchronous stage loading through the session.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use pitlane::telemetry::{CollectingObserver, ViolationKind, ViolationSeverity};
use pitlane::{
    CupSettings, CupState, LocalSink, Message, MessageKind, RemoteClient, SessionBuilder, StageId,
    TrackDescription,
};

use crate::common::stubs::StubFactory;
use crate::common::{local_session, players, wait_for_load};

fn single() -> CupSettings {
    CupSettings::single_race(TrackDescription::new("quarry", 4, 2))
}

#[test]
fn failed_load_returns_to_intermission_and_retry_succeeds() {
    let factory = StubFactory::failing_first(1);
    let observer = Arc::new(CollectingObserver::new());
    let mut session = SessionBuilder::new()
        .with_settings(single())
        .with_stage_factory(factory.clone())
        .with_violation_observer(observer.clone())
        .with_sink(LocalSink::new())
        .start_session()
        .unwrap();
    session
        .register_client(RemoteClient::Local, players(1))
        .unwrap();

    session.advance();
    session.advance();
    wait_for_load(&mut session);
    assert_eq!(session.state(), CupState::Intermission);
    assert_eq!(session.cup().current_stage(), StageId::new(0));
    assert!(session.stage().is_none());
    pitlane::assert_violation!(observer, ViolationKind::StageLoading);
    let failures = observer.violations_at_severity(ViolationSeverity::Error);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage, Some(StageId::new(0)));
    assert_eq!(failures[0].context.get("track").map(String::as_str), Some("quarry"));

    session.advance();
    wait_for_load(&mut session);
    assert_eq!(session.state(), CupState::Initialization);
    assert_eq!(factory.build_count(), 2);
}

#[test]
fn failed_load_emits_failure_then_intermission() {
    let (mut session, recorder) = local_session(single(), StubFactory::failing_first(1));
    session.advance();
    session.advance();
    wait_for_load(&mut session);
    let kinds = recorder.lock().kinds();
    assert_eq!(
        kinds[kinds.len() - 2..],
        [MessageKind::StageLoadFailed, MessageKind::Intermission]
    );
}

#[test]
fn panicking_factory_is_a_load_failure() {
    let observer = Arc::new(CollectingObserver::new());
    let mut session = SessionBuilder::new()
        .with_settings(single())
        .with_stage_factory(StubFactory::panicking())
        .with_violation_observer(observer.clone())
        .start_session()
        .unwrap();
    session.advance();
    session.advance();
    wait_for_load(&mut session);
    assert_eq!(session.state(), CupState::Intermission);
    let violations = observer.violations_of_kind(ViolationKind::StageLoading);
    assert_eq!(violations.len(), 1);
    assert!(violations[0].message.contains("panicked"));
}

#[test]
fn restart_abandons_the_load_in_flight() {
    let (mut session, recorder) = local_session(single(), StubFactory::new());
    session.advance();
    session.advance();
    assert!(session.is_loading());
    session.restart();
    assert!(!session.is_loading());

    for _ in 0..10 {
        session.update(16);
    }
    assert_eq!(session.state(), CupState::Registration);
    assert_eq!(recorder.lock().count(MessageKind::Initialization), 0);
}

#[test]
fn published_description_covers_every_player() {
    let (mut session, recorder) = local_session(single(), StubFactory::new());
    session
        .register_client(RemoteClient::Local, players(2))
        .unwrap();
    session
        .register_client(RemoteClient::Local, players(1))
        .unwrap();
    session.advance();
    session.advance();
    wait_for_load(&mut session);

    let recorder = recorder.lock();
    let description = recorder
        .messages
        .iter()
        .find_map(|m| match m {
            Message::PreInitialization { description, .. } => Some(description.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(description.cars.len(), 3);
    assert_eq!(description.track.name, "quarry");
    assert_eq!(session.stage().unwrap().description(), &description);
}

#[test]
fn clean_load_reports_nothing() {
    let observer = Arc::new(CollectingObserver::new());
    let mut session = SessionBuilder::new()
        .with_settings(single())
        .with_stage_factory(StubFactory::new())
        .with_violation_observer(observer.clone())
        .start_session()
        .unwrap();
    session
        .register_client(RemoteClient::Local, players(2))
        .unwrap();
    session.advance();
    session.advance();
    wait_for_load(&mut session);
    session.handle_ready_signal(RemoteClient::Local);
    assert_eq!(session.state(), CupState::Action);
    pitlane::assert_no_violations!(observer);
}
