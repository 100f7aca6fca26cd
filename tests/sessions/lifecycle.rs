//! The cup lifecycle driven through [`CupSession`](pitlane::CupSession).

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use pitlane::{
    ClientId, CupSettings, CupState, Message, MessageKind, RemoteClient, StageId,
    TrackDescription,
};

use crate::common::stubs::StubFactory;
use crate::common::{local_session, players, wait_for_load};

fn two_stage_cup() -> CupSettings {
    CupSettings {
        tracks: vec![
            TrackDescription::new("harbor loop", 3, 2),
            TrackDescription::new("canyon run", 5, 1),
        ],
        ..CupSettings::default()
    }
}

#[test]
fn registration_to_action_takes_two_advances_a_load_and_every_ready() {
    let (mut session, recorder) = local_session(two_stage_cup(), StubFactory::new());
    session
        .register_client(RemoteClient::Local, players(1))
        .unwrap();

    session.advance();
    assert_eq!(session.state(), CupState::Intermission);
    session.advance();
    assert_eq!(session.state(), CupState::PreInitialization);
    assert!(session.is_loading());

    wait_for_load(&mut session);
    assert_eq!(session.state(), CupState::Initialization);
    assert!(session.stage().is_some());

    session.handle_ready_signal(RemoteClient::Local);
    assert_eq!(session.state(), CupState::Action);

    assert_eq!(
        recorder.lock().kinds(),
        vec![
            MessageKind::RegistrationSuccess,
            MessageKind::Intermission,
            MessageKind::PreInitialization,
            MessageKind::Initialization,
            MessageKind::StageBegin,
        ]
    );
}

#[test]
fn advance_while_loading_is_a_no_op() {
    let (mut session, recorder) = local_session(two_stage_cup(), StubFactory::new());
    session.advance();
    session.advance();
    let before = recorder.lock().messages.len();
    session.advance();
    assert_eq!(recorder.lock().messages.len(), before);
    wait_for_load(&mut session);
}

#[test]
fn cup_runs_to_end_and_restarts() {
    let (mut session, recorder) = local_session(two_stage_cup(), StubFactory::new());
    session.advance();
    for stage in 0..2 {
        assert_eq!(session.state(), CupState::Intermission);
        session.advance();
        wait_for_load(&mut session);
        // Nobody brought players, so the barrier is met on initialization.
        assert_eq!(session.state(), CupState::Action);
        assert_eq!(session.cup().current_stage(), StageId::new(stage));
        session.advance();
        assert!(session.stage().is_none());
    }
    assert_eq!(session.state(), CupState::End);

    session.advance();
    assert_eq!(session.state(), CupState::Registration);
    assert_eq!(session.cup().current_stage(), StageId::new(0));

    let recorder = recorder.lock();
    assert_eq!(recorder.count(MessageKind::StageEnd), 2);
    assert_eq!(recorder.count(MessageKind::CupEnd), 1);
    assert_eq!(recorder.messages.last(), Some(&Message::Restart));
}

#[test]
fn ready_during_action_changes_nothing() {
    let (mut session, recorder) = local_session(two_stage_cup(), StubFactory::new());
    session
        .register_client(RemoteClient::Local, players(2))
        .unwrap();
    session.advance();
    session.advance();
    wait_for_load(&mut session);
    session.handle_ready_signal(RemoteClient::Local);
    assert_eq!(session.state(), CupState::Action);

    let before = recorder.lock().messages.len();
    let readiness = session.readiness().clone();
    session.handle_ready_signal(RemoteClient::Local);
    session.receive(
        RemoteClient::Local,
        Message::Ready {
            client_id: ClientId::new(0),
        },
    );
    assert_eq!(session.state(), CupState::Action);
    assert_eq!(recorder.lock().messages.len(), before);
    assert_eq!(session.readiness(), &readiness);
}

#[test]
fn inbound_commands_drive_the_session() {
    let (mut session, _recorder) = local_session(two_stage_cup(), StubFactory::new());
    session.receive(
        RemoteClient::Local,
        Message::RegisterClient {
            players: players(1),
        },
    );
    assert_eq!(session.cup().player_count(), 1);

    session.receive(RemoteClient::Local, Message::Advance);
    assert_eq!(session.state(), CupState::Intermission);

    // Lifecycle messages are never accepted from clients.
    session.receive(RemoteClient::Local, Message::CupEnd);
    assert_eq!(session.state(), CupState::Intermission);
}

#[test]
fn restart_from_initialization_drops_the_stage() {
    let (mut session, _recorder) = local_session(two_stage_cup(), StubFactory::new());
    session
        .register_client(RemoteClient::Local, players(1))
        .unwrap();
    session.advance();
    session.advance();
    wait_for_load(&mut session);
    assert_eq!(session.state(), CupState::Initialization);

    session.restart();
    assert_eq!(session.state(), CupState::Registration);
    assert!(session.stage().is_none());
    assert_eq!(session.cup().player_count(), 1);
}

#[test]
fn empty_cup_ends_on_first_advance() {
    let (mut session, recorder) = local_session(CupSettings::default(), StubFactory::new());
    session.advance();
    assert_eq!(session.state(), CupState::End);
    assert_eq!(recorder.lock().kinds(), vec![MessageKind::CupEnd]);
}
