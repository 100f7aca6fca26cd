//! Registration through the session: capacity, slots and replies.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use parking_lot::Mutex;
use pitlane::{
    ClientId, CupError, CupSettings, CupState, CupSynchronizer, Message, MessageDistributor,
    ReceiverSlot, RegistrationStatus, RemoteClient, RemoteHandle, SessionBuilder,
    TrackDescription, MAX_CLIENT_COUNT,
};

use crate::common::stubs::{Delivery, DeliveryLog, LoggingReceiver, RecordingChannel, StubFactory};
use crate::common::{local_session, players, wait_for_load};

fn capped(max_players: usize) -> CupSettings {
    CupSettings {
        max_players,
        ..CupSettings::single_race(TrackDescription::new("oval", 2, 1))
    }
}

#[test]
fn exact_fill_then_too_many_players() {
    let (mut session, recorder) = local_session(capped(4), StubFactory::new());
    assert_eq!(
        session.register_client(RemoteClient::Local, players(3)),
        Ok(ClientId::new(0))
    );
    assert_eq!(
        session.register_client(RemoteClient::Local, players(1)),
        Ok(ClientId::new(1))
    );
    let err = session
        .register_client(RemoteClient::Local, players(1))
        .unwrap_err();
    assert_eq!(
        err,
        CupError::TooManyPlayers {
            requested: 1,
            available: 0
        }
    );
    assert_eq!(session.cup().player_count(), 4);
    assert_eq!(
        recorder.lock().messages.last(),
        Some(&Message::ServerFull {
            status: RegistrationStatus::TooManyPlayers
        })
    );
}

#[test]
fn slot_exhaustion_reports_too_many_clients() {
    let (mut session, _recorder) = local_session(capped(1), StubFactory::new());
    for _ in 0..MAX_CLIENT_COUNT {
        session
            .register_client(RemoteClient::Local, Vec::new())
            .unwrap();
    }
    assert_eq!(
        session.register_client(RemoteClient::Local, Vec::new()),
        Err(CupError::TooManyClients)
    );
    // Capacity is checked before slots.
    assert!(matches!(
        session.register_client(RemoteClient::Local, players(2)),
        Err(CupError::TooManyPlayers { .. })
    ));
}

#[test]
fn clients_end_shrinks_only_from_the_top() {
    let (mut session, _recorder) = local_session(capped(8), StubFactory::new());
    for _ in 0..4 {
        session
            .register_client(RemoteClient::Local, players(1))
            .unwrap();
    }
    assert_eq!(session.cup().clients_end(), 4);

    session.unregister_client(ClientId::new(1)).unwrap();
    assert_eq!(session.cup().clients_end(), 4);
    session.unregister_client(ClientId::new(2)).unwrap();
    assert_eq!(session.cup().clients_end(), 4);

    session.unregister_client(ClientId::new(3)).unwrap();
    assert_eq!(session.cup().clients_end(), 1);
    assert_eq!(session.cup().player_count(), 1);
}

#[test]
fn registration_closes_once_the_cup_starts() {
    let (mut session, recorder) = local_session(capped(8), StubFactory::new());
    session.advance();
    assert_eq!(
        session.register_client(RemoteClient::Local, players(1)),
        Err(CupError::RegistrationClosed {
            state: CupState::Intermission
        })
    );
    assert_eq!(
        recorder.lock().messages.last(),
        Some(&Message::ServerFull {
            status: RegistrationStatus::RegistrationClosed
        })
    );
}

#[test]
fn replies_go_to_the_requester_only() {
    let log: DeliveryLog = Arc::new(Mutex::new(Vec::new()));
    let mut distributor = MessageDistributor::new(RecordingChannel(Arc::clone(&log)));
    distributor
        .conveyor_mut()
        .attach(ReceiverSlot::Client, LoggingReceiver(Arc::clone(&log)));
    let mut session = SessionBuilder::new()
        .with_settings(capped(1))
        .with_sink(distributor)
        .with_seed(1)
        .start_session()
        .unwrap();

    let alice = RemoteClient::Remote(RemoteHandle::new(10));
    let bob = RemoteClient::Remote(RemoteHandle::new(11));
    session.register_client(alice, players(1)).unwrap();
    session.register_client(bob, players(1)).unwrap_err();

    assert_eq!(
        *log.lock(),
        vec![
            Delivery::Remote(alice, pitlane::MessageKind::RegistrationSuccess),
            Delivery::Remote(bob, pitlane::MessageKind::ServerFull),
        ]
    );
}

#[test]
fn unregistering_the_last_straggler_begins_the_stage() {
    let (mut session, _recorder) = local_session(capped(8), StubFactory::new());
    let ready = RemoteClient::Remote(RemoteHandle::new(1));
    let straggler = RemoteClient::Remote(RemoteHandle::new(2));
    session.register_client(ready, players(1)).unwrap();
    let late = session.register_client(straggler, players(1)).unwrap();

    session.advance();
    session.advance();
    wait_for_load(&mut session);
    session.handle_ready_signal(ready);
    assert_eq!(session.state(), CupState::Initialization);

    session.receive(
        straggler,
        Message::UnregisterClient { client_id: late },
    );
    assert_eq!(session.state(), CupState::Action);
    assert!(session.host().clients_of(straggler).is_empty());
}

#[test]
fn foreign_unregister_is_ignored() {
    let (mut session, _recorder) = local_session(capped(8), StubFactory::new());
    let a = RemoteClient::Remote(RemoteHandle::new(1));
    let b = RemoteClient::Remote(RemoteHandle::new(2));
    let a_id = session.register_client(a, players(1)).unwrap();
    session.register_client(b, players(1)).unwrap();

    session.receive(b, Message::UnregisterClient { client_id: a_id });
    assert_eq!(session.cup().player_count(), 2);
}

#[test]
fn client_mirror_learns_its_id() {
    let mirror = Arc::new(Mutex::new(CupSynchronizer::new()));
    let mut sink = pitlane::LocalSink::new();
    sink.conveyor_mut()
        .attach(ReceiverSlot::CupSynchronizer, Arc::clone(&mirror));
    let mut session = SessionBuilder::new()
        .with_settings(capped(4))
        .with_sink(sink)
        .with_seed(42)
        .start_session()
        .unwrap();

    let id = session
        .register_client(RemoteClient::Local, players(1))
        .unwrap();
    let (registered, _key) = mirror.lock().registration().unwrap();
    assert_eq!(registered, id);

    session.advance();
    session.advance();
    wait_for_load(&mut session);
    let ready = mirror.lock().ready_message().unwrap();
    session.receive(RemoteClient::Local, ready);
    assert_eq!(session.state(), CupState::Action);
    assert_eq!(mirror.lock().state(), CupState::Action);
}

#[test]
fn handle_with_two_clients_readies_both() {
    let (mut session, _recorder) = local_session(capped(8), StubFactory::new());
    let couch = RemoteClient::Remote(RemoteHandle::new(4));
    let first = session.register_client(couch, players(1)).unwrap();
    let second = session.register_client(couch, players(1)).unwrap();
    assert_eq!(session.host().clients_of(couch), vec![first, second]);

    session.advance();
    session.advance();
    wait_for_load(&mut session);
    session.handle_ready_signal(couch);
    assert_eq!(session.state(), CupState::Action);
}

#[test]
fn ready_naming_another_handles_client_is_dropped() {
    let (mut session, _recorder) = local_session(capped(8), StubFactory::new());
    let a = RemoteClient::Remote(RemoteHandle::new(1));
    let b = RemoteClient::Remote(RemoteHandle::new(2));
    let a_id = session.register_client(a, players(1)).unwrap();
    let b_id = session.register_client(b, players(1)).unwrap();
    session.advance();
    session.advance();
    wait_for_load(&mut session);

    session.receive(b, Message::Ready { client_id: a_id });
    session.receive(b, Message::Ready { client_id: b_id });
    assert_eq!(session.state(), CupState::Initialization);

    session.receive(a, Message::Ready { client_id: a_id });
    assert_eq!(session.state(), CupState::Action);
}
