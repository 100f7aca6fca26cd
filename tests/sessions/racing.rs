//! World events turned into race results while a stage runs.

#![allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use parking_lot::Mutex;
use pitlane::{
    CarInstanceId, CollisionResult, Conveyor, ControlPointFlags, ControlsMask, CupSession,
    CupSettings, CupState, LocalSink, Message, MessageKind, RaceBoard, ReceiverSlot,
    RemoteClient, SessionBuilder, TrackDescription, WorldEvent,
};

use crate::common::stubs::{RecordingReceiver, StubFactory};
use crate::common::{players, wait_for_load};

const CAR: CarInstanceId = CarInstanceId::new(0);

struct Race {
    session: CupSession,
    factory: Arc<StubFactory>,
    recorder: Arc<Mutex<RecordingReceiver>>,
    board: Arc<Mutex<RaceBoard>>,
}

fn hit(point: u16, frame_offset: u32) -> WorldEvent {
    WorldEvent::ControlPointHit {
        entity: CAR,
        point,
        flags: ControlPointFlags::NONE,
        frame_offset,
    }
}

/// One client with one player on a 3-point, 2-lap track, already in Action.
fn race() -> Race {
    let factory = StubFactory::new();
    let recorder = RecordingReceiver::shared();
    let board = Arc::new(Mutex::new(RaceBoard::new()));
    let mut conveyor = Conveyor::new();
    conveyor.attach(ReceiverSlot::Client, Arc::clone(&recorder));
    conveyor.attach(ReceiverSlot::Stage, Arc::clone(&board));

    let mut session = SessionBuilder::new()
        .with_settings(CupSettings::single_race(TrackDescription::new("ring", 3, 2)))
        .with_sink(LocalSink::with_conveyor(conveyor))
        .with_stage_factory(factory.clone())
        .with_seed(5)
        .start_session()
        .unwrap();
    session
        .register_client(RemoteClient::Local, players(1))
        .unwrap();
    session.advance();
    session.advance();
    wait_for_load(&mut session);
    session.handle_ready_signal(RemoteClient::Local);
    assert_eq!(session.state(), CupState::Action);

    Race {
        session,
        factory,
        recorder,
        board,
    }
}

#[test]
fn two_laps_with_a_duplicate_hit() {
    let mut race = race();
    // Crossings at 1000, 2000, 3200, 4100, 5300, 6000 with one-second frames.
    race.factory.push_step(vec![]);
    race.factory.push_step(vec![hit(1, 0)]);
    race.factory.push_step(vec![hit(2, 0), hit(1, 10)]);
    race.factory.push_step(vec![hit(3, 200)]);
    race.factory.push_step(vec![hit(1, 100)]);
    race.factory.push_step(vec![hit(2, 300)]);
    race.factory.push_step(vec![hit(3, 0)]);
    for _ in 0..7 {
        race.session.update(1000);
    }

    let stage = race.session.stage().unwrap();
    let car = stage.tracker().car(CAR).unwrap();
    assert_eq!(car.laps(), 2);
    assert_eq!(car.best_lap_time(), Some(2800));
    assert!(car.is_finished());

    let recorder = race.recorder.lock();
    assert_eq!(recorder.count(MessageKind::LapComplete), 2);
    assert_eq!(recorder.count(MessageKind::SectorComplete), 6);
    assert_eq!(recorder.count(MessageKind::CarFinished), 1);
    assert_eq!(recorder.count(MessageKind::RaceTimeUpdate), 7);

    let board = race.board.lock();
    let standing = board.standing(CAR).unwrap();
    assert_eq!(standing.laps, 2);
    assert_eq!(standing.best_lap_time, Some(2800));
    assert_eq!(standing.position, Some(1));
    assert_eq!(standing.finish_time, Some(6000));
    assert_eq!(board.race_time(), 7000);
}

#[test]
fn collisions_are_published() {
    let mut race = race();
    race.factory.push_step(vec![
        WorldEvent::Collision {
            entity: CAR,
            result: CollisionResult { impulse: 12 },
        },
        WorldEvent::CarCollision {
            subject: CAR,
            object: CarInstanceId::new(4),
            result: CollisionResult { impulse: 3 },
        },
    ]);
    race.session.update(16);

    let recorder = race.recorder.lock();
    assert!(recorder.messages.contains(&Message::Collision {
        entity: CAR,
        result: CollisionResult { impulse: 12 }
    }));
    assert_eq!(recorder.count(MessageKind::CarCollision), 1);
    assert_eq!(race.board.lock().standing(CAR).unwrap().collisions, 2);
}

#[test]
fn control_updates_reach_the_world() {
    let mut race = race();
    assert!(race
        .session
        .handle_control_update(CAR, ControlsMask::ACCELERATE | ControlsMask::LEFT));
    assert!(!race
        .session
        .handle_control_update(CarInstanceId::new(9), ControlsMask::BRAKE));
    race.session.receive(
        RemoteClient::Local,
        Message::ControlUpdate {
            controllable: CAR,
            controls: ControlsMask::BRAKE,
        },
    );
    assert_eq!(
        *race.factory.controls.lock(),
        vec![
            (CAR, ControlsMask::ACCELERATE | ControlsMask::LEFT),
            (CAR, ControlsMask::BRAKE)
        ]
    );
}

#[test]
fn stage_ends_on_advance() {
    let mut race = race();
    race.session.update(16);
    race.session.advance();
    assert_eq!(race.session.state(), CupState::End);
    assert!(race.session.stage().is_none());
    assert!(!race
        .session
        .handle_control_update(CAR, ControlsMask::ACCELERATE));
    // A stopped stage is no longer stepped.
    race.session.update(16);
    assert_eq!(race.recorder.lock().count(MessageKind::RaceTimeUpdate), 1);
}
