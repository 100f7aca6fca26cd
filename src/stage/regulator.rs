//! Drives a loaded stage for one call at a time.

use tracing::trace;

use crate::messages::{ControlPointFlags, ControlsMask, Message};
use crate::routing::MessageSink;
use crate::stage::{Stage, WorldEvent};
use crate::{CarInstanceId, Millis, RemoteClient};

/// Borrows a [`Stage`] to step it, feed it control input and publish what it reports.
///
/// Every race message goes to [`RemoteClient::All`].
#[derive(Debug)]
pub struct StageRegulator<'a> {
    stage: &'a mut Stage,
    outbox: Vec<Message>,
}

impl<'a> StageRegulator<'a> {
    /// Borrows `stage`.
    pub fn new(stage: &'a mut Stage) -> Self {
        Self {
            stage,
            outbox: Vec::new(),
        }
    }

    /// Steps the world by `frame_duration`, then the clocks.
    ///
    /// Control-point hits are timed against the race clock at the start of the step.
    pub fn update(&mut self, frame_duration: Millis, sink: &mut dyn MessageSink) {
        let mut events = std::mem::take(&mut self.stage.events);
        self.stage.world.advance(frame_duration, &mut events);
        for event in events.drain(..) {
            self.route_event(event, sink);
        }
        self.stage.events = events;

        self.stage.clock = self.stage.clock.saturating_add(frame_duration);
        self.stage
            .tracker
            .advance_race_time(frame_duration, &mut self.outbox);
        self.flush(sink);
    }

    /// Writes control input to a car. Unknown controllables are dropped.
    pub fn handle_control_update(
        &mut self,
        controllable: CarInstanceId,
        controls: ControlsMask,
    ) -> bool {
        let applied = self.stage.world.set_controls(controllable, controls);
        if !applied {
            trace!(car = %controllable, "control update for unknown controllable dropped");
        }
        applied
    }

    /// Feeds one crossing to the race tracker and publishes the results.
    pub fn control_point_hit(
        &mut self,
        entity: CarInstanceId,
        point: u16,
        flags: ControlPointFlags,
        frame_offset: Millis,
        sink: &mut dyn MessageSink,
    ) -> bool {
        let counted =
            self.stage
                .tracker
                .control_point_hit(entity, point, flags, frame_offset, &mut self.outbox);
        self.flush(sink);
        counted
    }

    fn route_event(&mut self, event: WorldEvent, sink: &mut dyn MessageSink) {
        match event {
            WorldEvent::ControlPointHit {
                entity,
                point,
                flags,
                frame_offset,
            } => {
                self.control_point_hit(entity, point, flags, frame_offset, sink);
            },
            WorldEvent::Collision { entity, result } => {
                sink.send(Message::Collision { entity, result }, RemoteClient::All);
            },
            WorldEvent::CarCollision {
                subject,
                object,
                result,
            } => {
                sink.send(
                    Message::CarCollision {
                        subject,
                        object,
                        result,
                    },
                    RemoteClient::All,
                );
            },
        }
    }

    fn flush(&mut self, sink: &mut dyn MessageSink) {
        for message in self.outbox.drain(..) {
            sink.send(message, RemoteClient::All);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::cup::{CarDefinition, TrackDescription};
    use crate::messages::{CarInstance, CollisionResult, MessageKind, StageDescription};
    use crate::stage::World;
    use crate::{ClientId, StageId};

    struct ScriptedWorld {
        script: Vec<Vec<WorldEvent>>,
        controls: Vec<(CarInstanceId, ControlsMask)>,
    }

    impl World for ScriptedWorld {
        fn advance(&mut self, _frame_duration: Millis, events: &mut Vec<WorldEvent>) {
            if !self.script.is_empty() {
                events.extend(self.script.remove(0));
            }
        }

        fn set_controls(&mut self, controllable: CarInstanceId, controls: ControlsMask) -> bool {
            if controllable.as_u16() > 0 {
                return false;
            }
            self.controls.push((controllable, controls));
            true
        }
    }

    #[derive(Default)]
    struct Outbox(Vec<(Message, RemoteClient)>);

    impl MessageSink for Outbox {
        fn send(&mut self, message: Message, destination: RemoteClient) {
            self.0.push((message, destination));
        }
    }

    fn stage(script: Vec<Vec<WorldEvent>>) -> Stage {
        let description = StageDescription {
            stage_id: StageId::new(0),
            track: TrackDescription::new("oval", 2, 1),
            car_models: vec![CarDefinition::new("kart")],
            cars: vec![CarInstance {
                instance_id: CarInstanceId::new(0),
                model_id: 0,
                controller_id: ClientId::new(0),
                slot_id: 0,
                start_position: 0,
                color_scheme: 0,
            }],
        };
        Stage::new(
            Box::new(ScriptedWorld {
                script,
                controls: Vec::new(),
            }),
            description,
        )
    }

    #[test]
    fn update_publishes_world_events_then_time() {
        let car = CarInstanceId::new(0);
        let mut stage = stage(vec![vec![
            WorldEvent::ControlPointHit {
                entity: car,
                point: 1,
                flags: ControlPointFlags::NONE,
                frame_offset: 10,
            },
            WorldEvent::Collision {
                entity: car,
                result: CollisionResult { impulse: 4 },
            },
        ]]);
        let mut sink = Outbox::default();
        StageRegulator::new(&mut stage).update(16, &mut sink);

        let kinds: Vec<_> = sink.0.iter().map(|(m, _)| m.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::SectorComplete,
                MessageKind::Collision,
                MessageKind::RaceTimeUpdate
            ]
        );
        assert!(sink.0.iter().all(|(_, d)| *d == RemoteClient::All));
        assert_eq!(stage.clock(), 16);
        assert_eq!(stage.tracker().race_time(), 16);
    }

    #[test]
    fn control_updates_reach_known_cars_only() {
        let mut stage = stage(Vec::new());
        let mut regulator = StageRegulator::new(&mut stage);
        assert!(regulator.handle_control_update(CarInstanceId::new(0), ControlsMask::ACCELERATE));
        assert!(!regulator.handle_control_update(CarInstanceId::new(3), ControlsMask::BRAKE));
    }

    #[test]
    fn direct_hit_completes_race() {
        let mut stage = stage(Vec::new());
        let mut sink = Outbox::default();
        let car = CarInstanceId::new(0);
        let mut regulator = StageRegulator::new(&mut stage);
        assert!(regulator.control_point_hit(car, 1, ControlPointFlags::NONE, 400, &mut sink));
        assert!(regulator.control_point_hit(car, 2, ControlPointFlags::NONE, 900, &mut sink));
        assert!(sink
            .0
            .iter()
            .any(|(m, _)| m.kind() == MessageKind::CarFinished));
        assert!(stage.tracker().all_finished());
    }
}
