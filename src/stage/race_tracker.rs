//! Lap and sector bookkeeping from control-point crossings.
//!
//! Control points are numbered `1..=N`. A car must cross them in order: a crossing of
//! any other point (a repeat, a skip, driving backwards) is ignored. Crossing the
//! finish line, or point `N`, completes a lap.
//!
//! Hit times are `race_time + frame_offset`: the race clock at the start of the world
//! step plus the offset the world reports within the step.

use std::collections::BTreeMap;

use tracing::trace;

use crate::messages::{ControlPointFlags, Message};
use crate::telemetry::{InvariantChecker, InvariantViolation};
use crate::{CarInstanceId, Millis};

/// Per-car lap state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCar {
    laps: u32,
    best_lap: u32,
    current_control_point: u16,
    current_sector: u16,
    last_lap_start: Millis,
    last_lap_time: Option<Millis>,
    best_lap_time: Option<Millis>,
    last_sector_time: Millis,
    best_sector_times: Vec<Millis>,
    current_sector_times: Vec<Millis>,
    finished: bool,
}

impl TrackedCar {
    fn new(control_points: u16) -> Self {
        let capacity = usize::from(control_points);
        Self {
            laps: 0,
            best_lap: 0,
            current_control_point: 1,
            current_sector: 0,
            last_lap_start: 0,
            last_lap_time: None,
            best_lap_time: None,
            last_sector_time: 0,
            best_sector_times: Vec::with_capacity(capacity),
            current_sector_times: Vec::with_capacity(capacity),
            finished: false,
        }
    }

    /// Laps completed.
    #[must_use]
    pub fn laps(&self) -> u32 {
        self.laps
    }

    /// Number of the best lap, from 1. Zero before the first lap.
    #[must_use]
    pub fn best_lap(&self) -> u32 {
        self.best_lap
    }

    /// The control point this car must cross next.
    #[must_use]
    pub fn current_control_point(&self) -> u16 {
        self.current_control_point
    }

    /// Zero-based sector the car is driving in.
    #[must_use]
    pub fn current_sector(&self) -> u16 {
        self.current_sector
    }

    /// Time of the last completed lap.
    #[must_use]
    pub fn last_lap_time(&self) -> Option<Millis> {
        self.last_lap_time
    }

    /// Time of the best lap.
    #[must_use]
    pub fn best_lap_time(&self) -> Option<Millis> {
        self.best_lap_time
    }

    /// Sector times of the best lap.
    #[must_use]
    pub fn best_sector_times(&self) -> &[Millis] {
        &self.best_sector_times
    }

    /// Sector times of the lap in progress.
    #[must_use]
    pub fn current_sector_times(&self) -> &[Millis] {
        &self.current_sector_times
    }

    /// Returns `true` once the car has driven every lap.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Tracks every car of one stage.
#[derive(Debug, Clone)]
pub struct RaceTracker {
    cars: BTreeMap<CarInstanceId, TrackedCar>,
    control_points: u16,
    laps: u32,
    race_time: Millis,
    finishers: u16,
}

impl RaceTracker {
    /// Creates a tracker for `cars` on a course of `control_points` points raced over
    /// `laps` laps.
    pub fn new(
        control_points: u16,
        laps: u32,
        cars: impl IntoIterator<Item = CarInstanceId>,
    ) -> Self {
        Self {
            cars: cars
                .into_iter()
                .map(|id| (id, TrackedCar::new(control_points)))
                .collect(),
            control_points,
            laps,
            race_time: 0,
            finishers: 0,
        }
    }

    /// Current race time.
    #[must_use]
    pub fn race_time(&self) -> Millis {
        self.race_time
    }

    /// Returns a tracked car.
    #[must_use]
    pub fn car(&self, id: CarInstanceId) -> Option<&TrackedCar> {
        self.cars.get(&id)
    }

    /// Iterates every tracked car in instance order.
    pub fn cars(&self) -> impl Iterator<Item = (CarInstanceId, &TrackedCar)> + '_ {
        self.cars.iter().map(|(id, car)| (*id, car))
    }

    /// Returns `true` once every car has finished.
    #[must_use]
    pub fn all_finished(&self) -> bool {
        self.cars.values().all(TrackedCar::is_finished)
    }

    /// Moves the race clock and emits `RaceTimeUpdate`.
    pub fn advance_race_time(&mut self, elapsed: Millis, out: &mut Vec<Message>) {
        self.race_time = self.race_time.saturating_add(elapsed);
        out.push(Message::RaceTimeUpdate {
            race_time: self.race_time,
        });
    }

    /// Records a control-point crossing. Returns `true` if it counted.
    pub fn control_point_hit(
        &mut self,
        entity: CarInstanceId,
        point: u16,
        flags: ControlPointFlags,
        frame_offset: Millis,
        out: &mut Vec<Message>,
    ) -> bool {
        let hit_time = self.race_time.saturating_add(frame_offset);
        let Some(car) = self.cars.get_mut(&entity) else {
            trace!(car = %entity, point, "hit by untracked car ignored");
            return false;
        };
        if car.finished || point != car.current_control_point {
            trace!(
                car = %entity,
                point,
                expected = car.current_control_point,
                "out-of-order control point ignored"
            );
            return false;
        }

        let sector_time = hit_time.saturating_sub(car.last_sector_time);
        car.current_sector_times.push(sector_time);
        car.last_sector_time = hit_time;
        out.push(Message::SectorComplete {
            car: entity,
            sector: car.current_sector,
            time: sector_time,
        });

        let completes_lap = flags.is_finish_line() || point == self.control_points;
        if point >= self.control_points {
            car.current_control_point = 1;
        } else {
            car.current_control_point = point + 1;
        }
        car.current_sector = car.current_control_point - 1;

        if completes_lap {
            let lap_time = hit_time.saturating_sub(car.last_lap_start);
            car.laps += 1;
            let personal_best = car.best_lap_time.map_or(true, |best| lap_time < best);
            if personal_best {
                car.best_lap_time = Some(lap_time);
                car.best_lap = car.laps;
                car.best_sector_times.clone_from(&car.current_sector_times);
            }
            car.current_sector_times.clear();
            car.last_lap_time = Some(lap_time);
            car.last_lap_start = hit_time;
            out.push(Message::LapComplete {
                car: entity,
                lap: car.laps,
                time: lap_time,
                personal_best,
            });

            if car.laps >= self.laps {
                car.finished = true;
                self.finishers = self.finishers.saturating_add(1);
                out.push(Message::CarFinished {
                    car: entity,
                    race_time: hit_time,
                    position: self.finishers,
                });
            }
        }
        crate::debug_check_invariants!(self, "after control_point_hit");
        true
    }
}

impl InvariantChecker for RaceTracker {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (id, car) in &self.cars {
            if car.current_control_point == 0 || car.current_control_point > self.control_points {
                return Err(InvariantViolation::new(
                    "RaceTracker",
                    "current control point outside 1..=N",
                )
                .with_details(format!(
                    "car={}, point={}, N={}",
                    id, car.current_control_point, self.control_points
                )));
            }
            if car.current_sector_times.len() > usize::from(self.control_points) {
                return Err(InvariantViolation::new(
                    "RaceTracker",
                    "more sector times than control points",
                )
                .with_details(format!("car={}", id)));
            }
            if car.finished != (car.laps >= self.laps) {
                return Err(InvariantViolation::new(
                    "RaceTracker",
                    "finished flag disagrees with lap count",
                )
                .with_details(format!("car={}, laps={}/{}", id, car.laps, self.laps)));
            }
        }
        let finished = self.cars.values().filter(|c| c.finished).count();
        if finished != usize::from(self.finishers) {
            return Err(InvariantViolation::new("RaceTracker", "finisher count out of sync")
                .with_details(format!("counted={}, tracked={}", finished, self.finishers)));
        }
        Ok(())
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

    const CAR: CarInstanceId = CarInstanceId::new(0);

    fn tracker(points: u16, laps: u32) -> RaceTracker {
        RaceTracker::new(points, laps, [CAR])
    }

    fn lap_messages(out: &[Message]) -> Vec<(u32, Millis, bool)> {
        out.iter()
            .filter_map(|m| match m {
                Message::LapComplete {
                    lap,
                    time,
                    personal_best,
                    ..
                } => Some((*lap, *time, *personal_best)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn two_laps_on_three_points() {
        let mut tracker = tracker(3, 2);
        let mut out = Vec::new();
        let hits = [(1, 1000), (2, 2000), (3, 3200), (1, 4100), (2, 5300), (3, 6000)];
        for (point, time) in hits {
            assert!(tracker.control_point_hit(CAR, point, ControlPointFlags::NONE, time, &mut out));
        }

        let car = tracker.car(CAR).unwrap();
        assert_eq!(car.laps(), 2);
        assert_eq!(car.best_lap_time(), Some(2800));
        assert_eq!(car.best_lap(), 2);
        assert_eq!(car.best_sector_times(), &[900, 1200, 700]);
        assert!(car.is_finished());
        assert_eq!(lap_messages(&out), vec![(1, 3200, true), (2, 2800, true)]);
        assert!(out.contains(&Message::CarFinished {
            car: CAR,
            race_time: 6000,
            position: 1
        }));
    }

    #[test]
    fn duplicate_hit_counts_once() {
        let mut tracker = tracker(3, 2);
        let mut out = Vec::new();
        assert!(tracker.control_point_hit(CAR, 1, ControlPointFlags::NONE, 500, &mut out));
        assert!(!tracker.control_point_hit(CAR, 1, ControlPointFlags::NONE, 520, &mut out));
        assert_eq!(out.len(), 1);
        assert_eq!(tracker.car(CAR).unwrap().current_control_point(), 2);
    }

    #[test]
    fn skipped_point_is_ignored() {
        let mut tracker = tracker(4, 1);
        let mut out = Vec::new();
        assert!(!tracker.control_point_hit(CAR, 2, ControlPointFlags::NONE, 100, &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_car_is_ignored() {
        let mut tracker = tracker(2, 1);
        let mut out = Vec::new();
        assert!(!tracker.control_point_hit(
            CarInstanceId::new(9),
            1,
            ControlPointFlags::NONE,
            0,
            &mut out
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn slower_lap_keeps_best() {
        let mut tracker = tracker(1, 3);
        let mut out = Vec::new();
        for time in [1000, 2500, 3400] {
            tracker.control_point_hit(CAR, 1, ControlPointFlags::NONE, time, &mut out);
        }
        let car = tracker.car(CAR).unwrap();
        assert_eq!(car.best_lap_time(), Some(900));
        assert_eq!(car.best_lap(), 3);
        assert_eq!(
            lap_messages(&out),
            vec![(1, 1000, true), (2, 1500, false), (3, 900, true)]
        );
    }

    #[test]
    fn finished_car_ignores_further_hits() {
        let mut tracker = tracker(1, 1);
        let mut out = Vec::new();
        assert!(tracker.control_point_hit(CAR, 1, ControlPointFlags::NONE, 100, &mut out));
        assert!(!tracker.control_point_hit(CAR, 1, ControlPointFlags::NONE, 200, &mut out));
        assert!(tracker.all_finished());
    }

    #[test]
    fn finish_flag_completes_lap_early() {
        let mut tracker = tracker(3, 5);
        let mut out = Vec::new();
        tracker.control_point_hit(CAR, 1, ControlPointFlags::NONE, 100, &mut out);
        tracker.control_point_hit(CAR, 2, ControlPointFlags::FINISH_LINE, 300, &mut out);
        assert_eq!(tracker.car(CAR).unwrap().laps(), 1);
        assert_eq!(tracker.car(CAR).unwrap().current_control_point(), 3);
    }

    #[test]
    fn frame_offset_is_relative_to_race_time() {
        let mut tracker = tracker(2, 1);
        let mut out = Vec::new();
        tracker.advance_race_time(1000, &mut out);
        assert_eq!(out, vec![Message::RaceTimeUpdate { race_time: 1000 }]);
        out.clear();
        tracker.control_point_hit(CAR, 1, ControlPointFlags::NONE, 16, &mut out);
        assert_eq!(
            out,
            vec![Message::SectorComplete {
                car: CAR,
                sector: 0,
                time: 1016
            }]
        );
    }

    #[test]
    fn finishing_positions_follow_order() {
        let a = CarInstanceId::new(0);
        let b = CarInstanceId::new(1);
        let mut tracker = RaceTracker::new(1, 1, [a, b]);
        let mut out = Vec::new();
        tracker.control_point_hit(b, 1, ControlPointFlags::NONE, 900, &mut out);
        tracker.control_point_hit(a, 1, ControlPointFlags::NONE, 950, &mut out);
        let positions: Vec<_> = out
            .iter()
            .filter_map(|m| match m {
                Message::CarFinished { car, position, .. } => Some((*car, *position)),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![(b, 1), (a, 2)]);
        assert!(tracker.check_invariants().is_ok());
    }
}
