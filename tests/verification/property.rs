//! Property-based tests for the cup roster and the race tracker.
//!
//! # Invariants Tested
//!
//! ## Cup Invariants
//! - Registered player count never exceeds `max_players`
//! - A rejected registration leaves the roster unchanged
//! - `clients_end` is one past the highest occupied slot
//!
//! ## RaceTracker Invariants
//! - Repeated or out-of-order crossings never change lap counts
//! - A car that drives every point in order completes exactly the configured laps
//! - The best lap is never slower than any completed lap

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use pitlane::telemetry::InvariantChecker;
use pitlane::{
    CarInstanceId, ClientId, ControlPointFlags, Cup, CupSettings, Message, PlayerDefinition,
    RaceTracker, TrackDescription,
};
use proptest::prelude::*;

// ============================================================================
// Property Test Strategies
// ============================================================================

#[derive(Debug, Clone)]
enum RosterOp {
    Register(usize),
    Unregister(u8),
}

fn roster_op_strategy() -> impl Strategy<Value = RosterOp> {
    prop_oneof![
        (0usize..5).prop_map(RosterOp::Register),
        (0u8..12).prop_map(RosterOp::Unregister),
    ]
}

fn players(n: usize) -> Vec<PlayerDefinition> {
    (0..n)
        .map(|i| PlayerDefinition::new(format!("p{i}"), i as u8))
        .collect()
}

// ============================================================================
// Cup Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_capacity_never_exceeded(
        max_players in 1usize..16,
        ops in prop::collection::vec(roster_op_strategy(), 1..60),
    ) {
        let mut cup = Cup::new(CupSettings {
            max_players,
            ..CupSettings::single_race(TrackDescription::new("oval", 2, 1))
        });
        for op in ops {
            match op {
                RosterOp::Register(n) => {
                    let before = (cup.player_count(), cup.clients_end(), cup.clients().len());
                    if cup.register_client(players(n)).is_err() {
                        prop_assert_eq!(
                            before,
                            (cup.player_count(), cup.clients_end(), cup.clients().len())
                        );
                    }
                },
                RosterOp::Unregister(id) => {
                    let _ = cup.unregister_client(ClientId::new(id));
                },
            }
            prop_assert!(cup.player_count() <= max_players);
            prop_assert!(cup.check_invariants().is_ok());
            let highest = cup.clients().iter().map(|c| c.id.as_usize() + 1).max().unwrap_or(0);
            prop_assert_eq!(cup.clients_end(), highest);
        }
    }
}

// ============================================================================
// RaceTracker Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_in_order_driving_completes_every_lap(
        points in 1u16..8,
        laps in 1u32..5,
        gaps in prop::collection::vec(1u32..5_000, 40),
    ) {
        let car = CarInstanceId::new(0);
        let mut tracker = RaceTracker::new(points, laps, [car]);
        let mut out = Vec::new();
        let mut time = 0;
        let total = usize::from(points) * laps as usize;
        for i in 0..total {
            time += gaps[i % gaps.len()];
            let point = (i % usize::from(points)) as u16 + 1;
            prop_assert!(tracker.control_point_hit(car, point, ControlPointFlags::NONE, time, &mut out));
        }

        let tracked = tracker.car(car).unwrap();
        prop_assert_eq!(tracked.laps(), laps);
        prop_assert!(tracked.is_finished());

        let lap_times: Vec<u32> = out.iter().filter_map(|m| match m {
            Message::LapComplete { time, .. } => Some(*time),
            _ => None,
        }).collect();
        prop_assert_eq!(lap_times.len(), laps as usize);
        prop_assert_eq!(tracked.best_lap_time(), lap_times.iter().copied().min());
        prop_assert!(tracker.check_invariants().is_ok());
    }

    #[test]
    fn prop_out_of_order_hits_are_ignored(
        points in 2u16..8,
        noise in prop::collection::vec((1u16..8, 0u32..10_000), 0..50),
    ) {
        let car = CarInstanceId::new(0);
        let mut tracker = RaceTracker::new(points, 3, [car]);
        let mut out = Vec::new();
        // Drive to point 2 so the expected point is not 1.
        tracker.control_point_hit(car, 1, ControlPointFlags::NONE, 10, &mut out);
        for (point, offset) in noise {
            if point == 2 {
                continue;
            }
            prop_assert!(!tracker.control_point_hit(car, point, ControlPointFlags::NONE, offset, &mut out));
        }
        let tracked = tracker.car(car).unwrap();
        prop_assert_eq!(tracked.current_control_point(), 2);
        prop_assert_eq!(tracked.laps(), 0);
        prop_assert_eq!(out.len(), 1);
    }
}
