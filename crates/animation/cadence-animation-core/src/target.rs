//! Scalar target descriptors.
//!
//! A target is an ordered schedule of waypoints for one dimension: reach
//! `value` with `velocity` at `time` (measured from when the target is
//! set). Processors that honor `set_targets` walk the schedule in order.

use serde::{Deserialize, Serialize};

use crate::motivator::Ticks;

/// One scheduled state: be at `value`, moving at `velocity`, at `time`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Waypoint {
    pub value: f32,
    pub velocity: f32,
    pub time: Ticks,
}

impl Waypoint {
    pub fn new(value: f32, velocity: f32, time: Ticks) -> Self {
        Self {
            value,
            velocity,
            time,
        }
    }
}

/// Waypoint schedule for one scalar dimension. Times must be non-decreasing.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Target1f {
    waypoints: Vec<Waypoint>,
}

impl Target1f {
    /// Single waypoint: arrive at `value` (at rest) after `time`.
    pub fn to_value(value: f32, time: Ticks) -> Self {
        Self {
            waypoints: vec![Waypoint::new(value, 0.0, time)],
        }
    }

    /// Arrive at `value` carrying `velocity` after `time`.
    pub fn to_value_with_velocity(value: f32, velocity: f32, time: Ticks) -> Self {
        Self {
            waypoints: vec![Waypoint::new(value, velocity, time)],
        }
    }

    pub fn with_waypoints(waypoints: Vec<Waypoint>) -> Self {
        debug_assert!(
            waypoints.windows(2).all(|w| w[0].time <= w[1].time),
            "waypoint times must be non-decreasing"
        );
        Self { waypoints }
    }

    #[inline]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Time of the final waypoint; 0 for an empty schedule.
    pub fn end_time(&self) -> Ticks {
        self.waypoints.last().map_or(0, |w| w.time)
    }

    /// Final scheduled state, if any.
    pub fn final_waypoint(&self) -> Option<Waypoint> {
        self.waypoints.last().copied()
    }
}
