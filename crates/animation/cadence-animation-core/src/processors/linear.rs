//! Linear processor: constant-slope travel through waypoint schedules.
//!
//! The simplest useful scalar algorithm. Each lane walks an ordered list of
//! waypoints, covering the remaining distance to the next waypoint at a
//! constant rate so it arrives exactly on time. Drives via `set_targets`.

use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, FramePeers};
use crate::motivator::{Motivator, MotivatorInit, ProcessorType, SlotIndex, Ticks};
use crate::processor::{Processor, ProcessorBase, ProcessorState};
use crate::scalar::ScalarProcessor;
use crate::target::{Target1f, Waypoint};

/// Init payload: every lane of the run starts at `start_value` and, when
/// `target_time > 0`, travels to `target_value` over that many ticks.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct LinearInit {
    pub start_value: f32,
    pub target_value: f32,
    pub target_time: Ticks,
}

impl LinearInit {
    pub fn new(start_value: f32, target_value: f32, target_time: Ticks) -> Self {
        Self {
            start_value,
            target_value,
            target_time,
        }
    }

    /// Hold `value` until a target arrives.
    pub fn at_rest(value: f32) -> Self {
        Self::new(value, value, 0)
    }
}

impl MotivatorInit for LinearInit {
    fn processor_type(&self) -> ProcessorType {
        LinearProcessor::TYPE
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Per-lane schedule state. Waypoint times are measured from the moment the
/// schedule was set; `elapsed` tracks progress through it.
#[derive(Clone, Debug, Default)]
struct Lane {
    waypoints: Vec<Waypoint>,
    elapsed: Ticks,
}

#[derive(Debug, Default)]
struct LinearData {
    values: Vec<f32>,
    lanes: Vec<Lane>,
}

impl ProcessorState for LinearData {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn set_len(&mut self, len: usize) {
        self.values.resize(len, 0.0);
        self.lanes.resize_with(len, Lane::default);
    }

    fn move_range(&mut self, source: SlotIndex, target: SlotIndex, width: usize) {
        for d in 0..width {
            self.values[target + d] = self.values[source + d];
            self.lanes[target + d] = self.lanes[source + d].clone();
        }
    }

    fn reset_range(&mut self, base: SlotIndex, width: usize) {
        for i in base..base + width {
            self.values[i] = 0.0;
            self.lanes[i] = Lane::default();
        }
    }
}

fn advance_lane(lane: &mut Lane, value: &mut f32, mut dt: Ticks) {
    while let Some(&wp) = lane.waypoints.first() {
        let remaining = wp.time - lane.elapsed;
        if remaining <= 0 {
            *value = wp.value;
            lane.waypoints.remove(0);
            continue;
        }
        if dt <= 0 {
            break;
        }
        if dt >= remaining {
            *value = wp.value;
            lane.elapsed = wp.time;
            dt -= remaining;
            lane.waypoints.remove(0);
        } else {
            *value += (wp.value - *value) * (dt as f32 / remaining as f32);
            lane.elapsed += dt;
            dt = 0;
        }
    }
    if lane.waypoints.is_empty() {
        lane.elapsed = 0;
    }
}

#[derive(Default)]
pub struct LinearProcessor {
    base: ProcessorBase,
    data: LinearData,
}

impl LinearProcessor {
    pub const TYPE: ProcessorType = ProcessorType("linear");

    fn lane_velocity(&self, i: SlotIndex) -> f32 {
        let lane = &self.data.lanes[i];
        match lane.waypoints.first() {
            Some(wp) => {
                let remaining = wp.time - lane.elapsed;
                if remaining > 0 {
                    (wp.value - self.data.values[i]) / remaining as f32
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }
}

impl Processor for LinearProcessor {
    fn processor_type(&self) -> ProcessorType {
        Self::TYPE
    }

    fn priority(&self) -> i32 {
        0
    }

    fn advance_frame(&mut self, delta_time: Ticks, _peers: &FramePeers<'_>) {
        self.base.defragment(&mut self.data);
        let LinearData { values, lanes } = &mut self.data;
        for range in self.base.live_ranges() {
            for i in range.base..range.end() {
                advance_lane(&mut lanes[i], &mut values[i], delta_time);
            }
        }
    }

    fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        dimensions: usize,
    ) -> Result<Motivator, EngineError> {
        let Some(init) = init.downcast_ref::<LinearInit>() else {
            return Err(EngineError::InitTypeMismatch {
                processor: Self::TYPE,
                init: init.processor_type(),
            });
        };
        let (id, base) = self.base.allocate(&mut self.data, dimensions);
        for i in base..base + dimensions {
            let lane = &mut self.data.lanes[i];
            lane.elapsed = 0;
            if init.target_time > 0 {
                self.data.values[i] = init.start_value;
                lane.waypoints = vec![Waypoint::new(init.target_value, 0.0, init.target_time)];
            } else {
                self.data.values[i] = init.target_value;
                lane.waypoints.clear();
            }
        }
        Ok(Motivator::bound(Self::TYPE, id))
    }

    fn remove_motivator(&mut self, index: SlotIndex) {
        self.base.remove(&mut self.data, index);
    }

    fn transfer_motivator(&mut self, index: SlotIndex, new_handle: &mut Motivator) {
        let incoming = new_handle.id_in(Self::TYPE);
        let id = self.base.transfer(&mut self.data, index, incoming);
        *new_handle = Motivator::bound(Self::TYPE, id);
    }

    fn valid_motivator(&self, index: SlotIndex, handle: &Motivator) -> bool {
        self.base.valid_motivator(index, handle.id_in(Self::TYPE))
    }

    fn dimensions(&self, index: SlotIndex) -> usize {
        self.base.dimensions(index)
    }

    fn index_for(&self, handle: &Motivator) -> Option<SlotIndex> {
        self.base.index_for(handle.id_in(Self::TYPE)?)
    }

    fn verify_internal_state(&self) {
        self.base.verify_internal_state(&self.data);
    }

    fn as_scalar(&self) -> Option<&dyn ScalarProcessor> {
        Some(self)
    }

    fn as_scalar_mut(&mut self) -> Option<&mut dyn ScalarProcessor> {
        Some(self)
    }
}

impl ScalarProcessor for LinearProcessor {
    fn values(&self, index: SlotIndex) -> &[f32] {
        &self.data.values[index..index + self.base.dimensions(index)]
    }

    fn velocities(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        for d in 0..dimensions {
            out[d] = self.lane_velocity(index + d);
        }
    }

    fn target_values(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        for d in 0..dimensions {
            let lane = &self.data.lanes[index + d];
            out[d] = lane
                .waypoints
                .last()
                .map_or(self.data.values[index + d], |wp| wp.value);
        }
    }

    fn target_velocities(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        for d in 0..dimensions {
            out[d] = self.data.lanes[index + d]
                .waypoints
                .last()
                .map_or(0.0, |wp| wp.velocity);
        }
    }

    fn differences(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        self.target_values(index, dimensions, out);
        for d in 0..dimensions {
            out[d] -= self.data.values[index + d];
        }
    }

    fn target_time(&self, index: SlotIndex, dimensions: usize) -> Ticks {
        let mut latest = 0;
        for d in 0..dimensions {
            let lane = &self.data.lanes[index + d];
            if let Some(wp) = lane.waypoints.last() {
                latest = latest.max(wp.time - lane.elapsed);
            }
        }
        latest
    }

    fn set_targets(&mut self, index: SlotIndex, dimensions: usize, targets: &[Target1f]) {
        debug_assert!(dimensions <= self.base.dimensions(index));
        for d in 0..dimensions.min(targets.len()) {
            let i = index + d;
            let lane = &mut self.data.lanes[i];
            lane.waypoints = targets[d].waypoints().to_vec();
            lane.elapsed = 0;
            // Apply waypoints scheduled at or before "now" immediately.
            while lane.waypoints.first().is_some_and(|wp| wp.time <= 0) {
                self.data.values[i] = lane.waypoints.remove(0).value;
            }
        }
    }

    fn set_splines_and_targets(
        &mut self,
        index: SlotIndex,
        dimensions: usize,
        splines: &[Option<&cadence_curves::CompactSpline>],
        _playback: &cadence_curves::SplinePlayback,
        targets: &[Target1f],
    ) {
        // Splines are not this algorithm's drive; target-driven dimensions
        // still take effect.
        debug_assert!(dimensions <= self.base.dimensions(index));
        for d in 0..dimensions.min(targets.len()) {
            if splines.get(d).copied().flatten().is_some() {
                continue;
            }
            let i = index + d;
            let lane = &mut self.data.lanes[i];
            lane.waypoints = targets[d].waypoints().to_vec();
            lane.elapsed = 0;
            while lane.waypoints.first().is_some_and(|wp| wp.time <= 0) {
                self.data.values[i] = lane.waypoints.remove(0).value;
            }
        }
    }
}
