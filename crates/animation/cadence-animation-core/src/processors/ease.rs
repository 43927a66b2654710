//! Ease processor: quadratic ease-in-ease-out toward a single target.
//!
//! Each lane follows a two-segment quadratic trajectory built from the
//! current state and a curve shape. Drives via `set_target_with_shape`;
//! retargeting mid-flight starts the new trajectory from the current value
//! and velocity, so motion stays continuous.

use serde::{Deserialize, Serialize};

use cadence_curves::{CurveShape, QuadraticEase};

use crate::engine::{EngineError, FramePeers};
use crate::motivator::{Motivator, MotivatorInit, ProcessorType, SlotIndex, Ticks};
use crate::processor::{Processor, ProcessorBase, ProcessorState};
use crate::scalar::ScalarProcessor;

/// Init payload: lanes start at rest at `start_value` and ease with `shape`
/// once targeted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EaseInit {
    pub start_value: f32,
    pub shape: CurveShape,
}

impl EaseInit {
    pub fn new(start_value: f32, shape: CurveShape) -> Self {
        Self { start_value, shape }
    }
}

impl MotivatorInit for EaseInit {
    fn processor_type(&self) -> ProcessorType {
        EaseProcessor::TYPE
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Clone, Debug, Default)]
struct Lane {
    ease: QuadraticEase,
    /// Local time into the trajectory, in ticks.
    t: f32,
    shape: CurveShape,
    active: bool,
}

#[derive(Debug, Default)]
struct EaseData {
    values: Vec<f32>,
    lanes: Vec<Lane>,
}

impl ProcessorState for EaseData {
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

#[derive(Default)]
pub struct EaseProcessor {
    base: ProcessorBase,
    data: EaseData,
}

impl EaseProcessor {
    pub const TYPE: ProcessorType = ProcessorType("ease");
}

impl Processor for EaseProcessor {
    fn processor_type(&self) -> ProcessorType {
        Self::TYPE
    }

    fn priority(&self) -> i32 {
        0
    }

    fn advance_frame(&mut self, delta_time: Ticks, _peers: &FramePeers<'_>) {
        self.base.defragment(&mut self.data);
        if delta_time == 0 {
            return;
        }
        let EaseData { values, lanes } = &mut self.data;
        for range in self.base.live_ranges() {
            for i in range.base..range.end() {
                let lane = &mut lanes[i];
                if !lane.active {
                    continue;
                }
                lane.t += delta_time as f32;
                if lane.t >= lane.ease.total_time() {
                    values[i] = lane.ease.target_value();
                    lane.active = false;
                } else {
                    values[i] = lane.ease.evaluate(lane.t);
                }
            }
        }
    }

    fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        dimensions: usize,
    ) -> Result<Motivator, EngineError> {
        let Some(init) = init.downcast_ref::<EaseInit>() else {
            return Err(EngineError::InitTypeMismatch {
                processor: Self::TYPE,
                init: init.processor_type(),
            });
        };
        let (id, base) = self.base.allocate(&mut self.data, dimensions);
        for i in base..base + dimensions {
            self.data.values[i] = init.start_value;
            self.data.lanes[i] = Lane {
                shape: init.shape,
                ..Lane::default()
            };
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

impl ScalarProcessor for EaseProcessor {
    fn values(&self, index: SlotIndex) -> &[f32] {
        &self.data.values[index..index + self.base.dimensions(index)]
    }

    fn velocities(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        for d in 0..dimensions {
            let lane = &self.data.lanes[index + d];
            out[d] = if lane.active {
                lane.ease.velocity(lane.t)
            } else {
                0.0
            };
        }
    }

    fn target_values(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        for d in 0..dimensions {
            let lane = &self.data.lanes[index + d];
            out[d] = if lane.active {
                lane.ease.target_value()
            } else {
                self.data.values[index + d]
            };
        }
    }

    fn target_velocities(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        for d in 0..dimensions {
            let lane = &self.data.lanes[index + d];
            out[d] = if lane.active {
                lane.ease.target_velocity()
            } else {
                0.0
            };
        }
    }

    fn differences(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        self.target_values(index, dimensions, out);
        for d in 0..dimensions {
            out[d] -= self.data.values[index + d];
        }
    }

    fn target_time(&self, index: SlotIndex, dimensions: usize) -> Ticks {
        let mut latest = 0.0f32;
        for d in 0..dimensions {
            let lane = &self.data.lanes[index + d];
            if lane.active {
                latest = latest.max(lane.ease.total_time() - lane.t);
            }
        }
        latest.ceil() as Ticks
    }

    fn curve_shape(&self, index: SlotIndex) -> CurveShape {
        self.data.lanes[index].shape
    }

    fn set_target_with_shape(
        &mut self,
        index: SlotIndex,
        dimensions: usize,
        target_values: &[f32],
        target_velocities: &[f32],
        shape: &CurveShape,
    ) {
        debug_assert!(dimensions <= self.base.dimensions(index));
        for d in 0..dimensions.min(target_values.len()) {
            let i = index + d;
            let value = self.data.values[i];
            let lane = &mut self.data.lanes[i];
            let velocity = if lane.active {
                lane.ease.velocity(lane.t)
            } else {
                0.0
            };
            let target_velocity = target_velocities.get(d).copied().unwrap_or(0.0);
            lane.ease =
                QuadraticEase::between(value, velocity, target_values[d], target_velocity, shape);
            lane.t = 0.0;
            lane.shape = *shape;
            lane.active = lane.ease.total_time() > 0.0;
            if !lane.active {
                self.data.values[i] = target_values[d];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    fn shape(delta: f32, time: f32) -> CurveShape {
        CurveShape {
            typical_delta_value: delta,
            typical_total_time: time,
            bias: 0.5,
        }
    }

    /// it should ease to the target and settle there
    #[test]
    fn eases_to_target() {
        let mut p = EaseProcessor::default();
        let m = p
            .initialize_motivator(&EaseInit::new(0.0, shape(1.0, 8.0)), 1)
            .unwrap();
        let i = p.index_for(&m).unwrap();
        p.set_target_with_shape(i, 1, &[1.0], &[0.0], &shape(1.0, 8.0));
        assert_eq!(p.target_time(i, 1), 8);
        for _ in 0..20 {
            p.advance_frame(1, &FramePeers::none());
        }
        approx(p.value(i), 1.0, 1e-4);
        approx(p.velocity(i), 0.0, 1e-4);
        assert_eq!(p.target_time(i, 1), 0);
    }

    /// it should move slower near the ends than in the middle
    #[test]
    fn in_out_profile() {
        let mut p = EaseProcessor::default();
        let m = p
            .initialize_motivator(&EaseInit::new(0.0, shape(1.0, 10.0)), 1)
            .unwrap();
        let i = p.index_for(&m).unwrap();
        p.set_target_with_shape(i, 1, &[1.0], &[0.0], &shape(1.0, 10.0));
        p.advance_frame(1, &FramePeers::none());
        let early = p.velocity(i);
        for _ in 0..4 {
            p.advance_frame(1, &FramePeers::none());
        }
        let mid = p.velocity(i);
        assert!(mid > early, "mid={mid} early={early}");
    }

    /// it should report the shape it was driven with
    #[test]
    fn reports_shape() {
        let mut p = EaseProcessor::default();
        let m = p
            .initialize_motivator(&EaseInit::new(0.0, shape(2.0, 4.0)), 1)
            .unwrap();
        let i = p.index_for(&m).unwrap();
        let s = shape(3.0, 6.0);
        p.set_target_with_shape(i, 1, &[5.0], &[0.0], &s);
        assert_eq!(p.curve_shape(i), s);
    }
}
