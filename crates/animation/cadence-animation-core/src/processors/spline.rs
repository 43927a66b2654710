//! Spline processor: lanes driven by compact-spline playback.
//!
//! Each lane owns a spline and a playhead. Advancing moves the playhead at
//! the lane's playback rate, wrapping when the playback repeats; values and
//! velocities are sampled straight off the curve. Retargeting with a blend
//! window cross-fades from the previous value instead of snapping.
//!
//! This algorithm deliberately has no waypoint drive: `set_targets` falls
//! through to the face's no-op default.

use serde::{Deserialize, Serialize};

use cadence_curves::{CompactSpline, SplinePlayback};

use crate::engine::{EngineError, FramePeers};
use crate::motivator::{Motivator, MotivatorInit, ProcessorType, SlotIndex, Ticks};
use crate::processor::{Processor, ProcessorBase, ProcessorState};
use crate::processors::lerp;
use crate::scalar::ScalarProcessor;
use crate::target::Target1f;

/// Init payload: lanes start idle (no spline, value 0) and are driven
/// afterwards with `set_splines`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplineInit;

impl MotivatorInit for SplineInit {
    fn processor_type(&self) -> ProcessorType {
        SplineProcessor::TYPE
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Cross-fade from a captured value, measured in playhead travel.
#[derive(Clone, Copy, Debug)]
struct Blend {
    from_value: f32,
    remaining: f32,
    total: f32,
}

#[derive(Clone, Debug, Default)]
struct Lane {
    spline: Option<CompactSpline>,
    x: f32,
    rate: f32,
    repeat: bool,
    blend: Option<Blend>,
}

#[derive(Debug, Default)]
struct SplineData {
    values: Vec<f32>,
    lanes: Vec<Lane>,
}

impl ProcessorState for SplineData {
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

fn advance_lane(lane: &mut Lane, value: &mut f32, dt: f32) {
    let Some(spline) = &lane.spline else {
        return;
    };
    let dx = dt * lane.rate;
    lane.x += dx;
    let (start, end) = (spline.start_x(), spline.end_x());
    if lane.repeat && end > start {
        if lane.x >= end {
            lane.x = start + (lane.x - start) % (end - start);
        }
    } else if lane.x > end {
        lane.x = end;
    }
    let sampled = spline.evaluate(lane.x);
    let mut out = sampled;
    if let Some(mut blend) = lane.blend.take() {
        blend.remaining -= dx.abs();
        if blend.remaining > 0.0 {
            let w = 1.0 - blend.remaining / blend.total;
            out = lerp(blend.from_value, sampled, w);
            lane.blend = Some(blend);
        }
    }
    *value = out;
}

#[derive(Default)]
pub struct SplineProcessor {
    base: ProcessorBase,
    data: SplineData,
}

impl SplineProcessor {
    pub const TYPE: ProcessorType = ProcessorType("spline");

    fn apply_spline(&mut self, i: SlotIndex, spline: &CompactSpline, playback: &SplinePlayback) {
        let current = self.data.values[i];
        let lane = &mut self.data.lanes[i];
        lane.x = playback.start_x;
        lane.rate = playback.playback_rate;
        lane.repeat = playback.repeat;
        lane.blend = (playback.blend_x > 0.0).then_some(Blend {
            from_value: current,
            remaining: playback.blend_x,
            total: playback.blend_x,
        });
        lane.spline = Some(spline.clone());
        if lane.blend.is_none() {
            self.data.values[i] = spline.evaluate(playback.start_x);
        }
    }
}

impl Processor for SplineProcessor {
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
        let SplineData { values, lanes } = &mut self.data;
        for range in self.base.live_ranges() {
            for i in range.base..range.end() {
                advance_lane(&mut lanes[i], &mut values[i], delta_time as f32);
            }
        }
    }

    fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        dimensions: usize,
    ) -> Result<Motivator, EngineError> {
        if init.downcast_ref::<SplineInit>().is_none() {
            return Err(EngineError::InitTypeMismatch {
                processor: Self::TYPE,
                init: init.processor_type(),
            });
        };
        let (id, base) = self.base.allocate(&mut self.data, dimensions);
        self.data.reset_range(base, dimensions);
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

impl ScalarProcessor for SplineProcessor {
    fn values(&self, index: SlotIndex) -> &[f32] {
        &self.data.values[index..index + self.base.dimensions(index)]
    }

    fn velocities(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        for d in 0..dimensions {
            let lane = &self.data.lanes[index + d];
            out[d] = lane
                .spline
                .as_ref()
                .map_or(0.0, |s| s.derivative(lane.x) * lane.rate);
        }
    }

    fn target_values(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        for d in 0..dimensions {
            let lane = &self.data.lanes[index + d];
            out[d] = lane
                .spline
                .as_ref()
                .map_or(self.data.values[index + d], |s| s.end_y());
        }
    }

    fn target_velocities(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        out[..dimensions].fill(0.0);
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
            if let Some(spline) = &lane.spline {
                if lane.rate > 0.0 && !lane.repeat {
                    latest = latest.max((spline.end_x() - lane.x) / lane.rate);
                }
            }
        }
        latest.ceil() as Ticks
    }

    fn spline_time(&self, index: SlotIndex) -> Ticks {
        self.data.lanes[index].x.round() as Ticks
    }

    fn set_splines(
        &mut self,
        index: SlotIndex,
        dimensions: usize,
        splines: &[CompactSpline],
        playback: &SplinePlayback,
    ) {
        debug_assert!(dimensions <= self.base.dimensions(index));
        for d in 0..dimensions.min(splines.len()) {
            self.apply_spline(index + d, &splines[d], playback);
        }
    }

    fn splines<'a>(&'a self, index: SlotIndex, out: &mut [Option<&'a CompactSpline>]) {
        for (d, slot) in out.iter_mut().enumerate() {
            *slot = self.data.lanes[index + d].spline.as_ref();
        }
    }

    fn set_splines_and_targets(
        &mut self,
        index: SlotIndex,
        dimensions: usize,
        splines: &[Option<&CompactSpline>],
        playback: &SplinePlayback,
        _targets: &[Target1f],
    ) {
        // Target-driven dimensions are not this algorithm's drive; they keep
        // their current state.
        debug_assert!(dimensions <= self.base.dimensions(index));
        for d in 0..dimensions.min(splines.len()) {
            if let Some(spline) = splines[d] {
                self.apply_spline(index + d, spline, playback);
            }
        }
    }

    fn set_spline_time(&mut self, index: SlotIndex, dimensions: usize, time: Ticks) {
        debug_assert!(dimensions <= self.base.dimensions(index));
        for d in 0..dimensions {
            let i = index + d;
            let lane = &mut self.data.lanes[i];
            lane.x = time as f32;
            if let Some(spline) = &lane.spline {
                self.data.values[i] = spline.evaluate(lane.x);
            }
        }
    }

    fn set_spline_playback_rate(&mut self, index: SlotIndex, dimensions: usize, rate: f32) {
        debug_assert!(dimensions <= self.base.dimensions(index));
        for d in 0..dimensions {
            self.data.lanes[index + d].rate = rate;
        }
    }
}
