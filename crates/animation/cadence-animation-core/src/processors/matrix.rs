//! Matrix processor: one 4x4 transform per slot, composed from driven ops.
//!
//! Every slot owns an ordered operation list. Per frame each op samples its
//! drive (constant, spline playhead, or a nested scalar motivator read from
//! already-advanced peers), optionally cross-faded during a blend, and the
//! op matrices are multiplied in order into the slot's transform.
//!
//! Priority sits above the scalar processors so nested motivators are
//! always sampled fresh.

use nalgebra::Matrix4;

use cadence_curves::SplinePlayback;

use crate::engine::{EngineError, FramePeers};
use crate::matrix::{ChildIndex, MatrixOp, MatrixOpArray, MatrixProcessor, OpDrive};
use crate::motivator::{Motivator, MotivatorInit, ProcessorType, SlotIndex, Ticks};
use crate::processor::{Processor, ProcessorBase, ProcessorState};
use crate::processors::lerp;
use crate::target::Target1f;

/// Init payload: the operation sequence composing this slot's transform.
#[derive(Clone, Debug, Default)]
pub struct MatrixInit {
    pub ops: MatrixOpArray,
}

impl MatrixInit {
    pub fn new(ops: MatrixOpArray) -> Self {
        Self { ops }
    }
}

impl MotivatorInit for MatrixInit {
    fn processor_type(&self) -> ProcessorType {
        MatrixOpProcessor::TYPE
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Linear ramp applied to a constant-driven op by `set_child_target_1f`.
#[derive(Clone, Copy, Debug)]
struct Ramp {
    target: f32,
    remaining: f32,
}

#[derive(Clone, Debug)]
struct OpState {
    op: MatrixOp,
    value: f32,
    /// Spline playhead, for spline drives.
    x: f32,
    /// Value captured when a blend started.
    blend_from: f32,
    ramp: Option<Ramp>,
}

impl OpState {
    fn new(op: &MatrixOp) -> Self {
        let (value, x) = match &op.drive {
            OpDrive::Constant(c) => (*c, 0.0),
            OpDrive::Spline(spline, playback) => {
                (spline.evaluate(playback.start_x), playback.start_x)
            }
            OpDrive::Motivator(_) => (op.kind.identity_value(), 0.0),
        };
        Self {
            op: op.clone(),
            value,
            x,
            blend_from: value,
            ramp: None,
        }
    }
}

#[derive(Clone, Debug)]
struct Slot {
    ops: Vec<OpState>,
    value: Matrix4<f32>,
    playback_rate: f32,
    blend_remaining: f32,
    blend_total: f32,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            value: Matrix4::identity(),
            playback_rate: 1.0,
            blend_remaining: 0.0,
            blend_total: 0.0,
        }
    }
}

impl Slot {
    fn blend_weight(&self) -> Option<f32> {
        (self.blend_remaining > 0.0).then(|| 1.0 - self.blend_remaining / self.blend_total)
    }

    fn compose(&mut self) {
        let mut m = Matrix4::identity();
        for op in &self.ops {
            m *= op.op.kind.to_matrix(op.value);
        }
        self.value = m;
    }

    fn advance(&mut self, dt: f32, peers: &FramePeers<'_>) {
        let dts = dt * self.playback_rate;
        self.blend_remaining = (self.blend_remaining - dts).max(0.0);
        let weight = self.blend_weight();
        for op in &mut self.ops {
            let sampled = match &mut op.op.drive {
                OpDrive::Constant(c) => {
                    if let Some(mut ramp) = op.ramp.take() {
                        if ramp.remaining <= dts {
                            *c = ramp.target;
                        } else {
                            *c += (ramp.target - *c) * (dts / ramp.remaining);
                            ramp.remaining -= dts;
                            op.ramp = Some(ramp);
                        }
                    }
                    *c
                }
                OpDrive::Spline(spline, playback) => {
                    op.x += dts * playback.playback_rate;
                    let (start, end) = (spline.start_x(), spline.end_x());
                    if playback.repeat && end > start {
                        if op.x >= end {
                            op.x = start + (op.x - start) % (end - start);
                        }
                    } else if op.x > end {
                        op.x = end;
                    }
                    spline.evaluate(op.x)
                }
                // Hold the previous sample if the peer is not visible this
                // frame (wrong priority ordering or a removed child).
                OpDrive::Motivator(handle) => peers.value_1f(handle).unwrap_or(op.value),
            };
            op.value = match weight {
                Some(w) => lerp(op.blend_from, sampled, w),
                None => sampled,
            };
        }
        self.compose();
    }
}

#[derive(Debug, Default)]
struct MatrixData {
    slots: Vec<Slot>,
}

impl ProcessorState for MatrixData {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn set_len(&mut self, len: usize) {
        self.slots.resize_with(len, Slot::default);
    }

    fn move_range(&mut self, source: SlotIndex, target: SlotIndex, width: usize) {
        for d in 0..width {
            self.slots[target + d] = self.slots[source + d].clone();
        }
    }

    fn reset_range(&mut self, base: SlotIndex, width: usize) {
        for i in base..base + width {
            self.slots[i] = Slot::default();
        }
    }
}

#[derive(Default)]
pub struct MatrixOpProcessor {
    base: ProcessorBase,
    data: MatrixData,
}

impl MatrixOpProcessor {
    pub const TYPE: ProcessorType = ProcessorType("matrix");
}

impl Processor for MatrixOpProcessor {
    fn processor_type(&self) -> ProcessorType {
        Self::TYPE
    }

    fn priority(&self) -> i32 {
        1
    }

    fn advance_frame(&mut self, delta_time: Ticks, peers: &FramePeers<'_>) {
        self.base.defragment(&mut self.data);
        let slots = &mut self.data.slots;
        for range in self.base.live_ranges() {
            for i in range.base..range.end() {
                slots[i].advance(delta_time as f32, peers);
            }
        }
    }

    fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        dimensions: usize,
    ) -> Result<Motivator, EngineError> {
        let Some(init) = init.downcast_ref::<MatrixInit>() else {
            return Err(EngineError::InitTypeMismatch {
                processor: Self::TYPE,
                init: init.processor_type(),
            });
        };
        debug_assert_eq!(dimensions, 1, "matrix motivators occupy one slot");
        let (id, base) = self.base.allocate(&mut self.data, dimensions);
        let slot = &mut self.data.slots[base];
        *slot = Slot {
            ops: init.ops.ops().iter().map(OpState::new).collect(),
            ..Slot::default()
        };
        slot.compose();
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

    fn as_matrix(&self) -> Option<&dyn MatrixProcessor> {
        Some(self)
    }

    fn as_matrix_mut(&mut self) -> Option<&mut dyn MatrixProcessor> {
        Some(self)
    }
}

impl MatrixProcessor for MatrixOpProcessor {
    fn value(&self, index: SlotIndex) -> &Matrix4<f32> {
        &self.data.slots[index].value
    }

    fn num_children(&self, index: SlotIndex) -> usize {
        self.data.slots[index].ops.len()
    }

    fn child_values(
        &self,
        index: SlotIndex,
        child_start: ChildIndex,
        count: usize,
        out: &mut [f32],
    ) {
        let ops = &self.data.slots[index].ops;
        for c in 0..count {
            out[c] = ops[child_start + c].value;
        }
    }

    fn child_motivator_1f(&self, index: SlotIndex, child: ChildIndex) -> Option<&Motivator> {
        match &self.data.slots[index].ops.get(child)?.op.drive {
            OpDrive::Motivator(handle) => Some(handle),
            _ => None,
        }
    }

    fn set_child_values(&mut self, index: SlotIndex, child_start: ChildIndex, values: &[f32]) {
        let slot = &mut self.data.slots[index];
        for (c, &v) in values.iter().enumerate() {
            let op = &mut slot.ops[child_start + c];
            op.op.drive = OpDrive::Constant(v);
            op.value = v;
            op.ramp = None;
        }
        slot.compose();
    }

    fn set_child_target_1f(&mut self, index: SlotIndex, child: ChildIndex, target: &Target1f) {
        let slot = &mut self.data.slots[index];
        let op = &mut slot.ops[child];
        // Motivator-driven children are retargeted through their own scalar
        // handle; spline children keep their curve.
        if let OpDrive::Constant(c) = &mut op.op.drive {
            match target.final_waypoint() {
                Some(wp) if wp.time > 0 => {
                    op.ramp = Some(Ramp {
                        target: wp.value,
                        remaining: wp.time as f32,
                    });
                }
                Some(wp) => {
                    *c = wp.value;
                    op.value = wp.value;
                    op.ramp = None;
                    slot.compose();
                }
                None => {}
            }
        }
    }

    fn blend_to_ops(&mut self, index: SlotIndex, ops: &MatrixOpArray, playback: &SplinePlayback) {
        let slot = &mut self.data.slots[index];
        let previous = std::mem::take(&mut slot.ops);
        slot.ops = ops
            .ops()
            .iter()
            .map(|op| {
                let mut state = OpState::new(op);
                // Continue from the value of the first matching op of the
                // outgoing composition, when there is one.
                if let Some(prev) = previous.iter().find(|p| p.op.kind == op.kind) {
                    state.blend_from = prev.value;
                    state.value = prev.value;
                }
                state
            })
            .collect();
        slot.blend_total = playback.blend_x.max(0.0);
        slot.blend_remaining = slot.blend_total;
        slot.compose();
    }

    fn set_playback_rate(&mut self, index: SlotIndex, rate: f32) {
        self.data.slots[index].playback_rate = rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixOpKind;

    fn translate_ops(x: f32, y: f32) -> MatrixOpArray {
        let mut ops = MatrixOpArray::new();
        ops.push(MatrixOp::constant(MatrixOpKind::TranslateX, x));
        ops.push(MatrixOp::constant(MatrixOpKind::TranslateY, y));
        ops
    }

    fn init_one(ops: MatrixOpArray) -> (MatrixOpProcessor, SlotIndex) {
        let mut p = MatrixOpProcessor::default();
        let m = p.initialize_motivator(&MatrixInit::new(ops), 1).unwrap();
        let index = p.index_for(&m).unwrap();
        (p, index)
    }

    /// it should compose constant ops into the expected translation
    #[test]
    fn composes_constants() {
        let (p, i) = init_one(translate_ops(2.0, -1.0));
        let v = p.value(i);
        assert!((v[(0, 3)] - 2.0).abs() < 1e-6);
        assert!((v[(1, 3)] + 1.0).abs() < 1e-6);
        assert_eq!(p.num_children(i), 2);
        let mut out = [0.0; 2];
        p.child_values(i, 0, 2, &mut out);
        assert_eq!(out, [2.0, -1.0]);
    }

    /// it should recompose immediately when children are pinned
    #[test]
    fn set_child_values_recomposes() {
        let (mut p, i) = init_one(translate_ops(0.0, 0.0));
        p.set_child_values(i, 0, &[5.0]);
        assert!((p.value(i)[(0, 3)] - 5.0).abs() < 1e-6);
    }

    /// it should ramp a constant child toward its target over time
    #[test]
    fn child_target_ramps() {
        let (mut p, i) = init_one(translate_ops(0.0, 0.0));
        p.set_child_target_1f(i, 0, &Target1f::to_value(10.0, 10));
        for _ in 0..5 {
            p.advance_frame(1, &FramePeers::none());
        }
        let x = p.value(i)[(0, 3)];
        assert!((x - 5.0).abs() < 1e-3, "x={x}");
    }

    /// it should cross-fade matched ops during blend_to_ops
    #[test]
    fn blend_to_ops_crossfades() {
        let (mut p, i) = init_one(translate_ops(0.0, 0.0));
        let playback = SplinePlayback {
            blend_x: 10.0,
            ..SplinePlayback::default()
        };
        p.blend_to_ops(i, &translate_ops(10.0, 0.0), &playback);
        // Before any advance the outgoing pose holds.
        assert!(p.value(i)[(0, 3)].abs() < 1e-6);
        p.advance_frame(5, &FramePeers::none());
        let x = p.value(i)[(0, 3)];
        assert!(x > 2.0 && x < 8.0, "mid-blend x={x}");
        p.advance_frame(10, &FramePeers::none());
        assert!((p.value(i)[(0, 3)] - 10.0).abs() < 1e-4);
    }

    /// it should report the nested motivator only for motivator drives
    #[test]
    fn child_motivator_exposure() {
        let mut ops = translate_ops(1.0, 2.0);
        ops.push(MatrixOp::motivator(
            MatrixOpKind::RotateAboutZ,
            Motivator::default(),
        ));
        let (p, i) = init_one(ops);
        assert!(p.child_motivator_1f(i, 0).is_none());
        assert!(p.child_motivator_1f(i, 2).is_some());
    }
}
