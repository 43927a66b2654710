//! Rig processor: articulated skeletons driven by per-bone op sequences.
//!
//! Each slot plays one `RigAnim`. Per frame the slot's clock advances, every
//! bone's ops are sampled at that time, local transforms are composed, and
//! globals are accumulated root-to-bone (the parent table guarantees parents
//! precede children). Blending to a new animation captures the current
//! per-op pose and cross-fades from it.
//!
//! Priority sits above the matrix processors.

use std::sync::Arc;

use nalgebra::Matrix4;

use cadence_curves::SplinePlayback;

use crate::engine::{EngineError, FramePeers};
use crate::matrix::OpDrive;
use crate::motivator::{Motivator, MotivatorInit, ProcessorType, SlotIndex, Ticks};
use crate::processor::{Processor, ProcessorBase, ProcessorState};
use crate::processors::lerp;
use crate::rig::{RigAnim, RigProcessor};

/// Init payload: the animation (and skeleton schema) this slot plays.
#[derive(Clone, Debug)]
pub struct RigInit {
    pub anim: Arc<RigAnim>,
}

impl RigInit {
    pub fn new(anim: Arc<RigAnim>) -> Self {
        Self { anim }
    }
}

impl MotivatorInit for RigInit {
    fn processor_type(&self) -> ProcessorType {
        RigAnimProcessor::TYPE
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Clone, Debug)]
struct Slot {
    anim: Arc<RigAnim>,
    time: f32,
    playback_rate: f32,
    globals: Vec<Matrix4<f32>>,
    /// Current sampled value of every bone op, bone-major.
    op_values: Vec<Vec<f32>>,
    /// Pose captured when a blend started, same layout as `op_values`.
    blend_from: Vec<Vec<f32>>,
    blend_remaining: f32,
    blend_total: f32,
}

impl Default for Slot {
    /// An unoccupied slot: a boneless animation with nothing to evaluate.
    fn default() -> Self {
        Self {
            anim: Arc::default(),
            time: 0.0,
            playback_rate: 1.0,
            globals: Vec::new(),
            op_values: Vec::new(),
            blend_from: Vec::new(),
            blend_remaining: 0.0,
            blend_total: 0.0,
        }
    }
}

impl Slot {
    fn new(anim: &Arc<RigAnim>) -> Self {
        let op_values: Vec<Vec<f32>> = anim
            .bones()
            .iter()
            .map(|b| {
                b.ops
                    .ops()
                    .iter()
                    .map(|op| op.kind.identity_value())
                    .collect()
            })
            .collect();
        Self {
            anim: anim.clone(),
            time: 0.0,
            playback_rate: 1.0,
            globals: vec![Matrix4::identity(); anim.num_bones()],
            blend_from: op_values.clone(),
            op_values,
            blend_remaining: 0.0,
            blend_total: 0.0,
        }
    }

    fn advance_clock(&mut self, dt: f32) {
        self.time += dt * self.playback_rate;
        let end = self.anim.end_time() as f32;
        if self.anim.repeat && end > 0.0 {
            if self.time >= end {
                self.time %= end;
            }
        } else if self.time > end {
            self.time = end;
        }
        self.blend_remaining = (self.blend_remaining - dt).max(0.0);
    }

    /// Sample every bone op at the current time and rebuild globals.
    fn evaluate(&mut self, peers: &FramePeers<'_>) {
        let weight = (self.blend_remaining > 0.0)
            .then(|| 1.0 - self.blend_remaining / self.blend_total);
        for (b, bone) in self.anim.bones().iter().enumerate() {
            let mut local = Matrix4::identity();
            for (o, op) in bone.ops.ops().iter().enumerate() {
                let sampled = match &op.drive {
                    OpDrive::Constant(c) => *c,
                    OpDrive::Spline(spline, _) => spline.evaluate(self.time),
                    OpDrive::Motivator(handle) => {
                        peers.value_1f(handle).unwrap_or(self.op_values[b][o])
                    }
                };
                let v = match weight {
                    Some(w) => lerp(self.blend_from[b][o], sampled, w),
                    None => sampled,
                };
                self.op_values[b][o] = v;
                local *= op.kind.to_matrix(v);
            }
            self.globals[b] = match bone.parent {
                Some(p) => self.globals[p] * local,
                None => local,
            };
        }
    }
}

#[derive(Debug, Default)]
struct RigData {
    slots: Vec<Slot>,
}

impl ProcessorState for RigData {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn set_len(&mut self, len: usize) {
        self.slots.resize_with(len, Slot::default);
    }

    fn move_range(&mut self, source: SlotIndex, target: SlotIndex, width: usize) {
        for d in 0..width {
            self.slots[target + d] = std::mem::take(&mut self.slots[source + d]);
        }
    }

    fn reset_range(&mut self, base: SlotIndex, width: usize) {
        for i in base..base + width {
            self.slots[i] = Slot::default();
        }
    }
}

#[derive(Default)]
pub struct RigAnimProcessor {
    base: ProcessorBase,
    data: RigData,
}

impl RigAnimProcessor {
    pub const TYPE: ProcessorType = ProcessorType("rig");

    fn slot(&self, index: SlotIndex) -> &Slot {
        debug_assert!(
            self.base.dimensions(index) > 0,
            "rig operation on an unoccupied slot {index}"
        );
        &self.data.slots[index]
    }

    fn slot_mut(&mut self, index: SlotIndex) -> &mut Slot {
        debug_assert!(
            self.base.dimensions(index) > 0,
            "rig operation on an unoccupied slot {index}"
        );
        &mut self.data.slots[index]
    }
}

impl Processor for RigAnimProcessor {
    fn processor_type(&self) -> ProcessorType {
        Self::TYPE
    }

    fn priority(&self) -> i32 {
        2
    }

    fn advance_frame(&mut self, delta_time: Ticks, peers: &FramePeers<'_>) {
        self.base.defragment(&mut self.data);
        let slots = &mut self.data.slots;
        for range in self.base.live_ranges() {
            for i in range.base..range.end() {
                let slot = &mut slots[i];
                if slot.anim.num_bones() == 0 {
                    continue;
                }
                slot.advance_clock(delta_time as f32);
                slot.evaluate(peers);
            }
        }
    }

    fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        dimensions: usize,
    ) -> Result<Motivator, EngineError> {
        let Some(init) = init.downcast_ref::<RigInit>() else {
            return Err(EngineError::InitTypeMismatch {
                processor: Self::TYPE,
                init: init.processor_type(),
            });
        };
        debug_assert_eq!(dimensions, 1, "rig motivators occupy one slot");
        let (id, base) = self.base.allocate(&mut self.data, dimensions);
        let mut slot = Slot::new(&init.anim);
        // Expose a valid pose before the first frame.
        slot.evaluate(&FramePeers::none());
        self.data.slots[base] = slot;
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

    fn as_rig(&self) -> Option<&dyn RigProcessor> {
        Some(self)
    }

    fn as_rig_mut(&mut self) -> Option<&mut dyn RigProcessor> {
        Some(self)
    }
}

impl RigProcessor for RigAnimProcessor {
    fn global_transforms(&self, index: SlotIndex) -> &[Matrix4<f32>] {
        &self.data.slots[index].globals
    }

    fn time_remaining(&self, index: SlotIndex) -> Ticks {
        let slot = self.slot(index);
        ((slot.anim.end_time() as f32 - slot.time).max(0.0)).ceil() as Ticks
    }

    fn defining_anim(&self, index: SlotIndex) -> &Arc<RigAnim> {
        &self.slot(index).anim
    }

    fn blend_to_anim(&mut self, index: SlotIndex, anim: &Arc<RigAnim>, playback: &SplinePlayback) {
        let slot = self.slot_mut(index);
        let mut next = Slot::new(anim);
        next.playback_rate = slot.playback_rate;
        next.time = playback.start_x;
        next.evaluate(&FramePeers::none());
        // Capture the outgoing pose where bones and op kinds line up; other
        // ops start from the incoming animation directly.
        for (b, bone) in anim.bones().iter().enumerate() {
            for (o, op) in bone.ops.ops().iter().enumerate() {
                let matched = slot
                    .anim
                    .bones()
                    .get(b)
                    .and_then(|prev| prev.ops.ops().get(o))
                    .filter(|prev| prev.kind == op.kind)
                    .map(|_| slot.op_values[b][o]);
                if let Some(v) = matched {
                    next.blend_from[b][o] = v;
                } else {
                    next.blend_from[b][o] = next.op_values[b][o];
                }
            }
        }
        next.blend_total = playback.blend_x.max(0.0);
        next.blend_remaining = next.blend_total;
        if next.blend_remaining > 0.0 {
            // Hold the captured pose until the first advance.
            next.op_values = next.blend_from.clone();
            next.evaluate_from_values();
        }
        *slot = next;
    }

    fn set_playback_rate(&mut self, index: SlotIndex, rate: f32) {
        self.slot_mut(index).playback_rate = rate;
    }

    fn csv_header_for_debugging(&self, index: SlotIndex) -> String {
        let slot = self.slot(index);
        let mut columns = Vec::new();
        for bone in slot.anim.bones() {
            for op in bone.ops.ops() {
                columns.push(format!("{}.{:?}", bone.name, op.kind));
            }
        }
        columns.join(",")
    }

    fn csv_values_for_debugging(&self, index: SlotIndex) -> String {
        let slot = self.slot(index);
        let mut columns = Vec::new();
        for values in &slot.op_values {
            for v in values {
                columns.push(format!("{v:.4}"));
            }
        }
        columns.join(",")
    }
}

impl Slot {
    /// Rebuild globals from `op_values` without resampling drives.
    fn evaluate_from_values(&mut self) {
        for (b, bone) in self.anim.bones().iter().enumerate() {
            let mut local = Matrix4::identity();
            for (o, op) in bone.ops.ops().iter().enumerate() {
                local *= op.kind.to_matrix(self.op_values[b][o]);
            }
            self.globals[b] = match bone.parent {
                Some(p) => self.globals[p] * local,
                None => local,
            };
        }
    }
}
