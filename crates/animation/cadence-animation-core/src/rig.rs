//! The rig face: processors that drive articulated skeletons.
//!
//! A rig animation is a bone hierarchy (parent table, parents strictly
//! before children) with one matrix-operation sequence per bone. A rig
//! processor evaluates every bone's local transform, accumulates
//! root-to-bone globals, and exposes them as one dense span per slot.

use std::sync::Arc;

use nalgebra::Matrix4;

use cadence_curves::SplinePlayback;

use crate::matrix::MatrixOpArray;
use crate::motivator::{SlotIndex, Ticks};
use crate::processor::Processor;

pub type BoneIndex = usize;

/// One bone: display name, parent (none for roots), and the operation
/// sequence animating its local transform.
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub parent: Option<BoneIndex>,
    pub ops: MatrixOpArray,
}

/// A skeleton schema plus its per-bone animations. Shared between every
/// slot playing it, so processors hold it by `Arc`.
#[derive(Clone, Debug, Default)]
pub struct RigAnim {
    name: String,
    bones: Vec<Bone>,
    /// Animation length in ticks.
    end_time: Ticks,
    pub repeat: bool,
}

impl RigAnim {
    pub fn new(name: impl Into<String>, end_time: Ticks) -> Self {
        Self {
            name: name.into(),
            bones: Vec::new(),
            end_time,
            repeat: false,
        }
    }

    /// Append a bone. Parents must be appended before their children so
    /// that a single forward pass accumulates globals.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<BoneIndex>,
        ops: MatrixOpArray,
    ) -> BoneIndex {
        let index = self.bones.len();
        debug_assert!(
            parent.map_or(true, |p| p < index),
            "bone parents must precede children"
        );
        self.bones.push(Bone {
            name: name.into(),
            parent,
            ops,
        });
        index
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn num_bones(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, index: BoneIndex) -> &Bone {
        &self.bones[index]
    }

    #[inline]
    pub fn end_time(&self) -> Ticks {
        self.end_time
    }
}

pub trait RigProcessor: Processor {
    /// Root-to-bone transforms, one per bone of the defining animation, in
    /// bone order. Empty for a slot with no animation.
    fn global_transforms(&self, index: SlotIndex) -> &[Matrix4<f32>];

    /// Ticks until the current animation ends (to the end of the current
    /// pass when looping).
    fn time_remaining(&self, index: SlotIndex) -> Ticks;

    /// The animation whose skeleton defines this slot.
    fn defining_anim(&self, index: SlotIndex) -> &Arc<RigAnim>;

    /// Cross-fade into `anim` over the playback's blend window.
    fn blend_to_anim(&mut self, index: SlotIndex, anim: &Arc<RigAnim>, playback: &SplinePlayback);

    /// Instantly change the playback speed.
    fn set_playback_rate(&mut self, index: SlotIndex, rate: f32);

    /// Column headers for a CSV dump of this slot's bone-op values. May be
    /// empty.
    fn csv_header_for_debugging(&self, _index: SlotIndex) -> String {
        String::new()
    }

    /// One CSV row of current bone-op values. May be empty.
    fn csv_values_for_debugging(&self, _index: SlotIndex) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// it should hand out bone indices in append order
    #[test]
    fn bone_indices_in_order() {
        let mut anim = RigAnim::new("walk", 100);
        let root = anim.add_bone("root", None, MatrixOpArray::new());
        let spine = anim.add_bone("spine", Some(root), MatrixOpArray::new());
        let head = anim.add_bone("head", Some(spine), MatrixOpArray::new());
        assert_eq!((root, spine, head), (0, 1, 2));
        assert_eq!(anim.num_bones(), 3);
        assert_eq!(anim.bone(1).parent, Some(0));
        assert_eq!(anim.end_time(), 100);
    }
}
