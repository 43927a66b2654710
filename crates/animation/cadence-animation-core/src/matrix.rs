//! The matrix face: processors that drive one 4x4 transform per slot.
//!
//! A transform is composed from an ordered sequence of operations
//! (translate-x, rotate-about-y, scale, ...), each driven by a constant, a
//! compact spline, or a nested scalar-1 motivator. The nested-motivator case
//! is the dependency edge between processors: a matrix processor samples the
//! scalar processor's output, which is why matrix processors carry a higher
//! priority than the scalars they observe.

use nalgebra::{Matrix4, Vector3};

use cadence_curves::{CompactSpline, SplinePlayback};

use crate::motivator::{Motivator, SlotIndex};
use crate::processor::Processor;
use crate::target::Target1f;

/// Index of one operation within a slot's composition.
pub type ChildIndex = usize;

/// The elementary transforms a composition can contain.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MatrixOpKind {
    TranslateX,
    TranslateY,
    TranslateZ,
    RotateAboutX,
    RotateAboutY,
    RotateAboutZ,
    ScaleX,
    ScaleY,
    ScaleZ,
    ScaleUniformly,
}

impl MatrixOpKind {
    /// The matrix for this operation at scalar value `v` (radians for
    /// rotations).
    pub fn to_matrix(self, v: f32) -> Matrix4<f32> {
        match self {
            MatrixOpKind::TranslateX => Matrix4::new_translation(&Vector3::new(v, 0.0, 0.0)),
            MatrixOpKind::TranslateY => Matrix4::new_translation(&Vector3::new(0.0, v, 0.0)),
            MatrixOpKind::TranslateZ => Matrix4::new_translation(&Vector3::new(0.0, 0.0, v)),
            MatrixOpKind::RotateAboutX => Matrix4::from_euler_angles(v, 0.0, 0.0),
            MatrixOpKind::RotateAboutY => Matrix4::from_euler_angles(0.0, v, 0.0),
            MatrixOpKind::RotateAboutZ => Matrix4::from_euler_angles(0.0, 0.0, v),
            MatrixOpKind::ScaleX => Matrix4::new_nonuniform_scaling(&Vector3::new(v, 1.0, 1.0)),
            MatrixOpKind::ScaleY => Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, v, 1.0)),
            MatrixOpKind::ScaleZ => Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, v)),
            MatrixOpKind::ScaleUniformly => Matrix4::new_scaling(v),
        }
    }

    /// The value at which this operation is the identity.
    pub fn identity_value(self) -> f32 {
        match self {
            MatrixOpKind::ScaleX
            | MatrixOpKind::ScaleY
            | MatrixOpKind::ScaleZ
            | MatrixOpKind::ScaleUniformly => 1.0,
            _ => 0.0,
        }
    }
}

/// What supplies an operation's scalar value.
#[derive(Clone, Debug)]
pub enum OpDrive {
    /// A fixed value (until `set_child_values` or a blend changes it).
    Constant(f32),
    /// A spline sampled with its own playback settings.
    Spline(CompactSpline, SplinePlayback),
    /// A nested scalar-1 motivator, sampled from already-advanced peers.
    Motivator(Motivator),
}

/// One operation of a composition.
#[derive(Clone, Debug)]
pub struct MatrixOp {
    pub kind: MatrixOpKind,
    pub drive: OpDrive,
}

impl MatrixOp {
    pub fn constant(kind: MatrixOpKind, value: f32) -> Self {
        Self {
            kind,
            drive: OpDrive::Constant(value),
        }
    }

    pub fn spline(kind: MatrixOpKind, spline: CompactSpline, playback: SplinePlayback) -> Self {
        Self {
            kind,
            drive: OpDrive::Spline(spline, playback),
        }
    }

    pub fn motivator(kind: MatrixOpKind, handle: Motivator) -> Self {
        Self {
            kind,
            drive: OpDrive::Motivator(handle),
        }
    }
}

/// Ordered operation sequence composing one 4x4 transform.
#[derive(Clone, Debug, Default)]
pub struct MatrixOpArray {
    ops: Vec<MatrixOp>,
}

impl MatrixOpArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: MatrixOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    #[inline]
    pub fn ops(&self) -> &[MatrixOp] {
        &self.ops
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

pub trait MatrixProcessor: Processor {
    /// The composed transform.
    fn value(&self, index: SlotIndex) -> &Matrix4<f32>;

    /// Number of operations in the slot's composition.
    fn num_children(&self, index: SlotIndex) -> usize;

    /// Current scalar values of operations `[child_start, child_start+count)`.
    fn child_values(&self, index: SlotIndex, child_start: ChildIndex, count: usize, out: &mut [f32]);

    /// The nested scalar motivator driving a child, when there is one.
    fn child_motivator_1f(&self, index: SlotIndex, child: ChildIndex) -> Option<&Motivator>;

    /// Pin children to constant values, starting at `child_start`.
    fn set_child_values(&mut self, index: SlotIndex, child_start: ChildIndex, values: &[f32]);

    /// Schedule one child toward a target.
    fn set_child_target_1f(&mut self, _index: SlotIndex, _child: ChildIndex, _target: &Target1f) {}

    /// Smoothly retarget the whole composition to a new operation sequence.
    fn blend_to_ops(&mut self, _index: SlotIndex, _ops: &MatrixOpArray, _playback: &SplinePlayback) {
    }

    /// Change how fast this slot's drives advance.
    fn set_playback_rate(&mut self, _index: SlotIndex, _rate: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    /// it should produce the identity at each op kind's identity value
    #[test]
    fn identity_values_compose_to_identity() {
        let kinds = [
            MatrixOpKind::TranslateX,
            MatrixOpKind::RotateAboutY,
            MatrixOpKind::ScaleZ,
            MatrixOpKind::ScaleUniformly,
        ];
        for kind in kinds {
            let m = kind.to_matrix(kind.identity_value());
            assert!(
                (m - Matrix4::identity()).abs().max() < 1e-6,
                "{kind:?} not identity"
            );
        }
    }

    /// it should translate then rotate in op order
    #[test]
    fn op_order_matters() {
        use std::f32::consts::FRAC_PI_2;
        let t = MatrixOpKind::TranslateX.to_matrix(1.0);
        let r = MatrixOpKind::RotateAboutZ.to_matrix(FRAC_PI_2);
        // Rotate-then-translate moves along the rotated axis.
        let p = (r * t).transform_point(&nalgebra::Point3::origin());
        assert!((p.y - 1.0).abs() < 1e-6 && p.x.abs() < 1e-6);
        // Translate-then-rotate does not.
        let q = (t * r).transform_point(&nalgebra::Point3::origin());
        assert!((q.x - 1.0).abs() < 1e-6 && q.y.abs() < 1e-6);
    }
}
