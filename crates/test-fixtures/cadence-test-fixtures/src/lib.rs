//! Shared fixtures for cadence integration suites.
//!
//! Everything here is built in code (the engine consumes already-decoded
//! descriptors, so there are no asset files to load): deterministic splines,
//! a small humanoid-ish rig, and ready-made op arrays.

use std::sync::Arc;

use cadence_animation_core::{MatrixOp, MatrixOpArray, MatrixOpKind, RigAnim};
use cadence_curves::compact_spline::ValueRange;
use cadence_curves::{CompactSpline, SplinePlayback};

/// A straight ramp: y goes `0 -> end_y` linearly over `x in [0, end_x]`.
pub fn ramp_spline(end_x: f32, end_y: f32) -> CompactSpline {
    let slope = if end_x > 0.0 { end_y / end_x } else { 0.0 };
    let mut s = CompactSpline::with_granularity(
        ValueRange::new(end_y.min(0.0), end_y.max(0.0)),
        CompactSpline::recommended_granularity(end_x),
    );
    s.add_node(0.0, 0.0, slope);
    s.add_node(end_x, end_y, slope);
    s
}

/// A smooth out-and-back bump: `0 -> peak -> 0` over `x in [0, end_x]`,
/// flat at both ends.
pub fn bump_spline(end_x: f32, peak: f32) -> CompactSpline {
    let mut s = CompactSpline::with_granularity(
        ValueRange::new(peak.min(0.0), peak.max(0.0)),
        CompactSpline::recommended_granularity(end_x),
    );
    s.add_node(0.0, 0.0, 0.0);
    s.add_node(end_x * 0.5, peak, 0.0);
    s.add_node(end_x, 0.0, 0.0);
    s
}

/// Op array translating by a constant offset.
pub fn translate_ops(x: f32, y: f32, z: f32) -> MatrixOpArray {
    let mut ops = MatrixOpArray::new();
    ops.push(MatrixOp::constant(MatrixOpKind::TranslateX, x));
    ops.push(MatrixOp::constant(MatrixOpKind::TranslateY, y));
    ops.push(MatrixOp::constant(MatrixOpKind::TranslateZ, z));
    ops
}

/// Op array rotating about Z, driven by a ramp spline over `duration`.
pub fn spin_ops(duration: f32, turns_radians: f32) -> MatrixOpArray {
    let mut ops = MatrixOpArray::new();
    ops.push(MatrixOp::spline(
        MatrixOpKind::RotateAboutZ,
        ramp_spline(duration, turns_radians),
        SplinePlayback::default(),
    ));
    ops
}

/// A three-bone chain (root -> arm -> hand), each bone one unit further
/// along X, with the arm's rotation animated by a ramp to `arm_radians`
/// over `duration` ticks.
pub fn three_bone_rig(duration: f32, arm_radians: f32) -> Arc<RigAnim> {
    let mut anim = RigAnim::new("three-bone", duration.ceil() as i32);
    let root = anim.add_bone("root", None, MatrixOpArray::new());
    let mut arm_ops = MatrixOpArray::new();
    arm_ops.push(MatrixOp::constant(MatrixOpKind::TranslateX, 1.0));
    arm_ops.push(MatrixOp::spline(
        MatrixOpKind::RotateAboutZ,
        ramp_spline(duration, arm_radians),
        SplinePlayback::default(),
    ));
    let arm = anim.add_bone("arm", Some(root), arm_ops);
    let mut hand_ops = MatrixOpArray::new();
    hand_ops.push(MatrixOp::constant(MatrixOpKind::TranslateX, 1.0));
    anim.add_bone("hand", Some(arm), hand_ops);
    Arc::new(anim)
}

/// A static single-bone rig holding a fixed translation.
pub fn pedestal_rig(height: f32) -> Arc<RigAnim> {
    let mut anim = RigAnim::new("pedestal", 1);
    let mut ops = MatrixOpArray::new();
    ops.push(MatrixOp::constant(MatrixOpKind::TranslateY, height));
    anim.add_bone("base", None, ops);
    Arc::new(anim)
}
