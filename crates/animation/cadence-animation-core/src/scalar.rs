//! The scalar face: processors that drive one or more float lanes per slot.
//!
//! Readers are indexed by a run's base and a dimension count covering a
//! prefix of the run. Driver methods default to no-ops so generic client
//! code can probe several driving styles against any derivation; a
//! derivation implements at least one of `set_targets`,
//! `set_target_with_shape` or `set_splines` or its motivators never move.

use cadence_curves::{CompactSpline, CurveShape, SplinePlayback};

use crate::motivator::{SlotIndex, Ticks};
use crate::processor::Processor;
use crate::target::Target1f;

pub trait ScalarProcessor: Processor {
    /// Current values of the run's first `width` lanes, as one contiguous
    /// span the length of the run.
    fn values(&self, index: SlotIndex) -> &[f32];

    /// Current rate of change per tick, one entry per dimension.
    fn velocities(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]);

    /// Direction of travel. Distinct from velocity only for algorithms with
    /// a modular value space; everything else inherits this delegation.
    fn directions(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]) {
        self.velocities(index, dimensions, out);
    }

    /// Final scheduled value per dimension (current value when idle).
    fn target_values(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]);

    /// Velocity each dimension will carry on arrival.
    fn target_velocities(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]);

    /// `target_value - value` per dimension.
    fn differences(&self, index: SlotIndex, dimensions: usize, out: &mut [f32]);

    /// Ticks until the current schedule completes across the given
    /// dimensions; 0 when idle.
    fn target_time(&self, index: SlotIndex, dimensions: usize) -> Ticks;

    /// Playback position in spline-local time, for spline-driven slots.
    fn spline_time(&self, _index: SlotIndex) -> Ticks {
        0
    }

    /// The curve shape currently easing this slot.
    fn curve_shape(&self, _index: SlotIndex) -> CurveShape {
        CurveShape::default()
    }

    /// Drive each dimension through a waypoint schedule.
    fn set_targets(&mut self, _index: SlotIndex, _dimensions: usize, _targets: &[Target1f]) {}

    /// Drive each dimension toward a single target along `shape`.
    fn set_target_with_shape(
        &mut self,
        _index: SlotIndex,
        _dimensions: usize,
        _target_values: &[f32],
        _target_velocities: &[f32],
        _shape: &CurveShape,
    ) {
    }

    /// Drive each dimension by a precomputed spline.
    fn set_splines(
        &mut self,
        _index: SlotIndex,
        _dimensions: usize,
        _splines: &[CompactSpline],
        _playback: &SplinePlayback,
    ) {
    }

    /// The splines currently driving each dimension (`None` where the
    /// dimension is not spline-driven).
    fn splines<'a>(&'a self, _index: SlotIndex, out: &mut [Option<&'a CompactSpline>]) {
        out.fill(None);
    }

    /// Drive dimension `i` by `splines[i]` when present, by `targets[i]`
    /// otherwise.
    fn set_splines_and_targets(
        &mut self,
        _index: SlotIndex,
        _dimensions: usize,
        _splines: &[Option<&CompactSpline>],
        _playback: &SplinePlayback,
        _targets: &[Target1f],
    ) {
    }

    /// Jump the spline playhead.
    fn set_spline_time(&mut self, _index: SlotIndex, _dimensions: usize, _time: Ticks) {}

    /// Change the spline playback rate.
    fn set_spline_playback_rate(&mut self, _index: SlotIndex, _dimensions: usize, _rate: f32) {}

    // Single-value conveniences over the bulk readers. Prefer the bulk calls
    // inside loops.

    fn value(&self, index: SlotIndex) -> f32 {
        self.values(index)[0]
    }

    fn velocity(&self, index: SlotIndex) -> f32 {
        let mut v = [0.0];
        self.velocities(index, 1, &mut v);
        v[0]
    }

    fn direction(&self, index: SlotIndex) -> f32 {
        let mut v = [0.0];
        self.directions(index, 1, &mut v);
        v[0]
    }

    fn target_value(&self, index: SlotIndex) -> f32 {
        let mut v = [0.0];
        self.target_values(index, 1, &mut v);
        v[0]
    }

    fn target_velocity(&self, index: SlotIndex) -> f32 {
        let mut v = [0.0];
        self.target_velocities(index, 1, &mut v);
        v[0]
    }

    fn difference(&self, index: SlotIndex) -> f32 {
        let mut v = [0.0];
        self.differences(index, 1, &mut v);
        v[0]
    }
}
