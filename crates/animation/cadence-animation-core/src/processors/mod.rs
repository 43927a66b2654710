//! Standard processors: the algorithms shipped with the engine.
//!
//! Each module is one pooled algorithm; all of them register through
//! [`register_standard`]. Hosts with custom algorithms register their own
//! factories next to (or instead of) these.

pub mod ease;
pub mod linear;
pub mod matrix;
pub mod rig;
pub mod spline;

use crate::engine::Engine;

use self::ease::EaseProcessor;
use self::linear::LinearProcessor;
use self::matrix::MatrixOpProcessor;
use self::rig::RigAnimProcessor;
use self::spline::SplineProcessor;

/// Register every standard processor type on `engine`.
pub fn register_standard(engine: &mut Engine) {
    engine.register_processor_type(LinearProcessor::TYPE, || {
        Box::new(LinearProcessor::default())
    });
    engine.register_processor_type(EaseProcessor::TYPE, || Box::new(EaseProcessor::default()));
    engine.register_processor_type(SplineProcessor::TYPE, || {
        Box::new(SplineProcessor::default())
    });
    engine.register_processor_type(MatrixOpProcessor::TYPE, || {
        Box::new(MatrixOpProcessor::default())
    });
    engine.register_processor_type(RigAnimProcessor::TYPE, || {
        Box::new(RigAnimProcessor::default())
    });
}

#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
