//! Cadence Animation Core (engine-agnostic)
//!
//! A pool-per-algorithm animation runtime. External code holds lightweight
//! [`Motivator`] handles; each handle binds to a run of slots inside a
//! processor that owns dense per-slot state for every motivator using that
//! algorithm. An [`Engine`] advances all processors once per frame in
//! ascending priority order, so processors that sample other processors
//! always read fresh values.
//!
//! The substrate (index allocation, back-pointer fixup, defragmentation,
//! the polymorphic processor faces) lives in this crate together with the
//! standard processors: linear, ease, spline, matrix and rig.

pub mod engine;
pub mod index_allocator;
pub mod matrix;
pub mod motivator;
pub mod processor;
pub mod processors;
pub mod rig;
pub mod scalar;
pub mod target;

// Re-exports for consumers (hosts and fixtures)
pub use engine::{Engine, EngineError, FramePeers, ProcessorFactory};
pub use index_allocator::{AllocatorEvents, IndexAllocator, IndexRange};
pub use matrix::{MatrixOp, MatrixOpArray, MatrixOpKind, MatrixProcessor, OpDrive};
pub use motivator::{Motivator, MotivatorId, MotivatorInit, ProcessorType, SlotIndex, Ticks};
pub use processor::{Processor, ProcessorBase, ProcessorState};
pub use processors::ease::{EaseInit, EaseProcessor};
pub use processors::linear::{LinearInit, LinearProcessor};
pub use processors::matrix::{MatrixInit, MatrixOpProcessor};
pub use processors::rig::{RigAnimProcessor, RigInit};
pub use processors::spline::{SplineInit, SplineProcessor};
pub use rig::{Bone, BoneIndex, RigAnim, RigProcessor};
pub use scalar::ScalarProcessor;
pub use target::{Target1f, Waypoint};
pub use cadence_curves::{CompactSpline, CurveShape, SplinePlayback};
