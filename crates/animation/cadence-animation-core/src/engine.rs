//! Engine: one processor per registered type tag, advanced in priority order.
//!
//! The engine owns a factory registry (populated explicitly at
//! construction; nothing registers through hidden statics) and lazily
//! instantiates a processor the first time a motivator of its tag is
//! initialized. Each frame, processors advance in ascending priority; a
//! processor only ever sees the processors that already advanced, so
//! cross-processor reads are fresh by construction.

use hashbrown::HashMap;
use log::{debug, warn};
use thiserror::Error;

use crate::motivator::{Motivator, MotivatorInit, ProcessorType, SlotIndex, Ticks};
use crate::processor::Processor;
use crate::processors;
use crate::scalar::ScalarProcessor;

/// Builds a fresh processor for one type tag.
pub type ProcessorFactory = fn() -> Box<dyn Processor>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The init's type tag has no registered factory. The handle stays
    /// reset.
    #[error("no processor registered for type tag `{type_tag}`")]
    UnknownProcessorType { type_tag: ProcessorType },

    /// An init payload reached a processor of a different kind. Indicates a
    /// factory registered under the wrong tag.
    #[error("processor `{processor}` cannot consume `{init}` init payloads")]
    InitTypeMismatch {
        processor: ProcessorType,
        init: ProcessorType,
    },
}

/// Read-only view of the processors that already advanced this frame.
///
/// Handed to `Processor::advance_frame` so higher-priority processors can
/// sample lower-priority outputs; a processor can never observe one that has
/// not advanced yet.
pub struct FramePeers<'a> {
    advanced: &'a [Box<dyn Processor>],
}

impl<'a> FramePeers<'a> {
    /// A view with no peers, for driving a processor outside an engine.
    pub fn none() -> FramePeers<'static> {
        FramePeers { advanced: &[] }
    }

    pub fn processor(&self, typ: ProcessorType) -> Option<&'a dyn Processor> {
        self.advanced
            .iter()
            .find(|p| p.processor_type() == typ)
            .map(|p| p.as_ref())
    }

    pub fn scalars(&self, typ: ProcessorType) -> Option<&'a dyn ScalarProcessor> {
        self.processor(typ)?.as_scalar()
    }

    /// Sample a scalar-1 handle bound to an already-advanced processor.
    pub fn value_1f(&self, handle: &Motivator) -> Option<f32> {
        let p = self.processor(handle.processor_type()?)?;
        let index = p.index_for(handle)?;
        Some(p.as_scalar()?.value(index))
    }
}

/// Container of all processors and driver of per-frame advancement.
pub struct Engine {
    factories: HashMap<ProcessorType, ProcessorFactory>,
    processors: Vec<Box<dyn Processor>>,
    /// Set when a processor was added since the last advance; the priority
    /// order is recomputed once, then reused.
    order_dirty: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with an empty registry. Register processor types before
    /// initializing motivators.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            processors: Vec::new(),
            order_dirty: false,
        }
    }

    /// An engine with the standard processors registered: linear, ease,
    /// spline, matrix and rig.
    pub fn with_standard_processors() -> Self {
        let mut engine = Self::new();
        processors::register_standard(&mut engine);
        engine
    }

    /// Map `type_tag` to `factory`. Registering the same tag again is a
    /// no-op (first registration wins).
    pub fn register_processor_type(&mut self, type_tag: ProcessorType, factory: ProcessorFactory) {
        if self.factories.contains_key(&type_tag) {
            return;
        }
        debug!("registered processor type `{type_tag}`");
        self.factories.insert(type_tag, factory);
    }

    /// Create (or look up) the processor for `init`'s tag and bind a new
    /// motivator of `dimensions` slots in it.
    pub fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        dimensions: usize,
    ) -> Result<Motivator, EngineError> {
        let type_tag = init.processor_type();
        let i = match self.position(type_tag) {
            Some(i) => i,
            None => {
                let Some(factory) = self.factories.get(&type_tag) else {
                    warn!("initialize_motivator: no factory for `{type_tag}`");
                    return Err(EngineError::UnknownProcessorType { type_tag });
                };
                let processor = factory();
                debug_assert_eq!(processor.processor_type(), type_tag);
                debug!(
                    "created `{type_tag}` processor (priority {})",
                    processor.priority()
                );
                self.processors.push(processor);
                self.order_dirty = true;
                self.processors.len() - 1
            }
        };
        self.processors[i].initialize_motivator(init, dimensions)
    }

    /// Release the handle's slot run and reset the handle. A stale or reset
    /// handle is ignored.
    pub fn remove_motivator(&mut self, handle: &mut Motivator) {
        if let Some((i, index)) = self.locate(handle) {
            self.processors[i].remove_motivator(index);
        }
        *handle = Motivator::reset();
    }

    /// Advance every processor by `delta_time`, ascending by priority.
    /// Defragmentation happens inside each processor's advance, before its
    /// per-slot update.
    pub fn advance_frame(&mut self, delta_time: Ticks) {
        if self.order_dirty {
            self.processors.sort_by_key(|p| p.priority());
            self.order_dirty = false;
        }
        for i in 0..self.processors.len() {
            let (advanced, rest) = self.processors.split_at_mut(i);
            let peers = FramePeers { advanced };
            rest[0].advance_frame(delta_time, &peers);
        }
    }

    /// The processor for `typ`, if one has been instantiated.
    pub fn processor(&self, typ: ProcessorType) -> Option<&dyn Processor> {
        self.position(typ).map(|i| self.processors[i].as_ref())
    }

    pub fn processor_mut(&mut self, typ: ProcessorType) -> Option<&mut dyn Processor> {
        let i = self.position(typ)?;
        Some(self.processors[i].as_mut())
    }

    pub fn scalars(&self, typ: ProcessorType) -> Option<&dyn ScalarProcessor> {
        self.processor(typ)?.as_scalar()
    }

    pub fn scalars_mut(&mut self, typ: ProcessorType) -> Option<&mut dyn ScalarProcessor> {
        self.processor_mut(typ)?.as_scalar_mut()
    }

    pub fn matrices(&self, typ: ProcessorType) -> Option<&dyn crate::matrix::MatrixProcessor> {
        self.processor(typ)?.as_matrix()
    }

    pub fn matrices_mut(
        &mut self,
        typ: ProcessorType,
    ) -> Option<&mut dyn crate::matrix::MatrixProcessor> {
        self.processor_mut(typ)?.as_matrix_mut()
    }

    pub fn rigs(&self, typ: ProcessorType) -> Option<&dyn crate::rig::RigProcessor> {
        self.processor(typ)?.as_rig()
    }

    pub fn rigs_mut(&mut self, typ: ProcessorType) -> Option<&mut dyn crate::rig::RigProcessor> {
        self.processor_mut(typ)?.as_rig_mut()
    }

    /// Resolve a handle to its processor and base slot.
    pub fn resolve(&self, handle: &Motivator) -> Option<(&dyn Processor, SlotIndex)> {
        let p = self.processor(handle.processor_type()?)?;
        let index = p.index_for(handle)?;
        Some((p, index))
    }

    /// True iff the handle is bound to a live run.
    pub fn valid_motivator(&self, handle: &Motivator) -> bool {
        match self.resolve(handle) {
            Some((p, index)) => p.valid_motivator(index, handle),
            None => false,
        }
    }

    /// Width of the handle's slot run; 0 for a reset or stale handle.
    pub fn dimensions(&self, handle: &Motivator) -> usize {
        self.resolve(handle)
            .map_or(0, |(p, index)| p.dimensions(index))
    }

    pub fn num_processors(&self) -> usize {
        self.processors.len()
    }

    /// Run every processor's structural self-check.
    pub fn verify_internal_state(&self) {
        for p in &self.processors {
            p.verify_internal_state();
        }
    }

    fn position(&self, typ: ProcessorType) -> Option<usize> {
        self.processors
            .iter()
            .position(|p| p.processor_type() == typ)
    }

    fn locate(&self, handle: &Motivator) -> Option<(usize, SlotIndex)> {
        let i = self.position(handle.processor_type()?)?;
        let index = self.processors[i].index_for(handle)?;
        Some((i, index))
    }
}
