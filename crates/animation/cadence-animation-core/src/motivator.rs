//! Motivator handles and the identifiers behind them.
//!
//! A `Motivator` is the external face of one animated value: an opaque,
//! copyable reference into a processor's pooled state. The handle itself
//! carries no mutable state; the owning processor keeps both halves of the
//! binding (slot -> handle id, handle id -> slot), so relocating a slot run
//! rebinds the handle without touching user memory.

use std::any::Any;
use std::fmt;

/// Index of one slot in a processor's dense arrays.
pub type SlotIndex = usize;

/// Engine time, in integer ticks. The unit is the caller's choice (commonly
/// milliseconds); the core only adds and compares.
pub type Ticks = i32;

/// Stable tag selecting which processor kind an init descriptor belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ProcessorType(pub &'static str);

impl fmt::Display for ProcessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Identity a processor mints for each handle it binds. Monotonic per
/// processor; never reused within one processor's lifetime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct MotivatorId(pub u32);

/// Opaque reference to one animated value.
///
/// A default-constructed handle is reset (bound to nothing). Binding happens
/// through [`crate::Engine::initialize_motivator`]; release through
/// [`crate::Engine::remove_motivator`] or a processor's transfer operation.
/// Copies of a handle alias the same binding.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Motivator {
    binding: Option<(ProcessorType, MotivatorId)>,
}

impl Motivator {
    /// A reset handle, equivalent to `Motivator::default()`.
    pub const fn reset() -> Self {
        Self { binding: None }
    }

    pub(crate) fn bound(typ: ProcessorType, id: MotivatorId) -> Self {
        Self {
            binding: Some((typ, id)),
        }
    }

    /// True if the handle refers to some processor. The binding may still be
    /// stale (the run removed); validity against live state is the owning
    /// processor's `valid_motivator`.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// The processor kind this handle points into, if bound.
    #[inline]
    pub fn processor_type(&self) -> Option<ProcessorType> {
        self.binding.map(|(t, _)| t)
    }

    #[inline]
    pub(crate) fn id(&self) -> Option<MotivatorId> {
        self.binding.map(|(_, id)| id)
    }

    /// The id, but only when the handle points into `typ`.
    #[inline]
    pub(crate) fn id_in(&self, typ: ProcessorType) -> Option<MotivatorId> {
        match self.binding {
            Some((t, id)) if t == typ => Some(id),
            _ => None,
        }
    }
}

/// Init descriptor consumed by `Engine::initialize_motivator`.
///
/// Each processor kind declares its own payload type and reports its tag
/// here; the engine dispatches on the tag and the processor downcasts the
/// payload back.
pub trait MotivatorInit: Any {
    fn processor_type(&self) -> ProcessorType;
    fn as_any(&self) -> &dyn Any;
}

impl dyn MotivatorInit {
    /// Downcast the payload to the concrete init type of a processor.
    pub fn downcast_ref<T: MotivatorInit>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// it should treat a default handle as reset and unbound
    #[test]
    fn default_handle_is_reset() {
        let m = Motivator::default();
        assert!(!m.is_bound());
        assert_eq!(m.processor_type(), None);
        assert_eq!(m, Motivator::reset());
    }

    /// it should expose its id only to the matching processor type
    #[test]
    fn id_in_filters_by_type() {
        let a = ProcessorType("a");
        let b = ProcessorType("b");
        let m = Motivator::bound(a, MotivatorId(7));
        assert_eq!(m.id_in(a), Some(MotivatorId(7)));
        assert_eq!(m.id_in(b), None);
    }
}
