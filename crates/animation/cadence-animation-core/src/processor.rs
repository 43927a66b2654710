//! The processor substrate: stable handles over relocatable slots.
//!
//! `ProcessorBase` owns the bookkeeping every processor shares: the index
//! allocator, the back-pointer table (slot -> owning handle id, base slots
//! only) and the binding table (handle id -> base slot). Concrete processors
//! embed it next to their dense per-slot arrays and route allocator events
//! into those arrays through [`ProcessorState`].
//!
//! The [`Processor`] trait is the uniform face the engine drives; algorithm
//! capabilities are reached through the `as_scalar`/`as_matrix`/`as_rig`
//! downcasts.

use hashbrown::HashMap;
use log::trace;

use crate::engine::{EngineError, FramePeers};
use crate::index_allocator::{AllocatorEvents, IndexAllocator, IndexRange};
use crate::matrix::MatrixProcessor;
use crate::motivator::{Motivator, MotivatorId, MotivatorInit, ProcessorType, SlotIndex, Ticks};
use crate::rig::RigProcessor;
use crate::scalar::ScalarProcessor;

/// Hooks a processor's dense arrays implement so the shared bookkeeping can
/// resize and relocate them. Populating a freshly allocated run is not a
/// hook: the concrete processor does that itself, right after allocation,
/// with its init payload in hand.
pub trait ProcessorState {
    /// Current length of the parallel arrays.
    fn len(&self) -> usize;

    /// Resize the parallel arrays. New tail entries must be reset (idle).
    fn set_len(&mut self, len: usize);

    /// Copy `width` slots from `source` to `target`. The target range is
    /// unoccupied.
    fn move_range(&mut self, source: SlotIndex, target: SlotIndex, width: usize);

    /// A run was released. Plain arrays have nothing to do; stateful slots
    /// should return to idle so dead lanes cost nothing to skip.
    fn reset_range(&mut self, _base: SlotIndex, _width: usize) {}

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Adapter that lets the allocator mutate the back-pointer tables and the
/// derived arrays in one event.
struct TableEvents<'a> {
    motivators: &'a mut Vec<Option<MotivatorId>>,
    bindings: &'a mut HashMap<MotivatorId, SlotIndex>,
    state: &'a mut dyn ProcessorState,
}

impl AllocatorEvents for TableEvents<'_> {
    fn set_num_indices(&mut self, num_indices: usize) {
        self.motivators.resize(num_indices, None);
        self.state.set_len(num_indices);
    }

    fn move_index_range(&mut self, source: IndexRange, target: SlotIndex) {
        self.state.move_range(source.base, target, source.width);
        // Rebind the owning handle to the new base in the same call, so no
        // intermediate state is observable.
        if let Some(id) = self.motivators[source.base].take() {
            self.motivators[target] = Some(id);
            self.bindings.insert(id, target);
            trace!("rebound motivator {:?}: slot {} -> {}", id, source.base, target);
        }
    }
}

/// Shared bookkeeping for one processor: allocator, back-pointer table,
/// binding table and the handle-id mint.
#[derive(Debug, Default)]
pub struct ProcessorBase {
    allocator: IndexAllocator,
    /// Back-pointer table: `motivators[base]` is the owning handle of the
    /// live run based there; interior and freed slots hold `None`.
    motivators: Vec<Option<MotivatorId>>,
    /// Handle id -> base slot. A handle id absent here is reset.
    bindings: HashMap<MotivatorId, SlotIndex>,
    next_id: u32,
}

impl ProcessorBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a run of `dimensions` slots and bind a freshly minted handle
    /// id to its base.
    pub fn allocate(
        &mut self,
        state: &mut dyn ProcessorState,
        dimensions: usize,
    ) -> (MotivatorId, SlotIndex) {
        debug_assert!(dimensions >= 1, "motivator needs at least one dimension");
        let Self {
            allocator,
            motivators,
            bindings,
            next_id,
        } = self;
        let base = allocator.allocate(
            dimensions,
            &mut TableEvents {
                motivators,
                bindings,
                state,
            },
        );
        let id = MotivatorId(*next_id);
        *next_id = next_id.wrapping_add(1);
        motivators[base] = Some(id);
        bindings.insert(id, base);
        (id, base)
    }

    /// Release the run based at `index`: reset the derived slots, reset the
    /// owning handle, return the run to the freed list.
    pub fn remove(&mut self, state: &mut dyn ProcessorState, index: SlotIndex) {
        let width = self.allocator.count_for_index(index);
        debug_assert!(width > 0, "remove on a non-base slot {index}");
        if width == 0 {
            return;
        }
        state.reset_range(index, width);
        if let Some(id) = self.motivators[index].take() {
            self.bindings.remove(&id);
        }
        self.allocator.free(index);
    }

    /// Retarget ownership of the run at `index` to a new handle id, resetting
    /// the handle currently bound there. If `incoming` already owns a
    /// different run in this processor, that run is released first. The
    /// per-slot state at `index` is untouched.
    pub fn transfer(
        &mut self,
        state: &mut dyn ProcessorState,
        index: SlotIndex,
        incoming: Option<MotivatorId>,
    ) -> MotivatorId {
        debug_assert!(
            self.allocator.count_for_index(index) > 0,
            "transfer on a non-base slot {index}"
        );
        if let Some(old_id) = incoming {
            match self.bindings.get(&old_id).copied() {
                Some(base) if base == index => return old_id,
                Some(base) => self.remove(state, base),
                None => {}
            }
        }
        if let Some(prev) = self.motivators[index].take() {
            self.bindings.remove(&prev);
        }
        let id = MotivatorId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.motivators[index] = Some(id);
        self.bindings.insert(id, index);
        id
    }

    /// Compact live runs; relocation events flow through `state` and the
    /// back-pointer tables. Typically the first thing a processor's
    /// `advance_frame` does.
    pub fn defragment(&mut self, state: &mut dyn ProcessorState) {
        let Self {
            allocator,
            motivators,
            bindings,
            ..
        } = self;
        allocator.defragment(&mut TableEvents {
            motivators,
            bindings,
            state,
        });
    }

    /// True iff `index` is a live base owned by `id`.
    pub fn valid_motivator(&self, index: SlotIndex, id: Option<MotivatorId>) -> bool {
        match (self.motivators.get(index), id) {
            (Some(&Some(owner)), Some(id)) => {
                owner == id && self.allocator.count_for_index(index) > 0
            }
            _ => false,
        }
    }

    /// Base slot bound to `id`, if the handle is live here.
    #[inline]
    pub fn index_for(&self, id: MotivatorId) -> Option<SlotIndex> {
        self.bindings.get(&id).copied()
    }

    /// Width of the run based at `index` (0 for interiors and freed slots).
    #[inline]
    pub fn dimensions(&self, index: SlotIndex) -> usize {
        self.allocator.count_for_index(index)
    }

    #[inline]
    pub fn num_indices(&self) -> usize {
        self.allocator.num_indices()
    }

    /// Live runs, ascending by base. Processors batch-advance over these.
    pub fn live_ranges(&self) -> impl Iterator<Item = IndexRange> + '_ {
        self.allocator.live_ranges()
    }

    /// Assert the structural invariants: table lengths agree, every live
    /// base carries a binding that points back at it, interiors are clear.
    /// Cheap enough for tests; call when chasing corruption.
    pub fn verify_internal_state(&self, state: &dyn ProcessorState) {
        assert_eq!(self.motivators.len(), self.allocator.num_indices());
        assert_eq!(state.len(), self.allocator.num_indices());
        let mut live_bases = 0;
        for range in self.allocator.live_ranges() {
            let id = self.motivators[range.base].expect("live base without a handle");
            assert_eq!(self.bindings.get(&id), Some(&range.base));
            for interior in range.base + 1..range.end() {
                assert!(self.motivators[interior].is_none(), "interior back-pointer set");
            }
            live_bases += 1;
        }
        assert_eq!(self.bindings.len(), live_bases);
        for (id, &base) in &self.bindings {
            assert_eq!(self.motivators[base], Some(*id));
        }
    }
}

/// The uniform face of one animation algorithm's pool. The engine owns one
/// boxed `Processor` per registered type tag and drives them all once per
/// frame in ascending priority order.
pub trait Processor {
    /// The type tag of the init descriptors this processor consumes.
    fn processor_type(&self) -> ProcessorType;

    /// Frame ordering: lower priorities advance earlier. Constant per
    /// processor kind; processors that sample others must sort later than
    /// what they sample.
    fn priority(&self) -> i32;

    /// Advance every live slot by `delta_time`. `peers` exposes, read-only,
    /// the processors that already advanced this frame.
    fn advance_frame(&mut self, delta_time: Ticks, peers: &FramePeers<'_>);

    /// Allocate a run of `dimensions` slots, populate it from `init`, and
    /// return the bound handle. Called through `Engine::initialize_motivator`.
    fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        dimensions: usize,
    ) -> Result<Motivator, EngineError>;

    /// Release the run based at `index` and reset its owning handle.
    fn remove_motivator(&mut self, index: SlotIndex);

    /// Retarget the run at `index` onto `new_handle` (resetting the current
    /// owner); the per-slot state is unchanged.
    fn transfer_motivator(&mut self, index: SlotIndex, new_handle: &mut Motivator);

    /// True iff `index` is a live base currently owned by `handle`.
    fn valid_motivator(&self, index: SlotIndex, handle: &Motivator) -> bool;

    /// Width of the run based at `index`.
    fn dimensions(&self, index: SlotIndex) -> usize;

    /// Resolve a handle to its base slot, if live in this processor.
    fn index_for(&self, handle: &Motivator) -> Option<SlotIndex>;

    /// Structural self-check; see [`ProcessorBase::verify_internal_state`].
    fn verify_internal_state(&self) {}

    fn as_scalar(&self) -> Option<&dyn ScalarProcessor> {
        None
    }
    fn as_scalar_mut(&mut self) -> Option<&mut dyn ScalarProcessor> {
        None
    }
    fn as_matrix(&self) -> Option<&dyn MatrixProcessor> {
        None
    }
    fn as_matrix_mut(&mut self) -> Option<&mut dyn MatrixProcessor> {
        None
    }
    fn as_rig(&self) -> Option<&dyn RigProcessor> {
        None
    }
    fn as_rig_mut(&mut self) -> Option<&mut dyn RigProcessor> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountedState {
        values: Vec<f32>,
    }

    impl ProcessorState for CountedState {
        fn len(&self) -> usize {
            self.values.len()
        }
        fn set_len(&mut self, len: usize) {
            self.values.resize(len, 0.0);
        }
        fn move_range(&mut self, source: SlotIndex, target: SlotIndex, width: usize) {
            for d in 0..width {
                self.values[target + d] = self.values[source + d];
            }
        }
        fn reset_range(&mut self, base: SlotIndex, width: usize) {
            for v in &mut self.values[base..base + width] {
                *v = 0.0;
            }
        }
    }

    /// it should bind a fresh id at the run base and keep tables in sync
    #[test]
    fn allocate_binds_base() {
        let mut base = ProcessorBase::new();
        let mut state = CountedState::default();
        let (id, slot) = base.allocate(&mut state, 3);
        assert_eq!(slot, 0);
        assert_eq!(base.index_for(id), Some(0));
        assert!(base.valid_motivator(0, Some(id)));
        assert!(!base.valid_motivator(1, Some(id)));
        assert_eq!(state.len(), 3);
        base.verify_internal_state(&state);
    }

    /// it should rebind the surviving handle when defragmentation moves it
    #[test]
    fn defragment_rebinds_moved_handle() {
        let mut base = ProcessorBase::new();
        let mut state = CountedState::default();
        let (_a, sa) = base.allocate(&mut state, 2);
        let (b, sb) = base.allocate(&mut state, 2);
        state.values[sb] = 5.0;
        state.values[sb + 1] = 6.0;
        base.remove(&mut state, sa);
        base.defragment(&mut state);
        let moved = base.index_for(b).expect("still bound");
        assert_eq!(moved, 0);
        assert_eq!(state.values[moved], 5.0);
        assert_eq!(state.values[moved + 1], 6.0);
        assert_eq!(base.num_indices(), 2);
        base.verify_internal_state(&state);
    }

    /// it should reset the previous owner on transfer and keep slot state
    #[test]
    fn transfer_resets_previous_owner() {
        let mut base = ProcessorBase::new();
        let mut state = CountedState::default();
        let (a, slot) = base.allocate(&mut state, 1);
        state.values[slot] = 9.0;
        let b = base.transfer(&mut state, slot, None);
        assert!(base.valid_motivator(slot, Some(b)));
        assert!(!base.valid_motivator(slot, Some(a)));
        assert_eq!(base.index_for(a), None);
        assert_eq!(state.values[slot], 9.0);
        base.verify_internal_state(&state);
    }

    /// it should release the incoming handle's old run before rebinding it
    #[test]
    fn transfer_releases_incoming_run() {
        let mut base = ProcessorBase::new();
        let mut state = CountedState::default();
        let (_a, sa) = base.allocate(&mut state, 1);
        let (b, sb) = base.allocate(&mut state, 1);
        let b2 = base.transfer(&mut state, sa, Some(b));
        assert_eq!(base.index_for(b2), Some(sa));
        // b's old run was freed.
        assert_eq!(base.dimensions(sb), 0);
        base.verify_internal_state(&state);
    }
}
