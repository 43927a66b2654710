//! Dense slot allocation over variable-width runs.
//!
//! Processors store per-slot state in parallel arrays and hand out runs of
//! one or more contiguous slots. The allocator keeps live runs as dense as
//! possible: freed runs are recycled by exact width in O(1), and
//! `defragment` compacts the remainder by relocating the highest live runs
//! into the lowest holes, shrinking the arrays from the tail.
//!
//! The allocator never touches the arrays itself; growth, shrink and
//! relocation are delivered to the owner through [`AllocatorEvents`].

use log::trace;

use crate::motivator::SlotIndex;

/// A contiguous run of slots `[base, base + width)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexRange {
    pub base: SlotIndex,
    pub width: usize,
}

impl IndexRange {
    pub fn new(base: SlotIndex, width: usize) -> Self {
        Self { base, width }
    }

    #[inline]
    pub fn end(&self) -> SlotIndex {
        self.base + self.width
    }
}

/// Events the allocator emits while mutating slot space. The owner adapts
/// these onto its parallel arrays (and, for processors, onto the handle
/// back-pointer table).
pub trait AllocatorEvents {
    /// Total slot count changed. Shrinking discards slots `>= num_indices`;
    /// growing must initialize the new tail to a reset state.
    fn set_num_indices(&mut self, num_indices: usize);

    /// Copy `source.width` slots from `source.base` to `target`. The target
    /// range is unoccupied when this is called.
    fn move_index_range(&mut self, source: IndexRange, target: SlotIndex);
}

/// Allocator state: per-slot width table (width at a live run's base, zero
/// everywhere else) plus the freed-run list.
#[derive(Debug, Default)]
pub struct IndexAllocator {
    counts: Vec<usize>,
    unused: Vec<IndexRange>,
}

impl IndexAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current high-water mark: the length the owner's parallel arrays must
    /// have.
    #[inline]
    pub fn num_indices(&self) -> usize {
        self.counts.len()
    }

    /// True when there is nothing for `defragment` to do.
    #[inline]
    pub fn is_compact(&self) -> bool {
        self.unused.is_empty()
    }

    /// Width of the live run based at `index`, or 0 when `index` is not a
    /// live base (interior or freed).
    #[inline]
    pub fn count_for_index(&self, index: SlotIndex) -> usize {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// True when `index` falls anywhere inside a live run.
    pub fn valid_index(&self, index: SlotIndex) -> bool {
        if index >= self.counts.len() {
            return false;
        }
        for base in (0..=index).rev() {
            let width = self.counts[base];
            if width > 0 {
                return base + width > index;
            }
        }
        false
    }

    /// Iterate all live runs, ascending by base.
    pub fn live_ranges(&self) -> impl Iterator<Item = IndexRange> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &w)| w > 0)
            .map(|(base, &width)| IndexRange::new(base, width))
    }

    /// Hand out a run of `width` slots, recycling a freed run of exactly
    /// that width when one exists, otherwise growing the tail (which emits
    /// `set_num_indices`).
    pub fn allocate(&mut self, width: usize, events: &mut dyn AllocatorEvents) -> SlotIndex {
        debug_assert!(width >= 1, "zero-width allocation");
        if let Some(pos) = self.unused.iter().position(|r| r.width == width) {
            let run = self.unused.swap_remove(pos);
            self.counts[run.base] = width;
            return run.base;
        }
        let base = self.counts.len();
        let new_total = base + width;
        events.set_num_indices(new_total);
        self.counts.resize(new_total, 0);
        self.counts[base] = width;
        base
    }

    /// Return the run based at `index` to the freed list. The high-water
    /// mark is unchanged and no events are emitted; compaction is deferred
    /// to `defragment`.
    pub fn free(&mut self, index: SlotIndex) {
        let width = self.count_for_index(index);
        debug_assert!(width > 0, "free on a non-base slot {index}");
        if width == 0 {
            return;
        }
        self.counts[index] = 0;
        self.unused.push(IndexRange::new(index, width));
    }

    /// Compact live runs into a prefix of slot space.
    ///
    /// Repeatedly relocates the highest live run into the lowest freed hole
    /// (highest-first, so the tail shrinks monotonically and a run is never
    /// relocated onto itself), then truncates the tail via
    /// `set_num_indices`. A no-op when the freed list is empty.
    pub fn defragment(&mut self, events: &mut dyn AllocatorEvents) {
        if self.unused.is_empty() {
            return;
        }
        loop {
            self.normalize_free_list();
            let Some(live) = self.highest_live_run() else {
                break;
            };
            let Some(&hole) = self.unused.first() else {
                break;
            };
            if hole.base >= live.base {
                // Every remaining hole sits at or above the highest live
                // run; truncation below absorbs it.
                break;
            }
            if live.width > hole.width {
                trace!(
                    "defragment stalled: hole at {} ({} wide) cannot hold run at {} ({} wide)",
                    hole.base,
                    hole.width,
                    live.base,
                    live.width
                );
                break;
            }
            events.move_index_range(live, hole.base);
            self.counts[hole.base] = live.width;
            self.counts[live.base] = 0;
            self.unused.remove(0);
            if hole.width > live.width {
                self.unused
                    .push(IndexRange::new(hole.base + live.width, hole.width - live.width));
            }
            // The vacated source is now the tail (everything above it was
            // already freed); the next normalize pass absorbs it.
            self.unused.push(live);
        }
        let new_total = self.highest_live_end();
        self.unused.retain(|r| r.base < new_total);
        if new_total != self.counts.len() {
            self.counts.truncate(new_total);
            events.set_num_indices(new_total);
        }
    }

    /// Sort holes by base, merge adjacent ones, and drop holes that sit at
    /// or beyond the live tail (those are handled by truncation).
    fn normalize_free_list(&mut self) {
        self.unused.sort_by_key(|r| r.base);
        let mut merged: Vec<IndexRange> = Vec::with_capacity(self.unused.len());
        for run in self.unused.drain(..) {
            match merged.last_mut() {
                Some(prev) if prev.end() == run.base => prev.width += run.width,
                _ => merged.push(run),
            }
        }
        let tail = self
            .counts
            .iter()
            .rposition(|&w| w > 0)
            .map_or(0, |base| base + self.counts[base]);
        merged.retain(|r| r.base < tail);
        self.unused = merged;
    }

    fn highest_live_run(&self) -> Option<IndexRange> {
        self.counts
            .iter()
            .rposition(|&w| w > 0)
            .map(|base| IndexRange::new(base, self.counts[base]))
    }

    fn highest_live_end(&self) -> usize {
        self.highest_live_run().map_or(0, |r| r.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records events so tests can assert on the emitted protocol.
    #[derive(Default)]
    struct Recorder {
        len: usize,
        moves: Vec<(IndexRange, SlotIndex)>,
        resizes: Vec<usize>,
    }

    impl AllocatorEvents for Recorder {
        fn set_num_indices(&mut self, num_indices: usize) {
            self.len = num_indices;
            self.resizes.push(num_indices);
        }
        fn move_index_range(&mut self, source: IndexRange, target: SlotIndex) {
            self.moves.push((source, target));
        }
    }

    /// it should grow the tail and report each new total
    #[test]
    fn allocate_grows_tail() {
        let mut alloc = IndexAllocator::new();
        let mut ev = Recorder::default();
        assert_eq!(alloc.allocate(3, &mut ev), 0);
        assert_eq!(alloc.allocate(1, &mut ev), 3);
        assert_eq!(alloc.allocate(4, &mut ev), 4);
        assert_eq!(alloc.num_indices(), 8);
        assert_eq!(ev.resizes, vec![3, 4, 8]);
        assert_eq!(alloc.count_for_index(0), 3);
        assert_eq!(alloc.count_for_index(1), 0);
        assert_eq!(alloc.count_for_index(3), 1);
    }

    /// it should recycle a freed run of exactly the requested width
    #[test]
    fn free_then_allocate_reuses_exact_width() {
        let mut alloc = IndexAllocator::new();
        let mut ev = Recorder::default();
        let a = alloc.allocate(3, &mut ev);
        let _b = alloc.allocate(2, &mut ev);
        alloc.free(a);
        // A narrower request must not carve the width-3 hole.
        assert_eq!(alloc.allocate(2, &mut ev), 5);
        // The exact width comes straight back, without growing.
        assert_eq!(alloc.allocate(3, &mut ev), 0);
        assert_eq!(alloc.num_indices(), 7);
    }

    /// it should distinguish run bases from interiors and freed slots
    #[test]
    fn validity_queries() {
        let mut alloc = IndexAllocator::new();
        let mut ev = Recorder::default();
        let a = alloc.allocate(3, &mut ev);
        let b = alloc.allocate(2, &mut ev);
        assert!(alloc.valid_index(a) && alloc.valid_index(a + 2));
        assert!(alloc.valid_index(b + 1));
        alloc.free(b);
        assert!(!alloc.valid_index(b) && !alloc.valid_index(b + 1));
        assert_eq!(alloc.count_for_index(a + 1), 0);
        assert!(!alloc.valid_index(99));
    }

    /// it should relocate the highest run into the lowest hole and truncate
    #[test]
    fn defragment_compacts_to_prefix() {
        let mut alloc = IndexAllocator::new();
        let mut ev = Recorder::default();
        let _a = alloc.allocate(3, &mut ev);
        let b = alloc.allocate(3, &mut ev);
        let c = alloc.allocate(3, &mut ev);
        alloc.free(b);
        alloc.defragment(&mut ev);
        assert_eq!(ev.moves, vec![(IndexRange::new(c, 3), b)]);
        assert_eq!(alloc.num_indices(), 6);
        assert_eq!(ev.len, 6);
        assert!(alloc.is_compact());
        assert_eq!(alloc.count_for_index(3), 3);
    }

    /// it should be a no-op on an already-compact allocator
    #[test]
    fn defragment_compact_is_noop() {
        let mut alloc = IndexAllocator::new();
        let mut ev = Recorder::default();
        let _ = alloc.allocate(2, &mut ev);
        let before = ev.resizes.len();
        alloc.defragment(&mut ev);
        assert!(ev.moves.is_empty());
        assert_eq!(ev.resizes.len(), before);
    }

    /// it should shrink to zero once the only run is freed
    #[test]
    fn defragment_truncates_to_zero() {
        let mut alloc = IndexAllocator::new();
        let mut ev = Recorder::default();
        let a = alloc.allocate(4, &mut ev);
        alloc.free(a);
        alloc.defragment(&mut ev);
        assert_eq!(alloc.num_indices(), 0);
        assert_eq!(ev.len, 0);
        assert!(ev.moves.is_empty());
    }

    /// it should merge adjacent holes so wider runs can relocate
    #[test]
    fn defragment_merges_adjacent_holes() {
        let mut alloc = IndexAllocator::new();
        let mut ev = Recorder::default();
        let a = alloc.allocate(1, &mut ev);
        let b = alloc.allocate(2, &mut ev);
        let c = alloc.allocate(3, &mut ev);
        alloc.free(a);
        alloc.free(b);
        alloc.defragment(&mut ev);
        // Holes [0,1) and [1,3) merge into [0,3), which fits the width-3 run.
        assert_eq!(ev.moves, vec![(IndexRange::new(c, 3), 0)]);
        assert_eq!(alloc.num_indices(), 3);
        assert!(alloc.is_compact());
    }

    /// it should leave interleaved survivors packed after several frees
    #[test]
    fn defragment_multiple_holes() {
        let mut alloc = IndexAllocator::new();
        let mut ev = Recorder::default();
        let runs: Vec<_> = (0..5).map(|_| alloc.allocate(2, &mut ev)).collect();
        alloc.free(runs[1]);
        alloc.free(runs[3]);
        alloc.defragment(&mut ev);
        assert_eq!(alloc.num_indices(), 6);
        assert!(alloc.is_compact());
        let live: Vec<_> = alloc.live_ranges().collect();
        assert_eq!(live.len(), 3);
        assert_eq!(live[0].base, 0);
        assert_eq!(live[2].end(), 6);
    }
}
