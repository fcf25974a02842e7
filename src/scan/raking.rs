//! Padded raking grid for CTA-wide reduction and rescan
//!
//! Every worker deposits one partial into its placement slot; a subset of
//! `raking_threads` workers then each sequentially reduces (and later
//! rescans) the `raking_length` contiguous slots of its segment. Each
//! segment carries one padding slot, matching the bank-conflict padding a
//! shared-memory layout would use, so placement arithmetic carries over.
//!
//! When `cta_threads` is not an exact multiple of
//! `raking_threads * raking_length` the grid is *guarded*: trailing slots
//! (and possibly whole trailing segments) hold no real partial, traversals
//! bound themselves to the occupied range, and the true CTA aggregate must
//! be assembled from the occupied segments, never assumed equal to the last
//! raking thread's partial, which may not exist.

use crate::scan::thread;
use bytemuck::Zeroable;

/// Padding slots per raking segment
const SEGMENT_PADDING: usize = 1;

/// Padded placement grid shared by one CTA
#[derive(Debug)]
pub struct RakingGrid<T> {
    slots: Vec<T>,
    cta_threads: usize,
    raking_threads: usize,
    raking_length: usize,
}

impl<T: Copy + Zeroable> RakingGrid<T> {
    /// Allocate a grid for `cta_threads` workers raked by `raking_threads`
    #[must_use]
    pub fn new(cta_threads: usize, raking_threads: usize) -> Self {
        let raking_length = cta_threads.div_ceil(raking_threads);
        let stride = raking_length + SEGMENT_PADDING;
        Self {
            slots: vec![T::zeroed(); raking_threads * stride],
            cta_threads,
            raking_threads,
            raking_length,
        }
    }
}

// Layout and traversal need only `Copy`; `Zeroable` is an allocation
// concern confined to `new`.
impl<T: Copy> RakingGrid<T> {
    /// Whether every raking segment is fully occupied by real partials
    #[must_use]
    pub fn unguarded(&self) -> bool {
        self.raking_threads * self.raking_length == self.cta_threads
    }

    /// Slots each raking thread sequentially reduces
    #[must_use]
    pub fn raking_length(&self) -> usize {
        self.raking_length
    }

    /// Placement slot index for a worker's partial
    ///
    /// Distinct workers map to distinct slots, and the `raking_length`
    /// workers feeding one raking thread occupy contiguous slots of its
    /// segment.
    #[must_use]
    pub fn placement_offset(&self, worker: usize) -> usize {
        debug_assert!(worker < self.cta_threads);
        let segment = worker / self.raking_length;
        let pos = worker % self.raking_length;
        segment * (self.raking_length + SEGMENT_PADDING) + pos
    }

    /// Deposit a worker's partial into its placement slot
    pub fn place(&mut self, worker: usize, value: T) {
        let offset = self.placement_offset(worker);
        self.slots[offset] = value;
    }

    /// Read back a worker's placement slot
    #[must_use]
    pub fn read_placement(&self, worker: usize) -> T {
        self.slots[self.placement_offset(worker)]
    }

    /// Occupied slot range of a raking thread's segment: (first slot, count)
    fn segment_bounds(&self, raking_thread: usize) -> (usize, usize) {
        debug_assert!(raking_thread < self.raking_threads);
        let first_worker = raking_thread * self.raking_length;
        let end_worker = (first_worker + self.raking_length).min(self.cta_threads);
        let start = raking_thread * (self.raking_length + SEGMENT_PADDING);
        (start, end_worker.saturating_sub(first_worker))
    }

    /// Sequentially reduce a raking thread's occupied slots
    ///
    /// Returns `None` for an empty trailing segment of a guarded grid.
    pub fn rake_reduce<Op>(&self, raking_thread: usize, op: &Op) -> Option<T>
    where
        Op: Fn(T, T) -> T,
    {
        let (start, len) = self.segment_bounds(raking_thread);
        if len == 0 {
            return None;
        }
        Some(thread::thread_reduce(&self.slots[start..start + len], op))
    }

    /// Exclusive-rescan a raking thread's occupied slots in place, seeded by
    /// its scanned raking partial
    ///
    /// With `seed == None` (the identity-free first segment) slot 0 keeps an
    /// unspecified value per the scan contract.
    pub fn rake_scan_exclusive<Op>(&mut self, raking_thread: usize, seed: Option<T>, op: &Op)
    where
        Op: Fn(T, T) -> T,
    {
        let (start, len) = self.segment_bounds(raking_thread);
        if len == 0 {
            return;
        }
        thread::thread_scan_exclusive(&mut self.slots[start..start + len], seed, op);
    }
}
