//! CTA-wide cooperative scan engine
//!
//! Composes the sequential thread scans, the warp Kogge-Stone scan, and the
//! padded raking grid into exclusive/inclusive scans (and sums) over all of
//! a CTA's items, with an optional CTA-prefix callback.
//!
//! # Algorithm selection
//!
//! When the whole CTA fits the raking width (`cta_threads ==
//! raking_threads`) the engine short-circuits straight to the warp scan,
//! no raking-grid traffic at all. Otherwise it runs the five-phase raking
//! protocol:
//!
//! 1. every worker folds its own items into one partial and deposits it in
//!    its raking-grid placement slot *(barrier)*
//! 2. each raking thread sequentially reduces its segment of contiguous
//!    placement slots into a raking partial
//! 3. the raking partials are exclusive-scanned by the warp scan; the
//!    CTA-prefix callback, if any, is resolved here; this is the single
//!    point closest to the true aggregate
//! 4. each raking thread exclusive-rescans its segment in place, seeded by
//!    its scanned raking partial *(barrier)*
//! 5. every worker reads its placement slot back as its exclusive CTA-wide
//!    prefix and rescans its own items from it
//!
//! # CTA-prefix callback
//!
//! A stateful callable invoked exactly once per scan call with the *local*
//! aggregate; its return value is algebraically prepended to every worker's
//! output. The aggregate returned by the scan never includes the callback's
//! return value; only the scan outputs do.

use crate::config::{ConfigError, CtaConfig};
use crate::scan::raking::RakingGrid;
use crate::scan::thread;
use crate::scan::warp::{WarpScan, WarpScratch};
use bytemuck::Zeroable;
use num_traits::Zero;

/// Shared scratch for one CTA's scan calls
///
/// Aliases the warp-scan buffer, the padded raking grid, and the per-worker
/// partial staging area. Allocated once, passed `&mut` into every call, and
/// left in an unspecified (but deterministic) state after each return; the
/// exclusive borrow is the barrier that fences reuse.
#[derive(Debug)]
pub struct SmemStorage<T> {
    warp: WarpScratch<T>,
    grid: RakingGrid<T>,
    partials: Vec<T>,
    raking: Vec<T>,
}

impl<T: Copy + Zeroable> SmemStorage<T> {
    /// Allocate scratch sized for `config`
    #[must_use]
    pub fn new(config: &CtaConfig) -> Self {
        Self {
            warp: WarpScratch::new(config.raking_threads()),
            grid: RakingGrid::new(config.cta_threads(), config.raking_threads()),
            partials: vec![T::zeroed(); config.cta_threads()],
            raking: vec![T::zeroed(); config.raking_threads()],
        }
    }
}

/// CTA-wide scan engine
#[derive(Debug, Clone, Copy)]
pub struct CtaScan {
    config: CtaConfig,
    warp: WarpScan,
}

impl CtaScan {
    /// Build a scan engine for `config`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the raking width is not scannable by a
    /// single warp.
    pub fn new(config: CtaConfig) -> Result<Self, ConfigError> {
        let warp = WarpScan::new(config.raking_threads())?;
        Ok(Self { config, warp })
    }

    /// The engine's launch configuration
    #[must_use]
    pub const fn config(&self) -> CtaConfig {
        self.config
    }

    /// Exclusive scan over all items under `op`
    ///
    /// `items` holds `cta_threads * items_per_thread` values, ordered by
    /// worker index then position within the worker's items. Returns the
    /// CTA-wide aggregate.
    ///
    /// Without an identity, the output at position 0 is unspecified and
    /// must not be read.
    pub fn exclusive_scan<T, Op>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        identity: Option<T>,
        op: &Op,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        self.scan_core(smem, items, identity, op, None, false)
    }

    /// Exclusive scan with a CTA-prefix callback
    ///
    /// `prefix_op` receives the local aggregate exactly once; its return
    /// value is prepended to every output. The returned aggregate excludes
    /// the prefix.
    pub fn exclusive_scan_with_prefix<T, Op>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        identity: Option<T>,
        op: &Op,
        prefix_op: &mut dyn FnMut(T) -> T,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        self.scan_core(smem, items, identity, op, Some(prefix_op), false)
    }

    /// Inclusive scan over all items under `op`
    ///
    /// Well-defined for every position even without an identity.
    pub fn inclusive_scan<T, Op>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        identity: Option<T>,
        op: &Op,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        self.scan_core(smem, items, identity, op, None, true)
    }

    /// Inclusive scan with a CTA-prefix callback
    pub fn inclusive_scan_with_prefix<T, Op>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        identity: Option<T>,
        op: &Op,
        prefix_op: &mut dyn FnMut(T) -> T,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        self.scan_core(smem, items, identity, op, Some(prefix_op), true)
    }

    /// Exclusive prefix sum (addition with zero identity)
    pub fn exclusive_sum<T>(&self, smem: &mut SmemStorage<T>, items: &mut [T]) -> T
    where
        T: Copy + Zero,
    {
        self.scan_core(smem, items, Some(T::zero()), &|a, b| a + b, None, false)
    }

    /// Exclusive prefix sum with a CTA-prefix callback
    pub fn exclusive_sum_with_prefix<T>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        prefix_op: &mut dyn FnMut(T) -> T,
    ) -> T
    where
        T: Copy + Zero,
    {
        self.scan_core(
            smem,
            items,
            Some(T::zero()),
            &|a, b| a + b,
            Some(prefix_op),
            false,
        )
    }

    /// Inclusive prefix sum (addition with zero identity)
    pub fn inclusive_sum<T>(&self, smem: &mut SmemStorage<T>, items: &mut [T]) -> T
    where
        T: Copy + Zero,
    {
        self.scan_core(smem, items, Some(T::zero()), &|a, b| a + b, None, true)
    }

    /// Inclusive prefix sum with a CTA-prefix callback
    pub fn inclusive_sum_with_prefix<T>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        prefix_op: &mut dyn FnMut(T) -> T,
    ) -> T
    where
        T: Copy + Zero,
    {
        self.scan_core(
            smem,
            items,
            Some(T::zero()),
            &|a, b| a + b,
            Some(prefix_op),
            true,
        )
    }

    fn scan_core<T, Op>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        identity: Option<T>,
        op: &Op,
        prefix_op: Option<&mut dyn FnMut(T) -> T>,
        inclusive: bool,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        let cta = self.config.cta_threads();
        let k = self.config.items_per_thread();
        debug_assert_eq!(items.len(), cta * k);

        if self.config.warp_synchronous() {
            self.scan_warp_synchronous(smem, items, identity, op, prefix_op, inclusive)
        } else {
            self.scan_raking(smem, items, identity, op, prefix_op, inclusive)
        }
    }

    /// Whole-CTA-fits-one-warp path: zero raking-grid traffic
    fn scan_warp_synchronous<T, Op>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        identity: Option<T>,
        op: &Op,
        prefix_op: Option<&mut dyn FnMut(T) -> T>,
        inclusive: bool,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        let cta = self.config.cta_threads();
        let k = self.config.items_per_thread();

        for worker in 0..cta {
            smem.partials[worker] = thread::thread_reduce(&items[worker * k..(worker + 1) * k], op);
        }

        let local_aggregate =
            self.warp
                .exclusive_scan(&mut smem.warp, &mut smem.partials, identity, op);
        let base = prefix_op.map(|f| f(local_aggregate));

        for worker in 0..cta {
            let seed = if worker == 0 && identity.is_none() {
                base
            } else {
                let exclusive = smem.partials[worker];
                Some(base.map_or(exclusive, |b| op(b, exclusive)))
            };
            finalize_worker(&mut items[worker * k..(worker + 1) * k], seed, op, inclusive);
        }

        local_aggregate
    }

    /// Five-phase raking path
    fn scan_raking<T, Op>(
        &self,
        smem: &mut SmemStorage<T>,
        items: &mut [T],
        identity: Option<T>,
        op: &Op,
        prefix_op: Option<&mut dyn FnMut(T) -> T>,
        inclusive: bool,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        let cta = self.config.cta_threads();
        let k = self.config.items_per_thread();

        // Identity-free scans need every raking segment occupied; validated
        // configurations always satisfy this.
        debug_assert!(identity.is_some() || smem.grid.unguarded());

        // Phase 1: local reduce, deposit one partial per worker
        for worker in 0..cta {
            let partial = thread::thread_reduce(&items[worker * k..(worker + 1) * k], op);
            smem.grid.place(worker, partial);
        }

        // barrier: placements visible to the raking threads

        // Phase 2: each raking thread reduces its segment
        for rt in 0..self.config.raking_threads() {
            if let Some(partial) = smem.grid.rake_reduce(rt, op) {
                smem.raking[rt] = partial;
            } else if let Some(e) = identity {
                // Guarded layout: empty tail segments contribute the identity
                smem.raking[rt] = e;
            }
        }

        // Phase 3: warp scan of the raking partials; the prefix callback is
        // resolved here, at the point closest to the true aggregate
        let local_aggregate =
            self.warp
                .exclusive_scan(&mut smem.warp, &mut smem.raking, identity, op);
        let base = prefix_op.map(|f| f(local_aggregate));

        // Phase 4: each raking thread rescans its segment seeded by its
        // scanned partial
        for rt in 0..self.config.raking_threads() {
            let seed = if rt == 0 && identity.is_none() {
                base
            } else {
                let exclusive = smem.raking[rt];
                Some(base.map_or(exclusive, |b| op(b, exclusive)))
            };
            smem.grid.rake_scan_exclusive(rt, seed, op);
        }

        // barrier: rescanned prefixes visible to every worker

        // Phase 5: each worker reads back its exclusive CTA-wide prefix and
        // rescans its own items from it
        let worker0_seedless = identity.is_none() && base.is_none();
        for worker in 0..cta {
            let seed = if worker == 0 && worker0_seedless {
                None
            } else {
                Some(smem.grid.read_placement(worker))
            };
            finalize_worker(&mut items[worker * k..(worker + 1) * k], seed, op, inclusive);
        }

        local_aggregate
    }
}

/// Rescan one worker's items from its CTA-wide exclusive prefix
fn finalize_worker<T, Op>(chunk: &mut [T], seed: Option<T>, op: &Op, inclusive: bool)
where
    T: Copy,
    Op: Fn(T, T) -> T,
{
    if inclusive {
        thread::thread_scan_inclusive(chunk, seed, op);
    } else {
        thread::thread_scan_exclusive(chunk, seed, op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD: fn(u32, u32) -> u32 = |a, b| a + b;

    fn engine(cta: usize, warp: usize, raking: usize, k: usize) -> (CtaScan, SmemStorage<u32>) {
        let config = CtaConfig::new(cta, warp, raking, k).unwrap();
        let scan = CtaScan::new(config).unwrap();
        let smem = SmemStorage::new(&config);
        (scan, smem)
    }

    fn reference_exclusive(items: &[u32]) -> Vec<u32> {
        let mut out = Vec::with_capacity(items.len());
        let mut running = 0;
        for &x in items {
            out.push(running);
            running += x;
        }
        out
    }

    #[test]
    fn test_exclusive_sum_raking_path() {
        let (scan, mut smem) = engine(64, 16, 8, 1);
        let input: Vec<u32> = (0..64).map(|i| i * 3 + 1).collect();
        let mut items = input.clone();

        let aggregate = scan.exclusive_sum(&mut smem, &mut items);

        assert_eq!(items, reference_exclusive(&input));
        assert_eq!(aggregate, input.iter().sum::<u32>());
    }

    #[test]
    fn test_exclusive_sum_warp_synchronous_path() {
        let (scan, mut smem) = engine(16, 16, 16, 1);
        let input: Vec<u32> = (0..16).map(|i| i + 1).collect();
        let mut items = input.clone();

        let aggregate = scan.exclusive_sum(&mut smem, &mut items);

        assert_eq!(items, reference_exclusive(&input));
        assert_eq!(aggregate, input.iter().sum::<u32>());
    }

    #[test]
    fn test_paths_agree_bit_for_bit() {
        // Hash the lane index for irregular values, bounded so the 32-term
        // sum stays well inside u32.
        let input: Vec<u32> = (0u32..32)
            .map(|i| i.wrapping_mul(2_654_435_761) % 1000)
            .collect();

        let (raking, mut smem_a) = engine(32, 8, 4, 1);
        let mut a = input.clone();
        let agg_a = raking.exclusive_sum(&mut smem_a, &mut a);

        let (warp_sync, mut smem_b) = engine(32, 32, 32, 1);
        let mut b = input.clone();
        let agg_b = warp_sync.exclusive_sum(&mut smem_b, &mut b);

        assert_eq!(a, b);
        assert_eq!(agg_a, agg_b);
    }

    #[test]
    fn test_noncommutative_operator_preserves_lane_order() {
        // Shift-and-append is order sensitive, so any fold that combines
        // partials out of lane order produces a different word.
        let op = |a: u32, b: u32| a.wrapping_mul(16).wrapping_add(b);
        let input: Vec<u32> = (0..32).map(|i| i % 15 + 1).collect();

        let (scan, mut smem) = engine(32, 8, 4, 1);
        let mut items = input.clone();
        let aggregate = scan.exclusive_scan(&mut smem, &mut items, Some(0), &op);

        let mut running = 0u32;
        for (i, &x) in input.iter().enumerate() {
            assert_eq!(items[i], running, "lane {i}");
            running = op(running, x);
        }
        assert_eq!(aggregate, running);
    }

    #[test]
    fn test_inclusive_sum_is_shifted_exclusive() {
        let input: Vec<u32> = (0..64).map(|i| i % 7 + 1).collect();

        let (scan, mut smem) = engine(64, 16, 8, 1);
        let mut incl = input.clone();
        scan.inclusive_sum(&mut smem, &mut incl);
        let mut excl = input.clone();
        scan.exclusive_sum(&mut smem, &mut excl);

        for i in 0..63 {
            assert_eq!(incl[i], excl[i + 1]);
        }
        assert_eq!(excl[0], 0);
    }

    #[test]
    fn test_multiple_items_per_worker() {
        let (scan, mut smem) = engine(8, 8, 8, 4);
        let input: Vec<u32> = (0..32).collect();
        let mut items = input.clone();

        let aggregate = scan.exclusive_sum(&mut smem, &mut items);

        // Items are ordered worker-major, so the flat reference applies
        assert_eq!(items, reference_exclusive(&input));
        assert_eq!(aggregate, input.iter().sum::<u32>());
    }

    #[test]
    fn test_multiple_items_raking_path() {
        let (scan, mut smem) = engine(16, 8, 4, 2);
        let input: Vec<u32> = (0..32).map(|i| 31 - i).collect();
        let mut items = input.clone();

        scan.exclusive_sum(&mut smem, &mut items);
        assert_eq!(items, reference_exclusive(&input));
    }

    #[test]
    fn test_exclusive_scan_generic_operator() {
        let (scan, mut smem) = engine(16, 8, 4, 1);
        let mut items: Vec<u32> = vec![3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5, 8, 9, 7, 9, 3];
        let snapshot = items.clone();

        let aggregate = scan.exclusive_scan(&mut smem, &mut items, Some(0), &u32::max);

        let mut running = 0;
        for (i, &x) in snapshot.iter().enumerate() {
            assert_eq!(items[i], running);
            running = running.max(x);
        }
        assert_eq!(aggregate, 9);
    }

    #[test]
    fn test_inclusive_scan_no_identity() {
        let (scan, mut smem) = engine(16, 8, 4, 1);
        let input: Vec<u32> = (1..=16).collect();
        let mut items = input.clone();

        let aggregate = scan.inclusive_scan(&mut smem, &mut items, None, &ADD);

        let mut running = 0;
        for (i, &x) in input.iter().enumerate() {
            running += x;
            assert_eq!(items[i], running);
        }
        assert_eq!(aggregate, 136);
    }

    #[test]
    fn test_exclusive_scan_no_identity_worker0_unread() {
        let (scan, mut smem) = engine(16, 8, 4, 1);
        let input: Vec<u32> = (1..=16).collect();
        let mut items = input.clone();

        let aggregate = scan.exclusive_scan(&mut smem, &mut items, None, &ADD);

        // Position 0 is unspecified; everything else matches the fold
        let reference = reference_exclusive(&input);
        assert_eq!(&items[1..], &reference[1..]);
        assert_eq!(aggregate, 136);
    }

    #[test]
    fn test_prefix_callback_invoked_once_with_local_aggregate() {
        let (scan, mut smem) = engine(64, 16, 8, 1);
        let input: Vec<u32> = vec![1; 64];
        let mut items = input.clone();

        let mut calls = 0;
        let mut seen = 0;
        let mut prefix_op = |aggregate: u32| {
            calls += 1;
            seen = aggregate;
            1000
        };

        let aggregate = scan.exclusive_sum_with_prefix(&mut smem, &mut items, &mut prefix_op);

        assert_eq!(calls, 1);
        assert_eq!(seen, 64);
        // Aggregate excludes the prefix; outputs include it
        assert_eq!(aggregate, 64);
        assert_eq!(items[0], 1000);
        assert_eq!(items[63], 1000 + 63);
    }

    #[test]
    fn test_prefix_callback_warp_synchronous_path() {
        let (scan, mut smem) = engine(16, 16, 16, 1);
        let mut items: Vec<u32> = vec![2; 16];

        let mut calls = 0;
        let mut prefix_op = |aggregate: u32| {
            calls += 1;
            aggregate * 10
        };

        let aggregate = scan.inclusive_sum_with_prefix(&mut smem, &mut items, &mut prefix_op);

        assert_eq!(calls, 1);
        assert_eq!(aggregate, 32);
        assert_eq!(items[0], 320 + 2);
        assert_eq!(items[15], 320 + 32);
    }

    #[test]
    fn test_prefix_callback_carries_state_across_calls() {
        // The running-carry pattern the spine scan is built on
        let (scan, mut smem) = engine(16, 16, 16, 1);
        let mut carry = 0u32;

        for tile in 0..3 {
            let mut items: Vec<u32> = vec![1; 16];
            let mut prefix_op = |aggregate: u32| {
                let base = carry;
                carry += aggregate;
                base
            };
            scan.exclusive_sum_with_prefix(&mut smem, &mut items, &mut prefix_op);
            assert_eq!(items[0], tile * 16);
        }
        assert_eq!(carry, 48);
    }

    #[test]
    fn test_smem_reuse_across_calls() {
        let (scan, mut smem) = engine(64, 16, 8, 1);

        let mut first: Vec<u32> = (0..64).collect();
        scan.exclusive_sum(&mut smem, &mut first);

        let input: Vec<u32> = (0..64).rev().collect();
        let mut second = input.clone();
        let aggregate = scan.exclusive_sum(&mut smem, &mut second);

        assert_eq!(second, reference_exclusive(&input));
        assert_eq!(aggregate, input.iter().sum::<u32>());
    }

    #[test]
    fn test_single_worker_cta() {
        let (scan, mut smem) = engine(1, 1, 1, 4);
        let mut items = vec![1u32, 2, 3, 4];

        let aggregate = scan.exclusive_sum(&mut smem, &mut items);
        assert_eq!(items, vec![0, 1, 3, 6]);
        assert_eq!(aggregate, 10);
    }
}
