//! Three-phase partition/compact pipeline (Upsweep → Spine-scan → Downsweep)
//!
//! Given elements annotated by a classifier (keep/discard plus a bin
//! assignment), the pipeline computes a globally consistent write offset for
//! every (CTA, bin) pair and scatters kept elements into contiguous per-bin
//! regions of the output, so the partition is stable.
//!
//! - **Upsweep**: each CTA counts its kept elements per bin into the spine
//!   at `bin * grid_size + cta`. The classifier is evaluated once per
//!   element here and the decision cached in a bin-tag array, so the two
//!   sweeps can never disagree.
//! - **Spine-scan**: one exclusive prefix sum over the whole spine, run
//!   through the [`CtaScan`] engine in tiles with a running carry injected
//!   via the CTA-prefix callback. Afterwards the spine's last slot holds the
//!   total compacted count; the only place that total is recorded.
//! - **Downsweep**: each CTA re-walks its chunk in order and scatters kept
//!   elements to `spine[bin * grid_size + cta] + local_rank`.
//!
//! CTAs own disjoint spine slices and disjoint element chunks, so
//! correctness never depends on CTA completion order.

mod downsweep;
mod spine;
mod upsweep;

use crate::config::{ConfigError, PartitionConfig};
use crate::scan::{CtaScan, SmemStorage};
use bytemuck::Zeroable;
use tracing::debug;

/// Bin tag recorded for discarded elements
pub const INVALID_BIN: u32 = u32::MAX;

/// Per-(CTA, bin) partial counts, exclusive-scanned in place into global
/// scatter offsets
///
/// Length is `grid_size * bins + 1`; after the spine scan, slot `i` holds
/// the exclusive offset of (CTA, bin) pair `i` and the final slot holds the
/// total compacted count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spine {
    counts: Vec<u32>,
}

impl Spine {
    /// Allocate a zeroed spine for `config`
    #[must_use]
    pub fn new(config: &PartitionConfig) -> Self {
        Self {
            counts: vec![0; config.spine_elements()],
        }
    }

    /// Zero all slots
    pub fn reset(&mut self) {
        self.counts.fill(0);
    }

    /// Number of slots (including the total slot)
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the spine has no slots (never true for a valid config)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total compacted count, valid after the spine scan
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts[self.counts.len() - 1]
    }

    /// Raw slot view
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.counts
    }

    /// Offset range `[start, end)` covering bins `[start_bin, end_bin)`
    /// across all CTAs, valid after the spine scan
    ///
    /// This is how a peer's compacted queue is carved into per-destination
    /// sub-ranges during the cross-device exchange.
    #[must_use]
    pub fn bin_group_range(&self, grid_size: usize, start_bin: usize, end_bin: usize) -> (u32, u32) {
        let start = self.counts[start_bin * grid_size];
        let end = self.counts[end_bin * grid_size];
        (start, end)
    }

    pub(crate) fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub(crate) fn counts_mut(&mut self) -> &mut [u32] {
        &mut self.counts
    }
}

/// The three-phase partition/compact pipeline
#[derive(Debug, Clone, Copy)]
pub struct PartitionPipeline {
    config: PartitionConfig,
    scan: CtaScan,
}

impl PartitionPipeline {
    /// Build a pipeline for `config`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded CTA configuration cannot
    /// drive the spine scan.
    pub fn new(config: PartitionConfig) -> Result<Self, ConfigError> {
        let scan = CtaScan::new(config.cta())?;
        Ok(Self { config, scan })
    }

    /// The pipeline's configuration
    #[must_use]
    pub const fn config(&self) -> PartitionConfig {
        self.config
    }

    /// Upsweep: classify every element once and count kept elements per
    /// (CTA, bin) pair into the spine
    ///
    /// `tags` is resized to `elements.len()`; discarded elements get
    /// [`INVALID_BIN`].
    pub fn upsweep<E, F>(
        &self,
        elements: &[E],
        classify: F,
        tags: &mut Vec<u32>,
        spine: &mut Spine,
    ) where
        E: Copy,
        F: FnMut(&E) -> Option<u32>,
    {
        upsweep::upsweep(&self.config, elements, classify, tags, spine);
    }

    /// Spine-scan: exclusive prefix sum over the whole spine via the CTA
    /// scan engine
    pub fn spine_scan(&self, smem: &mut SmemStorage<u32>, spine: &mut Spine) {
        spine::spine_scan(&self.scan, smem, spine);
    }

    /// Downsweep: scatter kept elements to their bins' contiguous output
    /// ranges, preserving relative order within each bin
    pub fn downsweep<E>(&self, elements: &[E], tags: &[u32], spine: &Spine, out: &mut Vec<E>)
    where
        E: Copy + Zeroable,
    {
        downsweep::downsweep(&self.config, elements, tags, spine, out);
    }

    /// Run all three phases; returns the total compacted count
    pub fn partition<E, F>(
        &self,
        smem: &mut SmemStorage<u32>,
        elements: &[E],
        classify: F,
        tags: &mut Vec<u32>,
        spine: &mut Spine,
        out: &mut Vec<E>,
    ) -> u32
    where
        E: Copy + Zeroable,
        F: FnMut(&E) -> Option<u32>,
    {
        self.upsweep(elements, classify, tags, spine);
        self.spine_scan(smem, spine);
        self.downsweep(elements, tags, spine, out);

        let total = spine.total();
        debug!(
            elements = elements.len(),
            compacted = total,
            "partition pass complete"
        );
        total
    }
}

/// Element chunk owned by one CTA
pub(crate) fn cta_chunk(num_elements: usize, grid_size: usize, cta: usize) -> (usize, usize) {
    let chunk = num_elements.div_ceil(grid_size);
    let start = (cta * chunk).min(num_elements);
    let end = (start + chunk).min(num_elements);
    (start, end)
}
