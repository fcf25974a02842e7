//! Upsweep: per-(CTA, bin) histogram of kept elements
//!
//! Each CTA walks its contiguous element chunk, classifies every element
//! exactly once, caches the decision in the bin-tag array, and accumulates
//! kept counts into its own spine slots at `bin * grid_size + cta`.

use super::{cta_chunk, Spine, INVALID_BIN};
use crate::config::PartitionConfig;

pub(crate) fn upsweep<E, F>(
    config: &PartitionConfig,
    elements: &[E],
    mut classify: F,
    tags: &mut Vec<u32>,
    spine: &mut Spine,
) where
    E: Copy,
    F: FnMut(&E) -> Option<u32>,
{
    let grid = config.grid_size();
    let bins = config.bins();

    tags.clear();
    tags.resize(elements.len(), INVALID_BIN);
    spine.reset();

    let counts = spine.counts_mut();
    for cta in 0..grid {
        let (start, end) = cta_chunk(elements.len(), grid, cta);
        for (index, element) in elements[start..end].iter().enumerate() {
            if let Some(bin) = classify(element) {
                debug_assert!((bin as usize) < bins);
                tags[start + index] = bin;
                counts[bin as usize * grid + cta] += 1;
            }
        }
    }
}
