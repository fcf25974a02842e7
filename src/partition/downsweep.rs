//! Downsweep: stable scatter of kept elements to per-bin output ranges
//!
//! Each CTA re-walks its element chunk in order, consults the cached bin
//! tags, and scatters kept elements to `spine[bin * grid_size + cta] +
//! local_rank`. Within a bin the output order is (CTA, chunk position),
//! i.e. the original order, so the partition is stable.

use super::{cta_chunk, Spine, INVALID_BIN};
use crate::config::PartitionConfig;
use bytemuck::Zeroable;

pub(crate) fn downsweep<E>(
    config: &PartitionConfig,
    elements: &[E],
    tags: &[u32],
    spine: &Spine,
    out: &mut Vec<E>,
) where
    E: Copy + Zeroable,
{
    debug_assert_eq!(tags.len(), elements.len());

    let grid = config.grid_size();
    let bins = config.bins();
    let total = spine.total() as usize;

    out.clear();
    out.resize(total, E::zeroed());

    let offsets = spine.counts();
    for cta in 0..grid {
        let (start, end) = cta_chunk(elements.len(), grid, cta);

        // This CTA's exclusive base offset per bin
        let mut cursors: Vec<u32> = (0..bins).map(|bin| offsets[bin * grid + cta]).collect();

        for index in start..end {
            let bin = tags[index];
            if bin == INVALID_BIN {
                continue;
            }
            let dest = cursors[bin as usize];
            cursors[bin as usize] += 1;
            out[dest as usize] = elements[index];
        }
    }
}
