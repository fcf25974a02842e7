//! Frontier expand kernel.
//!
//! Consumes candidate (vertex, predecessor) pairs routed to this device,
//! labels each first-seen vertex, and emits its neighbors into the
//! opposite frontier queue. Duplicate candidates are dropped here rather
//! than deduplicated upstream: the first discovery wins and later ones see
//! a non-[`UNVISITED`] label.

use crate::bfs::problem::{FrontierElem, GpuSlice, VertexId, UNVISITED};
use crate::device::{DeviceError, WorkProgress};

/// Input to one expand pass.
pub(crate) enum ExpandInput<'a> {
    /// Seed the search: the source vertex with no predecessor.
    Source(VertexId),
    /// Candidates routed here by the exchange step.
    Elements(&'a [FrontierElem]),
}

/// What one expand pass produced.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExpandOutcome {
    /// Neighbors emitted into the outgoing queue.
    pub emitted: u32,
    /// Vertices labeled for the first time this pass.
    pub labeled: u32,
}

/// Expands `input` on `slice`, writing emissions into
/// `frontiers[out_selector]` and recording the emitted count under
/// `epoch` in `progress`.
///
/// Every candidate must be owned by this slice; the exchange step routes
/// by owner, so a foreign vertex here is a routing bug surfaced as
/// [`DeviceError::NotOwned`].
pub(crate) fn expand(
    slice: &mut GpuSlice,
    input: ExpandInput<'_>,
    iteration: i32,
    out_selector: usize,
    epoch: usize,
    progress: &mut WorkProgress,
) -> Result<ExpandOutcome, DeviceError> {
    slice.frontiers[out_selector].clear();
    let mut outcome = ExpandOutcome::default();

    match input {
        ExpandInput::Source(vertex) => {
            visit(slice, vertex, UNVISITED, iteration, out_selector, &mut outcome)?;
        }
        ExpandInput::Elements(elems) => {
            for elem in elems {
                let pred = i32::try_from(elem.pred).unwrap_or(UNVISITED);
                visit(slice, elem.vertex, pred, iteration, out_selector, &mut outcome)?;
            }
        }
    }

    progress.add(epoch, outcome.emitted);
    Ok(outcome)
}

fn visit(
    slice: &mut GpuSlice,
    vertex: VertexId,
    pred: i32,
    iteration: i32,
    out_selector: usize,
    outcome: &mut ExpandOutcome,
) -> Result<(), DeviceError> {
    if !slice.owns(vertex) {
        return Err(DeviceError::NotOwned {
            device: slice.device,
            vertex,
        });
    }
    let local = (vertex - slice.first_vertex) as usize;
    if slice.distances[local] != UNVISITED {
        return Ok(());
    }
    slice.distances[local] = iteration;
    slice.parents[local] = pred;
    outcome.labeled += 1;

    let start = slice.row_offsets[local] as usize;
    let end = slice.row_offsets[local + 1] as usize;
    for i in start..end {
        if slice.frontiers[out_selector].len() >= slice.queue_capacity {
            return Err(DeviceError::QueueOverflow {
                device: slice.device,
                capacity: slice.queue_capacity,
            });
        }
        let neighbor = slice.col_indices[i];
        slice.frontiers[out_selector].push(FrontierElem {
            vertex: neighbor,
            pred: vertex,
        });
        outcome.emitted += 1;
    }
    Ok(())
}
