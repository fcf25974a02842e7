//! The BFS enactor: a host-side state machine that drives the search.
//!
//! One search iteration runs four stages:
//!
//! 1. check the recorded frontier sizes; done when every device drained
//! 2. partition-compact each device's frontier by owning device
//! 3. exchange per-destination sub-ranges between devices
//! 4. expand the routed candidates into the opposite queues
//!
//! Device work runs as one blocking task per device per stage; awaiting
//! all tasks is the inter-stage barrier. No stage ever reads a buffer
//! another in-flight task may write.

use anyhow::{ensure, Context, Result};
use tokio::task;

use crate::bfs::expand::{expand, ExpandInput};
use crate::bfs::problem::{CsrProblem, FrontierElem, GpuSlice, VertexId, UNVISITED};
use crate::config::{ConfigError, CtaConfig, PartitionConfig};
use crate::device::{DeviceError, DeviceId, WorkProgress};
use crate::partition::{PartitionPipeline, Spine};
use crate::scan::SmemStorage;

/// Aggregate counters for one completed search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BfsStatistics {
    /// Total frontier elements emitted across all devices and iterations.
    pub total_queued: u64,
    /// Largest distance label assigned, or [`UNVISITED`] if nothing ran.
    pub search_depth: i32,
    /// Mean live queue length per device per iteration.
    pub avg_live: f64,
}

/// Per-device search state owned by the enactor.
///
/// Frontier queues live with the problem slice; everything the stages
/// need besides the queues (spine, scan scratch, progress counters,
/// cursors) lives here, so one device's stage task gets exactly one
/// control block and one slice and shares nothing.
#[derive(Debug)]
pub struct GpuControlBlock {
    device: DeviceId,
    iteration: i32,
    selector: usize,
    queue_index: usize,
    queue_length: u32,
    spine: Spine,
    smem: SmemStorage<u32>,
    tags: Vec<u32>,
    progress: WorkProgress,
    total_queued: u64,
    search_depth: i32,
}

impl GpuControlBlock {
    fn new(device: DeviceId, config: &PartitionConfig) -> Self {
        Self {
            device,
            iteration: 0,
            selector: 0,
            queue_index: 0,
            queue_length: 0,
            spine: Spine::new(config),
            smem: SmemStorage::new(&config.cta()),
            tags: Vec::new(),
            progress: WorkProgress::new(),
            total_queued: 0,
            search_depth: UNVISITED,
        }
    }

    fn reset_counters(&mut self) {
        self.iteration = 0;
        self.selector = 0;
        self.queue_index = 0;
        self.queue_length = 0;
        self.spine.reset();
        self.progress.reset();
        self.tags.clear();
        self.total_queued = 0;
        self.search_depth = UNVISITED;
    }

    /// Device this block belongs to.
    #[must_use]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// This device's spine. Stable across repeated [`BfsEnactor::setup`]
    /// calls with an unchanged device count.
    #[must_use]
    pub fn spine(&self) -> &Spine {
        &self.spine
    }
}

/// Drives breadth-first searches over a [`CsrProblem`].
///
/// Reusable across searches and across problems: [`BfsEnactor::setup`]
/// only reallocates per-device state when the device count changes.
#[derive(Debug)]
pub struct BfsEnactor {
    cta: CtaConfig,
    grid_size: usize,
    pipeline: Option<PartitionPipeline>,
    blocks: Vec<GpuControlBlock>,
    live_total: u64,
    live_samples: u64,
}

impl BfsEnactor {
    /// An enactor with the default CTA configuration and a 4-CTA grid.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CtaConfig::default(), 4)
    }

    /// An enactor with explicit scan and grid tuning.
    #[must_use]
    pub fn with_config(cta: CtaConfig, grid_size: usize) -> Self {
        Self {
            cta,
            grid_size,
            pipeline: None,
            blocks: Vec::new(),
            live_total: 0,
            live_samples: 0,
        }
    }

    /// Allocates (or re-validates) per-device state for `num_devices`.
    ///
    /// Idempotent: when the device count is unchanged, existing spines,
    /// scratch, and queues are reset in place rather than reallocated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadDeviceCount`] unless `num_devices` is a
    /// power of two, or a configuration error if the partition pipeline
    /// cannot be built for it.
    pub fn setup(&mut self, num_devices: usize) -> Result<(), ConfigError> {
        if num_devices == 0 || !num_devices.is_power_of_two() {
            return Err(ConfigError::BadDeviceCount(num_devices));
        }
        let rebuild = self.blocks.len() != num_devices
            || !self
                .pipeline
                .is_some_and(|p| p.config().bins() == num_devices);
        if rebuild {
            let config = PartitionConfig::new(self.grid_size, num_devices, self.cta)?;
            self.pipeline = Some(PartitionPipeline::new(config)?);
            self.blocks = (0..num_devices)
                .map(|d| GpuControlBlock::new(d, &config))
                .collect();
            tracing::debug!(num_devices, "allocated per-device control blocks");
        } else {
            for block in &mut self.blocks {
                block.reset_counters();
            }
        }
        Ok(())
    }

    /// Runs one search from `src`, labeling distances and parents in
    /// `problem`.
    ///
    /// # Errors
    ///
    /// Fails on an out-of-range source, a queue overflow, or a misrouted
    /// vertex. Per-device state is handed back to `problem` before the
    /// error propagates, so the labels are partial but the problem stays
    /// usable; call [`CsrProblem::reset`] before searching again.
    pub async fn enact(&mut self, problem: &mut CsrProblem, src: VertexId) -> Result<()> {
        ensure!(
            (src as usize) < problem.num_nodes(),
            "source vertex {src} out of range ({} nodes)",
            problem.num_nodes()
        );
        let num_devices = problem.num_devices();
        self.setup(num_devices)?;
        self.live_total = 0;
        self.live_samples = 0;

        let pipeline = self
            .pipeline
            .context("setup left no partition pipeline")?;
        let grid_size = pipeline.config().grid_size();
        let bins_per_device = pipeline.config().bins() / num_devices;
        let nodes_per_device = problem.nodes_per_device();
        let src_owner = problem.owner(src);
        tracing::info!(src, num_devices, "starting search");

        let mut blocks = std::mem::take(&mut self.blocks);
        let mut slices = problem.take_slices();

        // Seed: only the owner expands the source; the rest run an empty
        // pass so every device's epoch counters stay aligned.
        let mut handles = Vec::with_capacity(num_devices);
        for (mut block, mut slice) in blocks.drain(..).zip(slices.drain(..)) {
            let seed = (block.device == src_owner).then_some(src);
            handles.push(task::spawn_blocking(move || {
                let input = match seed {
                    Some(v) => ExpandInput::Source(v),
                    None => ExpandInput::Elements(&[]),
                };
                let result = expand(
                    &mut slice,
                    input,
                    block.iteration,
                    block.selector ^ 1,
                    block.queue_index + 1,
                    &mut block.progress,
                );
                if let Ok(outcome) = &result {
                    if outcome.labeled > 0 {
                        block.search_depth = block.iteration;
                    }
                    block.total_queued += u64::from(outcome.emitted);
                    block.selector ^= 1;
                    block.iteration += 1;
                    block.queue_index += 1;
                }
                (block, slice, result)
            }));
        }
        let mut failure: Option<DeviceError> = None;
        for handle in handles {
            let (block, slice, result) =
                handle.await.context("seed expand task failed")?;
            if let Err(err) = result {
                failure.get_or_insert(err);
            }
            blocks.push(block);
            slices.push(slice);
        }
        if let Some(err) = failure {
            self.blocks = blocks;
            problem.restore_slices(slices);
            return Err(err.into());
        }

        loop {
            // Drain check: read each device's recorded frontier size.
            let mut live = 0u64;
            for block in &mut blocks {
                block.queue_length = block.progress.get(block.queue_index);
                live += u64::from(block.queue_length);
            }
            self.live_total += live;
            self.live_samples += blocks.len() as u64;
            if live == 0 {
                break;
            }
            tracing::debug!(
                iteration = blocks[0].iteration,
                live,
                "frontier still live"
            );

            // Partition-compact each device's frontier by owner, dropping
            // candidates this device already labeled.
            let mut handles = Vec::with_capacity(num_devices);
            for (mut block, mut slice) in blocks.drain(..).zip(slices.drain(..)) {
                handles.push(task::spawn_blocking(move || {
                    let qlen = (block.queue_length as usize)
                        .min(slice.frontiers[block.selector].len());
                    let device = block.device;
                    let GpuSlice {
                        frontiers,
                        distances,
                        first_vertex,
                        ..
                    } = &mut slice;
                    let first = *first_vertex;
                    let (lo, hi) = frontiers.split_at_mut(1);
                    let (current, opposite) = if block.selector == 0 {
                        (&mut lo[0], &mut hi[0])
                    } else {
                        (&mut hi[0], &mut lo[0])
                    };
                    let classify = |e: &FrontierElem| {
                        let owner = e.vertex as usize / nodes_per_device;
                        if owner == device {
                            let local = (e.vertex - first) as usize;
                            if distances[local] != UNVISITED {
                                return None;
                            }
                        }
                        Some((owner * bins_per_device) as u32)
                    };
                    let total = pipeline.partition(
                        &mut block.smem,
                        &current[..qlen],
                        classify,
                        &mut block.tags,
                        &mut block.spine,
                        opposite,
                    );
                    block.queue_length = total;
                    block.selector ^= 1;
                    (block, slice)
                }));
            }
            for handle in handles {
                let (block, slice) = handle.await.context("compact task failed")?;
                blocks.push(block);
                slices.push(slice);
            }

            if blocks.iter().all(|b| b.queue_length == 0) {
                break;
            }

            // Exchange: carve every device's compacted queue into
            // per-destination sub-ranges and deliver them. Spines are
            // scanned, so a destination's range is one slice lookup.
            let mut incoming: Vec<Vec<FrontierElem>> =
                (0..num_devices).map(|_| Vec::new()).collect();
            for (block, slice) in blocks.iter().zip(&slices) {
                let queue = &slice.frontiers[block.selector];
                for (dst, inbox) in incoming.iter_mut().enumerate() {
                    let (start, end) = block.spine.bin_group_range(
                        grid_size,
                        dst * bins_per_device,
                        (dst + 1) * bins_per_device,
                    );
                    inbox.extend_from_slice(&queue[start as usize..end as usize]);
                }
            }

            // Expand the routed candidates.
            let mut handles = Vec::with_capacity(num_devices);
            for ((mut block, mut slice), inbox) in
                blocks.drain(..).zip(slices.drain(..)).zip(incoming)
            {
                handles.push(task::spawn_blocking(move || {
                    let result = expand(
                        &mut slice,
                        ExpandInput::Elements(&inbox),
                        block.iteration,
                        block.selector ^ 1,
                        block.queue_index + 1,
                        &mut block.progress,
                    );
                    if let Ok(outcome) = &result {
                        if outcome.labeled > 0 {
                            block.search_depth = block.iteration;
                        }
                        block.total_queued += u64::from(outcome.emitted);
                        block.selector ^= 1;
                        block.iteration += 1;
                        block.queue_index += 1;
                    }
                    (block, slice, result)
                }));
            }
            let mut failure: Option<DeviceError> = None;
            for handle in handles {
                let (block, slice, result) =
                    handle.await.context("expand task failed")?;
                if let Err(err) = result {
                    failure.get_or_insert(err);
                }
                blocks.push(block);
                slices.push(slice);
            }
            if let Some(err) = failure {
                self.blocks = blocks;
                problem.restore_slices(slices);
                return Err(err.into());
            }
        }

        self.blocks = blocks;
        problem.restore_slices(slices);
        let stats = self.statistics();
        tracing::info!(
            total_queued = stats.total_queued,
            search_depth = stats.search_depth,
            "search complete"
        );
        Ok(())
    }

    /// Counters for the most recent search.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn statistics(&self) -> BfsStatistics {
        BfsStatistics {
            total_queued: self.blocks.iter().map(|b| b.total_queued).sum(),
            search_depth: self
                .blocks
                .iter()
                .map(|b| b.search_depth)
                .max()
                .unwrap_or(UNVISITED),
            avg_live: if self.live_samples == 0 {
                0.0
            } else {
                self.live_total as f64 / self.live_samples as f64
            },
        }
    }

    /// Per-device control blocks, in device order. Empty before the first
    /// [`BfsEnactor::setup`].
    #[must_use]
    pub fn control_blocks(&self) -> &[GpuControlBlock] {
        &self.blocks
    }
}

impl Default for BfsEnactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bfs::problem::Csr;

    fn undirected(num_nodes: usize, edges: &[(u32, u32)]) -> Csr {
        let mut both = Vec::with_capacity(edges.len() * 2);
        for &(a, b) in edges {
            both.push((a, b));
            both.push((b, a));
        }
        Csr::from_edges(num_nodes, &both)
    }

    #[tokio::test]
    async fn path_graph_distances_single_device() {
        let csr = undirected(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let mut problem = CsrProblem::new(&csr, 1).unwrap();
        let mut enactor = BfsEnactor::new();
        enactor.enact(&mut problem, 0).await.unwrap();
        assert_eq!(problem.distances(), vec![0, 1, 2, 3, 4]);
        assert_eq!(problem.parents(), vec![UNVISITED, 0, 1, 2, 3]);
        assert_eq!(enactor.statistics().search_depth, 4);
    }

    #[tokio::test]
    async fn disconnected_component_stays_unvisited() {
        let csr = undirected(4, &[(0, 1)]);
        let mut problem = CsrProblem::new(&csr, 1).unwrap();
        let mut enactor = BfsEnactor::new();
        enactor.enact(&mut problem, 0).await.unwrap();
        assert_eq!(problem.distances(), vec![0, 1, UNVISITED, UNVISITED]);
    }

    #[tokio::test]
    async fn four_cycle_across_two_devices() {
        // 0-1-2-3-0; devices own {0,1} and {2,3}.
        let csr = undirected(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let mut problem = CsrProblem::new(&csr, 2).unwrap();
        let mut enactor = BfsEnactor::new();
        enactor.enact(&mut problem, 0).await.unwrap();
        assert_eq!(problem.distances(), vec![0, 1, 2, 1]);
        assert_eq!(enactor.statistics().search_depth, 2);
    }

    #[tokio::test]
    async fn failed_search_hands_state_back_to_problem() {
        let csr = undirected(4, &[(0, 1), (1, 2), (2, 3)]);
        let mut problem = CsrProblem::new(&csr, 1).unwrap();

        // Shrink the device's queue so the seed expansion overflows.
        let mut slices = problem.take_slices();
        slices[0].queue_capacity = 0;
        problem.restore_slices(slices);

        let mut enactor = BfsEnactor::new();
        assert!(enactor.enact(&mut problem, 0).await.is_err());

        // The per-device state was returned with the error, so the labels
        // are readable and a reset readies the problem for another search.
        assert_eq!(problem.distances().len(), 4);
        problem.reset();
        assert!(problem.distances().iter().all(|&d| d == UNVISITED));
    }

    #[tokio::test]
    async fn setup_is_idempotent_for_unchanged_device_count() {
        let mut enactor = BfsEnactor::new();
        enactor.setup(2).unwrap();
        let before = enactor.control_blocks()[0].spine().as_slice().as_ptr();
        enactor.setup(2).unwrap();
        let after = enactor.control_blocks()[0].spine().as_slice().as_ptr();
        assert_eq!(before, after, "unchanged device count must not reallocate");
        enactor.setup(4).unwrap();
        assert_eq!(enactor.control_blocks().len(), 4);
    }

    #[tokio::test]
    async fn source_out_of_range_is_rejected() {
        let csr = undirected(2, &[(0, 1)]);
        let mut problem = CsrProblem::new(&csr, 1).unwrap();
        let mut enactor = BfsEnactor::new();
        assert!(enactor.enact(&mut problem, 7).await.is_err());
    }

    #[test]
    fn setup_rejects_non_power_of_two() {
        let mut enactor = BfsEnactor::new();
        assert!(matches!(
            enactor.setup(6),
            Err(ConfigError::BadDeviceCount(6))
        ));
    }
}
