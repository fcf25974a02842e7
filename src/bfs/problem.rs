//! BFS problem storage: the CSR graph and its per-device slices.

use bytemuck::{Pod, Zeroable};

use crate::config::ConfigError;
use crate::device::DeviceId;

/// Vertex identifier within a graph.
pub type VertexId = u32;

/// Distance label for a vertex no search has reached.
pub const UNVISITED: i32 = -1;

/// A graph in compressed sparse row form.
///
/// `row_offsets` has one entry per vertex plus a terminator equal to the
/// edge count; the neighbors of vertex `v` are
/// `col_indices[row_offsets[v]..row_offsets[v + 1]]`.
#[derive(Debug, Clone)]
pub struct Csr {
    row_offsets: Vec<u32>,
    col_indices: Vec<u32>,
}

impl Csr {
    /// Builds a CSR graph from raw arrays.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedCsr`] if `row_offsets` is empty,
    /// not monotonically non-decreasing, or its terminator disagrees with
    /// the edge count.
    pub fn new(row_offsets: Vec<u32>, col_indices: Vec<u32>) -> Result<Self, ConfigError> {
        if row_offsets.is_empty()
            || row_offsets.windows(2).any(|w| w[0] > w[1])
            || *row_offsets.last().unwrap_or(&0) as usize != col_indices.len()
        {
            return Err(ConfigError::MalformedCsr);
        }
        Ok(Self {
            row_offsets,
            col_indices,
        })
    }

    /// Builds a directed CSR graph from an edge list.
    ///
    /// Edges keep their input order within each source vertex's adjacency
    /// range. Vertices named by `num_nodes` but absent from `edges` get
    /// empty ranges.
    #[must_use]
    pub fn from_edges(num_nodes: usize, edges: &[(VertexId, VertexId)]) -> Self {
        let mut row_offsets = vec![0u32; num_nodes + 1];
        for &(src, _) in edges {
            row_offsets[src as usize + 1] += 1;
        }
        for v in 0..num_nodes {
            row_offsets[v + 1] += row_offsets[v];
        }
        let mut cursor = row_offsets.clone();
        let mut col_indices = vec![0u32; edges.len()];
        for &(src, dst) in edges {
            col_indices[cursor[src as usize] as usize] = dst;
            cursor[src as usize] += 1;
        }
        Self {
            row_offsets,
            col_indices,
        }
    }

    /// Number of vertices.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Number of directed edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.col_indices.len()
    }
}

/// One frontier queue entry: a candidate vertex and the vertex that
/// discovered it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FrontierElem {
    /// Candidate vertex, not yet known to be unvisited.
    pub vertex: VertexId,
    /// Discovering vertex, recorded as the parent on first discovery.
    pub pred: VertexId,
}

/// Per-device share of the problem: the owned vertex range, its local
/// CSR rows, label arrays, and the ping/pong frontier queue pair.
#[derive(Debug)]
pub struct GpuSlice {
    pub(crate) device: DeviceId,
    pub(crate) first_vertex: VertexId,
    pub(crate) row_offsets: Vec<u32>,
    pub(crate) col_indices: Vec<u32>,
    pub(crate) distances: Vec<i32>,
    pub(crate) parents: Vec<i32>,
    pub(crate) frontiers: [Vec<FrontierElem>; 2],
    pub(crate) queue_capacity: usize,
}

impl GpuSlice {
    fn new(device: DeviceId, first_vertex: VertexId, csr: &Csr, num_owned: usize) -> Self {
        let first = first_vertex as usize;
        let base = csr.row_offsets[first];
        let row_offsets: Vec<u32> = csr.row_offsets[first..=first + num_owned]
            .iter()
            .map(|&o| o - base)
            .collect();
        let edge_end = csr.row_offsets[first + num_owned] as usize;
        let col_indices = csr.col_indices[base as usize..edge_end].to_vec();
        // Every emission is a local edge, so the local edge count bounds
        // both queues; +1 keeps a zero-edge slice usable.
        let queue_capacity = col_indices.len() + 1;
        Self {
            device,
            first_vertex,
            row_offsets,
            col_indices,
            distances: vec![UNVISITED; num_owned],
            parents: vec![UNVISITED; num_owned],
            frontiers: [
                Vec::with_capacity(queue_capacity),
                Vec::with_capacity(queue_capacity),
            ],
            queue_capacity,
        }
    }

    /// Device that owns this slice.
    #[must_use]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Number of vertices owned by this slice.
    #[must_use]
    pub fn num_owned(&self) -> usize {
        self.distances.len()
    }

    /// Whether `vertex` falls in this slice's owned range.
    #[must_use]
    pub fn owns(&self, vertex: VertexId) -> bool {
        vertex >= self.first_vertex
            && ((vertex - self.first_vertex) as usize) < self.num_owned()
    }

    fn reset(&mut self) {
        self.distances.fill(UNVISITED);
        self.parents.fill(UNVISITED);
        self.frontiers[0].clear();
        self.frontiers[1].clear();
    }
}

/// A CSR graph sliced across a power-of-two number of devices.
///
/// Vertex ownership is blocked: device `d` owns the contiguous range
/// starting at `d * nodes_per_device`, so routing a vertex to its owner is
/// a single division.
#[derive(Debug)]
pub struct CsrProblem {
    num_nodes: usize,
    nodes_per_device: usize,
    slices: Vec<GpuSlice>,
}

impl CsrProblem {
    /// Slices `csr` across `num_devices` devices.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadDeviceCount`] unless `num_devices` is a
    /// power of two.
    pub fn new(csr: &Csr, num_devices: usize) -> Result<Self, ConfigError> {
        if num_devices == 0 || !num_devices.is_power_of_two() {
            return Err(ConfigError::BadDeviceCount(num_devices));
        }
        let num_nodes = csr.num_nodes();
        let nodes_per_device = num_nodes.div_ceil(num_devices).max(1);
        let slices = (0..num_devices)
            .map(|d| {
                let first = (d * nodes_per_device).min(num_nodes);
                let owned = nodes_per_device.min(num_nodes - first);
                GpuSlice::new(d, first as VertexId, csr, owned)
            })
            .collect();
        Ok(Self {
            num_nodes,
            nodes_per_device,
            slices,
        })
    }

    /// Number of vertices in the whole graph.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of devices the graph is sliced across.
    #[must_use]
    pub fn num_devices(&self) -> usize {
        self.slices.len()
    }

    /// Device owning `vertex`.
    #[must_use]
    pub fn owner(&self, vertex: VertexId) -> DeviceId {
        vertex as usize / self.nodes_per_device
    }

    pub(crate) fn nodes_per_device(&self) -> usize {
        self.nodes_per_device
    }

    /// Per-device slices, in device order.
    #[must_use]
    pub fn slices(&self) -> &[GpuSlice] {
        &self.slices
    }

    pub(crate) fn take_slices(&mut self) -> Vec<GpuSlice> {
        std::mem::take(&mut self.slices)
    }

    pub(crate) fn restore_slices(&mut self, slices: Vec<GpuSlice>) {
        debug_assert!(slices.windows(2).all(|w| w[0].device < w[1].device));
        self.slices = slices;
    }

    /// Clears all labels and queues so the problem can host another search.
    pub fn reset(&mut self) {
        for slice in &mut self.slices {
            slice.reset();
        }
    }

    /// Gathers per-device distance labels into one global array, indexed
    /// by vertex id. Unreached vertices hold [`UNVISITED`].
    #[must_use]
    pub fn distances(&self) -> Vec<i32> {
        self.gather(|s| &s.distances)
    }

    /// Gathers per-device parent labels into one global array. The source
    /// vertex and unreached vertices hold [`UNVISITED`].
    #[must_use]
    pub fn parents(&self) -> Vec<i32> {
        self.gather(|s| &s.parents)
    }

    fn gather<'a>(&'a self, field: impl Fn(&'a GpuSlice) -> &'a [i32]) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.num_nodes);
        for slice in &self.slices {
            out.extend_from_slice(field(slice));
        }
        out
    }
}
