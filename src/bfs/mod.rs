//! Multi-device breadth-first search
//!
//! A level-synchronous BFS over a CSR graph sliced across simulated
//! devices. Each iteration expands the current frontier, partition-compacts
//! the discovered candidates by owning device (a direct application of the
//! [`crate::partition`] pipeline, whose spine scan *is* the CTA scan
//! engine), exchanges the per-destination sub-ranges across devices, and
//! expands again until every device's frontier drains.
//!
//! - `problem`: CSR input graph and its per-device slicing
//! - `expand`: the frontier expand kernel
//! - `enactor`: the state machine driving the whole search

mod enactor;
mod expand;
mod problem;

pub use enactor::{BfsEnactor, BfsStatistics, GpuControlBlock};
pub use problem::{Csr, CsrProblem, FrontierElem, GpuSlice, VertexId, UNVISITED};
