//! simt-scan: cooperative prefix-scan primitives and multi-device BFS
//!
//! # Overview
//!
//! simt-scan re-expresses the classic GPU cooperative-scan stack (warp-level
//! Kogge-Stone scans, a padded raking grid for CTA-wide rescan, and a
//! three-phase partition/compact pipeline) on an explicit, simulated SIMT
//! execution model. On top of the scan engine sits a multi-device
//! breadth-first-search enactor that iterates expand, partition/compact, and
//! cross-device exchange over a CSR graph sliced across virtual devices.
//!
//! # Quick Start
//!
//! ```
//! use simt_scan::{CtaConfig, CtaScan, SmemStorage};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // 64 workers in warps of 16, raked by 8 threads, one item each
//! let config = CtaConfig::new(64, 16, 8, 1)?;
//! let scan = CtaScan::new(config)?;
//! let mut smem = SmemStorage::new(&config);
//!
//! let mut items: Vec<u32> = (0..64).collect();
//! let aggregate = scan.exclusive_sum(&mut smem, &mut items);
//!
//! assert_eq!(items[0], 0);
//! assert_eq!(items[5], 0 + 1 + 2 + 3 + 4);
//! assert_eq!(aggregate, (0..64).sum::<u32>());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Architecture
//!
//! - **`scan`**: sequential thread scans, warp Kogge-Stone scan, the padded
//!   raking grid, and the five-phase CTA scan engine
//! - **`partition`**: upsweep → spine-scan → downsweep histogram-and-scatter,
//!   with the spine scanned in place by the CTA scan engine
//! - **`bfs`**: multi-device CSR problem storage, frontier expansion, and the
//!   enactor state machine
//! - **`device`**: the simulated device layer (work-progress epoch counters,
//!   per-device phase tasks)
//!
//! # Execution model
//!
//! Where GPU hardware provides warp-synchronous ("lockstep lane") execution,
//! this crate uses explicit read-all-then-write-all steps over shared scratch
//! buffers, and tuning that a kernel would fix through compile-time policy
//! templates lives in validated configuration structs ([`CtaConfig`],
//! [`PartitionConfig`]). Group widths are tunable constants, not hardware
//! facts.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bfs;
pub mod config;
pub mod device;
pub mod partition;
pub mod scan;

// Re-export core types
pub use bfs::{BfsEnactor, BfsStatistics, Csr, CsrProblem, VertexId, UNVISITED};
pub use config::{ConfigError, CtaConfig, PartitionConfig};
pub use device::{DeviceError, DeviceId, WorkProgress};
pub use partition::{PartitionPipeline, Spine, INVALID_BIN};
pub use scan::{CtaScan, SmemStorage, WarpScan, WarpScratch};

// Error type
pub use anyhow::{Error, Result};
