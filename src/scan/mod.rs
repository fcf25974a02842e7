//! Cooperative parallel prefix-scan engine
//!
//! Composition, leaves first:
//!
//! - [`thread`]: sequential per-worker reduce/scan over consecutive items
//! - [`warp`]: Kogge-Stone scan across a lockstep lane group
//! - [`raking`]: padded placement grid letting a raking subset of workers
//!   reduce and rescan every worker's contributed partial
//! - [`cta`]: the CTA-wide engine composing all three, with a
//!   warp-synchronous short-circuit when the whole CTA fits one warp
//!
//! Data flows bottom-up: per-worker scalars → warp partials → CTA
//! aggregate, then back down through the rescan to give every worker its
//! prefix.

pub mod cta;
pub mod raking;
pub mod thread;
pub mod warp;

pub use cta::{CtaScan, SmemStorage};
pub use raking::RakingGrid;
pub use warp::{WarpScan, WarpScratch};
