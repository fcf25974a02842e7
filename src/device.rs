//! Simulated device layer
//!
//! A real multi-GPU runtime would route work through an ambient
//! device-context switch; here every per-device operation receives its
//! device state explicitly,
//! and per-device kernel phases run as `tokio` tasks whose join forms the
//! host-observed phase boundary.

use thiserror::Error;

/// Identifier of a simulated device
pub type DeviceId = usize;

/// Device-layer failures
///
/// These are the recoverable-by-abort class of errors: the first one
/// encountered short-circuits the remaining work in its phase and surfaces
/// to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// A frontier queue write exceeded its allocated capacity
    #[error("device {device}: frontier queue overflow (capacity {capacity})")]
    QueueOverflow {
        /// Device whose queue overflowed
        device: DeviceId,
        /// The queue's allocated capacity
        capacity: usize,
    },

    /// A work-progress read referenced an epoch that was never recorded
    #[error("device {device}: work-progress epoch {epoch} out of range")]
    EpochOutOfRange {
        /// Device queried
        device: DeviceId,
        /// Offending epoch
        epoch: usize,
    },

    /// A vertex was routed to a device that does not own it
    #[error("device {device}: vertex {vertex} is not owned here")]
    NotOwned {
        /// Device that received the vertex
        device: DeviceId,
        /// The misrouted vertex
        vertex: u32,
    },
}

/// Epoch-indexed queue-length counters
///
/// The expand kernel records how many elements it emitted under the *next*
/// queue epoch; the enactor reads the counter for the current epoch to
/// learn the frontier size. Counters are never reset mid-search; the epoch
/// index only advances.
#[derive(Debug, Clone, Default)]
pub struct WorkProgress {
    counters: Vec<u32>,
}

impl WorkProgress {
    /// Fresh counters with nothing recorded
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `count` emitted elements under `epoch`
    pub fn add(&mut self, epoch: usize, count: u32) {
        if epoch >= self.counters.len() {
            self.counters.resize(epoch + 1, 0);
        }
        self.counters[epoch] += count;
    }

    /// Queue length recorded for `epoch` (zero if never written)
    #[must_use]
    pub fn get(&self, epoch: usize) -> u32 {
        self.counters.get(epoch).copied().unwrap_or(0)
    }

    /// Forget all recorded epochs
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}
