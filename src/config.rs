//! Launch-configuration structs for the scan engine and partition pipeline
//!
//! Tuning knobs (CTA width, raking-thread count, items per thread, grid
//! size) are plain structs validated once at construction and passed by
//! value into the scan and partition routines, rather than compile-time
//! policy parameters baked into each kernel.

use thiserror::Error;

/// Configuration validation errors
///
/// All of these are detected before any device work begins.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A width that must be a power of two is not
    #[error("{name} must be a power of two (got {value})")]
    NotPowerOfTwo {
        /// Name of the offending field
        name: &'static str,
        /// Rejected value
        value: usize,
    },

    /// More raking threads than CTA threads
    #[error("raking_threads ({raking}) must not exceed cta_threads ({cta})")]
    RakingExceedsCta {
        /// Requested raking-thread count
        raking: usize,
        /// CTA width
        cta: usize,
    },

    /// The raking subset must fit within a single warp
    #[error("raking_threads ({raking}) must fit within one warp ({warp})")]
    RakingExceedsWarp {
        /// Requested raking-thread count
        raking: usize,
        /// Warp width
        warp: usize,
    },

    /// Zero items per thread
    #[error("items_per_thread must be at least 1")]
    ZeroItemsPerThread,

    /// Zero-sized partition grid
    #[error("grid_size must be at least 1")]
    ZeroGridSize,

    /// Bin count not divisible across devices
    #[error("bins ({bins}) must be a non-zero multiple of the device count ({devices})")]
    BadBinCount {
        /// Requested bin count
        bins: usize,
        /// Device count the bins must divide across
        devices: usize,
    },

    /// Device count must be a non-zero power of two
    #[error("device count must be a non-zero power of two (got {0})")]
    BadDeviceCount(usize),

    /// CSR offsets empty, non-monotonic, or inconsistent with the edge list
    #[error("malformed CSR: offsets must be non-empty, non-decreasing, and end at the edge count")]
    MalformedCsr,
}

fn require_power_of_two(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ConfigError::NotPowerOfTwo { name, value })
    }
}

/// Cooperating-group (CTA) launch configuration
///
/// Widths are tunable constants rather than hardware facts. Invariants
/// enforced at construction:
///
/// - `cta_threads`, `warp_threads`, and `raking_threads` are powers of two
/// - `raking_threads <= cta_threads`
/// - `raking_threads <= warp_threads` (the raking subset must be scannable
///   by a single warp)
/// - `items_per_thread >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtaConfig {
    cta_threads: usize,
    warp_threads: usize,
    raking_threads: usize,
    items_per_thread: usize,
}

impl CtaConfig {
    /// Validate and build a CTA configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any width invariant is violated.
    pub fn new(
        cta_threads: usize,
        warp_threads: usize,
        raking_threads: usize,
        items_per_thread: usize,
    ) -> Result<Self, ConfigError> {
        require_power_of_two("cta_threads", cta_threads)?;
        require_power_of_two("warp_threads", warp_threads)?;
        require_power_of_two("raking_threads", raking_threads)?;

        if raking_threads > cta_threads {
            return Err(ConfigError::RakingExceedsCta {
                raking: raking_threads,
                cta: cta_threads,
            });
        }
        if raking_threads > warp_threads {
            return Err(ConfigError::RakingExceedsWarp {
                raking: raking_threads,
                warp: warp_threads,
            });
        }
        if items_per_thread == 0 {
            return Err(ConfigError::ZeroItemsPerThread);
        }

        Ok(Self {
            cta_threads,
            warp_threads,
            raking_threads,
            items_per_thread,
        })
    }

    /// Number of cooperating workers in the CTA
    #[must_use]
    pub const fn cta_threads(&self) -> usize {
        self.cta_threads
    }

    /// Lockstep-lane group width
    ///
    /// Purely a validation bound: the raking subset must fit inside one
    /// warp (`raking_threads <= warp_threads`), since the internal warp
    /// scan runs `raking_threads` wide. No runtime path reads this width.
    #[must_use]
    pub const fn warp_threads(&self) -> usize {
        self.warp_threads
    }

    /// Number of workers that rake the placement grid
    #[must_use]
    pub const fn raking_threads(&self) -> usize {
        self.raking_threads
    }

    /// Items each worker contributes per scan call
    #[must_use]
    pub const fn items_per_thread(&self) -> usize {
        self.items_per_thread
    }

    /// Consecutive placement slots each raking thread reduces
    #[must_use]
    pub const fn raking_length(&self) -> usize {
        self.cta_threads.div_ceil(self.raking_threads)
    }

    /// Total items consumed by one CTA-wide scan call
    #[must_use]
    pub const fn tile_elements(&self) -> usize {
        self.cta_threads * self.items_per_thread
    }

    /// Whether the whole CTA fits the raking width
    ///
    /// When true, CTA scans short-circuit directly to the warp scan with no
    /// raking-grid traffic.
    #[must_use]
    pub const fn warp_synchronous(&self) -> bool {
        self.cta_threads == self.raking_threads
    }
}

impl Default for CtaConfig {
    /// 128 workers, 32-lane warps, one raking warp, one item per worker
    fn default() -> Self {
        Self {
            cta_threads: 128,
            warp_threads: 32,
            raking_threads: 32,
            items_per_thread: 1,
        }
    }
}

/// Partition/compact pipeline configuration
///
/// `grid_size` is the number of CTAs cooperating on one pass; each owns a
/// disjoint spine slice, so correctness never depends on CTA completion
/// order. `bins` must divide evenly across devices when used by the BFS
/// enactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionConfig {
    grid_size: usize,
    bins: usize,
    cta: CtaConfig,
}

impl PartitionConfig {
    /// Validate and build a partition configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `grid_size` or `bins` is zero, or if the
    /// embedded CTA configuration is invalid.
    pub fn new(grid_size: usize, bins: usize, cta: CtaConfig) -> Result<Self, ConfigError> {
        if grid_size == 0 {
            return Err(ConfigError::ZeroGridSize);
        }
        if bins == 0 {
            return Err(ConfigError::BadBinCount { bins, devices: 1 });
        }
        Ok(Self {
            grid_size,
            bins,
            cta,
        })
    }

    /// Number of CTAs in one partition pass
    #[must_use]
    pub const fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Number of output bins
    #[must_use]
    pub const fn bins(&self) -> usize {
        self.bins
    }

    /// CTA configuration used for the spine scan
    #[must_use]
    pub const fn cta(&self) -> CtaConfig {
        self.cta
    }

    /// Spine length: one partial per (bin, CTA) pair, plus the total slot
    #[must_use]
    pub const fn spine_elements(&self) -> usize {
        self.grid_size * self.bins + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let cfg = CtaConfig::new(128, 32, 32, 2).unwrap();
        assert_eq!(cfg.cta_threads(), 128);
        assert_eq!(cfg.raking_length(), 4);
        assert_eq!(cfg.tile_elements(), 256);
        assert!(!cfg.warp_synchronous());
    }

    #[test]
    fn test_warp_synchronous_config() {
        let cfg = CtaConfig::new(32, 32, 32, 1).unwrap();
        assert!(cfg.warp_synchronous());
        assert_eq!(cfg.raking_length(), 1);
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        let err = CtaConfig::new(96, 32, 32, 1).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotPowerOfTwo {
                name: "cta_threads",
                value: 96
            }
        );
    }

    #[test]
    fn test_raking_exceeds_cta_rejected() {
        let err = CtaConfig::new(16, 32, 32, 1).unwrap_err();
        assert!(matches!(err, ConfigError::RakingExceedsCta { .. }));
    }

    #[test]
    fn test_raking_exceeds_warp_rejected() {
        let err = CtaConfig::new(128, 16, 32, 1).unwrap_err();
        assert!(matches!(err, ConfigError::RakingExceedsWarp { .. }));
    }

    #[test]
    fn test_zero_items_rejected() {
        let err = CtaConfig::new(128, 32, 32, 0).unwrap_err();
        assert_eq!(err, ConfigError::ZeroItemsPerThread);
    }

    #[test]
    fn test_partition_config() {
        let cta = CtaConfig::default();
        let cfg = PartitionConfig::new(8, 4, cta).unwrap();
        assert_eq!(cfg.spine_elements(), 8 * 4 + 1);
    }

    #[test]
    fn test_partition_zero_grid_rejected() {
        let err = PartitionConfig::new(0, 4, CtaConfig::default()).unwrap_err();
        assert_eq!(err, ConfigError::ZeroGridSize);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::BadDeviceCount(3);
        assert_eq!(
            err.to_string(),
            "device count must be a non-zero power of two (got 3)"
        );
    }
}
