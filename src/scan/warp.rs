//! Warp-level Kogge-Stone scan
//!
//! Scans one partial per lane across a power-of-two lane group using
//! `log2(width)` step-doubling passes over a two-segment shared scratch.
//! Segment 0 is pre-initialized to the identity so that low-lane reads at
//! `lane - offset` land on identity values instead of garbage; segment 1
//! holds the working partials.
//!
//! Hardware warps rely on true lockstep execution to make each step's
//! simultaneous read/write safe without barriers. That assumption does not
//! hold here, so every step gathers all lane reads into a staging buffer
//! before any lane writes, an explicit lane-synchronization primitive with
//! the same data movement.

use crate::config::ConfigError;
use bytemuck::Zeroable;

/// Two-segment shared scratch for one warp scan
///
/// Slots `[0, width)` form the identity segment, `[width, 2 * width)` the
/// working segment. Allocated once and reused across calls; each call fully
/// re-initializes the slots it reads.
#[derive(Debug)]
pub struct WarpScratch<T> {
    buf: Vec<T>,
    stage: Vec<T>,
    width: usize,
}

impl<T: Copy + Zeroable> WarpScratch<T> {
    /// Allocate scratch for a warp of `width` lanes
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            buf: vec![T::zeroed(); 2 * width],
            stage: vec![T::zeroed(); width],
            width,
        }
    }

    /// Lane-group width this scratch was sized for
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Kogge-Stone scan across a power-of-two lane group
#[derive(Debug, Clone, Copy)]
pub struct WarpScan {
    width: usize,
}

impl WarpScan {
    /// Build a warp scan of the given lane width
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotPowerOfTwo`] unless `width` is a power of
    /// two.
    pub fn new(width: usize) -> Result<Self, ConfigError> {
        if !width.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                name: "warp width",
                value: width,
            });
        }
        Ok(Self { width })
    }

    /// Lane-group width
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Step-doubling passes, leaving each lane's inclusive partial in the
    /// working segment. Returns the total (the tail lane's inclusive
    /// partial).
    fn kogge_stone<T, Op>(
        &self,
        scratch: &mut WarpScratch<T>,
        partials: &[T],
        identity: Option<T>,
        op: &Op,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        let w = self.width;
        debug_assert_eq!(partials.len(), w);
        debug_assert_eq!(scratch.width, w);

        if let Some(e) = identity {
            scratch.buf[..w].fill(e);
        }
        scratch.buf[w..].copy_from_slice(partials);

        let mut offset = 1;
        while offset < w {
            if identity.is_some() {
                // Unguarded: low lanes read the identity segment
                for lane in 0..w {
                    scratch.stage[lane] = op(scratch.buf[w + lane - offset], scratch.buf[w + lane]);
                }
                scratch.buf[w..].copy_from_slice(&scratch.stage);
            } else {
                // Guarded: lanes below the offset keep their partial
                for lane in offset..w {
                    scratch.stage[lane] = op(scratch.buf[w + lane - offset], scratch.buf[w + lane]);
                }
                scratch.buf[w + offset..].copy_from_slice(&scratch.stage[offset..]);
            }
            offset <<= 1;
        }

        scratch.buf[2 * w - 1]
    }

    /// Inclusive scan of `partials` in place; returns the total
    ///
    /// Without an identity the steps are guarded, so results are still
    /// well-defined for every lane.
    pub fn inclusive_scan<T, Op>(
        &self,
        scratch: &mut WarpScratch<T>,
        partials: &mut [T],
        identity: Option<T>,
        op: &Op,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        let total = self.kogge_stone(scratch, partials, identity, op);
        partials.copy_from_slice(&scratch.buf[self.width..]);
        total
    }

    /// Exclusive scan of `partials` in place; returns the total
    ///
    /// Each lane's exclusive result is the preceding lane's inclusive
    /// partial, read back from the scratch. Lane 0 reads the tail of the
    /// identity segment; without an identity its output is left unchanged
    /// and is unspecified; callers must not read it.
    pub fn exclusive_scan<T, Op>(
        &self,
        scratch: &mut WarpScratch<T>,
        partials: &mut [T],
        identity: Option<T>,
        op: &Op,
    ) -> T
    where
        T: Copy,
        Op: Fn(T, T) -> T,
    {
        let w = self.width;
        let total = self.kogge_stone(scratch, partials, identity, op);
        if let Some(e) = identity {
            partials[0] = e;
        }
        for lane in 1..w {
            partials[lane] = scratch.buf[w + lane - 1];
        }
        total
    }
}
