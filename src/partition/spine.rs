//! Spine-scan: exclusive prefix sum over the spine via the CTA scan engine
//!
//! The spine is scanned in tiles of `cta_threads * items_per_thread`
//! elements. A running carry is threaded between tiles through the scan
//! engine's CTA-prefix callback, and the ragged final tile is zero-padded
//! (a guarded load). When the pass finishes, the spine's last slot receives
//! the carry: the total compacted count.

use super::Spine;
use crate::scan::{CtaScan, SmemStorage};

pub(crate) fn spine_scan(scan: &CtaScan, smem: &mut SmemStorage<u32>, spine: &mut Spine) {
    let counts = spine.counts_mut();
    let n = counts.len() - 1;
    let tile = scan.config().tile_elements();

    let mut carry = 0u32;
    let mut buf = vec![0u32; tile];
    let mut start = 0;
    while start < n {
        let len = tile.min(n - start);
        buf[..len].copy_from_slice(&counts[start..start + len]);
        buf[len..].fill(0);

        let mut prefix_op = |aggregate: u32| {
            let base = carry;
            carry += aggregate;
            base
        };
        scan.exclusive_sum_with_prefix(smem, &mut buf, &mut prefix_op);

        counts[start..start + len].copy_from_slice(&buf[..len]);
        start += tile;
    }

    counts[n] = carry;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CtaConfig, PartitionConfig};

    fn scan_engine(cta: usize) -> (CtaScan, SmemStorage<u32>) {
        let config = CtaConfig::new(cta, cta, cta, 1).unwrap();
        (CtaScan::new(config).unwrap(), SmemStorage::new(&config))
    }

    fn spine_with_counts(counts: &[u32]) -> Spine {
        // grid_size = counts.len(), bins = 1
        let cfg = PartitionConfig::new(counts.len(), 1, CtaConfig::default()).unwrap();
        let mut spine = Spine::new(&cfg);
        spine.counts_mut()[..counts.len()].copy_from_slice(counts);
        spine
    }

    #[test]
    fn test_single_tile() {
        let (scan, mut smem) = scan_engine(8);
        let mut spine = spine_with_counts(&[1, 2, 3, 4]);

        spine_scan(&scan, &mut smem, &mut spine);

        assert_eq!(spine.as_slice(), &[0, 1, 3, 6, 10]);
        assert_eq!(spine.total(), 10);
    }

    #[test]
    fn test_multiple_tiles_with_carry() {
        // Tile of 4 forces three passes over 12 counts
        let (scan, mut smem) = scan_engine(4);
        let mut spine = spine_with_counts(&[1; 12]);

        spine_scan(&scan, &mut smem, &mut spine);

        let expected: Vec<u32> = (0..=12).collect();
        assert_eq!(spine.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_ragged_final_tile() {
        // 6 counts over tiles of 4: the second tile is half-padded
        let (scan, mut smem) = scan_engine(4);
        let mut spine = spine_with_counts(&[2, 2, 2, 2, 2, 2]);

        spine_scan(&scan, &mut smem, &mut spine);

        assert_eq!(spine.as_slice(), &[0, 2, 4, 6, 8, 10, 12]);
    }

    #[test]
    fn test_all_zero_counts() {
        let (scan, mut smem) = scan_engine(4);
        let mut spine = spine_with_counts(&[0, 0, 0, 0]);

        spine_scan(&scan, &mut smem, &mut spine);
        assert_eq!(spine.total(), 0);
    }
}
