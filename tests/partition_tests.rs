//! Integration tests for the three-phase partition/compact pipeline

use simt_scan::{CtaConfig, PartitionConfig, PartitionPipeline, SmemStorage, Spine};

fn pipeline(grid_size: usize, bins: usize) -> (PartitionPipeline, SmemStorage<u32>, Spine) {
    let cta = CtaConfig::new(32, 32, 32, 1).unwrap();
    let config = PartitionConfig::new(grid_size, bins, cta).unwrap();
    let pipeline = PartitionPipeline::new(config).unwrap();
    let smem = SmemStorage::new(&cta);
    let spine = Spine::new(&config);
    (pipeline, smem, spine)
}

#[test]
fn test_partition_is_stable_within_bins() {
    let (pipeline, mut smem, mut spine) = pipeline(4, 3);
    // Tag every element with its input position so stability is visible.
    let elements: Vec<u32> = (0..300u32).map(|i| (i << 8) | (i % 3)).collect();
    let mut tags = Vec::new();
    let mut out = Vec::new();

    let total = pipeline.partition(
        &mut smem,
        &elements,
        |e| Some(e & 0xff),
        &mut tags,
        &mut spine,
        &mut out,
    );

    assert_eq!(total, 300);
    assert_eq!(out.len(), 300);
    for bin in 0u32..3 {
        let members: Vec<u32> = out.iter().copied().filter(|e| e & 0xff == bin).collect();
        let expected: Vec<u32> = elements.iter().copied().filter(|e| e & 0xff == bin).collect();
        assert_eq!(members, expected, "bin {bin} must keep input order");
    }
    // Bins occupy contiguous, ascending ranges.
    let bin_of = |e: u32| e & 0xff;
    assert!(out.windows(2).all(|w| bin_of(w[0]) <= bin_of(w[1])));
}

#[test]
fn test_classifier_discards_are_compacted_away() {
    let (pipeline, mut smem, mut spine) = pipeline(2, 2);
    let elements: Vec<u32> = (0..100).collect();
    let mut tags = Vec::new();
    let mut out = Vec::new();

    // Keep only multiples of 5, split odd/even among two bins.
    let total = pipeline.partition(
        &mut smem,
        &elements,
        |e| (e % 5 == 0).then_some(e % 2),
        &mut tags,
        &mut spine,
        &mut out,
    );

    assert_eq!(total, 20);
    assert_eq!(spine.total(), 20);
    assert!(out.iter().all(|e| e % 5 == 0));
}

#[test]
fn test_bin_group_ranges_tile_the_output() {
    let grid_size = 4;
    let bins = 4;
    let (pipeline, mut smem, mut spine) = pipeline(grid_size, bins);
    let elements: Vec<u32> = (0..997).collect();
    let mut tags = Vec::new();
    let mut out = Vec::new();

    let total = pipeline.partition(
        &mut smem,
        &elements,
        |e| Some(e % 4),
        &mut tags,
        &mut spine,
        &mut out,
    );

    // Per-bin ranges are disjoint, in order, and cover the whole output.
    let mut cursor = 0u32;
    for bin in 0..bins {
        let (start, end) = spine.bin_group_range(grid_size, bin, bin + 1);
        assert_eq!(start, cursor);
        assert!(end >= start);
        assert!(out[start as usize..end as usize]
            .iter()
            .all(|&e| e % 4 == u32::try_from(bin).unwrap()));
        cursor = end;
    }
    assert_eq!(cursor, total);
}

#[test]
fn test_empty_input_yields_zero_total() {
    let (pipeline, mut smem, mut spine) = pipeline(4, 2);
    let mut tags = Vec::new();
    let mut out = vec![7u32; 3];

    let total = pipeline.partition(&mut smem, &[], |_: &u32| Some(0), &mut tags, &mut spine, &mut out);

    assert_eq!(total, 0);
    assert!(out.is_empty());
}

#[test]
fn test_input_smaller_than_grid() {
    // Fewer elements than CTAs: trailing CTAs see empty chunks.
    let (pipeline, mut smem, mut spine) = pipeline(8, 2);
    let elements = [5u32, 6];
    let mut tags = Vec::new();
    let mut out = Vec::new();

    let total = pipeline.partition(
        &mut smem,
        &elements,
        |e| Some(e % 2),
        &mut tags,
        &mut spine,
        &mut out,
    );

    assert_eq!(total, 2);
    assert_eq!(out, vec![6, 5]);
}
