//! Sequential per-worker reduce and scan
//!
//! These fold a worker's own consecutive items into one partial before the
//! cooperative phases, and rescan them afterwards seeded by the worker's
//! CTA-wide prefix. The operator is never applied to a single item: the
//! first item always seeds the fold.

/// Sequential reduction of `items` under `op`
///
/// The first item is the seed; `op` is applied `items.len() - 1` times.
///
/// # Panics
///
/// Panics if `items` is empty.
///
/// # Example
///
/// ```
/// use simt_scan::scan::thread::thread_reduce;
///
/// let total = thread_reduce(&[1u32, 2, 3, 4], &|a, b| a + b);
/// assert_eq!(total, 10);
/// ```
pub fn thread_reduce<T, Op>(items: &[T], op: &Op) -> T
where
    T: Copy,
    Op: Fn(T, T) -> T,
{
    let mut partial = items[0];
    for &item in &items[1..] {
        partial = op(partial, item);
    }
    partial
}

/// Sequential exclusive scan of `items` in place, returning the inclusive
/// total
///
/// With a seed, `items[i]` becomes the fold of the seed and `items[..i]`.
/// Without one, `items[0]` is left untouched (its value is unspecified by
/// the scan contract and callers must not read it) and `items[i]` for
/// `i >= 1` becomes the fold of the original `items[..i]`.
pub fn thread_scan_exclusive<T, Op>(items: &mut [T], seed: Option<T>, op: &Op) -> T
where
    T: Copy,
    Op: Fn(T, T) -> T,
{
    match seed {
        Some(seed) => {
            let mut running = seed;
            for item in items.iter_mut() {
                let next = op(running, *item);
                *item = running;
                running = next;
            }
            running
        }
        None => {
            // Seedless: slot 0 keeps whatever it held. The running fold
            // starts from the first original item.
            let mut running = items[0];
            for item in items.iter_mut().skip(1) {
                let next = op(running, *item);
                *item = running;
                running = next;
            }
            running
        }
    }
}

/// Sequential inclusive scan of `items` in place, returning the total
///
/// With a seed, `items[i]` becomes the fold of the seed and `items[..=i]`;
/// without one, the fold of `items[..=i]` alone.
pub fn thread_scan_inclusive<T, Op>(items: &mut [T], seed: Option<T>, op: &Op) -> T
where
    T: Copy,
    Op: Fn(T, T) -> T,
{
    let mut running = seed;
    for item in items.iter_mut() {
        let inclusive = match running {
            Some(prefix) => op(prefix, *item),
            None => *item,
        };
        *item = inclusive;
        running = Some(inclusive);
    }
    // Non-empty input, so running is always Some here.
    match running {
        Some(total) => total,
        None => items[0],
    }
}
