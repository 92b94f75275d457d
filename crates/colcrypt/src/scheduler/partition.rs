//! Contiguous partitioning of a row range.

/// Split `[0, len)` into at most `n` contiguous `(offset, len)` chunks.
///
/// Chunks are equal-sized except the last, which absorbs the remainder. No
/// chunk is empty unless `len` is zero, in which case a single empty chunk is
/// returned.
pub fn split_offsets(len: usize, n: usize) -> Vec<(usize, usize)> {
    let n = n.clamp(1, len.max(1));
    if n == 1 {
        return vec![(0, len)];
    }
    let chunk_size = len / n;
    (0..n)
        .map(|partition| {
            let offset = partition * chunk_size;
            let chunk_len = if partition == n - 1 {
                len - offset
            } else {
                chunk_size
            };
            (offset, chunk_len)
        })
        .collect()
}

/// Carve `out` into disjoint mutable slices matching `offsets`.
pub(crate) fn split_slices<'a, T>(
    out: &'a mut [T],
    offsets: &[(usize, usize)],
) -> Vec<(usize, &'a mut [T])> {
    let mut rest = out;
    let mut slices = Vec::with_capacity(offsets.len());
    for &(offset, len) in offsets {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
        slices.push((offset, head));
        rest = tail;
    }
    slices
}
