/// Balanced block decomposition of `total` items over `num_rank` ranks.
///
/// Returns `(offset, size)` for `rank`. The first `total % num_rank` ranks get
/// one extra item. Every rank computes the same split without communicating.
#[must_use]
pub fn decompose(total: usize, num_rank: usize, rank: usize) -> (usize, usize) {
    if num_rank == 0 {
        return (0, 0);
    }
    let quotient = total / num_rank;
    let remainder = total % num_rank;
    let size = quotient + usize::from(rank < remainder);
    let offset = quotient * rank + rank.min(remainder);
    (offset, size)
}
