//! Longest increasing subsequence.
//!
//! The keyed diff maps each new child to `old index + 1`, with `0` meaning
//! "no old counterpart". Children on a longest strictly increasing run of
//! that map are already in relative order and never need to move.
//!
//! Patience sorting with predecessor links: `O(n log n)`.

use smallvec::SmallVec;

/// Indices (into `seq`) of a longest strictly increasing subsequence of
/// the non-zero entries, in ascending order.
///
/// ```rust
/// use trellis_core::render::longest_increasing_subsequence;
///
/// assert_eq!(longest_increasing_subsequence(&[3, 2, 5, 4]), vec![1, 3]);
/// assert_eq!(longest_increasing_subsequence(&[0, 2, 0, 3]), vec![1, 3]);
/// ```
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    let mut predecessors: SmallVec<[usize; 32]> = SmallVec::from_elem(usize::MAX, seq.len());
    // tails[k] = index of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();

    for (i, &value) in seq.iter().enumerate() {
        if value == 0 {
            continue;
        }

        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            predecessors[i] = tails[pos - 1];
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut result = vec![0; tails.len()];
    let mut next = tails.last().copied().unwrap_or(usize::MAX);
    for slot in result.iter_mut().rev() {
        *slot = next;
        next = predecessors[next];
    }
    result
}
