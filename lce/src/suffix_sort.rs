//! Bounded-length suffix sorting over a string synchronizing set.
//!
//! Sorts by lexicographic order of a fixed-length prefix, using a dense
//! prefix-hash array over the 61-bit modulus in `mersenne61.rs` with
//! doubling search to find the LCP between two bounded suffixes in
//! O(log tau) per comparison. Ties beyond the bound are broken by
//! `run_rank` then position.
//!
//! The two-phase shape — an initial radix pass on a fixed-width key via
//! `rdst`, then a comparator-based refinement inside each equal-key group —
//! sorts most pairs apart in the radix pass and only pays the O(log tau)
//! comparator cost within residual equal-prefix groups.

use std::cmp::Ordering;
use std::collections::HashMap;

use rayon::prelude::*;
use rdst::{RadixKey, RadixSort};

use crate::mersenne61::{addmod, mulmod, Q61};

const SORT_HASH_BASE: u64 = 131;
const PREFIX_BYTES: usize = 8;
/// Above this many sync-set elements, equal-prefix groups are refined
/// concurrently across `parallelism` rayon workers instead of in sequence.
const PARALLEL_REFINE_THRESHOLD: usize = 10_000;

/// The first 8 bytes of a suffix, big-endian packed so ascending numeric
/// order matches lexicographic byte order.
#[derive(Clone, Copy)]
struct PrefixKey {
    /// Index into `positions`.
    idx: usize,
    prefix: u64,
}

impl RadixKey for PrefixKey {
    const LEVELS: usize = PREFIX_BYTES;
    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        (self.prefix >> (level * 8)) as u8
    }
}

struct PrefixHash {
    prefix: Vec<u64>,
    pow: Vec<u64>,
}

impl PrefixHash {
    fn new(t: &[u8], max_len: usize) -> Self {
        let n = t.len();
        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0u64);
        for &b in t {
            let h = addmod(mulmod(*prefix.last().unwrap(), SORT_HASH_BASE), b as u64);
            prefix.push(h);
        }
        let mut pow = Vec::with_capacity(max_len + 1);
        pow.push(1u64);
        for _ in 0..max_len {
            pow.push(mulmod(*pow.last().unwrap(), SORT_HASH_BASE));
        }
        Self { prefix, pow }
    }

    /// Hash of `t[a..a+len)`, assuming `a + len <= t.len()`.
    fn range(&self, a: usize, len: usize) -> u64 {
        let hi = self.prefix[a + len];
        let lo_scaled = mulmod(self.prefix[a], self.pow[len]);
        if hi >= lo_scaled {
            hi - lo_scaled
        } else {
            (Q61 as u64) - (lo_scaled - hi)
        }
    }

    /// Longest common extension of `t[a..]` and `t[b..]`, capped at
    /// `max_len` (both ranges must fit within the text).
    fn lcp(&self, a: usize, b: usize, max_len: usize) -> usize {
        let mut lo = 0usize;
        let mut hi = max_len;
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.range(a, mid) == self.range(b, mid) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }
}

pub struct BoundedSuffixSort {
    /// `sa[r]` is the index into `positions` whose suffix has rank `r`.
    pub sa: Vec<usize>,
    /// `isa[k]` is the rank of `positions[k]`.
    pub isa: Vec<usize>,
    /// `lcp[r]` is the LCE between the rank-`r-1` and rank-`r` suffixes;
    /// `lcp[0]` is unused (set to 0).
    pub lcp: Vec<usize>,
}

/// Sorts `positions` (elements of a string synchronizing set) by the
/// lexicographic order of their length-`3*tau` prefixes, breaking ties by
/// `run_rank` (absent entries treated as rank 0) and then by position.
pub fn build(
    t: &[u8],
    positions: &[usize],
    tau: usize,
    run_rank: &HashMap<usize, i64>,
    parallelism: usize,
) -> BoundedSuffixSort {
    let bound = 3 * tau;
    let hashes = PrefixHash::new(t, bound);

    let extent = |s: usize| -> usize { (t.len() - s).min(bound) };

    let compare = |&a: &usize, &b: &usize| -> Ordering {
        let (pa, pb) = (positions[a], positions[b]);
        let (ea, eb) = (extent(pa), extent(pb));
        let common = ea.min(eb);
        let l = hashes.lcp(pa, pb, common);
        if l < common {
            return t[pa + l].cmp(&t[pb + l]);
        }
        if ea != eb {
            return ea.cmp(&eb);
        }
        let ra = run_rank.get(&pa).copied().unwrap_or(0);
        let rb = run_rank.get(&pb).copied().unwrap_or(0);
        ra.cmp(&rb).then(pa.cmp(&pb))
    };

    // Phase 1: bucket by the first 8 bytes with a radix pass.
    let mut keyed: Vec<PrefixKey> = positions
        .iter()
        .enumerate()
        .map(|(k, &p)| {
            let mut buf = [0u8; PREFIX_BYTES];
            let avail = (t.len() - p).min(PREFIX_BYTES);
            buf[..avail].copy_from_slice(&t[p..p + avail]);
            PrefixKey { idx: k, prefix: u64::from_be_bytes(buf) }
        })
        .collect();
    if parallelism > 1 {
        keyed.radix_sort_builder().sort();
    } else {
        keyed.radix_sort_builder().with_single_threaded_tuner().sort();
    }

    // Phase 2: refine every equal-prefix run with the full comparator.
    let mut sa: Vec<usize> = keyed.iter().map(|k| k.idx).collect();
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < sa.len() {
        let mut end = start + 1;
        while end < sa.len() && keyed[end].prefix == keyed[start].prefix {
            end += 1;
        }
        if end - start > 1 {
            ranges.push((start, end));
        }
        start = end;
    }

    if parallelism > 1 && positions.len() > PARALLEL_REFINE_THRESHOLD {
        let mut rest = sa.as_mut_slice();
        let mut offset = 0;
        let mut groups = Vec::with_capacity(ranges.len());
        for &(s, e) in &ranges {
            let (_, tail) = rest.split_at_mut(s - offset);
            let (group, tail2) = tail.split_at_mut(e - s);
            groups.push(group);
            rest = tail2;
            offset = e;
        }
        groups.into_par_iter().for_each(|group| group.sort_unstable_by(&compare));
    } else {
        for &(s, e) in &ranges {
            sa[s..e].sort_unstable_by(&compare);
        }
    }

    let mut isa = vec![0usize; positions.len()];
    for (r, &k) in sa.iter().enumerate() {
        isa[k] = r;
    }

    let mut lcp = vec![0usize; positions.len()];
    for r in 1..sa.len() {
        let pa = positions[sa[r - 1]];
        let pb = positions[sa[r]];
        let common = extent(pa).min(extent(pb));
        lcp[r] = hashes.lcp(pa, pb, common);
    }

    BoundedSuffixSort { sa, isa, lcp }
}

#[cfg(test)]
mod test {
    use super::*;

    fn naive_lcp(t: &[u8], a: usize, b: usize, max_len: usize) -> usize {
        (0..max_len).take_while(|&k| t[a + k] == t[b + k]).count()
    }

    #[test]
    fn matches_naive_sort_on_random_text() {
        let t: Vec<u8> = (0..3000).map(|_| b"ACGT"[rand::random::<usize>() % 4]).collect();
        let tau = 32;
        let positions: Vec<usize> = (0..t.len() - 3 * tau).step_by(7).collect();
        let run_rank = HashMap::new();
        let sorted = build(&t, &positions, tau, &run_rank, 4);

        for r in 1..sorted.sa.len() {
            let pa = positions[sorted.sa[r - 1]];
            let pb = positions[sorted.sa[r]];
            let bound = 3 * tau;
            let ea = (t.len() - pa).min(bound);
            let eb = (t.len() - pb).min(bound);
            let common = ea.min(eb);
            let l = naive_lcp(&t, pa, pb, common);
            assert!(
                l < common && t[pa + l] <= t[pb + l] || l == common,
                "SA order violated at rank {r}"
            );
            assert_eq!(sorted.lcp[r], l, "lcp mismatch at rank {r}");
        }

        for (k, &r) in sorted.isa.iter().enumerate() {
            assert_eq!(sorted.sa[r], k);
        }
    }

    #[test]
    fn run_rank_breaks_ties_when_bytes_exhausted() {
        let t = vec![b'a'; 500];
        let tau = 16;
        let positions = vec![0usize, 10, 20];
        let mut run_rank = HashMap::new();
        run_rank.insert(0usize, 5i64);
        run_rank.insert(10usize, -5i64);
        let sorted = build(&t, &positions, tau, &run_rank, 4);
        // position 10 has the lowest run_rank, so its suffix should sort first.
        assert_eq!(positions[sorted.sa[0]], 10);
    }
}
