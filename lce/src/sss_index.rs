//! Top-level synchronizing-set LCE index: wires together the rolling hash,
//! the SSS builder, the bounded suffix sorter, the `rmq` crate's
//! O(n)-space `MaskRmq`, and the two-level successor index into the
//! `lce`/`byte`/`is_smaller_suffix`/`size_bytes` query surface.

use rmq::{MaskRmq, Rmq};

use crate::cancel::CancelToken;
use crate::error::{BuildError, BuildResult, QueryError, QueryResult};
use crate::sss;
use crate::successor::SuccessorIndex;
use crate::suffix_sort;

pub struct SssIndex {
    t: Vec<u8>,
    tau: usize,
    /// S, sorted by position; `positions[k]` is the k-th element.
    positions: Vec<usize>,
    /// `isa[k]` is the rank of `positions[k]` in bounded-suffix order.
    isa: Vec<usize>,
    lcp: Vec<usize>,
    rmq: MaskRmq<usize>,
    succ: SuccessorIndex,
}

/// Smallest input length for which a 2*tau-wide synchronizing-set window
/// and a 3*tau-wide bounded suffix both fit inside the text.
fn min_input_len(tau: usize) -> usize {
    4 * tau
}

/// `parallelism` is the number of worker partitions used across the build's
/// concurrent phases; `base` is the rolling hash's seedable base. `cancel`
/// is checked between phases so a caller can abort a build in progress.
pub fn build_sss_index(
    t: Vec<u8>,
    tau: usize,
    parallelism: usize,
    base: u128,
    cancel: &CancelToken,
) -> BuildResult<SssIndex> {
    let n = t.len();
    let needed = min_input_len(tau);
    if n < needed {
        return Err(BuildError::InputTooShort { len: n, needed });
    }

    let start = std::time::Instant::now();
    let sync = sss::build_sync_set(&t, tau, parallelism, base, cancel)?;
    eprintln!("\tSSS build time: {:?} ({} elements{})", start.elapsed(), sync.positions.len(), if sync.has_runs { ", runs detected" } else { "" });
    if cancel.is_cancelled() {
        return Err(BuildError::Cancelled);
    }
    let start = std::time::Instant::now();
    let sorted = suffix_sort::build(&t, &sync.positions, tau, &sync.run_rank, parallelism);
    let rmq = MaskRmq::new(&sorted.lcp);
    eprintln!("\tSort + RMQ build time: {:?}", start.elapsed());

    if cancel.is_cancelled() {
        return Err(BuildError::Cancelled);
    }

    let start = std::time::Instant::now();
    let succ_array: Vec<u64> = sync.positions.iter().map(|&p| p as u64).collect();
    let succ = SuccessorIndex::new(succ_array, 8);
    eprintln!("\tSuccessor index build time: {:?}", start.elapsed());

    Ok(SssIndex {
        t,
        tau,
        positions: sync.positions,
        isa: sorted.isa,
        lcp: sorted.lcp,
        rmq,
        succ,
    })
}

impl SssIndex {
    pub fn size_bytes(&self) -> u64 {
        let words = self.positions.len() + self.isa.len() + self.lcp.len();
        (self.t.len() + words * std::mem::size_of::<usize>()) as u64
    }

    fn check_bounds(&self, i: u64) -> QueryResult<usize> {
        let idx = i as usize;
        if idx >= self.t.len() {
            return Err(QueryError::OutOfRange { index: i, len: self.t.len() as u64 });
        }
        Ok(idx)
    }

    pub fn byte(&self, i: u64) -> QueryResult<u8> {
        let idx = self.check_bounds(i)?;
        Ok(self.t[idx])
    }

    /// Longest common extension of `T[i..]` and `T[j..]`.
    pub fn lce(&self, i: u64, j: u64) -> QueryResult<u64> {
        let i = self.check_bounds(i)?;
        let j = self.check_bounds(j)?;
        if i == j {
            return Ok((self.t.len() - i) as u64);
        }

        let n = self.t.len();
        let bound = 3 * self.tau;
        let scan_len = bound.min(n - i).min(n - j);

        let mut k = 0;
        while k < scan_len && self.t[i + k] == self.t[j + k] {
            k += 1;
        }
        if k < scan_len {
            return Ok(k as u64);
        }
        if scan_len < bound {
            // Ran off the end of the text while still matching.
            return Ok(scan_len as u64);
        }

        let i2 = self.succ.successor((i + 1) as u64).pos;
        let j2 = self.succ.successor((j + 1) as u64).pos;
        if i2 == j2 {
            return Ok((n - i) as u64);
        }

        let isa_i = self.isa[i2];
        let isa_j = self.isa[j2];
        let lo = isa_i.min(isa_j);
        let hi = isa_i.max(isa_j);
        let l = self.rmq.query(lo + 1..hi + 1);
        let d_i = self.positions[i2] - i;
        Ok((l + d_i) as u64)
    }

    pub fn is_smaller_suffix(&self, i: u64, j: u64) -> QueryResult<bool> {
        self.check_bounds(i)?;
        self.check_bounds(j)?;
        if i == j {
            return Ok(false);
        }
        let l = self.lce(i, j)? as usize;
        let (i, j) = (i as usize, j as usize);
        let ends_at_i = i + l == self.t.len();
        let ends_at_j = j + l == self.t.len();
        if ends_at_i {
            return Ok(!ends_at_j);
        }
        if ends_at_j {
            return Ok(false);
        }
        Ok(self.t[i + l] < self.t[j + l])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn naive_lce(t: &[u8], i: usize, j: usize) -> usize {
        std::iter::zip(&t[i..], &t[j..]).take_while(|(a, b)| a == b).count()
    }

    #[test]
    fn matches_naive_lce_on_random_text() {
        for &tau in &[8usize, 16] {
            let t: Vec<u8> = (0..5000).map(|_| b"ACGT"[rand::random::<usize>() % 4]).collect();
            let idx = build_sss_index(t.clone(), tau, 4, 0x9E37_79B9_7F4A_7C15, &CancelToken::new()).unwrap();
            for _ in 0..300 {
                let i = rand::random::<usize>() % t.len();
                let j = rand::random::<usize>() % t.len();
                let got = idx.lce(i as u64, j as u64).unwrap();
                let want = naive_lce(&t, i, j);
                assert_eq!(got as usize, want, "tau={tau} i={i} j={j}");
            }
        }
    }

    #[test]
    fn out_of_range_is_rejected() {
        let t: Vec<u8> = (0..2000).map(|_| rand::random::<u8>()).collect();
        let idx = build_sss_index(t.clone(), 8, 4, 0x1234_5678_9abc_def1, &CancelToken::new()).unwrap();
        assert!(idx.byte(t.len() as u64).is_err());
        assert!(idx.lce(t.len() as u64, 0).is_err());
    }

    #[test]
    fn too_short_input_is_rejected() {
        let t = vec![0u8; 10];
        assert!(matches!(
            build_sss_index(t, 8, 4, 1, &CancelToken::new()),
            Err(BuildError::InputTooShort { .. })
        ));
    }

    #[test]
    fn is_smaller_suffix_matches_direct_comparison() {
        let t: Vec<u8> = (0..2000).map(|_| b"AB"[rand::random::<usize>() % 2]).collect();
        let idx = build_sss_index(t.clone(), 8, 4, 0x1234_5678_9abc_def1, &CancelToken::new()).unwrap();
        for _ in 0..200 {
            let i = rand::random::<usize>() % t.len();
            let j = rand::random::<usize>() % t.len();
            let got = idx.is_smaller_suffix(i as u64, j as u64).unwrap();
            let want = t[i..] < t[j..];
            assert_eq!(got, want, "i={i} j={j}");
        }
    }

    #[test]
    fn alternating_pattern_matches_naive() {
        let t = b"abababababab".to_vec();
        let tau = 2;
        let idx = build_sss_index(t.clone(), tau, 2, 0x1234_5678_9abc_def1, &CancelToken::new()).unwrap();
        for i in 0..t.len() {
            for j in 0..t.len() {
                let got = idx.lce(i as u64, j as u64).unwrap();
                assert_eq!(got as usize, naive_lce(&t, i, j), "i={i} j={j}");
            }
        }
    }

    #[test]
    fn mississippi_matches_naive() {
        let t = b"mississippi".to_vec();
        let tau = 2;
        let idx = build_sss_index(t.clone(), tau, 2, 0x1234_5678_9abc_def1, &CancelToken::new()).unwrap();
        for i in 0..t.len() {
            for j in 0..t.len() {
                let got = idx.lce(i as u64, j as u64).unwrap();
                assert_eq!(got as usize, naive_lce(&t, i, j), "i={i} j={j}");
            }
        }
    }

    #[test]
    fn long_run_triggers_runs_detection_and_matches_naive() {
        let mut t = vec![b'a'; 1024];
        t.push(b'b');
        t.extend(std::iter::repeat(b'a').take(1024));
        assert_eq!(t.len(), 2049);

        let tau = 16;
        let idx = build_sss_index(t.clone(), tau, 4, 0x9E37_79B9_7F4A_7C15, &CancelToken::new()).unwrap();

        assert_eq!(idx.lce(0, 1025).unwrap(), 1024);
        assert_eq!(idx.lce(0, 1024).unwrap(), 0);

        for _ in 0..300 {
            let i = rand::random::<usize>() % t.len();
            let j = rand::random::<usize>() % t.len();
            let got = idx.lce(i as u64, j as u64).unwrap();
            assert_eq!(got as usize, naive_lce(&t, i, j), "i={i} j={j}");
        }
    }
}
