//! String synchronizing set construction.
//!
//! Pass 1 (no runs) is a sliding-window-minimum scan over rolling
//! fingerprints using a monotonic deque. Pass 2 kicks in when pass 1's
//! output is too dense to be useful (highly periodic text produces far
//! more than the expected O(n/tau) sync-set elements): it tracks, for
//! every window, whether it has a period of length <= tau/3, then uses
//! that period information to fill S directly while skipping positions
//! already known to be non-minimal.

use std::collections::{HashMap, VecDeque};

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::{BuildError, BuildResult};
use crate::rolling_hash::RollingHash;

pub struct SyncSet {
    /// Sorted positions, including the run sentinel when runs were detected.
    pub positions: Vec<usize>,
    /// Populated only when pass 2 (runs) ran.
    pub run_rank: HashMap<usize, i64>,
    pub tau: usize,
    pub has_runs: bool,
}

/// Density above which pass 1's output is discarded and rebuilt with runs
/// detection.
fn density_threshold(n: usize, tau: usize) -> usize {
    (6 * n) / tau
}

/// `parallelism` is the number of worker partitions used for the
/// embarrassingly-parallel scans (fingerprinting, period detection);
/// `base` is the rolling hash's seedable base.
pub fn build_sync_set(
    t: &[u8],
    tau: usize,
    parallelism: usize,
    base: u128,
    cancel: &CancelToken,
) -> BuildResult<SyncSet> {
    let n = t.len();
    let fp = compute_fingerprints(t, tau, parallelism, base, cancel)?;
    let positions = sync_set_from_fingerprints(&fp, tau);

    if positions.len() <= density_threshold(n, tau) {
        return Ok(SyncSet {
            positions,
            run_rank: HashMap::new(),
            tau,
            has_runs: false,
        });
    }

    if cancel.is_cancelled() {
        return Err(BuildError::Cancelled);
    }
    build_sync_set_with_runs(t, tau, &fp, parallelism, cancel)
}

/// Rolling fingerprint of every length-`tau` window, computed by splitting
/// the text into `parallelism` chunks and seeding each chunk's rolling hash
/// independently (each window only depends on `tau` bytes of context, so
/// chunks are embarrassingly parallel).
fn compute_fingerprints(
    t: &[u8],
    tau: usize,
    parallelism: usize,
    base: u128,
    cancel: &CancelToken,
) -> BuildResult<Vec<u128>> {
    let count = t.len() - tau + 1;
    let chunks = parallelism.max(1);
    let chunk_size = count.div_ceil(chunks).max(1);

    let cancelled = std::sync::atomic::AtomicBool::new(false);
    let out: Vec<u128> = (0..count)
        .into_par_iter()
        .step_by(chunk_size)
        .flat_map_iter(|start| {
            let end = (start + chunk_size).min(count);
            let mut local = Vec::with_capacity(end - start);
            if cancel.is_cancelled() {
                cancelled.store(true, std::sync::atomic::Ordering::Relaxed);
                return local;
            }
            if start < end {
                let mut h = RollingHash::new(t, start, tau, base);
                local.push(h.fingerprint());
                for _ in start + 1..end {
                    local.push(h.roll());
                }
            }
            local
        })
        .collect();
    if cancelled.load(std::sync::atomic::Ordering::Relaxed) {
        return Err(BuildError::Cancelled);
    }
    Ok(out)
}

/// Sliding-window minimum of `fp` over windows of length `window`, one
/// value per window start (`out[k] == min(fp[k..k+window])`).
fn window_min(fp: &[u128], window: usize) -> Vec<u128> {
    let mut out = Vec::with_capacity(fp.len() + 1 - window);
    let mut dq: VecDeque<(usize, u128)> = VecDeque::new();
    for i in 0..fp.len() {
        while dq.back().is_some_and(|&(_, v)| v >= fp[i]) {
            dq.pop_back();
        }
        dq.push_back((i, fp[i]));
        while dq.front().unwrap().0 + window <= i {
            dq.pop_front();
        }
        if i + 1 >= window {
            out.push(dq.front().unwrap().1);
        }
    }
    out
}

/// Position `i` is in S iff the minimum of the tau+1 fingerprints anchored
/// at offsets `0..=tau` is attained at offset 0 or offset tau.
fn sync_set_from_fingerprints(fp: &[u128], tau: usize) -> Vec<usize> {
    let mins = window_min(fp, tau + 1);
    let mut s = Vec::new();
    for (i, &m) in mins.iter().enumerate() {
        if fp[i] == m || fp[i + tau] == m {
            s.push(i);
        }
    }
    s
}

/// Returns `(period has length <= tau/3, the period found)` for the window
/// `t[from..from+tau)`.
fn per1tau(t: &[u8], from: usize, tau: usize) -> (bool, usize) {
    let third = tau / 3;
    let mut i_to_compare = 0usize;
    let mut period = 1usize;
    let mut i = 1usize;
    while i < third {
        if t[from + i_to_compare] == t[from + i] {
            i_to_compare += 1;
        } else {
            if i_to_compare != 0 {
                i -= 1;
            }
            i_to_compare = 0;
            period = i + 1;
        }
        i += 1;
    }
    for k in i..tau {
        if t[from + k] != t[from + k - period] {
            return (false, period);
        }
    }
    (true, period)
}

/// For every `i` in `[from, to)`, finds the offset of the minimum id among
/// the tau+1 fingerprints anchored at `i`, skipping any offset whose anchor
/// lies in `q`, and records `i` in S when that offset is 0 or tau.
///
/// Sequential by construction: each step's starting point depends on how
/// far the previous step's scan for a new minimum advanced, so there is no
/// fixed partitioning into independent chunks.
fn fill_s(id: &[u128], q: &[bool], tau: usize, from: usize, to: usize) -> Vec<usize> {
    let mut s = Vec::new();
    let mut i = from;
    while i < to {
        let mut min;
        if !q[i] {
            min = 0;
            if !q[i + tau] && id[i] >= id[i + tau] {
                min = tau;
            }
        } else if !q[i + tau] {
            min = tau;
        } else {
            min = 0;
            for j in 1..tau {
                if !q[i + j] {
                    min = j;
                }
            }
        }

        for j in 1..tau {
            if !q[i + j] && id[i + j] < id[i + min] {
                min = j;
            }
        }

        if min == 0 || min == tau {
            s.push(i);
        }

        let mut local_min = i + min;
        while i < local_min && i < to {
            i += 1;
            if !q[i + tau] && id[i + tau] <= id[local_min] {
                s.push(i);
                local_min = tau;
            }
        }
        i += 1;
    }
    s
}

/// Runs `per1tau` over every window start, split into `parallelism` chunks
/// (each window's classification only reads `t[from..from+tau)`, so chunks
/// are independent).
fn compute_periods(t: &[u8], tau: usize, q_len: usize, parallelism: usize) -> Vec<(bool, usize)> {
    let chunks = parallelism.max(1);
    let chunk_size = q_len.div_ceil(chunks).max(1);
    (0..q_len)
        .into_par_iter()
        .step_by(chunk_size)
        .flat_map_iter(|start| {
            let end = (start + chunk_size).min(q_len);
            (start..end).map(|from| per1tau(t, from, tau)).collect::<Vec<_>>()
        })
        .collect()
}

fn build_sync_set_with_runs(
    t: &[u8],
    tau: usize,
    fp: &[u128],
    parallelism: usize,
    cancel: &CancelToken,
) -> BuildResult<SyncSet> {
    let n = t.len();
    let q_len = n - tau + 1;
    let mut q = vec![false; n];
    let mut periods = vec![1usize; q_len];
    for (from, (is_periodic, period)) in compute_periods(t, tau, q_len, parallelism).into_iter().enumerate() {
        q[from] = is_periodic;
        periods[from] = period;
    }

    if cancel.is_cancelled() {
        return Err(BuildError::Cancelled);
    }

    let to = n - 2 * tau;
    let mut positions = fill_s(fp, &q, tau, 0, to);

    let mut run_rank = HashMap::new();
    let mut lo = 0usize;
    while lo < q_len {
        if !q[lo] {
            lo += 1;
            continue;
        }
        let mut hi = lo;
        while hi + 1 < q_len && q[hi + 1] {
            hi += 1;
        }
        let period = periods[lo];
        let run_end = hi + tau - 1; // last text index covered by the run
        let run_len = run_end - lo + 1;
        if run_len >= 3 * tau - 1 {
            if let Some(&s) = positions.iter().rev().find(|&&s| s < lo) {
                let sss_pos2 = run_end + 1;
                if sss_pos2 < n && run_end >= period {
                    let sign = if t[run_end + 1] > t[run_end - period + 1] {
                        1i64
                    } else {
                        -1i64
                    };
                    let rank = (n as i64 - sss_pos2 as i64 + s as i64) * sign;
                    run_rank.insert(s, rank);
                }
            }
        }
        lo = hi + 1;
    }

    positions.push(n - 2 * tau + 1);

    Ok(SyncSet {
        positions,
        run_rank,
        tau,
        has_runs: true,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn verify_sync_set(t: &[u8], tau: usize, s: &[usize]) {
        let fp = compute_fingerprints(t, tau, 4, 0x9E37_79B9_7F4A_7C15, &CancelToken::new()).unwrap();
        for &i in s {
            if i + tau > fp.len() {
                continue; // sentinel / beyond fingerprint range
            }
            let window = &fp[i..=(i + tau).min(fp.len() - 1)];
            let m = *window.iter().min().unwrap();
            assert!(
                fp[i] == m || fp.get(i + tau).map_or(false, |&v| v == m),
                "position {i} not a true sync-set element"
            );
        }
    }

    #[test]
    fn small_no_runs_is_consistent() {
        let t: Vec<u8> = (0..2000).map(|_| rand::random::<u8>()).collect();
        let tau = 16;
        let set = build_sync_set(&t, tau, 4, 0x9E37_79B9_7F4A_7C15, &CancelToken::new()).unwrap();
        verify_sync_set(&t, tau, &set.positions);
        for w in set.positions.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn repetitive_input_triggers_runs() {
        let mut t = vec![b'a'; 20_000];
        for (i, b) in t.iter_mut().enumerate() {
            if i % 997 == 0 {
                *b = b'b';
            }
        }
        let tau = 64;
        let set = build_sync_set(&t, tau, 4, 0x9E37_79B9_7F4A_7C15, &CancelToken::new()).unwrap();
        assert!(set.has_runs);
        assert_eq!(*set.positions.last().unwrap(), t.len() - 2 * tau + 1);
    }

    #[test]
    fn window_min_matches_naive() {
        let fp: Vec<u128> = (0..500).map(|x| (x * 2654435761) as u128).collect();
        let window = 17;
        let got = window_min(&fp, window);
        for (k, &v) in got.iter().enumerate() {
            let want = *fp[k..k + window].iter().min().unwrap();
            assert_eq!(v, want, "k={k}");
        }
    }

    #[test]
    fn cancelled_token_aborts_build() {
        let t: Vec<u8> = (0..2000).map(|_| rand::random::<u8>()).collect();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = build_sync_set(&t, 16, 4, 0x9E37_79B9_7F4A_7C15, &cancel).unwrap_err();
        assert!(matches!(err, BuildError::Cancelled));
    }
}
