//! In-place Rabin-Karp LCE index.
//!
//! Construction views T as 8-byte blocks and runs a Horner evaluation mod a
//! fixed prime, keeping only the running fingerprint per block and
//! discarding the original bytes; `lce(i,j)` does a naive byte scan up to a
//! fixed threshold, then grows the matched length by exponential doubling
//! and refines with a binary search, both steps driven by O(1)
//! prefix-fingerprint lookups.
//!
//! Each raw 8-byte block can land up to 8 multiples of `Q61` above the
//! fingerprint it reduces to, so a single overflow bit (sound only when the
//! modulus sits just below 2^64) can't disambiguate which multiple to add
//! back when reconstructing a block's original bytes. The per-block
//! quotient (0..=8, 4 bits) is kept instead in a side `BitPackedVec`,
//! alongside the fingerprint array.

use crate::bitpacked::BitPackedVec;
use crate::cancel::CancelToken;
use crate::error::{BuildError, BuildResult, QueryError, QueryResult};
use crate::mersenne61::{addmod, mulmod, submod, Q61};

/// How often the block-folding loop checks `cancel`, in blocks. The fold is
/// a sequential Horner recurrence (each block's fingerprint depends on the
/// previous one), so cancellation can't be pushed into a parallel chunk the
/// way the SSS builder's scans can; polling this often keeps the cost of
/// the check itself negligible.
const CANCEL_CHECK_INTERVAL: usize = 1 << 16;

const BLOCK_BYTES: usize = 8;
const OVERFLOW_BITS: usize = 4;
/// Below this many matched bytes, `lce` compares reconstructed bytes
/// directly instead of touching fingerprints.
const T_NAIVE: usize = 128;

/// `256^(2^k) mod Q61`, i.e. the per-level multiplier used by both the
/// exponential-search doubling and the byte-offset-within-block fixups.
fn build_pow2_table(max_k: usize) -> Vec<u64> {
    let mut pow2 = Vec::with_capacity(max_k + 1);
    pow2.push(256u64 % Q61 as u64);
    for k in 1..=max_k {
        let prev = pow2[k - 1];
        pow2.push(mulmod(prev, prev));
    }
    pow2
}

pub struct PrezzaIndex {
    n: usize,
    num_blocks: usize,
    /// `fingerprints[b]` is the Horner fingerprint of `T[0..8(b+1))` mod
    /// Q61.
    fingerprints: Vec<u64>,
    /// `overflow.get(b)` is the raw 8-byte block value divided by Q61,
    /// needed to reconstruct the block exactly from its fingerprint.
    overflow: BitPackedVec,
    /// `pow2[k] == 256^(2^k) mod Q61`.
    pow2: Vec<u64>,
    /// `byte_pow[r] == 256^r mod Q61`, r in 0..=8.
    byte_pow: [u64; BLOCK_BYTES + 1],
}

/// Builds a `PrezzaIndex` from `t`, consuming it: the original byte buffer
/// is dropped once the fingerprint array is built, so the index overwrites
/// its input in effect without requiring unsafe reinterpretation of the
/// backing allocation. `retransform_text` is the only way to get the bytes
/// back.
pub fn build_prezza_index(t: Vec<u8>, cancel: &CancelToken) -> BuildResult<PrezzaIndex> {
    let n = t.len();
    if n < BLOCK_BYTES {
        return Err(BuildError::InputTooShort { len: n, needed: BLOCK_BYTES });
    }

    let num_blocks = n.div_ceil(BLOCK_BYTES);
    let mut fingerprints = Vec::with_capacity(num_blocks);
    let mut overflow = BitPackedVec::new(num_blocks, OVERFLOW_BITS);

    let byte_pow = {
        let mut p = [1u64; BLOCK_BYTES + 1];
        for r in 1..=BLOCK_BYTES {
            p[r] = mulmod(p[r - 1], 256u64 % Q61 as u64);
        }
        p
    };
    let base64 = byte_pow[BLOCK_BYTES];

    let mut prev_fp = 0u64;
    for b in 0..num_blocks {
        if b % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        let start = b * BLOCK_BYTES;
        let avail = (n - start).min(BLOCK_BYTES);
        let mut buf = [0u8; BLOCK_BYTES];
        buf[..avail].copy_from_slice(&t[start..start + avail]);
        let raw = u64::from_be_bytes(buf);

        let quotient = (raw as u128 / Q61) as u64;
        debug_assert!(quotient <= 8);
        overflow.set(b, quotient);

        let reduced_raw = raw - quotient * Q61 as u64;
        let fp = addmod(mulmod(prev_fp, base64), reduced_raw);
        fingerprints.push(fp);
        prev_fp = fp;
    }

    let max_k = (num_blocks.max(2).ilog2() as usize) + 6;
    let pow2 = build_pow2_table(max_k);

    Ok(PrezzaIndex { n, num_blocks, fingerprints, overflow, pow2, byte_pow })
}

impl PrezzaIndex {
    pub fn size_bytes(&self) -> u64 {
        let fp_bytes = self.fingerprints.len() * std::mem::size_of::<u64>();
        let overflow_bytes = self.num_blocks.div_ceil(16); // 4 bits/entry
        (fp_bytes + overflow_bytes) as u64
    }

    fn check_bounds(&self, i: u64) -> QueryResult<usize> {
        let idx = i as usize;
        if idx >= self.n {
            return Err(QueryError::OutOfRange { index: i, len: self.n as u64 });
        }
        Ok(idx)
    }

    /// Fingerprint of `T[0..b)`'s blocks, i.e. `fingerprints[b-1]`, with the
    /// empty prefix mapped to 0.
    fn fp_before(&self, b: usize) -> u64 {
        if b == 0 {
            0
        } else {
            self.fingerprints[b - 1]
        }
    }

    /// Reconstructs the raw 8-byte block `b` (big-endian packed), or 0 for
    /// `b >= num_blocks` (the implicit zero padding past the end of T).
    fn get_block(&self, b: usize) -> u64 {
        if b >= self.num_blocks {
            return 0;
        }
        let prev = self.fp_before(b);
        let base64 = self.byte_pow[BLOCK_BYTES];
        let reduced_raw = submod(self.fingerprints[b], mulmod(prev, base64));
        reduced_raw + self.overflow.get(b) * Q61 as u64
    }

    /// Byte `i` of the original text, reconstructed from two fingerprints.
    pub fn get_byte(&self, i: u64) -> QueryResult<u8> {
        let idx = self.check_bounds(i)?;
        let b = idx / BLOCK_BYTES;
        let offset_from_msb = idx % BLOCK_BYTES;
        let block = self.get_block(b);
        let shift = 8 * (BLOCK_BYTES - 1 - offset_from_msb);
        Ok(((block >> shift) & 0xFF) as u8)
    }

    /// Fingerprint of `T[0..k)`, for any `k` in `0..=n` (not necessarily
    /// block-aligned).
    fn fp_prefix(&self, k: usize) -> u64 {
        let b = k / BLOCK_BYTES;
        let r = k % BLOCK_BYTES;
        if r == 0 {
            return self.fp_before(b);
        }
        let prev = self.fp_before(b);
        let block = self.get_block(b);
        let top_r_bytes = block >> (8 * (BLOCK_BYTES - r));
        addmod(mulmod(prev, self.byte_pow[r]), top_r_bytes)
    }

    /// `256^len mod Q61`, where `len` need not be a power of two (built
    /// from the power-of-two table via binary decomposition).
    fn pow256(&self, mut len: usize) -> u64 {
        let mut result = 1u64;
        let mut k = 0;
        while len > 0 {
            if len & 1 == 1 {
                result = mulmod(result, self.pow2[k]);
            }
            len >>= 1;
            k += 1;
        }
        result
    }

    /// Fingerprint of `T[a..a+len)`, for `a + len <= n`.
    fn fingerprint_range(&self, a: usize, len: usize) -> u64 {
        let hi = self.fp_prefix(a + len);
        let lo_scaled = mulmod(self.fp_prefix(a), self.pow256(len));
        submod(hi, lo_scaled)
    }

    /// Longest common extension of `T[i..]` and `T[j..]`.
    pub fn lce(&self, i: u64, j: u64) -> QueryResult<u64> {
        let i = self.check_bounds(i)?;
        let j = self.check_bounds(j)?;
        if i == j {
            return Ok((self.n - i) as u64);
        }

        let max_length = self.n - i.max(j);

        let naive_len = T_NAIVE.min(max_length);
        let mut k = 0;
        while k < naive_len {
            if self.get_byte((i + k) as u64)? != self.get_byte((j + k) as u64)? {
                return Ok(k as u64);
            }
            k += 1;
        }
        if naive_len == max_length {
            return Ok(max_length as u64);
        }

        // Exponential search: start one level above the naive threshold,
        // comparing fingerprints of T[i..i+dist) against T[j..j+dist),
        // which subsumes the already-matched naive prefix.
        let mut exp = (2 * T_NAIVE).trailing_zeros() as usize;
        let mut dist = 2 * T_NAIVE;
        while dist < max_length {
            if self.fingerprint_range(i, dist) != self.fingerprint_range(j, dist) {
                break;
            }
            exp += 1;
            dist *= 2;
        }
        exp -= 1;
        dist /= 2;

        let mut i2 = i + dist;
        let mut j2 = j + dist;
        let max_length2 = self.n - i2.max(j2);
        while exp != 0 {
            exp -= 1;
            dist /= 2;
            if dist > max_length2 || i2 + dist > self.n || j2 + dist > self.n {
                continue;
            }
            if self.fingerprint_range(i2, dist) == self.fingerprint_range(j2, dist) {
                i2 += dist;
                j2 += dist;
            }
        }
        Ok((i2 - i) as u64)
    }

    /// Reverses the destructive construction, returning the original bytes.
    pub fn retransform_text(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.n);
        for b in 0..self.num_blocks {
            let block = self.get_block(b);
            let start = b * BLOCK_BYTES;
            let avail = (self.n - start).min(BLOCK_BYTES);
            out.extend_from_slice(&block.to_be_bytes()[..avail]);
        }
        out
    }
}
