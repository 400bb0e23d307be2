//! Two-level successor/predecessor index over a sorted array.
//!
//! A high-bits table (`hi_idx`), built by a single forward sweep, maps each
//! key prefix to the range of array indices it covers. A lookup narrows to
//! that range, then binary-searches the low bits, falling back to a linear
//! scan once the range shrinks to cache size.

/// Result of a `successor`/`predecessor` lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub exists: bool,
    pub pos: usize,
}

pub struct SuccessorIndex {
    array: Vec<u64>,
    min: u64,
    max: u64,
    key_min: u64,
    key_max: u64,
    lo_bits: u32,
    cache_num: usize,
    hi_idx: Vec<usize>,
}

impl SuccessorIndex {
    /// Builds an index over `array`, which must be sorted ascending and
    /// non-empty. `lo_bits` splits each key into the low bits searched
    /// linearly/by binary search and the high bits (typically 8..12) that
    /// key the `hi_idx` table.
    pub fn new(array: Vec<u64>, lo_bits: u32) -> Self {
        assert!(!array.is_empty());
        debug_assert!(array.windows(2).all(|w| w[0] <= w[1]));

        let min = array[0];
        let max = array[array.len() - 1];
        let key_min = min >> lo_bits;
        let key_max = max >> lo_bits;

        let mut hi_idx = vec![0usize; (key_max - key_min + 2) as usize];
        let mut prev_key = key_min;
        for (i, &v) in array.iter().enumerate().skip(1) {
            let cur_key = v >> lo_bits;
            if cur_key > prev_key {
                for key in (prev_key + 1)..=cur_key {
                    hi_idx[(key - key_min) as usize] = i - 1;
                }
            }
            prev_key = cur_key;
        }
        *hi_idx.last_mut().unwrap() = array.len() - 1;

        let cache_num = (512 / std::mem::size_of::<u64>()).max(1);

        Self {
            array,
            min,
            max,
            key_min,
            key_max,
            lo_bits,
            cache_num,
            hi_idx,
        }
    }

    #[inline]
    fn hi(&self, x: u64) -> u64 {
        x >> self.lo_bits
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Greatest element <= x.
    pub fn predecessor(&self, x: u64) -> Lookup {
        if x < self.min {
            return Lookup { exists: false, pos: 0 };
        }
        if x >= self.max {
            return Lookup { exists: true, pos: self.array.len() - 1 };
        }

        let key = self.hi(x) - self.key_min;
        let q = self.hi_idx[key as usize + 1];
        if self.array[q] == x {
            return Lookup { exists: true, pos: q };
        }
        let p = self.hi_idx[key as usize];
        self.predecessor_seeded(x, p, q)
    }

    /// Smallest element >= x.
    pub fn successor(&self, x: u64) -> Lookup {
        if x <= self.min {
            return Lookup { exists: true, pos: 0 };
        }
        if x > self.max {
            return Lookup { exists: false, pos: 0 };
        }

        let key = self.hi(x) - self.key_min;
        let raw_q = self.hi_idx[key as usize + 1] + 1;
        let q = raw_q.min(self.array.len() - 1);
        if self.array[q] == x {
            return Lookup { exists: true, pos: q };
        }
        let p = self.hi_idx[key as usize] + 1;
        self.successor_seeded(x, p, q)
    }

    fn predecessor_seeded(&self, x: u64, mut p: usize, mut q: usize) -> Lookup {
        while q - p > self.cache_num {
            let m = (p + q) / 2;
            if self.array[m] <= x {
                p = m;
            } else {
                q = m;
            }
        }
        while self.array[p] <= x {
            p += 1;
        }
        Lookup { exists: true, pos: p - 1 }
    }

    fn successor_seeded(&self, x: u64, mut p: usize, mut q: usize) -> Lookup {
        while q - p > self.cache_num {
            let m = (p + q) / 2;
            if self.array[m] < x {
                p = m;
            } else {
                q = m;
            }
        }
        while self.array[p] < x {
            p += 1;
        }
        Lookup { exists: true, pos: p }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn naive_predecessor(a: &[u64], x: u64) -> Lookup {
        match a.iter().rposition(|&v| v <= x) {
            Some(pos) => Lookup { exists: true, pos },
            None => Lookup { exists: false, pos: 0 },
        }
    }

    fn naive_successor(a: &[u64], x: u64) -> Lookup {
        match a.iter().position(|&v| v >= x) {
            Some(pos) => Lookup { exists: true, pos },
            None => Lookup { exists: false, pos: 0 },
        }
    }

    #[test]
    fn matches_naive_on_random_arrays() {
        for _ in 0..50 {
            let mut vals: Vec<u64> = (0..500).map(|_| rand::random::<u64>() % 5000).collect();
            vals.sort_unstable();
            vals.dedup();
            if vals.is_empty() {
                continue;
            }
            let idx = SuccessorIndex::new(vals.clone(), 4);
            for _ in 0..200 {
                let x = rand::random::<u64>() % 5500;
                assert_eq!(idx.predecessor(x), naive_predecessor(&vals, x), "pred x={x}");
                assert_eq!(idx.successor(x), naive_successor(&vals, x), "succ x={x}");
            }
        }
    }

    #[test]
    fn single_element_array() {
        let idx = SuccessorIndex::new(vec![42], 3);
        assert_eq!(idx.predecessor(42), Lookup { exists: true, pos: 0 });
        assert_eq!(idx.predecessor(100), Lookup { exists: true, pos: 0 });
        assert_eq!(idx.predecessor(10), Lookup { exists: false, pos: 0 });
        assert_eq!(idx.successor(42), Lookup { exists: true, pos: 0 });
        assert_eq!(idx.successor(10), Lookup { exists: true, pos: 0 });
        assert_eq!(idx.successor(100), Lookup { exists: false, pos: 0 });
    }
}
