//! The single randomness source for winner selection: an HMAC-SHA256
//! keystream in counter mode, keyed by the revealed server seed over
//! the closed public context. Same inputs, same stream, on any
//! machine, forever.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::seed_vault::RevealedSeed;

type HmacSha256 = Hmac<Sha256>;

const BLOCK_LEN: usize = 32;

/// Deterministic integer stream derived from
/// `HMAC(seed, entropy || context_ts || participants_hash || counter)`.
pub struct DeterministicShuffler {
    base: HmacSha256,
    prefix: Vec<u8>,
    counter: u64,
    block: [u8; BLOCK_LEN],
    offset: usize,
}

impl DeterministicShuffler {
    pub fn new(
        seed: &RevealedSeed,
        external_entropy: &str,
        context_ts: i64,
        participants_hash: &[u8; 32],
    ) -> Self {
        let entropy = external_entropy.as_bytes();
        let mut prefix = Vec::with_capacity(entropy.len() + 8 + participants_hash.len());
        prefix.extend_from_slice(entropy);
        prefix.extend_from_slice(&context_ts.to_be_bytes());
        prefix.extend_from_slice(participants_hash);
        let base = HmacSha256::new_from_slice(seed.bytes()).expect("hmac accepts any key length");
        Self {
            base,
            prefix,
            counter: 0,
            block: [0u8; BLOCK_LEN],
            offset: BLOCK_LEN,
        }
    }

    fn refill(&mut self) {
        let mut mac = self.base.clone();
        mac.update(&self.prefix);
        mac.update(&self.counter.to_be_bytes());
        self.block.copy_from_slice(&mac.finalize().into_bytes());
        self.counter += 1;
        self.offset = 0;
    }

    /// Next 8 keystream bytes, big-endian.
    pub fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        for b in bytes.iter_mut() {
            if self.offset == BLOCK_LEN {
                self.refill();
            }
            *b = self.block[self.offset];
            self.offset += 1;
        }
        u64::from_be_bytes(bytes)
    }

    /// Uniform integer in `[0, n)`. Rejection sampling: draws outside
    /// the largest multiple-of-`n` zone are discarded, so no residue
    /// is favored. No floating point.
    pub fn next_below(&mut self, n: u64) -> u64 {
        debug_assert!(n > 0, "sample bound must be positive");
        // Number of values to strip off the top of the u64 range.
        let cut = (u64::MAX % n + 1) % n;
        loop {
            let v = self.next_u64();
            if cut == 0 || v <= u64::MAX - cut {
                return v % n;
            }
        }
    }

    /// Draws `k` distinct positions out of `0..n` by partial
    /// Fisher-Yates, returned in draw order. Callers guarantee
    /// `k <= n` before consuming any randomness.
    pub fn pick_distinct(&mut self, n: u64, k: usize) -> Vec<u64> {
        debug_assert!(k as u64 <= n, "cannot draw more positions than exist");
        let mut positions: Vec<u64> = (0..n).collect();
        for i in 0..k {
            let j = i + self.next_below(n - i as u64) as usize;
            positions.swap(i, j);
        }
        positions.truncate(k);
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed_vault::RevealedSeed;

    fn shuffler_with(entropy: &str, ts: i64, hash_fill: u8, seed_fill: u8) -> DeterministicShuffler {
        let seed = RevealedSeed::from_bytes([seed_fill; 32]);
        DeterministicShuffler::new(&seed, entropy, ts, &[hash_fill; 32])
    }

    fn default_shuffler() -> DeterministicShuffler {
        shuffler_with("entropy-1234567890ab", 1_700_000_000, 3, 9)
    }

    #[test]
    fn identical_inputs_give_identical_streams() {
        let mut a = default_shuffler();
        let mut b = default_shuffler();
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn every_input_perturbs_the_stream() {
        let base: Vec<u64> = {
            let mut s = default_shuffler();
            (0..4).map(|_| s.next_u64()).collect()
        };
        let variants = [
            shuffler_with("entropy-1234567890ac", 1_700_000_000, 3, 9),
            shuffler_with("entropy-1234567890ab", 1_700_000_001, 3, 9),
            shuffler_with("entropy-1234567890ab", 1_700_000_000, 4, 9),
            shuffler_with("entropy-1234567890ab", 1_700_000_000, 3, 8),
        ];
        for mut variant in variants {
            let stream: Vec<u64> = (0..4).map(|_| variant.next_u64()).collect();
            assert_ne!(stream, base);
        }
    }

    #[test]
    fn samples_stay_in_range() {
        let mut s = default_shuffler();
        for n in [1u64, 2, 3, 7, 10, 997, u32::MAX as u64 + 1] {
            for _ in 0..200 {
                assert!(s.next_below(n) < n);
            }
        }
    }

    #[test]
    fn bound_of_one_always_yields_zero() {
        let mut s = default_shuffler();
        for _ in 0..50 {
            assert_eq!(s.next_below(1), 0);
        }
    }

    #[test]
    fn picks_are_distinct_and_in_range() {
        let mut s = default_shuffler();
        let picks = s.pick_distinct(10, 3);
        assert_eq!(picks.len(), 3);
        let mut seen = picks.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 3);
        assert!(picks.iter().all(|p| *p < 10));
    }

    #[test]
    fn full_draw_is_a_permutation() {
        let mut s = default_shuffler();
        let mut picks = s.pick_distinct(25, 25);
        picks.sort_unstable();
        assert_eq!(picks, (0..25).collect::<Vec<u64>>());
    }

    #[test]
    fn picks_are_deterministic() {
        let mut a = default_shuffler();
        let mut b = default_shuffler();
        assert_eq!(a.pick_distinct(1000, 50), b.pick_distinct(1000, 50));
    }

    #[test]
    fn small_bounds_visit_every_value() {
        let mut s = default_shuffler();
        let mut seen = [false; 5];
        for _ in 0..500 {
            seen[s.next_below(5) as usize] = true;
        }
        assert!(seen.iter().all(|v| *v));
    }
}
