//! Approximate duplicate detection for credit/debit/order identifiers
//!
//! A bloom filter keeps per-id dedup memory bounded. False positives are
//! possible and surface as `Conflicted` errors on a fresh id (callers
//! retry with a new one); false negatives are not.
//!
//! Hashing is deterministic double hashing over two seeded `FxHasher`
//! passes, so a filter restored from a snapshot answers membership
//! queries identically to the original.

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Seed for the second hash pass; any fixed odd value works.
const SECOND_HASH_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    items: u64,
}

impl BloomFilter {
    /// Size the filter for an expected item count and target false
    /// positive rate, using the standard `m = -n ln p / (ln 2)^2`,
    /// `k = (m / n) ln 2` formulas.
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        let capacity = capacity.max(1) as f64;
        let rate = false_positive_rate.clamp(1e-12, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let num_bits = (-(capacity * rate.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / capacity) * ln2).ceil().max(1.0) as u32;
        Self {
            bits: vec![0; num_bits.div_ceil(64) as usize],
            num_bits,
            num_hashes,
            items: 0,
        }
    }

    fn hash_pair(id: &str) -> (u64, u64) {
        let mut first = FxHasher::default();
        first.write(id.as_bytes());
        let mut second = FxHasher::default();
        second.write_u64(SECOND_HASH_SEED);
        second.write(id.as_bytes());
        (first.finish(), second.finish())
    }

    fn bit_positions(&self, id: &str) -> impl Iterator<Item = u64> + '_ {
        let (h1, h2) = Self::hash_pair(id);
        (0..self.num_hashes as u64)
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2 | 1)) % self.num_bits)
    }

    pub fn insert(&mut self, id: &str) {
        let positions: Vec<u64> = self.bit_positions(id).collect();
        for pos in positions {
            self.bits[(pos / 64) as usize] |= 1u64 << (pos % 64);
        }
        self.items += 1;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bit_positions(id)
            .all(|pos| self.bits[(pos / 64) as usize] & (1u64 << (pos % 64)) != 0)
    }

    /// Number of inserted items (not distinct ids).
    pub fn items(&self) -> u64 {
        self.items
    }
}
