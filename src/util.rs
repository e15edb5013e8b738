//! Hashing helpers shared by [`crate::CuckooFilter`] and
//! [`crate::LogarithmicDynamicCuckooFilter`].
//!
//! Mirrors the role the teacher's own `util` module played: turning an
//! arbitrary hashable item into a fingerprint, plus the alternate-index
//! computation used both for the second candidate bucket and for
//! relocating a kicked-out fingerprint during eviction.

use std::hash::{Hash, Hasher};

/// Hashes an arbitrary `Hash` item with a fresh `H`.
pub(crate) fn hash_item<T: ?Sized + Hash, H: Hasher + Default>(item: &T) -> u64 {
    let mut hasher = H::default();
    item.hash(&mut hasher);
    hasher.finish()
}

/// Hashes a raw `u64`, used to derive the alternate bucket index from a
/// fingerprint (`hash(fp)` in the spec's `i2 = i1 XOR hash(fp)` identity).
pub(crate) fn hash_u64<H: Hasher + Default>(value: u64) -> u64 {
    let mut hasher = H::default();
    value.hash(&mut hasher);
    hasher.finish()
}

pub(crate) fn mask_u64(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// `i2 = (i1 XOR hash(fp)) mod N`. Because `n` is a power of two, applying
/// this function twice with the same `fp` is an involution: it maps `i1`
/// to `i2` and `i2` back to `i1`.
pub(crate) fn alt_index<H: Hasher + Default>(i: usize, fp: u64, n: usize) -> usize {
    (i ^ (hash_u64::<H>(fp) as usize)) & (n - 1)
}

/// Returns `true` when `fp`'s bit at `level` is `0`, meaning the item
/// routes to `child0`; `false` routes to `child1`.
pub(crate) fn prefix_bit(fp: u64, level: usize) -> bool {
    (fp >> level) & 1 == 0
}
