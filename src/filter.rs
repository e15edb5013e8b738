use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use bitvec::prelude::{BitBox, Lsb0};
use rand::Rng;

use crate::bucket::{Bucket, BUCKET_SIZE};
use crate::error::LdcfError;
use crate::util::{alt_index, hash_item, mask_u64, prefix_bit};

#[cfg(feature = "serde_support")]
use serde_derive::{Deserialize, Serialize};

/// Target load factor: the fraction of the `N * B` slots a filter is
/// willing to fill before it is considered full.
pub const LOAD_FACTOR: f64 = 0.935;

/// Upper bound on the number of relocations a single insert will attempt
/// before giving up and emitting a victim.
pub const MAX_KICKS: usize = 100;

/// A fingerprint evicted after exhausting the kick budget, carrying enough
/// information for a child filter to place it without re-hashing the
/// original item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Victim {
    /// Full-width fingerprint (not yet shifted for any particular depth).
    pub fingerprint: u64,
    /// Bucket index the victim was evicted from, at the filter's own `N`.
    pub index: usize,
}

/// A single cuckoo filter: `N` buckets of [`BUCKET_SIZE`] slots each,
/// bit-packed fingerprints of width `w_eff = w - level`, and the
/// random-walk eviction that gives cuckoo filters their high load factor.
///
/// A `CuckooFilter` additionally owns up to two child filters, one level
/// deeper, so that it can serve as a node of a
/// [`crate::LogarithmicDynamicCuckooFilter`] tree. Used on its own (without
/// ever calling the tree-routing methods) it behaves like a conventional,
/// fixed-capacity cuckoo filter.
pub struct CuckooFilter<H = fnv::FnvHasher> {
    n: usize,
    w: usize,
    level: usize,
    w_eff: usize,
    buckets: Box<[Bucket]>,
    occupied: BitBox<u8, Lsb0>,
    current_size: usize,
    accept_values: bool,
    pub(crate) child0: Option<Box<CuckooFilter<H>>>,
    pub(crate) child1: Option<Box<CuckooFilter<H>>>,
    _hasher: PhantomData<H>,
}

impl<H> CuckooFilter<H>
where
    H: Hasher + Default,
{
    /// Constructs a filter with (at least) `buckets_hint` buckets, rounded
    /// up to the next power of two, `w`-bit fingerprints, and tree depth
    /// `level`.
    ///
    /// # Panics
    /// Panics if `level >= w`: the depth cap from spec §4.3/L3, since at
    /// that depth there would be zero bits left to pack a fingerprint with.
    pub fn new(buckets_hint: usize, w: usize, level: usize) -> Self {
        assert!(
            level < w,
            "depth cap exceeded: level {level} >= fingerprint width {w}"
        );
        let n = buckets_hint.max(1).next_power_of_two();
        let w_eff = w - level;
        let buckets = (0..n).map(|_| Bucket::new(w_eff)).collect::<Vec<_>>().into_boxed_slice();
        let occupied = bitvec::bitbox![u8, Lsb0; 0; n * BUCKET_SIZE];
        Self {
            n,
            w,
            level,
            w_eff,
            buckets,
            occupied,
            current_size: 0,
            accept_values: true,
            child0: None,
            child1: None,
            _hasher: PhantomData,
        }
    }

    /// Number of items currently held directly by this filter (not
    /// counting any children).
    pub fn len(&self) -> usize {
        self.current_size
    }

    pub fn is_empty(&self) -> bool {
        self.current_size == 0
    }

    /// `floor(N * B * LOAD_FACTOR)`.
    pub fn capacity(&self) -> usize {
        ((self.n * BUCKET_SIZE) as f64 * LOAD_FACTOR) as usize
    }

    /// Number of buckets, always a power of two.
    pub fn bucket_count(&self) -> usize {
        self.n
    }

    /// This filter's depth in the tree.
    pub fn level(&self) -> usize {
        self.level
    }

    /// The effective fingerprint width (`w - level`) this filter packs.
    pub fn fingerprint_width(&self) -> usize {
        self.w_eff
    }

    /// `current_size >= capacity()`, or the filter has already emitted a
    /// victim and stopped accepting inserts.
    pub fn is_full(&self) -> bool {
        self.current_size >= self.capacity() || !self.accept_values
    }

    /// Checks whether `item` is (probably) in this filter, without
    /// descending into any children.
    pub fn contains<T: ?Sized + Hash>(&self, item: &T) -> bool {
        self.contains_with_fingerprint(item, None)
    }

    pub(crate) fn contains_with_fingerprint<T: ?Sized + Hash>(
        &self,
        item: &T,
        fp: Option<u64>,
    ) -> bool {
        let (fp_eff, _saved_bits, i1, i2) = self.locate(item, fp);
        self.bucket_has(i1, fp_eff) || self.bucket_has(i2, fp_eff)
    }

    /// Removes `item` from this filter, without descending into any
    /// children. Returns `true` if a matching fingerprint was found.
    pub fn remove<T: ?Sized + Hash>(&mut self, item: &T) -> bool {
        self.remove_with_fingerprint(item, None)
    }

    pub(crate) fn remove_with_fingerprint<T: ?Sized + Hash>(
        &mut self,
        item: &T,
        fp: Option<u64>,
    ) -> bool {
        let (fp_eff, _saved_bits, i1, i2) = self.locate(item, fp);
        if self.remove_from_bucket(i1, fp_eff) || self.remove_from_bucket(i2, fp_eff) {
            self.current_size -= 1;
            true
        } else {
            false
        }
    }

    /// Inserts `item`, returning a [`Victim`] if doing so exhausted the
    /// kick budget. Uses the thread-local RNG for kick-victim selection.
    pub fn insert<T: ?Sized + Hash>(&mut self, item: &T) -> Option<Victim> {
        let mut rng = rand::thread_rng();
        self.insert_with_fingerprint(item, None, &mut rng)
    }

    pub(crate) fn insert_with_fingerprint<T: ?Sized + Hash, R: Rng>(
        &mut self,
        item: &T,
        fp: Option<u64>,
        rng: &mut R,
    ) -> Option<Victim> {
        if !self.accept_values {
            return None;
        }

        let (fp_eff, saved_bits, i1, i2) = self.locate(item, fp);

        // Duplicate suppression: the fingerprint's multiplicity across
        // both candidate buckets is already capped at BUCKET_SIZE.
        if self.count_matching(i1, fp_eff) + self.count_matching(i2, fp_eff) >= BUCKET_SIZE {
            return None;
        }

        if let Some(slot) = self.first_free_slot(i1) {
            self.place(i1, slot, fp_eff);
            return None;
        }
        if let Some(slot) = self.first_free_slot(i2) {
            self.place(i2, slot, fp_eff);
            return None;
        }

        self.evict(i1, fp_eff, saved_bits, rng)
    }

    /// Random-walk eviction: relocates existing fingerprints until a free
    /// slot opens up or `MAX_KICKS` is exhausted.
    fn evict<R: Rng>(
        &mut self,
        start_bucket: usize,
        fp_eff: u32,
        saved_bits: u64,
        rng: &mut R,
    ) -> Option<Victim> {
        let mut carry = fp_eff;
        let mut current_bucket = start_bucket;
        let mut victim_index = start_bucket;

        for _ in 0..MAX_KICKS {
            let slot = rng.gen_range(0, BUCKET_SIZE);
            let evicted = self.buckets[current_bucket].read(slot, self.w_eff);
            self.buckets[current_bucket].write(slot, carry, self.w_eff);

            let evicted_full = (u64::from(evicted) << self.level) | saved_bits;
            victim_index = current_bucket;
            current_bucket = alt_index::<H>(current_bucket, evicted_full, self.n);
            carry = evicted;

            if let Some(free_slot) = self.first_free_slot(current_bucket) {
                self.place(current_bucket, free_slot, carry);
                return None;
            }
        }

        self.accept_values = false;
        let victim_fingerprint = (u64::from(carry) << self.level) | saved_bits;
        Some(Victim {
            fingerprint: victim_fingerprint,
            index: victim_index,
        })
    }

    /// Places a pre-located [`Victim`] handed over by a parent filter. The
    /// caller guarantees this filter is freshly allocated (and therefore
    /// has a free slot at `victim.index`).
    ///
    /// # Panics
    /// Panics (an [`LdcfError::InvariantBreach`]) if `victim.index` has no
    /// free slot, which would mean the caller's guarantee was violated.
    pub(crate) fn insert_victim(&mut self, victim: &Victim) {
        let slot = self.first_free_slot(victim.index).unwrap_or_else(|| {
            panic!(
                "{}",
                LdcfError::InvariantBreach {
                    depth: self.level
                }
            )
        });
        let value = (victim.fingerprint >> self.level) as u32;
        self.place(victim.index, slot, value);
    }

    /// Recursive tree-routing insert used by the LDCF: descends through
    /// already-full filters, inserts at the first non-full one, and on
    /// overflow allocates both children and hands the victim to the one
    /// selected by its next prefix bit.
    pub(crate) fn route_insert<T: ?Sized + Hash, R: Rng>(&mut self, item: &T, fp: u64, rng: &mut R) {
        if self.is_full() {
            let child = self.child_for(prefix_bit(fp, self.level));
            child.route_insert(item, fp, rng);
            return;
        }

        if let Some(victim) = self.insert_with_fingerprint(item, Some(fp), rng) {
            // Ensure both children exist before routing the victim: a
            // filter with `accept_values == false` either has both
            // children allocated, or is a leaf transiently handling the
            // victim it just emitted (invariant L2).
            self.ensure_children();
            let go0 = prefix_bit(victim.fingerprint, self.level);
            if go0 {
                self.child0.as_mut().unwrap().insert_victim(&victim);
            } else {
                self.child1.as_mut().unwrap().insert_victim(&victim);
            }
        }
    }

    pub(crate) fn contains_routed<T: ?Sized + Hash>(&self, item: &T, fp: u64) -> bool {
        if self.contains_with_fingerprint(item, Some(fp)) {
            return true;
        }
        let go0 = prefix_bit(fp, self.level);
        let next = if go0 { self.child0.as_deref() } else { self.child1.as_deref() };
        match next {
            Some(child) => child.contains_routed(item, fp),
            None => false,
        }
    }

    pub(crate) fn remove_routed<T: ?Sized + Hash>(&mut self, item: &T, fp: u64) -> bool {
        if self.contains_with_fingerprint(item, Some(fp)) {
            // Re-enable accepting inserts now that a slot has opened up.
            self.accept_values = true;
            return self.remove_with_fingerprint(item, Some(fp));
        }
        let go0 = prefix_bit(fp, self.level);
        let next = if go0 { self.child0.as_deref_mut() } else { self.child1.as_deref_mut() };
        match next {
            Some(child) => child.remove_routed(item, fp),
            None => false,
        }
    }

    /// Sum of `capacity()` over this filter and every currently allocated
    /// descendant.
    pub(crate) fn tree_capacity(&self) -> usize {
        self.capacity()
            + self.child0.as_ref().map_or(0, |c| c.tree_capacity())
            + self.child1.as_ref().map_or(0, |c| c.tree_capacity())
    }

    fn child_for(&mut self, go0: bool) -> &mut CuckooFilter<H> {
        self.ensure_child(go0);
        if go0 {
            self.child0.as_mut().unwrap()
        } else {
            self.child1.as_mut().unwrap()
        }
    }

    fn ensure_children(&mut self) {
        self.ensure_child(true);
        self.ensure_child(false);
    }

    fn ensure_child(&mut self, go0: bool) {
        let n = self.n;
        let w = self.w;
        let next_level = self.level + 1;
        if next_level >= w {
            panic!(
                "{}",
                LdcfError::DepthExhausted {
                    depth: next_level,
                    width: w
                }
            );
        }
        let slot = if go0 { &mut self.child0 } else { &mut self.child1 };
        if slot.is_none() {
            *slot = Some(Box::new(CuckooFilter::new(n, w, next_level)));
        }
    }

    /// Computes the effective fingerprint, the low-`level` bits saved for
    /// eviction reconstruction, and both candidate bucket indices.
    fn locate<T: ?Sized + Hash>(&self, item: &T, fp: Option<u64>) -> (u32, u64, usize, usize) {
        let h = hash_item::<T, H>(item);
        let full_fp = fp.unwrap_or_else(|| h & mask_u64(self.w));
        let i1 = (h as usize) & (self.n - 1);
        let i2 = alt_index::<H>(i1, full_fp, self.n);
        let saved_bits = full_fp & mask_u64(self.level);
        let fp_eff = (full_fp >> self.level) as u32;
        (fp_eff, saved_bits, i1, i2)
    }

    fn bit_index(&self, bucket: usize, slot: usize) -> usize {
        bucket * BUCKET_SIZE + slot
    }

    fn bucket_has(&self, bucket: usize, fp_eff: u32) -> bool {
        (0..BUCKET_SIZE).any(|slot| {
            self.occupied[self.bit_index(bucket, slot)] && self.buckets[bucket].read(slot, self.w_eff) == fp_eff
        })
    }

    fn count_matching(&self, bucket: usize, fp_eff: u32) -> usize {
        (0..BUCKET_SIZE)
            .filter(|&slot| {
                self.occupied[self.bit_index(bucket, slot)]
                    && self.buckets[bucket].read(slot, self.w_eff) == fp_eff
            })
            .count()
    }

    fn first_free_slot(&self, bucket: usize) -> Option<usize> {
        (0..BUCKET_SIZE).find(|&slot| !self.occupied[self.bit_index(bucket, slot)])
    }

    fn remove_from_bucket(&mut self, bucket: usize, fp_eff: u32) -> bool {
        for slot in 0..BUCKET_SIZE {
            let idx = self.bit_index(bucket, slot);
            if self.occupied[idx] && self.buckets[bucket].read(slot, self.w_eff) == fp_eff {
                self.occupied.set(idx, false);
                return true;
            }
        }
        false
    }

    fn place(&mut self, bucket: usize, slot: usize, fp_eff: u32) {
        self.buckets[bucket].write(slot, fp_eff, self.w_eff);
        let idx = self.bit_index(bucket, slot);
        self.occupied.set(idx, true);
        self.current_size += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    type TestFilter = CuckooFilter<DefaultHasher>;

    #[test]
    fn s1_basic_insert_contains_remove() {
        let mut cf = TestFilter::new(100, 4, 0);
        assert!(cf.insert("test").is_none());
        assert_eq!(cf.len(), 1);
        assert!(cf.contains("test"));
        assert!(cf.remove("test"));
        assert!(!cf.contains("test"));
    }

    #[test]
    fn s2_fill_to_capacity() {
        let mut cf = TestFilter::new(4, 4, 0);
        for i in 1..=4 {
            let item = format!("test{i}");
            assert!(cf.insert(item.as_str()).is_none());
        }
        for i in 1..=4 {
            let item = format!("test{i}");
            assert!(cf.contains(item.as_str()));
        }
        assert_eq!(cf.len(), 4);
    }

    #[test]
    fn duplicate_fingerprint_is_suppressed_past_bucket_size() {
        // The same item may legitimately occupy up to BUCKET_SIZE slots
        // across its two candidate buckets before further inserts are
        // silently treated as "already present" (spec §4.2.1 step 4).
        let mut cf = TestFilter::new(16, 8, 0);
        for _ in 0..BUCKET_SIZE {
            assert!(cf.insert("dup").is_none());
        }
        let size_at_saturation = cf.len();
        assert!(cf.insert("dup").is_none());
        assert_eq!(cf.len(), size_at_saturation, "insert past 2B matches must not grow size");
        assert!(cf.contains("dup"));
    }

    #[test]
    fn remove_of_absent_item_returns_false() {
        let mut cf = TestFilter::new(16, 8, 0);
        assert!(!cf.remove("never inserted"));
    }

    #[test]
    fn depth_cap_panics_on_construction() {
        let result = std::panic::catch_unwind(|| TestFilter::new(16, 4, 4));
        assert!(result.is_err());
    }

    #[test]
    fn frozen_filter_refuses_further_inserts_even_when_used_standalone() {
        // A tiny filter forced to emit a victim is Frozen per spec §4.2.5,
        // and must refuse further inserts on its own, without relying on
        // an LDCF to check `is_full()` before calling in.
        let mut cf = TestFilter::new(2, 4, 0);
        let mut emitted_victim = false;
        for i in 0..64 {
            if cf.insert(format!("item{i}").as_str()).is_some() {
                emitted_victim = true;
                break;
            }
        }
        assert!(emitted_victim, "test setup should have forced a victim emission");

        let size_at_freeze = cf.len();
        assert!(cf.insert("one-more").is_none());
        assert_eq!(cf.len(), size_at_freeze, "a frozen filter must not place further items");
    }
}
