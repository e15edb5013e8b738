use std::hash::{Hash, Hasher};

use rand::Rng;

use crate::bucket::BUCKET_SIZE;
use crate::filter::{CuckooFilter, LOAD_FACTOR};
use crate::util::{hash_item, mask_u64};

/// An elastically growing approximate-set-membership structure: a binary
/// tree of [`CuckooFilter`]s keyed by fingerprint-prefix bits.
///
/// A leaf filter that fills up spawns two depth-`L+1` children instead of
/// rejecting further inserts; the item (or, on overflow, the victim the
/// leaf could no longer hold) is routed to one of the two children by
/// inspecting a single bit of its fingerprint. Lookups and removals follow
/// the same route, short-circuiting on the first hit.
///
/// Generic over the hasher `H` the way [`CuckooFilter`] is; defaults to
/// [`fnv::FnvHasher`].
pub struct LogarithmicDynamicCuckooFilter<H = fnv::FnvHasher> {
    root: Box<CuckooFilter<H>>,
    w: usize,
    size: usize,
}

impl<H> LogarithmicDynamicCuckooFilter<H>
where
    H: Hasher + Default,
{
    /// Sizes and constructs a new, empty filter tree.
    ///
    /// * `false_positive_rate` — target false-positive rate `ε` for a
    ///   single leaf filter at the expected population.
    /// * `expected_population` — expected total number of inserted items,
    ///   `n`.
    /// * `expected_levels` — expected tree depth, `λ`, used to size the
    ///   per-filter bucket count and the fingerprint-width margin.
    ///
    /// Follows spec §4.3: `N = n / (B·λ)`, `c = α·N·B`,
    /// `ε_cf = 1 - (1-ε)^(c/n)`, `w = ceil(log2(2B/ε_cf) + λ)`, clamped to
    /// `[1, 32]`.
    pub fn new(false_positive_rate: f64, expected_population: usize, expected_levels: usize) -> Self {
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );
        assert!(expected_levels >= 1, "expected_levels must be at least 1");

        let lambda = expected_levels;
        let n_raw = (expected_population / (BUCKET_SIZE * lambda)).max(1);
        let n = n_raw.next_power_of_two();

        let population = expected_population.max(1) as f64;
        let single_capacity = LOAD_FACTOR * (n * BUCKET_SIZE) as f64;
        let ratio = single_capacity / population;
        let cf_epsilon = 1.0 - (1.0 - false_positive_rate).powf(ratio);
        // Guard against a degenerate ε_cf (e.g. from a very small ratio)
        // producing a non-finite or non-positive log argument.
        let cf_epsilon = cf_epsilon.clamp(f64::MIN_POSITIVE, 1.0);

        let w_raw = (2.0 * BUCKET_SIZE as f64 / cf_epsilon).log2() + lambda as f64;
        let w = (w_raw.ceil() as i64).clamp(1, 32) as usize;

        let root = Box::new(CuckooFilter::new(n, w, 0));
        Self { root, w, size: 0 }
    }

    /// Inserts `item`, routing it down the tree and growing it if
    /// necessary. Uses the thread-local RNG for any eviction this triggers.
    pub fn insert<T: ?Sized + Hash>(&mut self, item: &T) {
        let mut rng = rand::thread_rng();
        self.insert_with_rng(item, &mut rng);
    }

    /// As [`Self::insert`], but with an explicit RNG — useful for
    /// deterministic tests.
    pub fn insert_with_rng<T: ?Sized + Hash, R: Rng>(&mut self, item: &T, rng: &mut R) {
        let fp = self.fingerprint_of(item);
        self.root.route_insert(item, fp, rng);
        self.size += 1;
    }

    /// Checks whether `item` is (probably) a member.
    pub fn contains<T: ?Sized + Hash>(&self, item: &T) -> bool {
        let fp = self.fingerprint_of(item);
        self.root.contains_routed(item, fp)
    }

    /// Removes `item` if present. Returns `true` if it was found and
    /// removed along its routing path.
    pub fn remove<T: ?Sized + Hash>(&mut self, item: &T) -> bool {
        let fp = self.fingerprint_of(item);
        if self.root.remove_routed(item, fp) {
            self.size -= 1;
            true
        } else {
            false
        }
    }

    /// Total number of inserted items across the whole tree (insert calls
    /// that completed, minus successful removes — spec §8.1 P5).
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Sum of `capacity()` over every filter currently allocated in the
    /// tree.
    pub fn capacity(&self) -> usize {
        self.root.tree_capacity()
    }

    /// The fingerprint width `w` shared by every filter in the tree.
    pub fn fingerprint_width(&self) -> usize {
        self.w
    }

    fn fingerprint_of<T: ?Sized + Hash>(&self, item: &T) -> u64 {
        hash_item::<T, H>(item) & mask_u64(self.w)
    }
}
