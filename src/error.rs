use thiserror::Error;

/// Fatal internal invariant breaches.
///
/// None of these are meant to be caught and handled: per the filter's
/// contract they can only happen if a caller violates an internal
/// invariant (e.g. routing an item to a filter that doesn't own its
/// fingerprint's prefix). The library surfaces them as panics rather
/// than `Result`s so that soft outcomes (`NotPresent`,
/// `DuplicateSaturated`) stay on the normal `bool`/`Option` return path.
#[derive(Error, Debug)]
pub enum LdcfError {
    /// A victim handover found no empty slot in what was supposed to be a
    /// freshly allocated, empty child filter.
    #[error(
        "victim handover into filter at depth {depth} found no empty slot \
         (child was expected to be freshly allocated and empty)"
    )]
    InvariantBreach { depth: usize },

    /// The tree tried to grow past the fingerprint width: at depth `width`
    /// there are zero bits left to route on.
    #[error(
        "fingerprint width exhausted: cannot allocate a filter at depth \
         {depth} for a {width}-bit fingerprint"
    )]
    DepthExhausted { depth: usize, width: usize },
}
