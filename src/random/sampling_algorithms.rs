//! Weighted event selection and uniform index sampling. These are the primitives the contact
//! sampler and the state machine build on. All of them are pure functions of their random
//! inputs so that their behavior can be checked against forced draw sequences.

use crate::rand::seq::index::sample as choose_range;
use crate::rand::Rng;

/// Selects one of several competing, mutually exclusive events.
///
/// `weights` are the probabilities of the events. They may sum to less than one, in which case the
/// remainder is the probability that no event happens. `u` is a uniform draw in `[0, 1)`. The
/// cumulative weights are walked in order and the index of the first event whose cumulative weight
/// exceeds `u` is returned. Returns `None` if `u` falls in the unassigned remainder or if there are
/// no events.
///
/// An event of weight zero adds nothing to the cumulative sum, so it can never be selected. If the
/// weights add up to more than one (several independent exposures, for instance), they are scaled
/// by their total: some event always happens and no position in the list is favored.
///
/// That scaling deliberately departs from a plain cumulative walk, which would hand every draw past
/// the point where the running sum reaches one to the earlier events. With weights `[0.8, 0.8]`
/// and `u = 0.6`, a plain walk returns `Some(0)` while this selector returns `Some(1)`. Weights
/// that sum to at most one are walked unscaled, so both agree there.
pub fn roulette(weights: &[f64], u: f64) -> Option<usize> {
    let total: f64 = weights.iter().filter(|&&weight| weight > 0.0).sum();
    let scale = if total > 1.0 { total } else { 1.0 };

    let mut cumulative = 0.0;
    for (index, &weight) in weights.iter().enumerate() {
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        if u < cumulative / scale {
            return Some(index);
        }
    }
    None
}

/// Maps a uniform draw `u` in `[0, 1)` to an index in `0..len`.
///
/// `floor(u * len)` can round up to `len` for `u` close to one, so the result is clamped to
/// `len - 1`. `len` must be positive.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn sample_index(u: f64, len: usize) -> usize {
    debug_assert!(len > 0, "cannot sample an index from an empty range");
    let index = (u * len as f64).floor() as usize;
    index.min(len - 1)
}

/// Sample `requested` distinct indices uniformly from `0..len`, returned in ascending order.
/// If more are requested than available, every index is returned.
///
/// Used to pick the agents that carry the virus (or start recovered) at the beginning of a run.
pub fn sample_indices_without_replacement<R: Rng>(
    rng: &mut R,
    len: usize,
    requested: usize,
) -> Vec<usize> {
    if requested >= len {
        return (0..len).collect();
    }
    let mut indexes = Vec::with_capacity(requested);
    indexes.extend(choose_range(rng, len, requested));
    indexes.sort_unstable();
    indexes
}
