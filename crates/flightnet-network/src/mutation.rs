//! Weight perturbation, the only evolutionary operator.
//!
//! Evolution in flightnet is hill climbing around the best-known weights: a
//! new candidate is a copy of a base tensor with independent uniform noise
//! added to every weight. There is no crossover between parents.
//!
//! Weights are kept inside [`WEIGHT_RANGE`] by clamping after the noise is
//! added, so repeated perturbation never drifts out of the range used for
//! random initialization.

use std::ops::RangeInclusive;

use rand::Rng;

use crate::WeightTensor;

/// Range every perturbed weight is clamped to.
pub const WEIGHT_RANGE: RangeInclusive<f32> = -1.0..=1.0;

/// Largest accepted variance. Noise this wide can already move any weight
/// across the whole of [`WEIGHT_RANGE`].
pub const MAX_VARIANCE: f32 = 2.0;

/// Returns a perturbed copy of `base`.
///
/// Every weight becomes `clamp(w + uniform(-variance, variance), -1.0, 1.0)`.
/// The base tensor is never modified and the result owns its own buffer.
///
/// A `variance` of zero returns an exact copy without consuming randomness.
///
/// # Panics
///
/// Panics if `variance` is NaN or outside `0.0..=MAX_VARIANCE`.
///
/// # Examples
///
/// ```
/// use flightnet_network::{Topology, WeightTensor, mutation};
/// use rand::SeedableRng as _;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let topology = Topology::new(6, [5], 3).unwrap();
/// let base = WeightTensor::random(topology, &mut rng, 1.0);
///
/// let copy = mutation::perturb(&base, 0.0, &mut rng);
/// assert_eq!(copy, base);
///
/// let child = mutation::perturb(&base, 0.5, &mut rng);
/// assert_eq!(child.topology(), base.topology());
/// assert!(child.values().iter().all(|w| (-1.0..=1.0).contains(w)));
/// ```
pub fn perturb<R>(base: &WeightTensor, variance: f32, rng: &mut R) -> WeightTensor
where
    R: Rng + ?Sized,
{
    assert!(
        (0.0..=MAX_VARIANCE).contains(&variance),
        "variance must be within 0..={MAX_VARIANCE}, got {variance}"
    );
    // zero is the only non-positive value past the assertion
    if variance <= 0.0 {
        return base.clone();
    }
    base.map(|w| {
        (w + rng.random_range(-variance..=variance)).clamp(*WEIGHT_RANGE.start(), *WEIGHT_RANGE.end())
    })
}
