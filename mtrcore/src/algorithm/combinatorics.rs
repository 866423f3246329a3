use statrs::distribution::{Binomial, DiscreteCDF};

use crate::chamber::constants::N_TRIGGER_CHAMBERS;

/// minimum number of fired planes (out of 4) for a trigger in one projection
pub const MIN_FIRED_PLANES: usize = 3;

/// probability that at least 3 of the 4 planes of one projection fire
///
/// The planes are treated as independent; the result is the sum of the five mutually
/// exclusive outcomes "all four fire" and "exactly plane i is missing". Inputs are not
/// validated; with all inputs in [0, 1] the result is in [0, 1].
///
/// Arguments:
///
/// * `effs` - firing probability of each of the 4 planes
///
/// Returns:
///
/// * `f64` - probability of a 3/4 coincidence
///
/// # Examples
///
/// ```
/// use mtrcore::algorithm::combinatorics::fire_probability;
///
/// assert_eq!(fire_probability([1.0, 1.0, 1.0, 1.0]), 1.0);
/// assert_eq!(fire_probability([0.5, 0.5, 0.5, 0.5]), 0.3125);
/// ```
pub fn fire_probability(effs: [f64; N_TRIGGER_CHAMBERS]) -> f64 {
    let [p0, p1, p2, p3] = effs;

    p0 * p1 * p2 * p3
        + (1.0 - p0) * p1 * p2 * p3
        + p0 * (1.0 - p1) * p2 * p3
        + p0 * p1 * (1.0 - p2) * p3
        + p0 * p1 * p2 * (1.0 - p3)
}

/// same as `fire_probability` for four planes with identical efficiency, via the binomial tail
///
/// Returns None if `eff` is not a probability.
pub fn uniform_fire_probability(eff: f64) -> Option<f64> {
    let binomial = Binomial::new(eff, N_TRIGGER_CHAMBERS as u64).ok()?;
    Some(binomial.sf(MIN_FIRED_PLANES as u64 - 1))
}

/// true if enough planes of one projection fired
pub fn is_coincidence(fired: &[bool; N_TRIGGER_CHAMBERS]) -> bool {
    fired.iter().filter(|&&f| f).count() >= MIN_FIRED_PLANES
}
