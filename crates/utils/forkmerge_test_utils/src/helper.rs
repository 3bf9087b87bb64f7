//! Helper utilities for tests.

use rand::{
    Rng as _,
    distr::{Alphanumeric, SampleString as _},
};

/// Generates a random alphanumeric string of the specified length.
#[must_use]
pub fn random_str(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Picks a random inclusive range `[low, high]` inside `[min, max]` holding
/// at least `units` values.
#[must_use]
pub fn random_bounds(min: u64, max: u64, units: u64) -> (u64, u64) {
    let mut rng = rand::rng();
    let low = rng.random_range(min..=max - (units - 1));
    let high = rng.random_range(low + (units - 1)..=max);
    (low, high)
}
