use rand::{Rng, thread_rng};
use rand_distr::{Distribution, Normal};

use crate::{Error, Polynomial, Result, poly::mask};

/// Samples `n` coefficients uniformly from `{-1, 0, 1}`.
pub fn ternary(n: usize) -> Vec<i64> {
    let mut rng = thread_rng();

    (0..n).map(|_| rng.gen_range(-1..=1)).collect()
}

/// Samples `n` coefficients from a rounded Gaussian with standard deviation `sigma`.
pub fn gaussian(n: usize, sigma: f64) -> Result<Vec<i64>> {
    let normal = Normal::new(0.0, sigma).map_err(|e| Error::InvalidParams(e.to_string()))?;
    let mut rng = thread_rng();

    Ok((0..n)
        .map(|_| normal.sample(&mut rng).round() as i64)
        .collect())
}

/// Samples a polynomial with coefficients uniform modulo `2^bits`.
pub fn uniform(n: usize, bits: u32) -> Polynomial {
    let mut rng = thread_rng();
    let m = mask(bits);

    Polynomial {
        coeffs: (0..n).map(|_| rng.r#gen::<u128>() & m).collect(),
    }
}
