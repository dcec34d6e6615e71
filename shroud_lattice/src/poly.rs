//! Arithmetic over `Z_{2^k}[X]/(X^N + 1)` for `k <= 128`.
use num::{BigInt, Integer, One, ToPrimitive};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A mask selecting the low `bits` bits of a `u128`.
#[inline(always)]
pub fn mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Lift `x mod 2^bits` into `(-2^(bits-1), 2^(bits-1)]`.
///
/// # Panics
/// In debug builds, if `bits > 126`.
#[inline(always)]
pub fn center(x: u128, bits: u32) -> i128 {
    debug_assert!(bits <= 126);
    let x = x & mask(bits);

    if x > 1u128 << (bits - 1) {
        x as i128 - (1i128 << bits)
    } else {
        x as i128
    }
}

/// Reduce a signed value modulo `2^bits`.
#[inline(always)]
pub fn from_signed(x: i128, bits: u32) -> u128 {
    (x as u128) & mask(bits)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A polynomial in the negacyclic ring with `u128` coefficients.
///
/// # Remarks
/// The modulus is not stored; every operation takes the bit size of the modulus it reduces by.
pub struct Polynomial {
    /// The coefficients, lowest degree first.
    pub coeffs: Vec<u128>,
}

impl Polynomial {
    /// The zero polynomial of degree `n`.
    pub fn zero(n: usize) -> Self {
        Self { coeffs: vec![0; n] }
    }

    /// Builds a polynomial from small signed coefficients.
    pub fn from_small(coeffs: &[i64], bits: u32) -> Self {
        Self {
            coeffs: coeffs
                .iter()
                .map(|c| from_signed(*c as i128, bits))
                .collect(),
        }
    }

    /// The number of coefficients.
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    /// Whether the polynomial has no coefficients.
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Reduce every coefficient modulo `2^bits`.
    pub fn reduce(&self, bits: u32) -> Self {
        let m = mask(bits);

        Self {
            coeffs: self.coeffs.iter().map(|c| c & m).collect(),
        }
    }

    /// Whether every coefficient is already reduced modulo `2^bits`.
    pub fn is_reduced(&self, bits: u32) -> bool {
        let m = mask(bits);
        self.coeffs.iter().all(|c| c & !m == 0)
    }

    /// `self + rhs mod 2^bits`.
    pub fn add(&self, rhs: &Self, bits: u32) -> Self {
        assert_eq!(self.len(), rhs.len());
        let m = mask(bits);

        Self {
            coeffs: self
                .coeffs
                .iter()
                .zip(rhs.coeffs.iter())
                .map(|(a, b)| a.wrapping_add(*b) & m)
                .collect(),
        }
    }

    /// `self - rhs mod 2^bits`.
    pub fn sub(&self, rhs: &Self, bits: u32) -> Self {
        assert_eq!(self.len(), rhs.len());
        let m = mask(bits);

        Self {
            coeffs: self
                .coeffs
                .iter()
                .zip(rhs.coeffs.iter())
                .map(|(a, b)| a.wrapping_sub(*b) & m)
                .collect(),
        }
    }

    /// `-self mod 2^bits`.
    pub fn neg(&self, bits: u32) -> Self {
        let m = mask(bits);

        Self {
            coeffs: self.coeffs.iter().map(|a| a.wrapping_neg() & m).collect(),
        }
    }

    /// `c * self mod 2^bits` for a scalar `c`.
    pub fn scalar_mul(&self, c: u128, bits: u32) -> Self {
        let m = mask(bits);

        Self {
            coeffs: self.coeffs.iter().map(|a| a.wrapping_mul(c) & m).collect(),
        }
    }

    /// The negacyclic product `self * rhs mod (X^N + 1, 2^bits)`.
    ///
    /// # Remarks
    /// This is the schoolbook product, parallelized over output coefficients.
    pub fn mul(&self, rhs: &Self, bits: u32) -> Self {
        assert_eq!(self.len(), rhs.len());

        let n = self.len();
        let m = mask(bits);
        let a = &self.coeffs;
        let b = &rhs.coeffs;

        let coeffs = (0..n)
            .into_par_iter()
            .map(|k| {
                let mut acc = 0u128;

                for i in 0..=k {
                    acc = acc.wrapping_add(a[i].wrapping_mul(b[k - i]));
                }

                // X^N = -1
                for i in k + 1..n {
                    acc = acc.wrapping_sub(a[i].wrapping_mul(b[n + k - i]));
                }

                acc & m
            })
            .collect();

        Self { coeffs }
    }

    /// Maps `p(X)` to `p(X^g)` for odd `g`.
    ///
    /// # Panics
    /// If `g` is even.
    pub fn automorphism(&self, g: usize, bits: u32) -> Self {
        assert!(g % 2 == 1);

        let n = self.len();
        let m = mask(bits);
        let mut out = vec![0u128; n];

        for (i, c) in self.coeffs.iter().enumerate() {
            let i_g = (i * g) % (2 * n);

            // Landing in [N, 2N) wraps through X^N = -1.
            if i_g < n {
                out[i_g] = *c;
            } else {
                out[i_g - n] = c.wrapping_neg() & m;
            }
        }

        Self { coeffs: out }
    }

    /// Divide by `2^shift` with rounding, reducing the result modulo `2^out_bits`.
    pub fn round_shift(&self, shift: u32, out_bits: u32) -> Self {
        let half = 1u128 << (shift - 1);
        let m = mask(out_bits);

        Self {
            coeffs: self
                .coeffs
                .iter()
                .map(|c| (c.wrapping_add(half) >> shift) & m)
                .collect(),
        }
    }

    /// The centered representatives of the coefficients modulo `2^bits`.
    pub fn centered(&self, bits: u32) -> Vec<i128> {
        self.coeffs.iter().map(|c| center(*c, bits)).collect()
    }
}

fn negacyclic_i128(a: &[i128], b: &[i128]) -> Vec<i128> {
    let n = a.len();

    (0..n)
        .into_par_iter()
        .map(|k| {
            let mut acc = 0i128;

            for i in 0..=k {
                acc = acc.wrapping_add(a[i].wrapping_mul(b[k - i]));
            }

            for i in k + 1..n {
                acc = acc.wrapping_sub(a[i].wrapping_mul(b[n + k - i]));
            }

            acc
        })
        .collect()
}

fn split_limbs(x: &[i128], split: u32) -> (Vec<i128>, Vec<i128>) {
    let lo_mask = (1i128 << split) - 1;

    x.iter().map(|v| (v >> split, v & lo_mask)).unzip()
}

fn accumulate(acc: &mut [i128], x: &[i128]) {
    for (a, x) in acc.iter_mut().zip(x) {
        *a = a.wrapping_add(*x);
    }
}

/// Computes `round(num / 2^q_bits * Σ x_i * y_i) mod 2^q_bits` exactly over the integers, where
/// each `x_i`, `y_i` is a polynomial with centered coefficients modulo `2^q_bits`.
///
/// # Remarks
/// Coefficients are split into two limbs of `ceil(q_bits / 2)` bits so the negacyclic
/// convolutions fit in `i128`. Only the final per-coefficient recombination and rounding uses
/// big integers.
///
/// # Panics
/// If `pairs` is empty. Callers must keep `q_bits <= 100` and `N <= 4096` so the limb
/// convolutions cannot overflow.
pub fn scaled_tensor(pairs: &[(&[i128], &[i128])], num: u64, q_bits: u32) -> Polynomial {
    let n = pairs[0].0.len();
    let split = q_bits.div_ceil(2);

    let mut hi_hi = vec![0i128; n];
    let mut cross = vec![0i128; n];
    let mut lo_lo = vec![0i128; n];

    for (x, y) in pairs {
        let (x_hi, x_lo) = split_limbs(x, split);
        let (y_hi, y_lo) = split_limbs(y, split);

        accumulate(&mut hi_hi, &negacyclic_i128(&x_hi, &y_hi));
        accumulate(&mut cross, &negacyclic_i128(&x_hi, &y_lo));
        accumulate(&mut cross, &negacyclic_i128(&x_lo, &y_hi));
        accumulate(&mut lo_lo, &negacyclic_i128(&x_lo, &y_lo));
    }

    let q = BigInt::one() << q_bits;
    let half = BigInt::one() << (q_bits - 1);
    let num = BigInt::from(num);

    let coeffs = (0..n)
        .into_par_iter()
        .map(|k| {
            let x = (BigInt::from(hi_hi[k]) << (2 * split))
                + (BigInt::from(cross[k]) << split)
                + BigInt::from(lo_lo[k]);

            let rounded = (&num * x + &half).div_floor(&q).mod_floor(&q);

            // mod_floor leaves a value in [0, q) and q fits in 100 bits.
            rounded.to_u128().unwrap_or_default()
        })
        .collect();

    Polynomial { coeffs }
}
