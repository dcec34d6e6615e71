use std::f64::consts::PI;

use crate::{
    Error, Params, Polynomial, Result, Scheme,
    poly::{center, from_signed},
};

/// Maps vectors of slot values to plaintext polynomials and back.
#[derive(Debug, Clone)]
pub enum SlotEncoder {
    /// Canonical embedding encoder for [`Scheme::ApproxReal`].
    Approx(ApproxEncoder),

    /// Negacyclic batching encoder over `Z_t` for [`Scheme::ExactInteger`].
    Exact(ExactEncoder),
}

impl SlotEncoder {
    /// Builds the encoder matching `params.scheme`.
    pub fn new(params: &Params) -> Result<Self> {
        Ok(match params.scheme {
            Scheme::ApproxReal => Self::Approx(ApproxEncoder::new(params)),
            Scheme::ExactInteger => Self::Exact(ExactEncoder::new(params)?),
        })
    }

    /// The number of slots.
    pub fn slot_count(&self) -> usize {
        match self {
            Self::Approx(e) => e.slots,
            Self::Exact(e) => e.degree,
        }
    }

    pub(crate) fn check_values(&self, values: &[f64], max: f64) -> Result<()> {
        if values.len() > self.slot_count() {
            return Err(Error::TooManyValues {
                got: values.len(),
                slots: self.slot_count(),
            });
        }

        match values.iter().find(|v| !v.is_finite() || v.abs() > max) {
            Some(v) => Err(Error::ValueOutOfRange(*v)),
            None => Ok(()),
        }
    }
}

/// Encodes real vectors into the slots `m(ζ^(5^j))`, `ζ = exp(iπ/N)`.
///
/// # Remarks
/// Real inputs give a message polynomial fixed under complex conjugation, so only the `N/2`
/// slots indexed by powers of 5 are independent. Rotating by the Galois element `5` shifts
/// slots by one position.
#[derive(Debug, Clone)]
pub struct ApproxEncoder {
    degree: usize,
    slots: usize,
    scale: f64,
    cos_table: Vec<f64>,
    slot_exponents: Vec<usize>,
}

impl ApproxEncoder {
    fn new(params: &Params) -> Self {
        let degree = params.poly_degree;
        let two_n = 2 * degree;

        let cos_table = (0..two_n)
            .map(|r| (PI * r as f64 / degree as f64).cos())
            .collect();

        let mut slot_exponents = Vec::with_capacity(degree / 2);
        let mut e = 1usize;

        for _ in 0..degree / 2 {
            slot_exponents.push(e);
            e = (e * 5) % two_n;
        }

        Self {
            degree,
            slots: degree / 2,
            scale: params.scale(),
            cos_table,
            slot_exponents,
        }
    }

    /// Encodes `values` scaled by `Δ` modulo `2^bits`. Missing slots are zero.
    pub fn encode(&self, values: &[f64], bits: u32) -> Polynomial {
        let two_n = 2 * self.degree;
        let factor = 2.0 * self.scale / self.degree as f64;

        let coeffs = (0..self.degree)
            .map(|k| {
                let sum: f64 = values
                    .iter()
                    .zip(&self.slot_exponents)
                    .map(|(z, e)| z * self.cos_table[(e * k) % two_n])
                    .sum();

                from_signed((factor * sum).round() as i128, bits)
            })
            .collect();

        Polynomial { coeffs }
    }

    /// Evaluates `p` (modulo `2^bits`) at every slot and divides out `Δ`.
    pub fn decode(&self, p: &Polynomial, bits: u32) -> Vec<f64> {
        let two_n = 2 * self.degree;
        let coeffs: Vec<f64> = p.coeffs.iter().map(|c| center(*c, bits) as f64).collect();

        self.slot_exponents
            .iter()
            .map(|e| {
                let sum: f64 = coeffs
                    .iter()
                    .enumerate()
                    .map(|(k, c)| c * self.cos_table[(e * k) % two_n])
                    .sum();

                sum / self.scale
            })
            .collect()
    }
}

/// Encodes integer vectors into the evaluations `m(ψ^(2i+1)) mod t`, where `ψ` is a primitive
/// `2N`-th root of unity modulo `t`.
#[derive(Debug, Clone)]
pub struct ExactEncoder {
    degree: usize,
    plain_modulus: u64,
    degree_inv: u64,
    psi_powers: Vec<u64>,
}

fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut acc = 1u64;
    base %= modulus;

    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc * base % modulus;
        }

        base = base * base % modulus;
        exp >>= 1;
    }

    acc
}

/// Finds a primitive `order`-th root of unity modulo the prime `t`, where `order` is a power of
/// two dividing `t - 1`.
fn primitive_root_of_unity(order: u64, t: u64) -> Option<u64> {
    let cofactor = (t - 1) / order;

    (2..t)
        .map(|x| pow_mod(x, cofactor, t))
        .find(|psi| pow_mod(*psi, order / 2, t) == t - 1)
}

impl ExactEncoder {
    fn new(params: &Params) -> Result<Self> {
        let degree = params.poly_degree;
        let t = params.plain_modulus;
        let two_n = 2 * degree as u64;

        let psi = primitive_root_of_unity(two_n, t).ok_or_else(|| {
            Error::InvalidParams(format!("no primitive {two_n}-th root of unity mod {t}"))
        })?;

        let mut psi_powers = Vec::with_capacity(2 * degree);
        let mut acc = 1u64;

        for _ in 0..2 * degree {
            psi_powers.push(acc);
            acc = acc * psi % t;
        }

        Ok(Self {
            degree,
            plain_modulus: t,
            degree_inv: pow_mod(degree as u64, t - 2, t),
            psi_powers,
        })
    }

    /// The plaintext modulus `t`.
    pub fn plain_modulus(&self) -> u64 {
        self.plain_modulus
    }

    /// Encodes `values` into a polynomial with coefficients in `[0, t)`. Missing slots are zero.
    pub fn encode(&self, values: &[i64]) -> Vec<u64> {
        let t = self.plain_modulus;
        let two_n = 2 * self.degree;
        let values: Vec<u64> = values
            .iter()
            .map(|v| v.rem_euclid(t as i64) as u64)
            .collect();

        (0..self.degree)
            .map(|k| {
                let sum = values.iter().enumerate().fold(0u64, |acc, (i, y)| {
                    let r = ((2 * i + 1) * k) % two_n;
                    let inv = self.psi_powers[(two_n - r) % two_n];

                    (acc + y * inv) % t
                });

                sum * self.degree_inv % t
            })
            .collect()
    }

    /// Evaluates a plaintext polynomial (coefficients in `[0, t)`) at every slot, returning
    /// centered values.
    pub fn decode(&self, coeffs: &[u64]) -> Vec<i64> {
        let t = self.plain_modulus;
        let two_n = 2 * self.degree;

        (0..self.degree)
            .map(|i| {
                let y = coeffs.iter().enumerate().fold(0u64, |acc, (k, m)| {
                    let r = ((2 * i + 1) * k) % two_n;

                    (acc + m * self.psi_powers[r]) % t
                });

                if y > t / 2 {
                    y as i64 - t as i64
                } else {
                    y as i64
                }
            })
            .collect()
    }

    /// Lifts `coeffs` in `[0, t)` to centered values.
    pub fn centered(&self, coeffs: &[u64]) -> Vec<i64> {
        let t = self.plain_modulus;

        coeffs
            .iter()
            .map(|c| {
                if *c > t / 2 {
                    *c as i64 - t as i64
                } else {
                    *c as i64
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{APPROX_LIGHT, EXACT_LIGHT};

    #[test]
    fn finds_primitive_root() {
        let psi = primitive_root_of_unity(2048, 65537).unwrap();

        assert_eq!(pow_mod(psi, 1024, 65537), 65536);
        assert_eq!(pow_mod(psi, 2048, 65537), 1);
    }

    #[test]
    fn exact_encoding_is_a_ring_homomorphism() {
        let SlotEncoder::Exact(enc) = SlotEncoder::new(&EXACT_LIGHT).unwrap() else {
            panic!("expected exact encoder");
        };

        let a = [3i64, -7, 12, 0, 5];
        let b = [2i64, 4, -1, 9, 6];

        let pa = Polynomial::from_small(&enc.centered(&enc.encode(&a)), 64);
        let pb = Polynomial::from_small(&enc.centered(&enc.encode(&b)), 64);

        let t = enc.plain_modulus();
        let prod: Vec<u64> = pa
            .mul(&pb, 64)
            .centered(64)
            .iter()
            .map(|c| c.rem_euclid(t as i128) as u64)
            .collect();

        let decoded = enc.decode(&prod);

        for i in 0..a.len() {
            assert_eq!(decoded[i], a[i] * b[i]);
        }

        assert!(decoded[a.len()..].iter().all(|x| *x == 0));
    }

    #[test]
    fn approx_encoding_is_multiplicative() {
        let SlotEncoder::Approx(enc) = SlotEncoder::new(&APPROX_LIGHT).unwrap() else {
            panic!("expected approx encoder");
        };

        let bits = 100;
        let a = [1.5, -2.25, 3.0];
        let b = [2.0, 0.5, -1.0];

        let prod = enc.encode(&a, bits).mul(&enc.encode(&b, bits), bits);
        let prod = prod.round_shift(APPROX_LIGHT.scale_bits, bits - APPROX_LIGHT.scale_bits);
        let decoded = enc.decode(&prod, bits - APPROX_LIGHT.scale_bits);

        for i in 0..a.len() {
            assert!((decoded[i] - a[i] * b[i]).abs() < 1e-6);
        }
    }

    proptest! {
        #[test]
        fn exact_roundtrip(values in proptest::collection::vec(-32768i64..=32768, 1..64)) {
            let SlotEncoder::Exact(enc) = SlotEncoder::new(&EXACT_LIGHT).unwrap() else {
                panic!("expected exact encoder");
            };

            let decoded = enc.decode(&enc.encode(&values));

            prop_assert_eq!(&decoded[..values.len()], &values[..]);
        }

        #[test]
        fn approx_roundtrip(values in proptest::collection::vec(-1000.0f64..1000.0, 1..64)) {
            let SlotEncoder::Approx(enc) = SlotEncoder::new(&APPROX_LIGHT).unwrap() else {
                panic!("expected approx encoder");
            };

            let decoded = enc.decode(&enc.encode(&values, 80), 80);

            for (d, v) in decoded.iter().zip(values.iter()) {
                prop_assert!((d - v).abs() < 1e-6);
            }

            prop_assert!(decoded[values.len()..].iter().all(|x| x.abs() < 1e-6));
        }
    }
}
