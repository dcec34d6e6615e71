use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    Params, Polynomial, Result, SecretKey,
    poly::mask,
    sampling::{gaussian, uniform},
};

#[derive(Clone, Serialize, Deserialize)]
/// Switches a polynomial multiplied by one secret into a ciphertext under another.
///
/// # Remarks
/// Row `i` is an RLWE encryption of `P * 2^(i * radix_log) * s_from` under `s` modulo `P * Q`,
/// where `Q` is the top ciphertext modulus. Switching at a lower level reduces the rows modulo
/// `P * Q_l`, which is valid because every modulus is a power of two.
pub struct KeySwitchKey {
    pub(crate) b: Vec<Polynomial>,
    pub(crate) a: Vec<Polynomial>,
}

impl KeySwitchKey {
    /// Generate a key switching key from `from` (reduced modulo `P * Q`) to `sk`.
    pub fn generate(params: &Params, from: &Polynomial, sk: &SecretKey) -> Result<Self> {
        let bits = params.keyswitch_modulus_bits();
        let digits = params.keyswitch_digits(params.top_modulus_bits());
        let n = params.poly_degree;
        let s = sk.to_poly(bits);

        let rows = (0..digits)
            .into_par_iter()
            .map(|i| {
                let a = uniform(n, bits);
                let e = Polynomial::from_small(&gaussian(n, params.noise_sigma)?, bits);
                let gadget = 1u128 << (params.special_modulus_bits + i as u32 * params.radix_log);

                let b = a
                    .mul(&s, bits)
                    .neg(bits)
                    .add(&e, bits)
                    .add(&from.scalar_mul(gadget, bits), bits);

                Ok((b, a))
            })
            .collect::<Result<Vec<_>>>()?;

        let (b, a) = rows.into_iter().unzip();

        Ok(Self { b, a })
    }

    /// The number of gadget rows.
    pub fn rows(&self) -> usize {
        self.b.len()
    }

    /// Given `d` modulo `2^bits`, returns `(k0, k1)` with `k0 + k1 * s ≈ d * s_from`.
    pub(crate) fn switch(
        &self,
        params: &Params,
        d: &Polynomial,
        bits: u32,
    ) -> (Polynomial, Polynomial) {
        let pq_bits = bits + params.special_modulus_bits;
        let digits = params.keyswitch_digits(bits).min(self.rows());
        let radix_mask = mask(params.radix_log);
        let n = d.len();

        let (acc_b, acc_a) = (0..digits)
            .into_par_iter()
            .map(|i| {
                let shift = i as u32 * params.radix_log;
                let digit = Polynomial {
                    coeffs: d.coeffs.iter().map(|c| (c >> shift) & radix_mask).collect(),
                };

                (
                    digit.mul(&self.b[i], pq_bits),
                    digit.mul(&self.a[i], pq_bits),
                )
            })
            .reduce(
                || (Polynomial::zero(n), Polynomial::zero(n)),
                |(b0, a0), (b1, a1)| (b0.add(&b1, pq_bits), a0.add(&a1, pq_bits)),
            );

        (
            acc_b.round_shift(params.special_modulus_bits, bits),
            acc_a.round_shift(params.special_modulus_bits, bits),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{APPROX_LIGHT, EXACT_LIGHT};

    fn switch_error(params: &Params, bits: u32) -> i128 {
        let n = params.poly_degree;
        let sk_from = SecretKey::generate(params);
        let sk_to = SecretKey::generate(params);

        let ksk =
            KeySwitchKey::generate(params, &sk_from.to_poly(params.keyswitch_modulus_bits()), &sk_to)
                .unwrap();

        let d = uniform(n, bits);
        let (k0, k1) = ksk.switch(params, &d, bits);

        let expected = d.mul(&sk_from.to_poly(bits), bits);
        let actual = k0.add(&k1.mul(&sk_to.to_poly(bits), bits), bits);

        actual
            .sub(&expected, bits)
            .centered(bits)
            .iter()
            .map(|x| x.abs())
            .max()
            .unwrap_or_default()
    }

    #[test]
    fn keyswitch_noise_is_small_at_every_level() {
        for depth in 0..=APPROX_LIGHT.mul_depth {
            let bits = APPROX_LIGHT.modulus_bits_at_depth(depth);
            assert!(switch_error(&APPROX_LIGHT, bits) < 1 << 16);
        }

        assert!(switch_error(&EXACT_LIGHT, EXACT_LIGHT.top_modulus_bits()) < 1 << 16);
    }
}
