use crate::{
    Ciphertext, Error, Params, Polynomial, PublicKey, Result, Scheme, SecretKey,
    encoding::SlotEncoder,
    poly::{from_signed, mask},
    sampling::{gaussian, ternary},
};

#[derive(Debug, Clone)]
/// Encodes, encrypts and decrypts slot vectors under a single parameter set.
pub struct Encryption {
    /// The parameters this [`Encryption`] works under.
    pub params: Params,
    pub(crate) encoder: SlotEncoder,
}

impl Encryption {
    /// Validates `params` and precomputes the slot encoder.
    pub fn new(params: &Params) -> Result<Self> {
        params.validate()?;

        Ok(Self {
            params: params.clone(),
            encoder: SlotEncoder::new(params)?,
        })
    }

    /// The number of values a ciphertext holds.
    pub fn slot_count(&self) -> usize {
        self.encoder.slot_count()
    }

    fn check_values(&self, values: &[f64]) -> Result<Vec<f64>> {
        let values: Vec<f64> = match self.params.scheme {
            Scheme::ApproxReal => values.to_vec(),
            Scheme::ExactInteger => values.iter().map(|v| v.trunc()).collect(),
        };

        self.encoder
            .check_values(&values, self.params.max_plain_magnitude())?;

        Ok(values)
    }

    /// Encodes `values` as a message polynomial modulo `2^bits`, scaled into the upper bits the
    /// way a ciphertext carries it.
    ///
    /// # Remarks
    /// Under [`Scheme::ExactInteger`] values are truncated toward zero.
    pub(crate) fn encode_message(&self, values: &[f64], bits: u32) -> Result<Polynomial> {
        let values = self.check_values(values)?;

        Ok(match &self.encoder {
            SlotEncoder::Approx(e) => e.encode(&values, bits),
            SlotEncoder::Exact(e) => {
                let ints: Vec<i64> = values.iter().map(|v| *v as i64).collect();
                let delta = (1u128 << bits) / e.plain_modulus() as u128;

                Polynomial {
                    coeffs: e
                        .encode(&ints)
                        .iter()
                        .map(|m| delta.wrapping_mul(*m as u128) & mask(bits))
                        .collect(),
                }
            }
        })
    }

    /// Encodes `values` as a plaintext multiplier modulo `2^bits`. Approximate multipliers are
    /// scaled by `Δ`; exact multipliers are the centered plaintext polynomial.
    pub(crate) fn encode_multiplier(&self, values: &[f64], bits: u32) -> Result<Polynomial> {
        let values = self.check_values(values)?;

        Ok(match &self.encoder {
            SlotEncoder::Approx(e) => e.encode(&values, bits),
            SlotEncoder::Exact(e) => {
                let ints: Vec<i64> = values.iter().map(|v| *v as i64).collect();

                Polynomial {
                    coeffs: e
                        .centered(&e.encode(&ints))
                        .iter()
                        .map(|m| from_signed(*m as i128, bits))
                        .collect(),
                }
            }
        })
    }

    /// Encrypts `values` under `pk`. Unused slots are zero.
    ///
    /// # Remarks
    /// Under [`Scheme::ExactInteger`] values are truncated toward zero before encoding.
    pub fn encrypt(&self, values: &[f64], pk: &PublicKey) -> Result<Ciphertext> {
        let bits = self.params.top_modulus_bits();
        let n = self.params.poly_degree;
        let sigma = self.params.noise_sigma;

        let m = self.encode_message(values, bits)?;

        let u = Polynomial::from_small(&ternary(n), bits);
        let e1 = Polynomial::from_small(&gaussian(n, sigma)?, bits);
        let e2 = Polynomial::from_small(&gaussian(n, sigma)?, bits);

        let c0 = pk.p0.mul(&u, bits).add(&e1, bits).add(&m, bits);
        let c1 = pk.p1.mul(&u, bits).add(&e2, bits);

        Ok(Ciphertext {
            scheme: self.params.scheme,
            c0,
            c1,
            depth: 0,
        })
    }

    /// Decrypts `ct`, returning every slot.
    pub fn decrypt(&self, ct: &Ciphertext, sk: &SecretKey) -> Result<Vec<f64>> {
        if ct.scheme != self.params.scheme {
            return Err(Error::SchemeMismatch);
        }

        let bits = ct.modulus_bits(&self.params);
        let x = ct.c0.add(&ct.c1.mul(&sk.to_poly(bits), bits), bits);

        Ok(match &self.encoder {
            SlotEncoder::Approx(e) => e.decode(&x, bits),
            SlotEncoder::Exact(e) => {
                let t = e.plain_modulus() as u128;
                let half = 1u128 << (bits - 1);

                let coeffs: Vec<u64> = x
                    .coeffs
                    .iter()
                    .map(|c| (((c * t + half) >> bits) % t) as u64)
                    .collect();

                e.decode(&coeffs).into_iter().map(|v| v as f64).collect()
            }
        })
    }
}
