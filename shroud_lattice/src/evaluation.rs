use std::sync::Arc;

use log::trace;

use crate::{
    Ciphertext, Encryption, Error, EvaluationKey, Params, Polynomial, Result, Scheme,
    galois_elements, poly::scaled_tensor,
};

/// Performs homomorphic operations on [`Ciphertext`]s.
///
/// # Remarks
/// Every operation returns a new ciphertext and never mutates its inputs. Binary operations on
/// approximate ciphertexts at different depths first bring the shallower operand down to the
/// deeper one's modulus.
pub struct Evaluation {
    params: Params,
    key: Arc<EvaluationKey>,
    enc: Encryption,
}

impl Evaluation {
    /// Creates a new [`Evaluation`] from the given evaluation keys, parameters and encryption
    /// context.
    pub fn new(key: Arc<EvaluationKey>, params: &Params, enc: &Encryption) -> Self {
        Self {
            params: params.clone(),
            key,
            enc: enc.clone(),
        }
    }

    /// The parameters this evaluator works under.
    pub fn params(&self) -> &Params {
        &self.params
    }

    fn check_scheme(&self, ct: &Ciphertext) -> Result<()> {
        if ct.scheme != self.params.scheme {
            return Err(Error::SchemeMismatch);
        }

        Ok(())
    }

    fn check_depth(&self, depth: u32) -> Result<()> {
        if depth >= self.params.mul_depth {
            return Err(Error::DepthExhausted {
                depth,
                max: self.params.mul_depth,
            });
        }

        Ok(())
    }

    /// Both operands reduced to the modulus at the deeper operand's depth.
    fn align(&self, a: &Ciphertext, b: &Ciphertext) -> Result<(u32, u32)> {
        self.check_scheme(a)?;
        self.check_scheme(b)?;

        let depth = a.depth.max(b.depth);

        Ok((depth, self.params.modulus_bits_at_depth(depth)))
    }

    fn build(&self, c0: Polynomial, c1: Polynomial, depth: u32) -> Ciphertext {
        Ciphertext {
            scheme: self.params.scheme,
            c0,
            c1,
            depth,
        }
    }

    /// Computes `a + b`.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let (depth, bits) = self.align(a, b)?;

        Ok(self.build(a.c0.add(&b.c0, bits), a.c1.add(&b.c1, bits), depth))
    }

    /// Computes `a - b`.
    pub fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let (depth, bits) = self.align(a, b)?;

        Ok(self.build(a.c0.sub(&b.c0, bits), a.c1.sub(&b.c1, bits), depth))
    }

    /// Computes `-a`.
    pub fn negate(&self, a: &Ciphertext) -> Result<Ciphertext> {
        self.check_scheme(a)?;
        let bits = a.modulus_bits(&self.params);

        Ok(self.build(a.c0.neg(bits), a.c1.neg(bits), a.depth))
    }

    /// Adds the plaintext `values` slot-wise to `a`. Missing slots are zero.
    pub fn add_plain(&self, a: &Ciphertext, values: &[f64]) -> Result<Ciphertext> {
        self.check_scheme(a)?;
        let bits = a.modulus_bits(&self.params);
        let m = self.enc.encode_message(values, bits)?;

        Ok(self.build(a.c0.add(&m, bits), a.c1.clone(), a.depth))
    }

    /// Multiplies `a` slot-wise by the plaintext `values`. Missing slots are zero.
    ///
    /// # Remarks
    /// Consumes one level of multiplicative depth.
    pub fn multiply_plain(&self, a: &Ciphertext, values: &[f64]) -> Result<Ciphertext> {
        self.check_scheme(a)?;
        self.check_depth(a.depth)?;

        let bits = a.modulus_bits(&self.params);
        let m = self.enc.encode_multiplier(values, bits)?;

        let c0 = a.c0.mul(&m, bits);
        let c1 = a.c1.mul(&m, bits);

        Ok(self.rescale(c0, c1, a.depth))
    }

    /// Divides out the extra scale a product carries under [`Scheme::ApproxReal`] and moves the
    /// result one step down the modulus chain.
    fn rescale(&self, c0: Polynomial, c1: Polynomial, depth: u32) -> Ciphertext {
        match self.params.scheme {
            Scheme::ApproxReal => {
                let bits = self.params.modulus_bits_at_depth(depth + 1);
                let shift = self.params.scale_bits;

                self.build(
                    c0.round_shift(shift, bits),
                    c1.round_shift(shift, bits),
                    depth + 1,
                )
            }
            Scheme::ExactInteger => self.build(c0, c1, depth + 1),
        }
    }

    /// Computes `a * b` slot-wise and relinearizes the result.
    ///
    /// # Remarks
    /// Consumes one level of multiplicative depth and requires a relinearization key.
    pub fn multiply(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let (depth, bits) = self.align(a, b)?;
        self.check_depth(depth)?;
        let relin = self.key.relin_key()?;

        let (a0, a1) = (a.c0.reduce(bits), a.c1.reduce(bits));
        let (b0, b1) = (b.c0.reduce(bits), b.c1.reduce(bits));

        let (d0, d1, d2) = match self.params.scheme {
            Scheme::ApproxReal => (
                a0.mul(&b0, bits),
                a0.mul(&b1, bits).add(&a1.mul(&b0, bits), bits),
                a1.mul(&b1, bits),
            ),
            Scheme::ExactInteger => {
                // Exact products need the tensor over the integers scaled by t / q.
                let t = self.params.plain_modulus;
                let (a0, a1) = (a0.centered(bits), a1.centered(bits));
                let (b0, b1) = (b0.centered(bits), b1.centered(bits));

                (
                    scaled_tensor(&[(a0.as_slice(), b0.as_slice())], t, bits),
                    scaled_tensor(
                        &[(a0.as_slice(), b1.as_slice()), (a1.as_slice(), b0.as_slice())],
                        t,
                        bits,
                    ),
                    scaled_tensor(&[(a1.as_slice(), b1.as_slice())], t, bits),
                )
            }
        };

        let (k0, k1) = relin.switch(&self.params, &d2, bits);

        Ok(self.rescale(d0.add(&k0, bits), d1.add(&k1, bits), depth))
    }

    /// Applies `X -> X^g` to the encrypted message, switching back to the original key.
    fn apply_galois(&self, a: &Ciphertext, g: usize) -> Result<Ciphertext> {
        let key = self.key.galois_key(g)?;
        let bits = a.modulus_bits(&self.params);

        let c0 = a.c0.automorphism(g, bits);
        let c1 = a.c1.automorphism(g, bits);
        let (k0, k1) = key.switch(&self.params, &c1, bits);

        Ok(self.build(c0.add(&k0, bits), k1, a.depth))
    }

    /// Sums every slot of `a` into every slot of the result.
    ///
    /// # Remarks
    /// Repeatedly adds a rotated copy of the accumulator to itself, doubling the number of
    /// summed slots each time. Requires rotation keys but consumes no depth.
    pub fn sum_slots(&self, a: &Ciphertext) -> Result<Ciphertext> {
        self.check_scheme(a)?;

        let mut acc = a.clone();

        for g in galois_elements(&self.params) {
            let rotated = self.apply_galois(&acc, g)?;
            acc = self.add(&acc, &rotated)?;
        }

        trace!("Summed slots at depth {}", acc.depth);

        Ok(acc)
    }

    /// Computes the inner product of `a` and `b`, placing it in every slot.
    pub fn dot_product(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        let product = self.multiply(a, b)?;

        self.sum_slots(&product)
    }
}
