use std::mem::size_of;

use serde::{Deserialize, Serialize};

use crate::{Error, Params, Polynomial, Result, Scheme, safe_bincode::GetSize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// An RLWE ciphertext `(c0, c1)` with `c0 + c1 * s ≈ m`.
///
/// # Remarks
/// `depth` counts the multiplications that produced this ciphertext. Under
/// [`Scheme::ApproxReal`] it also selects the modulus the coefficients are reduced by.
pub struct Ciphertext {
    pub(crate) scheme: Scheme,
    pub(crate) c0: Polynomial,
    pub(crate) c1: Polynomial,
    pub(crate) depth: u32,
}

impl Ciphertext {
    /// The scheme this ciphertext was encrypted under.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// The number of multiplications applied so far.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The number of multiplications this ciphertext still supports under `params`.
    pub fn remaining_depth(&self, params: &Params) -> u32 {
        params.mul_depth.saturating_sub(self.depth)
    }

    /// The bit size of the modulus the coefficients live under.
    pub fn modulus_bits(&self, params: &Params) -> u32 {
        params.modulus_bits_at_depth(self.depth)
    }
}

impl GetSize for Ciphertext {
    fn get_size(params: &Params) -> usize {
        // Enum tag and depth, then two length-prefixed coefficient sequences.
        2 * size_of::<u32>() + 2 * (size_of::<u64>() + params.poly_degree * size_of::<u128>())
    }

    fn check_is_valid(&self, params: &Params) -> Result<()> {
        if self.scheme != params.scheme || self.depth > params.mul_depth {
            return Err(Error::Malformed);
        }

        let bits = self.modulus_bits(params);

        for p in [&self.c0, &self.c1] {
            if p.len() != params.poly_degree || !p.is_reduced(bits) {
                return Err(Error::Malformed);
            }
        }

        Ok(())
    }
}
