use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// The two families of homomorphic encryption this crate supports.
pub enum Scheme {
    /// Approximate arithmetic over real numbers. Every value carries a small error that grows
    /// with each multiplication, and each multiplication consumes one rescaling level of the
    /// modulus chain.
    ApproxReal,

    /// Exact arithmetic over integers modulo [`Params::plain_modulus`].
    ExactInteger,
}

impl Scheme {
    /// A stable, human readable name for this scheme.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApproxReal => "approx_real",
            Self::ExactInteger => "exact_integer",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The parameters for a ring-LWE scheme over `Z_Q[X]/(X^N + 1)`.
///
/// # Remarks
/// All ciphertext moduli are powers of two. This makes modulus switching a shift and lets every
/// ring operation use wrapping `u128` arithmetic followed by a mask.
///
/// For [`Scheme::ApproxReal`] the modulus chain is `[base_modulus_bits, scale_bits, ...]` with
/// `mul_depth` entries of `scale_bits`. A fresh ciphertext lives at the top of the chain and each
/// multiplication divides by `2^scale_bits`, dropping one entry.
///
/// For [`Scheme::ExactInteger`] there is a single modulus `2^base_modulus_bits` and `mul_depth`
/// is the number of multiplications the noise budget tolerates.
///
/// # Key switching
/// Relinearization and slot rotations switch keys with a special modulus `P =
/// 2^special_modulus_bits` and a gadget decomposition in base `2^radix_log`. Keys live modulo
/// `P * Q`, so `special_modulus_bits` plus the top modulus must fit in 127 bits.
pub struct Params {
    /// The scheme family.
    pub scheme: Scheme,

    /// The polynomial degree `N`. Must be a power of two.
    pub poly_degree: usize,

    /// The bit size of the bottom modulus of the chain.
    pub base_modulus_bits: u32,

    /// The bit size of the encoding scale `Δ` and of every rescaling step. Unused by
    /// [`Scheme::ExactInteger`].
    pub scale_bits: u32,

    /// The number of multiplications a fresh ciphertext supports.
    pub mul_depth: u32,

    /// The plaintext modulus `t`. Unused by [`Scheme::ApproxReal`].
    pub plain_modulus: u64,

    /// The bit size of the special key switching modulus `P`.
    pub special_modulus_bits: u32,

    /// The log2 of the gadget base used when key switching.
    pub radix_log: u32,

    /// The standard deviation of the discrete Gaussian error distribution.
    pub noise_sigma: f64,
}

impl Params {
    /// The bit size of the ciphertext modulus after `depth` multiplications.
    pub fn modulus_bits_at_depth(&self, depth: u32) -> u32 {
        match self.scheme {
            Scheme::ApproxReal => {
                let level = self.mul_depth.saturating_sub(depth);
                self.base_modulus_bits + self.scale_bits * level
            }
            Scheme::ExactInteger => self.base_modulus_bits,
        }
    }

    /// The bit size of the modulus fresh ciphertexts and public keys live under.
    pub fn top_modulus_bits(&self) -> u32 {
        self.modulus_bits_at_depth(0)
    }

    /// The bit sizes of each prime-power step in the modulus chain, bottom first.
    pub fn modulus_chain_bits(&self) -> Vec<u32> {
        let mut chain = vec![self.base_modulus_bits];

        if self.scheme == Scheme::ApproxReal {
            chain.extend(std::iter::repeat_n(self.scale_bits, self.mul_depth as usize));
        }

        chain
    }

    /// The number of values a single ciphertext holds.
    pub fn slot_count(&self) -> usize {
        match self.scheme {
            Scheme::ApproxReal => self.poly_degree / 2,
            Scheme::ExactInteger => self.poly_degree,
        }
    }

    /// The encoding scale `Δ` for [`Scheme::ApproxReal`].
    pub fn scale(&self) -> f64 {
        (self.scale_bits as f64).exp2()
    }

    /// The bit size of the modulus key switching keys live under.
    pub fn keyswitch_modulus_bits(&self) -> u32 {
        self.top_modulus_bits() + self.special_modulus_bits
    }

    /// The number of gadget digits needed to decompose a polynomial modulo `2^modulus_bits`.
    pub fn keyswitch_digits(&self, modulus_bits: u32) -> usize {
        modulus_bits.div_ceil(self.radix_log) as usize
    }

    /// The largest magnitude a plaintext value may have when encoded.
    pub fn max_plain_magnitude(&self) -> f64 {
        match self.scheme {
            Scheme::ApproxReal => {
                ((self.base_modulus_bits - self.scale_bits - 2) as f64).exp2()
            }
            Scheme::ExactInteger => ((self.plain_modulus - 1) / 2) as f64,
        }
    }

    /// Checks these parameters describe a scheme this crate can run correctly.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidParams(msg));

        if !self.poly_degree.is_power_of_two() || !(16..=4096).contains(&self.poly_degree) {
            return invalid(format!(
                "polynomial degree {} is not a power of two in [16, 4096]",
                self.poly_degree
            ));
        }

        if self.radix_log == 0 || self.radix_log > 32 {
            return invalid(format!("radix log {} not in [1, 32]", self.radix_log));
        }

        if self.special_modulus_bits < self.radix_log {
            return invalid("special modulus must be at least as wide as the gadget base".into());
        }

        if self.keyswitch_modulus_bits() > 127 {
            return invalid(format!(
                "key switching modulus of {} bits exceeds 127",
                self.keyswitch_modulus_bits()
            ));
        }

        if !(self.noise_sigma.is_finite() && self.noise_sigma > 0.0) {
            return invalid(format!("noise sigma {} must be positive", self.noise_sigma));
        }

        match self.scheme {
            Scheme::ApproxReal => {
                if self.scale_bits == 0 || self.base_modulus_bits < self.scale_bits + 8 {
                    return invalid(
                        "base modulus must leave at least 8 bits above the scale".into(),
                    );
                }
            }
            Scheme::ExactInteger => {
                let t = self.plain_modulus;
                let two_n = 2 * self.poly_degree as u64;

                if t < 3 || t >= 1 << 20 || t % two_n != 1 || !is_prime(t) {
                    return invalid(format!(
                        "plain modulus {t} must be a prime below 2^20 congruent to 1 mod {two_n}"
                    ));
                }

                if self.base_modulus_bits > 100 || self.base_modulus_bits < 32 {
                    return invalid(format!(
                        "exact scheme modulus of {} bits not in [32, 100]",
                        self.base_modulus_bits
                    ));
                }

                if self.mul_depth > 2 {
                    return invalid("exact scheme supports at most 2 multiplications".into());
                }
            }
        }

        Ok(())
    }
}

fn is_prime(x: u64) -> bool {
    x >= 2 && (2..).take_while(|d| d * d <= x).all(|d| x % d != 0)
}

/// An approximate scheme preset with a single rescaling level.
///
/// # Remarks
/// The preset parameter sets in this crate are sized to keep key generation and evaluation fast.
/// They use power-of-two moduli and small degrees and are not hardened production parameters.
pub const APPROX_LIGHT: Params = Params {
    scheme: Scheme::ApproxReal,
    poly_degree: 1024,
    base_modulus_bits: 50,
    scale_bits: 30,
    mul_depth: 1,
    plain_modulus: 0,
    special_modulus_bits: 16,
    radix_log: 16,
    noise_sigma: 3.2,
};

/// An approximate scheme preset with twice the slots and two rescaling levels.
pub const APPROX_STANDARD: Params = Params {
    scheme: Scheme::ApproxReal,
    poly_degree: 2048,
    base_modulus_bits: 50,
    scale_bits: 30,
    mul_depth: 2,
    plain_modulus: 0,
    special_modulus_bits: 16,
    radix_log: 16,
    noise_sigma: 3.2,
};

/// An exact integer preset over `t = 65537`.
pub const EXACT_LIGHT: Params = Params {
    scheme: Scheme::ExactInteger,
    poly_degree: 1024,
    base_modulus_bits: 96,
    scale_bits: 0,
    mul_depth: 1,
    plain_modulus: 65537,
    special_modulus_bits: 16,
    radix_log: 16,
    noise_sigma: 3.2,
};

/// An exact integer preset over `t = 65537` with twice the slots and a wider modulus that
/// tolerates two multiplications.
pub const EXACT_STANDARD: Params = Params {
    scheme: Scheme::ExactInteger,
    poly_degree: 2048,
    base_modulus_bits: 100,
    scale_bits: 0,
    mul_depth: 2,
    plain_modulus: 65537,
    special_modulus_bits: 16,
    radix_log: 16,
    noise_sigma: 3.2,
};

impl Default for Params {
    fn default() -> Self {
        APPROX_LIGHT
    }
}
