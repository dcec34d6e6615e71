use std::{collections::BTreeMap, mem::size_of, sync::Arc};

use log::trace;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    Error, KeySwitchKey, Params, Polynomial, Result, Scheme,
    safe_bincode::GetSize,
    sampling::{gaussian, ternary, uniform},
};

#[derive(Clone, Serialize, Deserialize)]
/// A secret key.
///
/// # Security
/// You should generally never share the [`SecretKey`] with other parties, as they'll be able to
/// decrypt any data encrypted under it.
pub struct SecretKey {
    pub(crate) s: Vec<i64>,
}

impl SecretKey {
    /// Generate a ternary [`SecretKey`] under the given parameter set.
    pub fn generate(params: &Params) -> Self {
        Self {
            s: ternary(params.poly_degree),
        }
    }

    pub(crate) fn to_poly(&self, bits: u32) -> Polynomial {
        Polynomial::from_small(&self.s, bits)
    }
}

impl GetSize for SecretKey {
    fn get_size(params: &Params) -> usize {
        // Magic 1 is the length of the serialized sequence.
        (params.poly_degree + 1) * size_of::<u64>()
    }

    fn check_is_valid(&self, params: &Params) -> Result<()> {
        if self.s.len() != params.poly_degree || self.s.iter().any(|x| !(-1..=1).contains(x)) {
            return Err(Error::Malformed);
        }

        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
/// An RLWE public key `(-a * s + e, a)` modulo the top ciphertext modulus.
pub struct PublicKey {
    pub(crate) p0: Polynomial,
    pub(crate) p1: Polynomial,
}

impl PublicKey {
    /// Generate a public key from the given secret key.
    pub fn generate(params: &Params, sk: &SecretKey) -> Result<Self> {
        let bits = params.top_modulus_bits();
        let n = params.poly_degree;

        let a = uniform(n, bits);
        let e = Polynomial::from_small(&gaussian(n, params.noise_sigma)?, bits);
        let p0 = a.mul(&sk.to_poly(bits), bits).neg(bits).add(&e, bits);

        Ok(Self { p0, p1: a })
    }
}

impl GetSize for PublicKey {
    fn get_size(params: &Params) -> usize {
        2 * (size_of::<u64>() + params.poly_degree * size_of::<u128>())
    }

    fn check_is_valid(&self, params: &Params) -> Result<()> {
        let bits = params.top_modulus_bits();

        for p in [&self.p0, &self.p1] {
            if p.len() != params.poly_degree || !p.is_reduced(bits) {
                return Err(Error::Malformed);
            }
        }

        Ok(())
    }
}

/// The Galois elements whose automorphisms sum every slot into every other slot.
///
/// # Remarks
/// Powers of 5 generate half of `(Z/2N)^*` and act on the slots as rotations. The exact scheme
/// batches into all `N` roots, so it additionally needs the conjugation `X -> X^(2N - 1)`.
pub fn galois_elements(params: &Params) -> Vec<usize> {
    let two_n = 2 * params.poly_degree;
    let steps = (params.poly_degree / 2).ilog2();

    let mut elements = Vec::with_capacity(steps as usize + 1);
    let mut g = 5usize;

    for _ in 0..steps {
        elements.push(g);
        g = g * g % two_n;
    }

    if params.scheme == Scheme::ExactInteger {
        elements.push(two_n - 1);
    }

    elements
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Which evaluation keys to generate alongside a secret and public key.
pub struct KeygenOptions {
    /// Generate the rotation keys needed to sum slots.
    pub rotation_keys: bool,

    /// Generate the relinearization key needed to multiply ciphertexts.
    pub relin_keys: bool,
}

impl KeygenOptions {
    /// Generate every evaluation key.
    pub const ALL: Self = Self {
        rotation_keys: true,
        relin_keys: true,
    };
}

#[derive(Clone, Serialize, Deserialize)]
/// The keys a server needs to evaluate on ciphertexts.
///
/// # Remarks
/// Evaluation keys are large (several MB for the presets), so you should serialize them with a
/// protocol that can efficiently store arrays, such as [`bincode`].
pub struct EvaluationKey {
    relin: Option<KeySwitchKey>,
    galois: BTreeMap<usize, KeySwitchKey>,
}

impl EvaluationKey {
    /// Generate the evaluation keys requested in `options`.
    pub fn generate(params: &Params, sk: &SecretKey, options: &KeygenOptions) -> Result<Self> {
        let bits = params.keyswitch_modulus_bits();
        let s = sk.to_poly(bits);

        let (relin, galois) = rayon::join(
            || {
                options
                    .relin_keys
                    .then(|| KeySwitchKey::generate(params, &s.mul(&s, bits), sk))
                    .transpose()
            },
            || {
                if !options.rotation_keys {
                    return Ok(BTreeMap::new());
                }

                galois_elements(params)
                    .into_par_iter()
                    .map(|g| Ok((g, KeySwitchKey::generate(params, &s.automorphism(g, bits), sk)?)))
                    .collect::<Result<BTreeMap<_, _>>>()
            },
        );

        Ok(Self {
            relin: relin?,
            galois: galois?,
        })
    }

    /// Whether this key can relinearize products.
    pub fn has_relin_key(&self) -> bool {
        self.relin.is_some()
    }

    /// Whether this key can sum slots.
    pub fn has_rotation_keys(&self) -> bool {
        !self.galois.is_empty()
    }

    pub(crate) fn relin_key(&self) -> Result<&KeySwitchKey> {
        self.relin.as_ref().ok_or(Error::MissingRelinearizationKey)
    }

    pub(crate) fn galois_key(&self, g: usize) -> Result<&KeySwitchKey> {
        self.galois.get(&g).ok_or(Error::MissingRotationKey(g))
    }
}

#[derive(Clone)]
/// Every key generated for one parameter set.
pub struct KeySet {
    /// The secret key.
    pub secret: Arc<SecretKey>,

    /// The public key used to encrypt.
    pub public: Arc<PublicKey>,

    /// The evaluation keys.
    pub evaluation: Arc<EvaluationKey>,
}

impl KeySet {
    /// Validates `params`, then generates a secret key, a public key and the evaluation keys
    /// `options` asks for.
    pub fn generate(params: &Params, options: &KeygenOptions) -> Result<Self> {
        params.validate()?;

        let sk = SecretKey::generate(params);

        let (pk, ek) = rayon::join(
            || PublicKey::generate(params, &sk),
            || EvaluationKey::generate(params, &sk, options),
        );

        trace!(
            "Generated {} keys: degree={} relin={} rotation={}",
            params.scheme, params.poly_degree, options.relin_keys, options.rotation_keys
        );

        Ok(Self {
            secret: Arc::new(sk),
            public: Arc::new(pk?),
            evaluation: Arc::new(ek?),
        })
    }
}
