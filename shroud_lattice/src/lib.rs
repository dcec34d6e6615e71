#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! This crate provides the ring-LWE primitives behind the Shroud engine: parameter sets, key
//! generation, slot encoding, encryption, decryption and homomorphic evaluation.
//!
//! Two scheme families are supported:
//! * [`Scheme::ApproxReal`] packs real vectors into the canonical embedding and rescales after
//!   every multiplication, so each product consumes one level of the modulus chain.
//! * [`Scheme::ExactInteger`] packs integer vectors modulo a prime plaintext modulus and computes
//!   on them exactly until the noise budget runs out.
//!
//! Both schemes support slot-wise addition and multiplication, plaintext operands and summing
//! every slot with rotations, which together give encrypted dot products.
//!
//! # Example
//!
//! ```rust
//! use shroud_lattice::{APPROX_LIGHT, Encryption, Evaluation, KeySet, KeygenOptions};
//!
//! // Generate our keys.
//! let keys = KeySet::generate(&APPROX_LIGHT, &KeygenOptions::ALL).unwrap();
//!
//! // Generate the things needed to encrypt data and compute on it.
//! let enc = Encryption::new(&APPROX_LIGHT).unwrap();
//! let eval = Evaluation::new(keys.evaluation.clone(), &APPROX_LIGHT, &enc);
//!
//! let a = enc.encrypt(&[1.0, 2.0, 3.0], &keys.public).unwrap();
//! let b = enc.encrypt(&[4.0, 5.0, 6.0], &keys.public).unwrap();
//!
//! let dot = eval.dot_product(&a, &b).unwrap();
//! let result = enc.decrypt(&dot, &keys.secret).unwrap();
//!
//! assert!((result[0] - 32.0).abs() < 1e-2);
//! ```
mod ciphertext;
mod encoding;
mod encryption;
mod error;
mod evaluation;
mod keys;
mod keyswitch;
mod params;

/// Polynomial arithmetic in the negacyclic ring modulo a power of two.
pub mod poly;

mod sampling;

/// A safe wrapper around [`bincode`] deserialization to limit input sizes and prevent malicious or
/// improperly serialized data from causing panics.
pub mod safe_bincode;

#[doc(hidden)]
pub mod test_utils;

pub use ciphertext::Ciphertext;
pub use encoding::{ApproxEncoder, ExactEncoder, SlotEncoder};
pub use encryption::Encryption;
pub use error::*;
pub use evaluation::Evaluation;
pub use keys::{EvaluationKey, KeySet, KeygenOptions, PublicKey, SecretKey, galois_elements};
pub use keyswitch::KeySwitchKey;
pub use params::*;
pub use poly::Polynomial;
