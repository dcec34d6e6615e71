use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use shroud_lattice::{
    Encryption, Evaluation, KeySet, KeygenOptions, Params, Scheme, safe_bincode,
};

use crate::{Error, KeyId, Result, lock};

/// The security level every preset targets.
pub const SECURITY_BITS: u32 = 128;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// How a context's key material came to be.
pub struct KeyMetadata {
    /// The key material was reused from an earlier context rather than generated.
    pub pooled: bool,

    /// How long generating the key material took, in milliseconds. For pooled contexts this is
    /// the cost the original generation paid.
    pub keygen_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A description of a context that reveals nothing secret.
pub struct KeyInfo {
    /// The context's handle.
    pub key_id: KeyId,

    /// The scheme family.
    pub scheme: Scheme,

    /// The preset the parameters came from.
    pub preset: String,

    /// The polynomial degree `N`.
    pub poly_degree: usize,

    /// The bit sizes of the modulus chain from bottom to top.
    pub modulus_chain_bits: Vec<u32>,

    /// The number of values one ciphertext holds.
    pub slot_count: usize,

    /// The number of multiplications a fresh ciphertext supports.
    pub max_mul_depth: u32,

    /// The targeted security level.
    pub security_bits: u32,

    /// When the context was created, in milliseconds since the Unix epoch.
    pub created_at_ms: u64,

    /// A hex BLAKE3 digest of the serialized public key.
    pub public_key_fingerprint: String,

    /// Whether the context can sum slots.
    pub has_rotation_keys: bool,

    /// Whether the context can multiply ciphertexts.
    pub has_relin_keys: bool,

    /// How the key material was obtained.
    pub metadata: KeyMetadata,
}

/// Everything derived from one key generation. Immutable and shared by every context the
/// material is pooled into.
pub(crate) struct KeyMaterial {
    pub params: Params,
    pub keys: KeySet,
    pub enc: Encryption,
    pub eval: Evaluation,
    pub fingerprint: String,
    pub keygen_ms: u64,
}

impl KeyMaterial {
    pub fn generate(params: &Params, options: &KeygenOptions) -> Result<Self> {
        let now = Instant::now();

        let keys = KeySet::generate(params, options)?;
        let enc = Encryption::new(params)?;
        let eval = Evaluation::new(keys.evaluation.clone(), params, &enc);

        let pk = safe_bincode::serialize(keys.public.as_ref())?;
        let fingerprint = blake3::hash(&pk).to_hex().to_string();

        Ok(Self {
            params: params.clone(),
            keys,
            enc,
            eval,
            fingerprint,
            keygen_ms: now.elapsed().as_millis() as u64,
        })
    }
}

/// A logical context: a key id bound to key material.
pub(crate) struct CryptoContext {
    pub key_id: KeyId,
    pub preset: String,
    pub material: Arc<KeyMaterial>,
    pub created_at_ms: u64,
    pub pooled: bool,
}

impl CryptoContext {
    pub fn params(&self) -> &Params {
        &self.material.params
    }

    pub fn info(&self) -> KeyInfo {
        let params = self.params();
        let evaluation = &self.material.keys.evaluation;

        KeyInfo {
            key_id: self.key_id,
            scheme: params.scheme,
            preset: self.preset.clone(),
            poly_degree: params.poly_degree,
            modulus_chain_bits: params.modulus_chain_bits(),
            slot_count: params.slot_count(),
            max_mul_depth: params.mul_depth,
            security_bits: SECURITY_BITS,
            created_at_ms: self.created_at_ms,
            public_key_fingerprint: self.material.fingerprint.clone(),
            has_rotation_keys: evaluation.has_rotation_keys(),
            has_relin_keys: evaluation.has_relin_key(),
            metadata: KeyMetadata {
                pooled: self.pooled,
                keygen_ms: self.material.keygen_ms,
            },
        }
    }
}

type PoolKey = (Scheme, String, KeygenOptions);

/// Owns every live context and, when pooling, the key material contexts share.
pub(crate) struct ContextManager {
    contexts: Mutex<HashMap<KeyId, Arc<CryptoContext>>>,
    pool: Option<Mutex<HashMap<PoolKey, Arc<KeyMaterial>>>>,
}

impl ContextManager {
    pub fn new(pooling: bool) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            pool: pooling.then(|| Mutex::new(HashMap::new())),
        }
    }

    fn material(
        &self,
        params: &Params,
        preset: &str,
        options: KeygenOptions,
    ) -> Result<(Arc<KeyMaterial>, bool)> {
        let Some(pool) = &self.pool else {
            return Ok((Arc::new(KeyMaterial::generate(params, &options)?), false));
        };

        let pool_key = (params.scheme, preset.to_owned(), options);

        if let Some(material) = lock(pool).get(&pool_key) {
            return Ok((material.clone(), true));
        }

        // Generate without holding the lock. If another thread won the race, use its material.
        let material = Arc::new(KeyMaterial::generate(params, &options)?);
        let material = lock(pool).entry(pool_key).or_insert(material).clone();

        Ok((material, false))
    }

    /// Creates a context with a fresh key id.
    pub fn create(
        &self,
        params: &Params,
        preset: &str,
        options: KeygenOptions,
    ) -> Result<Arc<CryptoContext>> {
        let (material, pooled) = self.material(params, preset, options)?;

        let context = Arc::new(CryptoContext {
            key_id: KeyId::next(),
            preset: preset.to_owned(),
            material,
            created_at_ms: now_ms(),
            pooled,
        });

        if pooled {
            debug!(
                "Context {} reuses pooled {} \"{preset}\" keys",
                context.key_id, params.scheme
            );
        } else {
            info!(
                "Context {} generated {} \"{preset}\" keys in {}ms",
                context.key_id, params.scheme, context.material.keygen_ms
            );
        }

        lock(&self.contexts).insert(context.key_id, context.clone());

        Ok(context)
    }

    pub fn get(&self, key_id: KeyId) -> Result<Arc<CryptoContext>> {
        lock(&self.contexts)
            .get(&key_id)
            .cloned()
            .ok_or(Error::KeyNotFound(key_id))
    }

    pub fn remove(&self, key_id: KeyId) -> Option<Arc<CryptoContext>> {
        lock(&self.contexts).remove(&key_id)
    }

    pub fn key_ids(&self) -> Vec<KeyId> {
        let mut ids = lock(&self.contexts).keys().copied().collect::<Vec<_>>();
        ids.sort();

        ids
    }

    pub fn len(&self) -> usize {
        lock(&self.contexts).len()
    }
}
