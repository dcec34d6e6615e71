use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::{debug, warn};
use shroud_lattice::{Ciphertext, KeygenOptions, Scheme, safe_bincode, safe_bincode::GetSize};

use crate::{
    EngineConfig, Error, KeyId, KeyInfo, PayloadId, PayloadInfo, Result,
    context::{ContextManager, CryptoContext, now_ms},
    metrics::{Metrics, PresetStatus, SchemeStatus, StatusReport},
    payload::{Payload, PayloadStore, max_magnitude},
};

/// Owns every context and payload and performs all encryption, computation and decryption.
///
/// # Remarks
/// [`Engine`] is [`Send`] and [`Sync`]. Share it between threads by reference or with an
/// [`Arc`]. Locks are only held while updating maps, never while doing cryptographic work.
///
/// # Example
/// ```rust
/// use shroud_lattice::Scheme;
/// use shroud_runtime::{Engine, EngineConfig};
///
/// let engine = Engine::new(EngineConfig::default()).unwrap();
/// let (key_id, _) = engine
///     .generate_context(Scheme::ExactInteger, "light", false, false)
///     .unwrap();
///
/// let a = engine.encrypt(key_id, &[1.0, 2.0, 3.0]).unwrap();
/// let b = engine.encrypt(key_id, &[10.0, 20.0, 30.0]).unwrap();
/// let sum = engine.add(key_id, a, b).unwrap();
///
/// assert_eq!(engine.decrypt(key_id, sum).unwrap(), vec![11.0, 22.0, 33.0]);
///
/// engine.cleanup_context(key_id).unwrap();
/// ```
pub struct Engine {
    config: EngineConfig,
    pub(crate) contexts: ContextManager,
    pub(crate) payloads: PayloadStore,
    pub(crate) metrics: Metrics,
}

impl Engine {
    /// Validates `config` and creates an empty engine.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        if !config.enabled {
            warn!("Engine created disabled; every request will fail");
        }

        Ok(Self {
            contexts: ContextManager::new(config.pool_contexts),
            payloads: PayloadStore::new(config.payload_capacity),
            metrics: Metrics::default(),
            config,
        })
    }

    /// The configuration this engine was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn ensure_available(&self) -> Result<()> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(Error::Unavailable)
        }
    }

    /// Fetches a payload and checks `key_id` owns it.
    pub(crate) fn owned_payload(&self, key_id: KeyId, payload_id: PayloadId) -> Result<Payload> {
        let payload = self.payloads.get(payload_id)?;

        if payload.info.key_id != key_id {
            warn!(
                "Payload {payload_id} of key {} used with key {key_id}",
                payload.info.key_id
            );

            return Err(Error::KeyMismatch {
                expected: key_id,
                found: payload.info.key_id,
            });
        }

        Ok(payload)
    }

    /// Stores a ciphertext as a new payload owned by `ctx`.
    ///
    /// # Remarks
    /// Cleanup removes a context before collecting its payloads, so checking the owner is still
    /// live after the insert means a payload is either collected by cleanup or dropped here.
    pub(crate) fn store(
        &self,
        ctx: &CryptoContext,
        ciphertext: Ciphertext,
        logical_len: usize,
        magnitude: f64,
        op_count: u32,
        compute_us: u64,
    ) -> Result<PayloadId> {
        let payload_id = PayloadId::next();

        self.payloads.put(Payload {
            info: PayloadInfo {
                payload_id,
                key_id: ctx.key_id,
                scheme: ciphertext.scheme(),
                logical_len,
                created_at_ms: now_ms(),
                magnitude,
                op_count,
                size_bytes: Ciphertext::get_size(ctx.params()),
                compute_us,
            },
            ciphertext: Arc::new(ciphertext),
        });

        if let Err(e) = self.contexts.get(ctx.key_id) {
            self.payloads.delete_many(&[payload_id]);
            debug!(
                "Dropped payload {payload_id}: key {} was destroyed while it was computed",
                ctx.key_id
            );

            return Err(e);
        }

        Ok(payload_id)
    }

    /// Generates a context for `scheme` with the named preset's parameters, returning its fresh
    /// key id.
    ///
    /// # Remarks
    /// When pooling is enabled, contexts with the same scheme, preset and key options share key
    /// material. Each still gets its own key id and payloads are never usable across key ids.
    pub fn generate_context(
        &self,
        scheme: Scheme,
        preset: &str,
        rotation_keys: bool,
        relin_keys: bool,
    ) -> Result<(KeyId, KeyInfo)> {
        self.ensure_available()?;

        let params = self.config.preset(scheme, preset)?;
        let options = KeygenOptions {
            rotation_keys,
            relin_keys,
        };

        let ctx = self.contexts.create(params, preset, options)?;
        self.metrics.context_created(ctx.pooled);

        Ok((ctx.key_id, ctx.info()))
    }

    /// Destroys a context and every payload it owns. Returns `false` if no such context exists.
    pub fn cleanup_context(&self, key_id: KeyId) -> Result<bool> {
        self.ensure_available()?;

        if self.contexts.remove(key_id).is_none() {
            debug!("Cleanup of unknown key {key_id}");
            return Ok(false);
        }

        let removed = self.payloads.delete_owned_by(key_id);
        self.metrics.context_destroyed();

        debug!("Destroyed context {key_id} and {removed} payloads");

        Ok(true)
    }

    /// Describes a live context.
    pub fn get_key_info(&self, key_id: KeyId) -> Result<KeyInfo> {
        self.ensure_available()?;

        Ok(self.contexts.get(key_id)?.info())
    }

    /// The key ids of every live context in ascending order.
    pub fn list_keys(&self) -> Result<Vec<KeyId>> {
        self.ensure_available()?;

        Ok(self.contexts.key_ids())
    }

    /// Describes a stored payload.
    pub fn payload_info(&self, payload_id: PayloadId) -> Result<PayloadInfo> {
        self.ensure_available()?;

        Ok(self.payloads.get(payload_id)?.info)
    }

    /// Removes the given payloads, returning how many existed.
    pub fn delete_payloads(&self, payload_ids: &[PayloadId]) -> Result<usize> {
        self.ensure_available()?;

        Ok(self.payloads.delete_many(payload_ids))
    }

    /// Encrypts `values` under the context's public key and stores the ciphertext.
    ///
    /// # Remarks
    /// Under [`Scheme::ExactInteger`] values are truncated toward zero.
    pub fn encrypt(&self, key_id: KeyId, values: &[f64]) -> Result<PayloadId> {
        self.ensure_available()?;

        let ctx = self.contexts.get(key_id)?;

        if values.is_empty() {
            return Err(Error::invalid_input("cannot encrypt an empty vector"));
        }

        let slots = ctx.params().slot_count();

        if values.len() > slots {
            return Err(Error::incompatible(format!(
                "{} values exceed the {slots} slots of key {key_id}",
                values.len()
            )));
        }

        let material = &ctx.material;
        let ct = material.enc.encrypt(values, &material.keys.public)?;

        self.metrics.encrypted();

        self.store(&ctx, ct, values.len(), max_magnitude(values), 0, 0)
    }

    /// Decrypts a payload, returning its logical values.
    pub fn decrypt(&self, key_id: KeyId, payload_id: PayloadId) -> Result<Vec<f64>> {
        self.ensure_available()?;

        let ctx = self.contexts.get(key_id)?;
        let payload = self.owned_payload(key_id, payload_id)?;

        let material = &ctx.material;
        let mut values = material
            .enc
            .decrypt(&payload.ciphertext, &material.keys.secret)?;

        values.truncate(payload.info.logical_len);
        self.metrics.decrypted();

        Ok(values)
    }

    /// Serializes a payload's ciphertext as standard base64 bincode.
    pub fn export_payload(&self, key_id: KeyId, payload_id: PayloadId) -> Result<String> {
        self.ensure_available()?;

        self.contexts.get(key_id)?;
        let payload = self.owned_payload(key_id, payload_id)?;

        Ok(STANDARD.encode(safe_bincode::serialize(payload.ciphertext.as_ref())?))
    }

    /// Validates a ciphertext exported under this context and stores it as a new payload with
    /// `logical_len` meaningful values.
    pub fn import_payload(&self, key_id: KeyId, data: &str, logical_len: usize) -> Result<PayloadId> {
        self.ensure_available()?;

        let ctx = self.contexts.get(key_id)?;
        let slots = ctx.params().slot_count();

        if logical_len == 0 || logical_len > slots {
            return Err(Error::invalid_input(format!(
                "logical length {logical_len} is outside 1..={slots}"
            )));
        }

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| Error::invalid_input(format!("ciphertext is not base64: {e}")))?;

        let ct: Ciphertext = safe_bincode::deserialize(&bytes, ctx.params()).map_err(|e| {
            warn!("Rejected imported ciphertext for key {key_id}: {e}");
            e
        })?;

        // Imported values have no known bound, so take it from every slot of the plaintext.
        let material = &ctx.material;
        let magnitude = max_magnitude(&material.enc.decrypt(&ct, &material.keys.secret)?);

        let op_count = ct.depth();
        self.metrics.encrypted();

        self.store(&ctx, ct, logical_len, magnitude, op_count, 0)
    }

    /// Reports availability, the configured presets and lifetime counters.
    ///
    /// # Remarks
    /// Unlike every other entry point, this succeeds on a disabled engine.
    pub fn status(&self) -> StatusReport {
        let schemes = [Scheme::ApproxReal, Scheme::ExactInteger]
            .into_iter()
            .map(|scheme| SchemeStatus {
                scheme,
                presets: self
                    .config
                    .presets
                    .for_scheme(scheme)
                    .iter()
                    .map(|(name, params)| PresetStatus {
                        name: name.clone(),
                        poly_degree: params.poly_degree,
                        modulus_chain_bits: params.modulus_chain_bits(),
                        slot_count: params.slot_count(),
                        max_mul_depth: params.mul_depth,
                    })
                    .collect(),
            })
            .collect();

        StatusReport {
            available: self.config.enabled,
            schemes,
            live_contexts: self.contexts.len(),
            live_payloads: self.payloads.len(),
            payload_capacity: self.payloads.capacity(),
            counters: self.metrics.snapshot(self.payloads.evictions()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{disabled_engine, engine};

    #[test]
    fn can_roundtrip_both_schemes() {
        let engine = engine();

        let (key, _) = engine
            .generate_context(Scheme::ApproxReal, "light", false, false)
            .unwrap();
        let values = [1.5, -2.25, 1000.0];
        let id = engine.encrypt(key, &values).unwrap();
        let actual = engine.decrypt(key, id).unwrap();

        assert_eq!(actual.len(), 3);
        for (a, v) in actual.iter().zip(values) {
            assert!((a - v).abs() < 1e-3);
        }

        let (key, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();
        let id = engine.encrypt(key, &[7.0, -3.0, 0.0, 12.9]).unwrap();

        assert_eq!(engine.decrypt(key, id).unwrap(), vec![7.0, -3.0, 0.0, 12.0]);
    }

    #[test]
    fn encrypt_rejects_bad_shapes() {
        let engine = engine();
        let (key, info) = engine
            .generate_context(Scheme::ApproxReal, "light", false, false)
            .unwrap();

        assert!(matches!(engine.encrypt(key, &[]), Err(Error::InvalidInput(_))));
        assert!(matches!(
            engine.encrypt(key, &vec![1.0; info.slot_count + 1]),
            Err(Error::Incompatible(_))
        ));
    }

    #[test]
    fn unknown_preset_is_invalid_input() {
        let engine = engine();

        assert!(matches!(
            engine.generate_context(Scheme::ApproxReal, "heavy", false, false),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn payloads_are_bound_to_their_key() {
        let engine = engine();
        let (key_1, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();
        let (key_2, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();

        let id = engine.encrypt(key_1, &[1.0]).unwrap();

        assert!(matches!(
            engine.decrypt(key_2, id),
            Err(Error::KeyMismatch { expected, found }) if expected == key_2 && found == key_1
        ));
    }

    #[test]
    fn cleanup_removes_context_and_payloads() {
        let engine = engine();
        let (key, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();
        let id = engine.encrypt(key, &[1.0, 2.0]).unwrap();

        assert!(engine.cleanup_context(key).unwrap());
        assert!(!engine.cleanup_context(key).unwrap());
        assert!(matches!(engine.get_key_info(key), Err(Error::KeyNotFound(_))));
        assert!(matches!(engine.decrypt(key, id), Err(Error::KeyNotFound(_))));
        assert!(matches!(engine.payload_info(id), Err(Error::PayloadNotFound(_))));
    }

    #[test]
    fn results_for_a_destroyed_context_are_dropped() {
        let engine = engine();
        let (key, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();

        // Holding the context mimics an operation that started before cleanup.
        let ctx = engine.contexts.get(key).unwrap();
        let material = &ctx.material;
        let ct = material.enc.encrypt(&[1.0], &material.keys.public).unwrap();

        assert!(engine.cleanup_context(key).unwrap());
        assert!(matches!(
            engine.store(&ctx, ct, 1, 1.0, 0, 0),
            Err(Error::KeyNotFound(k)) if k == key
        ));
        assert_eq!(engine.payloads.len(), 0);
    }

    #[test]
    fn imported_payloads_carry_a_magnitude() {
        let engine = engine();
        let (key, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();
        let id = engine.encrypt(key, &[4.0, -50.0, 6.0]).unwrap();

        let exported = engine.export_payload(key, id).unwrap();
        let imported = engine.import_payload(key, &exported, 3).unwrap();

        assert_eq!(engine.payload_info(id).unwrap().magnitude, 50.0);
        assert_eq!(engine.payload_info(imported).unwrap().magnitude, 50.0);
    }

    #[test]
    fn can_export_and_import() {
        let engine = engine();
        let (key, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();
        let id = engine.encrypt(key, &[4.0, 5.0, 6.0]).unwrap();

        let exported = engine.export_payload(key, id).unwrap();
        let imported = engine.import_payload(key, &exported, 3).unwrap();

        assert_ne!(id, imported);
        assert_eq!(engine.decrypt(key, imported).unwrap(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn import_rejects_malformed_transport() {
        let engine = engine();
        let (key, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();

        let err = engine.import_payload(key, "not base64!", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = engine.import_payload(key, &STANDARD.encode([0u8; 16]), 1).unwrap_err();
        assert!(matches!(err, Error::Primitive(_)));
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);

        let id = engine.encrypt(key, &[1.0]).unwrap();
        let exported = engine.export_payload(key, id).unwrap();

        assert!(matches!(
            engine.import_payload(key, &exported, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn import_rejects_ciphertexts_of_another_scheme() {
        let engine = engine();
        let (approx, _) = engine
            .generate_context(Scheme::ApproxReal, "light", false, false)
            .unwrap();
        let (exact, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();

        let id = engine.encrypt(approx, &[1.0]).unwrap();
        let exported = engine.export_payload(approx, id).unwrap();

        assert!(engine.import_payload(exact, &exported, 1).is_err());
    }

    #[test]
    fn disabled_engine_is_unavailable() {
        let engine = disabled_engine();

        assert!(matches!(
            engine.generate_context(Scheme::ApproxReal, "light", false, false),
            Err(Error::Unavailable)
        ));
        assert!(matches!(engine.encrypt(KeyId(1), &[1.0]), Err(Error::Unavailable)));
        assert!(matches!(engine.cleanup_context(KeyId(1)), Err(Error::Unavailable)));
        assert!(!engine.status().available);
    }

    #[test]
    fn status_counts_activity() {
        let engine = engine();
        let (key, _) = engine
            .generate_context(Scheme::ExactInteger, "light", false, false)
            .unwrap();
        let id = engine.encrypt(key, &[1.0]).unwrap();
        engine.decrypt(key, id).unwrap();

        let status = engine.status();

        assert!(status.available);
        assert_eq!(status.live_contexts, 1);
        assert_eq!(status.live_payloads, 1);
        assert_eq!(status.counters.contexts_created, 1);
        assert_eq!(status.counters.encryptions, 1);
        assert_eq!(status.counters.decryptions, 1);
        assert_eq!(status.schemes.len(), 2);
        assert!(status.schemes[0].presets.iter().any(|p| p.name == "standard"));
    }
}
