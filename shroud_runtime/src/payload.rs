use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use cached::{Cached, SizedCache};
use log::debug;
use serde::{Deserialize, Serialize};
use shroud_lattice::{Ciphertext, Scheme};

use crate::{Error, KeyId, PayloadId, Result, lock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Bookkeeping about a stored ciphertext.
pub struct PayloadInfo {
    /// The payload's handle.
    pub payload_id: PayloadId,

    /// The context whose keys encrypted this payload.
    pub key_id: KeyId,

    /// The scheme the payload was encrypted under.
    pub scheme: Scheme,

    /// The number of meaningful values. Decryption truncates to this many slots.
    pub logical_len: usize,

    /// When the payload was stored, in milliseconds since the Unix epoch.
    pub created_at_ms: u64,

    /// An upper bound on the magnitude of every value, carried through each operation.
    pub magnitude: f64,

    /// The number of homomorphic operations that led to this payload. Fresh encryptions are 0.
    pub op_count: u32,

    /// The serialized size of the ciphertext.
    pub size_bytes: usize,

    /// The time spent computing this payload, in microseconds.
    pub compute_us: u64,
}

/// The largest absolute value in `values`.
pub(crate) fn max_magnitude(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |max, v| max.max(v.abs()))
}

#[derive(Debug, Clone)]
pub(crate) struct Payload {
    pub info: PayloadInfo,
    pub ciphertext: Arc<Ciphertext>,
}

struct Inner {
    cache: SizedCache<PayloadId, Payload>,
    owners: HashMap<KeyId, HashSet<PayloadId>>,
}

impl Inner {
    fn forget(&mut self, id: PayloadId) -> Option<Payload> {
        let payload = self.cache.cache_remove(&id)?;

        if let Some(owned) = self.owners.get_mut(&payload.info.key_id) {
            owned.remove(&id);

            if owned.is_empty() {
                self.owners.remove(&payload.info.key_id);
            }
        }

        Some(payload)
    }
}

/// A bounded map from [`PayloadId`] to ciphertext that evicts the least recently used payload
/// when full.
///
/// # Remarks
/// Payloads are immutable once stored. Readers get an [`Arc`] to the ciphertext, so the lock is
/// never held while computing.
pub(crate) struct PayloadStore {
    inner: Mutex<Inner>,
    capacity: usize,
    evictions: AtomicU64,
}

impl PayloadStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            inner: Mutex::new(Inner {
                cache: SizedCache::with_size(capacity),
                owners: HashMap::new(),
            }),
            capacity,
            evictions: AtomicU64::new(0),
        }
    }

    /// Stores `payload`, evicting the least recently used payload if the store is full.
    pub fn put(&self, payload: Payload) {
        let id = payload.info.payload_id;
        let owner = payload.info.key_id;
        let mut inner = lock(&self.inner);

        if inner.cache.cache_size() >= self.capacity {
            let oldest = inner.cache.key_order().last().copied();

            if let Some(evicted) = oldest.and_then(|oldest| inner.forget(oldest)) {
                self.evictions.fetch_add(1, Ordering::Relaxed);

                debug!(
                    "Evicted payload {} of key {} to make room for payload {id}",
                    evicted.info.payload_id, evicted.info.key_id
                );
            }
        }

        inner.owners.entry(owner).or_default().insert(id);
        inner.cache.cache_set(id, payload);
    }

    /// Fetches a payload and marks it most recently used.
    pub fn get(&self, id: PayloadId) -> Result<Payload> {
        lock(&self.inner)
            .cache
            .cache_get(&id)
            .cloned()
            .ok_or(Error::PayloadNotFound(id))
    }

    /// Removes the given payloads, returning how many existed.
    pub fn delete_many(&self, ids: &[PayloadId]) -> usize {
        let mut inner = lock(&self.inner);

        ids.iter().filter(|id| inner.forget(**id).is_some()).count()
    }

    /// Removes every payload owned by `key_id`, returning how many existed.
    pub fn delete_owned_by(&self, key_id: KeyId) -> usize {
        let mut inner = lock(&self.inner);

        let owned = inner.owners.remove(&key_id).unwrap_or_default();

        owned
            .into_iter()
            .filter(|id| inner.cache.cache_remove(id).is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).cache.cache_size()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use shroud_lattice::{APPROX_LIGHT, test_utils::{get_approx_keys, get_encryption}};

    use super::*;

    fn payload(key_id: KeyId) -> Payload {
        let enc = get_encryption(&APPROX_LIGHT);
        let ct = enc.encrypt(&[1.0], &get_approx_keys().public).unwrap();

        Payload {
            info: PayloadInfo {
                payload_id: PayloadId::next(),
                key_id,
                scheme: Scheme::ApproxReal,
                logical_len: 1,
                created_at_ms: 0,
                magnitude: 1.0,
                op_count: 0,
                size_bytes: 0,
                compute_us: 0,
            },
            ciphertext: Arc::new(ct),
        }
    }

    #[test]
    fn evicts_least_recently_used() {
        let store = PayloadStore::new(2);
        let key = KeyId::next();

        let a = payload(key);
        let b = payload(key);
        let c = payload(key);
        let (a_id, b_id, c_id) = (a.info.payload_id, b.info.payload_id, c.info.payload_id);

        store.put(a);
        store.put(b);

        // Touch a so b is the oldest.
        store.get(a_id).unwrap();
        store.put(c);

        assert_eq!(store.len(), 2);
        assert_eq!(store.evictions(), 1);
        assert!(store.get(a_id).is_ok());
        assert!(store.get(c_id).is_ok());
        assert!(matches!(store.get(b_id), Err(Error::PayloadNotFound(id)) if id == b_id));
    }

    #[test]
    fn deletes_by_owner() {
        let store = PayloadStore::new(16);
        let key_1 = KeyId::next();
        let key_2 = KeyId::next();

        for _ in 0..3 {
            store.put(payload(key_1));
        }

        let other = payload(key_2);
        let other_id = other.info.payload_id;
        store.put(other);

        assert_eq!(store.delete_owned_by(key_1), 3);
        assert_eq!(store.delete_owned_by(key_1), 0);
        assert_eq!(store.len(), 1);
        assert!(store.get(other_id).is_ok());
    }

    #[test]
    fn delete_many_counts_existing() {
        let store = PayloadStore::new(16);
        let key = KeyId::next();

        let a = payload(key);
        let a_id = a.info.payload_id;
        store.put(a);

        assert_eq!(store.delete_many(&[a_id, PayloadId(u64::MAX)]), 1);
        assert_eq!(store.len(), 0);
    }
}
