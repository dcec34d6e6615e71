use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use shroud_lattice::Scheme;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Counters accumulated over an engine's lifetime.
pub struct Counters {
    /// Contexts generated.
    pub contexts_created: u64,

    /// Contexts cleaned up.
    pub contexts_destroyed: u64,

    /// Contexts whose key material came from the pool.
    pub pool_hits: u64,

    /// Vectors encrypted, including imported ciphertexts.
    pub encryptions: u64,

    /// Payloads decrypted.
    pub decryptions: u64,

    /// Homomorphic operations dispatched.
    pub homomorphic_ops: u64,

    /// Payloads evicted to respect the capacity.
    pub evictions: u64,

    /// Total time spent in homomorphic operations, in microseconds.
    pub compute_us: u64,
}

#[derive(Default)]
pub(crate) struct Metrics {
    contexts_created: AtomicU64,
    contexts_destroyed: AtomicU64,
    pool_hits: AtomicU64,
    encryptions: AtomicU64,
    decryptions: AtomicU64,
    homomorphic_ops: AtomicU64,
    compute_us: AtomicU64,
}

impl Metrics {
    pub fn context_created(&self, pooled: bool) {
        self.contexts_created.fetch_add(1, Ordering::Relaxed);

        if pooled {
            self.pool_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn context_destroyed(&self) {
        self.contexts_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encrypted(&self) {
        self.encryptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrypted(&self) {
        self.decryptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn computed(&self, micros: u64) {
        self.homomorphic_ops.fetch_add(1, Ordering::Relaxed);
        self.compute_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self, evictions: u64) -> Counters {
        Counters {
            contexts_created: self.contexts_created.load(Ordering::Relaxed),
            contexts_destroyed: self.contexts_destroyed.load(Ordering::Relaxed),
            pool_hits: self.pool_hits.load(Ordering::Relaxed),
            encryptions: self.encryptions.load(Ordering::Relaxed),
            decryptions: self.decryptions.load(Ordering::Relaxed),
            homomorphic_ops: self.homomorphic_ops.load(Ordering::Relaxed),
            evictions,
            compute_us: self.compute_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The shape of one configured preset.
pub struct PresetStatus {
    /// The preset's name.
    pub name: String,

    /// The polynomial degree `N`.
    pub poly_degree: usize,

    /// The bit sizes of the modulus chain from bottom to top.
    pub modulus_chain_bits: Vec<u32>,

    /// The number of values one ciphertext holds.
    pub slot_count: usize,

    /// The number of multiplications a fresh ciphertext supports.
    pub max_mul_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The presets available for one scheme.
pub struct SchemeStatus {
    /// The scheme family.
    pub scheme: Scheme,

    /// Its presets, sorted by name.
    pub presets: Vec<PresetStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A snapshot of an engine's availability and activity.
pub struct StatusReport {
    /// Whether the engine accepts requests.
    pub available: bool,

    /// The schemes and presets contexts can be generated with.
    pub schemes: Vec<SchemeStatus>,

    /// Contexts currently alive.
    pub live_contexts: usize,

    /// Payloads currently stored.
    pub live_payloads: usize,

    /// The most payloads the store holds at once.
    pub payload_capacity: usize,

    /// Lifetime counters.
    pub counters: Counters,
}
