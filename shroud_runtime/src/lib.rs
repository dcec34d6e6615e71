#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! This crate provides the Shroud engine: an in-memory service that computes on encrypted
//! vectors without ever seeing them in the clear.
//!
//! An [`Engine`] owns
//! * crypto contexts, each a parameter set plus generated keys, addressed by [`KeyId`],
//! * encrypted payloads, addressed by [`PayloadId`] and bound to the context that encrypted
//!   them,
//! * the operation dispatcher that validates operands and depth budgets before handing work to
//!   [`shroud_lattice`],
//! * composed protocols (weighted scoring, similarity ranking, aggregation, verified arithmetic
//!   and vote tallying) that run end to end on an ephemeral context.
//!
//! The [`api`] module exposes all of this as serde request and response types.
//!
//! # Example
//!
//! ```rust
//! use shroud_runtime::{AggregationMode, AggregationRequest, Engine, EngineConfig};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//!
//! let result = engine
//!     .aggregate(&AggregationRequest {
//!         participants: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
//!         mode: AggregationMode::Average,
//!         scheme: None,
//!         preset: None,
//!     })
//!     .unwrap();
//!
//! assert!((result.values[0] - 2.0).abs() < 1e-3);
//! assert!((result.values[1] - 3.0).abs() < 1e-3);
//! ```
use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod api;
mod config;
mod context;
mod dispatch;
mod engine;
mod error;
mod ids;
mod metrics;
mod payload;
mod protocols;

#[doc(hidden)]
pub mod test_utils;

pub use config::*;
pub use context::{KeyInfo, KeyMetadata, SECURITY_BITS};
pub use dispatch::Operation;
pub use engine::Engine;
pub use error::*;
pub use ids::{KeyId, PayloadId};
pub use metrics::{Counters, PresetStatus, SchemeStatus, StatusReport};
pub use payload::PayloadInfo;
pub use protocols::*;

/// Locks `mutex`, recovering the data if another thread panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
