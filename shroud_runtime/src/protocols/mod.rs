//! Composed secure-computation protocols.
//!
//! Every protocol generates its own context, encrypts its inputs, computes, decrypts only the
//! final result and destroys the context, whether or not an error occurred along the way.

use log::{debug, trace};
use shroud_lattice::Scheme;

use crate::{Engine, KeyId, Result};

mod aggregation;
mod arithmetic;
mod scoring;
mod similarity;
mod voting;

pub use aggregation::*;
pub use arithmetic::*;
pub use scoring::*;
pub use similarity::*;
pub use voting::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    ContextBuilt,
    InputsEncrypted,
    Computed,
    Decrypted,
    ContextDestroyed,
}

/// An ephemeral context that is destroyed when dropped.
pub(crate) struct ScopedContext<'a> {
    engine: &'a Engine,
    protocol: &'static str,
    key_id: KeyId,
}

impl<'a> ScopedContext<'a> {
    pub fn new(
        engine: &'a Engine,
        protocol: &'static str,
        scheme: Scheme,
        preset: &str,
        rotation_keys: bool,
        relin_keys: bool,
    ) -> Result<Self> {
        trace!("{protocol}: init");

        let (key_id, _) = engine.generate_context(scheme, preset, rotation_keys, relin_keys)?;

        let ctx = Self {
            engine,
            protocol,
            key_id,
        };

        ctx.advance(Stage::ContextBuilt);

        Ok(ctx)
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn advance(&self, stage: Stage) {
        trace!("{}: key {} {stage:?}", self.protocol, self.key_id);
    }
}

impl Drop for ScopedContext<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.cleanup_context(self.key_id) {
            debug!("{}: cleanup of key {} failed: {e}", self.protocol, self.key_id);
        }

        self.advance(Stage::ContextDestroyed);
    }
}

/// The index of the largest value. Ties go to the lowest index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, max), (i, v)| {
            if *v > max { (i, *v) } else { (best, max) }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::engine;

    #[test]
    fn argmax_prefers_lowest_index() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax(&[5.0]), 0);
        assert_eq!(argmax(&[-2.0, -1.0]), 1);
    }

    #[test]
    fn scoped_context_is_destroyed_on_drop() {
        let engine = engine();

        let key_id = {
            let ctx = ScopedContext::new(&engine, "test", Scheme::ExactInteger, "light", false, false)
                .unwrap();
            engine.encrypt(ctx.key_id(), &[1.0]).unwrap();

            assert_eq!(engine.status().live_payloads, 1);

            ctx.key_id()
        };

        assert!(engine.get_key_info(key_id).is_err());
        assert_eq!(engine.status().live_contexts, 0);
        assert_eq!(engine.status().live_payloads, 0);
    }
}
