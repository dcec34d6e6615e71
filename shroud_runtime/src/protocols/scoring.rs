use std::time::Instant;

use serde::{Deserialize, Serialize};
use shroud_lattice::Scheme;

use super::{ScopedContext, Stage, argmax};
use crate::{DEFAULT_PRESET, Engine, Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Scores entities as `weight_a * metric_a + weight_b * metric_b`.
pub struct ScoringRequest {
    /// The first metric for every entity.
    pub metric_a: Vec<f64>,

    /// The second metric for every entity.
    pub metric_b: Vec<f64>,

    /// The weight of `metric_a`, either per entity or a single value for all.
    pub weight_a: Vec<f64>,

    /// The weight of `metric_b`, either per entity or a single value for all.
    pub weight_b: Vec<f64>,

    /// Defaults to [`Scheme::ApproxReal`].
    #[serde(default)]
    pub scheme: Option<Scheme>,

    /// Defaults to `"light"`.
    #[serde(default)]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The decrypted composite scores.
pub struct ScoringResult {
    /// The score of every entity.
    pub scores: Vec<f64>,

    /// The entity with the highest score. Ties go to the lowest index.
    pub best_index: usize,

    /// The scheme the scores were computed under.
    pub scheme: Scheme,

    /// Wall time for the whole protocol, in milliseconds.
    pub elapsed_ms: u64,
}

impl Engine {
    /// Computes weighted composite scores under encryption and reveals only the scores.
    ///
    /// # Remarks
    /// Under [`Scheme::ApproxReal`] fails with [`Error::Incompatible`] when a weighted metric
    /// could exceed the values the modulus represents.
    pub fn weighted_score(&self, request: &ScoringRequest) -> Result<ScoringResult> {
        self.ensure_available()?;

        let now = Instant::now();
        let n = request.metric_a.len();

        if n == 0 || request.metric_b.len() != n {
            return Err(Error::invalid_input(format!(
                "metrics must be non-empty and of equal length, got {} and {}",
                n,
                request.metric_b.len()
            )));
        }

        for (name, weights) in [("weight_a", &request.weight_a), ("weight_b", &request.weight_b)] {
            if weights.len() != 1 && weights.len() != n {
                return Err(Error::invalid_input(format!(
                    "{name} has {} values, expected 1 or {n}",
                    weights.len()
                )));
            }
        }

        let scheme = request.scheme.unwrap_or(Scheme::ApproxReal);
        let preset = request.preset.as_deref().unwrap_or(DEFAULT_PRESET);

        let ctx = ScopedContext::new(self, "scoring", scheme, preset, false, false)?;
        let key = ctx.key_id();

        let a = self.encrypt(key, &request.metric_a)?;
        let b = self.encrypt(key, &request.metric_b)?;
        ctx.advance(Stage::InputsEncrypted);

        let weighted_a = self.multiply_plain(key, a, &request.weight_a)?;
        let weighted_b = self.multiply_plain(key, b, &request.weight_b)?;
        let total = self.add(key, weighted_a, weighted_b)?;
        ctx.advance(Stage::Computed);

        let scores = self.decrypt(key, total)?;
        ctx.advance(Stage::Decrypted);

        Ok(ScoringResult {
            best_index: argmax(&scores),
            scores,
            scheme,
            elapsed_ms: now.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::engine;

    fn request(weight_a: Vec<f64>, weight_b: Vec<f64>) -> ScoringRequest {
        ScoringRequest {
            metric_a: vec![0.8, 0.3, 0.9, 0.5],
            metric_b: vec![0.2, 0.9, 0.4, 0.5],
            weight_a,
            weight_b,
            scheme: None,
            preset: None,
        }
    }

    #[test]
    fn scores_match_plaintext() {
        let engine = engine();
        let result = engine
            .weighted_score(&request(vec![0.6], vec![0.4]))
            .unwrap();

        let expected = [0.56, 0.54, 0.70, 0.50];

        for (s, e) in result.scores.iter().zip(expected) {
            assert!((s - e).abs() < 1e-3);
        }

        assert_eq!(result.best_index, 2);
        assert_eq!(result.scheme, Scheme::ApproxReal);
        assert_eq!(engine.status().live_contexts, 0);
        assert_eq!(engine.status().counters.homomorphic_ops, 3);
    }

    #[test]
    fn per_entity_weights() {
        let engine = engine();
        let result = engine
            .weighted_score(&request(vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 1.0, 0.0, 0.0]))
            .unwrap();

        assert!((result.scores[1] - 0.9).abs() < 1e-3);
        assert!(result.scores[2].abs() < 1e-3);
        assert_eq!(result.best_index, 1);
    }

    #[test]
    fn exact_scheme_scores_integers() {
        let engine = engine();
        let result = engine
            .weighted_score(&ScoringRequest {
                metric_a: vec![10.0, 20.0, 30.0],
                metric_b: vec![3.0, 2.0, 1.0],
                weight_a: vec![2.0],
                weight_b: vec![5.0],
                scheme: Some(Scheme::ExactInteger),
                preset: None,
            })
            .unwrap();

        assert_eq!(result.scores, vec![35.0, 50.0, 65.0]);
        assert_eq!(result.best_index, 2);
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let engine = engine();
        let mut bad = request(vec![0.5, 0.5], vec![0.4]);

        assert!(matches!(engine.weighted_score(&bad), Err(Error::InvalidInput(_))));

        bad.weight_a = vec![0.5];
        bad.metric_b.pop();
        assert!(matches!(engine.weighted_score(&bad), Err(Error::InvalidInput(_))));
        assert_eq!(engine.status().live_contexts, 0);
    }

    #[test]
    fn refuses_scores_beyond_the_modulus() {
        let engine = engine();
        let result = engine.weighted_score(&ScoringRequest {
            metric_a: vec![200000.0, 1.0],
            metric_b: vec![0.0, 0.0],
            weight_a: vec![200000.0],
            weight_b: vec![1.0],
            scheme: None,
            preset: None,
        });

        assert!(matches!(result, Err(Error::Incompatible(_))));
        assert_eq!(engine.status().live_contexts, 0);
    }

    #[test]
    fn context_is_destroyed_on_failure() {
        let engine = engine();
        let mut bad = request(vec![0.6], vec![0.4]);
        bad.metric_a[0] = f64::NAN;

        assert!(engine.weighted_score(&bad).is_err());
        assert_eq!(engine.status().live_contexts, 0);
        assert_eq!(engine.status().counters.contexts_destroyed, 1);
    }
}
