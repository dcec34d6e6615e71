use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shroud_lattice::Scheme;

use super::{ScopedContext, Stage};
use crate::{DEFAULT_PRESET, Engine, Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// How participant vectors are combined.
pub enum AggregationMode {
    /// The element-wise sum.
    #[default]
    Sum,

    /// The element-wise mean.
    Average,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Combines vectors from several participants without decrypting any one of them.
pub struct AggregationRequest {
    /// One vector per participant. Shorter vectors are padded with zeros.
    pub participants: Vec<Vec<f64>>,

    /// Defaults to [`AggregationMode::Sum`].
    #[serde(default)]
    pub mode: AggregationMode,

    /// Defaults to [`Scheme::ApproxReal`].
    #[serde(default)]
    pub scheme: Option<Scheme>,

    /// Defaults to `"light"`.
    #[serde(default)]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The decrypted aggregate.
pub struct AggregationResult {
    /// The element-wise aggregate, as long as the longest participant vector.
    pub values: Vec<f64>,

    /// The number of participants.
    pub participant_count: usize,

    /// How the vectors were combined.
    pub mode: AggregationMode,
}

impl Engine {
    /// Sums or averages participant vectors under encryption. Only the aggregate is decrypted.
    ///
    /// # Remarks
    /// Under [`Scheme::ExactInteger`] there is no plaintext reciprocal, so averages divide the
    /// decrypted sum by the participant count.
    pub fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResult> {
        self.ensure_available()?;

        let count = request.participants.len();
        let len = request.participants.iter().map(Vec::len).max().unwrap_or(0);

        if count == 0 || len == 0 {
            return Err(Error::invalid_input(
                "aggregation needs at least one non-empty participant vector",
            ));
        }

        let scheme = request.scheme.unwrap_or(Scheme::ApproxReal);
        let preset = request.preset.as_deref().unwrap_or(DEFAULT_PRESET);

        let ctx = ScopedContext::new(self, "aggregation", scheme, preset, false, false)?;
        let key = ctx.key_id();

        let encrypted = request
            .participants
            .par_iter()
            .map(|values| {
                let mut padded = values.clone();
                padded.resize(len, 0.0);

                self.encrypt(key, &padded)
            })
            .collect::<Result<Vec<_>>>()?;

        ctx.advance(Stage::InputsEncrypted);

        let mut total = encrypted[0];

        for id in &encrypted[1..] {
            total = self.add(key, total, *id)?;
        }

        let divide_after = match (request.mode, scheme) {
            (AggregationMode::Average, Scheme::ApproxReal) => {
                total = self.multiply_plain(key, total, &[1.0 / count as f64])?;
                false
            }
            (AggregationMode::Average, Scheme::ExactInteger) => true,
            (AggregationMode::Sum, _) => false,
        };

        ctx.advance(Stage::Computed);

        let mut values = self.decrypt(key, total)?;
        ctx.advance(Stage::Decrypted);

        if divide_after {
            values.iter_mut().for_each(|v| *v /= count as f64);
        }

        Ok(AggregationResult {
            values,
            participant_count: count,
            mode: request.mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::engine;

    fn participants() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.5, 1.5, 2.5, 3.5],
            vec![2.0, 3.0, 1.0, 0.5],
        ]
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());

        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-3, "{a} != {e}");
        }
    }

    #[test]
    fn can_sum_and_average() {
        let engine = engine();

        let sum = engine
            .aggregate(&AggregationRequest {
                participants: participants(),
                mode: AggregationMode::Sum,
                scheme: None,
                preset: None,
            })
            .unwrap();

        assert_close(&sum.values, &[3.5, 6.5, 6.5, 8.0]);
        assert_eq!(sum.participant_count, 3);

        let avg = engine
            .aggregate(&AggregationRequest {
                participants: participants(),
                mode: AggregationMode::Average,
                scheme: None,
                preset: None,
            })
            .unwrap();

        assert_close(&avg.values, &[3.5 / 3.0, 6.5 / 3.0, 6.5 / 3.0, 8.0 / 3.0]);

        let status = engine.status();
        assert_eq!(status.live_contexts, 0);
        assert_eq!(status.counters.decryptions, 2);
    }

    #[test]
    fn pads_short_participants() {
        let engine = engine();

        let result = engine
            .aggregate(&AggregationRequest {
                participants: vec![vec![1.0], vec![1.0, 2.0, 3.0]],
                mode: AggregationMode::Sum,
                scheme: Some(Scheme::ExactInteger),
                preset: None,
            })
            .unwrap();

        assert_eq!(result.values, vec![2.0, 2.0, 3.0]);
    }

    #[test]
    fn exact_average_divides_the_sum() {
        let engine = engine();

        let result = engine
            .aggregate(&AggregationRequest {
                participants: vec![vec![10.0, 1.0], vec![20.0, 2.0]],
                mode: AggregationMode::Average,
                scheme: Some(Scheme::ExactInteger),
                preset: None,
            })
            .unwrap();

        assert_eq!(result.values, vec![15.0, 1.5]);
    }

    #[test]
    fn rejects_empty_input() {
        let engine = engine();

        for participants in [vec![], vec![vec![]]] {
            assert!(matches!(
                engine.aggregate(&AggregationRequest {
                    participants,
                    mode: AggregationMode::Sum,
                    scheme: None,
                    preset: None,
                }),
                Err(Error::InvalidInput(_))
            ));
        }
    }
}
