use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shroud_lattice::Scheme;

use super::{ScopedContext, Stage};
use crate::{DEFAULT_PRESET, Engine, Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Ranks candidate vectors by their inner product with a query.
pub struct SimilarityRequest {
    /// The vector every candidate is compared to.
    pub query: Vec<f64>,

    /// The vectors to rank. Each must be as long as `query`.
    pub candidates: Vec<Vec<f64>>,

    /// Defaults to `"light"`.
    #[serde(default)]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// One candidate's position in the ranking.
pub struct RankedCandidate {
    /// The candidate's index in the request.
    pub index: usize,

    /// The decrypted inner product with the query.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Candidates ordered by score.
pub struct SimilarityResult {
    /// Every candidate, highest score first. Equal decrypted scores keep request order.
    pub ranking: Vec<RankedCandidate>,
}

impl Engine {
    /// Computes the encrypted inner product of `query` with every candidate and ranks them.
    ///
    /// # Remarks
    /// Candidates are processed in parallel on the rayon thread pool.
    ///
    /// Ties are broken by request order on the decrypted scores. Each candidate is encrypted
    /// with fresh noise, so identical candidates score equal only up to that noise and may rank
    /// in either order.
    pub fn similarity_rank(&self, request: &SimilarityRequest) -> Result<SimilarityResult> {
        self.ensure_available()?;

        let len = request.query.len();

        if len == 0 || request.candidates.is_empty() {
            return Err(Error::invalid_input(
                "similarity needs a non-empty query and at least one candidate",
            ));
        }

        if let Some(i) = request.candidates.iter().position(|c| c.len() != len) {
            return Err(Error::invalid_input(format!(
                "candidate {i} has {} values, the query has {len}",
                request.candidates[i].len()
            )));
        }

        let preset = request.preset.as_deref().unwrap_or(DEFAULT_PRESET);
        let ctx = ScopedContext::new(self, "similarity", Scheme::ApproxReal, preset, true, true)?;
        let key = ctx.key_id();

        let query = self.encrypt(key, &request.query)?;
        ctx.advance(Stage::InputsEncrypted);

        let scores = request
            .candidates
            .par_iter()
            .map(|candidate| {
                let candidate = self.encrypt(key, candidate)?;
                let dot = self.dot_product(key, query, candidate)?;

                Ok(self.decrypt(key, dot)?[0])
            })
            .collect::<Result<Vec<f64>>>()?;

        ctx.advance(Stage::Computed);
        ctx.advance(Stage::Decrypted);

        Ok(SimilarityResult {
            ranking: rank(scores),
        })
    }
}

/// Orders scores descending. The sort is stable, so equal scores keep their input order.
fn rank(scores: Vec<f64>) -> Vec<RankedCandidate> {
    let mut ranking = scores
        .into_iter()
        .enumerate()
        .map(|(index, score)| RankedCandidate { index, score })
        .collect::<Vec<_>>();

    ranking.sort_by(|a, b| b.score.total_cmp(&a.score));

    ranking
}
