use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shroud_lattice::Scheme;

use super::{ScopedContext, Stage, argmax};
use crate::{DEFAULT_PRESET, Engine, Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Tallies ballots without decrypting any single ballot.
pub struct VoteRequest {
    /// The candidate index of every ballot.
    pub votes: Vec<i64>,

    /// The number of candidates.
    pub num_candidates: usize,

    /// Defaults to `"light"`.
    #[serde(default)]
    pub preset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The decrypted tally.
pub struct VoteResult {
    /// The number of ballots for each candidate.
    pub tallies: Vec<u64>,

    /// The candidate with the most ballots. Ties go to the lowest index.
    pub winner: usize,

    /// `candidate_<winner>`.
    pub winner_label: String,

    /// The number of ballots cast.
    pub total_votes: usize,

    /// Ballots naming no valid candidate. They are encrypted as all-zero ballots.
    pub ignored_votes: usize,
}

impl Engine {
    /// Encrypts every ballot as a one-hot vector under [`Scheme::ExactInteger`], adds them and
    /// decrypts only the tally.
    pub fn tally_votes(&self, request: &VoteRequest) -> Result<VoteResult> {
        self.ensure_available()?;

        let candidates = request.num_candidates;

        if request.votes.is_empty() {
            return Err(Error::invalid_input("no votes to tally"));
        }

        let preset = request.preset.as_deref().unwrap_or(DEFAULT_PRESET);
        let params = self.config().preset(Scheme::ExactInteger, preset)?;
        let slots = params.slot_count();

        if candidates == 0 || candidates > slots {
            return Err(Error::invalid_input(format!(
                "number of candidates {candidates} is outside 1..={slots}"
            )));
        }

        if request.votes.len() as f64 > params.max_plain_magnitude() {
            return Err(Error::invalid_input(format!(
                "{} votes would overflow the plaintext modulus",
                request.votes.len()
            )));
        }

        let ctx = ScopedContext::new(self, "voting", Scheme::ExactInteger, preset, false, false)?;
        let key = ctx.key_id();

        let ballots = request
            .votes
            .par_iter()
            .map(|vote| {
                let mut ballot = vec![0.0; candidates];

                if let Some(slot) = usize::try_from(*vote).ok().filter(|v| *v < candidates) {
                    ballot[slot] = 1.0;
                }

                self.encrypt(key, &ballot)
            })
            .collect::<Result<Vec<_>>>()?;

        ctx.advance(Stage::InputsEncrypted);

        let mut total = ballots[0];

        for id in &ballots[1..] {
            total = self.add(key, total, *id)?;
        }

        ctx.advance(Stage::Computed);

        let counts = self.decrypt(key, total)?;
        ctx.advance(Stage::Decrypted);

        let ignored_votes = request
            .votes
            .iter()
            .filter(|v| usize::try_from(**v).ok().is_none_or(|v| v >= candidates))
            .count();

        if ignored_votes > 0 {
            debug!("voting: {ignored_votes} ballots named no valid candidate");
        }

        let winner = argmax(&counts);

        Ok(VoteResult {
            tallies: counts.iter().map(|c| *c as u64).collect(),
            winner,
            winner_label: format!("candidate_{winner}"),
            total_votes: request.votes.len(),
            ignored_votes,
        })
    }
}
