//! Third-party verification of published proofs. Anyone holding the
//! proof, the closed population, and the draw's context timestamp can
//! re-run the selection and confirm the house could not have steered
//! it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::constants::{RAFFLE_ALGORITHM, SERVER_SEED_LEN, SLIDE_ALGORITHM};
use crate::error::{ProofError, ProofResult};
use crate::resolve_raffle::select_winner_indexes;
use crate::resolve_slide::draw_target;
use crate::seed_vault::RevealedSeed;
use crate::state::proof::{raffle_participants_hash, slide_participants_hash, DrawProof};
use crate::state::raffle::Ticket;
use crate::state::slide::SlideEntry;

/// Closed-state inputs re-supplied by the verifying party. The slide
/// number range is part of the closed state, so it rides along.
#[derive(Debug, Clone)]
pub enum VerifyPopulation {
    Raffle(Vec<Ticket>),
    Slide {
        entries: Vec<SlideEntry>,
        number_start: u32,
        number_end: u32,
    },
}

/// Per-check outcome, for surfaces that explain a failed
/// verification instead of a bare `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    /// SHA-256 of the revealed seed equals the published commitment.
    pub seed_matches_commit: bool,
    /// Recomputed population digest equals the one in the proof.
    pub participants_match: bool,
    /// Replaying the algorithm reproduces the stored result.
    pub result_matches: bool,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.seed_matches_commit && self.participants_match && self.result_matches
    }
}

/// Re-checks a published proof. `Ok(false)` means the proof is well
/// formed but does not check out; errors are reserved for proofs (or
/// populations) that cannot be checked at all.
pub fn verify_proof(
    proof: &DrawProof,
    population: &VerifyPopulation,
    context_ts: DateTime<Utc>,
) -> ProofResult<bool> {
    Ok(verification_report(proof, population, context_ts)?.passed())
}

/// The check-by-check form of [`verify_proof`].
pub fn verification_report(
    proof: &DrawProof,
    population: &VerifyPopulation,
    context_ts: DateTime<Utc>,
) -> ProofResult<VerificationReport> {
    if !is_hex_digest(&proof.seed_commit_hash) {
        return Err(ProofError::MalformedHash {
            field: "seedCommitHash",
        });
    }
    if !is_hex_digest(&proof.participants_hash) {
        return Err(ProofError::MalformedHash {
            field: "participantsHash",
        });
    }
    let seed = RevealedSeed::from_hex(&proof.revealed_server_seed).ok_or(
        ProofError::MalformedSeed {
            expected: SERVER_SEED_LEN,
        },
    )?;
    let seed_matches_commit = seed.commit_hash() == proof.seed_commit_hash;

    let (participants_match, result_matches) = match proof.algorithm.as_str() {
        RAFFLE_ALGORITHM => {
            let expected = proof.raffle_winner_indexes()?;
            let tickets = match population {
                VerifyPopulation::Raffle(tickets) => tickets,
                VerifyPopulation::Slide { .. } => {
                    return Err(ProofError::PopulationMismatch {
                        algorithm: proof.algorithm.clone(),
                    })
                }
            };
            let mut ordered = tickets.clone();
            ordered.sort_by_key(|t| t.index);
            let digest = raffle_participants_hash(&ordered);
            let participants_match = hex::encode(digest) == proof.participants_hash;

            let replayable = expected.len() <= ordered.len();
            let result_matches = replayable
                && select_winner_indexes(
                    &ordered,
                    &seed,
                    &proof.external_entropy,
                    context_ts.timestamp(),
                    &digest,
                    expected.len(),
                ) == expected;
            (participants_match, result_matches)
        }
        SLIDE_ALGORITHM => {
            let expected = proof.slide_target()?;
            let (entries, number_start, number_end) = match population {
                VerifyPopulation::Slide {
                    entries,
                    number_start,
                    number_end,
                } => (entries, *number_start, *number_end),
                VerifyPopulation::Raffle(_) => {
                    return Err(ProofError::PopulationMismatch {
                        algorithm: proof.algorithm.clone(),
                    })
                }
            };
            if number_start > number_end {
                return Err(ProofError::InvalidPopulation(
                    "entry number range is inverted",
                ));
            }
            let mut ordered = entries.clone();
            ordered.sort_by_key(|e| e.entry_number);
            let digest = slide_participants_hash(&ordered);
            let participants_match = hex::encode(digest) == proof.participants_hash;

            let range_size = number_end as u64 - number_start as u64 + 1;
            let recomputed = draw_target(
                &seed,
                &proof.external_entropy,
                context_ts.timestamp(),
                &digest,
                number_start,
                range_size,
            );
            (participants_match, recomputed == expected)
        }
        _ => return Err(ProofError::UnknownAlgorithm(proof.algorithm.clone())),
    };

    let report = VerificationReport {
        seed_matches_commit,
        participants_match,
        result_matches,
    };
    debug!(
        draw_id = proof.draw_id,
        algorithm = %proof.algorithm,
        passed = report.passed(),
        "proof verification completed"
    );
    Ok(report)
}

fn is_hex_digest(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
