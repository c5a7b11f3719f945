use chrono::Utc;
use tracing::info;

use crate::constants::{MIN_EXTERNAL_ENTROPY_LEN, RAFFLE_ALGORITHM};
use crate::error::{ResolveError, ResolveResult};
use crate::seed_vault::RevealedSeed;
use crate::shuffler::DeterministicShuffler;
use crate::state::proof::{raffle_participants_hash, DrawProof};
use crate::state::raffle::{RaffleDraw, RaffleStatus, Ticket};

/// Outcome of one raffle resolution.
#[derive(Debug, Clone)]
pub struct RaffleOutcome {
    /// Winning ticket indexes, first drawn first. Rank order for any
    /// prize tiering upstream.
    pub winner_ticket_indexes: Vec<u64>,
    pub proof: DrawProof,
}

/// Selects `winner_count` winning tickets for a closed raffle.
///
/// Pure with respect to the draw: validates, derives the keystream
/// from the revealed seed and the closed public context, draws, and
/// returns the proof. Status flips and persistence belong to the
/// ledger.
pub fn resolve_raffle(
    draw: &RaffleDraw,
    seed: &RevealedSeed,
    external_entropy: &str,
    winner_count: usize,
) -> ResolveResult<RaffleOutcome> {
    // Validate the whole request before any randomness is consumed.
    if draw.status != RaffleStatus::Closed {
        return Err(ResolveError::NotClosed);
    }
    let closed_at = draw.closed_at.ok_or(ResolveError::MissingCloseTime)?;
    if draw.proof.is_some() {
        return Err(ResolveError::AlreadyDrawn);
    }
    let entropy_len = external_entropy.chars().count();
    if entropy_len < MIN_EXTERNAL_ENTROPY_LEN {
        return Err(ResolveError::EntropyTooShort {
            min: MIN_EXTERNAL_ENTROPY_LEN,
            got: entropy_len,
        });
    }
    if winner_count == 0 {
        return Err(ResolveError::InvalidWinnerCount);
    }
    if winner_count > draw.tickets.len() {
        return Err(ResolveError::InsufficientTickets {
            requested: winner_count,
            available: draw.tickets.len(),
        });
    }

    let mut tickets = draw.tickets.clone();
    tickets.sort_by_key(|t| t.index);
    let participants_hash = raffle_participants_hash(&tickets);

    let winner_ticket_indexes = select_winner_indexes(
        &tickets,
        seed,
        external_entropy,
        closed_at.timestamp(),
        &participants_hash,
        winner_count,
    );

    let proof = DrawProof {
        algorithm: RAFFLE_ALGORITHM.to_owned(),
        draw_id: draw.id,
        seed_commit_hash: seed.commit_hash(),
        revealed_server_seed: seed.hex(),
        external_entropy: external_entropy.to_owned(),
        participants_hash: hex::encode(participants_hash),
        generated_at: Utc::now(),
        winner_ticket_indexes: Some(winner_ticket_indexes.clone()),
        target_number: None,
    };

    info!(
        draw_id = draw.id,
        tickets = tickets.len(),
        winners = winner_ticket_indexes.len(),
        "raffle resolved"
    );
    Ok(RaffleOutcome {
        winner_ticket_indexes,
        proof,
    })
}

/// The frozen `raffle-v1` selection: partial Fisher-Yates over ticket
/// positions, emitting the ticket index held at each drawn position.
/// With a dense index space positions and indexes coincide; refund
/// gaps keep the draw uniform over live tickets. Shared with the
/// verifier, which replays it against re-supplied populations.
pub(crate) fn select_winner_indexes(
    tickets_by_index: &[Ticket],
    seed: &RevealedSeed,
    external_entropy: &str,
    context_ts: i64,
    participants_hash: &[u8; 32],
    winner_count: usize,
) -> Vec<u64> {
    let mut shuffler =
        DeterministicShuffler::new(seed, external_entropy, context_ts, participants_hash);
    shuffler
        .pick_distinct(tickets_by_index.len() as u64, winner_count)
        .into_iter()
        .map(|position| tickets_by_index[position as usize].index)
        .collect()
}
