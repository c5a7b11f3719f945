use borsh::BorshSerialize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{RAFFLE_ALGORITHM, SLIDE_ALGORITHM};
use crate::error::{ProofError, ProofResult};
use crate::state::raffle::Ticket;
use crate::state::slide::SlideEntry;

/// Published record of one resolved draw.
///
/// Serialized field names are part of the public verification API and
/// never change within an algorithm version. Exactly one of the two
/// payload fields is present, matching `algorithm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawProof {
    /// Selection algorithm identifier, e.g. `"raffle-v1"`.
    pub algorithm: String,
    /// Draw this proof settles.
    pub draw_id: u64,
    /// Hex SHA-256 of the server seed, published before entries closed.
    pub seed_commit_hash: String,
    /// Hex of the 32-byte server seed, revealed at resolution.
    pub revealed_server_seed: String,
    /// Admin-supplied entropy mixed into the keystream.
    pub external_entropy: String,
    /// Hex SHA-256 over the canonical encoding of the closed population.
    pub participants_hash: String,
    /// When the proof was produced. Metadata, not a selection input.
    pub generated_at: DateTime<Utc>,
    /// Raffle payload: winning ticket indexes in draw order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_ticket_indexes: Option<Vec<u64>>,
    /// Slide payload: the drawn target number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_number: Option<u32>,
}

impl DrawProof {
    /// Raffle payload accessor. Errors when the proof does not carry a
    /// raffle result, or carries one alongside a slide result.
    pub fn raffle_winner_indexes(&self) -> ProofResult<&[u64]> {
        if self.algorithm != RAFFLE_ALGORITHM || self.target_number.is_some() {
            return Err(ProofError::PayloadMismatch {
                algorithm: self.algorithm.clone(),
            });
        }
        match self.winner_ticket_indexes.as_deref() {
            Some(indexes) if !indexes.is_empty() => Ok(indexes),
            _ => Err(ProofError::PayloadMismatch {
                algorithm: self.algorithm.clone(),
            }),
        }
    }

    /// Slide payload accessor. Errors when the proof does not carry a
    /// slide result.
    pub fn slide_target(&self) -> ProofResult<u32> {
        if self.algorithm != SLIDE_ALGORITHM || self.winner_ticket_indexes.is_some() {
            return Err(ProofError::PayloadMismatch {
                algorithm: self.algorithm.clone(),
            });
        }
        self.target_number.ok_or(ProofError::PayloadMismatch {
            algorithm: self.algorithm.clone(),
        })
    }

    /// Content address of the proof: hex SHA-256 over its canonical
    /// encoding. Two proofs with the same fingerprint are the same
    /// resolution.
    pub fn fingerprint(&self) -> String {
        let binding = ProofBinding {
            algorithm: self.algorithm.clone(),
            draw_id: self.draw_id,
            seed_commit_hash: self.seed_commit_hash.clone(),
            revealed_server_seed: self.revealed_server_seed.clone(),
            external_entropy: self.external_entropy.clone(),
            participants_hash: self.participants_hash.clone(),
            generated_at_unix: self.generated_at.timestamp(),
            winner_ticket_indexes: self.winner_ticket_indexes.clone(),
            target_number: self.target_number,
        };
        hex::encode(canonical_digest(&binding))
    }

    /// Serializes the proof for publication.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a published proof.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(BorshSerialize)]
struct ProofBinding {
    algorithm: String,
    draw_id: u64,
    seed_commit_hash: String,
    revealed_server_seed: String,
    external_entropy: String,
    participants_hash: String,
    generated_at_unix: i64,
    winner_ticket_indexes: Option<Vec<u64>>,
    target_number: Option<u32>,
}

/// Canonical binding of one raffle ticket. Frozen for `raffle-v1`.
#[derive(BorshSerialize)]
struct TicketBinding {
    index: u64,
    user_id: String,
}

/// Canonical binding of one slide entry. The creation instant is the
/// ranking tie-break, so it is commitment-bound. Frozen for `slide-v1`.
#[derive(BorshSerialize)]
struct EntryBinding {
    entry_number: u32,
    user_id: String,
    created_at_unix: i64,
}

/// SHA-256 over the canonical population encoding of a raffle: tickets
/// sorted by index, each bound as `(index, user_id)`.
pub fn raffle_participants_hash(tickets: &[Ticket]) -> [u8; 32] {
    let mut ordered: Vec<&Ticket> = tickets.iter().collect();
    ordered.sort_by_key(|t| t.index);
    let bindings: Vec<TicketBinding> = ordered
        .iter()
        .map(|t| TicketBinding {
            index: t.index,
            user_id: t.user_id.clone(),
        })
        .collect();
    canonical_digest(&bindings)
}

/// SHA-256 over the canonical population encoding of a slide draw:
/// entries sorted by entry number, each bound as
/// `(entry_number, user_id, created_at_unix)`.
pub fn slide_participants_hash(entries: &[SlideEntry]) -> [u8; 32] {
    let mut ordered: Vec<&SlideEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.entry_number);
    let bindings: Vec<EntryBinding> = ordered
        .iter()
        .map(|e| EntryBinding {
            entry_number: e.entry_number,
            user_id: e.user_id.clone(),
            created_at_unix: e.created_at.timestamp(),
        })
        .collect();
    canonical_digest(&bindings)
}

fn canonical_digest<T: BorshSerialize>(value: &T) -> [u8; 32] {
    // Serialization into memory cannot fail.
    let bytes = borsh::to_vec(value).expect("borsh encoding");
    Sha256::digest(&bytes).into()
}
