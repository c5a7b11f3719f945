//! Commit-reveal fairness engine for raffle and numbered-entry
//! ("slide") draws.
//!
//! The house commits to a fresh server seed before a draw closes and
//! reveals it only at resolution. Winner selection runs on an
//! HMAC-SHA256 keystream over the revealed seed, admin-supplied
//! entropy, the draw's context timestamp and a digest of the closed
//! population, so the published [`DrawProof`] lets anyone re-run the
//! draw and confirm nobody steered it.
//!
//! ```
//! use fairdraw::{DrawLedger, VaultKey, VerifyPopulation, verify_proof};
//! use chrono::Utc;
//!
//! # fn main() -> Result<(), fairdraw::ResolveError> {
//! let ledger = DrawLedger::new();
//! let key = VaultKey::from_bytes([7; 32]);
//!
//! let commitment = ledger.register_raffle(1, &key)?;
//! ledger.open_raffle(1)?;
//!
//! let closed_at = Utc::now();
//! let tickets = (0..10u64)
//!     .map(|index| fairdraw::Ticket {
//!         index,
//!         user_id: format!("user-{index}"),
//!         purchased_at: closed_at,
//!     })
//!     .collect();
//! ledger.close_raffle(1, tickets, closed_at)?;
//!
//! let proof = ledger.resolve_raffle(1, "entropy-1234567890ab", 3, &key)?;
//! assert_eq!(proof.seed_commit_hash, commitment);
//!
//! let population = VerifyPopulation::Raffle(ledger.raffle_snapshot(1)?.tickets);
//! assert!(verify_proof(&proof, &population, closed_at).unwrap());
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod ledger;
pub mod resolve_raffle;
pub mod resolve_slide;
pub mod seed_vault;
pub mod shuffler;
pub mod state;
pub mod verify_proof;

pub use error::{
    ProofError, ProofResult, ResolveError, ResolveResult, VaultError, VaultResult,
};
pub use ledger::DrawLedger;
pub use resolve_raffle::{resolve_raffle, RaffleOutcome};
pub use resolve_slide::{resolve_slide, SlideOutcome};
pub use seed_vault::{create_seed, reveal_seed, RevealedSeed, SealedSeed, VaultKey};
pub use shuffler::DeterministicShuffler;
pub use state::pity::{multiplier_for, PityBook, PityState};
pub use state::proof::{raffle_participants_hash, slide_participants_hash, DrawProof};
pub use state::raffle::{RaffleDraw, RaffleStatus, Ticket};
pub use state::slide::{
    validate_prize_table, PrizeBand, SlideDraw, SlideEntry, SlideStatus, SlideWinner,
};
pub use verify_proof::{verification_report, verify_proof, VerificationReport, VerifyPopulation};
