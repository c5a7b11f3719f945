//! The engine's stateful front door. Holds seed custody and draw
//! lifecycle per id, hands populations to the pure resolvers, and
//! guarantees that exactly one resolution can succeed per draw while
//! distinct draws settle in parallel.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::info;

use crate::error::{ResolveError, ResolveResult};
use crate::resolve_raffle::resolve_raffle;
use crate::resolve_slide::resolve_slide;
use crate::seed_vault::{create_seed, reveal_seed, SealedSeed, VaultKey};
use crate::state::pity::{PityBook, PityState};
use crate::state::proof::DrawProof;
use crate::state::raffle::{RaffleDraw, RaffleStatus, Ticket};
use crate::state::slide::{validate_prize_table, PrizeBand, SlideDraw, SlideEntry, SlideStatus};

struct RaffleRecord {
    draw: RaffleDraw,
    sealed: SealedSeed,
}

struct SlideRecord {
    draw: SlideDraw,
    sealed: SealedSeed,
}

/// In-memory coordinator for every draw the engine has custody of.
///
/// A short registry lock maps ids to per-draw locks; the whole
/// check-resolve-commit sequence runs under the draw's own lock.
#[derive(Default)]
pub struct DrawLedger {
    raffles: Mutex<HashMap<u64, Arc<Mutex<RaffleRecord>>>>,
    slides: Mutex<HashMap<u64, Arc<Mutex<SlideRecord>>>>,
    pity: Mutex<PityBook>,
}

// Records are only mutated after an outcome is fully computed, so a
// guard recovered from a poisoned lock is still consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DrawLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Raffle lifecycle =====

    /// Registers a raffle and seals a fresh server seed for it.
    /// Returns the commitment to publish.
    pub fn register_raffle(&self, raffle_id: u64, key: &VaultKey) -> ResolveResult<String> {
        let sealed = create_seed(key, raffle_id)?;
        let mut raffles = lock(&self.raffles);
        match raffles.entry(raffle_id) {
            Entry::Occupied(_) => Err(ResolveError::DuplicateDraw(raffle_id)),
            Entry::Vacant(slot) => {
                let commit = sealed.commit_hash.clone();
                slot.insert(Arc::new(Mutex::new(RaffleRecord {
                    draw: RaffleDraw::new(raffle_id),
                    sealed,
                })));
                info!(raffle_id, commit = %commit, "raffle registered");
                Ok(commit)
            }
        }
    }

    /// Opens ticket sales for a draft raffle.
    pub fn open_raffle(&self, raffle_id: u64) -> ResolveResult<()> {
        let record = self.raffle_record(raffle_id)?;
        let mut guard = lock(&record);
        if guard.draw.status != RaffleStatus::Draft {
            return Err(ResolveError::NotDraft);
        }
        guard.draw.status = RaffleStatus::Open;
        Ok(())
    }

    /// Freezes the raffle with its final population, handed over by
    /// the persistence layer ordered by ticket index.
    pub fn close_raffle(
        &self,
        raffle_id: u64,
        tickets: Vec<Ticket>,
        closed_at: DateTime<Utc>,
    ) -> ResolveResult<()> {
        if !tickets.windows(2).all(|w| w[0].index < w[1].index) {
            return Err(ResolveError::InvalidTicketOrder);
        }
        let record = self.raffle_record(raffle_id)?;
        let mut guard = lock(&record);
        if guard.draw.status != RaffleStatus::Open {
            return Err(ResolveError::NotOpen);
        }
        info!(raffle_id, tickets = tickets.len(), "raffle closed");
        guard.draw.tickets = tickets;
        guard.draw.closed_at = Some(closed_at);
        guard.draw.status = RaffleStatus::Closed;
        Ok(())
    }

    /// Settles a closed raffle and applies pity bookkeeping. Safe to
    /// call repeatedly: the first resolution wins and later calls get
    /// its proof back unchanged.
    pub fn resolve_raffle(
        &self,
        raffle_id: u64,
        external_entropy: &str,
        winner_count: usize,
        key: &VaultKey,
    ) -> ResolveResult<DrawProof> {
        let record = self.raffle_record(raffle_id)?;
        let mut guard = lock(&record);
        if let Some(proof) = &guard.draw.proof {
            return Ok(proof.clone());
        }

        // The seed exists in the clear only within this scope.
        let seed = reveal_seed(&guard.sealed, key, raffle_id)?;
        let outcome = resolve_raffle(&guard.draw, &seed, external_entropy, winner_count)?;

        let winners: BTreeSet<String> = outcome
            .winner_ticket_indexes
            .iter()
            .filter_map(|index| guard.draw.holder_of(*index))
            .map(str::to_owned)
            .collect();
        let participants = guard.draw.participant_ids();

        guard.draw.status = RaffleStatus::Drawn;
        guard.draw.proof = Some(outcome.proof.clone());
        lock(&self.pity).apply_raffle_result(raffle_id, &participants, &winners);

        info!(
            raffle_id,
            winners = outcome.winner_ticket_indexes.len(),
            fingerprint = %outcome.proof.fingerprint(),
            "raffle settled"
        );
        Ok(outcome.proof)
    }

    /// Proof of a resolved raffle, if it has one yet.
    pub fn raffle_proof(&self, raffle_id: u64) -> ResolveResult<Option<DrawProof>> {
        let record = self.raffle_record(raffle_id)?;
        let guard = lock(&record);
        Ok(guard.draw.proof.clone())
    }

    pub fn raffle_status(&self, raffle_id: u64) -> ResolveResult<RaffleStatus> {
        let record = self.raffle_record(raffle_id)?;
        let guard = lock(&record);
        Ok(guard.draw.status)
    }

    /// Copy of the raffle as the engine sees it.
    pub fn raffle_snapshot(&self, raffle_id: u64) -> ResolveResult<RaffleDraw> {
        let record = self.raffle_record(raffle_id)?;
        let guard = lock(&record);
        Ok(guard.draw.clone())
    }

    fn raffle_record(&self, raffle_id: u64) -> ResolveResult<Arc<Mutex<RaffleRecord>>> {
        lock(&self.raffles)
            .get(&raffle_id)
            .cloned()
            .ok_or(ResolveError::UnknownDraw(raffle_id))
    }

    // ===== Slide lifecycle =====

    /// Registers a slide draw with its schedule, entry-number range
    /// and prize table, sealing a fresh seed. Returns the commitment.
    pub fn register_slide(
        &self,
        slide_id: u64,
        scheduled_at: DateTime<Utc>,
        number_start: u32,
        number_end: u32,
        prizes: Vec<PrizeBand>,
        key: &VaultKey,
    ) -> ResolveResult<String> {
        if number_start > number_end {
            return Err(ResolveError::InvalidNumberRange);
        }
        validate_prize_table(&prizes)?;
        let sealed = create_seed(key, slide_id)?;
        let mut slides = lock(&self.slides);
        match slides.entry(slide_id) {
            Entry::Occupied(_) => Err(ResolveError::DuplicateDraw(slide_id)),
            Entry::Vacant(slot) => {
                let commit = sealed.commit_hash.clone();
                slot.insert(Arc::new(Mutex::new(SlideRecord {
                    draw: SlideDraw::new(slide_id, scheduled_at, number_start, number_end, prizes),
                    sealed,
                })));
                info!(slide_id, commit = %commit, "slide draw registered");
                Ok(commit)
            }
        }
    }

    /// Assigns a fresh unique entry number to a user and records the
    /// entry at the current instant.
    pub fn join_slide<R: Rng>(
        &self,
        slide_id: u64,
        user_id: &str,
        rng: &mut R,
    ) -> ResolveResult<u32> {
        let record = self.slide_record(slide_id)?;
        let mut guard = lock(&record);
        match guard.draw.status {
            SlideStatus::Scheduled => {}
            SlideStatus::Cancelled => return Err(ResolveError::Cancelled),
            SlideStatus::Drawn => return Err(ResolveError::AlreadyDrawn),
        }
        let entry_number = guard.draw.assign_entry_number(rng)?;
        guard.draw.entries.push(SlideEntry {
            entry_number,
            user_id: user_id.to_owned(),
            created_at: Utc::now(),
        });
        Ok(entry_number)
    }

    /// Bulk handover of entries from the persistence layer. Numbers
    /// must be in range and unused.
    pub fn add_slide_entries(
        &self,
        slide_id: u64,
        entries: Vec<SlideEntry>,
    ) -> ResolveResult<()> {
        let record = self.slide_record(slide_id)?;
        let mut guard = lock(&record);
        match guard.draw.status {
            SlideStatus::Scheduled => {}
            SlideStatus::Cancelled => return Err(ResolveError::Cancelled),
            SlideStatus::Drawn => return Err(ResolveError::AlreadyDrawn),
        }
        let mut used: HashSet<u32> = guard
            .draw
            .entries
            .iter()
            .map(|e| e.entry_number)
            .collect();
        for entry in &entries {
            if !guard.draw.in_range(entry.entry_number) {
                return Err(ResolveError::EntryOutOfRange(entry.entry_number));
            }
            if !used.insert(entry.entry_number) {
                return Err(ResolveError::DuplicateEntryNumber(entry.entry_number));
            }
        }
        guard.draw.entries.extend(entries);
        Ok(())
    }

    /// Withdraws a scheduled slide draw. Cancelling twice is a no-op;
    /// a resolved draw can no longer be withdrawn.
    pub fn cancel_slide(&self, slide_id: u64) -> ResolveResult<()> {
        let record = self.slide_record(slide_id)?;
        let mut guard = lock(&record);
        match guard.draw.status {
            SlideStatus::Drawn => Err(ResolveError::AlreadyDrawn),
            SlideStatus::Cancelled => Ok(()),
            SlideStatus::Scheduled => {
                guard.draw.status = SlideStatus::Cancelled;
                info!(slide_id, "slide draw cancelled");
                Ok(())
            }
        }
    }

    /// Settles a due slide draw. Idempotent like raffle resolution.
    pub fn resolve_slide(
        &self,
        slide_id: u64,
        external_entropy: &str,
        key: &VaultKey,
    ) -> ResolveResult<DrawProof> {
        let record = self.slide_record(slide_id)?;
        let mut guard = lock(&record);
        if let Some(proof) = &guard.draw.proof {
            return Ok(proof.clone());
        }

        let seed = reveal_seed(&guard.sealed, key, slide_id)?;
        let outcome = resolve_slide(&guard.draw, &seed, external_entropy)?;

        guard.draw.status = SlideStatus::Drawn;
        guard.draw.target_number = Some(outcome.target_number);
        guard.draw.winners = outcome.winners;
        guard.draw.proof = Some(outcome.proof.clone());

        info!(
            slide_id,
            target = outcome.target_number,
            winners = guard.draw.winners.len(),
            fingerprint = %outcome.proof.fingerprint(),
            "slide draw settled"
        );
        Ok(outcome.proof)
    }

    /// Copy of the slide draw as the engine sees it.
    pub fn slide_snapshot(&self, slide_id: u64) -> ResolveResult<SlideDraw> {
        let record = self.slide_record(slide_id)?;
        let guard = lock(&record);
        Ok(guard.draw.clone())
    }

    fn slide_record(&self, slide_id: u64) -> ResolveResult<Arc<Mutex<SlideRecord>>> {
        lock(&self.slides)
            .get(&slide_id)
            .cloned()
            .ok_or(ResolveError::UnknownDraw(slide_id))
    }

    // ===== Pity =====

    /// Current pity state for a user.
    pub fn pity(&self, user_id: &str) -> PityState {
        lock(&self.pity).current(user_id)
    }

    /// Pity state recorded for a user right after one raffle.
    pub fn pity_after_draw(&self, user_id: &str, raffle_id: u64) -> Option<PityState> {
        lock(&self.pity).after_draw(user_id, raffle_id)
    }

    /// Current pity states for all known users, sorted by user id.
    pub fn pity_snapshot(&self) -> Vec<(String, PityState)> {
        lock(&self.pity).snapshot()
    }
}
