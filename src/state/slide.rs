use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, ResolveResult};
use crate::state::proof::DrawProof;

/// Lifecycle of a slide draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlideStatus {
    /// Accepting entries until the scheduled time.
    Scheduled,
    /// Resolved; target and winners are final.
    Drawn,
    /// Withdrawn before resolution. Never resolvable.
    Cancelled,
}

/// One numbered entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideEntry {
    /// Unique within the draw, assigned from the configured range.
    pub entry_number: u32,
    /// Holder.
    pub user_id: String,
    /// Assignment instant. First tie-break when ranking by distance.
    pub created_at: DateTime<Utc>,
}

/// A contiguous band of winner ranks sharing one prize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeBand {
    /// First rank covered, inclusive. Rank 1 is the closest entry.
    pub rank_from: u32,
    /// Last rank covered, inclusive.
    pub rank_to: u32,
    /// Prize title, snapshotted onto winners.
    pub title: String,
    /// Cash value when the prize is monetary.
    pub amount_cents: Option<i64>,
}

impl PrizeBand {
    pub fn contains(&self, rank: u32) -> bool {
        rank >= self.rank_from && rank <= self.rank_to
    }
}

/// One resolved winner of a slide draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideWinner {
    /// 1-based closeness rank.
    pub rank: u32,
    /// The entry number that won.
    pub winning_number: u32,
    pub user_id: String,
    /// Entries the user held in this draw at resolution time.
    pub chances_at_draw: u32,
    /// Title of the prize band covering `rank`.
    pub prize: String,
}

/// A numbered-entry draw: a target number is drawn at the scheduled
/// time and the closest entries win, ranked by distance.
#[derive(Debug, Clone)]
pub struct SlideDraw {
    pub id: u64,
    pub status: SlideStatus,
    /// Draw instant fixed at registration; the deterministic context
    /// timestamp.
    pub scheduled_at: DateTime<Utc>,
    /// Inclusive lower bound of the entry-number range.
    pub number_start: u32,
    /// Inclusive upper bound of the entry-number range.
    pub number_end: u32,
    pub entries: Vec<SlideEntry>,
    /// Rank bands, contiguous from rank 1.
    pub prizes: Vec<PrizeBand>,
    /// Set at resolution.
    pub target_number: Option<u32>,
    /// Set at resolution, rank order.
    pub winners: Vec<SlideWinner>,
    /// Present once resolved. Write-once.
    pub proof: Option<DrawProof>,
}

impl SlideDraw {
    pub fn new(
        id: u64,
        scheduled_at: DateTime<Utc>,
        number_start: u32,
        number_end: u32,
        prizes: Vec<PrizeBand>,
    ) -> Self {
        Self {
            id,
            status: SlideStatus::Scheduled,
            scheduled_at,
            number_start,
            number_end,
            entries: Vec::new(),
            prizes,
            target_number: None,
            winners: Vec::new(),
            proof: None,
        }
    }

    /// Size of the inclusive entry-number range.
    pub fn range_size(&self) -> u64 {
        self.number_end as u64 - self.number_start as u64 + 1
    }

    pub fn in_range(&self, number: u32) -> bool {
        number >= self.number_start && number <= self.number_end
    }

    /// Entries held by one user.
    pub fn chances_for(&self, user_id: &str) -> u32 {
        self.entries.iter().filter(|e| e.user_id == user_id).count() as u32
    }

    /// Band covering a rank, if any.
    pub fn prize_for_rank(&self, rank: u32) -> Option<&PrizeBand> {
        self.prizes.iter().find(|band| band.contains(rank))
    }

    /// Draws an unused entry number uniformly from the range,
    /// retrying on collision. Assignment-time randomness; winner
    /// selection never runs through here.
    pub fn assign_entry_number<R: Rng>(&self, rng: &mut R) -> ResolveResult<u32> {
        if self.number_start > self.number_end {
            return Err(ResolveError::InvalidNumberRange);
        }
        let used: HashSet<u32> = self.entries.iter().map(|e| e.entry_number).collect();
        if used.len() as u64 >= self.range_size() {
            return Err(ResolveError::NumberPoolExhausted);
        }
        loop {
            let candidate = rng.gen_range(self.number_start..=self.number_end);
            if !used.contains(&candidate) {
                return Ok(candidate);
            }
        }
    }
}

/// Checks that prize bands start at rank 1, run contiguously with no
/// overlap or gap, and returns the winner count they define.
pub fn validate_prize_table(prizes: &[PrizeBand]) -> ResolveResult<u32> {
    if prizes.is_empty() {
        return Err(ResolveError::InvalidPrizeTable("no prize bands".to_owned()));
    }
    let mut expected_from = 1u32;
    for band in prizes {
        if band.rank_from != expected_from {
            return Err(ResolveError::InvalidPrizeTable(format!(
                "expected a band starting at rank {expected_from}, found rank {}",
                band.rank_from
            )));
        }
        if band.rank_to < band.rank_from {
            return Err(ResolveError::InvalidPrizeTable(format!(
                "band {}..{} is inverted",
                band.rank_from, band.rank_to
            )));
        }
        expected_from = band.rank_to.checked_add(1).ok_or_else(|| {
            ResolveError::InvalidPrizeTable("rank bound overflows".to_owned())
        })?;
    }
    Ok(expected_from - 1)
}
