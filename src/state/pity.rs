use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constants::{PITY_BASE_MULTIPLIER, PITY_MAX_MULTIPLIER, PITY_STEP};

/// Streak state shown to a user in purchase flows. Display-only: the
/// multiplier never feeds winner selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PityState {
    /// Consecutive raffles entered without a win.
    pub miss_streak: u32,
    /// `min(1.5, 1 + 0.01 * miss_streak)`.
    pub pity_multiplier: f64,
}

impl Default for PityState {
    fn default() -> Self {
        Self {
            miss_streak: 0,
            pity_multiplier: PITY_BASE_MULTIPLIER,
        }
    }
}

impl PityState {
    fn after_miss(self) -> Self {
        let streak = self.miss_streak.saturating_add(1);
        Self {
            miss_streak: streak,
            pity_multiplier: multiplier_for(streak),
        }
    }
}

/// Multiplier for a given miss streak, capped at the ceiling.
pub fn multiplier_for(streak: u32) -> f64 {
    (PITY_BASE_MULTIPLIER + PITY_STEP * streak as f64).min(PITY_MAX_MULTIPLIER)
}

/// Per-user miss-streak book with a journal entry per resolved
/// raffle. Updated exactly once per distinct participant per draw.
#[derive(Debug, Default)]
pub struct PityBook {
    current: BTreeMap<String, PityState>,
    journal: BTreeMap<(String, u64), PityState>,
}

impl PityBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one raffle outcome. `participants` may repeat users
    /// holding several tickets; each distinct user is touched once,
    /// in sorted order. Winners reset, everyone else extends.
    pub fn apply_raffle_result(
        &mut self,
        raffle_id: u64,
        participants: &[String],
        winners: &BTreeSet<String>,
    ) {
        let distinct: BTreeSet<&String> = participants.iter().collect();
        for user in distinct {
            let next = if winners.contains(user) {
                PityState::default()
            } else {
                self.current(user).after_miss()
            };
            self.journal.insert((user.clone(), raffle_id), next);
            self.current.insert(user.clone(), next);
        }
    }

    /// Current state for a user; unseen users start at the base.
    pub fn current(&self, user_id: &str) -> PityState {
        self.current.get(user_id).copied().unwrap_or_default()
    }

    /// State recorded for a user right after one raffle resolved.
    pub fn after_draw(&self, user_id: &str, raffle_id: u64) -> Option<PityState> {
        self.journal.get(&(user_id.to_owned(), raffle_id)).copied()
    }

    /// All current states, sorted by user id.
    pub fn snapshot(&self) -> Vec<(String, PityState)> {
        self.current
            .iter()
            .map(|(user, state)| (user.clone(), *state))
            .collect()
    }
}
