use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::proof::DrawProof;

/// Lifecycle of a raffle draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaffleStatus {
    /// Registered, seed committed, not yet selling.
    Draft,
    /// Selling tickets.
    Open,
    /// Sales ended, population frozen, awaiting resolution.
    Closed,
    /// Resolved; the proof is final.
    Drawn,
}

/// One sold ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Assigned at purchase. Monotonically increasing within the
    /// raffle, never reused; a refund leaves a gap.
    pub index: u64,
    /// Holder.
    pub user_id: String,
    /// Purchase instant.
    pub purchased_at: DateTime<Utc>,
}

/// A raffle draw as the engine sees it. The population arrives once,
/// at close, ordered by ticket index.
#[derive(Debug, Clone)]
pub struct RaffleDraw {
    pub id: u64,
    pub status: RaffleStatus,
    /// Set when the raffle closes; the deterministic context timestamp.
    pub closed_at: Option<DateTime<Utc>>,
    /// Final population, ordered by ticket index.
    pub tickets: Vec<Ticket>,
    /// Present once resolved. Write-once.
    pub proof: Option<DrawProof>,
}

impl RaffleDraw {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            status: RaffleStatus::Draft,
            closed_at: None,
            tickets: Vec::new(),
            proof: None,
        }
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    /// Distinct ticket holders, sorted. Pity updates iterate this
    /// instead of any map ordering.
    pub fn participant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tickets.iter().map(|t| t.user_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Holder of the ticket with the given index, if it exists.
    pub fn holder_of(&self, index: u64) -> Option<&str> {
        self.tickets
            .iter()
            .find(|t| t.index == index)
            .map(|t| t.user_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(index: u64, user: &str) -> Ticket {
        Ticket {
            index,
            user_id: user.to_owned(),
            purchased_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn participants_are_deduplicated_and_sorted() {
        let mut draw = RaffleDraw::new(1);
        draw.tickets = vec![
            ticket(0, "zoe"),
            ticket(1, "alice"),
            ticket(2, "zoe"),
            ticket(3, "bob"),
        ];
        assert_eq!(draw.participant_ids(), vec!["alice", "bob", "zoe"]);
    }

    #[test]
    fn holder_lookup_follows_indexes_not_slots() {
        let mut draw = RaffleDraw::new(1);
        // Index 1 was refunded; the gap stays.
        draw.tickets = vec![ticket(0, "alice"), ticket(2, "bob")];
        assert_eq!(draw.holder_of(2), Some("bob"));
        assert_eq!(draw.holder_of(1), None);
    }
}
