pub mod pity;
pub mod proof;
pub mod raffle;
pub mod slide;

pub use pity::{PityBook, PityState};
pub use proof::{raffle_participants_hash, slide_participants_hash, DrawProof};
pub use raffle::{RaffleDraw, RaffleStatus, Ticket};
pub use slide::{PrizeBand, SlideDraw, SlideEntry, SlideStatus, SlideWinner};
