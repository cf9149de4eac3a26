pub mod payout;
pub mod rng;

pub use payout::{compute_payout, PayoutQuote, MAX_WIN_PROBABILITY, MIN_WIN_PROBABILITY};
pub use rng::{resolve_round, OsRoundRng, RoundOutcome, RoundRng, SeededRoundRng};
