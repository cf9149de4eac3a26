//! Round randomness.
//!
//! Rolls are uniform integers in `[0, 99]`. The default source draws from
//! the operating-system CSPRNG; a seeded source exists for deterministic
//! tests and replay.

use std::sync::Mutex;

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Number of distinct roll values; rolls fall in `0..ROLL_SPAN`.
pub const ROLL_SPAN: u8 = 100;

/// Source of round rolls.
///
/// Implementations must return uniformly distributed values in `[0, 99]`.
pub trait RoundRng: Send + Sync {
    fn next_roll(&self) -> u8;
}

/// Roll source backed by operating-system entropy.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRoundRng;

impl RoundRng for OsRoundRng {
    fn next_roll(&self) -> u8 {
        let mut rng = OsRng;
        rng.gen_range(0..ROLL_SPAN)
    }
}

/// Deterministic roll source for tests and replay.
pub struct SeededRoundRng {
    inner: Mutex<StdRng>,
}

impl SeededRoundRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RoundRng for SeededRoundRng {
    fn next_roll(&self) -> u8 {
        let mut rng = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..ROLL_SPAN)
    }
}

/// Resolved roll for a round.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundOutcome {
    pub roll: u8,
    pub is_win: bool,
}

/// Draw a roll and decide the round.
///
/// A roll less than or equal to the chosen win probability wins. The
/// probability range is validated where the payout quote is computed, before
/// any round is resolved.
pub fn resolve_round(rng: &dyn RoundRng, win_probability: u8) -> RoundOutcome {
    let roll = rng.next_roll();
    RoundOutcome {
        roll,
        is_win: roll <= win_probability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRoll(u8);

    impl RoundRng for FixedRoll {
        fn next_roll(&self) -> u8 {
            self.0
        }
    }

    #[test]
    fn test_os_rolls_stay_in_range() {
        let rng = OsRoundRng;
        for _ in 0..1_000 {
            assert!(rng.next_roll() < ROLL_SPAN);
        }
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let a = SeededRoundRng::new(7);
        let b = SeededRoundRng::new(7);
        let rolls_a: Vec<u8> = (0..32).map(|_| a.next_roll()).collect();
        let rolls_b: Vec<u8> = (0..32).map(|_| b.next_roll()).collect();
        assert_eq!(rolls_a, rolls_b);
        assert!(rolls_a.iter().all(|&r| r < ROLL_SPAN));
    }

    #[test]
    fn test_inclusive_compare_decides_win() {
        let on_the_line = resolve_round(&FixedRoll(50), 50);
        assert!(on_the_line.is_win);
        assert_eq!(on_the_line.roll, 50);

        let just_over = resolve_round(&FixedRoll(51), 50);
        assert!(!just_over.is_win);
    }

    #[test]
    fn test_win_rate_roughly_matches_probability() {
        let rng = SeededRoundRng::new(42);
        let wins = (0..10_000)
            .filter(|_| resolve_round(&rng, 50).is_win)
            .count();
        // Inclusive compare targets 51%; a deterministic seed keeps this stable.
        assert!((4_800..=5_400).contains(&wins), "wins = {}", wins);
    }
}
