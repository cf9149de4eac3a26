//! Payout mathematics for a dice round.
//!
//! Pure functions with no locking and no randomness: the quote for a
//! prospective round is fully determined by the chosen win probability, the
//! stake, and the configured house edge.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::{CasinoError, CasinoResult};

/// Lowest selectable win probability, in percent.
pub const MIN_WIN_PROBABILITY: u8 = 1;

/// Highest selectable win probability, in percent.
pub const MAX_WIN_PROBABILITY: u8 = 95;

const MONEY_DP: u32 = 2;

/// Derived payout for a prospective round.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutQuote {
    /// Multiplier applied to the stake on a win, rounded to 2dp.
    pub multiplier: Decimal,
    /// Total credited on a win (the stake is part of it), rounded to 2dp.
    pub potential_win: Decimal,
}

/// Round a monetary value to 2 decimal places, midpoints away from zero.
pub(crate) fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the payout quote for a round.
///
/// `multiplier = (100 / win_probability) * (1 - house_edge)` and
/// `potential_win = stake * multiplier`, each rounded to 2dp. The win
/// probability must lie in `[MIN_WIN_PROBABILITY, MAX_WIN_PROBABILITY]` and
/// the stake must be positive. The house edge is a fraction below 1,
/// validated at the configuration boundary. A stake whose payout is not
/// representable is rejected rather than settled with a clamped amount.
pub fn compute_payout(
    win_probability: u8,
    stake: Decimal,
    house_edge: Decimal,
) -> CasinoResult<PayoutQuote> {
    if !(MIN_WIN_PROBABILITY..=MAX_WIN_PROBABILITY).contains(&win_probability) {
        return Err(CasinoError::InvalidProbability(win_probability));
    }
    if stake <= Decimal::ZERO {
        return Err(CasinoError::InvalidAmount {
            amount: stake,
            reason: "stake must be positive",
        });
    }

    let fair = Decimal::ONE_HUNDRED / Decimal::from(win_probability);
    let multiplier = Decimal::ONE
        .checked_sub(house_edge)
        .and_then(|retained| fair.checked_mul(retained))
        .map(round_money)
        .ok_or_else(|| {
            CasinoError::InvariantViolation(format!(
                "payout multiplier overflowed for house edge {}",
                house_edge
            ))
        })?;
    let potential_win = stake
        .checked_mul(multiplier)
        .map(round_money)
        .ok_or(CasinoError::InvalidAmount {
            amount: stake,
            reason: "stake too large to pay out",
        })?;

    Ok(PayoutQuote {
        multiplier,
        potential_win,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const EDGE: Decimal = dec!(0.05);

    #[test]
    fn test_reference_quote() {
        let quote = compute_payout(50, dec!(10), EDGE).unwrap();
        assert_eq!(quote.multiplier, dec!(1.90));
        assert_eq!(quote.potential_win, dec!(19.00));
    }

    #[test]
    fn test_rounding_to_two_places() {
        // 100/3 * 0.95 = 31.666... -> 31.67
        let quote = compute_payout(3, dec!(1), EDGE).unwrap();
        assert_eq!(quote.multiplier, dec!(31.67));

        // 2.02 * 2.5 = 5.05, exact at 2dp
        let quote = compute_payout(47, dec!(2.5), EDGE).unwrap();
        assert_eq!(quote.multiplier, dec!(2.02));
        assert_eq!(quote.potential_win, dec!(5.05));
    }

    #[test]
    fn test_multiplier_exceeds_one_below_upper_bound() {
        for probability in MIN_WIN_PROBABILITY..MAX_WIN_PROBABILITY {
            let quote = compute_payout(probability, dec!(10), EDGE).unwrap();
            assert!(
                quote.multiplier > Decimal::ONE,
                "multiplier {} at probability {}",
                quote.multiplier,
                probability
            );
        }
    }

    #[test]
    fn test_upper_bound_is_even_money() {
        // 100/95 * 0.95 is exactly 1.
        let quote = compute_payout(95, dec!(10), EDGE).unwrap();
        assert_eq!(quote.multiplier, Decimal::ONE);
        assert_eq!(quote.potential_win, dec!(10));
    }

    #[test]
    fn test_potential_win_tracks_multiplier() {
        for probability in MIN_WIN_PROBABILITY..=MAX_WIN_PROBABILITY {
            let stake = dec!(12.34);
            let quote = compute_payout(probability, stake, EDGE).unwrap();
            assert_eq!(quote.potential_win, round_money(stake * quote.multiplier));
        }
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        for probability in [0u8, 96, 100, 255] {
            assert_eq!(
                compute_payout(probability, dec!(10), EDGE),
                Err(CasinoError::InvalidProbability(probability))
            );
        }
    }

    #[test]
    fn test_non_positive_stake_rejected() {
        assert!(matches!(
            compute_payout(50, Decimal::ZERO, EDGE),
            Err(CasinoError::InvalidAmount { .. })
        ));
        assert!(matches!(
            compute_payout(50, dec!(-5), EDGE),
            Err(CasinoError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_oversized_stake_rejected() {
        let err = compute_payout(50, Decimal::MAX, EDGE).unwrap_err();
        assert_eq!(
            err,
            CasinoError::InvalidAmount {
                amount: Decimal::MAX,
                reason: "stake too large to pay out",
            }
        );
    }

    #[test]
    fn test_zero_edge_is_fair() {
        let quote = compute_payout(50, dec!(10), Decimal::ZERO).unwrap();
        assert_eq!(quote.multiplier, dec!(2.00));
        assert_eq!(quote.potential_win, dec!(20.00));
    }
}
