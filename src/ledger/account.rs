//! Single-account balance state and its pure transition rules.
//!
//! An [`Account`] holds the dual cash/bonus balances plus the outstanding
//! wagering requirement. All mutations are synchronous and either apply
//! fully or leave the account untouched; the async ledger layer provides
//! the per-account locking around them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::BonusStackingPolicy;
use crate::errors::{CasinoError, CasinoResult};

/// Which balance a stake is funded from (and winnings credited to).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FundingSource {
    Cash,
    Bonus,
}

impl std::fmt::Display for FundingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundingSource::Cash => write!(f, "cash"),
            FundingSource::Bonus => write!(f, "bonus"),
        }
    }
}

/// Point-in-time copy of an account's balances.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub cash_balance: Decimal,
    pub bonus_balance: Decimal,
    pub bonus_wager_remaining: Decimal,
}

/// Result of advancing the wagering requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WagerProgress {
    /// Bonus amount moved to cash, when this step satisfied the requirement.
    pub converted: Option<Decimal>,
    /// Requirement still outstanding after the step.
    pub remaining: Decimal,
}

/// Balances for one account.
///
/// Fields are private so every change goes through a transition method
/// that validates first and mutates second.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    cash_balance: Decimal,
    bonus_balance: Decimal,
    bonus_wager_remaining: Decimal,
}

impl Account {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            cash_balance: self.cash_balance,
            bonus_balance: self.bonus_balance,
            bonus_wager_remaining: self.bonus_wager_remaining,
        }
    }

    pub fn balance(&self, source: FundingSource) -> Decimal {
        match source {
            FundingSource::Cash => self.cash_balance,
            FundingSource::Bonus => self.bonus_balance,
        }
    }

    fn balance_mut(&mut self, source: FundingSource) -> &mut Decimal {
        match source {
            FundingSource::Cash => &mut self.cash_balance,
            FundingSource::Bonus => &mut self.bonus_balance,
        }
    }

    /// Debit a stake from the chosen balance.
    pub fn place_stake(&mut self, source: FundingSource, stake: Decimal) -> CasinoResult<()> {
        if stake <= Decimal::ZERO {
            return Err(CasinoError::InvalidAmount {
                amount: stake,
                reason: "stake must be positive",
            });
        }
        let available = self.balance(source);
        if stake > available {
            return Err(CasinoError::InsufficientFunds {
                funding: source,
                requested: stake,
                available,
            });
        }
        // stake <= available, so the debit cannot leave range
        *self.balance_mut(source) -= stake;
        Ok(())
    }

    /// Credit winnings to the same balance the stake came from.
    pub fn credit_win(&mut self, source: FundingSource, amount: Decimal) -> CasinoResult<()> {
        if amount < Decimal::ZERO {
            return Err(CasinoError::InvalidAmount {
                amount,
                reason: "winnings cannot be negative",
            });
        }
        let balance = self.balance_mut(source);
        *balance = balance.checked_add(amount).ok_or_else(|| {
            CasinoError::InvariantViolation(format!(
                "win credit of {} overflows the {} balance",
                amount, source
            ))
        })?;
        Ok(())
    }

    /// Credit the cash balance (deposits, promo cash grants, refunds).
    pub fn credit_cash(&mut self, amount: Decimal) -> CasinoResult<()> {
        if amount <= Decimal::ZERO {
            return Err(CasinoError::InvalidAmount {
                amount,
                reason: "credit must be positive",
            });
        }
        self.cash_balance =
            self.cash_balance
                .checked_add(amount)
                .ok_or(CasinoError::InvalidAmount {
                    amount,
                    reason: "credit overflows the balance",
                })?;
        Ok(())
    }

    /// Debit cash for a withdrawal. Funds are checked before the minimum so
    /// a request the account cannot cover reports the shortfall.
    pub fn withdraw_cash(&mut self, amount: Decimal, minimum: Decimal) -> CasinoResult<()> {
        if amount <= Decimal::ZERO {
            return Err(CasinoError::InvalidAmount {
                amount,
                reason: "withdrawal must be positive",
            });
        }
        if amount > self.cash_balance {
            return Err(CasinoError::InsufficientFunds {
                funding: FundingSource::Cash,
                requested: amount,
                available: self.cash_balance,
            });
        }
        if amount < minimum {
            return Err(CasinoError::BelowMinimum {
                requested: amount,
                minimum,
            });
        }
        self.cash_balance -= amount;
        Ok(())
    }

    /// Grant a bonus and extend the wagering requirement by
    /// `amount * multiplier`. A x0 grant carries no requirement and
    /// converts straight to cash when nothing is outstanding.
    ///
    /// The transition runs on a scratch copy and commits only as a whole,
    /// so a rejected grant leaves the account untouched.
    pub fn grant_bonus(
        &mut self,
        amount: Decimal,
        wager_multiplier: u32,
        stacking: BonusStackingPolicy,
    ) -> CasinoResult<WagerProgress> {
        if amount <= Decimal::ZERO {
            return Err(CasinoError::InvalidAmount {
                amount,
                reason: "bonus grant must be positive",
            });
        }
        let requirement = amount
            .checked_mul(Decimal::from(wager_multiplier))
            .ok_or(CasinoError::InvalidAmount {
                amount,
                reason: "wagering requirement overflows",
            })?;
        let overflow = || CasinoError::InvalidAmount {
            amount,
            reason: "bonus grant overflows the balance",
        };

        let mut updated = self.clone();
        match stacking {
            BonusStackingPolicy::Accumulate => {
                updated.bonus_balance =
                    updated.bonus_balance.checked_add(amount).ok_or_else(overflow)?;
                updated.bonus_wager_remaining = updated
                    .bonus_wager_remaining
                    .checked_add(requirement)
                    .ok_or_else(overflow)?;
            }
            BonusStackingPolicy::Replace => {
                updated.bonus_balance = amount;
                updated.bonus_wager_remaining = requirement;
            }
        }
        let progress = WagerProgress {
            converted: updated.convert_if_satisfied()?,
            remaining: updated.bonus_wager_remaining,
        };
        *self = updated;
        Ok(progress)
    }

    /// Count a settled stake against the wagering requirement, clamping at
    /// zero, and convert the bonus balance once the requirement clears.
    pub fn record_wager(&mut self, staked: Decimal) -> CasinoResult<WagerProgress> {
        let mut updated = self.clone();
        if updated.bonus_wager_remaining > Decimal::ZERO {
            updated.bonus_wager_remaining =
                (updated.bonus_wager_remaining - staked).max(Decimal::ZERO);
        }
        let progress = WagerProgress {
            converted: updated.convert_if_satisfied()?,
            remaining: updated.bonus_wager_remaining,
        };
        *self = updated;
        Ok(progress)
    }

    /// Move the whole bonus balance to cash once nothing is outstanding.
    fn convert_if_satisfied(&mut self) -> CasinoResult<Option<Decimal>> {
        if self.bonus_wager_remaining == Decimal::ZERO && self.bonus_balance > Decimal::ZERO {
            let converted = self.bonus_balance;
            let cash = self.cash_balance.checked_add(converted).ok_or_else(|| {
                CasinoError::InvariantViolation(format!(
                    "bonus conversion of {} overflows the cash balance",
                    converted
                ))
            })?;
            self.cash_balance = cash;
            self.bonus_balance = Decimal::ZERO;
            return Ok(Some(converted));
        }
        Ok(None)
    }

    /// Balances and the requirement must never go negative.
    pub fn check_invariants(&self) -> CasinoResult<()> {
        if self.cash_balance < Decimal::ZERO
            || self.bonus_balance < Decimal::ZERO
            || self.bonus_wager_remaining < Decimal::ZERO
        {
            return Err(CasinoError::InvariantViolation(format!(
                "negative account state: cash {}, bonus {}, wager remaining {}",
                self.cash_balance, self.bonus_balance, self.bonus_wager_remaining
            )));
        }
        Ok(())
    }
}
