//! Account ledger with per-account mutual exclusion.
//!
//! Accounts live in a concurrent map keyed by account id and are created
//! implicitly with zero balances on first touch. Each account carries its
//! own async lock, so operations on different accounts run in parallel
//! while operations on the same account are serialized.

pub mod account;

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::config::{BonusStackingPolicy, WagerProgressPolicy};
use crate::errors::CasinoResult;
use crate::games::{PayoutQuote, RoundOutcome};

pub use account::{Account, AccountSnapshot, FundingSource, WagerProgress};

/// Outcome of settling one game round against an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundSettlement {
    /// Amount credited back to the funding balance (zero on a loss).
    pub credited: Decimal,
    /// Wagering progress, when the round counted toward the requirement.
    pub progress: Option<WagerProgress>,
    pub snapshot: AccountSnapshot,
}

/// Concurrent map of accounts, one lock per account.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<String, Arc<Mutex<Account>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, account_id: &str) -> Arc<Mutex<Account>> {
        self.accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Account::new())))
            .clone()
    }

    /// Run `f` with the account's lock held. The map shard lock is released
    /// before the account lock is taken, so other accounts stay reachable.
    pub(crate) async fn with_account<F, R>(&self, account_id: &str, f: F) -> R
    where
        F: FnOnce(&mut Account) -> R,
    {
        let cell = self.entry(account_id);
        let mut account = cell.lock().await;
        f(&mut account)
    }

    pub async fn snapshot(&self, account_id: &str) -> AccountSnapshot {
        self.with_account(account_id, |account| account.snapshot()).await
    }

    pub async fn credit_cash(
        &self,
        account_id: &str,
        amount: Decimal,
    ) -> CasinoResult<AccountSnapshot> {
        self.with_account(account_id, |account| {
            account.credit_cash(amount)?;
            account.check_invariants()?;
            Ok(account.snapshot())
        })
        .await
    }

    pub async fn withdraw_cash(
        &self,
        account_id: &str,
        amount: Decimal,
        minimum: Decimal,
    ) -> CasinoResult<AccountSnapshot> {
        self.with_account(account_id, |account| {
            account.withdraw_cash(amount, minimum)?;
            account.check_invariants()?;
            Ok(account.snapshot())
        })
        .await
    }

    pub async fn grant_bonus(
        &self,
        account_id: &str,
        amount: Decimal,
        wager_multiplier: u32,
        stacking: BonusStackingPolicy,
    ) -> CasinoResult<(WagerProgress, AccountSnapshot)> {
        self.with_account(account_id, |account| {
            let progress = account.grant_bonus(amount, wager_multiplier, stacking)?;
            account.check_invariants()?;
            Ok((progress, account.snapshot()))
        })
        .await
    }

    /// Settle one resolved round as a single atomic step: debit the stake,
    /// credit winnings on a win, then advance the wagering requirement per
    /// the progress policy. The steps run on a scratch copy and commit only
    /// as a whole, so any rejected step leaves the account untouched.
    pub async fn settle_round(
        &self,
        account_id: &str,
        stake: Decimal,
        source: FundingSource,
        quote: &PayoutQuote,
        outcome: RoundOutcome,
        progress_policy: WagerProgressPolicy,
    ) -> CasinoResult<RoundSettlement> {
        let potential_win = quote.potential_win;
        self.with_account(account_id, |account| {
            let mut updated = account.clone();
            updated.place_stake(source, stake)?;

            let credited = if outcome.is_win {
                updated.credit_win(source, potential_win)?;
                potential_win
            } else {
                Decimal::ZERO
            };

            let progress = match progress_policy {
                WagerProgressPolicy::AllStakes => Some(updated.record_wager(stake)?),
                WagerProgressPolicy::BonusFundedOnly if source == FundingSource::Bonus => {
                    Some(updated.record_wager(stake)?)
                }
                WagerProgressPolicy::BonusFundedOnly => None,
            };

            updated.check_invariants()?;
            let snapshot = updated.snapshot();
            *account = updated;
            Ok(RoundSettlement {
                credited,
                progress,
                snapshot,
            })
        })
        .await
    }
}
