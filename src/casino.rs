//! Casino facade tying the game engine, ledger, promo engine and
//! transaction log together.
//!
//! Every public operation here is atomic from the caller's point of view:
//! balance changes happen under the account lock and the matching log
//! entry is appended before the call returns. Payout math and the outcome
//! roll run outside any lock.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{BonusStackingPolicy, ConfigError, DicehouseConfig};
use crate::errors::{CasinoError, CasinoResult};
use crate::games::{compute_payout, resolve_round, OsRoundRng, RoundRng};
use crate::history::{Transaction, TransactionKind, TransactionLog, TransactionStatus};
use crate::ledger::{Account, AccountSnapshot, FundingSource, Ledger};
use crate::promo::{normalize_code, NewPromoCode, PromoCode, PromoEngine, PromoKind};

/// Result of a settled bet, as returned to callers.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct BetReceipt {
    pub is_win: bool,
    pub outcome_roll: u8,
    pub payout_multiplier: Decimal,
    pub new_cash_balance: Decimal,
    pub new_bonus_balance: Decimal,
    pub new_wager_remaining: Decimal,
}

/// Result of a promo redemption.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RedemptionReceipt {
    pub code: String,
    pub kind: PromoKind,
    pub amount: Decimal,
    /// Wagering requirement added by this redemption (zero for cash grants).
    pub wager_requirement_added: Decimal,
    pub new_cash_balance: Decimal,
    pub new_bonus_balance: Decimal,
    pub new_wager_remaining: Decimal,
}

/// The wagering and bonus ledger core.
pub struct Casino {
    config: DicehouseConfig,
    ledger: Ledger,
    promo: PromoEngine,
    history: TransactionLog,
    rng: Arc<dyn RoundRng>,
}

impl Casino {
    /// Build a casino with the OS randomness source.
    pub fn new(config: DicehouseConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, Arc::new(OsRoundRng))
    }

    /// Build a casino with a caller-supplied randomness source.
    pub fn with_rng(
        config: DicehouseConfig,
        rng: Arc<dyn RoundRng>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let casino = Self {
            promo: PromoEngine::new(),
            ledger: Ledger::new(),
            history: TransactionLog::new(),
            rng,
            config,
        };
        if casino.config.promo.seed_demo_codes {
            casino.promo.seed_demo_codes();
        }
        tracing::info!(
            house_edge_bps = casino.config.game.house_edge_bps,
            min_withdrawal = casino.config.ledger.min_withdrawal,
            promo_codes = casino.promo.len(),
            "Casino initialized"
        );
        Ok(casino)
    }

    /// Place and settle one bet: quote the payout, roll the outcome, then
    /// apply stake, winnings and wagering progress atomically.
    pub async fn place_bet(
        &self,
        account_id: &str,
        stake: Decimal,
        win_probability: u8,
        source: FundingSource,
    ) -> CasinoResult<BetReceipt> {
        let quote = compute_payout(win_probability, stake, self.config.house_edge())?;
        let outcome = resolve_round(self.rng.as_ref(), win_probability);

        let settlement = self
            .ledger
            .settle_round(
                account_id,
                stake,
                source,
                &quote,
                outcome,
                self.config.bonus.wager_progress,
            )
            .await?;

        let details = if outcome.is_win {
            format!(
                "Stake {} ({}) at {}%, roll {}, won {}",
                stake, source, win_probability, outcome.roll, settlement.credited
            )
        } else {
            format!(
                "Stake {} ({}) at {}%, roll {}, lost",
                stake, source, win_probability, outcome.roll
            )
        };
        self.history.append(
            account_id,
            TransactionKind::Wager,
            settlement.credited - stake,
            TransactionStatus::Completed,
            details,
        );

        if let Some(converted) = settlement.progress.and_then(|p| p.converted) {
            self.record_conversion(account_id, converted);
        }

        tracing::info!(
            account = account_id,
            %stake,
            win_probability,
            roll = outcome.roll,
            is_win = outcome.is_win,
            credited = %settlement.credited,
            "Round settled"
        );

        Ok(BetReceipt {
            is_win: outcome.is_win,
            outcome_roll: outcome.roll,
            payout_multiplier: quote.multiplier,
            new_cash_balance: settlement.snapshot.cash_balance,
            new_bonus_balance: settlement.snapshot.bonus_balance,
            new_wager_remaining: settlement.snapshot.bonus_wager_remaining,
        })
    }

    /// Credit a deposit confirmed by the payment collaborator. Returns the
    /// completed `Deposit` transaction.
    pub async fn apply_deposit(
        &self,
        account_id: &str,
        amount: Decimal,
    ) -> CasinoResult<Transaction> {
        self.ledger.credit_cash(account_id, amount).await?;
        let tx = self.history.append(
            account_id,
            TransactionKind::Deposit,
            amount,
            TransactionStatus::Pending,
            format!("Deposit of {}", amount),
        );
        let tx = self.history.complete(tx.id)?;
        tracing::info!(account = account_id, %amount, "Deposit applied");
        Ok(tx)
    }

    /// Debit a withdrawal and record it as pending until the payment
    /// collaborator confirms or rejects it. Returns the pending `Withdraw`
    /// transaction; its id is the handle for the callback.
    pub async fn request_withdrawal(
        &self,
        account_id: &str,
        amount: Decimal,
        destination_ref: &str,
    ) -> CasinoResult<Transaction> {
        self.ledger
            .withdraw_cash(account_id, amount, self.config.min_withdrawal())
            .await?;
        let tx = self.history.append(
            account_id,
            TransactionKind::Withdraw,
            -amount,
            TransactionStatus::Pending,
            format!("Withdrawal of {} to {}", amount, destination_ref),
        );
        tracing::info!(
            account = account_id,
            %amount,
            destination = destination_ref,
            tx_id = %tx.id,
            "Withdrawal requested"
        );
        Ok(tx)
    }

    /// Mark a pending withdrawal as paid out.
    pub async fn confirm_withdrawal(&self, tx_id: Uuid) -> CasinoResult<Transaction> {
        self.lookup_withdrawal(tx_id)?;
        let tx = self.history.complete(tx_id)?;
        tracing::info!(tx_id = %tx.id, account = %tx.account_id, "Withdrawal confirmed");
        Ok(tx)
    }

    /// Fail a pending withdrawal and refund the debited amount, as one step
    /// under the account lock: an observer that sees the `Failed` status
    /// also sees the refunded balance. The status transition runs first, so
    /// a confirm/reject race refunds at most once.
    pub async fn reject_withdrawal(
        &self,
        tx_id: Uuid,
        reason: &str,
    ) -> CasinoResult<Transaction> {
        let pending = self.lookup_withdrawal(tx_id)?;
        let refund = pending.amount.abs();
        let tx = self
            .ledger
            .with_account(&pending.account_id, |account| {
                // The refund must fit before the status flips, so the
                // transition and the credit cannot split.
                account
                    .balance(FundingSource::Cash)
                    .checked_add(refund)
                    .ok_or_else(|| {
                        CasinoError::InvariantViolation(format!(
                            "refund of {} overflows the cash balance",
                            refund
                        ))
                    })?;
                let tx = self.history.fail(tx_id, reason)?;
                account.credit_cash(refund)?;
                account.check_invariants()?;
                Ok::<_, CasinoError>(tx)
            })
            .await?;
        tracing::warn!(
            tx_id = %tx.id,
            account = %tx.account_id,
            refunded = %refund,
            reason,
            "Withdrawal rejected, funds returned"
        );
        Ok(tx)
    }

    fn lookup_withdrawal(&self, tx_id: Uuid) -> CasinoResult<Transaction> {
        let tx = self.history.get(tx_id).ok_or_else(|| {
            CasinoError::InvariantViolation(format!("unknown transaction {}", tx_id))
        })?;
        if tx.kind != TransactionKind::Withdraw {
            return Err(CasinoError::InvariantViolation(format!(
                "transaction {} is not a withdrawal",
                tx_id
            )));
        }
        Ok(tx)
    }

    /// Redeem a promo code for an account. The usage reservation and the
    /// balance effect happen together under the account lock; a reservation
    /// whose balance effect is rejected is released, so the account keeps
    /// its claim on the code.
    pub async fn redeem_promo_code(
        &self,
        account_id: &str,
        code: &str,
    ) -> CasinoResult<RedemptionReceipt> {
        let code = normalize_code(code);
        let stacking = self.config.bonus.stacking;

        let (promo, requirement_added, converted, snapshot) = self
            .ledger
            .with_account(account_id, |account| {
                let promo = self.promo.reserve(account_id, &code)?;
                let mut updated = account.clone();
                match Self::apply_promo(&mut updated, &promo, stacking) {
                    Ok((requirement_added, converted)) => {
                        let snapshot = updated.snapshot();
                        *account = updated;
                        Ok((promo, requirement_added, converted, snapshot))
                    }
                    Err(err) => {
                        self.promo.release(account_id, &code);
                        Err(err)
                    }
                }
            })
            .await?;

        let details = match promo.kind {
            PromoKind::CashGrant => {
                format!("Promo {} cash grant of {}", promo.code, promo.amount)
            }
            PromoKind::BonusGrant => format!(
                "Promo {} bonus grant of {} at x{} wagering",
                promo.code, promo.amount, promo.wager_multiplier
            ),
        };
        self.history.append(
            account_id,
            TransactionKind::BonusGrant,
            promo.amount,
            TransactionStatus::Completed,
            details,
        );
        if let Some(converted) = converted {
            self.record_conversion(account_id, converted);
        }

        tracing::info!(
            account = account_id,
            code = %promo.code,
            kind = ?promo.kind,
            amount = %promo.amount,
            "Promo code redeemed"
        );

        Ok(RedemptionReceipt {
            code: promo.code,
            kind: promo.kind,
            amount: promo.amount,
            wager_requirement_added: requirement_added,
            new_cash_balance: snapshot.cash_balance,
            new_bonus_balance: snapshot.bonus_balance,
            new_wager_remaining: snapshot.bonus_wager_remaining,
        })
    }

    /// Apply a reserved promo to the account. Returns the wagering
    /// requirement added and any conversion triggered by the grant.
    fn apply_promo(
        account: &mut Account,
        promo: &PromoCode,
        stacking: BonusStackingPolicy,
    ) -> CasinoResult<(Decimal, Option<Decimal>)> {
        let result = match promo.kind {
            PromoKind::CashGrant => {
                account.credit_cash(promo.amount)?;
                (Decimal::ZERO, None)
            }
            PromoKind::BonusGrant => {
                let requirement = promo
                    .amount
                    .checked_mul(Decimal::from(promo.wager_multiplier))
                    .ok_or(CasinoError::InvalidAmount {
                        amount: promo.amount,
                        reason: "wagering requirement overflows",
                    })?;
                let progress =
                    account.grant_bonus(promo.amount, promo.wager_multiplier, stacking)?;
                (requirement, progress.converted)
            }
        };
        account.check_invariants()?;
        Ok(result)
    }

    /// Add a promo code to the catalog.
    pub fn create_promo_code(
        &self,
        admin_account_id: &str,
        request: NewPromoCode,
    ) -> CasinoResult<PromoCode> {
        let promo = self.promo.create_code(request)?;
        tracing::info!(
            admin = admin_account_id,
            code = %promo.code,
            kind = ?promo.kind,
            amount = %promo.amount,
            usage_limit = promo.usage_limit,
            "Promo code created"
        );
        Ok(promo)
    }

    /// Grant bonus funds directly, outside any promo code.
    pub async fn grant_bonus(
        &self,
        account_id: &str,
        amount: Decimal,
        wager_multiplier: u32,
    ) -> CasinoResult<AccountSnapshot> {
        let (progress, snapshot) = self
            .ledger
            .grant_bonus(
                account_id,
                amount,
                wager_multiplier,
                self.config.bonus.stacking,
            )
            .await?;
        self.history.append(
            account_id,
            TransactionKind::BonusGrant,
            amount,
            TransactionStatus::Completed,
            format!("Bonus of {} granted at x{} wagering", amount, wager_multiplier),
        );
        if let Some(converted) = progress.converted {
            self.record_conversion(account_id, converted);
        }
        tracing::info!(
            account = account_id,
            %amount,
            wager_multiplier,
            "Bonus granted"
        );
        Ok(snapshot)
    }

    fn record_conversion(&self, account_id: &str, converted: Decimal) {
        self.history.append(
            account_id,
            TransactionKind::BonusGrant,
            converted,
            TransactionStatus::Completed,
            format!("Wagering requirement met, {} bonus converted to cash", converted),
        );
        tracing::info!(account = account_id, %converted, "Bonus converted to cash");
    }

    pub async fn account_snapshot(&self, account_id: &str) -> AccountSnapshot {
        self.ledger.snapshot(account_id).await
    }

    /// Catalog contents, oldest code first.
    pub fn promo_codes(&self) -> Vec<PromoCode> {
        self.promo.codes()
    }

    pub fn history(&self) -> &TransactionLog {
        &self.history
    }

    pub fn config(&self) -> &DicehouseConfig {
        &self.config
    }
}
