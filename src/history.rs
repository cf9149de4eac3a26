//! Append-only transaction log.
//!
//! Every balance-affecting event is recorded here for the reporting
//! collaborator. The log is audit-only: ledger decisions never read it back.
//! Entries follow a `Pending -> Completed | Failed` state machine and are
//! immutable once terminal.
//!
//! Log operations are synchronous and never await, so callers may run them
//! while holding an account lock.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CasinoError, CasinoResult};

/// What kind of balance-affecting event a transaction records.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Wager,
    BonusGrant,
}

/// Lifecycle state of a transaction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// One recorded balance-affecting event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: String,
    pub kind: TransactionKind,
    /// Signed net amount: credits positive, debits negative.
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub details: String,
}

impl Transaction {
    fn new(
        account_id: &str,
        kind: TransactionKind,
        amount: Decimal,
        status: TransactionStatus,
        details: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            kind,
            amount,
            status,
            created_at: Utc::now(),
            details,
        }
    }
}

/// Append-only log ordered by creation time.
#[derive(Debug, Default)]
pub struct TransactionLog {
    entries: RwLock<Vec<Transaction>>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, Vec<Transaction>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Vec<Transaction>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a new entry, returning a copy of the recorded transaction.
    pub fn append(
        &self,
        account_id: &str,
        kind: TransactionKind,
        amount: Decimal,
        status: TransactionStatus,
        details: impl Into<String>,
    ) -> Transaction {
        let tx = Transaction::new(account_id, kind, amount, status, details.into());
        tracing::debug!(
            tx_id = %tx.id,
            account = account_id,
            kind = ?kind,
            %amount,
            "Recording transaction"
        );
        self.write_entries().push(tx.clone());
        tx
    }

    /// Transition a pending entry to `Completed`.
    pub fn complete(&self, tx_id: Uuid) -> CasinoResult<Transaction> {
        self.transition(tx_id, TransactionStatus::Completed, None)
    }

    /// Transition a pending entry to `Failed`, recording the reason in its
    /// details as part of the same transition.
    pub fn fail(&self, tx_id: Uuid, reason: &str) -> CasinoResult<Transaction> {
        self.transition(tx_id, TransactionStatus::Failed, Some(reason))
    }

    fn transition(
        &self,
        tx_id: Uuid,
        to: TransactionStatus,
        reason: Option<&str>,
    ) -> CasinoResult<Transaction> {
        let mut entries = self.write_entries();
        let tx = entries
            .iter_mut()
            .find(|t| t.id == tx_id)
            .ok_or_else(|| CasinoError::InvariantViolation(format!("unknown transaction {}", tx_id)))?;

        if tx.status != TransactionStatus::Pending {
            return Err(CasinoError::InvariantViolation(format!(
                "transaction {} is already {:?}",
                tx_id, tx.status
            )));
        }

        tx.status = to;
        if let Some(reason) = reason {
            tx.details = format!("{}; failed: {}", tx.details, reason);
        }
        Ok(tx.clone())
    }

    /// All entries in creation order.
    pub fn all(&self) -> Vec<Transaction> {
        self.read_entries().clone()
    }

    /// Entries for one account, in creation order.
    pub fn for_account(&self, account_id: &str) -> Vec<Transaction> {
        self.read_entries()
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Entries of one kind, in creation order.
    pub fn by_kind(&self, kind: TransactionKind) -> Vec<Transaction> {
        self.read_entries()
            .iter()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect()
    }

    /// Look up a single entry by id.
    pub fn get(&self, tx_id: Uuid) -> Option<Transaction> {
        self.read_entries().iter().find(|t| t.id == tx_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }
}
