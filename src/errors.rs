//! Error types for the wagering and bonus ledger core.
//!
//! Every user-facing failure is locally recoverable: the operation reports
//! the error and account state stays untouched. `InvariantViolation` is the
//! exception, reserved for internal inconsistencies and integration misuse
//! (unknown or already-terminal transaction ids).

use rust_decimal::Decimal;

use crate::ledger::FundingSource;

/// Unified error type for all core operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CasinoError {
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Decimal, reason: &'static str },

    #[error("Win probability {0} outside supported range 1..=95")]
    InvalidProbability(u8),

    // The funding field must not be called `source`, or the derive treats
    // it as the error's cause and requires an Error impl on it.
    #[error("Insufficient {funding} funds: requested {requested}, available {available}")]
    InsufficientFunds {
        funding: FundingSource,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Withdrawal of {requested} below minimum {minimum}")]
    BelowMinimum { requested: Decimal, minimum: Decimal },

    #[error("Unknown promo code: {0}")]
    UnknownCode(String),

    #[error("Promo code {0} already redeemed by this account")]
    AlreadyRedeemed(String),

    #[error("Promo code {0} has reached its usage limit")]
    UsageLimitExceeded(String),

    #[error("Promo code {0} already exists")]
    DuplicateCode(String),

    #[error("Invalid promo code: {0}")]
    InvalidCode(&'static str),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Convenience alias for core operation results.
pub type CasinoResult<T> = Result<T, CasinoError>;
