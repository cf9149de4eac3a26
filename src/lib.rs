//! Dicehouse - Wagering and Bonus Ledger Core
//!
//! In-memory casino core: probability-priced payouts, a dual cash/bonus
//! ledger with wagering requirements, promo code redemption and an
//! append-only transaction log. Accounts are locked individually, so
//! traffic on different accounts settles in parallel.

pub mod casino;
pub mod config;
pub mod errors;
pub mod games;
pub mod history;
pub mod ledger;
pub mod promo;
pub mod telemetry;

pub use casino::{BetReceipt, Casino, RedemptionReceipt};
pub use config::{
    BonusStackingPolicy, ConfigBuilder, ConfigError, ConfigLoader, DicehouseConfig,
    WagerProgressPolicy,
};
pub use errors::{CasinoError, CasinoResult};
pub use games::{
    compute_payout, resolve_round, OsRoundRng, PayoutQuote, RoundOutcome, RoundRng,
    SeededRoundRng, MAX_WIN_PROBABILITY, MIN_WIN_PROBABILITY,
};
pub use history::{Transaction, TransactionKind, TransactionLog, TransactionStatus};
pub use ledger::{Account, AccountSnapshot, FundingSource, Ledger, WagerProgress};
pub use promo::{NewPromoCode, PromoCode, PromoEngine, PromoKind};
