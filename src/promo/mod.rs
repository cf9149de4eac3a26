//! Promo code catalog and redemption bookkeeping.
//!
//! Codes are stored uppercase and matched case-insensitively. The engine
//! owns the usage counters and the per-account redemption records; the
//! balance effect of a redemption is applied by the casino facade under
//! the account lock.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{CasinoError, CasinoResult};

/// What redeeming a code does to the account.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromoKind {
    /// Credits cash directly, no wagering requirement.
    CashGrant,
    /// Credits bonus funds locked behind a wagering requirement.
    BonusGrant,
}

/// A promo code as stored in the catalog.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PromoCode {
    pub code: String,
    pub kind: PromoKind,
    pub amount: Decimal,
    /// Wagering requirement multiplier; ignored for cash grants.
    pub wager_multiplier: u32,
    pub usage_limit: u32,
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a promo code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewPromoCode {
    pub code: String,
    pub kind: PromoKind,
    pub amount: Decimal,
    pub wager_multiplier: u32,
    pub usage_limit: u32,
}

/// Canonical form used for catalog keys and redemption records.
pub(crate) fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Catalog plus per-account redemption records.
#[derive(Debug, Default)]
pub struct PromoEngine {
    catalog: DashMap<String, PromoCode>,
    redemptions: DashMap<(String, String), DateTime<Utc>>,
}

impl PromoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a code to the catalog. The code is normalized before the
    /// uniqueness check, so `welcome` and `WELCOME` are the same code.
    pub fn create_code(&self, request: NewPromoCode) -> CasinoResult<PromoCode> {
        let code = normalize_code(&request.code);
        if code.is_empty() {
            return Err(CasinoError::InvalidCode("code must not be blank"));
        }
        if request.amount <= Decimal::ZERO {
            return Err(CasinoError::InvalidAmount {
                amount: request.amount,
                reason: "promo amount must be positive",
            });
        }
        if request.usage_limit == 0 {
            return Err(CasinoError::InvalidAmount {
                amount: Decimal::ZERO,
                reason: "usage limit must be positive",
            });
        }

        match self.catalog.entry(code.clone()) {
            Entry::Occupied(_) => Err(CasinoError::DuplicateCode(code)),
            Entry::Vacant(slot) => {
                let promo = PromoCode {
                    code,
                    kind: request.kind,
                    amount: request.amount,
                    wager_multiplier: request.wager_multiplier,
                    usage_limit: request.usage_limit,
                    usage_count: 0,
                    created_at: Utc::now(),
                };
                slot.insert(promo.clone());
                Ok(promo)
            }
        }
    }

    /// Claim one use of `code` for `account_id` and return the code as it
    /// stood at reservation time.
    ///
    /// `code` must already be normalized. Callers serialize redemptions per
    /// account, so the duplicate check and the redemption record cannot
    /// race for one account; the usage counter is guarded by the catalog
    /// entry lock, which keeps cross-account counting exact.
    pub(crate) fn reserve(&self, account_id: &str, code: &str) -> CasinoResult<PromoCode> {
        let redemption_key = (account_id.to_string(), code.to_string());
        if self.redemptions.contains_key(&redemption_key) {
            return Err(CasinoError::AlreadyRedeemed(code.to_string()));
        }

        let reserved = {
            let mut entry = self
                .catalog
                .get_mut(code)
                .ok_or_else(|| CasinoError::UnknownCode(code.to_string()))?;
            if entry.usage_count >= entry.usage_limit {
                return Err(CasinoError::UsageLimitExceeded(code.to_string()));
            }
            entry.usage_count += 1;
            entry.value().clone()
        };

        self.redemptions.insert(redemption_key, Utc::now());
        Ok(reserved)
    }

    /// Return a claim taken by [`reserve`](Self::reserve) whose balance
    /// effect could not be applied. Runs under the same per-account
    /// serialization as the reserve it undoes.
    pub(crate) fn release(&self, account_id: &str, code: &str) {
        let redemption_key = (account_id.to_string(), code.to_string());
        if self.redemptions.remove(&redemption_key).is_some() {
            if let Some(mut entry) = self.catalog.get_mut(code) {
                entry.usage_count = entry.usage_count.saturating_sub(1);
            }
        }
    }

    /// Look up a code, matching case-insensitively.
    pub fn get(&self, code: &str) -> Option<PromoCode> {
        self.catalog
            .get(&normalize_code(code))
            .map(|entry| entry.value().clone())
    }

    /// All codes, oldest first.
    pub fn codes(&self) -> Vec<PromoCode> {
        let mut codes: Vec<PromoCode> =
            self.catalog.iter().map(|entry| entry.value().clone()).collect();
        codes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.code.cmp(&b.code))
        });
        codes
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Load the built-in demo catalog, skipping codes that already exist.
    pub fn seed_demo_codes(&self) {
        for request in demo_codes() {
            match self.create_code(request) {
                Ok(promo) => tracing::debug!(code = %promo.code, "Seeded demo promo code"),
                Err(CasinoError::DuplicateCode(_)) => {}
                Err(err) => tracing::warn!(error = %err, "Skipping invalid demo promo code"),
            }
        }
    }
}

/// Demo catalog used by the `demo` preset and local development.
pub fn demo_codes() -> Vec<NewPromoCode> {
    use rust_decimal_macros::dec;

    vec![
        NewPromoCode {
            code: "WELCOME2025".to_string(),
            kind: PromoKind::BonusGrant,
            amount: dec!(1500),
            wager_multiplier: 20,
            usage_limit: 1000,
        },
        NewPromoCode {
            code: "DICE100".to_string(),
            kind: PromoKind::CashGrant,
            amount: dec!(100),
            wager_multiplier: 0,
            usage_limit: 500,
        },
        NewPromoCode {
            code: "FREESPIN".to_string(),
            kind: PromoKind::BonusGrant,
            amount: dec!(500),
            wager_multiplier: 15,
            usage_limit: 300,
        },
        NewPromoCode {
            code: "VIP2025".to_string(),
            kind: PromoKind::CashGrant,
            amount: dec!(250),
            wager_multiplier: 0,
            usage_limit: 200,
        },
        NewPromoCode {
            code: "LUCK777".to_string(),
            kind: PromoKind::BonusGrant,
            amount: dec!(777),
            wager_multiplier: 25,
            usage_limit: 100,
        },
        NewPromoCode {
            code: "FREE150".to_string(),
            kind: PromoKind::CashGrant,
            amount: dec!(150),
            wager_multiplier: 0,
            usage_limit: 1000,
        },
    ]
}
