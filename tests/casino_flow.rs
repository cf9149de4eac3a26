//! End-to-end flows through the casino facade: betting, deposits and
//! withdrawals, promo redemption and wagering requirement conversion.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dicehouse::config::BonusConfig;
use dicehouse::{
    BonusStackingPolicy, Casino, CasinoError, ConfigBuilder, DicehouseConfig, FundingSource,
    NewPromoCode, PromoKind, RoundRng, TransactionKind, TransactionStatus, WagerProgressPolicy,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Rng that always returns the same roll.
struct ForcedRoll(u8);

impl RoundRng for ForcedRoll {
    fn next_roll(&self) -> u8 {
        self.0
    }
}

/// Rng that replays a fixed sequence of rolls.
struct RollSequence {
    rolls: Mutex<VecDeque<u8>>,
}

impl RollSequence {
    fn new(rolls: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            rolls: Mutex::new(rolls.iter().copied().collect()),
        })
    }
}

impl RoundRng for RollSequence {
    fn next_roll(&self) -> u8 {
        self.rolls
            .lock()
            .unwrap()
            .pop_front()
            .expect("roll sequence exhausted")
    }
}

fn casino_rolling(roll: u8) -> Casino {
    dicehouse::telemetry::try_init();
    Casino::with_rng(DicehouseConfig::default(), Arc::new(ForcedRoll(roll)))
        .expect("default config is valid")
}

fn demo_casino(roll: u8) -> Casino {
    dicehouse::telemetry::try_init();
    Casino::with_rng(DicehouseConfig::demo(), Arc::new(ForcedRoll(roll)))
        .expect("demo config is valid")
}

#[tokio::test]
async fn test_forced_win_pays_reference_amounts() {
    let casino = casino_rolling(12);
    casino.apply_deposit("alice", dec!(1000)).await.unwrap();

    let receipt = casino
        .place_bet("alice", dec!(10), 50, FundingSource::Cash)
        .await
        .unwrap();

    assert!(receipt.is_win);
    assert_eq!(receipt.payout_multiplier, dec!(1.90));
    assert_eq!(receipt.new_cash_balance, dec!(1009.00));
    assert_eq!(receipt.new_bonus_balance, dec!(0));
    assert_eq!(receipt.new_wager_remaining, dec!(0));
}

#[tokio::test]
async fn test_forced_loss_debits_stake_only() {
    let casino = casino_rolling(80);
    casino.apply_deposit("alice", dec!(1000)).await.unwrap();

    let receipt = casino
        .place_bet("alice", dec!(10), 50, FundingSource::Cash)
        .await
        .unwrap();

    assert!(!receipt.is_win);
    assert_eq!(receipt.new_cash_balance, dec!(990));
}

#[tokio::test]
async fn test_exact_balance_stake_is_accepted() {
    let casino = casino_rolling(99);
    casino.apply_deposit("alice", dec!(10)).await.unwrap();

    let receipt = casino
        .place_bet("alice", dec!(10), 50, FundingSource::Cash)
        .await
        .unwrap();
    assert_eq!(receipt.new_cash_balance, dec!(0));

    let err = casino
        .place_bet("alice", dec!(0.01), 50, FundingSource::Cash)
        .await
        .unwrap_err();
    assert!(matches!(err, CasinoError::InsufficientFunds { .. }));
}

#[tokio::test]
async fn test_invalid_bets_are_rejected_before_any_effect() {
    let casino = casino_rolling(1);
    casino.apply_deposit("alice", dec!(100)).await.unwrap();

    for bad_probability in [0u8, 96, 100] {
        let err = casino
            .place_bet("alice", dec!(10), bad_probability, FundingSource::Cash)
            .await
            .unwrap_err();
        assert_eq!(err, CasinoError::InvalidProbability(bad_probability));
    }
    for bad_stake in [dec!(0), dec!(-5)] {
        let err = casino
            .place_bet("alice", bad_stake, 50, FundingSource::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, CasinoError::InvalidAmount { .. }));
    }

    assert_eq!(casino.account_snapshot("alice").await.cash_balance, dec!(100));
    // Only the deposit is on record.
    assert_eq!(casino.history().for_account("alice").len(), 1);
}

#[tokio::test]
async fn test_concurrent_bets_on_one_account_never_overdraw() {
    let casino = Arc::new(casino_rolling(99));
    casino.apply_deposit("alice", dec!(100)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let casino = Arc::clone(&casino);
        handles.push(tokio::spawn(async move {
            casino
                .place_bet("alice", dec!(10), 50, FundingSource::Cash)
                .await
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                assert!(!receipt.is_win);
                accepted += 1;
            }
            Err(CasinoError::InsufficientFunds { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(rejected, 40);
    assert_eq!(casino.account_snapshot("alice").await.cash_balance, dec!(0));
    assert_eq!(casino.history().by_kind(TransactionKind::Wager).len(), 10);
}

#[tokio::test]
async fn test_parallel_accounts_settle_independently() {
    let casino = Arc::new(casino_rolling(99));

    let mut handles = Vec::new();
    for i in 0..8 {
        let casino = Arc::clone(&casino);
        handles.push(tokio::spawn(async move {
            let account = format!("player-{i}");
            casino.apply_deposit(&account, dec!(1000)).await.unwrap();
            casino
                .place_bet(&account, dec!(10), 50, FundingSource::Cash)
                .await
                .unwrap()
        }));
    }

    for result in futures::future::join_all(handles).await {
        let receipt = result.unwrap();
        assert_eq!(receipt.new_cash_balance, dec!(990));
    }
}

#[tokio::test]
async fn test_wagering_requirement_conversion_flow() {
    let casino = casino_rolling(99);
    casino.grant_bonus("alice", dec!(1500), 20).await.unwrap();
    casino.apply_deposit("alice", dec!(30000)).await.unwrap();

    for _ in 0..30 {
        casino
            .place_bet("alice", dec!(1000), 50, FundingSource::Cash)
            .await
            .unwrap();
    }

    let snapshot = casino.account_snapshot("alice").await;
    assert_eq!(snapshot.cash_balance, dec!(1500));
    assert_eq!(snapshot.bonus_balance, dec!(0));
    assert_eq!(snapshot.bonus_wager_remaining, dec!(0));

    let grants = casino.history().by_kind(TransactionKind::BonusGrant);
    assert_eq!(grants.len(), 2);
    assert_eq!(grants[1].amount, dec!(1500));
    assert!(grants[1].details.contains("converted to cash"));
}

#[tokio::test]
async fn test_promo_redemption_is_idempotent_per_account() {
    let casino = demo_casino(0);

    let receipt = casino.redeem_promo_code("alice", "welcome2025").await.unwrap();
    assert_eq!(receipt.code, "WELCOME2025");
    assert_eq!(receipt.new_bonus_balance, dec!(1500));
    assert_eq!(receipt.new_wager_remaining, dec!(30000));

    let err = casino
        .redeem_promo_code("alice", "WELCOME2025")
        .await
        .unwrap_err();
    assert_eq!(err, CasinoError::AlreadyRedeemed("WELCOME2025".to_string()));

    let snapshot = casino.account_snapshot("alice").await;
    assert_eq!(snapshot.bonus_balance, dec!(1500));
    assert_eq!(snapshot.bonus_wager_remaining, dec!(30000));
}

#[tokio::test]
async fn test_promo_usage_limit_across_accounts() {
    let casino = casino_rolling(0);
    casino
        .create_promo_code(
            "admin",
            NewPromoCode {
                code: "ONCE".to_string(),
                kind: PromoKind::CashGrant,
                amount: dec!(25),
                wager_multiplier: 0,
                usage_limit: 1,
            },
        )
        .unwrap();

    casino.redeem_promo_code("alice", "ONCE").await.unwrap();

    let err = casino.redeem_promo_code("bob", "ONCE").await.unwrap_err();
    assert_eq!(err, CasinoError::UsageLimitExceeded("ONCE".to_string()));
    assert_eq!(casino.account_snapshot("bob").await.cash_balance, dec!(0));

    let err = casino.redeem_promo_code("bob", "NOPE").await.unwrap_err();
    assert_eq!(err, CasinoError::UnknownCode("NOPE".to_string()));
}

#[tokio::test]
async fn test_concurrent_duplicate_redemptions_credit_once() {
    let casino = Arc::new(demo_casino(0));

    let mut handles = Vec::new();
    for _ in 0..32 {
        let casino = Arc::clone(&casino);
        handles.push(tokio::spawn(async move {
            casino.redeem_promo_code("alice", "WELCOME2025").await
        }));
    }

    let mut succeeded = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(receipt) => {
                succeeded += 1;
                assert_eq!(receipt.new_bonus_balance, dec!(1500));
            }
            Err(CasinoError::AlreadyRedeemed(code)) => assert_eq!(code, "WELCOME2025"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(succeeded, 1);

    let snapshot = casino.account_snapshot("alice").await;
    assert_eq!(snapshot.bonus_balance, dec!(1500));
    assert_eq!(snapshot.bonus_wager_remaining, dec!(30000));

    let welcome = casino
        .promo_codes()
        .into_iter()
        .find(|promo| promo.code == "WELCOME2025")
        .unwrap();
    assert_eq!(welcome.usage_count, 1);
    assert_eq!(casino.history().by_kind(TransactionKind::BonusGrant).len(), 1);
}

#[tokio::test]
async fn test_concurrent_usage_limit_race_admits_one() {
    let casino = Arc::new(casino_rolling(0));
    casino
        .create_promo_code(
            "admin",
            NewPromoCode {
                code: "SOLO25".to_string(),
                kind: PromoKind::CashGrant,
                amount: dec!(25),
                wager_multiplier: 0,
                usage_limit: 1,
            },
        )
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let casino = Arc::clone(&casino);
        handles.push(tokio::spawn(async move {
            let account = format!("racer-{i}");
            let outcome = casino.redeem_promo_code(&account, "SOLO25").await;
            (account, outcome)
        }));
    }

    let mut winners = Vec::new();
    for result in futures::future::join_all(handles).await {
        let (account, outcome) = result.unwrap();
        match outcome {
            Ok(_) => winners.push(account),
            Err(CasinoError::UsageLimitExceeded(code)) => assert_eq!(code, "SOLO25"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners.len(), 1);

    // Only the winner is credited and the counter stops at the limit.
    for i in 0..32 {
        let account = format!("racer-{i}");
        let expected = if winners.contains(&account) { dec!(25) } else { dec!(0) };
        assert_eq!(casino.account_snapshot(&account).await.cash_balance, expected);
    }
    let promo = casino
        .promo_codes()
        .into_iter()
        .find(|promo| promo.code == "SOLO25")
        .unwrap();
    assert_eq!(promo.usage_count, 1);
}

#[tokio::test]
async fn test_failed_redemption_releases_the_claim() {
    let casino = demo_casino(0);
    casino.apply_deposit("alice", Decimal::MAX).await.unwrap();

    // The grant does not fit, so the redemption is rejected and the
    // account keeps its claim on the code.
    let err = casino.redeem_promo_code("alice", "DICE100").await.unwrap_err();
    assert!(matches!(err, CasinoError::InvalidAmount { .. }));
    assert_eq!(casino.account_snapshot("alice").await.cash_balance, Decimal::MAX);

    casino
        .request_withdrawal("alice", dec!(1000), "bank-ref-1")
        .await
        .unwrap();

    let receipt = casino.redeem_promo_code("alice", "DICE100").await.unwrap();
    assert_eq!(receipt.kind, PromoKind::CashGrant);
    assert_eq!(receipt.amount, dec!(100));

    let promo = casino
        .promo_codes()
        .into_iter()
        .find(|promo| promo.code == "DICE100")
        .unwrap();
    assert_eq!(promo.usage_count, 1);
}

#[tokio::test]
async fn test_duplicate_promo_code_rejected() {
    let casino = casino_rolling(0);
    let request = NewPromoCode {
        code: "REPEAT".to_string(),
        kind: PromoKind::CashGrant,
        amount: dec!(10),
        wager_multiplier: 0,
        usage_limit: 5,
    };
    casino.create_promo_code("admin", request.clone()).unwrap();

    let mut lowercase = request;
    lowercase.code = "repeat".to_string();
    let err = casino.create_promo_code("admin", lowercase).unwrap_err();
    assert_eq!(err, CasinoError::DuplicateCode("REPEAT".to_string()));
}

#[tokio::test]
async fn test_withdrawal_lifecycle() {
    let casino = casino_rolling(0);
    casino.apply_deposit("alice", dec!(2000)).await.unwrap();

    // Below the default 500 minimum.
    let err = casino
        .request_withdrawal("alice", dec!(100), "card-1234")
        .await
        .unwrap_err();
    assert!(matches!(err, CasinoError::BelowMinimum { .. }));

    let err = casino
        .request_withdrawal("alice", dec!(5000), "card-1234")
        .await
        .unwrap_err();
    assert!(matches!(err, CasinoError::InsufficientFunds { .. }));

    let first = casino
        .request_withdrawal("alice", dec!(600), "card-1234")
        .await
        .unwrap();
    assert_eq!(first.status, TransactionStatus::Pending);
    assert!(first.details.contains("card-1234"));
    assert_eq!(casino.account_snapshot("alice").await.cash_balance, dec!(1400));

    let confirmed = casino.confirm_withdrawal(first.id).await.unwrap();
    assert_eq!(confirmed.status, TransactionStatus::Completed);

    let second = casino
        .request_withdrawal("alice", dec!(700), "wallet-9")
        .await
        .unwrap();
    assert_eq!(casino.account_snapshot("alice").await.cash_balance, dec!(700));

    let failed = casino
        .reject_withdrawal(second.id, "card declined")
        .await
        .unwrap();
    assert_eq!(failed.status, TransactionStatus::Failed);
    assert!(failed.details.contains("card declined"));
    assert_eq!(casino.account_snapshot("alice").await.cash_balance, dec!(1400));

    // Terminal entries stay terminal.
    assert!(matches!(
        casino.confirm_withdrawal(second.id).await,
        Err(CasinoError::InvariantViolation(_))
    ));
    assert!(matches!(
        casino.reject_withdrawal(first.id, "too late").await,
        Err(CasinoError::InvariantViolation(_))
    ));
    assert_eq!(casino.account_snapshot("alice").await.cash_balance, dec!(1400));
}

#[tokio::test]
async fn test_bonus_funded_play_after_promo() {
    dicehouse::telemetry::try_init();
    let casino = Casino::with_rng(
        DicehouseConfig::demo(),
        RollSequence::new(&[99, 12]),
    )
    .expect("demo config is valid");

    casino.redeem_promo_code("alice", "WELCOME2025").await.unwrap();

    let loss = casino
        .place_bet("alice", dec!(500), 50, FundingSource::Bonus)
        .await
        .unwrap();
    assert!(!loss.is_win);
    assert_eq!(loss.new_bonus_balance, dec!(1000));
    assert_eq!(loss.new_wager_remaining, dec!(29500));

    let win = casino
        .place_bet("alice", dec!(500), 50, FundingSource::Bonus)
        .await
        .unwrap();
    assert!(win.is_win);
    // 1000 - 500 stake + 950 winnings.
    assert_eq!(win.new_bonus_balance, dec!(1450));
    assert_eq!(win.new_wager_remaining, dec!(29000));
    assert_eq!(win.new_cash_balance, dec!(0));
}

#[tokio::test]
async fn test_bonus_funded_only_policy_skips_cash_stakes() {
    dicehouse::telemetry::try_init();
    let config = ConfigBuilder::new()
        .bonus(BonusConfig {
            wager_progress: WagerProgressPolicy::BonusFundedOnly,
            stacking: BonusStackingPolicy::Accumulate,
        })
        .build();
    let casino = Casino::with_rng(config, Arc::new(ForcedRoll(99))).expect("config is valid");

    casino.grant_bonus("alice", dec!(100), 10).await.unwrap();
    casino.apply_deposit("alice", dec!(100)).await.unwrap();

    let receipt = casino
        .place_bet("alice", dec!(50), 50, FundingSource::Cash)
        .await
        .unwrap();
    assert_eq!(receipt.new_wager_remaining, dec!(1000));

    let receipt = casino
        .place_bet("alice", dec!(50), 50, FundingSource::Bonus)
        .await
        .unwrap();
    assert_eq!(receipt.new_wager_remaining, dec!(950));
}

#[tokio::test]
async fn test_history_records_net_amounts() {
    let casino = Casino::with_rng(
        DicehouseConfig::default(),
        RollSequence::new(&[12, 80]),
    )
    .expect("default config is valid");
    casino.apply_deposit("alice", dec!(1000)).await.unwrap();

    casino
        .place_bet("alice", dec!(10), 50, FundingSource::Cash)
        .await
        .unwrap();
    casino
        .place_bet("alice", dec!(10), 50, FundingSource::Cash)
        .await
        .unwrap();

    let entries = casino.history().for_account("alice");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].amount, dec!(1000));
    assert_eq!(entries[1].amount, dec!(9.00));
    assert_eq!(entries[2].amount, dec!(-10));
    assert!(entries.iter().all(|tx| tx.status == TransactionStatus::Completed));
}

#[tokio::test]
async fn test_receipts_serialize_for_transport() {
    let casino = casino_rolling(12);
    casino.apply_deposit("alice", dec!(1000)).await.unwrap();

    let receipt = casino
        .place_bet("alice", dec!(10), 50, FundingSource::Cash)
        .await
        .unwrap();
    let json = serde_json::to_value(&receipt).unwrap();
    assert_eq!(json["is_win"], true);
    assert_eq!(json["outcome_roll"], 12);
    assert_eq!(json["payout_multiplier"], "1.90");
    assert_eq!(json["new_cash_balance"], "1009.00");

    let snapshot = casino.account_snapshot("alice").await;
    let json = serde_json::to_value(snapshot).unwrap();
    assert_eq!(json["cash_balance"], "1009.00");
}
