//! Wallet store and ledger behaviour: idempotent creation, the balance floor, deposit settlement and the
//! balance-equals-ledger invariant.

use apg_common::Money;
use arena_payment_engine::{
    db_types::{DepositOutcome, TxDirection, TxStatus},
    objects::{DepositLimits, Pagination, SettleResult},
    SqliteDatabase,
    WalletApi,
    WalletApiError,
};

mod support;

/// `balance == Σ(success credits) − Σ(success debits)`, recomputed straight from the ledger.
async fn assert_ledger_invariant(db: &SqliteDatabase, wallet_id: i64) {
    let (ledger_balance,): (i64,) = sqlx::query_as(
        r#"SELECT COALESCE(SUM(CASE WHEN direction = 'Credit' THEN amount ELSE -amount END), 0)
           FROM wallet_transactions WHERE wallet_id = $1 AND status = 'Success'"#,
    )
    .bind(wallet_id)
    .fetch_one(db.pool())
    .await
    .expect("Error recomputing the ledger balance");
    let (stored_balance,): (i64,) = sqlx::query_as("SELECT balance FROM wallets WHERE id = $1")
        .bind(wallet_id)
        .fetch_one(db.pool())
        .await
        .expect("Error reading the wallet balance");
    assert_eq!(stored_balance, ledger_balance, "wallet balance has drifted from its ledger");
}

#[tokio::test]
async fn wallet_creation_is_idempotent() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db);
    let first = api.create_wallet("user-1").await.unwrap();
    let second = api.create_wallet("user-1").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.balance, Money::from(0));
}

#[tokio::test]
async fn balance_for_missing_wallet_is_not_an_error() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db);
    let result = api.balance("nobody").await.unwrap();
    assert!(!result.has_wallet);
    assert_eq!(result.balance, Money::from(0));
}

#[tokio::test]
async fn credit_with_same_reference_is_applied_once() {
    // Scenario D: the same webhook-style credit delivered twice lands exactly once.
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db.clone());
    let wallet = api.create_wallet("user-1").await.unwrap();

    let (_, applied) = api.credit(wallet.id, Money::from(500), "Deposit", "ORDER_X").await.unwrap();
    assert!(applied);
    let (entry, applied) = api.credit(wallet.id, Money::from(500), "Deposit", "ORDER_X").await.unwrap();
    assert!(!applied);
    assert_eq!(entry.amount, Money::from(500));

    assert_eq!(api.balance("user-1").await.unwrap().balance, Money::from(500));
    let history = api.history(wallet.id, &Pagination::default()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_ledger_invariant(&db, wallet.id).await;
}

#[tokio::test]
async fn debit_is_rejected_when_balance_is_short() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db.clone());
    let wallet = api.create_wallet("user-1").await.unwrap();
    api.credit(wallet.id, Money::from(50), "Deposit", "SEED_1").await.unwrap();

    let err = api.debit(wallet.id, Money::from(100), "Entry fee", "FEE_1").await.unwrap_err();
    match err {
        WalletApiError::InsufficientBalance { required, available } => {
            assert_eq!(required, Money::from(100));
            assert_eq!(available, Money::from(50));
        },
        e => panic!("Expected InsufficientBalance, got {e}"),
    }
    assert_eq!(api.balance("user-1").await.unwrap().balance, Money::from(50));
    assert_ledger_invariant(&db, wallet.id).await;
}

#[tokio::test]
async fn debit_replay_does_not_double_charge() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db.clone());
    let wallet = api.create_wallet("user-1").await.unwrap();
    api.credit(wallet.id, Money::from(300), "Deposit", "SEED_1").await.unwrap();

    let (_, applied) = api.debit(wallet.id, Money::from(100), "Entry fee", "FEE_1").await.unwrap();
    assert!(applied);
    let (_, applied) = api.debit(wallet.id, Money::from(100), "Entry fee", "FEE_1").await.unwrap();
    assert!(!applied);
    assert_eq!(api.balance("user-1").await.unwrap().balance, Money::from(200));
    assert_ledger_invariant(&db, wallet.id).await;
}

#[tokio::test]
async fn zero_and_negative_amounts_are_rejected() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db);
    let wallet = api.create_wallet("user-1").await.unwrap();
    assert!(matches!(
        api.credit(wallet.id, Money::from(0), "Nothing", "N_1").await.unwrap_err(),
        WalletApiError::InvalidAmount(_)
    ));
    assert!(matches!(
        api.debit(wallet.id, Money::from(-5), "Nothing", "N_2").await.unwrap_err(),
        WalletApiError::InvalidAmount(_)
    ));
}

#[tokio::test]
async fn deposit_webhook_replay_credits_exactly_once() {
    // Scenario D end to end: initiate, confirm, replay.
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db.clone());
    let wallet = api.create_wallet("user-1").await.unwrap();
    let limits = DepositLimits { min: Money::from(100), max: Money::from(1_000_000) };

    let pending = api.initiate_deposit("user-1", Money::from(500), &limits).await.unwrap();
    // Still pending: nothing on the balance yet
    assert_eq!(api.balance("user-1").await.unwrap().balance, Money::from(0));

    let settled = api.settle_deposit(&pending.order_id, Money::from(500), DepositOutcome::Paid).await.unwrap();
    assert!(matches!(settled, SettleResult::Credited(_)));
    assert_eq!(settled.entry().wallet_id, wallet.id);
    assert_eq!(api.balance("user-1").await.unwrap().balance, Money::from(500));

    let replay = api.settle_deposit(&pending.order_id, Money::from(500), DepositOutcome::Paid).await.unwrap();
    match replay {
        SettleResult::AlreadySettled(entry) => assert_eq!(entry.status, TxStatus::Success),
        other => panic!("Expected AlreadySettled, got {other:?}"),
    }
    assert_eq!(api.balance("user-1").await.unwrap().balance, Money::from(500));
    assert_ledger_invariant(&db, wallet.id).await;
}

#[tokio::test]
async fn deposit_amount_mismatch_fails_closed() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db.clone());
    let wallet = api.create_wallet("user-1").await.unwrap();
    let limits = DepositLimits { min: Money::from(100), max: Money::from(1_000_000) };
    let pending = api.initiate_deposit("user-1", Money::from(500), &limits).await.unwrap();

    let err = api.settle_deposit(&pending.order_id, Money::from(999), DepositOutcome::Paid).await.unwrap_err();
    assert!(matches!(err, WalletApiError::DepositAmountMismatch { .. }));

    // The entry is still pending and can settle correctly later
    let settled = api.settle_deposit(&pending.order_id, Money::from(500), DepositOutcome::Paid).await.unwrap();
    assert!(matches!(settled, SettleResult::Credited(_)));
    assert_ledger_invariant(&db, wallet.id).await;
}

#[tokio::test]
async fn failed_deposit_never_touches_the_balance() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db.clone());
    let wallet = api.create_wallet("user-1").await.unwrap();
    let limits = DepositLimits::default();
    let pending = api.initiate_deposit("user-1", Money::from_rupees(200), &limits).await.unwrap();

    let settled = api.settle_deposit(&pending.order_id, Money::from_rupees(200), DepositOutcome::Failed).await.unwrap();
    assert!(matches!(settled, SettleResult::MarkedFailed(_)));
    assert_eq!(api.balance("user-1").await.unwrap().balance, Money::from(0));
    assert_ledger_invariant(&db, wallet.id).await;
}

#[tokio::test]
async fn deposit_bounds_are_enforced() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db);
    api.create_wallet("user-1").await.unwrap();
    let limits = DepositLimits { min: Money::from_rupees(100), max: Money::from_rupees(50_000) };
    assert!(matches!(
        api.initiate_deposit("user-1", Money::from_rupees(99), &limits).await.unwrap_err(),
        WalletApiError::InvalidAmount(_)
    ));
    assert!(matches!(
        api.initiate_deposit("user-1", Money::from_rupees(50_001), &limits).await.unwrap_err(),
        WalletApiError::InvalidAmount(_)
    ));
}

#[tokio::test]
async fn history_is_newest_first_and_paginated() {
    let db = support::prepare_test_db().await;
    let api = WalletApi::new(db);
    let wallet = api.create_wallet("user-1").await.unwrap();
    for i in 0..5 {
        api.credit(wallet.id, Money::from(100 + i), "Deposit", format!("SEED_{i}").as_str()).await.unwrap();
    }
    let page = api.history(wallet.id, &Pagination::new(0, 3)).await.unwrap();
    assert_eq!(page.len(), 3);
    assert_eq!(page[0].amount, Money::from(104));
    assert!(page.iter().all(|e| e.direction == TxDirection::Credit));
    let rest = api.history(wallet.id, &Pagination::new(1, 3)).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[1].amount, Money::from(100));
}
