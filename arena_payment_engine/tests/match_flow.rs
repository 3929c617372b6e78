//! The entry-fee transaction flows: join, leave, capacity races, results settlement, cancellation and the
//! lifecycle sweep.

use apg_common::Money;
use arena_payment_engine::{
    db_types::{MatchStatus, NewMatch},
    prize::{AwardRecipient, CustomReward, PrizeDistribution, ResultsSubmission, SquadStanding},
    MatchFlowApi,
    MatchFlowError,
    SqliteDatabase,
    WalletApi,
    WalletApiError,
};
use chrono::{Duration, Utc};

mod support;

async fn funded_user(wallets: &WalletApi<SqliteDatabase>, user_id: &str, amount: i64) -> i64 {
    let wallet = wallets.create_wallet(user_id).await.unwrap();
    if amount > 0 {
        wallets.credit(wallet.id, Money::from(amount), "Top up", &format!("SEED_{user_id}")).await.unwrap();
    }
    wallet.id
}

fn upcoming_match(fee: i64, max_players: i64) -> NewMatch {
    NewMatch::new("Erangel Scrims", Money::from(fee), max_players, Utc::now() + Duration::hours(1))
}

fn standing(squad: &str, user: &str, kills: i64) -> SquadStanding {
    SquadStanding { squad_id: squad.into(), user_id: user.into(), kills }
}

#[tokio::test]
async fn join_debits_the_exact_fee_and_registers() {
    // Scenario A: balance 100, fee 100
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 100).await;
    let m = matches.create_match(upcoming_match(100, 10)).await.unwrap();

    let outcome = matches.join_match(m.id, "user-1", Some("squad-7")).await.unwrap();
    assert_eq!(outcome.new_balance, Money::from(0));
    assert!(outcome.registration.fee_paid);
    assert_eq!(outcome.registration.squad_id.as_deref(), Some("squad-7"));
    assert!(outcome.payment_reference.is_some());

    let (_, joined) = matches.match_details(m.id).await.unwrap().unwrap();
    assert_eq!(joined, 1);
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(0));
}

#[tokio::test]
async fn join_fails_without_funds_and_changes_nothing() {
    // Scenario B: balance 50, fee 100
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 50).await;
    let m = matches.create_match(upcoming_match(100, 10)).await.unwrap();

    let err = matches.join_match(m.id, "user-1", None).await.unwrap_err();
    match err {
        MatchFlowError::Wallet(WalletApiError::InsufficientBalance { required, available }) => {
            assert_eq!(required, Money::from(100));
            assert_eq!(available, Money::from(50));
        },
        e => panic!("Expected InsufficientBalance, got {e}"),
    }
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(50));
    let (_, joined) = matches.match_details(m.id).await.unwrap().unwrap();
    assert_eq!(joined, 0);
}

#[tokio::test]
async fn join_requires_a_wallet() {
    let db = support::prepare_test_db().await;
    let matches = MatchFlowApi::new(db);
    let m = matches.create_match(upcoming_match(100, 10)).await.unwrap();
    assert!(matches!(matches.join_match(m.id, "walletless", None).await.unwrap_err(), MatchFlowError::NoWallet(_)));
}

#[tokio::test]
async fn double_join_is_rejected() {
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 500).await;
    let m = matches.create_match(upcoming_match(100, 10)).await.unwrap();

    matches.join_match(m.id, "user-1", None).await.unwrap();
    let err = matches.join_match(m.id, "user-1", None).await.unwrap_err();
    assert!(matches!(err, MatchFlowError::AlreadyRegistered { .. }));
    // Only one fee charged
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(400));
}

#[tokio::test]
async fn concurrent_joins_cannot_overfill_the_last_slot() {
    // Scenario C: two funded users race for a single slot; exactly one wins.
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db.clone());
    funded_user(&wallets, "user-1", 100).await;
    funded_user(&wallets, "user-2", 100).await;
    let m = matches.create_match(upcoming_match(100, 1)).await.unwrap();

    let api_a = MatchFlowApi::new(db.clone());
    let api_b = MatchFlowApi::new(db.clone());
    let match_id = m.id;
    let a = tokio::spawn(async move { api_a.join_match(match_id, "user-1", None).await });
    let b = tokio::spawn(async move { api_b.join_match(match_id, "user-2", None).await });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one join must succeed");
    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(loser, MatchFlowError::MatchFull(_)), "the loser must see Full, got {loser}");

    // The loser's fee rolled back with its transaction
    let balances = (
        wallets.balance("user-1").await.unwrap().balance,
        wallets.balance("user-2").await.unwrap().balance,
    );
    assert_eq!(balances.0 + balances.1, Money::from(100));
    let (_, joined) = matches.match_details(match_id).await.unwrap().unwrap();
    assert_eq!(joined, 1);
}

#[tokio::test]
async fn leave_refunds_once_and_round_trips_the_balance() {
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 250).await;
    let m = matches.create_match(upcoming_match(100, 10)).await.unwrap();

    matches.join_match(m.id, "user-1", None).await.unwrap();
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(150));

    let refunded = matches.leave_match(m.id, "user-1").await.unwrap();
    assert_eq!(refunded, Money::from(100));
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(250));
    let (_, joined) = matches.match_details(m.id).await.unwrap().unwrap();
    assert_eq!(joined, 0);

    // A second leave finds no registration; nothing more is refunded
    let err = matches.leave_match(m.id, "user-1").await.unwrap_err();
    assert!(matches!(err, MatchFlowError::NotRegistered { .. }));
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(250));
}

#[tokio::test]
async fn leaving_a_completed_match_is_rejected() {
    // Scenario F
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 100).await;
    let m = matches.create_match(upcoming_match(100, 10)).await.unwrap();
    matches.join_match(m.id, "user-1", None).await.unwrap();

    let submission = ResultsSubmission { standings: vec![standing("squad-1", "user-1", 0)], special_awards: vec![] };
    matches.upload_results(m.id, submission).await.unwrap();

    let err = matches.leave_match(m.id, "user-1").await.unwrap_err();
    match err {
        MatchFlowError::InvalidState { status, .. } => assert_eq!(status, MatchStatus::Completed),
        e => panic!("Expected InvalidState, got {e}"),
    }
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(0));
}

#[tokio::test]
async fn joining_a_live_match_is_rejected() {
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 100).await;
    let m = matches
        .create_match(NewMatch::new("Started already", Money::from(100), 10, Utc::now() - Duration::minutes(5)))
        .await
        .unwrap();

    let swept = matches.auto_update_statuses(Duration::hours(2)).await.unwrap();
    assert_eq!(swept.started, 1);

    let err = matches.join_match(m.id, "user-1", None).await.unwrap_err();
    match err {
        MatchFlowError::InvalidState { status, .. } => assert_eq!(status, MatchStatus::Live),
        e => panic!("Expected InvalidState, got {e}"),
    }
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(100));
}

#[tokio::test]
async fn results_settlement_pays_rank_and_capped_kill_rewards() {
    // Scenario E: ranks [3000, 1500, 800], 50 per kill capped at 10, winner has 12 kills
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 0).await;
    let distribution = PrizeDistribution {
        rank_rewards: vec![Money::from(3000), Money::from(1500), Money::from(800)],
        per_kill: Money::from(50),
        max_kills: 10,
        custom_rewards: vec![CustomReward { name: "MVP".into(), amount: Money::from(500) }],
    };
    let new_match = NewMatch::new("Finals", Money::from(0), 32, Utc::now() + Duration::hours(1))
        .with_prizes(Money::from(10_000), distribution);
    let m = matches.create_match(new_match).await.unwrap();

    let submission = ResultsSubmission {
        standings: vec![standing("alpha", "user-1", 12), standing("bravo", "user-2", 3)],
        special_awards: vec![AwardRecipient { name: "MVP".into(), user_id: "user-2".into() }],
    };
    let (completed, prizes) = matches.upload_results(m.id, submission).await.unwrap();
    assert_eq!(completed.status, MatchStatus::Completed);
    assert_eq!(prizes.total, Money::from(3500 + 1650 + 500));

    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(3500));
    // user-2 had no wallet; one was created to receive rank 2 + kills + MVP
    let user2 = wallets.balance("user-2").await.unwrap();
    assert!(user2.has_wallet);
    assert_eq!(user2.balance, Money::from(1500 + 150 + 500));

    // Results are terminal
    let replay = ResultsSubmission { standings: vec![standing("alpha", "user-1", 12)], special_awards: vec![] };
    let err = matches.upload_results(m.id, replay).await.unwrap_err();
    assert!(matches!(err, MatchFlowError::ResultsAlreadyUploaded(_)));
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(3500));
}

#[tokio::test]
async fn overcommitted_payouts_are_rejected_before_any_credit() {
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 0).await;
    let distribution = PrizeDistribution {
        rank_rewards: vec![Money::from(1000)],
        per_kill: Money::from(100),
        max_kills: 50,
        custom_rewards: vec![],
    };
    let new_match = NewMatch::new("Tight pool", Money::from(0), 32, Utc::now() + Duration::hours(1))
        .with_prizes(Money::from(1200), distribution);
    let m = matches.create_match(new_match).await.unwrap();

    // 1000 + 30 * 100 blows through the 1200 pool
    let submission = ResultsSubmission { standings: vec![standing("alpha", "user-1", 30)], special_awards: vec![] };
    let err = matches.upload_results(m.id, submission).await.unwrap_err();
    assert!(matches!(err, MatchFlowError::PrizeExceedsPool { .. }));
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(0));
    // The match is still open for a corrected upload
    let (m, _) = matches.match_details(m.id).await.unwrap().unwrap();
    assert!(m.results.is_none());
}

#[tokio::test]
async fn oversized_prize_configuration_is_rejected_at_creation() {
    let db = support::prepare_test_db().await;
    let matches = MatchFlowApi::new(db);
    let distribution = PrizeDistribution {
        rank_rewards: vec![Money::from(3000), Money::from(1500)],
        per_kill: Money::from(0),
        max_kills: 0,
        custom_rewards: vec![],
    };
    let new_match = NewMatch::new("Overcommitted", Money::from(0), 32, Utc::now() + Duration::hours(1))
        .with_prizes(Money::from(4000), distribution);
    let err = matches.create_match(new_match).await.unwrap_err();
    assert!(matches!(err, MatchFlowError::PrizeConfig(_)));
}

#[tokio::test]
async fn prize_configuration_can_change_only_while_upcoming() {
    let db = support::prepare_test_db().await;
    let matches = MatchFlowApi::new(db);
    let m = matches.create_match(upcoming_match(0, 10)).await.unwrap();

    let distribution = PrizeDistribution {
        rank_rewards: vec![Money::from(1000), Money::from(500)],
        per_kill: Money::from(10),
        max_kills: 20,
        custom_rewards: vec![],
    };
    let updated =
        matches.update_prize_distribution(m.id, Money::from(2000), distribution.clone()).await.unwrap();
    assert_eq!(updated.prize_pool, Money::from(2000));
    assert_eq!(updated.prize_distribution.0.rank_rewards.len(), 2);

    // Rewards above the pool are rejected at the mutation boundary
    let err = matches.update_prize_distribution(m.id, Money::from(1200), distribution.clone()).await.unwrap_err();
    assert!(matches!(err, MatchFlowError::PrizeConfig(_)));

    // Once live, the configuration is frozen
    let stale =
        matches.create_match(NewMatch::new("Late", Money::from(0), 10, Utc::now() - Duration::minutes(1))).await.unwrap();
    matches.auto_update_statuses(Duration::hours(2)).await.unwrap();
    let err = matches.update_prize_distribution(stale.id, Money::from(2000), distribution).await.unwrap_err();
    assert!(matches!(err, MatchFlowError::InvalidState { .. }));
}

#[tokio::test]
async fn cancellation_refunds_every_paid_registration() {
    let db = support::prepare_test_db().await;
    let wallets = WalletApi::new(db.clone());
    let matches = MatchFlowApi::new(db);
    funded_user(&wallets, "user-1", 100).await;
    funded_user(&wallets, "user-2", 150).await;
    let m = matches.create_match(upcoming_match(100, 10)).await.unwrap();
    matches.join_match(m.id, "user-1", None).await.unwrap();
    matches.join_match(m.id, "user-2", None).await.unwrap();

    let (cancelled, refunds) = matches.cancel_match(m.id).await.unwrap();
    assert_eq!(cancelled.status, MatchStatus::Cancelled);
    assert_eq!(refunds.len(), 2);
    assert_eq!(wallets.balance("user-1").await.unwrap().balance, Money::from(100));
    assert_eq!(wallets.balance("user-2").await.unwrap().balance, Money::from(150));

    // Cancellation is terminal
    let err = matches.cancel_match(m.id).await.unwrap_err();
    assert!(matches!(err, MatchFlowError::InvalidState { .. }));
}

#[tokio::test]
async fn sweep_is_re_entrant_and_walks_the_lifecycle() {
    let db = support::prepare_test_db().await;
    let matches = MatchFlowApi::new(db);
    matches
        .create_match(NewMatch::new("Old scrims", Money::from(0), 10, Utc::now() - Duration::hours(3)))
        .await
        .unwrap();
    matches.create_match(upcoming_match(0, 10)).await.unwrap();

    // 3 hours past start with a 2 hour live window: the old match starts and completes in one pass
    let first = matches.auto_update_statuses(Duration::hours(2)).await.unwrap();
    assert_eq!(first.started, 1);
    assert_eq!(first.completed, 1);

    // Nothing left to do
    let second = matches.auto_update_statuses(Duration::hours(2)).await.unwrap();
    assert_eq!(second.started, 0);
    assert_eq!(second.completed, 0);

    let upcoming = matches.list_matches(Some(MatchStatus::Upcoming)).await.unwrap();
    assert_eq!(upcoming.len(), 1);
    let completed = matches.list_matches(Some(MatchStatus::Completed)).await.unwrap();
    assert_eq!(completed.len(), 1);
}
