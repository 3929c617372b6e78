//! `SqliteDatabase` is a concrete implementation of an Arena Payment Engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the traits defined in the [`crate::traits`] module.
//!
//! The compound flows (join, leave, results settlement, cancellation) each run inside a single pool transaction.
//! Their first statement is a no-op `UPDATE` on the anchor row, which takes SQLite's write lock before any check is
//! evaluated; concurrent transactions on the same match or wallet queue up behind it instead of racing the
//! check-then-write sequence.
use std::{collections::BTreeMap, fmt::Debug};

use apg_common::Money;
use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{db_url, ledger, matches, new_pool, registrations, wallets};
use crate::{
    db_types::{
        DepositOutcome,
        LedgerEntry,
        Match,
        MatchStatus,
        NewLedgerEntry,
        NewMatch,
        Registration,
        TxStatus,
        Wallet,
        WalletStatus,
    },
    helpers,
    objects::{JoinOutcome, Pagination, RefundRecord, SettleResult, SweepResult},
    prize,
    prize::{ComputedPrizes, MatchResults, PrizeDistribution, ResultsSubmission},
    traits::{MatchFlowError, MatchManagement, WalletApiError, WalletManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Idempotent; the server calls this once at startup.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// First statement of every compound wallet flow: takes the write lock on the wallet row before any balance
    /// check is evaluated. Returns `false` when the wallet does not exist.
    async fn lock_wallet_row(wallet_id: i64, conn: &mut SqliteConnection) -> Result<bool, WalletApiError> {
        let result = sqlx::query("UPDATE wallets SET updated_at = updated_at WHERE id = $1")
            .bind(wallet_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Same idea for matches; the status/capacity gates that follow can then not race a concurrent joiner or the
    /// lifecycle sweep.
    async fn lock_match_row(match_id: i64, conn: &mut SqliteConnection) -> Result<bool, MatchFlowError> {
        let result = sqlx::query("UPDATE matches SET updated_at = updated_at WHERE id = $1")
            .bind(match_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Issues an idempotent refund credit inside the caller's transaction. Returns the refunded amount, zero when
    /// the refund reference had already settled.
    async fn refund_registration(
        reg: &Registration,
        amount: Money,
        match_name: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Money, MatchFlowError> {
        let Some(wallet) = wallets::fetch_wallet_for_user(&reg.user_id, conn).await? else {
            warn!(
                "🗃️ User {} paid for registration #{} but has no wallet to refund. Flagging for reconciliation.",
                reg.user_id, reg.id
            );
            return Ok(Money::default());
        };
        let original = reg
            .payment_reference
            .clone()
            .unwrap_or_else(|| format!("MATCH_{}_REG_{}", reg.match_id, reg.id));
        let reference = helpers::refund_reference(&original);
        let entry = NewLedgerEntry::credit(
            wallet.id,
            amount,
            format!("Refund of entry fee for match {match_name}"),
            reference,
        )
        .with_method("wallet");
        let (_, created) = ledger::idempotent_insert(entry, &mut *conn).await?;
        if created {
            wallets::apply_credit(wallet.id, amount, false, conn).await?;
            Ok(amount)
        } else {
            Ok(Money::default())
        }
    }
}

impl WalletManagement for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_wallet(&self, user_id: &str) -> Result<(Wallet, bool), WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        wallets::idempotent_create(user_id, &mut conn).await
    }

    async fn fetch_wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet(wallet_id, &mut conn).await
    }

    async fn fetch_wallet_for_user(&self, user_id: &str) -> Result<Option<Wallet>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet_for_user(user_id, &mut conn).await
    }

    async fn credit_money(
        &self,
        wallet_id: i64,
        amount: Money,
        description: &str,
        reference: &str,
    ) -> Result<(LedgerEntry, bool), WalletApiError> {
        if !amount.is_positive() {
            return Err(WalletApiError::InvalidAmount(format!("Credit amount must be positive, got {amount}")));
        }
        let mut tx = self.pool.begin().await?;
        if !Self::lock_wallet_row(wallet_id, &mut tx).await? {
            return Err(WalletApiError::WalletNotFound(wallet_id));
        }
        let entry = NewLedgerEntry::credit(wallet_id, amount, description, reference);
        let (entry, created) = ledger::idempotent_insert(entry, &mut tx).await?;
        if created {
            wallets::apply_credit(wallet_id, amount, false, &mut tx).await?;
            debug!("🗃️ Credited {amount} to wallet #{wallet_id} [{reference}]");
        } else {
            debug!("🗃️ Credit replay for wallet #{wallet_id} [{reference}]; no balance change");
        }
        tx.commit().await?;
        Ok((entry, created))
    }

    async fn debit_money(
        &self,
        wallet_id: i64,
        amount: Money,
        description: &str,
        reference: &str,
    ) -> Result<(LedgerEntry, bool), WalletApiError> {
        if !amount.is_positive() {
            return Err(WalletApiError::InvalidAmount(format!("Debit amount must be positive, got {amount}")));
        }
        let mut tx = self.pool.begin().await?;
        if !Self::lock_wallet_row(wallet_id, &mut tx).await? {
            return Err(WalletApiError::WalletNotFound(wallet_id));
        }
        if let Some(existing) = ledger::fetch_by_reference(wallet_id, reference, &mut tx).await? {
            debug!("🗃️ Debit replay for wallet #{wallet_id} [{reference}]; no balance change");
            tx.commit().await?;
            return Ok((existing, false));
        }
        if !wallets::debit_with_floor(wallet_id, amount, &mut tx).await? {
            let wallet = wallets::fetch_wallet(wallet_id, &mut tx)
                .await?
                .ok_or(WalletApiError::WalletNotFound(wallet_id))?;
            return match wallet.status {
                WalletStatus::Closed => Err(WalletApiError::WalletClosed(wallet_id)),
                WalletStatus::Active => {
                    Err(WalletApiError::InsufficientBalance { required: amount, available: wallet.balance })
                },
            };
        }
        let entry = NewLedgerEntry::debit(wallet_id, amount, description, reference);
        let (entry, _) = ledger::idempotent_insert(entry, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Debited {amount} from wallet #{wallet_id} [{reference}]");
        Ok((entry, true))
    }

    async fn record_pending_deposit(
        &self,
        wallet_id: i64,
        amount: Money,
        order_id: &str,
    ) -> Result<LedgerEntry, WalletApiError> {
        if !amount.is_positive() {
            return Err(WalletApiError::InvalidAmount(format!("Deposit amount must be positive, got {amount}")));
        }
        let mut conn = self.pool.acquire().await?;
        let wallet =
            wallets::fetch_wallet(wallet_id, &mut conn).await?.ok_or(WalletApiError::WalletNotFound(wallet_id))?;
        if wallet.status == WalletStatus::Closed {
            return Err(WalletApiError::WalletClosed(wallet_id));
        }
        let entry = NewLedgerEntry::credit(wallet_id, amount, "Wallet deposit", order_id)
            .with_status(TxStatus::Pending)
            .with_method("gateway");
        let (entry, created) = ledger::idempotent_insert(entry, &mut conn).await?;
        if created {
            debug!("🗃️ Pending deposit of {amount} recorded for wallet #{wallet_id} [{order_id}]");
        }
        Ok(entry)
    }

    async fn settle_deposit(
        &self,
        order_id: &str,
        amount: Money,
        outcome: DepositOutcome,
    ) -> Result<SettleResult, WalletApiError> {
        let mut tx = self.pool.begin().await?;
        let target = match outcome {
            DepositOutcome::Paid => TxStatus::Success,
            DepositOutcome::Failed => TxStatus::Failed,
        };
        // The conditional transition doubles as the lock acquisition: it matches only while the entry is still
        // Pending, so a replayed webhook falls through to the already-settled branch below.
        let Some(entry) = ledger::transition_pending(order_id, target, &mut tx).await? else {
            let existing = ledger::fetch_by_order_id(order_id, &mut tx)
                .await?
                .ok_or_else(|| WalletApiError::DepositNotFound(order_id.to_string()))?;
            debug!("🗃️ Webhook replay for order {order_id}; deposit already {}", existing.status);
            return Ok(SettleResult::AlreadySettled(existing));
        };
        if entry.amount != amount {
            // Fail closed: the transition above rolls back with the transaction.
            error!(
                "🗃️ Webhook for order {order_id} reports {amount} but the pending deposit is for {}. Rejecting.",
                entry.amount
            );
            return Err(WalletApiError::DepositAmountMismatch {
                order_id: order_id.to_string(),
                expected: entry.amount,
                reported: amount,
            });
        }
        let result = match outcome {
            DepositOutcome::Paid => {
                wallets::apply_credit(entry.wallet_id, entry.amount, true, &mut tx).await?;
                debug!("🗃️ Deposit {order_id} confirmed. {} credited to wallet #{}", entry.amount, entry.wallet_id);
                SettleResult::Credited(entry)
            },
            DepositOutcome::Failed => {
                debug!("🗃️ Deposit {order_id} reported as failed by the gateway.");
                SettleResult::MarkedFailed(entry)
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_transactions(
        &self,
        wallet_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<LedgerEntry>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_page(wallet_id, pagination, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), WalletApiError> {
        self.pool.close().await;
        Ok(())
    }
}

impl MatchManagement for SqliteDatabase {
    async fn insert_match(&self, new_match: NewMatch) -> Result<Match, MatchFlowError> {
        if new_match.max_players < 1 {
            return Err(MatchFlowError::InvalidMatchDefinition(format!(
                "max_players must be at least 1, got {}",
                new_match.max_players
            )));
        }
        if new_match.entry_fee.value() < 0 || new_match.prize_pool.value() < 0 {
            return Err(MatchFlowError::InvalidMatchDefinition(
                "entry_fee and prize_pool must not be negative".to_string(),
            ));
        }
        new_match.prize_distribution.validate(new_match.prize_pool)?;
        let mut conn = self.pool.acquire().await?;
        matches::insert_match(new_match, &mut conn).await
    }

    async fn fetch_match(&self, match_id: i64) -> Result<Option<Match>, MatchFlowError> {
        let mut conn = self.pool.acquire().await?;
        matches::fetch_match(match_id, &mut conn).await
    }

    async fn fetch_matches(&self, status: Option<MatchStatus>) -> Result<Vec<Match>, MatchFlowError> {
        let mut conn = self.pool.acquire().await?;
        matches::fetch_matches(status, &mut conn).await
    }

    async fn players_joined(&self, match_id: i64) -> Result<i64, MatchFlowError> {
        let mut conn = self.pool.acquire().await?;
        registrations::count_for_match(match_id, &mut conn).await
    }

    async fn fetch_registrations(&self, match_id: i64) -> Result<Vec<Registration>, MatchFlowError> {
        let mut conn = self.pool.acquire().await?;
        registrations::fetch_registrations(match_id, &mut conn).await
    }

    async fn update_prize_distribution(
        &self,
        match_id: i64,
        pool: Money,
        distribution: PrizeDistribution,
    ) -> Result<Match, MatchFlowError> {
        distribution.validate(pool)?;
        let mut conn = self.pool.acquire().await?;
        match matches::update_prize_distribution(match_id, pool, distribution, &mut conn).await? {
            Some(m) => Ok(m),
            None => {
                let m = matches::fetch_match(match_id, &mut conn)
                    .await?
                    .ok_or(MatchFlowError::MatchNotFound(match_id))?;
                Err(MatchFlowError::InvalidState { status: m.status, action: "Changing the prize configuration" })
            },
        }
    }

    async fn register_player(
        &self,
        match_id: i64,
        user_id: &str,
        squad_id: Option<&str>,
    ) -> Result<JoinOutcome, MatchFlowError> {
        let mut tx = self.pool.begin().await?;
        if !Self::lock_match_row(match_id, &mut tx).await? {
            return Err(MatchFlowError::MatchNotFound(match_id));
        }
        let m = matches::fetch_match(match_id, &mut tx).await?.ok_or(MatchFlowError::MatchNotFound(match_id))?;
        if m.status != MatchStatus::Upcoming {
            return Err(MatchFlowError::InvalidState { status: m.status, action: "Registration" });
        }
        if registrations::count_for_match(match_id, &mut tx).await? >= m.max_players {
            return Err(MatchFlowError::MatchFull(match_id));
        }
        if registrations::fetch_registration(match_id, user_id, &mut tx).await?.is_some() {
            return Err(MatchFlowError::AlreadyRegistered { match_id, user_id: user_id.to_string() });
        }
        let wallet = wallets::fetch_wallet_for_user(user_id, &mut tx)
            .await?
            .ok_or_else(|| MatchFlowError::NoWallet(user_id.to_string()))?;
        let fee = m.entry_fee;
        let (fee_paid, reference) = if fee.is_positive() {
            let reference = helpers::match_payment_reference(match_id);
            if !wallets::debit_with_floor(wallet.id, fee, &mut tx).await? {
                return Err(WalletApiError::InsufficientBalance { required: fee, available: wallet.balance }.into());
            }
            let entry = NewLedgerEntry::debit(wallet.id, fee, format!("Entry fee for match {}", m.name), &reference)
                .with_method("wallet");
            ledger::idempotent_insert(entry, &mut tx).await?;
            (true, Some(reference))
        } else {
            (false, None)
        };
        let registration = registrations::conditional_insert(
            match_id,
            user_id,
            squad_id,
            fee_paid,
            reference.as_deref(),
            m.max_players,
            &mut tx,
        )
        .await?;
        let Some(registration) = registration else {
            // The statement-level guard said no; the debit above rolls back with the transaction.
            let joined = registrations::count_for_match(match_id, &mut tx).await?;
            tx.rollback().await?;
            return Err(if joined >= m.max_players {
                MatchFlowError::MatchFull(match_id)
            } else {
                MatchFlowError::InvalidState { status: m.status, action: "Registration" }
            });
        };
        let new_balance = wallets::fetch_wallet(wallet.id, &mut tx)
            .await?
            .map(|w| w.balance)
            .unwrap_or(wallet.balance);
        tx.commit().await?;
        debug!("🗃️ User {user_id} joined match {match_id}. Fee {fee} debited from wallet #{}", wallet.id);
        Ok(JoinOutcome { registration, new_balance, payment_reference: reference })
    }

    async fn unregister_player(&self, match_id: i64, user_id: &str) -> Result<Money, MatchFlowError> {
        let mut tx = self.pool.begin().await?;
        if !Self::lock_match_row(match_id, &mut tx).await? {
            return Err(MatchFlowError::MatchNotFound(match_id));
        }
        let m = matches::fetch_match(match_id, &mut tx).await?.ok_or(MatchFlowError::MatchNotFound(match_id))?;
        if m.status != MatchStatus::Upcoming {
            return Err(MatchFlowError::InvalidState { status: m.status, action: "Leaving" });
        }
        let registration = registrations::fetch_registration(match_id, user_id, &mut tx)
            .await?
            .ok_or_else(|| MatchFlowError::NotRegistered { match_id, user_id: user_id.to_string() })?;
        registrations::remove_registration(registration.id, &mut tx).await?;
        let refunded = if registration.fee_paid {
            Self::refund_registration(&registration, m.entry_fee, &m.name, &mut tx).await?
        } else {
            Money::default()
        };
        tx.commit().await?;
        debug!("🗃️ User {user_id} left match {match_id}. Refunded {refunded}");
        Ok(refunded)
    }

    async fn settle_results(
        &self,
        match_id: i64,
        submission: ResultsSubmission,
    ) -> Result<(Match, ComputedPrizes), MatchFlowError> {
        let mut tx = self.pool.begin().await?;
        if !Self::lock_match_row(match_id, &mut tx).await? {
            return Err(MatchFlowError::MatchNotFound(match_id));
        }
        let m = matches::fetch_match(match_id, &mut tx).await?.ok_or(MatchFlowError::MatchNotFound(match_id))?;
        if m.status == MatchStatus::Cancelled {
            return Err(MatchFlowError::InvalidState { status: m.status, action: "Results upload" });
        }
        if m.results.is_some() {
            return Err(MatchFlowError::ResultsAlreadyUploaded(match_id));
        }
        let computed = prize::compute(&m.prize_distribution.0, &submission);
        if computed.total > m.prize_pool {
            return Err(MatchFlowError::PrizeExceedsPool { distributed: computed.total, pool: m.prize_pool });
        }
        let results = MatchResults {
            standings: submission.standings,
            special_awards: submission.special_awards,
            awards: computed.awards.clone(),
            total_distributed: computed.total,
            uploaded_at: Utc::now(),
        };
        let m = matches::write_results(match_id, &results, &mut tx)
            .await?
            .ok_or(MatchFlowError::ResultsAlreadyUploaded(match_id))?;
        // One credit per winner: a player's rank winnings and named awards are merged so the per-(match, user)
        // prize reference stays unique.
        let mut totals: BTreeMap<&str, Money> = BTreeMap::new();
        for award in &computed.awards {
            let entry = totals.entry(award.user_id.as_str()).or_default();
            *entry = *entry + award.amount;
        }
        for (user_id, amount) in totals {
            let (wallet, created) = wallets::idempotent_create(user_id, &mut tx).await?;
            if created {
                info!("🗃️ Winner {user_id} had no wallet; created #{} to receive the payout", wallet.id);
            }
            let reference = helpers::prize_reference(match_id, user_id);
            let entry =
                NewLedgerEntry::credit(wallet.id, amount, format!("Prize payout for match {}", m.name), reference)
                    .with_method("wallet");
            let (_, applied) = ledger::idempotent_insert(entry, &mut tx).await?;
            if applied {
                wallets::apply_credit(wallet.id, amount, false, &mut tx).await?;
            }
        }
        tx.commit().await?;
        info!("🗃️ Match {match_id} completed. {} distributed across {} awards", computed.total, computed.awards.len());
        Ok((m, computed))
    }

    async fn cancel_match(&self, match_id: i64) -> Result<(Match, Vec<RefundRecord>), MatchFlowError> {
        let mut tx = self.pool.begin().await?;
        if !Self::lock_match_row(match_id, &mut tx).await? {
            return Err(MatchFlowError::MatchNotFound(match_id));
        }
        let m = matches::fetch_match(match_id, &mut tx).await?.ok_or(MatchFlowError::MatchNotFound(match_id))?;
        if !m.status.can_transition_to(MatchStatus::Cancelled) {
            return Err(MatchFlowError::InvalidState { status: m.status, action: "Cancellation" });
        }
        let from = m.status;
        let m = matches::transition_status(match_id, from, MatchStatus::Cancelled, &mut tx)
            .await?
            .ok_or(MatchFlowError::InvalidState { status: from, action: "Cancellation" })?;
        let regs = registrations::fetch_registrations(match_id, &mut tx).await?;
        let mut refunds = Vec::new();
        for reg in regs.iter().filter(|r| r.fee_paid) {
            let refunded = Self::refund_registration(reg, m.entry_fee, &m.name, &mut tx).await?;
            if refunded.is_positive() {
                refunds.push(RefundRecord { user_id: reg.user_id.clone(), amount: refunded });
            }
        }
        tx.commit().await?;
        info!("🗃️ Match {match_id} cancelled. {} registrations refunded", refunds.len());
        Ok((m, refunds))
    }

    async fn sweep_statuses(
        &self,
        now: DateTime<Utc>,
        live_duration: Duration,
    ) -> Result<SweepResult, MatchFlowError> {
        let mut conn = self.pool.acquire().await?;
        matches::sweep_statuses(now, live_duration, &mut conn).await
    }
}
