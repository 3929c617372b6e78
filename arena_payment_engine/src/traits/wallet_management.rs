use apg_common::Money;
use thiserror::Error;

use crate::{
    db_types::{DepositOutcome, LedgerEntry, Wallet},
    objects::{Pagination, SettleResult},
};

/// Storage contract for the wallet ledger.
///
/// Implementations must provide the two concurrency guarantees the engine is built on:
/// * Debits are conditional on the balance floor ("decrement only if the result stays ≥ 0"), so two concurrent
///   debits can never both pass an affordability check against a stale read.
/// * Credits and debits are idempotent on `(wallet_id, reference)`: replaying an operation with a reference that
///   already settled returns the original ledger entry and changes nothing.
#[allow(async_fn_in_trait)]
pub trait WalletManagement: Clone {
    /// The URL of the backing database.
    fn url(&self) -> &str;

    /// Creates a wallet with zero balance for the user, or returns the existing one. The boolean is `true` when a
    /// new wallet was created.
    async fn create_wallet(&self, user_id: &str) -> Result<(Wallet, bool), WalletApiError>;

    async fn fetch_wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, WalletApiError>;

    async fn fetch_wallet_for_user(&self, user_id: &str) -> Result<Option<Wallet>, WalletApiError>;

    /// Appends a successful credit entry and increments the balance, in one atomic unit. The boolean is `false`
    /// when the reference had already settled and the call was a no-op.
    async fn credit_money(
        &self,
        wallet_id: i64,
        amount: Money,
        description: &str,
        reference: &str,
    ) -> Result<(LedgerEntry, bool), WalletApiError>;

    /// Atomically decrements the balance (floor-checked) and appends a successful debit entry.
    ///
    /// Fails with [`WalletApiError::InsufficientBalance`] when `amount` exceeds the current balance. Idempotent on
    /// the reference like [`Self::credit_money`].
    async fn debit_money(
        &self,
        wallet_id: i64,
        amount: Money,
        description: &str,
        reference: &str,
    ) -> Result<(LedgerEntry, bool), WalletApiError>;

    /// Records a `Pending` credit entry for a deposit that is awaiting gateway confirmation. The `order_id` doubles
    /// as the entry's idempotency reference.
    async fn record_pending_deposit(
        &self,
        wallet_id: i64,
        amount: Money,
        order_id: &str,
    ) -> Result<LedgerEntry, WalletApiError>;

    /// Resolves a pending deposit from a gateway webhook. Replays of an already-settled order resolve to
    /// [`SettleResult::AlreadySettled`] without touching the balance. An amount that disagrees with the pending
    /// entry is rejected without mutation.
    async fn settle_deposit(
        &self,
        order_id: &str,
        amount: Money,
        outcome: DepositOutcome,
    ) -> Result<SettleResult, WalletApiError>;

    /// The wallet's ledger, newest first. Pure read.
    async fn fetch_transactions(
        &self,
        wallet_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<LedgerEntry>, WalletApiError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), WalletApiError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum WalletApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested wallet {0} does not exist")]
    WalletNotFound(i64),
    #[error("User {0} has no wallet")]
    UserHasNoWallet(String),
    #[error("The wallet {0} is closed")]
    WalletClosed(i64),
    #[error("Insufficient balance. Required {required}, available {available}")]
    InsufficientBalance { required: Money, available: Money },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("No deposit found for order {0}")]
    DepositNotFound(String),
    #[error("Webhook amount {reported} does not match the pending deposit amount {expected} for order {order_id}")]
    DepositAmountMismatch { order_id: String, expected: Money, reported: Money },
    #[error("Wallet state conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for WalletApiError {
    fn from(e: sqlx::Error) -> Self {
        WalletApiError::DatabaseError(e.to_string())
    }
}
