use std::fmt::Debug;

use apg_common::Money;
use log::*;

use crate::{
    db_types::{DepositOutcome, LedgerEntry, Wallet},
    helpers,
    objects::{BalanceResult, DepositLimits, Pagination, PendingDeposit, SettleResult},
    traits::{WalletApiError, WalletManagement},
};

/// `WalletApi` is the primary API for wallet creation, deposits and the transaction ledger.
pub struct WalletApi<B> {
    db: B,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    /// Creates a wallet for the user, or returns the existing one. Calling this twice for the same user is safe
    /// and returns the same wallet.
    pub async fn create_wallet(&self, user_id: &str) -> Result<Wallet, WalletApiError> {
        let (wallet, created) = self.db.create_wallet(user_id).await?;
        if created {
            info!("🔄️💰️ Wallet #{} created for user {user_id}", wallet.id);
        } else {
            debug!("🔄️💰️ Wallet for user {user_id} already exists as #{}", wallet.id);
        }
        Ok(wallet)
    }

    /// The user's current balance. A missing wallet is reported, not an error.
    pub async fn balance(&self, user_id: &str) -> Result<BalanceResult, WalletApiError> {
        let result = match self.db.fetch_wallet_for_user(user_id).await? {
            Some(wallet) => BalanceResult { balance: wallet.balance, has_wallet: true },
            None => BalanceResult::none(),
        };
        Ok(result)
    }

    pub async fn fetch_wallet(&self, wallet_id: i64) -> Result<Option<Wallet>, WalletApiError> {
        self.db.fetch_wallet(wallet_id).await
    }

    /// Credits the wallet. Idempotent on `reference`; the returned boolean is `false` for a replay.
    pub async fn credit(
        &self,
        wallet_id: i64,
        amount: Money,
        description: &str,
        reference: &str,
    ) -> Result<(LedgerEntry, bool), WalletApiError> {
        self.db.credit_money(wallet_id, amount, description, reference).await
    }

    /// Debits the wallet, failing with [`WalletApiError::InsufficientBalance`] when the balance cannot cover the
    /// amount. Idempotent on `reference`.
    pub async fn debit(
        &self,
        wallet_id: i64,
        amount: Money,
        description: &str,
        reference: &str,
    ) -> Result<(LedgerEntry, bool), WalletApiError> {
        self.db.debit_money(wallet_id, amount, description, reference).await
    }

    /// Opens a deposit: validates the configured bounds, records the pending ledger entry and hands back the order
    /// id the gateway session will be keyed on. The caller builds the redirect URL around that order id; the later
    /// webhook is the only thing that settles it.
    pub async fn initiate_deposit(
        &self,
        user_id: &str,
        amount: Money,
        limits: &DepositLimits,
    ) -> Result<PendingDeposit, WalletApiError> {
        if amount < limits.min || amount > limits.max {
            return Err(WalletApiError::InvalidAmount(format!(
                "Deposit amount {amount} is outside the allowed range [{}, {}]",
                limits.min, limits.max
            )));
        }
        let wallet = self
            .db
            .fetch_wallet_for_user(user_id)
            .await?
            .ok_or_else(|| WalletApiError::UserHasNoWallet(user_id.to_string()))?;
        let order_id = helpers::deposit_order_id(wallet.id);
        let entry = self.db.record_pending_deposit(wallet.id, amount, &order_id).await?;
        info!("🔄️💰️ Deposit of {amount} initiated for wallet #{} [{order_id}]", wallet.id);
        Ok(PendingDeposit { wallet_id: wallet.id, order_id, amount: entry.amount })
    }

    /// Routes a verified gateway callback to the ledger. Replays resolve to the prior outcome.
    pub async fn settle_deposit(
        &self,
        order_id: &str,
        amount: Money,
        outcome: DepositOutcome,
    ) -> Result<SettleResult, WalletApiError> {
        trace!("🔄️💰️ Settling deposit {order_id} as {outcome}");
        let result = self.db.settle_deposit(order_id, amount, outcome).await?;
        match &result {
            SettleResult::Credited(e) => info!("🔄️💰️ Deposit {order_id} credited {} to wallet #{}", e.amount, e.wallet_id),
            SettleResult::MarkedFailed(_) => info!("🔄️💰️ Deposit {order_id} marked as failed"),
            SettleResult::AlreadySettled(e) => {
                debug!("🔄️💰️ Deposit {order_id} was already {}; webhook replay ignored", e.status)
            },
        }
        Ok(result)
    }

    /// The wallet's ledger, newest first.
    pub async fn history(&self, wallet_id: i64, pagination: &Pagination) -> Result<Vec<LedgerEntry>, WalletApiError> {
        self.db.fetch_transactions(wallet_id, pagination).await
    }
}
