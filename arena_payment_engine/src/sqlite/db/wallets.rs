use apg_common::Money;
use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::Wallet, traits::WalletApiError};

/// Creates a wallet for the user, or returns the existing one. The unique index on `user_id` backstops the
/// fetch-then-insert against concurrent creation requests for the same user.
pub async fn idempotent_create(user_id: &str, conn: &mut SqliteConnection) -> Result<(Wallet, bool), WalletApiError> {
    if let Some(wallet) = fetch_wallet_for_user(user_id, conn).await? {
        return Ok((wallet, false));
    }
    let result = sqlx::query_as::<_, Wallet>("INSERT INTO wallets (user_id) VALUES ($1) RETURNING *")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await;
    match result {
        Ok(wallet) => {
            debug!("🗃️ Created wallet #{} for user {user_id}", wallet.id);
            Ok((wallet, true))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            // Lost the race to another create request. The winner's wallet is the result.
            let wallet = fetch_wallet_for_user(user_id, conn)
                .await?
                .ok_or_else(|| WalletApiError::Conflict(format!("Wallet for {user_id} vanished after insert conflict")))?;
            Ok((wallet, false))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_wallet(wallet_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, WalletApiError> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE id = $1").bind(wallet_id).fetch_optional(conn).await?;
    Ok(wallet)
}

pub async fn fetch_wallet_for_user(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, WalletApiError> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(wallet)
}

/// The guarded decrement. Returns `false` when the floor check (or the `Active` gate) rejects the debit; the
/// caller decides whether that is an insufficient-balance error or a closed-wallet error by re-reading the row.
pub async fn debit_with_floor(
    wallet_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<bool, WalletApiError> {
    let amount = amount.value();
    let result = sqlx::query(
        r#"UPDATE wallets SET
       balance = balance - $1,
       total_withdrawn = total_withdrawn + $1,
       updated_at = CURRENT_TIMESTAMP
       WHERE id = $2 AND status = 'Active' AND balance >= $1
       "#,
    )
    .bind(amount)
    .bind(wallet_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Applies a settled credit to the balance. `count_as_deposit` additionally bumps the cumulative deposit total,
/// which refunds and prize credits leave alone.
pub async fn apply_credit(
    wallet_id: i64,
    amount: Money,
    count_as_deposit: bool,
    conn: &mut SqliteConnection,
) -> Result<(), WalletApiError> {
    let amount = amount.value();
    let deposit_delta = if count_as_deposit { amount } else { 0 };
    let result = sqlx::query(
        r#"UPDATE wallets SET
       balance = balance + $1,
       total_deposited = total_deposited + $2,
       updated_at = CURRENT_TIMESTAMP
       WHERE id = $3 AND status = 'Active'
       "#,
    )
    .bind(amount)
    .bind(deposit_delta)
    .bind(wallet_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(WalletApiError::WalletClosed(wallet_id));
    }
    Ok(())
}
