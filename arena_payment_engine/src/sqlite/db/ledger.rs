use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LedgerEntry, NewLedgerEntry, TxStatus},
    objects::Pagination,
    traits::WalletApiError,
};

/// Appends a ledger entry unless one with the same `(wallet_id, reference)` already exists, in which case the
/// existing entry is returned and the boolean is `false`. This is the idempotency primitive every credit, debit
/// and refund goes through.
pub async fn idempotent_insert(
    entry: NewLedgerEntry,
    conn: &mut SqliteConnection,
) -> Result<(LedgerEntry, bool), WalletApiError> {
    if let Some(existing) = fetch_by_reference(entry.wallet_id, &entry.reference, conn).await? {
        debug!("🗃️ Ledger reference {} already recorded as entry #{}; replay resolved", entry.reference, existing.id);
        return Ok((existing, false));
    }
    let status = entry.status.to_string();
    let direction = entry.direction.to_string();
    let result = sqlx::query_as::<_, LedgerEntry>(
        r#"
            INSERT INTO wallet_transactions (wallet_id, direction, amount, description, status, reference, method, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(entry.wallet_id)
    .bind(direction)
    .bind(entry.amount)
    .bind(entry.description)
    .bind(status)
    .bind(entry.reference.clone())
    .bind(entry.method)
    .bind(entry.metadata)
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(row) => Ok((row, true)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_by_reference(entry.wallet_id, &entry.reference, conn).await?.ok_or_else(|| {
                WalletApiError::Conflict(format!("Ledger entry {} vanished after insert conflict", entry.reference))
            })?;
            Ok((existing, false))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_by_reference(
    wallet_id: i64,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, WalletApiError> {
    let entry = sqlx::query_as("SELECT * FROM wallet_transactions WHERE wallet_id = $1 AND reference = $2")
        .bind(wallet_id)
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(entry)
}

/// Looks a deposit up by its gateway order id alone. Order ids are generated uniquely across wallets, so at most
/// one row can match.
pub async fn fetch_by_order_id(
    order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, WalletApiError> {
    let entry = sqlx::query_as("SELECT * FROM wallet_transactions WHERE reference = $1 LIMIT 1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(entry)
}

/// Moves a `Pending` entry to a terminal status. Terminal entries never change again: the `status = 'Pending'`
/// condition means a second transition attempt simply matches nothing.
pub async fn transition_pending(
    order_id: &str,
    to: TxStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, WalletApiError> {
    let status = to.to_string();
    let entry = sqlx::query_as(
        r#"UPDATE wallet_transactions SET status = $1, updated_at = CURRENT_TIMESTAMP
           WHERE reference = $2 AND status = 'Pending' RETURNING *"#,
    )
    .bind(status)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(entry)
}

/// The wallet's history, newest first. Pure read.
pub async fn fetch_page(
    wallet_id: i64,
    pagination: &Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, WalletApiError> {
    let entries = sqlx::query_as(
        r#"SELECT * FROM wallet_transactions WHERE wallet_id = $1
           ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"#,
    )
    .bind(wallet_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

/// Recomputes the balance from the ledger: Σ(success credits) − Σ(success debits). Used by tests and
/// reconciliation checks; the live balance column must always agree with this.
pub async fn recompute_balance(wallet_id: i64, conn: &mut SqliteConnection) -> Result<i64, WalletApiError> {
    let row: (i64,) = sqlx::query_as(
        r#"SELECT COALESCE(SUM(CASE WHEN direction = 'Credit' THEN amount ELSE -amount END), 0)
           FROM wallet_transactions WHERE wallet_id = $1 AND status = 'Success'"#,
    )
    .bind(wallet_id)
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}
