use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::Registration, traits::MatchFlowError};

/// The capacity-gated registration insert. The `INSERT … SELECT` re-checks both the player count and the match
/// status inside the statement itself, so two joiners racing for the last slot (or a join racing the lifecycle
/// sweep) cannot both get in: exactly one insert sees the condition hold.
///
/// Returns `None` when the conditions reject the insert; the caller reads the match again to report whether that
/// was capacity or state.
pub async fn conditional_insert(
    match_id: i64,
    user_id: &str,
    squad_id: Option<&str>,
    fee_paid: bool,
    payment_reference: Option<&str>,
    max_players: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Registration>, MatchFlowError> {
    let result = sqlx::query_as::<_, Registration>(
        r#"
            INSERT INTO registrations (match_id, user_id, squad_id, fee_paid, payment_reference)
            SELECT $1, $2, $3, $4, $5
            WHERE (SELECT COUNT(*) FROM registrations WHERE match_id = $1) < $6
              AND EXISTS (SELECT 1 FROM matches WHERE id = $1 AND status = 'Upcoming')
            RETURNING *;
        "#,
    )
    .bind(match_id)
    .bind(user_id)
    .bind(squad_id)
    .bind(fee_paid)
    .bind(payment_reference)
    .bind(max_players)
    .fetch_optional(&mut *conn)
    .await;
    match result {
        Ok(row) => {
            if let Some(reg) = &row {
                debug!("🗃️ Registration #{} recorded for user {user_id} in match {match_id}", reg.id);
            }
            Ok(row)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(MatchFlowError::AlreadyRegistered { match_id, user_id: user_id.to_string() })
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_registration(
    match_id: i64,
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Registration>, MatchFlowError> {
    let row = sqlx::query_as("SELECT * FROM registrations WHERE match_id = $1 AND user_id = $2")
        .bind(match_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn fetch_registrations(
    match_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Registration>, MatchFlowError> {
    let rows = sqlx::query_as("SELECT * FROM registrations WHERE match_id = $1 ORDER BY created_at ASC")
        .bind(match_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn remove_registration(registration_id: i64, conn: &mut SqliteConnection) -> Result<bool, MatchFlowError> {
    let result =
        sqlx::query("DELETE FROM registrations WHERE id = $1").bind(registration_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Derived player count; this projection is the only source of `players_joined` anywhere in the system.
pub async fn count_for_match(match_id: i64, conn: &mut SqliteConnection) -> Result<i64, MatchFlowError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrations WHERE match_id = $1")
        .bind(match_id)
        .fetch_one(conn)
        .await?;
    Ok(row.0)
}
