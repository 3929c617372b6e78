use apg_common::Money;
use chrono::{DateTime, Duration, Utc};
use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{Match, MatchStatus, NewMatch},
    objects::SweepResult,
    prize::{MatchResults, PrizeDistribution},
    traits::MatchFlowError,
};

pub async fn insert_match(new_match: NewMatch, conn: &mut SqliteConnection) -> Result<Match, MatchFlowError> {
    let row = sqlx::query_as::<_, Match>(
        r#"
            INSERT INTO matches (name, entry_fee, prize_pool, max_players, map, scheduled_at, prize_distribution)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(new_match.name)
    .bind(new_match.entry_fee)
    .bind(new_match.prize_pool)
    .bind(new_match.max_players)
    .bind(new_match.map)
    .bind(new_match.scheduled_at)
    .bind(Json(new_match.prize_distribution))
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Match [{}] inserted with id {}", row.name, row.id);
    Ok(row)
}

pub async fn fetch_match(match_id: i64, conn: &mut SqliteConnection) -> Result<Option<Match>, MatchFlowError> {
    let row = sqlx::query_as("SELECT * FROM matches WHERE id = $1").bind(match_id).fetch_optional(conn).await?;
    Ok(row)
}

pub async fn fetch_matches(
    status: Option<MatchStatus>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Match>, MatchFlowError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as("SELECT * FROM matches WHERE status = $1 ORDER BY scheduled_at ASC")
                .bind(status.to_string())
                .fetch_all(conn)
                .await?
        },
        None => sqlx::query_as("SELECT * FROM matches ORDER BY scheduled_at ASC").fetch_all(conn).await?,
    };
    Ok(rows)
}

/// Status-conditional transition. Matches nothing (and returns `None`) when the row is no longer in `from`, which
/// is how concurrent transitions lose gracefully instead of clobbering a terminal state.
pub async fn transition_status(
    match_id: i64,
    from: MatchStatus,
    to: MatchStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Match>, MatchFlowError> {
    let row = sqlx::query_as(
        r#"UPDATE matches SET status = $1, updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND status = $3 RETURNING *"#,
    )
    .bind(to.to_string())
    .bind(match_id)
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn update_prize_distribution(
    match_id: i64,
    pool: Money,
    distribution: PrizeDistribution,
    conn: &mut SqliteConnection,
) -> Result<Option<Match>, MatchFlowError> {
    let row = sqlx::query_as(
        r#"UPDATE matches SET prize_pool = $1, prize_distribution = $2, updated_at = CURRENT_TIMESTAMP
           WHERE id = $3 AND status = 'Upcoming' RETURNING *"#,
    )
    .bind(pool)
    .bind(Json(distribution))
    .bind(match_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// The one-shot results write. The `results IS NULL` and status conditions make this conditional update the
/// single authority on "results are written once, and never to a cancelled match".
pub async fn write_results(
    match_id: i64,
    results: &MatchResults,
    conn: &mut SqliteConnection,
) -> Result<Option<Match>, MatchFlowError> {
    let row = sqlx::query_as(
        r#"UPDATE matches SET results = $1, status = 'Completed', updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND status != 'Cancelled' AND results IS NULL RETURNING *"#,
    )
    .bind(Json(results.clone()))
    .bind(match_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// The lifecycle sweep, as two bulk conditional updates. Re-running it when nothing qualifies affects zero rows.
pub async fn sweep_statuses(
    now: DateTime<Utc>,
    live_duration: Duration,
    conn: &mut SqliteConnection,
) -> Result<SweepResult, MatchFlowError> {
    let started = sqlx::query(
        r#"UPDATE matches SET status = 'Live', updated_at = CURRENT_TIMESTAMP
           WHERE status = 'Upcoming' AND scheduled_at <= $1"#,
    )
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let live_cutoff = now - live_duration;
    let completed = sqlx::query(
        r#"UPDATE matches SET status = 'Completed', updated_at = CURRENT_TIMESTAMP
           WHERE status = 'Live' AND scheduled_at <= $1"#,
    )
    .bind(live_cutoff)
    .execute(conn)
    .await?
    .rows_affected();

    trace!("🗃️ Sweep pass: {started} matches started, {completed} matches completed");
    Ok(SweepResult { started, completed })
}
