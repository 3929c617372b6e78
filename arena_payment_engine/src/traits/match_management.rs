use apg_common::Money;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{Match, MatchStatus, NewMatch, Registration},
    objects::{JoinOutcome, RefundRecord, SweepResult},
    prize::{ComputedPrizes, PrizeConfigError, PrizeDistribution, ResultsSubmission},
    traits::WalletApiError,
};

/// Storage contract for matches, registrations and settlement.
///
/// The compound operations (`register_player`, `unregister_player`, `settle_results`, `cancel_match`) are each a
/// single atomic unit against the backing store: either every money movement and row change in them lands, or none
/// does. A fee can therefore never be charged without a registration to show for it.
#[allow(async_fn_in_trait)]
pub trait MatchManagement: Clone {
    /// Stores a new match after validating its definition (capacity ≥ 1, non-negative amounts, prize configuration
    /// within the pool).
    async fn insert_match(&self, new_match: NewMatch) -> Result<Match, MatchFlowError>;

    async fn fetch_match(&self, match_id: i64) -> Result<Option<Match>, MatchFlowError>;

    async fn fetch_matches(&self, status: Option<MatchStatus>) -> Result<Vec<Match>, MatchFlowError>;

    /// Derived from the registrations table on every call; never a stored counter.
    async fn players_joined(&self, match_id: i64) -> Result<i64, MatchFlowError>;

    async fn fetch_registrations(&self, match_id: i64) -> Result<Vec<Registration>, MatchFlowError>;

    /// Replaces the prize configuration while the match is still `Upcoming`. Re-validates against the pool.
    async fn update_prize_distribution(
        &self,
        match_id: i64,
        pool: Money,
        distribution: PrizeDistribution,
    ) -> Result<Match, MatchFlowError>;

    /// The join-match compound operation: status gate, capacity gate, affordability gate, entry-fee debit, ledger
    /// append and registration insert, all inside one transaction. The status and capacity checks are re-evaluated
    /// inside the same atomic update that registers the player, so a concurrent sweep or joiner cannot slip
    /// between check and write.
    async fn register_player(
        &self,
        match_id: i64,
        user_id: &str,
        squad_id: Option<&str>,
    ) -> Result<JoinOutcome, MatchFlowError>;

    /// The leave-match compound operation: removes the registration (while `Upcoming` only) and refunds the entry
    /// fee through an idempotent credit keyed on `REFUND_{original_reference}`. Returns the refunded amount, zero
    /// when no fee had been paid.
    async fn unregister_player(&self, match_id: i64, user_id: &str) -> Result<Money, MatchFlowError>;

    /// Writes the results exactly once, flips the match to `Completed` and credits every computed award
    /// idempotently (`PRIZE_{match_id}_{user_id}`). Rejects distributions that exceed the prize pool before any
    /// money moves.
    async fn settle_results(
        &self,
        match_id: i64,
        submission: ResultsSubmission,
    ) -> Result<(Match, ComputedPrizes), MatchFlowError>;

    /// Organizer cancellation, legal from `Upcoming` or `Live`. Every fee-paid registration is refunded with the
    /// same idempotent refund references the leave flow uses.
    async fn cancel_match(&self, match_id: i64) -> Result<(Match, Vec<RefundRecord>), MatchFlowError>;

    /// The lifecycle sweep: `Upcoming → Live` once the scheduled time has passed, `Live → Completed` once
    /// `live_duration` has elapsed past it. Re-entrant; running it when nothing qualifies is a no-op.
    async fn sweep_statuses(&self, now: DateTime<Utc>, live_duration: Duration) -> Result<SweepResult, MatchFlowError>;
}

#[derive(Debug, Clone, Error)]
pub enum MatchFlowError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested match {0} does not exist")]
    MatchNotFound(i64),
    #[error("{action} is not allowed while the match is {status}")]
    InvalidState { status: MatchStatus, action: &'static str },
    #[error("Match {0} is full")]
    MatchFull(i64),
    #[error("User {user_id} is already registered for match {match_id}")]
    AlreadyRegistered { match_id: i64, user_id: String },
    #[error("User {user_id} is not registered for match {match_id}")]
    NotRegistered { match_id: i64, user_id: String },
    #[error("User {0} has no wallet")]
    NoWallet(String),
    #[error("Results for match {0} have already been uploaded")]
    ResultsAlreadyUploaded(i64),
    #[error("Computed payouts ({distributed}) exceed the prize pool ({pool})")]
    PrizeExceedsPool { distributed: Money, pool: Money },
    #[error("Invalid match definition: {0}")]
    InvalidMatchDefinition(String),
    #[error("Invalid prize configuration: {0}")]
    PrizeConfig(#[from] PrizeConfigError),
    #[error("{0}")]
    Wallet(#[from] WalletApiError),
}

impl From<sqlx::Error> for MatchFlowError {
    fn from(e: sqlx::Error) -> Self {
        MatchFlowError::DatabaseError(e.to_string())
    }
}
