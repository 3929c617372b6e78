use std::fmt::Debug;

use apg_common::Money;
use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Match, MatchStatus, NewMatch, Registration},
    objects::{JoinOutcome, RefundRecord, SweepResult},
    prize::{ComputedPrizes, PrizeDistribution, ResultsSubmission},
    traits::{MatchFlowError, MatchManagement},
};

/// `MatchFlowApi` is the primary API for the entry-fee transaction flows: joining and leaving matches, results
/// settlement, cancellation and the lifecycle sweep.
pub struct MatchFlowApi<B> {
    db: B,
}

impl<B> Debug for MatchFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchFlowApi")
    }
}

impl<B> MatchFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> MatchFlowApi<B>
where B: MatchManagement
{
    pub async fn create_match(&self, new_match: NewMatch) -> Result<Match, MatchFlowError> {
        let m = self.db.insert_match(new_match).await?;
        info!("🔄️🎮️ Match [{}] created with id {} ({} slots)", m.name, m.id, m.max_players);
        Ok(m)
    }

    /// The match together with its derived player count.
    pub async fn match_details(&self, match_id: i64) -> Result<Option<(Match, i64)>, MatchFlowError> {
        let Some(m) = self.db.fetch_match(match_id).await? else {
            return Ok(None);
        };
        let joined = self.db.players_joined(match_id).await?;
        Ok(Some((m, joined)))
    }

    pub async fn list_matches(&self, status: Option<MatchStatus>) -> Result<Vec<Match>, MatchFlowError> {
        self.db.fetch_matches(status).await
    }

    pub async fn players_joined(&self, match_id: i64) -> Result<i64, MatchFlowError> {
        self.db.players_joined(match_id).await
    }

    pub async fn registrations(&self, match_id: i64) -> Result<Vec<Registration>, MatchFlowError> {
        self.db.fetch_registrations(match_id).await
    }

    pub async fn update_prize_distribution(
        &self,
        match_id: i64,
        pool: Money,
        distribution: PrizeDistribution,
    ) -> Result<Match, MatchFlowError> {
        let m = self.db.update_prize_distribution(match_id, pool, distribution).await?;
        info!("🔄️🎮️ Prize configuration for match {match_id} updated (pool {})", m.prize_pool);
        Ok(m)
    }

    /// Join a match: state gate, capacity gate, affordability check, and the atomic debit-plus-registration. The
    /// backend guarantees the fee can never be charged without a registration landing in the same transaction.
    pub async fn join_match(
        &self,
        match_id: i64,
        user_id: &str,
        squad_id: Option<&str>,
    ) -> Result<JoinOutcome, MatchFlowError> {
        trace!("🔄️🎮️ User {user_id} requests to join match {match_id}");
        let outcome = self.db.register_player(match_id, user_id, squad_id).await?;
        info!(
            "🔄️🎮️ User {user_id} joined match {match_id}. New balance {}, reference {:?}",
            outcome.new_balance, outcome.payment_reference
        );
        Ok(outcome)
    }

    /// Leave an upcoming match, refunding the entry fee at most once. Returns the refunded amount.
    pub async fn leave_match(&self, match_id: i64, user_id: &str) -> Result<Money, MatchFlowError> {
        trace!("🔄️🎮️ User {user_id} requests to leave match {match_id}");
        let refunded = self.db.unregister_player(match_id, user_id).await?;
        info!("🔄️🎮️ User {user_id} left match {match_id}. Refunded {refunded}");
        Ok(refunded)
    }

    /// Upload results: computes payouts, writes the terminal results record, completes the match and credits every
    /// winner. Rejects before any money moves when the computed distribution exceeds the prize pool.
    pub async fn upload_results(
        &self,
        match_id: i64,
        submission: ResultsSubmission,
    ) -> Result<(Match, ComputedPrizes), MatchFlowError> {
        let (m, computed) = self.db.settle_results(match_id, submission).await?;
        info!(
            "🔄️🏆️ Results for match {match_id} settled. {} paid out across {} awards",
            computed.total,
            computed.awards.len()
        );
        Ok((m, computed))
    }

    /// Organizer cancellation with automatic refunds.
    pub async fn cancel_match(&self, match_id: i64) -> Result<(Match, Vec<RefundRecord>), MatchFlowError> {
        let (m, refunds) = self.db.cancel_match(match_id).await?;
        info!("🔄️🎮️ Match {match_id} cancelled; {} entry fees refunded", refunds.len());
        Ok((m, refunds))
    }

    /// One pass of the lifecycle sweep. Safe to run on a timer and concurrently with user joins; the join path
    /// re-checks match status inside its own transaction.
    pub async fn auto_update_statuses(&self, live_duration: Duration) -> Result<SweepResult, MatchFlowError> {
        let result = self.db.sweep_statuses(Utc::now(), live_duration).await?;
        if result.total() > 0 {
            info!("🔄️🕰️ Lifecycle sweep: {} matches went live, {} completed", result.started, result.completed);
        }
        Ok(result)
    }
}
