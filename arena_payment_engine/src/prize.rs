//! Prize distribution calculator.
//!
//! Turns a match's configured reward rules and the submitted results into concrete per-player payout amounts.
//! Everything here is pure; the settlement step in the SQLite backend is what actually credits wallets.

use apg_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// At most this many placements can carry a rank reward.
pub const MAX_RANK_REWARDS: usize = 5;

#[derive(Debug, Clone, Error)]
pub enum PrizeConfigError {
    #[error("A match can configure at most {MAX_RANK_REWARDS} rank rewards, got {0}")]
    TooManyRankRewards(usize),
    #[error("Reward amounts must not be negative")]
    NegativeReward,
    #[error("Configured rewards ({configured}) exceed the prize pool ({pool})")]
    ExceedsPool { configured: Money, pool: Money },
}

//--------------------------------------  PrizeDistribution   ---------------------------------------------------------
/// The organizer-configured reward rules for a match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrizeDistribution {
    /// Reward per final placement; index 0 is first place. Max [`MAX_RANK_REWARDS`] entries.
    #[serde(default)]
    pub rank_rewards: Vec<Money>,
    /// Flat amount per kill.
    #[serde(default)]
    pub per_kill: Money,
    /// Kills beyond this count earn nothing.
    #[serde(default)]
    pub max_kills: i64,
    /// Named one-off awards (e.g. "MVP"), paid to whoever the results name for them.
    #[serde(default)]
    pub custom_rewards: Vec<CustomReward>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomReward {
    pub name: String,
    pub amount: Money,
}

impl PrizeDistribution {
    /// The worst-case total this configuration can pay out, assuming a full rank table, every squad maxing out
    /// kill rewards is unbounded by squad count, so kill rewards are excluded here. Used for the creation-time
    /// pool check on the fixed components.
    pub fn configured_total(&self) -> Money {
        let ranks: Money = self.rank_rewards.iter().copied().sum();
        let customs: Money = self.custom_rewards.iter().map(|c| c.amount).sum();
        ranks + customs
    }

    /// Validates the configuration against a prize pool. The fixed components (ranks + custom awards) must fit in
    /// the pool; kill rewards are validated against the pool at results time, when the squad count is known.
    pub fn validate(&self, pool: Money) -> Result<(), PrizeConfigError> {
        if self.rank_rewards.len() > MAX_RANK_REWARDS {
            return Err(PrizeConfigError::TooManyRankRewards(self.rank_rewards.len()));
        }
        let negative = self.rank_rewards.iter().any(|r| r.value() < 0)
            || self.per_kill.value() < 0
            || self.custom_rewards.iter().any(|c| c.amount.value() < 0);
        if negative || self.max_kills < 0 {
            return Err(PrizeConfigError::NegativeReward);
        }
        let configured = self.configured_total();
        if configured > pool {
            return Err(PrizeConfigError::ExceedsPool { configured, pool });
        }
        Ok(())
    }
}

//--------------------------------------  ResultsSubmission   ---------------------------------------------------------
/// What the organizer uploads when a match finishes: squads in final-placement order plus named-award recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsSubmission {
    /// Ordered by placement; index 0 finished first.
    pub standings: Vec<SquadStanding>,
    #[serde(default)]
    pub special_awards: Vec<AwardRecipient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadStanding {
    pub squad_id: String,
    /// The player credited with this squad's winnings.
    pub user_id: String,
    pub kills: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardRecipient {
    /// Must match a configured custom reward by name to pay anything.
    pub name: String,
    pub user_id: String,
}

//--------------------------------------    ComputedPrizes    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeAward {
    pub user_id: String,
    pub squad_id: Option<String>,
    /// 1-based placement for rank/kill winnings; `None` for custom awards.
    pub rank: Option<usize>,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputedPrizes {
    pub awards: Vec<PrizeAward>,
    pub total: Money,
}

/// The terminal results record stored on the match row. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResults {
    pub standings: Vec<SquadStanding>,
    pub special_awards: Vec<AwardRecipient>,
    pub awards: Vec<PrizeAward>,
    pub total_distributed: Money,
    pub uploaded_at: DateTime<Utc>,
}

/// Computes the payout for every squad and named award.
///
/// * The top N squads get the configured rank reward, where N is the number of configured rank entries.
/// * Every squad earns `min(kills, max_kills) * per_kill`.
/// * Custom rewards pay out only when the submitted awards name them.
///
/// Rank and kill winnings for the same squad are merged into a single award per recipient; custom awards stay
/// separate entries so the payout record shows what was won.
pub fn compute(config: &PrizeDistribution, submission: &ResultsSubmission) -> ComputedPrizes {
    let mut awards = Vec::with_capacity(submission.standings.len() + submission.special_awards.len());
    for (idx, standing) in submission.standings.iter().enumerate() {
        let rank_reward = config.rank_rewards.get(idx).copied().unwrap_or_default();
        let rewarded_kills = standing.kills.clamp(0, config.max_kills.max(0));
        let kill_reward = config.per_kill * rewarded_kills;
        let amount = rank_reward + kill_reward;
        if amount.is_positive() {
            awards.push(PrizeAward {
                user_id: standing.user_id.clone(),
                squad_id: Some(standing.squad_id.clone()),
                rank: Some(idx + 1),
                amount,
            });
        }
    }
    for recipient in &submission.special_awards {
        let Some(reward) = config.custom_rewards.iter().find(|c| c.name == recipient.name) else {
            continue;
        };
        if reward.amount.is_positive() {
            awards.push(PrizeAward { user_id: recipient.user_id.clone(), squad_id: None, rank: None, amount: reward.amount });
        }
    }
    let total = awards.iter().map(|a| a.amount).sum();
    ComputedPrizes { awards, total }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> PrizeDistribution {
        PrizeDistribution {
            rank_rewards: vec![Money::from(3000), Money::from(1500), Money::from(800)],
            per_kill: Money::from(50),
            max_kills: 10,
            custom_rewards: vec![CustomReward { name: "MVP".into(), amount: Money::from(500) }],
        }
    }

    fn standing(squad: &str, user: &str, kills: i64) -> SquadStanding {
        SquadStanding { squad_id: squad.into(), user_id: user.into(), kills }
    }

    #[test]
    fn first_place_with_capped_kills() {
        // 12 kills, but only 10 are rewarded
        let submission =
            ResultsSubmission { standings: vec![standing("alpha", "u1", 12)], special_awards: vec![] };
        let prizes = compute(&config(), &submission);
        assert_eq!(prizes.awards.len(), 1);
        assert_eq!(prizes.awards[0].amount, Money::from(3500));
        assert_eq!(prizes.awards[0].rank, Some(1));
        assert_eq!(prizes.total, Money::from(3500));
    }

    #[test]
    fn ranks_beyond_table_earn_kill_money_only() {
        let submission = ResultsSubmission {
            standings: vec![
                standing("a", "u1", 0),
                standing("b", "u2", 0),
                standing("c", "u3", 0),
                standing("d", "u4", 4),
            ],
            special_awards: vec![],
        };
        let prizes = compute(&config(), &submission);
        let fourth = prizes.awards.iter().find(|a| a.user_id == "u4").unwrap();
        assert_eq!(fourth.amount, Money::from(200));
        assert_eq!(fourth.rank, Some(4));
        // squads with neither rank nor kills get no award row
        assert_eq!(prizes.total, Money::from(3000 + 1500 + 800 + 200));
    }

    #[test]
    fn custom_awards_match_by_name() {
        let submission = ResultsSubmission {
            standings: vec![standing("a", "u1", 0)],
            special_awards: vec![
                AwardRecipient { name: "MVP".into(), user_id: "u9".into() },
                AwardRecipient { name: "Best Sniper".into(), user_id: "u9".into() },
            ],
        };
        let prizes = compute(&config(), &submission);
        let mvp = prizes.awards.iter().find(|a| a.rank.is_none()).unwrap();
        assert_eq!(mvp.user_id, "u9");
        assert_eq!(mvp.amount, Money::from(500));
        // the unconfigured award pays nothing
        assert_eq!(prizes.awards.len(), 2);
    }

    #[test]
    fn config_validation_rejects_overcommitted_pool() {
        let cfg = config();
        assert!(cfg.validate(Money::from(5800)).is_ok());
        let err = cfg.validate(Money::from(5000)).unwrap_err();
        assert!(matches!(err, PrizeConfigError::ExceedsPool { .. }));
    }

    #[test]
    fn config_validation_rejects_oversized_rank_table() {
        let mut cfg = config();
        cfg.rank_rewards = vec![Money::from(1); 6];
        assert!(matches!(cfg.validate(Money::from(1_000_000)).unwrap_err(), PrizeConfigError::TooManyRankRewards(6)));
    }
}
