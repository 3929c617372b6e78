use std::fmt::Display;

use apg_common::Money;
use arena_payment_engine::{
    db_types::{DepositOutcome, Match, NewMatch},
    objects::RefundRecord,
    prize::{MatchResults, PrizeAward, PrizeDistribution},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Wallet DTOs  ----------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub owner_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCreatedResponse {
    pub wallet_id: i64,
    pub balance: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub balance: Money,
    pub has_wallet: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMoneyRequest {
    pub owner_id: String,
    /// Minor units.
    pub amount: Money,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositInitResponse {
    pub order_id: String,
    pub redirect_url: String,
    pub amount: Money,
}

/// The gateway's webhook body. The signature over the raw bytes of this payload arrives in a header and is
/// checked by the HMAC middleware before deserialization is even attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub order_id: String,
    pub amount: Money,
    pub outcome: DepositOutcome,
}

//----------------------------------------------   Match DTOs  ----------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub name: String,
    pub entry_fee: Money,
    #[serde(default)]
    pub prize_pool: Money,
    pub max_players: i64,
    #[serde(default)]
    pub map: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub prize_distribution: PrizeDistribution,
}

impl From<CreateMatchRequest> for NewMatch {
    fn from(r: CreateMatchRequest) -> Self {
        NewMatch {
            name: r.name,
            entry_fee: r.entry_fee,
            prize_pool: r.prize_pool,
            max_players: r.max_players,
            map: r.map,
            scheduled_at: r.scheduled_at,
            prize_distribution: r.prize_distribution,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub id: i64,
    pub name: String,
    pub entry_fee: Money,
    pub prize_pool: Money,
    pub max_players: i64,
    pub players_joined: i64,
    pub map: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub prize_distribution: PrizeDistribution,
    pub results: Option<MatchResults>,
}

impl MatchResponse {
    pub fn from_match(m: Match, players_joined: i64) -> Self {
        Self {
            id: m.id,
            name: m.name,
            entry_fee: m.entry_fee,
            prize_pool: m.prize_pool,
            max_players: m.max_players,
            players_joined,
            map: m.map,
            scheduled_at: m.scheduled_at,
            status: m.status.to_string(),
            prize_distribution: m.prize_distribution.0,
            results: m.results.map(|r| r.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMatchRequest {
    pub user_id: String,
    #[serde(default)]
    pub squad_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMatchResponse {
    pub new_balance: Money,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveMatchRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveMatchResponse {
    pub refunded_amount: Money,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub total_distributed: Money,
    pub awards: Vec<PrizeAward>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelMatchResponse {
    pub refunds: Vec<RefundRecord>,
}
