use std::{fmt::Display, str::FromStr};

use apg_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

use crate::prize::{MatchResults, PrizeDistribution};

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(String);

//--------------------------------------    WalletStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WalletStatus {
    /// The wallet can receive credits and pay entry fees.
    Active,
    /// The wallet has been closed. The row is retained for its ledger, but no further money movement is allowed.
    Closed,
}

impl Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletStatus::Active => write!(f, "Active"),
            WalletStatus::Closed => write!(f, "Closed"),
        }
    }
}

//--------------------------------------       Wallet         ---------------------------------------------------------
/// A user's stored-value account. The balance column is only ever changed through conditional updates, so it can
/// never observe a value below zero, and it always equals the sum of the wallet's successful ledger entries.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Wallet {
    pub id: i64,
    pub user_id: String,
    pub balance: Money,
    pub total_deposited: Money,
    pub total_withdrawn: Money,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     TxDirection      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TxDirection {
    Credit,
    Debit,
}

impl Display for TxDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxDirection::Credit => write!(f, "Credit"),
            TxDirection::Debit => write!(f, "Debit"),
        }
    }
}

//--------------------------------------      TxStatus        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TxStatus {
    /// The entry has been recorded but the money has not moved yet (e.g. a deposit awaiting gateway confirmation).
    Pending,
    /// The entry is settled and reflected in the wallet balance. Terminal.
    Success,
    /// The entry was abandoned or rejected. It never affects the balance. Terminal.
    Failed,
}

impl Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "Pending"),
            TxStatus::Success => write!(f, "Success"),
            TxStatus::Failed => write!(f, "Failed"),
        }
    }
}

//--------------------------------------     LedgerEntry      ---------------------------------------------------------
/// A single balance-affecting event in a wallet's ledger. Entries are append-only: a `Pending` entry transitions to
/// `Success` or `Failed` exactly once, and terminal entries are never touched again.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub wallet_id: i64,
    pub direction: TxDirection,
    pub amount: Money,
    pub description: String,
    pub status: TxStatus,
    /// The idempotency key. Unique per wallet; a replayed operation with the same reference resolves to this entry
    /// instead of creating a second one.
    pub reference: String,
    pub method: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   NewLedgerEntry     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub wallet_id: i64,
    pub direction: TxDirection,
    pub amount: Money,
    pub description: String,
    pub status: TxStatus,
    pub reference: String,
    pub method: Option<String>,
    pub metadata: Option<String>,
}

impl NewLedgerEntry {
    pub fn credit(wallet_id: i64, amount: Money, description: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            wallet_id,
            direction: TxDirection::Credit,
            amount,
            description: description.into(),
            status: TxStatus::Success,
            reference: reference.into(),
            method: None,
            metadata: None,
        }
    }

    pub fn debit(wallet_id: i64, amount: Money, description: impl Into<String>, reference: impl Into<String>) -> Self {
        Self { direction: TxDirection::Debit, ..Self::credit(wallet_id, amount, description, reference) }
    }

    pub fn with_status(mut self, status: TxStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

//--------------------------------------     MatchStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Scheduled, registration open.
    Upcoming,
    /// In play. No registration changes.
    Live,
    /// Finished, results written. Terminal.
    Completed,
    /// Called off by the organizer. Terminal.
    Cancelled,
}

impl MatchStatus {
    /// The lifecycle graph: `Upcoming → Live → Completed`, with `Cancelled` reachable from `Upcoming` or `Live`.
    /// Nothing leaves `Completed` or `Cancelled`.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        use MatchStatus::*;
        matches!((self, next), (Upcoming, Live) | (Live, Completed) | (Upcoming, Cancelled) | (Live, Cancelled))
    }
}

impl Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Upcoming => write!(f, "Upcoming"),
            MatchStatus::Live => write!(f, "Live"),
            MatchStatus::Completed => write!(f, "Completed"),
            MatchStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for MatchStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Upcoming" => Ok(Self::Upcoming),
            "Live" => Ok(Self::Live),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid match status: {s}"))),
        }
    }
}

//--------------------------------------        Match         ---------------------------------------------------------
/// A scheduled tournament instance. `players_joined` is never stored; it is always derived from the registrations
/// table so it cannot drift.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Match {
    pub id: i64,
    pub name: String,
    pub entry_fee: Money,
    pub prize_pool: Money,
    pub max_players: i64,
    pub map: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: MatchStatus,
    pub prize_distribution: Json<PrizeDistribution>,
    /// Written exactly once, by the results upload.
    pub results: Option<Json<MatchResults>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewMatch        ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct NewMatch {
    pub name: String,
    pub entry_fee: Money,
    pub prize_pool: Money,
    pub max_players: i64,
    #[serde(default)]
    pub map: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub prize_distribution: PrizeDistribution,
}

impl NewMatch {
    pub fn new(name: impl Into<String>, entry_fee: Money, max_players: i64, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            entry_fee,
            prize_pool: Money::default(),
            max_players,
            map: String::new(),
            scheduled_at,
            prize_distribution: PrizeDistribution::default(),
        }
    }

    pub fn with_prizes(mut self, pool: Money, distribution: PrizeDistribution) -> Self {
        self.prize_pool = pool;
        self.prize_distribution = distribution;
        self
    }
}

//--------------------------------------    Registration      ---------------------------------------------------------
/// A user's entry in a specific match. At most one row per `(match_id, user_id)`; `fee_paid` implies a successful
/// debit entry exists in the user's ledger under `payment_reference`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Registration {
    pub id: i64,
    pub match_id: i64,
    pub user_id: String,
    pub squad_id: Option<String>,
    pub fee_paid: bool,
    pub payment_reference: Option<String>,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   DepositOutcome     ---------------------------------------------------------
/// The gateway's verdict on a deposit, as reported by its webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DepositOutcome {
    Paid,
    Failed,
}

impl Display for DepositOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositOutcome::Paid => write!(f, "PAID"),
            DepositOutcome::Failed => write!(f, "FAILED"),
        }
    }
}
