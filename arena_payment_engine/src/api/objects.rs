//! Data objects carried across the engine's public API boundary.

use apg_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{LedgerEntry, Registration};

//--------------------------------------     Pagination       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub limit: u32,
}

fn default_page_size() -> u32 {
    20
}

pub const MAX_PAGE_SIZE: u32 = 100;

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 0, limit: default_page_size() }
    }
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit: limit.clamp(1, MAX_PAGE_SIZE) }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.limit.clamp(1, MAX_PAGE_SIZE))
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit.clamp(1, MAX_PAGE_SIZE))
    }
}

//--------------------------------------    BalanceResult     ---------------------------------------------------------
/// A balance query never fails for a missing wallet; it reports zero with `has_wallet = false` instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalanceResult {
    pub balance: Money,
    pub has_wallet: bool,
}

impl BalanceResult {
    pub fn none() -> Self {
        Self { balance: Money::default(), has_wallet: false }
    }
}

//--------------------------------------     JoinOutcome      ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    pub registration: Registration,
    pub new_balance: Money,
    /// `None` for free-entry matches.
    pub payment_reference: Option<String>,
}

//--------------------------------------     SettleResult     ---------------------------------------------------------
/// What happened to a deposit when its webhook arrived.
#[derive(Debug, Clone)]
pub enum SettleResult {
    /// The pending entry settled and the wallet was credited.
    Credited(LedgerEntry),
    /// The gateway reported failure; the entry is terminal and the balance untouched.
    MarkedFailed(LedgerEntry),
    /// A replayed webhook. The prior outcome stands.
    AlreadySettled(LedgerEntry),
}

impl SettleResult {
    pub fn entry(&self) -> &LedgerEntry {
        match self {
            SettleResult::Credited(e) | SettleResult::MarkedFailed(e) | SettleResult::AlreadySettled(e) => e,
        }
    }
}

//--------------------------------------    PendingDeposit    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct PendingDeposit {
    pub wallet_id: i64,
    pub order_id: String,
    pub amount: Money,
}

//--------------------------------------    DepositLimits     ---------------------------------------------------------
/// Configurable bounds on a single deposit, in minor units.
#[derive(Debug, Clone, Copy)]
pub struct DepositLimits {
    pub min: Money,
    pub max: Money,
}

impl Default for DepositLimits {
    fn default() -> Self {
        Self { min: Money::from_rupees(100), max: Money::from_rupees(50_000) }
    }
}

//--------------------------------------     RefundRecord     ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct RefundRecord {
    pub user_id: String,
    pub amount: Money,
}

//--------------------------------------      SweepResult     ---------------------------------------------------------
/// The outcome of one lifecycle sweep pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SweepResult {
    /// Matches moved `Upcoming → Live`.
    pub started: u64,
    /// Matches moved `Live → Completed`.
    pub completed: u64,
}

impl SweepResult {
    pub fn total(&self) -> u64 {
        self.started + self.completed
    }
}
