//! The behaviour contracts that a storage backend must fulfil to drive the payment engine.
//!
//! [`WalletManagement`] covers the wallet ledger; [`MatchManagement`] covers matches, registrations and settlement.
//! The SQLite backend in [`crate::SqliteDatabase`] implements both.

mod match_management;
mod wallet_management;

pub use match_management::{MatchFlowError, MatchManagement};
pub use wallet_management::{WalletApiError, WalletManagement};
