//! Arena Payment Engine
//!
//! The Arena Payment Engine is the money-moving core of the Arena tournament platform. It keeps a per-user wallet
//! with an append-only transaction ledger, and coordinates the match-entry flows (join, leave, results, payouts)
//! that have to stay consistent under concurrent requests and partial gateway failures.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly. Instead, use the public API provided by the engine. The exception is the data
//!    types used in the database. These are defined in the `db_types` module and are public.
//! 2. The store traits ([`mod@traits`]). Backends implement [`traits::WalletManagement`] and
//!    [`traits::MatchManagement`] in order to serve the public APIs.
//! 3. The engine public API: [`WalletApi`] for wallet creation, deposits and the ledger, and [`MatchFlowApi`] for
//!    the entry-fee transaction flows and the match lifecycle.
mod api;

pub mod db_types;
pub mod helpers;
pub mod prize;
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    match_flow_api::MatchFlowApi,
    objects,
    wallet_api::WalletApi,
};
pub use sqlite::SqliteDatabase;
pub use traits::{MatchFlowError, MatchManagement, WalletApiError, WalletManagement};
