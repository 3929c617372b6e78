use actix_web::web;
use apg_common::{Money, Secret};
use arena_payment_engine::{objects::DepositLimits, MatchFlowApi, SqliteDatabase, WalletApi};
use chrono::Duration;

use crate::{config::ServerOptions, integrations::gateway::PaymentGateway, middleware::HmacMiddlewareFactory, routes};

pub const TEST_SECRET: &str = "test-webhook-secret";
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// A throwaway SQLite database with the full schema applied.
pub async fn test_db() -> SqliteDatabase {
    let url = arena_payment_engine::test_utils::random_db_path();
    arena_payment_engine::test_utils::prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to test database")
}

/// Wires the full route table against the given database, with webhook signature checks enabled under
/// [`TEST_SECRET`]. Deposit limits are 100..=1,000,000 minor units.
pub fn configure(db: SqliteDatabase) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let options = ServerOptions {
            deposit_limits: DepositLimits { min: Money::from(100), max: Money::from(1_000_000) },
            live_match_duration: Duration::hours(2),
        };
        let webhook_guard =
            HmacMiddlewareFactory::new(SIGNATURE_HEADER, Secret::new(TEST_SECRET.to_string()), true);
        cfg.app_data(web::Data::new(WalletApi::new(db.clone())))
            .app_data(web::Data::new(MatchFlowApi::new(db.clone())))
            .app_data(web::Data::new(PaymentGateway::new("https://pay.test")))
            .app_data(web::Data::new(options))
            .service(routes::health)
            .service(routes::create_wallet)
            .service(routes::balance)
            .service(routes::add_money)
            .service(routes::transactions)
            .service(routes::create_match)
            .service(routes::auto_update_statuses)
            .service(routes::list_matches)
            .service(routes::match_details)
            .service(routes::join_match)
            .service(routes::leave_match)
            .service(routes::upload_results)
            .service(routes::cancel_match)
            .service(
                web::resource("/wallet/webhook").wrap(webhook_guard).route(web::post().to(routes::deposit_webhook)),
            );
    }
}
