use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use arena_payment_engine::{MatchFlowApi, SqliteDatabase, WalletApi};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::gateway::PaymentGateway,
    middleware::HmacMiddlewareFactory,
    routes::{
        add_money,
        auto_update_statuses,
        balance,
        cancel_match,
        create_match,
        create_wallet,
        deposit_webhook,
        health,
        join_match,
        leave_match,
        list_matches,
        match_details,
        transactions,
        upload_results,
    },
    sweep_worker::start_sweep_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Migration failure: {e}")))?;
    let _sweeper = start_sweep_worker(db.clone(), config.live_match_duration, config.sweep_interval_secs);
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let wallet_api = WalletApi::new(db.clone());
        let match_api = MatchFlowApi::new(db.clone());
        let gateway = PaymentGateway::new(config.gateway.checkout_url.clone());
        let options = ServerOptions::from_config(&config);
        let webhook_guard = HmacMiddlewareFactory::new(
            &config.gateway.signature_header,
            config.gateway.hmac_secret.clone(),
            config.gateway.hmac_checks,
        );
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("apg::access_log"))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(match_api))
            .app_data(web::Data::new(gateway))
            .app_data(web::Data::new(options))
            .service(health)
            .service(create_wallet)
            .service(balance)
            .service(add_money)
            .service(transactions)
            .service(create_match)
            // Must register before the `{match_id}` routes so the literal segment wins.
            .service(auto_update_statuses)
            .service(list_matches)
            .service(match_details)
            .service(join_match)
            .service(leave_match)
            .service(upload_results)
            .service(cancel_match)
            // The webhook is the one route the gateway calls rather than a user; it sits behind the signature check.
            .service(
                web::resource("/wallet/webhook").wrap(webhook_guard).route(web::post().to(deposit_webhook)),
            )
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
