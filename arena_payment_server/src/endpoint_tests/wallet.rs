use actix_web::{
    http::{header::ContentType, StatusCode},
    test,
    App,
};
use apg_common::Money;
use arena_payment_engine::WalletApi;
use serde_json::{json, Value};

use super::helpers::{configure, test_db, SIGNATURE_HEADER, TEST_SECRET};
use crate::helpers::calculate_hmac;

#[actix_web::test]
async fn wallet_creation_is_idempotent_over_http() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db))).await;

    let req = test::TestRequest::post().uri("/wallet").set_json(json!({"ownerId": "user-1"})).to_request();
    let first: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(first["balance"], 0);

    let req = test::TestRequest::post().uri("/wallet").set_json(json!({"ownerId": "user-1"})).to_request();
    let second: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(first["walletId"], second["walletId"]);
}

#[actix_web::test]
async fn balance_reports_a_missing_wallet_without_erroring() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db))).await;

    let req = test::TestRequest::get().uri("/wallet/balance/nobody").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["hasWallet"], false);
    assert_eq!(body["balance"], 0);
}

#[actix_web::test]
async fn add_money_rejects_out_of_bounds_amounts() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db))).await;
    let req = test::TestRequest::post().uri("/wallet").set_json(json!({"ownerId": "user-1"})).to_request();
    test::call_service(&app, req).await;

    // Below the configured minimum of 100
    let req = test::TestRequest::post()
        .uri("/wallet/add-money")
        .set_json(json!({"ownerId": "user-1", "amount": 50}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn deposit_settles_through_the_signed_webhook_exactly_once() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db))).await;
    let req = test::TestRequest::post().uri("/wallet").set_json(json!({"ownerId": "user-1"})).to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/wallet/add-money")
        .set_json(json!({"ownerId": "user-1", "amount": 500, "contactPhone": "9876543210"}))
        .to_request();
    let init: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let order_id = init["orderId"].as_str().expect("orderId missing").to_string();
    assert!(init["redirectUrl"].as_str().unwrap().contains(&order_id));

    // A correctly signed confirmation credits the wallet
    let body = serde_json::to_string(&json!({"orderId": order_id, "amount": 500, "outcome": "PAID"})).unwrap();
    let signature = calculate_hmac(TEST_SECRET, body.as_bytes());
    let req = test::TestRequest::post()
        .uri("/wallet/webhook")
        .insert_header((SIGNATURE_HEADER, signature.clone()))
        .insert_header(ContentType::json())
        .set_payload(body.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/wallet/balance/user-1").to_request();
    let balance: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(balance["balance"], 500);

    // The gateway retries with the identical payload; nothing changes
    let req = test::TestRequest::post()
        .uri("/wallet/webhook")
        .insert_header((SIGNATURE_HEADER, signature))
        .insert_header(ContentType::json())
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let req = test::TestRequest::get().uri("/wallet/balance/user-1").to_request();
    let balance: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(balance["balance"], 500);
}

#[actix_web::test]
async fn webhook_with_a_bad_signature_is_rejected_without_mutation() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db))).await;
    let req = test::TestRequest::post().uri("/wallet").set_json(json!({"ownerId": "user-1"})).to_request();
    test::call_service(&app, req).await;
    let req = test::TestRequest::post()
        .uri("/wallet/add-money")
        .set_json(json!({"ownerId": "user-1", "amount": 500}))
        .to_request();
    let init: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let order_id = init["orderId"].as_str().unwrap().to_string();

    let body = serde_json::to_string(&json!({"orderId": order_id, "amount": 500, "outcome": "PAID"})).unwrap();
    let req = test::TestRequest::post()
        .uri("/wallet/webhook")
        .insert_header((SIGNATURE_HEADER, "bm90LXRoZS1yaWdodC1zaWduYXR1cmU="))
        .insert_header(ContentType::json())
        .set_payload(body)
        .to_request();
    let err = test::try_call_service(&app, req).await.expect_err("Expected the signature check to reject this");
    assert_eq!(err.to_string(), "Invalid HMAC signature.");

    let req = test::TestRequest::get().uri("/wallet/balance/user-1").to_request();
    let balance: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(balance["balance"], 0);
}

#[actix_web::test]
async fn transaction_history_is_paginated_newest_first() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db.clone()))).await;
    let req = test::TestRequest::post().uri("/wallet").set_json(json!({"ownerId": "user-1"})).to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let wallet_id = created["walletId"].as_i64().unwrap();

    let api = WalletApi::new(db);
    for i in 0..3 {
        api.credit(wallet_id, Money::from(100 + i), "Top up", &format!("SEED_{i}")).await.unwrap();
    }

    let req = test::TestRequest::get().uri(&format!("/wallet/{wallet_id}/transactions?page=0&limit=2")).to_request();
    let page: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let entries = page.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["amount"], 102);
}
