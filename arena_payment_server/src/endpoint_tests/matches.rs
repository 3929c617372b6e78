use actix_web::{http::StatusCode, test, App};
use apg_common::Money;
use arena_payment_engine::WalletApi;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use super::helpers::{configure, test_db};

/// Seeds a funded wallet through the engine so the HTTP tests can focus on the match routes.
async fn create_funded_wallet(db: &arena_payment_engine::SqliteDatabase, user_id: &str, amount: i64) -> i64 {
    let api = WalletApi::new(db.clone());
    let wallet = api.create_wallet(user_id).await.unwrap();
    if amount > 0 {
        api.credit(wallet.id, Money::from(amount), "Top up", &format!("SEED_{user_id}")).await.unwrap();
    }
    wallet.id
}

fn upcoming_match_body(fee: i64, max_players: i64) -> Value {
    json!({
        "name": "Erangel Scrims",
        "entryFee": fee,
        "maxPlayers": max_players,
        "map": "Erangel",
        "scheduledAt": (Utc::now() + Duration::hours(1)).to_rfc3339(),
    })
}

#[actix_web::test]
async fn join_and_leave_round_trip_over_http() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db.clone()))).await;
    create_funded_wallet(&db, "user-1", 250).await;

    let req = test::TestRequest::post().uri("/matches").set_json(upcoming_match_body(100, 2)).to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let match_id = created["id"].as_i64().unwrap();
    assert_eq!(created["playersJoined"], 0);
    assert_eq!(created["status"], "Upcoming");

    let req = test::TestRequest::post()
        .uri(&format!("/matches/{match_id}/join"))
        .set_json(json!({"userId": "user-1", "squadId": "squad-9"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let joined: Value = test::read_body_json(resp).await;
    assert_eq!(joined["newBalance"], 150);
    assert!(joined["paymentReference"].as_str().unwrap().starts_with("MATCH_"));

    // Double join conflicts
    let req = test::TestRequest::post()
        .uri(&format!("/matches/{match_id}/join"))
        .set_json(json!({"userId": "user-1"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get().uri(&format!("/matches/{match_id}")).to_request();
    let details: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(details["playersJoined"], 1);

    let req = test::TestRequest::post()
        .uri(&format!("/matches/{match_id}/leave"))
        .set_json(json!({"userId": "user-1"}))
        .to_request();
    let left: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(left["refundedAmount"], 100);

    let req = test::TestRequest::get().uri("/wallet/balance/user-1").to_request();
    let balance: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(balance["balance"], 250);
}

#[actix_web::test]
async fn insufficient_balance_reports_the_shortfall() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db.clone()))).await;
    create_funded_wallet(&db, "user-1", 50).await;

    let req = test::TestRequest::post().uri("/matches").set_json(upcoming_match_body(100, 2)).to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let match_id = created["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/matches/{match_id}/join"))
        .set_json(json!({"userId": "user-1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["required"], 100);
    assert_eq!(body["available"], 50);
}

#[actix_web::test]
async fn results_upload_completes_the_match_and_pays_the_winners() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db.clone()))).await;
    create_funded_wallet(&db, "user-1", 100).await;

    let body = json!({
        "name": "Finals",
        "entryFee": 100,
        "prizePool": 5000,
        "maxPlayers": 16,
        "scheduledAt": (Utc::now() + Duration::hours(1)).to_rfc3339(),
        "prizeDistribution": {
            "rank_rewards": [3000, 1500, 800],
            "per_kill": 50,
            "max_kills": 10,
        },
    });
    let req = test::TestRequest::post().uri("/matches").set_json(body).to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let match_id = created["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/matches/{match_id}/join"))
        .set_json(json!({"userId": "user-1", "squadId": "alpha"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let results = json!({
        "standings": [{"squad_id": "alpha", "user_id": "user-1", "kills": 12}],
    });
    let req = test::TestRequest::post().uri(&format!("/matches/{match_id}/results")).set_json(results).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let settled: Value = test::read_body_json(resp).await;
    assert_eq!(settled["totalDistributed"], 3500);

    let req = test::TestRequest::get().uri(&format!("/matches/{match_id}")).to_request();
    let details: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(details["status"], "Completed");

    // Entry fee gone, prize landed
    let req = test::TestRequest::get().uri("/wallet/balance/user-1").to_request();
    let balance: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(balance["balance"], 3500);

    // Leaving a completed match is a state conflict (Scenario F)
    let req = test::TestRequest::post()
        .uri(&format!("/matches/{match_id}/leave"))
        .set_json(json!({"userId": "user-1"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn sweep_endpoint_reports_transition_counts() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db.clone()))).await;

    let body = json!({
        "name": "Started long ago",
        "entryFee": 0,
        "maxPlayers": 4,
        "scheduledAt": (Utc::now() - Duration::hours(3)).to_rfc3339(),
    });
    let req = test::TestRequest::post().uri("/matches").set_json(body).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post().uri("/matches/auto-update-statuses").to_request();
    let swept: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(swept["started"], 1);
    assert_eq!(swept["completed"], 1);

    let req = test::TestRequest::post().uri("/matches/auto-update-statuses").to_request();
    let swept: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(swept["started"], 0);
    assert_eq!(swept["completed"], 0);

    let req = test::TestRequest::get().uri("/matches?status=Completed").to_request();
    let listed: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["status"], "Completed");
}

#[actix_web::test]
async fn unknown_match_is_a_404() {
    let db = test_db().await;
    let app = test::init_service(App::new().configure(configure(db))).await;
    let req = test::TestRequest::get().uri("/matches/999").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}
