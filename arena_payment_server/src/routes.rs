//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! All handlers are async: the engine calls are I/O against the database, and blocking a worker thread here would
//! stall every other request on that worker.

use actix_web::{get, post, web, HttpResponse, Responder};
use arena_payment_engine::{
    db_types::{MatchStatus, NewMatch},
    objects::Pagination,
    prize::ResultsSubmission,
    MatchFlowApi,
    SqliteDatabase,
    WalletApi,
    WalletApiError,
};
use log::*;

use crate::{
    config::ServerOptions,
    data_objects::{
        AddMoneyRequest,
        BalanceResponse,
        CancelMatchResponse,
        CreateMatchRequest,
        CreateWalletRequest,
        DepositInitResponse,
        JoinMatchRequest,
        JoinMatchResponse,
        JsonResponse,
        LeaveMatchRequest,
        LeaveMatchResponse,
        MatchListQuery,
        MatchResponse,
        ResultsResponse,
        WalletCreatedResponse,
        WebhookPayload,
    },
    errors::ServerError,
    integrations::gateway::{CustomerContact, PaymentGateway},
};

/// The engine APIs are instantiated concretely against the SQLite backend; handlers stay free of generics.
pub type WalletRest = WalletApi<SqliteDatabase>;
pub type MatchRest = MatchFlowApi<SqliteDatabase>;

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Wallet  ----------------------------------------------------
/// Route handler for wallet creation.
///
/// Idempotent: a second request for the same owner returns the existing wallet rather than an error.
#[post("/wallet")]
pub async fn create_wallet(
    body: web::Json<CreateWalletRequest>,
    api: web::Data<WalletRest>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST create wallet for {}", req.owner_id);
    let wallet = api.create_wallet(&req.owner_id).await?;
    Ok(HttpResponse::Ok().json(WalletCreatedResponse { wallet_id: wallet.id, balance: wallet.balance }))
}

#[get("/wallet/balance/{owner_id}")]
pub async fn balance(path: web::Path<String>, api: web::Data<WalletRest>) -> Result<HttpResponse, ServerError> {
    let owner_id = path.into_inner();
    trace!("💻️ GET balance for {owner_id}");
    let result = api.balance(&owner_id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { balance: result.balance, has_wallet: result.has_wallet }))
}

/// Route handler for deposit initiation.
///
/// Validates the configured amount bounds, records a pending ledger entry keyed by a fresh order id, and returns
/// the gateway redirect URL. Nothing is credited here; the webhook settles the deposit later.
#[post("/wallet/add-money")]
pub async fn add_money(
    body: web::Json<AddMoneyRequest>,
    api: web::Data<WalletRest>,
    gateway: web::Data<PaymentGateway>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST add-money of {} for {}", req.amount, req.owner_id);
    let pending = api.initiate_deposit(&req.owner_id, req.amount, &options.deposit_limits).await?;
    let contact = CustomerContact { email: req.contact_email, phone: req.contact_phone };
    let session = gateway.deposit_session(&pending, &contact);
    Ok(HttpResponse::Ok().json(DepositInitResponse {
        order_id: session.order_id,
        redirect_url: session.redirect_url,
        amount: pending.amount,
    }))
}

/// Route handler for the gateway webhook.
///
/// The HMAC middleware has already verified the signature by the time this runs; an unsigned request never gets
/// here. Webhook responses must always be in the 200 range, otherwise the gateway will retry indefinitely;
/// idempotent settlement is what makes those retries harmless.
pub async fn deposit_webhook(
    body: web::Json<WebhookPayload>,
    api: web::Data<WalletRest>,
) -> HttpResponse {
    let payload = body.into_inner();
    trace!("💻️ Received gateway webhook for order {}", payload.order_id);
    let result = match api.settle_deposit(&payload.order_id, payload.amount, payload.outcome).await {
        Ok(_) => JsonResponse::success("Deposit settled."),
        Err(WalletApiError::DepositNotFound(order_id)) => {
            warn!("💻️ Webhook for unknown order {order_id}.");
            JsonResponse::failure(format!("Unknown order {order_id}"))
        },
        Err(WalletApiError::DepositAmountMismatch { order_id, .. }) => {
            warn!("💻️ Webhook amount mismatch for order {order_id}. Leaving the deposit pending.");
            JsonResponse::failure("Amount mismatch")
        },
        Err(e) => {
            warn!("💻️ Unexpected error while handling gateway webhook. {e}");
            JsonResponse::failure("Unexpected error handling webhook.")
        },
    };
    HttpResponse::Ok().json(result)
}

#[get("/wallet/{wallet_id}/transactions")]
pub async fn transactions(
    path: web::Path<i64>,
    query: web::Query<Pagination>,
    api: web::Data<WalletRest>,
) -> Result<HttpResponse, ServerError> {
    let wallet_id = path.into_inner();
    trace!("💻️ GET transactions for wallet #{wallet_id}");
    let entries = api.history(wallet_id, &query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entries))
}

//----------------------------------------------   Matches  ----------------------------------------------------
#[post("/matches")]
pub async fn create_match(
    body: web::Json<CreateMatchRequest>,
    api: web::Data<MatchRest>,
) -> Result<HttpResponse, ServerError> {
    let new_match = NewMatch::from(body.into_inner());
    debug!("💻️ POST create match [{}]", new_match.name);
    let m = api.create_match(new_match).await?;
    Ok(HttpResponse::Ok().json(MatchResponse::from_match(m, 0)))
}

#[get("/matches")]
pub async fn list_matches(
    query: web::Query<MatchListQuery>,
    api: web::Data<MatchRest>,
) -> Result<HttpResponse, ServerError> {
    let status = query
        .into_inner()
        .status
        .map(|s| s.parse::<MatchStatus>().map_err(|e| ServerError::InvalidRequest(e.to_string())))
        .transpose()?;
    let matches = api.list_matches(status).await?;
    let mut result = Vec::with_capacity(matches.len());
    for m in matches {
        let joined = api.players_joined(m.id).await?;
        result.push(MatchResponse::from_match(m, joined));
    }
    Ok(HttpResponse::Ok().json(result))
}

#[get("/matches/{match_id}")]
pub async fn match_details(path: web::Path<i64>, api: web::Data<MatchRest>) -> Result<HttpResponse, ServerError> {
    let match_id = path.into_inner();
    let (m, joined) = api
        .match_details(match_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Match {match_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(MatchResponse::from_match(m, joined)))
}

/// Route handler for joining a match.
///
/// On success the response carries the new balance and the payment reference. On insufficient funds the error body
/// carries `{required, available}` so the client can prompt a top-up with exact numbers.
#[post("/matches/{match_id}/join")]
pub async fn join_match(
    path: web::Path<i64>,
    body: web::Json<JoinMatchRequest>,
    api: web::Data<MatchRest>,
) -> Result<HttpResponse, ServerError> {
    let match_id = path.into_inner();
    let req = body.into_inner();
    debug!("💻️ POST join match {match_id} for {}", req.user_id);
    let outcome = api.join_match(match_id, &req.user_id, req.squad_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(JoinMatchResponse {
        new_balance: outcome.new_balance,
        payment_reference: outcome.payment_reference,
    }))
}

#[post("/matches/{match_id}/leave")]
pub async fn leave_match(
    path: web::Path<i64>,
    body: web::Json<LeaveMatchRequest>,
    api: web::Data<MatchRest>,
) -> Result<HttpResponse, ServerError> {
    let match_id = path.into_inner();
    let req = body.into_inner();
    debug!("💻️ POST leave match {match_id} for {}", req.user_id);
    let refunded = api.leave_match(match_id, &req.user_id).await?;
    Ok(HttpResponse::Ok().json(LeaveMatchResponse { refunded_amount: refunded }))
}

/// Route handler for the organizer's results upload. Completes the match and credits the winners in one atomic
/// settlement step.
#[post("/matches/{match_id}/results")]
pub async fn upload_results(
    path: web::Path<i64>,
    body: web::Json<ResultsSubmission>,
    api: web::Data<MatchRest>,
) -> Result<HttpResponse, ServerError> {
    let match_id = path.into_inner();
    debug!("💻️ POST results for match {match_id}");
    let (_, prizes) = api.upload_results(match_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResultsResponse { total_distributed: prizes.total, awards: prizes.awards }))
}

#[post("/matches/{match_id}/cancel")]
pub async fn cancel_match(path: web::Path<i64>, api: web::Data<MatchRest>) -> Result<HttpResponse, ServerError> {
    let match_id = path.into_inner();
    debug!("💻️ POST cancel match {match_id}");
    let (_, refunds) = api.cancel_match(match_id).await?;
    Ok(HttpResponse::Ok().json(CancelMatchResponse { refunds }))
}

/// Manual trigger for the lifecycle sweep. The same pass also runs on a timer (see
/// [`crate::sweep_worker`]); both are re-entrant no-ops when nothing qualifies.
#[post("/matches/auto-update-statuses")]
pub async fn auto_update_statuses(
    api: web::Data<MatchRest>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST auto-update match statuses");
    let result = api.auto_update_statuses(options.live_match_duration).await?;
    Ok(HttpResponse::Ok().json(result))
}
